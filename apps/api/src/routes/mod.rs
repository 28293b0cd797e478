pub mod catalog;
pub mod documents;
pub mod health;
pub mod sessions;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/catalog", get(catalog::handle_get_catalog))
        // Sessions
        .route("/api/v1/sessions", post(sessions::handle_create_session))
        .route(
            "/api/v1/sessions/:id",
            get(sessions::handle_get_session).delete(sessions::handle_delete_session),
        )
        .route(
            "/api/v1/sessions/:id/reset",
            post(sessions::handle_reset_session),
        )
        .route(
            "/api/v1/sessions/:id/translate",
            post(sessions::handle_translate),
        )
        // Symptom checklist
        .route(
            "/api/v1/sessions/:id/symptoms/:symptom_id/toggle",
            post(sessions::handle_toggle_symptom),
        )
        .route(
            "/api/v1/sessions/:id/symptoms/:symptom_id/retry",
            post(sessions::handle_retry_symptom),
        )
        .route(
            "/api/v1/sessions/:id/symptoms/:symptom_id/image",
            get(sessions::handle_get_symptom_image),
        )
        // Export
        .route(
            "/api/v1/sessions/:id/document",
            get(documents::handle_export_document),
        )
        .route(
            "/api/v1/sessions/:id/document/layout",
            get(documents::handle_document_layout),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::catalog::{test_entry, Catalog};
    use crate::config::Config;
    use crate::errors::AppError;
    use crate::illustration::asset::test_png;
    use crate::illustration::{Illustration, Illustrator};
    use crate::layout::default_page_config;
    use crate::session::SessionStore;
    use crate::translation::tests::FixedTranslator;
    use crate::translation::{GlossTranslation, Translator};

    struct PngIllustrator;

    #[async_trait]
    impl Illustrator for PngIllustrator {
        async fn illustrate(&self, _prompt: &str) -> Result<Option<Illustration>, AppError> {
            Ok(Some(test_png(2, 2, [16, 185, 129, 255])))
        }
    }

    struct UnconfiguredTranslator;

    #[async_trait]
    impl Translator for UnconfiguredTranslator {
        async fn translate(&self, _text: &str) -> Result<GlossTranslation, AppError> {
            Err(AppError::Configuration("GEMINI_API_KEY is not set".to_string()))
        }
    }

    fn app_with(translator: Arc<dyn Translator>) -> Router {
        app_with_ttl(translator, Duration::from_secs(3600))
    }

    fn app_with_ttl(translator: Arc<dyn Translator>, idle_ttl: Duration) -> Router {
        let state = AppState {
            config: Config {
                gemini_api_key: None,
                symptom_catalog_path: None,
                port: 0,
                rust_log: "debug".to_string(),
                session_idle_ttl: idle_ttl,
            },
            translator,
            illustrator: Arc::new(PngIllustrator),
            catalog: Arc::new(
                Catalog::new(vec![
                    test_entry("febre", "Febre"),
                    test_entry("tosse", "Tosse"),
                    test_entry("tontura", "Tontura"),
                ])
                .unwrap(),
            ),
            sessions: Arc::new(SessionStore::new(idle_ttl)),
            page_config: default_page_config(),
        };
        build_router(state)
    }

    fn app() -> Router {
        app_with(Arc::new(FixedTranslator::new(
            "COMPRIMIDO TOMAR-a-cada-6-HORAS",
            "Tome um comprimido a cada seis horas",
        )))
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, bytes.to_vec())
    }

    async fn send_json(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let (status, _, bytes) = send(app, method, uri, body).await;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn create_session(app: &Router) -> String {
        let (status, body) = send_json(app, "POST", "/api/v1/sessions", None).await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send_json(&app(), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["generative_backend_configured"], false);
        assert_eq!(body["active_sessions"], 0);
    }

    #[tokio::test]
    async fn test_catalog_in_order() {
        let (status, body) = send_json(&app(), "GET", "/api/v1/catalog", None).await;
        assert_eq!(status, StatusCode::OK);
        let ids: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["febre", "tosse", "tontura"]);
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let app = app();
        let id = create_session(&app).await;

        let (status, body) = send_json(&app, "GET", &format!("/api/v1/sessions/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["symptoms"].as_array().unwrap().len(), 3);
        assert!(body["translation"].is_null());

        let (status, _) = send_json(&app, "DELETE", &format!("/api/v1/sessions/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = send_json(&app, "GET", &format!("/api/v1/sessions/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_session_is_not_found() {
        let app = app_with_ttl(
            Arc::new(FixedTranslator::new("FEBRE", "Febre")),
            Duration::from_secs(60),
        );
        let id = create_session(&app).await;

        tokio::time::advance(Duration::from_secs(61)).await;
        let (status, body) = send_json(&app, "GET", &format!("/api/v1/sessions/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_translate_stores_result_in_session() {
        let app = app();
        let id = create_session(&app).await;

        let (status, body) = send_json(
            &app,
            "POST",
            &format!("/api/v1/sessions/{id}/translate"),
            Some(json!({"text": "Tomar 1 comprimido a cada 6 horas"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["libras_gloss"], "COMPRIMIDO TOMAR-a-cada-6-HORAS");
        assert!(body["illustration"]
            .as_str()
            .unwrap()
            .starts_with("data:image/png;base64,"));

        let (_, snapshot) = send_json(&app, "GET", &format!("/api/v1/sessions/{id}"), None).await;
        assert_eq!(
            snapshot["translation"]["original_text"],
            "Tomar 1 comprimido a cada 6 horas"
        );
        assert_eq!(snapshot["translation_pending"], false);
    }

    #[tokio::test]
    async fn test_translate_blank_text_is_validation_error() {
        let app = app();
        let id = create_session(&app).await;
        let (status, body) = send_json(
            &app,
            "POST",
            &format!("/api/v1/sessions/{id}/translate"),
            Some(json!({"text": "   "})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_translate_without_credential_is_configuration_error() {
        let app = app_with(Arc::new(UnconfiguredTranslator));
        let id = create_session(&app).await;
        let (status, body) = send_json(
            &app,
            "POST",
            &format!("/api/v1/sessions/{id}/translate"),
            Some(json!({"text": "dor de cabeça"})),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["code"], "CONFIGURATION_ERROR");

        // The slot was released; a retry is not a conflict.
        let (status, _) = send_json(
            &app,
            "POST",
            &format!("/api/v1/sessions/{id}/translate"),
            Some(json!({"text": "dor de cabeça"})),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_toggle_unknown_symptom_is_not_found() {
        let app = app();
        let id = create_session(&app).await;
        let (status, _) = send_json(
            &app,
            "POST",
            &format!("/api/v1/sessions/{id}/symptoms/unknown/toggle"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_toggle_generates_image_and_serves_it() {
        let app = app();
        let id = create_session(&app).await;

        let (status, body) = send_json(
            &app,
            "POST",
            &format!("/api/v1/sessions/{id}/symptoms/tosse/toggle"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["selected"], true);
        assert_ne!(body["image"]["status"], "not_requested");

        let image_uri = format!("/api/v1/sessions/{id}/symptoms/tosse/image");
        let mut served = None;
        for _ in 0..50 {
            let (status, headers, bytes) = send(&app, "GET", &image_uri, None).await;
            if status == StatusCode::OK {
                served = Some((headers, bytes));
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let (headers, bytes) = served.expect("image generated");
        assert_eq!(headers[header::CONTENT_TYPE], "image/png");
        assert!(bytes.starts_with(&[0x89, b'P', b'N', b'G']));

        // Deselect keeps the cached image.
        let (_, body) = send_json(
            &app,
            "POST",
            &format!("/api/v1/sessions/{id}/symptoms/tosse/toggle"),
            None,
        )
        .await;
        assert_eq!(body["selected"], false);
        assert_eq!(body["image"]["status"], "ready");
    }

    #[tokio::test]
    async fn test_reset_clears_selection() {
        let app = app();
        let id = create_session(&app).await;
        send_json(
            &app,
            "POST",
            &format!("/api/v1/sessions/{id}/symptoms/febre/toggle"),
            None,
        )
        .await;

        let (status, body) =
            send_json(&app, "POST", &format!("/api/v1/sessions/{id}/reset"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["symptoms"]
            .as_array()
            .unwrap()
            .iter()
            .all(|s| s["selected"] == false));
    }

    #[tokio::test]
    async fn test_export_document_is_pdf_attachment() {
        let app = app();
        let id = create_session(&app).await;
        send_json(
            &app,
            "POST",
            &format!("/api/v1/sessions/{id}/translate"),
            Some(json!({"text": "Tomar 1 comprimido a cada 6 horas"})),
        )
        .await;

        let (status, headers, bytes) =
            send(&app, "GET", &format!("/api/v1/sessions/{id}/document"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "application/pdf");
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"prescricao-libras.pdf\""
        );
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn test_layout_of_empty_session_is_one_page() {
        let app = app();
        let id = create_session(&app).await;
        let (status, body) = send_json(
            &app,
            "GET",
            &format!("/api/v1/sessions/{id}/document/layout"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["page_count"], 1);
        assert_eq!(body["pages"][0]["blocks"][0]["kind"], "header");
    }
}
