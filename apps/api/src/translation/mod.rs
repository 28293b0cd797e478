//! Translation: medical instruction → Libras gloss + patient explanation, followed by
//! the primary illustration.
//!
//! Flow: translate (text model) → illustrate the explanation (image model).
//! The two stages are strictly sequential: the illustration prompt is built from the
//! translation output. An illustration failure never discards the translation.

pub mod prompts;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::AppError;
use crate::genai_client::GenAiClient;
use crate::illustration::prompts::build_instruction_prompt;
use crate::illustration::{Illustration, Illustrator};
use crate::translation::prompts::{build_translation_prompt, gloss_response_schema};

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

/// What the text model returns for one instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlossTranslation {
    pub gloss: String,
    pub explanation: String,
}

/// One completed translation. Replaced wholesale by the next one.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationResult {
    pub original_text: String,
    pub libras_gloss: String,
    pub explanation: String,
    pub illustration: Option<Illustration>,
}

// ────────────────────────────────────────────────────────────────────────────
// Trait definition
// ────────────────────────────────────────────────────────────────────────────

/// The translation service. Carried in `AppState` as `Arc<dyn Translator>`.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str) -> Result<GlossTranslation, AppError>;
}

/// Translator backed by the text model with a JSON response schema.
pub struct GenAiTranslator {
    client: GenAiClient,
}

impl GenAiTranslator {
    pub fn new(client: GenAiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Translator for GenAiTranslator {
    async fn translate(&self, text: &str) -> Result<GlossTranslation, AppError> {
        let prompt = build_translation_prompt(text);
        let translation: GlossTranslation = self
            .client
            .call_json(&prompt, &gloss_response_schema())
            .await?;

        if translation.gloss.trim().is_empty() {
            return Err(AppError::Service(
                "Translation returned an empty gloss".to_string(),
            ));
        }
        Ok(translation)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Two-stage pipeline
// ────────────────────────────────────────────────────────────────────────────

/// Runs translate → illustrate for one instruction.
///
/// Errors from the translation stage abort the attempt. In the illustration stage only
/// a configuration error aborts; service errors degrade to a result without an image.
pub async fn translate_and_illustrate(
    text: &str,
    translator: &dyn Translator,
    illustrator: &dyn Illustrator,
) -> Result<TranslationResult, AppError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::Validation("text cannot be empty".to_string()));
    }

    info!(chars = text.chars().count(), "Translating instruction to Libras gloss");
    let translation = translator.translate(text).await?;

    let prompt = build_instruction_prompt(&translation.explanation);
    let illustration = match illustrator.illustrate(&prompt).await {
        Ok(image) => image,
        Err(AppError::Configuration(msg)) => return Err(AppError::Configuration(msg)),
        Err(e) => {
            warn!("Primary illustration failed, keeping translation without image: {e}");
            None
        }
    };

    info!(
        has_illustration = illustration.is_some(),
        "Translation pipeline finished"
    );

    Ok(TranslationResult {
        original_text: text.to_string(),
        libras_gloss: translation.gloss,
        explanation: translation.explanation,
        illustration,
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Translator that answers with a fixed gloss and records the texts it saw.
    pub(crate) struct FixedTranslator {
        pub gloss: String,
        pub explanation: String,
        pub seen: Mutex<Vec<String>>,
    }

    impl FixedTranslator {
        pub(crate) fn new(gloss: &str, explanation: &str) -> Self {
            Self {
                gloss: gloss.to_string(),
                explanation: explanation.to_string(),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Translator for FixedTranslator {
        async fn translate(&self, text: &str) -> Result<GlossTranslation, AppError> {
            self.seen.lock().unwrap().push(text.to_string());
            Ok(GlossTranslation {
                gloss: self.gloss.clone(),
                explanation: self.explanation.clone(),
            })
        }
    }

    struct FailingTranslator;

    #[async_trait]
    impl Translator for FailingTranslator {
        async fn translate(&self, _text: &str) -> Result<GlossTranslation, AppError> {
            Err(AppError::Service("upstream down".to_string()))
        }
    }

    /// Illustrator with a scripted outcome, counting invocations.
    struct ScriptedIllustrator {
        outcome: fn() -> Result<Option<Illustration>, AppError>,
        calls: AtomicUsize,
        last_prompt: Mutex<Option<String>>,
    }

    impl ScriptedIllustrator {
        fn new(outcome: fn() -> Result<Option<Illustration>, AppError>) -> Self {
            Self {
                outcome,
                calls: AtomicUsize::new(0),
                last_prompt: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl Illustrator for ScriptedIllustrator {
        async fn illustrate(&self, prompt: &str) -> Result<Option<Illustration>, AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_prompt.lock().unwrap() = Some(prompt.to_string());
            (self.outcome)()
        }
    }

    fn some_image() -> Result<Option<Illustration>, AppError> {
        Ok(Some(Illustration::new("image/png", vec![1u8, 2, 3])))
    }

    #[tokio::test]
    async fn test_pipeline_builds_result_with_illustration() {
        let translator = FixedTranslator::new(
            "COMPRIMIDO TOMAR-a-cada-6-HORAS",
            "Tome um comprimido a cada seis horas",
        );
        let illustrator = ScriptedIllustrator::new(some_image);

        let result = translate_and_illustrate(
            "  Tomar 1 comprimido a cada 6 horas ",
            &translator,
            &illustrator,
        )
        .await
        .unwrap();

        assert_eq!(result.original_text, "Tomar 1 comprimido a cada 6 horas");
        assert_eq!(result.libras_gloss, "COMPRIMIDO TOMAR-a-cada-6-HORAS");
        assert!(result.illustration.is_some());
        // Illustration input is the explanation, not the original text.
        let prompt = illustrator.last_prompt.lock().unwrap().clone().unwrap();
        assert!(prompt.contains("Tome um comprimido a cada seis horas"));
    }

    #[tokio::test]
    async fn test_pipeline_keeps_translation_when_illustration_fails() {
        let translator = FixedTranslator::new("DOR", "Dor");
        let illustrator =
            ScriptedIllustrator::new(|| Err(AppError::Service("image model down".to_string())));

        let result = translate_and_illustrate("dor", &translator, &illustrator)
            .await
            .unwrap();
        assert_eq!(result.libras_gloss, "DOR");
        assert!(result.illustration.is_none());
    }

    #[tokio::test]
    async fn test_pipeline_propagates_configuration_error_from_illustration() {
        let translator = FixedTranslator::new("DOR", "Dor");
        let illustrator =
            ScriptedIllustrator::new(|| Err(AppError::Configuration("no key".to_string())));

        let err = translate_and_illustrate("dor", &translator, &illustrator)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_pipeline_translation_failure_skips_illustration() {
        let illustrator = ScriptedIllustrator::new(some_image);
        let err = translate_and_illustrate("dor", &FailingTranslator, &illustrator)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Service(_)));
        assert_eq!(illustrator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_pipeline_rejects_blank_text() {
        let translator = FixedTranslator::new("X", "Y");
        let illustrator = ScriptedIllustrator::new(some_image);
        let err = translate_and_illustrate("   ", &translator, &illustrator)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(translator.seen.lock().unwrap().is_empty());
    }
}
