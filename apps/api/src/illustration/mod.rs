//! Illustration Service: turns a textual description into an image (or none).
//!
//! `AppState` holds an `Arc<dyn Illustrator>`; the generative backend is the default,
//! tests swap in fakes.

pub mod asset;
pub mod prompts;

use async_trait::async_trait;

use crate::errors::AppError;
use crate::genai_client::GenAiClient;

pub use self::asset::{DecodedImage, Illustration};

/// Produces an illustration for a prompt.
///
/// `Ok(None)` is a valid outcome meaning "no image produced"; errors follow the
/// `Configuration` / `Service` taxonomy.
#[async_trait]
pub trait Illustrator: Send + Sync {
    async fn illustrate(&self, prompt: &str) -> Result<Option<Illustration>, AppError>;
}

/// Illustrator backed by the image model.
pub struct GenAiIllustrator {
    client: GenAiClient,
}

impl GenAiIllustrator {
    pub fn new(client: GenAiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Illustrator for GenAiIllustrator {
    async fn illustrate(&self, prompt: &str) -> Result<Option<Illustration>, AppError> {
        let generated = self.client.generate_image(prompt).await?;
        Ok(generated.map(|img| Illustration::new(img.mime_type, img.bytes)))
    }
}
