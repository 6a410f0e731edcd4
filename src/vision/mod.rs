//! Remote vision backends.
//!
//! The description tools only need "prompt + image in, text out";
//! [`VisionBackend`] is that seam. [`ImageBackend`] covers generation, edits
//! and variations. [`OpenAiVision`] implements both against an
//! OpenAI-compatible API.

mod config;
pub mod images;
mod openai;

pub use config::{
    VisionConfig, DEFAULT_BASE_URL, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_TIMEOUT_SECS,
};
pub use images::{ImageBackend, ImageModel, ImageParams};
pub use openai::OpenAiVision;

use crate::image_info::ImageFormat;
use crate::Result;
use async_trait::async_trait;
use base64::Engine;

/// One prompt about one image.
#[derive(Debug, Clone)]
pub struct VisionRequest {
    pub prompt: String,
    pub format: ImageFormat,
    /// Standard base64 of the raw file bytes.
    pub image_base64: String,
}

impl VisionRequest {
    pub fn new(prompt: impl Into<String>, format: ImageFormat, image_bytes: &[u8]) -> Self {
        Self {
            prompt: prompt.into(),
            format,
            image_base64: base64::engine::general_purpose::STANDARD.encode(image_bytes),
        }
    }

    pub fn data_url(&self) -> String {
        format!(
            "data:image/{};base64,{}",
            self.format.mime_subtype(),
            self.image_base64
        )
    }
}

#[async_trait]
pub trait VisionBackend: Send + Sync {
    /// Returns the model's text answer for the request.
    async fn describe(&self, request: &VisionRequest) -> Result<String>;

    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_url_uses_format_subtype() {
        let req = VisionRequest::new("p", ImageFormat::Jpeg, b"abc");
        assert_eq!(req.data_url(), "data:image/jpeg;base64,YWJj");
    }
}
