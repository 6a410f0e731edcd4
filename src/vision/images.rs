//! Image generation, editing and variation requests.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::str::FromStr;

use crate::{Error, ErrorContext, Result};

/// Sizes accepted by the variations endpoint (dall-e-2 only).
pub const VARIATION_SIZES: &[&str] = &["256x256", "512x512", "1024x1024"];
pub const STYLES: &[&str] = &["vivid", "natural"];
/// Upper bound on images per request for every model.
pub const MAX_IMAGES_PER_REQUEST: u8 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageModel {
    DallE2,
    DallE3,
    GptImage1,
}

impl ImageModel {
    pub const ALL: [ImageModel; 3] = [Self::DallE2, Self::DallE3, Self::GptImage1];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DallE2 => "dall-e-2",
            Self::DallE3 => "dall-e-3",
            Self::GptImage1 => "gpt-image-1",
        }
    }

    pub fn max_prompt_chars(&self) -> usize {
        match self {
            Self::DallE2 => 1000,
            Self::DallE3 => 4000,
            Self::GptImage1 => 32000,
        }
    }

    pub fn sizes(&self) -> &'static [&'static str] {
        match self {
            Self::DallE2 => VARIATION_SIZES,
            Self::DallE3 => &["1024x1024", "1792x1024", "1024x1792"],
            Self::GptImage1 => &["1024x1024", "1536x1024", "1024x1536", "auto"],
        }
    }

    pub fn qualities(&self) -> &'static [&'static str] {
        match self {
            Self::DallE2 => &["standard"],
            Self::DallE3 => &["standard", "hd"],
            Self::GptImage1 => &["low", "medium", "high", "auto"],
        }
    }

    pub fn supports_style(&self) -> bool {
        matches!(self, Self::DallE3)
    }

    pub fn supports_edit(&self) -> bool {
        matches!(self, Self::DallE2 | Self::GptImage1)
    }

    pub fn max_images(&self) -> u8 {
        match self {
            Self::DallE3 => 1,
            _ => MAX_IMAGES_PER_REQUEST,
        }
    }

    /// gpt-image-1 always answers with base64 and rejects `response_format`.
    fn response_format(&self) -> Option<&'static str> {
        match self {
            Self::GptImage1 => None,
            _ => Some("b64_json"),
        }
    }
}

impl FromStr for ImageModel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s.trim())
            .ok_or_else(|| {
                let choices: Vec<&str> = Self::ALL.iter().map(|m| m.as_str()).collect();
                Error::validation_with_context(
                    format!("Invalid model '{}'. Choose from: {}", s, choices.join(", ")),
                    ErrorContext::new().with_field_path("model"),
                )
            })
    }
}

impl std::fmt::Display for ImageModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Knobs shared by generation and editing.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageParams {
    pub model: ImageModel,
    pub prompt: String,
    pub size: Option<String>,
    pub quality: Option<String>,
    pub style: Option<String>,
    pub n: u8,
}

impl ImageParams {
    pub fn new(model: ImageModel, prompt: impl Into<String>) -> Self {
        Self {
            model,
            prompt: prompt.into(),
            size: None,
            quality: None,
            style: None,
            n: 1,
        }
    }

    pub fn with_size(mut self, size: impl Into<String>) -> Self {
        self.size = Some(size.into());
        self
    }

    pub fn with_quality(mut self, quality: impl Into<String>) -> Self {
        self.quality = Some(quality.into());
        self
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }

    pub fn with_n(mut self, n: u8) -> Self {
        self.n = n;
        self
    }

    /// Checks size, quality, style and count against the model, reporting
    /// every problem at once, then checks the prompt length.
    pub fn validate(&self) -> Result<()> {
        let model = self.model;
        let mut problems = Vec::new();

        if let Some(size) = &self.size {
            if !model.sizes().contains(&size.as_str()) {
                problems.push(format!(
                    "Invalid size '{}' for {}. Valid sizes: {}",
                    size,
                    model,
                    model.sizes().join(", ")
                ));
            }
        }
        if let Some(quality) = &self.quality {
            if !model.qualities().contains(&quality.as_str()) {
                problems.push(format!(
                    "Invalid quality '{}' for {}. Valid qualities: {}",
                    quality,
                    model,
                    model.qualities().join(", ")
                ));
            }
        }
        if let Some(style) = &self.style {
            if !model.supports_style() {
                problems.push(format!("Style is not supported by {}", model));
            } else if !STYLES.contains(&style.as_str()) {
                problems.push(format!(
                    "Invalid style '{}'. Valid styles: {}",
                    style,
                    STYLES.join(", ")
                ));
            }
        }
        if self.n == 0 || self.n > model.max_images() {
            problems.push(if model.max_images() == 1 {
                format!("{} only supports n=1", model)
            } else {
                format!("n must be between 1 and {}", model.max_images())
            });
        }

        if !problems.is_empty() {
            return Err(Error::validation_with_context(
                format!("Parameter validation errors:\n{}", problems.join("\n")),
                ErrorContext::new().with_source("image_params"),
            ));
        }

        let chars = self.prompt.chars().count();
        if chars > model.max_prompt_chars() {
            return Err(Error::validation_with_context(
                format!(
                    "Prompt too long for {}. Maximum length: {} characters",
                    model,
                    model.max_prompt_chars()
                ),
                ErrorContext::new()
                    .with_field_path("prompt")
                    .with_details(format!("got {} characters", chars)),
            ));
        }
        Ok(())
    }

    /// JSON body for the generations endpoint.
    pub fn generation_body(&self) -> Value {
        let mut body = json!({
            "model": self.model.as_str(),
            "prompt": self.prompt,
            "n": self.n,
        });
        if let Some(size) = &self.size {
            body["size"] = json!(size);
        }
        if let Some(quality) = &self.quality {
            body["quality"] = json!(quality);
        }
        if let Some(style) = self.style.as_ref().filter(|_| self.model.supports_style()) {
            body["style"] = json!(style);
        }
        if let Some(format) = self.model.response_format() {
            body["response_format"] = json!(format);
        }
        body
    }

    /// Text fields of the multipart edit form.
    pub fn edit_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("model", self.model.as_str().to_string()),
            ("prompt", self.prompt.clone()),
            ("n", self.n.to_string()),
        ];
        if let Some(size) = &self.size {
            fields.push(("size", size.clone()));
        }
        if let Some(quality) = self.quality.as_ref().filter(|_| self.model == ImageModel::GptImage1) {
            fields.push(("quality", quality.clone()));
        }
        if let Some(format) = self.model.response_format() {
            fields.push(("response_format", format.to_string()));
        }
        fields
    }
}

/// An image file to upload.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct EditRequest {
    pub params: ImageParams,
    pub image: Upload,
    pub mask: Option<Upload>,
}

#[derive(Debug, Clone)]
pub struct VariationRequest {
    pub image: Upload,
    pub size: String,
    pub n: u8,
}

/// One image in an API answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratedImage {
    Base64(String),
    Url(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBatch {
    pub images: Vec<GeneratedImage>,
    pub total_tokens: Option<u64>,
}

impl ImageBatch {
    /// Reads `data[*].b64_json` / `data[*].url` and `usage.total_tokens`.
    pub fn from_response(json: &Value) -> Result<Self> {
        let data = json["data"].as_array().ok_or_else(|| Error::Remote {
            status: 200,
            message: "response contained no image data".to_string(),
        })?;

        let images = data
            .iter()
            .enumerate()
            .map(|(i, item)| {
                if let Some(b64) = item["b64_json"].as_str().filter(|s| !s.is_empty()) {
                    Ok(GeneratedImage::Base64(b64.to_string()))
                } else if let Some(url) = item["url"].as_str().filter(|s| !s.is_empty()) {
                    Ok(GeneratedImage::Url(url.to_string()))
                } else {
                    Err(Error::Remote {
                        status: 200,
                        message: format!("no image data found in response for image {}", i + 1),
                    })
                }
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            images,
            total_tokens: json["usage"]["total_tokens"].as_u64(),
        })
    }
}

/// Remote image generation service.
#[async_trait]
pub trait ImageBackend: Send + Sync {
    async fn generate(&self, params: &ImageParams) -> Result<ImageBatch>;

    async fn edit(&self, request: &EditRequest) -> Result<ImageBatch>;

    async fn create_variation(&self, request: &VariationRequest) -> Result<ImageBatch>;

    /// Fetches an image the service returned by URL.
    async fn download(&self, url: &str) -> Result<Vec<u8>>;

    fn name(&self) -> &'static str;
}
