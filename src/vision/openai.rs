//! OpenAI-compatible backend: chat-completions for vision, plus the image
//! generation, edit and variation endpoints.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde_json::{json, Value};
use std::time::Instant;
use tracing::info;

use super::config::VisionConfig;
use super::images::{
    EditRequest, ImageBackend, ImageBatch, ImageModel, ImageParams, Upload, VariationRequest,
};
use super::{VisionBackend, VisionRequest};
use crate::{Error, Result};

pub struct OpenAiVision {
    client: reqwest::Client,
    config: VisionConfig,
}

impl OpenAiVision {
    pub fn new(config: VisionConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, config })
    }

    /// Builds a backend from [`VisionConfig::from_env`]. Fails when no API
    /// key is configured.
    pub fn from_env() -> Result<Self> {
        Self::new(VisionConfig::from_env()?)
    }

    pub fn config(&self) -> &VisionConfig {
        &self.config
    }

    fn request_body(&self, request: &VisionRequest) -> serde_json::Value {
        json!({
            "model": self.config.model,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": request.prompt },
                    { "type": "image_url", "image_url": { "url": request.data_url() } }
                ]
            }],
            "max_tokens": self.config.max_tokens,
        })
    }

    /// Sends an authenticated request and returns the JSON body of a 2xx
    /// answer. Anything else becomes [`Error::Remote`].
    async fn send_json(
        &self,
        request: reqwest::RequestBuilder,
        operation: &'static str,
    ) -> Result<Value> {
        let client_request_id = uuid::Uuid::new_v4().to_string();
        let start = Instant::now();

        let resp = request
            .bearer_auth(&self.config.api_key)
            .header("x-request-id", client_request_id.as_str())
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            info!(
                operation,
                http_status = status,
                client_request_id = client_request_id.as_str(),
                duration_ms = start.elapsed().as_millis(),
                "vision request failed"
            );
            return Err(Error::Remote {
                status,
                message: remote_error_message(&body),
            });
        }

        let json: Value = resp.json().await?;
        info!(
            operation,
            http_status = status,
            client_request_id = client_request_id.as_str(),
            duration_ms = start.elapsed().as_millis(),
            "vision request completed"
        );
        Ok(json)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url, path)
    }
}

#[async_trait]
impl VisionBackend for OpenAiVision {
    async fn describe(&self, request: &VisionRequest) -> Result<String> {
        let builder = self
            .client
            .post(self.endpoint("chat/completions"))
            .json(&self.request_body(request));
        let json = self.send_json(builder, "describe").await?;

        json["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::Remote {
                status: 200,
                message: "response contained no message content".to_string(),
            })
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

fn upload_part(upload: &Upload) -> Result<Part> {
    Ok(Part::bytes(upload.bytes.clone())
        .file_name(upload.file_name.clone())
        .mime_str(&upload.mime)?)
}

#[async_trait]
impl ImageBackend for OpenAiVision {
    async fn generate(&self, params: &ImageParams) -> Result<ImageBatch> {
        let builder = self
            .client
            .post(self.endpoint("images/generations"))
            .json(&params.generation_body());
        let json = self.send_json(builder, "generate").await?;
        ImageBatch::from_response(&json)
    }

    async fn edit(&self, request: &EditRequest) -> Result<ImageBatch> {
        let mut form = Form::new().part("image", upload_part(&request.image)?);
        if let Some(mask) = &request.mask {
            form = form.part("mask", upload_part(mask)?);
        }
        for (name, value) in request.params.edit_fields() {
            form = form.text(name, value);
        }
        let builder = self
            .client
            .post(self.endpoint("images/edits"))
            .multipart(form);
        let json = self.send_json(builder, "edit").await?;
        ImageBatch::from_response(&json)
    }

    async fn create_variation(&self, request: &VariationRequest) -> Result<ImageBatch> {
        let form = Form::new()
            .part("image", upload_part(&request.image)?)
            .text("model", ImageModel::DallE2.as_str())
            .text("n", request.n.to_string())
            .text("size", request.size.clone())
            .text("response_format", "b64_json");
        let builder = self
            .client
            .post(self.endpoint("images/variations"))
            .multipart(form);
        let json = self.send_json(builder, "variation").await?;
        ImageBatch::from_response(&json)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            return Err(Error::Remote {
                status,
                message: format!("failed to download image from {}", url),
            });
        }
        Ok(resp.bytes().await?.to_vec())
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Pulls `error.message` out of an OpenAI-style error body, falling back to
/// the raw body.
fn remote_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_info::ImageFormat;

    #[test]
    fn body_carries_prompt_image_and_limits() {
        let backend = OpenAiVision::new(VisionConfig::new("k").with_max_tokens(42)).unwrap();
        let req = VisionRequest::new("What is this?", ImageFormat::Png, b"\x89PNG");
        let body = backend.request_body(&req);
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["max_tokens"], 42);
        let content = &body["messages"][0]["content"];
        assert_eq!(content[0]["text"], "What is this?");
        assert!(content[1]["image_url"]["url"]
            .as_str()
            .unwrap()
            .starts_with("data:image/png;base64,"));
    }

    #[test]
    fn error_message_extraction() {
        assert_eq!(
            remote_error_message(r#"{"error":{"message":"Invalid API key"}}"#),
            "Invalid API key"
        );
        assert_eq!(remote_error_message("  bad gateway \n"), "bad gateway");
    }
}
