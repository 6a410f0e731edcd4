//! Image generation tools: generate, edit, vary, and list what was produced.
//!
//! Every tool writes into a directory under an absolute `working_dir` and
//! reports the saved paths. Nothing here goes through the result cache.

use base64::Engine;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cache::unix_now;
use crate::image_info::{read_image_info, ImageFormat};
use crate::paths::{
    is_supported_image, normalize_path, resolve_path, validate_image_path, validate_working_dir,
    SUPPORTED_EXTENSIONS,
};
use crate::vision::images::{
    EditRequest, GeneratedImage, ImageBackend, ImageBatch, ImageModel, ImageParams, Upload,
    VariationRequest, MAX_IMAGES_PER_REQUEST, VARIATION_SIZES,
};
use crate::{Error, ErrorContext, Result};

use super::group_thousands;

/// Largest source image the variations endpoint accepts: 4 MiB.
pub const MAX_VARIATION_BYTES: u64 = 4 * 1024 * 1024;

pub const DEFAULT_GENERATED_DIR: &str = "generated_images";

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub model: ImageModel,
    pub size: Option<String>,
    pub quality: Option<String>,
    pub style: Option<String>,
    pub n: u8,
    pub output_dir: String,
    pub filename_prefix: String,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            model: ImageModel::DallE3,
            size: None,
            quality: None,
            style: None,
            n: 1,
            output_dir: DEFAULT_GENERATED_DIR.to_string(),
            filename_prefix: "generated".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EditOptions {
    pub model: ImageModel,
    pub mask_path: Option<String>,
    pub size: Option<String>,
    pub quality: Option<String>,
    pub n: u8,
    pub output_dir: String,
    pub filename_prefix: String,
}

impl Default for EditOptions {
    fn default() -> Self {
        Self {
            model: ImageModel::GptImage1,
            mask_path: None,
            size: None,
            quality: None,
            n: 1,
            output_dir: "edited_images".to_string(),
            filename_prefix: "edited".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VariationOptions {
    pub n: u8,
    pub size: String,
    pub output_dir: String,
    pub filename_prefix: String,
}

impl Default for VariationOptions {
    fn default() -> Self {
        Self {
            n: 2,
            size: "1024x1024".to_string(),
            output_dir: "image_variations".to_string(),
            filename_prefix: "variation".to_string(),
        }
    }
}

pub struct ImageGenerationTools {
    backend: Arc<dyn ImageBackend>,
}

impl ImageGenerationTools {
    pub fn new(backend: Arc<dyn ImageBackend>) -> Self {
        Self { backend }
    }

    /// Generates images from a text prompt and saves them as PNG files.
    pub async fn generate_image(
        &self,
        working_dir: &str,
        prompt: &str,
        opts: &GenerateOptions,
    ) -> Result<String> {
        let working = validate_working_dir(working_dir)?;
        let params = ImageParams {
            model: opts.model,
            prompt: prompt.to_string(),
            size: opts.size.clone(),
            quality: opts.quality.clone(),
            style: opts.style.clone(),
            n: opts.n,
        };
        params.validate()?;

        let output = prepare_output_dir(&working, &opts.output_dir).await?;
        let batch = self.backend.generate(&params).await?;
        let saved = self.save_batch(&batch, &output, &opts.filename_prefix).await?;

        let mut out = format!(
            "Successfully generated {} image(s) using {}\n\nPrompt: {}\nParameters: {}\n\nGenerated files:\n",
            saved.len(),
            params.model,
            prompt,
            describe_params(&params)
        );
        push_file_list(&mut out, &saved);
        if let Some(tokens) = batch.total_tokens {
            out.push_str(&format!("\nToken usage: {} total tokens", tokens));
        }
        Ok(out)
    }

    /// Edits an existing image, optionally restricted to the transparent
    /// areas of a PNG mask.
    pub async fn edit_image(
        &self,
        working_dir: &str,
        image_path: &str,
        prompt: &str,
        opts: &EditOptions,
    ) -> Result<String> {
        if !opts.model.supports_edit() {
            return Err(Error::validation_with_context(
                "Image editing only supports 'gpt-image-1' and 'dall-e-2' models",
                ErrorContext::new()
                    .with_field_path("model")
                    .with_details(format!("got '{}'", opts.model)),
            ));
        }
        let params = ImageParams {
            model: opts.model,
            prompt: prompt.to_string(),
            size: opts.size.clone(),
            quality: opts.quality.clone(),
            style: None,
            n: opts.n,
        };
        params.validate()?;

        let working = validate_working_dir(working_dir)?;
        let resolved = validate_image_path(image_path, Some(&working))?;
        if !is_supported_image(&resolved) {
            return Err(unsupported_format(image_path));
        }
        let image = upload_from(&resolved).await?;

        let mask = match &opts.mask_path {
            Some(mask_path) => {
                let resolved_mask = resolve_path(mask_path, Some(&working));
                if !resolved_mask.is_file() {
                    return Err(Error::validation_with_context(
                        format!("Mask file '{}' not found", mask_path),
                        ErrorContext::new().with_field_path("mask_path"),
                    ));
                }
                if !has_png_extension(&resolved_mask) {
                    return Err(Error::validation_with_context(
                        "Mask must be a PNG file",
                        ErrorContext::new().with_field_path("mask_path"),
                    ));
                }
                Some(upload_from(&resolved_mask).await?)
            }
            None => None,
        };

        let output = prepare_output_dir(&working, &opts.output_dir).await?;
        let request = EditRequest {
            params,
            image,
            mask,
        };
        let batch = self.backend.edit(&request).await?;
        let saved = self.save_batch(&batch, &output, &opts.filename_prefix).await?;

        let mut out = format!(
            "Successfully edited image using {}\n\nOriginal image: {}\n",
            request.params.model, image_path
        );
        if let Some(mask_path) = &opts.mask_path {
            out.push_str(&format!("Mask image: {}\n", mask_path));
        }
        out.push_str(&format!(
            "Edit prompt: {}\nParameters: {}\n\nEdited files:\n",
            prompt,
            describe_params(&request.params)
        ));
        push_file_list(&mut out, &saved);
        Ok(out)
    }

    /// Creates variations of a square PNG of at most 4 MiB.
    pub async fn create_image_variations(
        &self,
        working_dir: &str,
        image_path: &str,
        opts: &VariationOptions,
    ) -> Result<String> {
        if opts.n == 0 || opts.n > MAX_IMAGES_PER_REQUEST {
            return Err(Error::validation_with_context(
                format!(
                    "Number of variations (n) must be between 1 and {}",
                    MAX_IMAGES_PER_REQUEST
                ),
                ErrorContext::new().with_field_path("n"),
            ));
        }
        if !VARIATION_SIZES.contains(&opts.size.as_str()) {
            return Err(Error::validation_with_context(
                format!(
                    "Invalid size '{}'. Must be one of: {}",
                    opts.size,
                    VARIATION_SIZES.join(", ")
                ),
                ErrorContext::new().with_field_path("size"),
            ));
        }

        let working = validate_working_dir(working_dir)?;
        let resolved = validate_image_path(image_path, Some(&working))?;
        if !has_png_extension(&resolved) {
            let current = resolved
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy().to_uppercase()))
                .unwrap_or_default();
            return Err(Error::validation_with_context(
                format!(
                    "Unsupported format for image variations.\n• File: '{}'\n• Current format: {}\n• Required format: PNG\n• Suggestion: Convert the image to PNG format using an image editor.",
                    image_path, current
                ),
                ErrorContext::new().with_field_path("image_path"),
            ));
        }

        let info = read_image_info(&resolved)?;
        if info.byte_size > MAX_VARIATION_BYTES {
            return Err(Error::validation_with_context(
                format!(
                    "Image file too large for variations.\n• File: '{}'\n• Current size: {} bytes ({:.1} MB)\n• Maximum size: {} bytes (4.0 MB)\n• Suggestion: Compress or resize the image to reduce file size.",
                    image_path,
                    group_thousands(info.byte_size),
                    info.byte_size as f64 / 1024.0 / 1024.0,
                    group_thousands(MAX_VARIATION_BYTES)
                ),
                ErrorContext::new().with_field_path("image_path"),
            ));
        }
        if info.width != info.height {
            return Err(Error::validation_with_context(
                format!(
                    "Image must be square for variations.\n• File: '{}'\n• Current dimensions: {}x{} pixels\n• Required: Square dimensions (width = height)\n• Suggestion: Crop or resize the image to make it square (e.g., 1024x1024).",
                    image_path, info.width, info.height
                ),
                ErrorContext::new().with_field_path("image_path"),
            ));
        }

        let output = prepare_output_dir(&working, &opts.output_dir).await?;
        let request = VariationRequest {
            image: upload_from(&resolved).await?,
            size: opts.size.clone(),
            n: opts.n,
        };
        let batch = self.backend.create_variation(&request).await?;
        let saved = self.save_batch(&batch, &output, &opts.filename_prefix).await?;

        let mut out = format!(
            "Successfully created {} variation(s) of the source image\n\nSource image: {}\nParameters: n={}, size={}\n\nGenerated variations:\n",
            saved.len(),
            image_path,
            opts.n,
            opts.size
        );
        push_file_list(&mut out, &saved);
        Ok(out)
    }

    /// Writes every image of `batch` as `{prefix}_{unix secs}_{n}.png`.
    async fn save_batch(
        &self,
        batch: &ImageBatch,
        output: &Path,
        prefix: &str,
    ) -> Result<Vec<PathBuf>> {
        let timestamp = unix_now() as u64;
        let mut saved = Vec::with_capacity(batch.images.len());
        for (i, image) in batch.images.iter().enumerate() {
            let bytes = match image {
                GeneratedImage::Base64(b64) => {
                    base64::engine::general_purpose::STANDARD.decode(b64.trim())?
                }
                GeneratedImage::Url(url) => self.backend.download(url).await?,
            };
            let path = output.join(format!("{}_{}_{}.png", prefix, timestamp, i + 1));
            tokio::fs::write(&path, &bytes).await?;
            tracing::debug!(path = %path.display(), bytes = bytes.len(), "saved generated image");
            saved.push(path);
        }
        Ok(saved)
    }
}

/// Lists image files under `working_dir/directory`, newest first.
///
/// A missing or empty directory is reported in the returned text rather than
/// as an error.
pub fn list_generated_images(working_dir: &str, directory: &str) -> Result<String> {
    let working = validate_working_dir(working_dir)?;
    let dir = normalize_path(&working.join(directory));
    if !dir.exists() {
        return Ok(format!("Directory '{}' does not exist", directory));
    }
    if !dir.is_dir() {
        return Ok(format!("'{}' is not a directory", directory));
    }

    let mut images = Vec::new();
    for entry in std::fs::read_dir(&dir)? {
        let entry = entry?;
        let path = entry.path();
        let meta = entry.metadata()?;
        if meta.is_file() && is_supported_image(&path) {
            let modified = meta.modified().ok();
            images.push((path, meta.len(), modified));
        }
    }
    if images.is_empty() {
        return Ok(format!("No image files found in '{}'", directory));
    }
    images.sort_by(|a, b| b.2.cmp(&a.2));

    let mut out = format!(
        "Generated Images in '{}':\nFound {} image file(s)\n\n",
        directory,
        images.len()
    );
    for (i, (path, size, modified)) in images.iter().enumerate() {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        out.push_str(&format!("{}. {}\n", i + 1, name));
        out.push_str(&format!("   Path: {}\n", path.display()));
        out.push_str(&format!(
            "   Size: {} bytes ({:.2} MB)\n",
            group_thousands(*size),
            *size as f64 / 1024.0 / 1024.0
        ));
        if let Some(modified) = modified {
            let local: chrono::DateTime<chrono::Local> = (*modified).into();
            out.push_str(&format!("   Modified: {}\n", local.format("%Y-%m-%d %H:%M:%S")));
        }
        if let Ok(info) = read_image_info(path) {
            out.push_str(&format!(
                "   Dimensions: {}x{} pixels\n   Format: {}\n",
                info.width, info.height, info.format
            ));
        }
        out.push('\n');
    }
    Ok(out)
}

async fn prepare_output_dir(working: &Path, output_dir: &str) -> Result<PathBuf> {
    let output = normalize_path(&working.join(output_dir));
    tokio::fs::create_dir_all(&output).await?;
    Ok(output)
}

async fn upload_from(path: &Path) -> Result<Upload> {
    let format = read_image_info(path)
        .map(|info| info.format)
        .unwrap_or(ImageFormat::Png);
    Ok(Upload {
        file_name: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image.png".to_string()),
        mime: format!("image/{}", format.mime_subtype()),
        bytes: tokio::fs::read(path).await?,
    })
}

fn has_png_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("png"))
        .unwrap_or(false)
}

fn unsupported_format(image_path: &str) -> Error {
    Error::validation_with_context(
        format!(
            "Unsupported image format.\n• File: '{}'\n• Supported formats: {}\n• Suggestion: Convert the image to a supported format or use a different image file.",
            image_path,
            SUPPORTED_EXTENSIONS.join(", ").to_uppercase()
        ),
        ErrorContext::new().with_field_path("image_path"),
    )
}

fn describe_params(params: &ImageParams) -> String {
    let mut out = format!("model={}", params.model);
    if let Some(size) = &params.size {
        out.push_str(&format!(", size={}", size));
    }
    if let Some(quality) = &params.quality {
        out.push_str(&format!(", quality={}", quality));
    }
    if let Some(style) = &params.style {
        out.push_str(&format!(", style={}", style));
    }
    out.push_str(&format!(", n={}", params.n));
    out
}

fn push_file_list(out: &mut String, files: &[PathBuf]) {
    for file in files {
        out.push_str(&format!("- {}\n", file.display()));
    }
}
