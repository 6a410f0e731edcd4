//! Agent-facing image tools.
//!
//! Every tool returns human-readable text. Vision calls go through the result
//! cache: a repeated question about unchanged image bytes is answered from
//! disk, and any cache trouble simply means the API gets called.

mod analysis;
pub mod generation;

pub use analysis::AnalysisType;
pub use generation::{
    list_generated_images, EditOptions, GenerateOptions, ImageGenerationTools, VariationOptions,
};

use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cache::{self, CacheManager, CacheParams};
use crate::image_info::read_image_info;
use crate::paths::{is_supported_image, validate_image_path, SUPPORTED_EXTENSIONS};
use crate::vision::{VisionBackend, VisionRequest};
use crate::{Error, ErrorContext, Result};

/// Largest image accepted for upload: 20 MiB.
pub const MAX_IMAGE_BYTES: u64 = 20 * 1024 * 1024;

pub const DEFAULT_DESCRIBE_PROMPT: &str = "Please describe this image in detail.";
pub const DEFAULT_COMPARISON_FOCUS: &str = "similarities and differences";

/// Suffix appended to answers served from the cache.
pub const CACHE_HIT_NOTE: &str = "\n\n[Result retrieved from cache]";

/// Shared state for tool invocations.
///
/// The cache is resolved lazily: an injected manager wins, otherwise the
/// process-wide one is created on first use.
pub struct ToolContext {
    backend: Arc<dyn VisionBackend>,
    cache: OnceCell<Arc<CacheManager>>,
    base_dir: Option<PathBuf>,
}

impl ToolContext {
    pub fn new(backend: Arc<dyn VisionBackend>) -> Self {
        Self {
            backend,
            cache: OnceCell::new(),
            base_dir: None,
        }
    }

    pub fn with_cache(self, cache: Arc<CacheManager>) -> Self {
        // A fresh context has an empty cell, so this cannot collide.
        let _ = self.cache.set(cache);
        self
    }

    /// Directory that relative image paths resolve against.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    pub fn cache(&self) -> &Arc<CacheManager> {
        self.cache.get_or_init(cache::global)
    }

    pub fn backend(&self) -> &Arc<dyn VisionBackend> {
        &self.backend
    }

    fn resolve_image(&self, image_path: &str) -> Result<PathBuf> {
        let resolved = validate_image_path(image_path, self.base_dir.as_deref())?;
        if !is_supported_image(&resolved) {
            return Err(Error::validation_with_context(
                format!(
                    "Unsupported image format for analysis. File: '{}'. Supported formats: {}",
                    image_path,
                    SUPPORTED_EXTENSIONS.join(", ").to_uppercase()
                ),
                ErrorContext::new()
                    .with_field_path("image_path")
                    .with_details("convert the image to a supported format"),
            ));
        }
        Ok(resolved)
    }
}

pub struct ImageTools {
    ctx: ToolContext,
}

impl ImageTools {
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &ToolContext {
        &self.ctx
    }

    /// Describes an image, with an optional custom prompt.
    pub async fn describe_image(&self, image_path: &str, prompt: Option<&str>) -> Result<String> {
        let resolved = self.ctx.resolve_image(image_path)?;
        let prompt = prompt.unwrap_or(DEFAULT_DESCRIBE_PROMPT);
        let params = CacheParams::new().with("prompt", prompt);
        self.analyze_with_cache(&resolved, prompt, "describe", &params)
            .await
    }

    /// Runs one of the canned [`AnalysisType`] prompts against an image.
    pub async fn analyze_image_content(
        &self,
        image_path: &str,
        analysis_type: &str,
    ) -> Result<String> {
        let kind: AnalysisType = analysis_type.parse()?;
        let resolved = self.ctx.resolve_image(image_path)?;
        let params = CacheParams::new()
            .with("analysis_type", kind.as_str())
            .with("prompt", kind.prompt());
        self.analyze_with_cache(&resolved, kind.prompt(), "analyze", &params)
            .await
    }

    /// Describes both images with the same focus and lays the answers side by side.
    pub async fn compare_images(
        &self,
        first_path: &str,
        second_path: &str,
        focus: Option<&str>,
    ) -> Result<String> {
        let focus = focus.unwrap_or(DEFAULT_COMPARISON_FOCUS);
        let prompt = format!("Describe this image focusing on {}.", focus);
        let first = self.describe_image(first_path, Some(&prompt)).await?;
        let second = self.describe_image(second_path, Some(&prompt)).await?;
        Ok(format!(
            "Image Comparison - Focus: {focus}\n\n=== First Image ({first_path}) ===\n{first}\n\n=== Second Image ({second_path}) ===\n{second}"
        ))
    }

    /// Technical facts about an image file. Never cached.
    pub fn get_image_metadata(&self, image_path: &str) -> Result<String> {
        let resolved = validate_image_path(image_path, self.ctx.base_dir.as_deref())?;
        let info = read_image_info(&resolved)?;
        let size = info.byte_size;
        let extension = resolved
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let parent = resolved
            .parent()
            .map(|p| p.display().to_string())
            .unwrap_or_default();

        Ok(format!(
            "Image Metadata for '{image_path}':\n\n\
             File Information:\n\
             - File size: {} bytes ({:.2} MB)\n\
             - Format: {}\n\
             - Dimensions: {} x {} pixels\n\
             - Color mode: {}\n\
             - Aspect ratio: {:.2}\n\
             - Total pixels: {}\n\n\
             Path Information:\n\
             - Absolute path: {}\n\
             - File extension: {}\n\
             - Parent directory: {}\n",
            group_thousands(size),
            size as f64 / 1024.0 / 1024.0,
            info.format,
            info.width,
            info.height,
            info.color_mode,
            info.aspect_ratio(),
            group_thousands(info.total_pixels()),
            resolved.display(),
            extension,
            parent,
        ))
    }

    /// Cache location, size, and this process's hit/miss counters.
    pub fn get_cache_info(&self) -> Result<String> {
        let cache = self.ctx.cache();
        let stats = cache.stats()?;
        let counters = cache.counters();
        Ok(format!(
            "Image Analysis Cache Information:\n\n\
             Cache Directory: {}\n\
             Number of cached files: {}\n\
             Total cache size: {} MB ({} bytes)\n\
             Session: {} hits, {} misses ({:.0}% hit ratio)\n\n\
             Cache Features:\n\
             - Automatic file change detection using SHA-256 hashes\n\
             - 30-day cache expiration\n\
             - Non-blocking cache operations (failures don't affect main functionality)\n",
            stats.directory.display(),
            stats.file_count,
            stats.total_size_mb(),
            group_thousands(stats.total_bytes),
            counters.hits,
            counters.misses,
            counters.hit_ratio() * 100.0,
        ))
    }

    pub fn clear_image_cache(&self) -> String {
        let removed = self.ctx.cache().clear();
        format!(
            "Successfully cleared image analysis cache. Removed {} cached files.",
            removed
        )
    }

    async fn analyze_with_cache(
        &self,
        resolved: &Path,
        prompt: &str,
        operation: &str,
        params: &CacheParams,
    ) -> Result<String> {
        let cache = self.ctx.cache();
        if let Some(cached) = cache
            .get(resolved, operation, params)
            .filter(|r| !r.is_empty())
        {
            return Ok(format!("{}{}", cached, CACHE_HIT_NOTE));
        }

        let info = read_image_info(resolved)?;
        if info.byte_size > MAX_IMAGE_BYTES {
            return Err(Error::validation_with_context(
                format!(
                    "Image file is too large ({} bytes). Maximum size is {} bytes.",
                    group_thousands(info.byte_size),
                    group_thousands(MAX_IMAGE_BYTES)
                ),
                ErrorContext::new().with_field_path("image_path"),
            ));
        }

        let bytes = tokio::fs::read(resolved).await?;
        let request = VisionRequest::new(prompt, info.format, &bytes);
        let description = self.ctx.backend.describe(&request).await?;

        let name = resolved
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let result = format!(
            "Image Analysis for '{}':\n\nImage Info: {}x{} pixels, {} format\n\nDescription:\n{}",
            name, info.width, info.height, info.format, description
        );

        cache.put(resolved, operation, params, &result);
        Ok(result)
    }
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use crate::image_info::fixtures;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct ScriptedVision {
        calls: AtomicUsize,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl VisionBackend for ScriptedVision {
        async fn describe(&self, request: &VisionRequest) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.prompts.lock().unwrap().push(request.prompt.clone());
            Ok(format!("answer #{n}"))
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    struct Harness {
        dir: tempfile::TempDir,
        vision: Arc<ScriptedVision>,
        tools: ImageTools,
    }

    fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let vision = Arc::new(ScriptedVision::default());
        let cache = Arc::new(CacheManager::from_config(
            &CacheConfig::new().with_cache_dir(dir.path().join("cache")),
        ));
        let ctx = ToolContext::new(vision.clone())
            .with_cache(cache)
            .with_base_dir(dir.path());
        std::fs::write(dir.path().join("a.png"), fixtures::png(4, 2)).unwrap();
        std::fs::write(dir.path().join("b.gif"), fixtures::gif(8, 8)).unwrap();
        Harness {
            dir,
            vision,
            tools: ImageTools::new(ctx),
        }
    }

    #[tokio::test]
    async fn second_describe_is_served_from_cache() {
        let h = harness();
        let first = h.tools.describe_image("a.png", None).await.unwrap();
        assert!(first.starts_with("Image Analysis for 'a.png'"));
        assert!(first.contains("4x2 pixels, PNG format"));
        assert!(first.ends_with("answer #1"));

        let second = h.tools.describe_image("a.png", None).await.unwrap();
        assert_eq!(second, format!("{first}{CACHE_HIT_NOTE}"));
        assert_eq!(h.vision.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_prompt_calls_again() {
        let h = harness();
        h.tools.describe_image("a.png", Some("one")).await.unwrap();
        h.tools.describe_image("a.png", Some("two")).await.unwrap();
        assert_eq!(h.vision.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn analyze_uses_canned_prompt() {
        let h = harness();
        h.tools.analyze_image_content("a.png", "text").await.unwrap();
        assert_eq!(
            h.vision.prompts.lock().unwrap().as_slice(),
            &[AnalysisType::Text.prompt().to_string()]
        );
    }

    #[tokio::test]
    async fn analyze_rejects_unknown_type_before_io() {
        let h = harness();
        let err = h
            .tools
            .analyze_image_content("missing.png", "vibes")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[tokio::test]
    async fn unsupported_extension() {
        let h = harness();
        std::fs::write(h.dir.path().join("a.bmp"), b"BM").unwrap();
        let err = h.tools.describe_image("a.bmp", None).await.unwrap_err();
        assert!(err.to_string().contains("Unsupported image format"));
        assert_eq!(h.vision.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_image_is_path_error() {
        let h = harness();
        let err = h.tools.describe_image("nope.png", None).await.unwrap_err();
        assert!(matches!(err, Error::Path(_)));
    }

    #[tokio::test]
    async fn compare_formats_both_sections() {
        let h = harness();
        let out = h
            .tools
            .compare_images("a.png", "b.gif", Some("colors"))
            .await
            .unwrap();
        assert!(out.starts_with("Image Comparison - Focus: colors"));
        assert!(out.contains("=== First Image (a.png) ==="));
        assert!(out.contains("=== Second Image (b.gif) ==="));
        assert!(h
            .vision
            .prompts
            .lock()
            .unwrap()
            .iter()
            .all(|p| p == "Describe this image focusing on colors."));
    }

    #[test]
    fn metadata_report() {
        let h = harness();
        let out = h.tools.get_image_metadata("a.png").unwrap();
        assert!(out.contains("- Dimensions: 4 x 2 pixels"));
        assert!(out.contains("- Aspect ratio: 2.00"));
        assert!(out.contains("- Color mode: RGBA"));
        assert!(out.contains("- File extension: .png"));
    }

    #[tokio::test]
    async fn cache_info_and_clear() {
        let h = harness();
        h.tools.describe_image("a.png", None).await.unwrap();
        let info = h.tools.get_cache_info().unwrap();
        assert!(info.contains("Number of cached files: 1"));
        assert_eq!(
            h.tools.clear_image_cache(),
            "Successfully cleared image analysis cache. Removed 1 cached files."
        );
        assert!(h
            .tools
            .get_cache_info()
            .unwrap()
            .contains("Number of cached files: 0"));
    }

    #[test]
    fn thousands_grouping() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1000), "1,000");
        assert_eq!(group_thousands(20_971_520), "20,971,520");
    }
}
