//! # ai-vision-tools
//!
//! Agent tool layer for vision models over local image files, backed by a
//! persistent content-addressed result cache.
//!
//! ## Overview
//!
//! An agent hands the tools a path and a question. The tools validate the
//! path, consult the cache, and only on a miss read the image and call the
//! remote vision API. Answers are cached by (file path, operation, parameters)
//! and stay valid while the file bytes are unchanged, for up to 30 days.
//! A second tool set generates, edits and varies images into a working
//! directory; those calls are never cached.
//!
//! ## Core Guarantees
//!
//! - **Content-addressed**: a changed image never gets a stale answer
//! - **Failure-isolated**: cache trouble degrades to "call the API", never to an error
//! - **Crash-safe**: records are written to a temp file and renamed into place
//! - **Shared**: one cache per process, safe to use from concurrent tasks
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ai_vision_tools::tools::{ImageTools, ToolContext};
//! use ai_vision_tools::vision::OpenAiVision;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> ai_vision_tools::Result<()> {
//!     let backend = Arc::new(OpenAiVision::from_env()?);
//!     let tools = ImageTools::new(ToolContext::new(backend));
//!
//!     let answer = tools.describe_image("photos/cat.jpg", None).await?;
//!     println!("{answer}");
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`cache`] | Result cache: hashing, keys, record store, facade |
//! | [`tools`] | Describe/analyze/compare/metadata/cache tools, image generation |
//! | [`vision`] | Vision and image backends, OpenAI-compatible client |
//! | [`paths`] | Image path resolution and validation |
//! | [`image_info`] | Format, dimensions and color mode from file headers |

pub mod cache;
pub mod image_info;
pub mod paths;
pub mod tools;
pub mod vision;

pub use cache::{CacheConfig, CacheManager, CacheParams};
pub use tools::{AnalysisType, ImageGenerationTools, ImageTools, ToolContext};
pub use vision::{
    ImageBackend, ImageModel, OpenAiVision, VisionBackend, VisionConfig, VisionRequest,
};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
