//! ai-vision-cli - run the image tools from a shell
//!
//! Usage:
//!   ai-vision-cli describe <image> [prompt]          Describe an image
//!   ai-vision-cli analyze <image> [type]             Targeted analysis (general, objects, ...)
//!   ai-vision-cli compare <image1> <image2> [focus]  Compare two images
//!   ai-vision-cli metadata <image>                   Show image metadata
//!   ai-vision-cli cache-info                         Show cache statistics
//!   ai-vision-cli cache-clear                        Remove all cached results
//!   ai-vision-cli generate <working_dir> <prompt> [model]
//!   ai-vision-cli edit <working_dir> <image> <prompt> [mask]
//!   ai-vision-cli variations <working_dir> <image> [n]
//!   ai-vision-cli list-generated <working_dir> [directory]

use ai_vision_tools::tools::{
    list_generated_images, EditOptions, GenerateOptions, ImageGenerationTools, ImageTools,
    ToolContext, VariationOptions,
};
use ai_vision_tools::vision::OpenAiVision;
use ai_vision_tools::{cache, VisionBackend, VisionRequest};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let rest = &args[2..];
    let output = match args[1].as_str() {
        "describe" => {
            let image = required(rest, 0, "<image>")?;
            vision_tools()?
                .describe_image(image, rest.get(1).map(String::as_str))
                .await
        }
        "analyze" => {
            let image = required(rest, 0, "<image>")?;
            let kind = rest.get(1).map(String::as_str).unwrap_or("general");
            vision_tools()?.analyze_image_content(image, kind).await
        }
        "compare" => {
            let first = required(rest, 0, "<image1>")?;
            let second = required(rest, 1, "<image2>")?;
            vision_tools()?
                .compare_images(first, second, rest.get(2).map(String::as_str))
                .await
        }
        "metadata" => {
            let image = required(rest, 0, "<image>")?;
            offline_tools().get_image_metadata(image)
        }
        "generate" => {
            let working_dir = required(rest, 0, "<working_dir>")?;
            let prompt = required(rest, 1, "<prompt>")?;
            let mut opts = GenerateOptions::default();
            if let Some(model) = rest.get(2) {
                opts.model = model.parse()?;
            }
            generation_tools()?
                .generate_image(working_dir, prompt, &opts)
                .await
        }
        "edit" => {
            let working_dir = required(rest, 0, "<working_dir>")?;
            let image = required(rest, 1, "<image>")?;
            let prompt = required(rest, 2, "<prompt>")?;
            let opts = EditOptions {
                mask_path: rest.get(3).cloned(),
                ..Default::default()
            };
            generation_tools()?
                .edit_image(working_dir, image, prompt, &opts)
                .await
        }
        "variations" => {
            let working_dir = required(rest, 0, "<working_dir>")?;
            let image = required(rest, 1, "<image>")?;
            let mut opts = VariationOptions::default();
            if let Some(n) = rest.get(2) {
                opts.n = n.parse()?;
            }
            generation_tools()?
                .create_image_variations(working_dir, image, &opts)
                .await
        }
        "list-generated" => {
            let working_dir = required(rest, 0, "<working_dir>")?;
            let directory = rest
                .get(1)
                .map(String::as_str)
                .unwrap_or("generated_images");
            list_generated_images(working_dir, directory)
        }
        "cache-info" => offline_tools().get_cache_info(),
        "cache-clear" => Ok(offline_tools().clear_image_cache()),
        "version" | "--version" | "-V" => {
            println!("ai-vision-cli {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        "help" | "--help" | "-h" => {
            print_usage();
            return Ok(());
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    };

    match output {
        Ok(text) => {
            println!("{text}");
            Ok(())
        }
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(2);
        }
    }
}

fn print_usage() {
    println!(
        r#"ai-vision-cli - image tools with a persistent result cache

USAGE:
    ai-vision-cli <COMMAND> [ARGS]

COMMANDS:
    describe <image> [prompt]           Describe an image
    analyze <image> [type]              general | objects | text | colors | composition | emotions
    compare <image1> <image2> [focus]   Compare two images
    metadata <image>                    Show image metadata (no API call)
    cache-info                          Show cache statistics
    cache-clear                         Remove all cached results
    generate <dir> <prompt> [model]     Generate images (dall-e-2 | dall-e-3 | gpt-image-1)
    edit <dir> <image> <prompt> [mask]  Edit an image, optionally with a PNG mask
    variations <dir> <image> [n]        Variations of a square PNG (dall-e-2)
    list-generated <dir> [subdir]       List generated images, newest first
    version                             Show version information
    help                                Show this help message

ENVIRONMENT:
    OPENAI_API_KEY                      API key for the vision backend
    AI_VISION_MODEL                     Model name (default gpt-4o)
    AI_VISION_CACHE_DIR                 Cache directory override
    AI_VISION_CACHE_DISABLED            Set to 1 to bypass the cache
    RUST_LOG                            Log filter (e.g. ai_vision_tools=debug)"#
    );
}

fn required<'a>(args: &'a [String], idx: usize, name: &str) -> anyhow::Result<&'a str> {
    args.get(idx)
        .map(String::as_str)
        .ok_or_else(|| anyhow::anyhow!("missing argument {name}"))
}

fn vision_tools() -> anyhow::Result<ImageTools> {
    let backend = OpenAiVision::from_env()?;
    Ok(ImageTools::new(
        ToolContext::new(Arc::new(backend)).with_cache(cache::global()),
    ))
}

fn generation_tools() -> anyhow::Result<ImageGenerationTools> {
    Ok(ImageGenerationTools::new(Arc::new(OpenAiVision::from_env()?)))
}

/// Tools for commands that never reach the vision API, so no key is needed.
fn offline_tools() -> ImageTools {
    ImageTools::new(ToolContext::new(Arc::new(Offline)).with_cache(cache::global()))
}

struct Offline;

#[async_trait::async_trait]
impl VisionBackend for Offline {
    async fn describe(&self, _: &VisionRequest) -> ai_vision_tools::Result<String> {
        Err(ai_vision_tools::Error::configuration_with_context(
            "vision backend not configured for this command",
            ai_vision_tools::ErrorContext::new().with_source("ai-vision-cli"),
        ))
    }

    fn name(&self) -> &'static str {
        "offline"
    }
}
