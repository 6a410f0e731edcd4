//! Path resolution and validation for image arguments.
//!
//! Tools accept paths as the agent typed them. Relative paths resolve against
//! an explicit base directory when one is given, otherwise against the
//! process working directory. The cache only ever sees the resolved result.

use std::path::{Component, Path, PathBuf};

/// Extensions accepted by the vision tools (lowercase).
pub const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

/// Why an image path was rejected. Each message is meant to be shown to the
/// agent verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("Error: No image path provided.\n• Suggestion: Pass the path of an existing image file.")]
    Empty,

    #[error(
        "Error: Directory '{}' does not exist.\n• File: '{input}'\n• Suggestion: Check the directory name or use an absolute path.",
        .parent.display()
    )]
    ParentMissing { input: String, parent: PathBuf },

    #[error(
        "Error: Image file '{input}' not found.\n• Resolved path: '{}'\n• Suggestion: Check the file name or use an absolute path.",
        .resolved.display()
    )]
    NotFound { input: String, resolved: PathBuf },

    #[error(
        "Error: '{input}' is not a file.\n• Resolved path: '{}'\n• Suggestion: Point to an image file, not a directory.",
        .resolved.display()
    )]
    NotAFile { input: String, resolved: PathBuf },

    #[error("Error: working_dir must be an absolute path, got: {input}")]
    WorkingDirNotAbsolute { input: String },

    #[error("Error: working_dir does not exist: {input}")]
    WorkingDirMissing { input: String },

    #[error("Error: working_dir is not a directory: {input}")]
    WorkingDirNotADirectory { input: String },
}

/// Resolves `input` to an absolute path without touching the filesystem.
pub fn resolve_path(input: &str, base_dir: Option<&Path>) -> PathBuf {
    let path = Path::new(input);
    if path.is_absolute() {
        return normalize_path(path);
    }
    let joined = match base_dir {
        Some(base) => base.join(path),
        None => std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf()),
    };
    normalize_path(&joined)
}

/// Drops `.` segments and redundant separators. `..` is left as written.
pub fn normalize_path(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// Resolves `input` and checks that it names an existing regular file.
pub fn validate_image_path(input: &str, base_dir: Option<&Path>) -> Result<PathBuf, PathError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(PathError::Empty);
    }

    let resolved = resolve_path(trimmed, base_dir);
    if !resolved.exists() {
        if let Some(parent) = resolved.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                return Err(PathError::ParentMissing {
                    input: trimmed.to_string(),
                    parent: parent.to_path_buf(),
                });
            }
        }
        return Err(PathError::NotFound {
            input: trimmed.to_string(),
            resolved,
        });
    }
    if !resolved.is_file() {
        return Err(PathError::NotAFile {
            input: trimmed.to_string(),
            resolved,
        });
    }
    Ok(resolved)
}

/// Checks the directory that generated files are written under.
pub fn validate_working_dir(input: &str) -> Result<PathBuf, PathError> {
    let path = Path::new(input);
    if !path.is_absolute() {
        return Err(PathError::WorkingDirNotAbsolute {
            input: input.to_string(),
        });
    }
    if !path.exists() {
        return Err(PathError::WorkingDirMissing {
            input: input.to_string(),
        });
    }
    if !path.is_dir() {
        return Err(PathError::WorkingDirNotADirectory {
            input: input.to_string(),
        });
    }
    Ok(normalize_path(path))
}

/// Whether the extension is one the vision API accepts.
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|s| s.eq_ignore_ascii_case(e))
        })
        .unwrap_or(false)
}
