//! Path utilities for export artifacts

use crate::error::{RangeCropError, RangeCropResult};
use std::path::{Path, PathBuf};

/// Subfolder receiving cropped artifacts
pub const CROPPED_DIR: &str = "cropped";
/// Subfolder receiving uncropped artifacts
pub const UNCROPPED_DIR: &str = "uncropped";
/// Marker inserted before the extension of in-progress files
const PARTIAL_MARKER: &str = "partial";

/// Path helpers for the export output layout
pub struct PathUtils;

impl PathUtils {
    /// Directory for cropped or uncropped artifacts under `output`
    pub fn artifact_dir(output: &Path, cropped: bool) -> PathBuf {
        output.join(if cropped { CROPPED_DIR } else { UNCROPPED_DIR })
    }

    /// Video artifact path; keeps the source container extension
    pub fn video_artifact(output: &Path, base: &str, cropped: bool, source: &Path) -> PathBuf {
        let ext = Self::get_extension(source).unwrap_or_else(|| "mp4".to_string());
        let suffix = if cropped { "_cropped" } else { "" };
        Self::artifact_dir(output, cropped).join(format!("{}{}.{}", base, suffix, ext))
    }

    /// Still-image artifact path
    pub fn image_artifact(output: &Path, base: &str, cropped: bool) -> PathBuf {
        let suffix = if cropped { "_cropped" } else { "" };
        Self::artifact_dir(output, cropped).join(format!("{}{}.png", base, suffix))
    }

    /// Caption text file that sits next to an artifact
    pub fn caption_path(artifact: &Path) -> PathBuf {
        artifact.with_extension("txt")
    }

    /// In-progress sibling of `path`; the extension stays last so encoders can infer the format
    pub fn partial_path(path: &Path) -> PathBuf {
        let stem = Self::get_stem(path).unwrap_or_default();
        let name = match path.extension() {
            Some(ext) => format!("{}.{}.{}", stem, PARTIAL_MARKER, ext.to_string_lossy()),
            None => format!("{}.{}", stem, PARTIAL_MARKER),
        };
        path.with_file_name(name)
    }

    /// Move a finished partial file into place
    pub fn promote_partial(partial: &Path, final_path: &Path) -> RangeCropResult<()> {
        std::fs::rename(partial, final_path)?;
        Ok(())
    }

    /// Remove a partial file if one was left behind
    pub fn discard_partial(partial: &Path) {
        if partial.exists() {
            if let Err(e) = std::fs::remove_file(partial) {
                tracing::warn!(path = %partial.display(), "Could not remove partial file: {}", e);
            }
        }
    }

    /// Get file extension from path, lowercased
    pub fn get_extension(path: &Path) -> Option<String> {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
    }

    /// Get file stem (name without extension) from path
    pub fn get_stem(path: &Path) -> Option<String> {
        path.file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
    }

    /// Validate a user-supplied file name fragment such as an output prefix
    pub fn validate_file_component(value: &str) -> RangeCropResult<()> {
        let invalid_chars = ['<', '>', ':', '"', '|', '?', '*', '/', '\\'];
        for ch in invalid_chars {
            if value.contains(ch) {
                return Err(RangeCropError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("Invalid character '{}' in '{}'", ch, value),
                )));
            }
        }
        Ok(())
    }
}
