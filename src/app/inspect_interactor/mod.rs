// Inspect interactor - Reports the derived properties of a source video

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::domain::errors::*;
use crate::domain::model::*;
use crate::ports::*;
use crate::utils::time::TimeParser;

/// Properties of one source as reported to the user
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InspectReport {
    pub path: String,
    pub frame_count: u64,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Frame rate actually used for timing
    pub effective_fps: f64,
    pub duration: String,
}

impl InspectReport {
    pub fn from_source(source: &VideoSource) -> Self {
        let properties = source.properties;
        let seconds = properties.frame_count as f64 / properties.effective_fps();
        Self {
            path: source.path.to_string_lossy().to_string(),
            frame_count: properties.frame_count,
            width: properties.width,
            height: properties.height,
            fps: properties.fps,
            effective_fps: properties.effective_fps(),
            duration: TimeParser::format_time(seconds),
        }
    }
}

/// Interactor for source inspection
pub struct InspectInteractor {
    video_opener: Arc<dyn VideoOpener>,
}

impl InspectInteractor {
    /// Create new inspect interactor with injected port
    pub fn new(video_opener: Arc<dyn VideoOpener>) -> Self {
        Self { video_opener }
    }

    pub async fn inspect(&self, path: &Path) -> Result<InspectReport, DomainError> {
        if !path.exists() {
            return Err(DomainError::SourceUnavailable(format!(
                "Input file does not exist: {}",
                path.display()
            )));
        }

        let opener = Arc::clone(&self.video_opener);
        let owned = path.to_path_buf();
        let properties = tokio::task::spawn_blocking(move || opener.probe(&owned))
            .await
            .map_err(|e| DomainError::Decode(format!("Probe worker failed: {}", e)))??;

        let report = InspectReport::from_source(&VideoSource::new(path, properties));
        info!(
            path = %report.path,
            frames = report.frame_count,
            width = report.width,
            height = report.height,
            fps = report.fps,
            "Source inspected"
        );
        Ok(report)
    }
}
