// Convert interactor - Batch frame-rate conversion of a folder of videos

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};
use walkdir::WalkDir;

use crate::domain::errors::*;
use crate::domain::session::SessionState;
use crate::ports::*;
use crate::utils::path::PathUtils;

/// Request to re-encode every video in a folder
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertRequest {
    pub folder: PathBuf,
    pub fps: u32,
    /// Sub-folder name; defaults to `converted_<fps>fps`
    pub subdir: Option<String>,
}

impl ConvertRequest {
    pub fn output_dir(&self) -> PathBuf {
        let name = self
            .subdir
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| format!("converted_{}fps", self.fps));
        self.folder.join(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConvertReport {
    pub converted: usize,
    /// Outputs that already existed
    pub skipped: usize,
    pub failed: Vec<PathBuf>,
}

impl ConvertReport {
    pub fn succeeded(&self) -> usize {
        self.converted + self.skipped
    }
}

/// Interactor for the frame-rate conversion utility
pub struct ConvertInteractor {
    transcode_port: Arc<dyn TranscodePort>,
}

impl ConvertInteractor {
    pub fn new(transcode_port: Arc<dyn TranscodePort>) -> Self {
        Self { transcode_port }
    }

    pub async fn convert_folder(&self, request: &ConvertRequest) -> Result<ConvertReport, DomainError> {
        if request.fps == 0 {
            return Err(DomainError::Validation("Target fps must be positive".to_string()));
        }
        if let Some(subdir) = &request.subdir {
            PathUtils::validate_file_component(subdir).map_err(DomainError::from)?;
        }
        if !request.folder.is_dir() {
            return Err(DomainError::Validation(format!(
                "Not a directory: {}",
                request.folder.display()
            )));
        }

        let output_dir = request.output_dir();
        tokio::fs::create_dir_all(&output_dir).await.map_err(|e| {
            DomainError::Persistence(format!("Cannot create {}: {}", output_dir.display(), e))
        })?;

        let mut inputs: Vec<PathBuf> = WalkDir::new(&request.folder)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file() && SessionState::is_video_file(entry.path()))
            .map(|entry| entry.into_path())
            .collect();
        inputs.sort();

        info!(
            folder = %request.folder.display(),
            videos = inputs.len(),
            fps = request.fps,
            "Starting frame-rate conversion"
        );

        let mut report = ConvertReport::default();
        for input in inputs {
            let Some(name) = input.file_name() else {
                continue;
            };
            let output = output_dir.join(name);
            if output.exists() {
                info!(output = %output.display(), "Already converted, skipping");
                report.skipped += 1;
                continue;
            }

            match self.convert_one(&input, &output, request.fps).await {
                Ok(()) => report.converted += 1,
                Err(e) => {
                    warn!(input = %input.display(), "Conversion failed: {}", e);
                    report.failed.push(input);
                }
            }
        }

        info!(
            converted = report.converted,
            skipped = report.skipped,
            failed = report.failed.len(),
            "Frame-rate conversion finished"
        );
        Ok(report)
    }

    /// Convert with audio stream copy, then once more without it
    async fn convert_one(&self, input: &Path, output: &Path, fps: u32) -> Result<(), DomainError> {
        let partial = PathUtils::partial_path(output);
        let mut job = FpsConversionJob {
            input: input.to_path_buf(),
            output: partial.clone(),
            fps,
            copy_audio: true,
        };

        let result = match self.transcode_port.convert_fps(&job).await {
            Ok(()) => Ok(()),
            Err(first) => {
                warn!(input = %input.display(), "Retrying without audio copy: {}", first);
                PathUtils::discard_partial(&partial);
                job.copy_audio = false;
                self.transcode_port.convert_fps(&job).await
            }
        };

        match result {
            Ok(()) => PathUtils::promote_partial(&partial, output).map_err(DomainError::from),
            Err(e) => {
                PathUtils::discard_partial(&partial);
                Err(e)
            }
        }
    }
}
