// Export interactor - Renders every selected (source, range) pair to clips, stills and captions

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{imageops, ImageFormat, RgbImage};
use tracing::{debug, error, info, warn};

use crate::app::caption_interactor::CaptionService;
use crate::domain::errors::*;
use crate::domain::model::*;
use crate::domain::rules::*;
use crate::error::RangeCropResult;
use crate::ports::*;
use crate::utils::path::PathUtils;

/// What to produce for each range
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    pub output_dir: PathBuf,
    pub cropped: bool,
    pub uncropped: bool,
    pub image: bool,
    /// Caption artifacts through the remote model instead of the simple caption
    pub ai_caption: bool,
    pub prefix: Option<String>,
    pub constraint: AspectConstraint,
    pub longest_edge: Option<u32>,
    pub trigger: String,
    /// Manually supplied caption text
    pub caption_text: Option<String>,
    pub preset: String,
    pub crf: u8,
}

impl ExportOptions {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            cropped: true,
            uncropped: false,
            image: false,
            ai_caption: false,
            prefix: None,
            constraint: AspectConstraint::Free,
            longest_edge: None,
            trigger: String::new(),
            caption_text: None,
            preset: "medium".to_string(),
            crf: 23,
        }
    }

    /// Caption used when no generated text is available
    pub fn simple_caption(&self) -> Option<String> {
        CaptionRule::compose(&self.trigger, self.caption_text.as_deref())
    }
}

/// One selected source and the ranges to export from it
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSource {
    pub path: PathBuf,
    /// Name used for output files when no prefix is set
    pub display_name: String,
    pub ranges: Vec<Range>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportRequest {
    pub sources: Vec<ExportSource>,
    pub options: ExportOptions,
}

/// Final tally of a batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportReport {
    pub sources_failed: usize,
    pub ranges_processed: usize,
    pub ranges_skipped: usize,
    pub artifacts_written: Vec<PathBuf>,
    pub artifacts_failed: usize,
    pub captions_written: usize,
    pub captions_failed: usize,
    pub cancelled: bool,
    pub errors: Vec<String>,
}

impl ExportReport {
    pub fn is_success(&self) -> bool {
        self.sources_failed == 0
            && self.artifacts_failed == 0
            && self.captions_failed == 0
            && !self.cancelled
    }

    fn record_error(&mut self, message: String) {
        error!("{}", message);
        self.errors.push(message);
    }
}

/// Receives batch progress; every method has a no-op default
pub trait ExportObserver: Send + Sync {
    fn on_source_started(&self, _source: &Path, _ranges: usize) {}

    fn on_range_started(&self, _source: &Path, _range: &Range) {}

    fn on_range_skipped(&self, _source: &Path, _range: &Range, _reason: &str) {}

    fn on_artifact_written(&self, _artifact: &Path) {}

    fn on_artifact_failed(&self, _artifact: &Path, _error: &DomainError) {}

    fn on_caption_written(&self, _caption: &Path) {}

    /// Polled between ranges
    fn should_cancel(&self) -> bool {
        false
    }
}

/// Observer that ignores every event
pub struct NoopExportObserver;

impl ExportObserver for NoopExportObserver {}

/// Artifacts produced for one range
#[derive(Debug, Default)]
struct RangeArtifacts {
    cropped_video: Option<PathBuf>,
    uncropped_video: Option<PathBuf>,
    images: Vec<PathBuf>,
}

impl RangeArtifacts {
    fn all(&self) -> Vec<PathBuf> {
        self.images
            .iter()
            .cloned()
            .chain(self.cropped_video.clone())
            .chain(self.uncropped_video.clone())
            .collect()
    }

    fn preferred_video(&self) -> Option<&PathBuf> {
        self.cropped_video.as_ref().or(self.uncropped_video.as_ref())
    }
}

/// Still image to write for a range
struct StillTarget {
    path: PathBuf,
    crop: Option<CropRect>,
}

/// Interactor for the export use case
pub struct ExportOrchestrator {
    video_opener: Arc<dyn VideoOpener>,
    transcode_port: Arc<dyn TranscodePort>,
    caption_service: Option<Arc<CaptionService>>,
}

impl ExportOrchestrator {
    /// Create new export orchestrator with injected ports
    pub fn new(
        video_opener: Arc<dyn VideoOpener>,
        transcode_port: Arc<dyn TranscodePort>,
        caption_service: Option<Arc<CaptionService>>,
    ) -> Self {
        Self {
            video_opener,
            transcode_port,
            caption_service,
        }
    }

    /// Filter graph for one segment: constant rate, optional crop, optional scale with square pixels
    pub fn filter_graph(
        output_fps: u32,
        crop: Option<CropRect>,
        natural: PixelSize,
        constraint: &AspectConstraint,
        longest_edge: Option<u32>,
    ) -> Vec<FilterStep> {
        let mut steps = vec![FilterStep::Fps(output_fps)];
        let segment = match crop {
            Some(rect) => {
                steps.push(FilterStep::Crop(rect));
                rect.size()
            }
            None => natural,
        };
        if let Some(size) = ScaleRule::output_dimensions(segment, constraint, longest_edge) {
            steps.push(FilterStep::Scale(size));
            steps.push(FilterStep::SetSar);
        }
        steps
    }

    /// Run a whole batch; per-item failures are tallied, never propagated
    pub async fn export(
        &self,
        request: &ExportRequest,
        observer: &dyn ExportObserver,
    ) -> Result<ExportReport, DomainError> {
        let options = &request.options;
        Self::validate_options(options)?;
        self.prepare_output(options).await?;

        if options.ai_caption && self.caption_service.is_none() {
            warn!("AI captioning requested but no caption service is configured; writing simple captions");
        }

        let mut naming = OutputNaming::new(options.prefix.as_deref());
        let mut report = ExportReport::default();

        info!(
            sources = request.sources.len(),
            output = %options.output_dir.display(),
            "Starting export batch"
        );

        'sources: for source in &request.sources {
            if observer.should_cancel() {
                report.cancelled = true;
                break;
            }
            observer.on_source_started(&source.path, source.ranges.len());

            let properties = match self.probe(&source.path).await {
                Ok(properties) => properties,
                Err(e) => {
                    report.sources_failed += 1;
                    report.record_error(format!(
                        "Cannot open {}: {}",
                        source.path.display(),
                        e
                    ));
                    continue;
                }
            };

            for range in &source.ranges {
                if observer.should_cancel() {
                    report.cancelled = true;
                    break 'sources;
                }
                self.export_range(source, range, &properties, options, &mut naming, observer, &mut report)
                    .await;
            }
        }

        info!(
            written = report.artifacts_written.len(),
            failed = report.artifacts_failed,
            skipped = report.ranges_skipped,
            cancelled = report.cancelled,
            "Export batch finished"
        );
        Ok(report)
    }

    fn validate_options(options: &ExportOptions) -> Result<(), DomainError> {
        if !options.cropped && !options.uncropped {
            return Err(DomainError::Validation(
                "Nothing to export: enable cropped and/or uncropped output".to_string(),
            ));
        }
        if let Some(prefix) = &options.prefix {
            PathUtils::validate_file_component(prefix).map_err(DomainError::from)?;
        }
        if options.crf > 51 {
            return Err(DomainError::Validation("CRF value cannot exceed 51".to_string()));
        }
        Ok(())
    }

    async fn prepare_output(&self, options: &ExportOptions) -> Result<(), DomainError> {
        for (wanted, cropped) in [(options.cropped, true), (options.uncropped, false)] {
            if !wanted {
                continue;
            }
            let dir = PathUtils::artifact_dir(&options.output_dir, cropped);
            tokio::fs::create_dir_all(&dir).await.map_err(|e| {
                DomainError::Persistence(format!("Cannot create {}: {}", dir.display(), e))
            })?;
        }
        Ok(())
    }

    async fn probe(&self, path: &Path) -> Result<VideoProperties, DomainError> {
        let opener = Arc::clone(&self.video_opener);
        let path = path.to_path_buf();
        blocking(move || opener.probe(&path)).await
    }

    #[allow(clippy::too_many_arguments)]
    async fn export_range(
        &self,
        source: &ExportSource,
        range: &Range,
        properties: &VideoProperties,
        options: &ExportOptions,
        naming: &mut OutputNaming,
        observer: &dyn ExportObserver,
        report: &mut ExportReport,
    ) {
        let frame_count = properties.frame_count;
        let end = range.end.min(frame_count);
        if range.start >= frame_count || range.start >= end {
            let reason = format!(
                "range [{}, {}) is empty within {} frames",
                range.start, range.end, frame_count
            );
            warn!(source = %source.path.display(), ordinal = range.ordinal, "Skipping range: {}", reason);
            observer.on_range_skipped(&source.path, range, &reason);
            report.ranges_skipped += 1;
            return;
        }

        observer.on_range_started(&source.path, range);
        report.ranges_processed += 1;

        let base = naming.next_base(&source.display_name, range.ordinal);
        let crop = match range.crop {
            Some(rect) if rect.fits_within(properties.frame_size()) => Some(rect),
            Some(rect) => {
                warn!(
                    source = %source.path.display(),
                    ordinal = range.ordinal,
                    "Crop {} does not fit {}; skipping cropped artifacts",
                    rect,
                    properties.frame_size()
                );
                None
            }
            None => None,
        };

        let mut artifacts = RangeArtifacts::default();

        if options.image {
            let mut targets = Vec::new();
            if options.cropped {
                if let Some(rect) = crop {
                    targets.push(StillTarget {
                        path: PathUtils::image_artifact(&options.output_dir, &base, true),
                        crop: Some(rect),
                    });
                }
            }
            if options.uncropped {
                targets.push(StillTarget {
                    path: PathUtils::image_artifact(&options.output_dir, &base, false),
                    crop: None,
                });
            }
            if !targets.is_empty() {
                for (path, result) in self.write_stills(&source.path, range.start, targets).await {
                    match result {
                        Ok(()) => {
                            observer.on_artifact_written(&path);
                            report.artifacts_written.push(path.clone());
                            artifacts.images.push(path);
                        }
                        Err(e) => {
                            observer.on_artifact_failed(&path, &e);
                            report.artifacts_failed += 1;
                            report.record_error(format!("Image {} failed: {}", path.display(), e));
                        }
                    }
                }
            }
        }

        let start_seconds = properties.frames_to_seconds(range.start);
        let duration_seconds = properties.frames_to_seconds(end - range.start);
        let output_fps = properties.output_fps();

        let mut videos = Vec::new();
        if options.cropped {
            if let Some(rect) = crop {
                videos.push((true, Some(rect)));
            }
        }
        if options.uncropped {
            videos.push((false, None));
        }

        for (cropped, rect) in videos {
            let output = PathUtils::video_artifact(&options.output_dir, &base, cropped, &source.path);
            let job = TranscodeJob {
                input: source.path.clone(),
                output: output.clone(),
                start_seconds,
                duration_seconds,
                filters: Self::filter_graph(
                    output_fps,
                    rect,
                    properties.frame_size(),
                    &options.constraint,
                    options.longest_edge,
                ),
                output_fps,
                preset: options.preset.clone(),
                crf: options.crf,
            };

            match self.transcode_artifact(job).await {
                Ok(()) => {
                    observer.on_artifact_written(&output);
                    report.artifacts_written.push(output.clone());
                    if cropped {
                        artifacts.cropped_video = Some(output);
                    } else {
                        artifacts.uncropped_video = Some(output);
                    }
                }
                Err(e) => {
                    observer.on_artifact_failed(&output, &e);
                    report.artifacts_failed += 1;
                    report.record_error(format!("Clip {} failed: {}", output.display(), e));
                }
            }
        }

        self.write_captions(&artifacts, options, observer, report).await;
        debug!(source = %source.path.display(), ordinal = range.ordinal, "Finished range");
    }

    /// Transcode into a partial file and move it into place only on success
    async fn transcode_artifact(&self, mut job: TranscodeJob) -> Result<(), DomainError> {
        let final_path = job.output.clone();
        let partial = PathUtils::partial_path(&final_path);
        job.output = partial.clone();

        match self.transcode_port.transcode(&job).await {
            Ok(()) => PathUtils::promote_partial(&partial, &final_path).map_err(|e| {
                PathUtils::discard_partial(&partial);
                DomainError::from(e)
            }),
            Err(e) => {
                PathUtils::discard_partial(&partial);
                Err(e)
            }
        }
    }

    /// Decode the range's first frame once and write every requested still
    async fn write_stills(
        &self,
        source: &Path,
        frame: FrameIndex,
        targets: Vec<StillTarget>,
    ) -> Vec<(PathBuf, Result<(), DomainError>)> {
        let opener = Arc::clone(&self.video_opener);
        let source = source.to_path_buf();
        let paths: Vec<PathBuf> = targets.iter().map(|t| t.path.clone()).collect();

        let outcome = blocking(move || {
            let decoded = opener.open(&source)?.seek_and_read(frame)?;
            Ok(targets
                .into_iter()
                .map(|target| {
                    let result = save_still(&decoded.image, target.crop, &target.path)
                        .map_err(DomainError::from);
                    (target.path, result)
                })
                .collect::<Vec<_>>())
        })
        .await;

        match outcome {
            Ok(results) => results,
            Err(e) => paths.into_iter().map(|p| (p, Err(e.clone()))).collect(),
        }
    }

    async fn write_captions(
        &self,
        artifacts: &RangeArtifacts,
        options: &ExportOptions,
        observer: &dyn ExportObserver,
        report: &mut ExportReport,
    ) {
        let simple = options.simple_caption();

        let service = match (&self.caption_service, options.ai_caption) {
            (Some(service), true) => service,
            _ => {
                if let Some(text) = &simple {
                    for artifact in artifacts.all() {
                        write_caption_file(&artifact, text, observer, report).await;
                    }
                }
                return;
            }
        };

        let targets: Vec<PathBuf> = match artifacts.preferred_video() {
            Some(video) => vec![video.clone()],
            None => artifacts.images.clone(),
        };

        for artifact in targets {
            let generated = service.caption(&artifact).await;
            let content = match generated {
                Some(text) => CaptionRule::compose(&options.trigger, Some(&text)),
                None => {
                    warn!(artifact = %artifact.display(), "Falling back to simple caption");
                    simple.clone()
                }
            };
            if let Some(text) = content {
                write_caption_file(&artifact, &text, observer, report).await;
            }
        }
    }
}

async fn write_caption_file(
    artifact: &Path,
    text: &str,
    observer: &dyn ExportObserver,
    report: &mut ExportReport,
) {
    let path = PathUtils::caption_path(artifact);
    match tokio::fs::write(&path, text).await {
        Ok(()) => {
            debug!(caption = %path.display(), "Wrote caption");
            observer.on_caption_written(&path);
            report.captions_written += 1;
        }
        Err(e) => {
            report.captions_failed += 1;
            report.record_error(format!("Caption {} failed: {}", path.display(), e));
        }
    }
}

fn save_still(frame: &RgbImage, crop: Option<CropRect>, path: &Path) -> RangeCropResult<()> {
    let image = match crop {
        Some(rect) => imageops::crop_imm(frame, rect.x, rect.y, rect.width, rect.height).to_image(),
        None => frame.clone(),
    };
    let partial = PathUtils::partial_path(path);
    if let Err(e) = image.save_with_format(&partial, ImageFormat::Png) {
        PathUtils::discard_partial(&partial);
        return Err(e.into());
    }
    PathUtils::promote_partial(&partial, path)
}

/// Run decoder work off the async executor
async fn blocking<T, F>(work: F) -> Result<T, DomainError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, DomainError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| DomainError::Decode(format!("Decode worker failed: {}", e)))?
}
