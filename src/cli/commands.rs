//! Command implementations

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use tracing::{debug, info};

use crate::adapters::AppConfig;
use crate::app::container::AppContainer;
use crate::app::convert_interactor::ConvertRequest;
use crate::app::edit_interactor::{resolve_range, resolve_video, AddBounds, CropEdit};
use crate::app::export_interactor::{ExportObserver, ExportOptions, ExportRequest, ExportSource};
use crate::app::playback_interactor::{drive_playback, PlaybackController, PlaybackObserver, StopReason};
use crate::cli::args::*;
use crate::cli::{Cli, Commands};
use crate::domain::errors::DomainError;
use crate::domain::model::*;
use crate::domain::rules::CaptionRule;
use crate::ports::DecodedFrame;
use crate::utils::logging::ProgressReporter;
use crate::utils::path::PathUtils;
use crate::utils::time::TimeParser;
use crate::utils::human_size;

/// Dispatch a parsed command line
pub async fn run(cli: Cli, container: &dyn AppContainer) -> Result<()> {
    match cli.command {
        Commands::Folder(args) => folder(args, container).await,
        Commands::Duplicate(args) => duplicate(args, container).await,
        Commands::Select(args) => select(args, container).await,
        Commands::Inspect(args) => inspect(args, container).await,
        Commands::Ranges(command) => ranges(command, container).await,
        Commands::Export(args) => export(args, container).await,
        Commands::Caption(args) => caption(args, container).await,
        Commands::Preview(args) => preview(args, container).await,
        Commands::ConvertFps(args) => convert_fps(args, container).await,
    }
}

/// Execute the folder command
pub async fn folder(args: FolderArgs, container: &dyn AppContainer) -> Result<()> {
    let entries = container
        .edit_interactor()
        .scan_folder(&args.dir)
        .await
        .with_context(|| format!("Failed to scan {}", args.dir.display()))?;

    println!("{} video(s) in {}", entries.len(), args.dir.display());
    for entry in entries {
        let marker = if entry.export_enabled { "x" } else { " " };
        println!("  [{}] {}", marker, entry.display_name);
    }
    Ok(())
}

/// Execute the duplicate command
pub async fn duplicate(args: DuplicateArgs, container: &dyn AppContainer) -> Result<()> {
    let entry = container
        .edit_interactor()
        .duplicate(&args.display_name)
        .await
        .context("Failed to duplicate entry")?;
    println!("Added {}", entry.display_name);
    Ok(())
}

/// Execute the select command
pub async fn select(args: SelectArgs, container: &dyn AppContainer) -> Result<()> {
    container
        .edit_interactor()
        .select(&args.display_name, !args.off)
        .await
        .context("Failed to update selection")?;
    let state = if args.off { "excluded from" } else { "included in" };
    println!("{} {} exports", args.display_name, state);
    Ok(())
}

/// Execute the inspect command
pub async fn inspect(args: InspectArgs, container: &dyn AppContainer) -> Result<()> {
    let report = container
        .inspect_interactor()
        .inspect(&args.video)
        .await
        .context("Failed to inspect input file")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("File:       {}", report.path);
        println!("Frames:     {}", report.frame_count);
        println!("Dimensions: {}x{}", report.width, report.height);
        if report.fps > 0.0 {
            println!("Frame rate: {:.3} fps", report.fps);
        } else {
            println!("Frame rate: unknown (timing uses {:.0} fps)", report.effective_fps);
        }
        println!("Duration:   {}", report.duration);
    }
    Ok(())
}

/// Execute a ranges subcommand
pub async fn ranges(command: RangesCommand, container: &dyn AppContainer) -> Result<()> {
    let edit = container.edit_interactor();
    match command {
        RangesCommand::List(args) => {
            let (path, ranges) = edit.list_ranges(&args.video).await?;
            if ranges.is_empty() {
                println!("No ranges for {}", path.display());
            }
            for range in &ranges {
                print_range(range);
            }
        }
        RangesCommand::Add(args) => {
            let bounds = match (&args.start, &args.end, &args.at) {
                (Some(start), Some(end), _) => AddBounds::Explicit {
                    start: position(container, &args.video, start).await?,
                    end: position(container, &args.video, end).await?,
                },
                (_, _, Some(at)) => AddBounds::At {
                    position: position(container, &args.video, at).await?,
                    duration: args.duration,
                },
                _ => AddBounds::At {
                    position: 0,
                    duration: args.duration,
                },
            };
            let crop = args.crop.as_deref().map(CropRect::parse).transpose()?;
            let range = edit
                .add_range(&args.video, bounds, crop)
                .await
                .context("Failed to add range")?;
            print_range(&range);
        }
        RangesCommand::Crop(args) => {
            let constraint = match &args.aspect {
                Some(aspect) => AspectConstraint::parse(aspect)?,
                None => AspectConstraint::Free,
            };
            let crop_edit = match (&args.rect, &args.display, args.clear) {
                (_, _, true) => CropEdit::Clear,
                (Some(rect), _, _) => CropEdit::Source(CropRect::parse(rect)?),
                (None, Some(display), _) => {
                    let surface = args
                        .surface
                        .as_deref()
                        .ok_or_else(|| anyhow!("--display requires --surface"))?;
                    let surface = PixelSize::parse(surface)?;
                    let rect = CropRect::parse(display)?;
                    CropEdit::Display {
                        rect: RectF::new(
                            rect.x as f64,
                            rect.y as f64,
                            rect.width as f64,
                            rect.height as f64,
                        ),
                        surface: surface.to_size_f(),
                    }
                }
                (None, None, false) => bail!("Give --rect, --display with --surface, or --clear"),
            };
            let range = edit
                .set_crop(&args.video, &args.range_id, crop_edit, &constraint)
                .await
                .context("Failed to set crop")?;
            print_range(&range);
        }
        RangesCommand::Duration(args) => {
            let range = edit
                .update_duration(&args.video, &args.range_id, args.frames)
                .await
                .context("Failed to set duration")?;
            print_range(&range);
        }
        RangesCommand::NudgeStart(args) => {
            let range = edit
                .nudge_start(&args.video, &args.range_id, args.delta)
                .await
                .context("Failed to move range start")?;
            print_range(&range);
        }
        RangesCommand::NudgeEnd(args) => {
            let range = edit
                .nudge_end(&args.video, &args.range_id, args.delta)
                .await
                .context("Failed to move range end")?;
            print_range(&range);
        }
        RangesCommand::Remove(args) => {
            let removed = edit
                .remove_range(&args.video, &args.range_id)
                .await
                .context("Failed to remove range")?;
            println!("Removed {} ({})", removed, removed.id);
        }
    }
    Ok(())
}

fn print_range(range: &Range) {
    let crop = range
        .crop
        .map(|c| c.to_string())
        .unwrap_or_else(|| "none".to_string());
    println!(
        "#{} {} [{}, {}) {} frames, crop {}",
        range.ordinal,
        range.id,
        range.start,
        range.end,
        range.duration(),
        crop
    );
}

/// A frame number, or a time resolved against the video's frame rate
async fn position(container: &dyn AppContainer, video: &str, value: &str) -> Result<FrameIndex> {
    if let Ok(frame) = value.trim().parse::<FrameIndex>() {
        return Ok(frame);
    }
    let state = container.session_port().load().await;
    let path = resolve_video(&state, video);
    let opener = container.video_opener();
    let properties = tokio::task::spawn_blocking(move || opener.probe(&path))
        .await
        .context("Probe task failed")??;
    Ok(TimeParser::parse_position(value, &properties)?)
}

/// Progress lines for an export batch; cancelled by Ctrl-C
struct CliExportObserver {
    cancel: Arc<AtomicBool>,
    progress: ProgressReporter,
}

impl ExportObserver for CliExportObserver {
    fn on_range_started(&self, source: &Path, range: &Range) {
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        self.progress
            .advance(&format!("{} range {}", name, range.ordinal));
    }

    fn on_range_skipped(&self, source: &Path, range: &Range, reason: &str) {
        self.progress.warning(&format!(
            "{} range {} skipped: {}",
            source.display(),
            range.ordinal,
            reason
        ));
    }

    fn on_artifact_failed(&self, artifact: &Path, error: &DomainError) {
        self.progress
            .failure(&format!("{}: {}", artifact.display(), error));
    }

    fn should_cancel(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}

fn cancel_on_ctrl_c() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    let handle = Arc::clone(&flag);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, stopping after the current range");
            handle.store(true, Ordering::SeqCst);
        }
    });
    flag
}

/// Execute the export command
pub async fn export(args: ExportArgs, container: &dyn AppContainer) -> Result<()> {
    let config: &AppConfig = container.config();
    let edit = container.edit_interactor();

    let longest_edge = match args.longest_edge {
        Some(edge) => edit.set_longest_edge(edge).await?,
        None => {
            let saved = edit.session().await.longest_edge;
            saved.or(config.export.longest_edge)
        }
    };

    let constraint = match (&args.resolution, &args.aspect) {
        (Some(resolution), _) => AspectConstraint::Resolution(PixelSize::parse(resolution)?),
        (None, Some(aspect)) => AspectConstraint::parse(aspect)?,
        (None, None) => AspectConstraint::Free,
    };

    let state = edit.session().await;
    let sources: Vec<ExportSource> = state
        .export_selection(args.all)
        .into_iter()
        .filter_map(|entry| {
            let ranges = state.ranges.list_for_source(&entry.original_path).to_vec();
            if ranges.is_empty() {
                debug!(video = %entry.display_name, "No ranges, not exported");
                return None;
            }
            Some(ExportSource {
                path: entry.original_path,
                display_name: entry.display_name,
                ranges,
            })
        })
        .collect();

    if sources.is_empty() {
        bail!("Nothing to export: no selected video has ranges (use `select` or --all)");
    }

    let (cropped, uncropped) = match (args.cropped, args.uncropped) {
        (false, false) => (true, true),
        flags => flags,
    };

    let options = ExportOptions {
        output_dir: args.output.clone(),
        cropped,
        uncropped,
        image: args.image,
        ai_caption: args.caption,
        prefix: args.prefix.clone().or_else(|| config.export.prefix.clone()),
        constraint,
        longest_edge,
        trigger: args
            .trigger
            .clone()
            .or_else(|| config.export.trigger.clone())
            .unwrap_or_default(),
        caption_text: args.text.clone(),
        preset: config.export.preset.clone(),
        crf: config.export.crf,
    };

    let total = sources.iter().map(|s| s.ranges.len()).sum();
    let observer = CliExportObserver {
        cancel: cancel_on_ctrl_c(),
        progress: ProgressReporter::new("export", total, config.logging.progress),
    };

    let request = ExportRequest { sources, options };
    let report = container
        .export_orchestrator()
        .export(&request, &observer)
        .await
        .context("Export could not start")?;

    observer.progress.finish(report.is_success());

    let bytes: u64 = report
        .artifacts_written
        .iter()
        .filter_map(|path| std::fs::metadata(path).ok())
        .map(|meta| meta.len())
        .sum();
    println!(
        "Exported {} artifact(s), {} total, from {} range(s); {} skipped, {} failed, {} caption(s) written",
        report.artifacts_written.len(),
        human_size(bytes),
        report.ranges_processed,
        report.ranges_skipped,
        report.artifacts_failed + report.sources_failed,
        report.captions_written
    );
    if report.cancelled {
        bail!("Export cancelled");
    }
    if !report.is_success() {
        bail!("Export finished with {} error(s)", report.errors.len());
    }
    Ok(())
}

/// Execute the caption command
pub async fn caption(args: CaptionArgs, container: &dyn AppContainer) -> Result<()> {
    if !args.artifact.exists() {
        bail!("Artifact does not exist: {}", args.artifact.display());
    }
    let trigger = args
        .trigger
        .clone()
        .or_else(|| container.config().export.trigger.clone())
        .unwrap_or_default();

    let generated = container.caption_service().caption(&args.artifact).await;
    let content = match &generated {
        Some(text) => CaptionRule::compose(&trigger, Some(text)),
        None => CaptionRule::compose(&trigger, args.text.as_deref()),
    };

    let Some(content) = content else {
        bail!("Captioning failed and no fallback text or trigger was given");
    };
    let path = PathUtils::caption_path(&args.artifact);
    tokio::fs::write(&path, &content)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    if generated.is_none() {
        println!("Generation failed; wrote fallback caption to {}", path.display());
    } else {
        println!("{}", content);
    }
    Ok(())
}

/// Frame events of a headless preview
struct CliPlaybackObserver;

impl PlaybackObserver for CliPlaybackObserver {
    fn on_frame(&self, frame: &DecodedFrame) {
        debug!(frame = frame.index, "Frame shown");
    }

    fn on_stopped(&self, last_frame: Option<FrameIndex>, reason: &StopReason) {
        info!(?last_frame, ?reason, "Playback stopped");
    }
}

/// Execute the preview command
pub async fn preview(args: PreviewArgs, container: &dyn AppContainer) -> Result<()> {
    let state = container.session_port().load().await;
    let path: PathBuf = resolve_video(&state, &args.video);

    let source = container
        .video_opener()
        .open(&path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let mut controller = PlaybackController::new(source);
    let observer = CliPlaybackObserver;

    match &args.range {
        Some(token) => {
            let id = resolve_range(&state, &path, token)?;
            let range = state
                .ranges
                .find_by_id(&id)
                .cloned()
                .ok_or_else(|| anyhow!("Range {} not found", token))?;
            if args.looped {
                controller.loop_range(&range, &observer)?;
            } else {
                controller.play_range(range.start, range.end, &observer)?;
            }
        }
        None => {
            let from = match &args.from {
                Some(value) => TimeParser::parse_position(value, &controller.properties())?,
                None => 0,
            };
            controller.scrub(from, &observer)?;
            if let Some(jumps) = args.jump {
                controller.jump(jumps, container.config().playback.jump_seconds, &observer)?;
            }
            controller.play_forward(&observer);
        }
    }

    let summary = drive_playback(&mut controller, &observer, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await;

    let last = summary
        .last_frame
        .map(|f| TimeParser::format_frame(f, &controller.properties()))
        .unwrap_or_else(|| "none".to_string());
    println!(
        "Played {} frame(s); last frame {}{}",
        summary.frames_shown,
        last,
        if summary.interrupted { " (interrupted)" } else { "" }
    );
    Ok(())
}

/// Execute the convert-fps command
pub async fn convert_fps(args: ConvertFpsArgs, container: &dyn AppContainer) -> Result<()> {
    let folder = match args.folder {
        Some(folder) => folder,
        None => container
            .session_port()
            .load()
            .await
            .folder_path
            .ok_or_else(|| anyhow!("No folder in the session; run `folder` first or pass --folder"))?,
    };

    let request = ConvertRequest {
        folder,
        fps: args.fps,
        subdir: args.subdir,
    };
    let report = container
        .convert_interactor()
        .convert_folder(&request)
        .await
        .context("Frame-rate conversion failed")?;

    println!(
        "Converted {} of {} video(s) to {} fps in {} ({} already present)",
        report.succeeded(),
        report.succeeded() + report.failed.len(),
        args.fps,
        request.output_dir().display(),
        report.skipped
    );
    for failed in &report.failed {
        println!("  failed: {}", failed.display());
    }
    if !report.failed.is_empty() {
        bail!("{} conversion(s) failed", report.failed.len());
    }
    Ok(())
}
