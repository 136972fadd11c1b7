mod common;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tempfile::TempDir;

use common::*;
use rangecrop_cli::app::caption_interactor::{CaptionService, RetryPolicy};
use rangecrop_cli::app::export_interactor::*;
use rangecrop_cli::ports::{CaptionFailure, FilterStep};
use rangecrop_cli::{CropRect, Range, RangeId};

fn range(id: &str, start: u64, end: u64, crop: Option<CropRect>, ordinal: u32) -> Range {
    Range {
        id: RangeId::from(id),
        start,
        end,
        crop,
        ordinal,
    }
}

struct Fixture {
    _dir: TempDir,
    output: PathBuf,
    source: PathBuf,
    opener: Arc<FakeOpener>,
    transcoder: Arc<FakeTranscoder>,
}

impl Fixture {
    fn new(transcoder: FakeTranscoder) -> Self {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("clip.mp4");
        let opener = FakeOpener::new().with_video(&source, props(100, 64, 48, 25.0));
        Self {
            output: dir.path().join("out"),
            source,
            opener: Arc::new(opener),
            transcoder: Arc::new(transcoder),
            _dir: dir,
        }
    }

    fn orchestrator(&self, captions: Option<Arc<CaptionService>>) -> ExportOrchestrator {
        ExportOrchestrator::new(self.opener.clone(), self.transcoder.clone(), captions)
    }

    fn request(&self, ranges: Vec<Range>, options: ExportOptions) -> ExportRequest {
        ExportRequest {
            sources: vec![ExportSource {
                path: self.source.clone(),
                display_name: "clip.mp4".to_string(),
                ranges,
            }],
            options,
        }
    }

    fn options(&self) -> ExportOptions {
        ExportOptions::new(&self.output)
    }
}

fn listing(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .map(|e| e.file_name().to_string_lossy().to_string())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

#[tokio::test]
async fn test_full_export_writes_every_artifact() {
    let fixture = Fixture::new(FakeTranscoder::new());
    let mut options = fixture.options();
    options.uncropped = true;
    options.image = true;
    options.trigger = "ohwx".to_string();
    options.caption_text = Some("a cat".to_string());

    let crop = CropRect::new(8, 8, 32, 24);
    let request = fixture.request(vec![range("r1", 10, 35, Some(crop), 1)], options);
    let report = fixture
        .orchestrator(None)
        .export(&request, &NoopExportObserver)
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(report.ranges_processed, 1);
    assert_eq!(report.artifacts_written.len(), 4);
    assert_eq!(
        listing(&fixture.output.join("cropped")),
        vec!["clip_range1_cropped.mp4", "clip_range1_cropped.png", "clip_range1_cropped.txt"]
    );
    assert_eq!(
        listing(&fixture.output.join("uncropped")),
        vec!["clip_range1.mp4", "clip_range1.png", "clip_range1.txt"]
    );

    let caption = std::fs::read_to_string(fixture.output.join("cropped/clip_range1_cropped.txt")).unwrap();
    assert_eq!(caption, "ohwx, a cat");

    let still = image::open(fixture.output.join("cropped/clip_range1_cropped.png"))
        .unwrap()
        .to_rgb8();
    assert_eq!(still.dimensions(), (32, 24));
    assert_eq!(still.get_pixel(0, 0)[0], frame_marker(10));
}

#[tokio::test]
async fn test_transcode_jobs_cover_the_range() {
    let fixture = Fixture::new(FakeTranscoder::new());
    let crop = CropRect::new(0, 0, 48, 48);
    let request = fixture.request(vec![range("r1", 50, 75, Some(crop), 1)], fixture.options());
    fixture
        .orchestrator(None)
        .export(&request, &NoopExportObserver)
        .await
        .unwrap();

    let jobs = fixture.transcoder.jobs.lock().unwrap();
    assert_eq!(jobs.len(), 1);
    let job = &jobs[0];
    assert!((job.start_seconds - 2.0).abs() < 1e-9);
    assert!((job.duration_seconds - 1.0).abs() < 1e-9);
    assert_eq!(job.output_fps, 25);
    assert_eq!(job.filters, vec![FilterStep::Fps(25), FilterStep::Crop(crop)]);
    assert!(job.output.to_string_lossy().contains(".partial."));
}

#[tokio::test]
async fn test_unknown_frame_rate_times_clips_at_fallback_rate() {
    let fixture = Fixture::new(FakeTranscoder::new());
    fixture.opener.add(&fixture.source, props(300, 64, 48, 0.0));
    let mut options = fixture.options();
    options.cropped = false;
    options.uncropped = true;
    let request = fixture.request(vec![range("r1", 30, 90, None, 1)], options);
    let report = fixture
        .orchestrator(None)
        .export(&request, &NoopExportObserver)
        .await
        .unwrap();

    assert!(report.is_success());
    let jobs = fixture.transcoder.jobs.lock().unwrap();
    assert_eq!(jobs.len(), 1);
    assert!((jobs[0].start_seconds - 1.0).abs() < 1e-9);
    assert!((jobs[0].duration_seconds - 2.0).abs() < 1e-9);
    assert_eq!(jobs[0].output_fps, 30);
}

#[tokio::test]
async fn test_invalid_crop_still_exports_uncropped() {
    let fixture = Fixture::new(FakeTranscoder::new());
    let mut options = fixture.options();
    options.uncropped = true;
    options.image = true;

    let outside = CropRect::new(40, 0, 40, 40);
    let request = fixture.request(vec![range("r1", 0, 10, Some(outside), 1)], options);
    let report = fixture
        .orchestrator(None)
        .export(&request, &NoopExportObserver)
        .await
        .unwrap();

    assert!(report.is_success());
    assert!(listing(&fixture.output.join("cropped")).is_empty());
    assert_eq!(
        listing(&fixture.output.join("uncropped")),
        vec!["clip_range1.mp4", "clip_range1.png"]
    );
}

#[tokio::test]
async fn test_failed_clip_leaves_no_partial_file() {
    let fixture = Fixture::new(FakeTranscoder::failing_for("_cropped"));
    let mut options = fixture.options();
    options.uncropped = true;

    let crop = CropRect::new(0, 0, 32, 32);
    let request = fixture.request(vec![range("r1", 0, 10, Some(crop), 1)], options);
    let report = fixture
        .orchestrator(None)
        .export(&request, &NoopExportObserver)
        .await
        .unwrap();

    assert!(!report.is_success());
    assert_eq!(report.artifacts_failed, 1);
    assert_eq!(report.errors.len(), 1);
    assert!(listing(&fixture.output.join("cropped")).is_empty());
    assert_eq!(listing(&fixture.output.join("uncropped")), vec!["clip_range1.mp4"]);
}

#[tokio::test]
async fn test_missing_source_does_not_stop_the_batch() {
    let fixture = Fixture::new(FakeTranscoder::new());
    let mut request = fixture.request(vec![range("r1", 0, 10, None, 1)], fixture.options());
    request.options.cropped = false;
    request.options.uncropped = true;
    request.sources.insert(
        0,
        ExportSource {
            path: PathBuf::from("/nowhere/gone.mp4"),
            display_name: "gone.mp4".to_string(),
            ranges: vec![range("g1", 0, 10, None, 1)],
        },
    );

    let report = fixture
        .orchestrator(None)
        .export(&request, &NoopExportObserver)
        .await
        .unwrap();

    assert_eq!(report.sources_failed, 1);
    assert_eq!(report.artifacts_written.len(), 1);
    assert!(!report.is_success());
}

#[tokio::test]
async fn test_ranges_past_the_end_are_skipped() {
    let fixture = Fixture::new(FakeTranscoder::new());
    let mut options = fixture.options();
    options.cropped = false;
    options.uncropped = true;
    let request = fixture.request(
        vec![range("r1", 0, 10, None, 1), range("r2", 150, 160, None, 2)],
        options,
    );

    let report = fixture
        .orchestrator(None)
        .export(&request, &NoopExportObserver)
        .await
        .unwrap();

    assert_eq!(report.ranges_processed, 1);
    assert_eq!(report.ranges_skipped, 1);
    assert!(report.is_success());
}

#[tokio::test]
async fn test_prefix_numbers_artifacts_across_sources() {
    let fixture = Fixture::new(FakeTranscoder::new());
    let second = fixture.source.with_file_name("other.mov");
    fixture.opener.add(&second, props(50, 64, 48, 30.0));

    let mut options = fixture.options();
    options.cropped = false;
    options.uncropped = true;
    options.prefix = Some("ds".to_string());
    let mut request = fixture.request(vec![range("r1", 0, 10, None, 1)], options);
    request.sources.push(ExportSource {
        path: second,
        display_name: "other.mov".to_string(),
        ranges: vec![range("o1", 0, 5, None, 1), range("o2", 5, 10, None, 2)],
    });

    fixture
        .orchestrator(None)
        .export(&request, &NoopExportObserver)
        .await
        .unwrap();

    assert_eq!(
        listing(&fixture.output.join("uncropped")),
        vec!["ds_00001_range1.mp4", "ds_00002_range1.mov", "ds_00003_range2.mov"]
    );
}

#[tokio::test]
async fn test_rejects_export_with_nothing_to_write() {
    let fixture = Fixture::new(FakeTranscoder::new());
    let mut options = fixture.options();
    options.cropped = false;
    let request = fixture.request(vec![range("r1", 0, 10, None, 1)], options);

    let result = fixture.orchestrator(None).export(&request, &NoopExportObserver).await;
    assert!(result.is_err());
    assert!(fixture.transcoder.jobs.lock().unwrap().is_empty());
}

/// Asks to cancel once the first range has started
#[derive(Default)]
struct CancelAfterFirst {
    started: AtomicUsize,
}

impl ExportObserver for CancelAfterFirst {
    fn on_range_started(&self, _source: &Path, _range: &Range) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }

    fn should_cancel(&self) -> bool {
        self.started.load(Ordering::SeqCst) > 0
    }
}

#[tokio::test]
async fn test_cancellation_stops_between_ranges() {
    let fixture = Fixture::new(FakeTranscoder::new());
    let mut options = fixture.options();
    options.cropped = false;
    options.uncropped = true;
    let request = fixture.request(
        vec![
            range("r1", 0, 10, None, 1),
            range("r2", 10, 20, None, 2),
            range("r3", 20, 30, None, 3),
        ],
        options,
    );

    let observer = CancelAfterFirst::default();
    let report = fixture.orchestrator(None).export(&request, &observer).await.unwrap();

    assert!(report.cancelled);
    assert!(!report.is_success());
    assert_eq!(report.ranges_processed, 1);
    assert_eq!(listing(&fixture.output.join("uncropped")), vec!["clip_range1.mp4"]);
}

fn service(captioner: ScriptedCaptioner) -> Arc<CaptionService> {
    Arc::new(CaptionService::new(
        Arc::new(captioner),
        RetryPolicy::immediate(2),
        None,
    ))
}

#[tokio::test]
async fn test_generated_caption_goes_to_the_cropped_clip_only() {
    let fixture = Fixture::new(FakeTranscoder::new());
    let captioner = ScriptedCaptioner::new()
        .upload(Ok(ScriptedCaptioner::handle()))
        .video(Ok("**A cat** leaps onto a table."));

    let mut options = fixture.options();
    options.uncropped = true;
    options.ai_caption = true;
    options.trigger = "ohwx".to_string();
    let crop = CropRect::new(0, 0, 32, 32);
    let request = fixture.request(vec![range("r1", 0, 10, Some(crop), 1)], options);

    let report = fixture
        .orchestrator(Some(service(captioner)))
        .export(&request, &NoopExportObserver)
        .await
        .unwrap();

    assert_eq!(report.captions_written, 1);
    let caption = std::fs::read_to_string(fixture.output.join("cropped/clip_range1_cropped.txt")).unwrap();
    assert_eq!(caption, "ohwx, A cat leaps onto a table.");
    assert!(!fixture.output.join("uncropped/clip_range1.txt").exists());
}

#[tokio::test]
async fn test_caption_failure_falls_back_to_simple_caption() {
    let fixture = Fixture::new(FakeTranscoder::new());
    let captioner = ScriptedCaptioner::new()
        .image(Err(CaptionFailure::Transient("503".to_string())))
        .image(Err(CaptionFailure::Transient("503".to_string())));

    let mut options = fixture.options();
    options.cropped = false;
    options.uncropped = true;
    options.image = true;
    options.ai_caption = true;
    options.trigger = "ohwx".to_string();
    options.caption_text = Some("fallback".to_string());
    // A still alone is captioned from the image
    let request = fixture.request(vec![range("r1", 0, 10, None, 1)], options);

    let failing = FakeTranscoder::failing_for("uncropped");
    let orchestrator = ExportOrchestrator::new(
        fixture.opener.clone(),
        Arc::new(failing),
        Some(service(captioner)),
    );
    let report = orchestrator.export(&request, &NoopExportObserver).await.unwrap();

    assert_eq!(report.artifacts_failed, 1);
    assert_eq!(report.captions_written, 1);
    let caption = std::fs::read_to_string(fixture.output.join("uncropped/clip_range1.txt")).unwrap();
    assert_eq!(caption, "ohwx, fallback");
}

#[tokio::test]
async fn test_trigger_alone_is_written_as_caption() {
    let fixture = Fixture::new(FakeTranscoder::new());
    let mut options = fixture.options();
    options.cropped = false;
    options.uncropped = true;
    options.trigger = "ohwx".to_string();
    let request = fixture.request(vec![range("r1", 0, 10, None, 1)], options);

    fixture
        .orchestrator(None)
        .export(&request, &NoopExportObserver)
        .await
        .unwrap();

    let caption = std::fs::read_to_string(fixture.output.join("uncropped/clip_range1.txt")).unwrap();
    assert_eq!(caption, "ohwx");
}
