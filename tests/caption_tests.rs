mod common;

use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::ScriptedCaptioner;
use rangecrop_cli::app::caption_interactor::{CaptionService, RetryPolicy};
use rangecrop_cli::ports::{CaptionFailure, UploadState};

fn transient() -> CaptionFailure {
    CaptionFailure::Transient("429 Too Many Requests".to_string())
}

async fn run(captioner: &Arc<ScriptedCaptioner>, artifact: &str, attempts: u32) -> Option<String> {
    let service = CaptionService::new(
        captioner.clone(),
        RetryPolicy::immediate(attempts),
        Some("Mira".to_string()),
    );
    service.caption(Path::new(artifact)).await
}

#[tokio::test]
async fn test_image_caption_retries_transient_failures() {
    let captioner = Arc::new(
        ScriptedCaptioner::new()
            .image(Err(transient()))
            .image(Err(transient()))
            .image(Ok("  A *red* kite over a beach.  ")),
    );

    let caption = run(&captioner, "out/cropped/a_range1_cropped.png", 3).await;

    assert_eq!(caption.as_deref(), Some("A red kite over a beach."));
    assert_eq!(captioner.image_calls.load(Ordering::SeqCst), 3);
    assert!(captioner.prompts.lock().unwrap()[0].contains("Mira"));
}

#[tokio::test]
async fn test_retries_stop_at_the_attempt_budget() {
    let captioner = Arc::new(
        ScriptedCaptioner::new()
            .image(Err(transient()))
            .image(Err(transient()))
            .image(Ok("never reached")),
    );

    assert_eq!(run(&captioner, "still.png", 2).await, None);
    assert_eq!(captioner.image_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_permanent_failure_is_not_retried() {
    let captioner = Arc::new(
        ScriptedCaptioner::new()
            .image(Err(CaptionFailure::Permanent("API key not set".to_string())))
            .image(Ok("never reached")),
    );

    assert_eq!(run(&captioner, "still.png", 5).await, None);
    assert_eq!(captioner.image_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_empty_model_output_counts_as_no_caption() {
    let captioner = Arc::new(ScriptedCaptioner::new().image(Ok("** **")));
    assert_eq!(run(&captioner, "still.png", 1).await, None);
}

#[tokio::test]
async fn test_video_upload_is_polled_described_and_deleted() {
    let captioner = Arc::new(
        ScriptedCaptioner::new()
            .upload(Err(transient()))
            .upload(Ok(ScriptedCaptioner::handle()))
            .status(Ok(UploadState::Processing))
            .status(Err(transient()))
            .status(Ok(UploadState::Active))
            .video(Ok("A dancer spins slowly.")),
    );

    let caption = run(&captioner, "clip_range1_cropped.mp4", 3).await;

    assert_eq!(caption.as_deref(), Some("A dancer spins slowly."));
    assert_eq!(captioner.upload_calls.load(Ordering::SeqCst), 2);
    assert_eq!(*captioner.deleted.lock().unwrap(), vec!["files/abc123".to_string()]);
}

#[tokio::test]
async fn test_upload_is_deleted_even_when_description_fails() {
    let captioner = Arc::new(
        ScriptedCaptioner::new()
            .upload(Ok(ScriptedCaptioner::handle()))
            .video(Err(CaptionFailure::Permanent("blocked".to_string()))),
    );

    assert_eq!(run(&captioner, "clip.mov", 3).await, None);
    assert_eq!(captioner.video_calls.load(Ordering::SeqCst), 1);
    assert_eq!(captioner.deleted.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_failed_processing_skips_description() {
    let captioner = Arc::new(
        ScriptedCaptioner::new()
            .upload(Ok(ScriptedCaptioner::handle()))
            .status(Ok(UploadState::Failed))
            .video(Ok("never reached")),
    );

    assert_eq!(run(&captioner, "clip.mp4", 3).await, None);
    assert_eq!(captioner.video_calls.load(Ordering::SeqCst), 0);
    assert_eq!(captioner.deleted.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_processing_that_never_finishes_gives_up() {
    let mut captioner = ScriptedCaptioner::new().upload(Ok(ScriptedCaptioner::handle()));
    for _ in 0..3 {
        captioner = captioner.status(Ok(UploadState::Processing));
    }
    let captioner = Arc::new(captioner);

    let mut policy = RetryPolicy::immediate(1);
    policy.max_poll_attempts = 3;
    let service = CaptionService::new(captioner.clone(), policy, None);

    assert_eq!(service.caption(Path::new("clip.mp4")).await, None);
    assert_eq!(captioner.video_calls.load(Ordering::SeqCst), 0);
    assert_eq!(captioner.deleted.lock().unwrap().len(), 1);
}
