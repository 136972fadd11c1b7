mod common;

use std::sync::Arc;

use tempfile::TempDir;

use common::FakeTranscoder;
use rangecrop_cli::app::convert_interactor::{ConvertInteractor, ConvertRequest};

fn folder(names: &[&str]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for name in names {
        std::fs::write(dir.path().join(name), b"video").unwrap();
    }
    dir
}

#[tokio::test]
async fn test_converts_each_video_into_the_default_subfolder() {
    let dir = folder(&["a.mp4", "b.mkv", "readme.md"]);
    let transcoder = Arc::new(FakeTranscoder::new());
    let interactor = ConvertInteractor::new(transcoder.clone());

    let request = ConvertRequest {
        folder: dir.path().to_path_buf(),
        fps: 24,
        subdir: None,
    };
    let report = interactor.convert_folder(&request).await.unwrap();

    assert_eq!(report.converted, 2);
    assert!(report.failed.is_empty());
    let out = dir.path().join("converted_24fps");
    assert!(out.join("a.mp4").exists());
    assert!(out.join("b.mkv").exists());
    assert!(!out.join("a.partial.mp4").exists());

    let conversions = transcoder.conversions.lock().unwrap();
    assert!(conversions.iter().all(|job| job.fps == 24 && job.copy_audio));
}

#[tokio::test]
async fn test_existing_outputs_are_skipped() {
    let dir = folder(&["a.mp4", "b.mov"]);
    let out = dir.path().join("slow");
    std::fs::create_dir(&out).unwrap();
    std::fs::write(out.join("a.mp4"), b"done").unwrap();

    let transcoder = Arc::new(FakeTranscoder::new());
    let interactor = ConvertInteractor::new(transcoder.clone());
    let report = interactor
        .convert_folder(&ConvertRequest {
            folder: dir.path().to_path_buf(),
            fps: 12,
            subdir: Some("slow".to_string()),
        })
        .await
        .unwrap();

    assert_eq!((report.converted, report.skipped), (1, 1));
    assert_eq!(std::fs::read(out.join("a.mp4")).unwrap(), b"done");
    assert_eq!(transcoder.conversions.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_retries_without_audio_copy() {
    let dir = folder(&["a.mp4"]);
    let transcoder = Arc::new(FakeTranscoder::failing_audio_copy());
    let interactor = ConvertInteractor::new(transcoder.clone());

    let report = interactor
        .convert_folder(&ConvertRequest {
            folder: dir.path().to_path_buf(),
            fps: 30,
            subdir: None,
        })
        .await
        .unwrap();

    assert_eq!(report.converted, 1);
    let flags: Vec<bool> = transcoder
        .conversions
        .lock()
        .unwrap()
        .iter()
        .map(|job| job.copy_audio)
        .collect();
    assert_eq!(flags, vec![true, false]);
}

#[tokio::test]
async fn test_failures_are_reported_and_cleaned_up() {
    let dir = folder(&["bad.mp4", "good.mp4"]);
    let interactor = ConvertInteractor::new(Arc::new(FakeTranscoder::failing_for("bad.mp4")));

    let report = interactor
        .convert_folder(&ConvertRequest {
            folder: dir.path().to_path_buf(),
            fps: 30,
            subdir: None,
        })
        .await
        .unwrap();

    assert_eq!(report.converted, 1);
    assert_eq!(report.failed, vec![dir.path().join("bad.mp4")]);
    let out = dir.path().join("converted_30fps");
    assert!(!out.join("bad.mp4").exists());
    assert!(!out.join("bad.partial.mp4").exists());
}

#[tokio::test]
async fn test_rejects_zero_fps_and_bad_subfolder() {
    let dir = folder(&["a.mp4"]);
    let interactor = ConvertInteractor::new(Arc::new(FakeTranscoder::new()));

    let zero = ConvertRequest {
        folder: dir.path().to_path_buf(),
        fps: 0,
        subdir: None,
    };
    assert!(interactor.convert_folder(&zero).await.is_err());

    let escaping = ConvertRequest {
        folder: dir.path().to_path_buf(),
        fps: 24,
        subdir: Some("../elsewhere".to_string()),
    };
    assert!(interactor.convert_folder(&escaping).await.is_err());
}
