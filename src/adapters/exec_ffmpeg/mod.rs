//! FFmpeg execution adapter
//!
//! Runs the `ffmpeg` command-line tool for segment re-encodes and whole-file
//! frame-rate conversion.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::domain::errors::*;
use crate::ports::*;

/// Number of stderr lines kept in failure diagnostics
const STDERR_TAIL_LINES: usize = 4;

/// FFmpeg-based transcoding adapter
pub struct FFmpegAdapter {
    binary: PathBuf,
}

impl FFmpegAdapter {
    /// Create new FFmpeg adapter using `binary` (usually `ffmpeg` on `PATH`)
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Argument list for a segment re-encode
    pub fn transcode_args(job: &TranscodeJob) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-y".into(), "-nostdin".into(), "-hide_banner".into()];
        args.push("-ss".into());
        args.push(format!("{:.6}", job.start_seconds).into());
        args.push("-t".into());
        args.push(format!("{:.6}", job.duration_seconds).into());
        args.push("-i".into());
        args.push(job.input.clone().into_os_string());

        if !job.filters.is_empty() {
            args.push("-vf".into());
            args.push(render_filter_graph(&job.filters).into());
        }

        args.extend(
            [
                "-r".to_string(),
                job.output_fps.to_string(),
                "-vsync".to_string(),
                "cfr".to_string(),
                "-map_metadata".to_string(),
                "-1".to_string(),
                "-an".to_string(),
                "-c:v".to_string(),
                "libx264".to_string(),
                "-preset".to_string(),
                job.preset.clone(),
                "-crf".to_string(),
                job.crf.to_string(),
            ]
            .into_iter()
            .map(OsString::from),
        );
        args.push(job.output.clone().into_os_string());
        args
    }

    /// Argument list for a whole-file frame-rate conversion
    pub fn convert_fps_args(job: &FpsConversionJob) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-y".into(), "-nostdin".into(), "-hide_banner".into()];
        args.push("-i".into());
        args.push(job.input.clone().into_os_string());
        args.push("-vf".into());
        args.push(render_filter_graph(&[FilterStep::Fps(job.fps)]).into());
        args.extend(
            [
                "-r".to_string(),
                job.fps.to_string(),
                "-c:v".to_string(),
                "libx264".to_string(),
                "-preset".to_string(),
                "medium".to_string(),
                "-crf".to_string(),
                "23".to_string(),
            ]
            .into_iter()
            .map(OsString::from),
        );
        if job.copy_audio {
            args.push("-c:a".into());
            args.push("copy".into());
        }
        args.push(job.output.clone().into_os_string());
        args
    }

    async fn run(&self, args: Vec<OsString>) -> Result<(), DomainError> {
        debug!(binary = %self.binary.display(), ?args, "Spawning ffmpeg");
        let output = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| DomainError::Transcode(format!("Failed to start ffmpeg: {}", e)))?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(DomainError::Transcode(summarize_stderr(
            &stderr,
            output.status.code(),
        )))
    }
}

impl Default for FFmpegAdapter {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

#[async_trait]
impl TranscodePort for FFmpegAdapter {
    async fn transcode(&self, job: &TranscodeJob) -> Result<(), DomainError> {
        info!(
            input = %job.input.display(),
            output = %job.output.display(),
            start = job.start_seconds,
            duration = job.duration_seconds,
            filters = %render_filter_graph(&job.filters),
            "Transcoding segment"
        );
        self.run(Self::transcode_args(job)).await
    }

    async fn convert_fps(&self, job: &FpsConversionJob) -> Result<(), DomainError> {
        info!(
            input = %job.input.display(),
            output = %job.output.display(),
            fps = job.fps,
            copy_audio = job.copy_audio,
            "Converting frame rate"
        );
        self.run(Self::convert_fps_args(job)).await
    }
}

/// Last non-empty stderr lines, oldest first
fn summarize_stderr(stderr: &str, code: Option<i32>) -> String {
    let mut tail: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .rev()
        .take(STDERR_TAIL_LINES)
        .collect();
    tail.reverse();

    let status = code
        .map(|c| format!("ffmpeg exited with status {}", c))
        .unwrap_or_else(|| "ffmpeg was terminated".to_string());
    if tail.is_empty() {
        status
    } else {
        format!("{}: {}", status, tail.join(" | "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{CropRect, PixelSize};

    fn strings(args: Vec<OsString>) -> Vec<String> {
        args.into_iter()
            .map(|a| a.to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn test_transcode_args_order() {
        let job = TranscodeJob {
            input: PathBuf::from("in.mp4"),
            output: PathBuf::from("out.mp4"),
            start_seconds: 1.0,
            duration_seconds: 2.5,
            filters: vec![
                FilterStep::Fps(30),
                FilterStep::Crop(CropRect::new(10, 20, 300, 200)),
                FilterStep::Scale(PixelSize::new(600, 400)),
                FilterStep::SetSar,
            ],
            output_fps: 30,
            preset: "medium".to_string(),
            crf: 23,
        };
        let args = strings(FFmpegAdapter::transcode_args(&job));

        let input_pos = args.iter().position(|a| a == "-i").unwrap();
        let ss_pos = args.iter().position(|a| a == "-ss").unwrap();
        assert!(ss_pos < input_pos, "seek must be an input option");
        assert_eq!(args[ss_pos + 1], "1.000000");

        let vf = args.iter().position(|a| a == "-vf").unwrap();
        assert_eq!(
            args[vf + 1],
            "fps=fps=30:round=up,crop=300:200:10:20,scale=600:400,setsar=1"
        );
        assert!(args.windows(2).any(|w| w[0] == "-map_metadata" && w[1] == "-1"));
        assert!(args.windows(2).any(|w| w[0] == "-vsync" && w[1] == "cfr"));
        assert_eq!(args.last().unwrap(), "out.mp4");
    }

    #[test]
    fn test_convert_args_audio_copy_toggle() {
        let mut job = FpsConversionJob {
            input: PathBuf::from("a.mov"),
            output: PathBuf::from("sub/a.mov"),
            fps: 24,
            copy_audio: true,
        };
        let with_copy = strings(FFmpegAdapter::convert_fps_args(&job));
        assert!(with_copy.windows(2).any(|w| w[0] == "-c:a" && w[1] == "copy"));

        job.copy_audio = false;
        let without = strings(FFmpegAdapter::convert_fps_args(&job));
        assert!(!without.iter().any(|a| a == "-c:a"));
    }

    #[test]
    fn test_summarize_stderr_keeps_tail() {
        let stderr = "line1\n\nline2\nline3\nline4\nline5\n";
        assert_eq!(
            summarize_stderr(stderr, Some(1)),
            "ffmpeg exited with status 1: line2 | line3 | line4 | line5"
        );
        assert_eq!(summarize_stderr("", None), "ffmpeg was terminated");
    }
}
