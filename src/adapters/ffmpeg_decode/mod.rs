// FFmpeg decode adapter - Frame-accurate seeking and RGB frame extraction via libav

use std::path::{Path, PathBuf};
use std::sync::Once;

use ffmpeg_next::{codec, format, frame, media, software::scaling, Rational};
use image::RgbImage;
use tracing::{debug, warn};

use crate::domain::errors::*;
use crate::domain::model::*;
use crate::ports::*;

static FFMPEG_INIT: Once = Once::new();

/// Opens sources with the in-process libav decoder
pub struct FfmpegVideoOpener;

impl FfmpegVideoOpener {
    /// Create new opener, initializing libav once per process
    pub fn new() -> Result<Self, DomainError> {
        let mut init_error = None;
        FFMPEG_INIT.call_once(|| {
            if let Err(e) = ffmpeg_next::init() {
                init_error = Some(e.to_string());
            }
        });
        match init_error {
            Some(message) => Err(DomainError::Decode(format!(
                "Failed to initialize FFmpeg: {}",
                message
            ))),
            None => Ok(Self),
        }
    }
}

impl VideoOpener for FfmpegVideoOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>, DomainError> {
        Ok(Box::new(FfmpegFrameSource::open(path)?))
    }
}

/// One open decoder over the best video stream of a file
pub struct FfmpegFrameSource {
    path: PathBuf,
    input_ctx: format::context::Input,
    video_decoder: codec::decoder::Video,
    scaler_ctx: scaling::Context,
    stream_index: usize,
    time_base: Rational,
    properties: VideoProperties,
    /// Next frame index `read_frame` returns
    position: FrameIndex,
    eof_sent: bool,
}

impl FfmpegFrameSource {
    pub fn open(path: &Path) -> Result<Self, DomainError> {
        if !path.exists() {
            return Err(DomainError::SourceUnavailable(format!(
                "File does not exist: {}",
                path.display()
            )));
        }

        let input_ctx = format::input(&path).map_err(|e| {
            DomainError::SourceUnavailable(format!("{}: {}", path.display(), e))
        })?;

        let (stream_index, time_base, fps, stream_frames, parameters) = {
            let stream = input_ctx
                .streams()
                .best(media::Type::Video)
                .ok_or_else(|| {
                    DomainError::SourceUnavailable(format!(
                        "No video stream in {}",
                        path.display()
                    ))
                })?;
            (
                stream.index(),
                stream.time_base(),
                rational_to_fps(stream.avg_frame_rate()),
                stream.frames(),
                stream.parameters(),
            )
        };

        let video_decoder = codec::context::Context::from_parameters(parameters)
            .and_then(|c| c.decoder().video())
            .map_err(|e| DomainError::SourceUnavailable(format!("Failed to create decoder: {}", e)))?;

        let scaler_ctx = scaling::Context::get(
            video_decoder.format(),
            video_decoder.width(),
            video_decoder.height(),
            format::Pixel::RGB24,
            video_decoder.width(),
            video_decoder.height(),
            scaling::flag::Flags::BILINEAR,
        )
        .map_err(|e| DomainError::Decode(format!("Failed to create pixel converter: {}", e)))?;

        let frame_count = if stream_frames > 0 {
            stream_frames as u64
        } else {
            let seconds = input_ctx.duration() as f64 / f64::from(ffmpeg_next::ffi::AV_TIME_BASE);
            let fps = if fps > 0.0 { fps } else { FALLBACK_FPS };
            (seconds * fps).round().max(0.0) as u64
        };

        let properties = VideoProperties::new(
            frame_count,
            video_decoder.width(),
            video_decoder.height(),
            fps,
        )?;

        debug!(
            path = %path.display(),
            frames = properties.frame_count,
            width = properties.width,
            height = properties.height,
            fps = properties.fps,
            "Opened video source"
        );

        Ok(Self {
            path: path.to_path_buf(),
            input_ctx,
            video_decoder,
            scaler_ctx,
            stream_index,
            time_base,
            properties,
            position: 0,
            eof_sent: false,
        })
    }

    /// Frame index of a decoded frame from its presentation timestamp
    fn frame_index_of(&self, decoded: &frame::Video) -> Option<FrameIndex> {
        let pts = decoded.timestamp().or_else(|| decoded.pts())?;
        let seconds = pts as f64 * f64::from(self.time_base);
        Some((seconds * self.properties.effective_fps()).round().max(0.0) as FrameIndex)
    }

    fn to_rgb_image(&mut self, decoded: &frame::Video) -> Result<RgbImage, DomainError> {
        let mut rgb_frame = frame::Video::empty();
        self.scaler_ctx
            .run(decoded, &mut rgb_frame)
            .map_err(|e| DomainError::Decode(format!("Pixel conversion failed: {}", e)))?;

        let width = rgb_frame.width();
        let height = rgb_frame.height();
        let stride = rgb_frame.stride(0);
        let row_bytes = width as usize * 3;
        let raw = rgb_frame.data(0);
        let mut pixels = Vec::with_capacity(row_bytes * height as usize);
        for row in 0..height as usize {
            let start = row * stride;
            pixels.extend_from_slice(&raw[start..start + row_bytes]);
        }

        RgbImage::from_raw(width, height, pixels)
            .ok_or_else(|| DomainError::Decode("Decoded frame has unexpected size".to_string()))
    }

    /// Pull the next decoded frame from the stream, draining the decoder at end of file
    fn next_decoded(&mut self) -> Result<Option<frame::Video>, DomainError> {
        let mut decoded = frame::Video::empty();
        loop {
            if self.video_decoder.receive_frame(&mut decoded).is_ok() {
                return Ok(Some(decoded));
            }
            if self.eof_sent {
                return Ok(None);
            }

            let mut sent = false;
            for (stream, packet) in self.input_ctx.packets() {
                if stream.index() != self.stream_index {
                    continue;
                }
                if let Err(e) = self.video_decoder.send_packet(&packet) {
                    warn!(path = %self.path.display(), "Skipping undecodable packet: {}", e);
                    continue;
                }
                sent = true;
                break;
            }

            if !sent {
                self.video_decoder
                    .send_eof()
                    .map_err(|e| DomainError::Decode(format!("Failed to flush decoder: {}", e)))?;
                self.eof_sent = true;
            }
        }
    }
}

impl FrameSource for FfmpegFrameSource {
    fn properties(&self) -> VideoProperties {
        self.properties
    }

    fn position(&self) -> FrameIndex {
        self.position
    }

    fn seek(&mut self, frame: FrameIndex) -> Result<(), DomainError> {
        if frame >= self.properties.frame_count {
            return Err(DomainError::Decode(format!(
                "Frame {} is past the end ({} frames)",
                frame, self.properties.frame_count
            )));
        }
        if frame == self.position {
            return Ok(());
        }

        let seconds = frame as f64 / self.properties.effective_fps();
        let timestamp = (seconds * f64::from(ffmpeg_next::ffi::AV_TIME_BASE)) as i64;
        self.input_ctx
            .seek(timestamp, ..=timestamp)
            .map_err(|e| DomainError::Decode(format!("Seek to frame {} failed: {}", frame, e)))?;
        self.video_decoder.flush();
        self.eof_sent = false;
        self.position = frame;
        Ok(())
    }

    fn read_frame(&mut self) -> Result<DecodedFrame, DomainError> {
        let target = self.position;
        while let Some(decoded) = self.next_decoded()? {
            // Backward seeks land on an earlier keyframe; discard the pre-roll.
            let index = self.frame_index_of(&decoded).unwrap_or(target);
            if index < target {
                continue;
            }
            let image = self.to_rgb_image(&decoded)?;
            self.position = index + 1;
            return Ok(DecodedFrame { index, image });
        }

        Err(DomainError::Decode(format!(
            "No frame at or after {} in {}",
            target,
            self.path.display()
        )))
    }
}

fn rational_to_fps(rate: Rational) -> f64 {
    if rate.numerator() <= 0 || rate.denominator() <= 0 {
        0.0
    } else {
        f64::from(rate)
    }
}
