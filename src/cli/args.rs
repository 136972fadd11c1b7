//! Command-line argument definitions

use std::path::PathBuf;

use clap::{Args, Subcommand};

/// Arguments for the folder command
#[derive(Args, Debug)]
pub struct FolderArgs {
    /// Folder containing source videos
    pub dir: PathBuf,
}

/// Arguments for the duplicate command
#[derive(Args, Debug)]
pub struct DuplicateArgs {
    /// Display name of the entry to duplicate
    pub display_name: String,
}

/// Arguments for the select command
#[derive(Args, Debug)]
pub struct SelectArgs {
    /// Display name of the entry
    pub display_name: String,

    /// Exclude the entry from exports instead
    #[arg(long)]
    pub off: bool,
}

/// Arguments for the inspect command
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Video file path
    pub video: PathBuf,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Range editing commands
#[derive(Subcommand, Debug)]
pub enum RangesCommand {
    /// List the ranges of a video
    List(RangeVideoArgs),
    /// Add a range
    Add(RangeAddArgs),
    /// Set or clear the crop of a range
    Crop(RangeCropArgs),
    /// Set the duration of a range in frames
    Duration(RangeDurationArgs),
    /// Move a range, keeping its duration
    NudgeStart(RangeNudgeArgs),
    /// Lengthen or shorten a range
    NudgeEnd(RangeNudgeArgs),
    /// Remove a range
    Remove(RangeTargetArgs),
}

/// A video given by display name or path
#[derive(Args, Debug)]
pub struct RangeVideoArgs {
    pub video: String,
}

/// A range given by id or ordinal
#[derive(Args, Debug)]
pub struct RangeTargetArgs {
    pub video: String,
    pub range_id: String,
}

#[derive(Args, Debug)]
pub struct RangeAddArgs {
    pub video: String,

    /// First frame (frame number, `12.5s`, `MM:SS` or `HH:MM:SS`)
    #[arg(long, requires = "end", conflicts_with = "at")]
    pub start: Option<String>,

    /// Frame after the last one
    #[arg(long, requires = "start")]
    pub end: Option<String>,

    /// Start position; the range runs for the default duration
    #[arg(long)]
    pub at: Option<String>,

    /// Duration in frames when adding at a position
    #[arg(long, requires = "at")]
    pub duration: Option<u64>,

    /// Crop in source pixels: x,y,w,h
    #[arg(long)]
    pub crop: Option<String>,
}

#[derive(Args, Debug)]
pub struct RangeCropArgs {
    pub video: String,
    pub range_id: String,

    /// Crop in source pixels: x,y,w,h
    #[arg(long, conflicts_with_all = ["display", "clear"])]
    pub rect: Option<String>,

    /// Crop drawn on a scaled preview: x,y,w,h
    #[arg(long, requires = "surface", conflicts_with = "clear")]
    pub display: Option<String>,

    /// Size of the preview surface: WxH
    #[arg(long)]
    pub surface: Option<String>,

    /// Remove the crop
    #[arg(long)]
    pub clear: bool,

    /// Aspect constraint: free, a preset such as 16:9, or WxH
    #[arg(long)]
    pub aspect: Option<String>,
}

#[derive(Args, Debug)]
pub struct RangeDurationArgs {
    pub video: String,
    pub range_id: String,
    pub frames: u64,
}

#[derive(Args, Debug)]
pub struct RangeNudgeArgs {
    pub video: String,
    pub range_id: String,

    /// Frames to move by; may be negative
    #[arg(allow_negative_numbers = true)]
    pub delta: i64,
}

/// Arguments for the export command
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Output folder
    #[arg(short, long)]
    pub output: PathBuf,

    /// Export cropped clips
    #[arg(long)]
    pub cropped: bool,

    /// Export uncropped clips
    #[arg(long)]
    pub uncropped: bool,

    /// Also export a still of each range's first frame
    #[arg(long)]
    pub image: bool,

    /// Generate captions with the vision-language model
    #[arg(long)]
    pub caption: bool,

    /// Output filename prefix; enables numbered names
    #[arg(long)]
    pub prefix: Option<String>,

    /// Fixed output resolution: WxH
    #[arg(long, conflicts_with = "aspect")]
    pub resolution: Option<String>,

    /// Output aspect ratio: free or W:H
    #[arg(long)]
    pub aspect: Option<String>,

    /// Scale so the longer side has this many pixels; 0 clears the saved value
    #[arg(long)]
    pub longest_edge: Option<u32>,

    /// Trigger phrase prepended to captions
    #[arg(long)]
    pub trigger: Option<String>,

    /// Manual caption text
    #[arg(long)]
    pub text: Option<String>,

    /// Name of the main subject for generated captions
    #[arg(long)]
    pub subject: Option<String>,

    /// Export every entry, not only selected ones
    #[arg(long)]
    pub all: bool,
}

/// Arguments for the caption command
#[derive(Args, Debug)]
pub struct CaptionArgs {
    /// Exported clip or still
    pub artifact: PathBuf,

    /// Trigger phrase prepended to the caption
    #[arg(long)]
    pub trigger: Option<String>,

    /// Caption written if generation fails
    #[arg(long)]
    pub text: Option<String>,

    /// Name of the main subject
    #[arg(long)]
    pub subject: Option<String>,
}

/// Arguments for the preview command
#[derive(Args, Debug)]
pub struct PreviewArgs {
    pub video: String,

    /// Play only this range (id or ordinal)
    #[arg(long)]
    pub range: Option<String>,

    /// Loop the range until interrupted
    #[arg(long = "loop", requires = "range")]
    pub looped: bool,

    /// Start position for forward playback
    #[arg(long, conflicts_with = "range")]
    pub from: Option<String>,

    /// Jumps of `[playback] jump_seconds` applied after the start position; negative moves back
    #[arg(long, conflicts_with = "range", allow_negative_numbers = true)]
    pub jump: Option<i64>,
}

/// Arguments for the convert-fps command
#[derive(Args, Debug)]
pub struct ConvertFpsArgs {
    /// Target frame rate
    #[arg(long)]
    pub fps: u32,

    /// Output sub-folder name
    #[arg(long)]
    pub subdir: Option<String>,

    /// Folder to convert; defaults to the session folder
    #[arg(long)]
    pub folder: Option<PathBuf>,
}
