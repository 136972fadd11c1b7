// Adapters - External system implementations

pub mod exec_ffmpeg;
pub mod ffmpeg_decode;
pub mod gemini_caption;
pub mod json_session;
pub mod toml_config;

// Re-export adapters
pub use exec_ffmpeg::FFmpegAdapter;
pub use ffmpeg_decode::FfmpegVideoOpener;
pub use gemini_caption::{GeminiCaptionAdapter, GeminiSettings};
pub use json_session::JsonSessionAdapter;
pub use toml_config::{AppConfig, TomlConfigAdapter};
