//! RangeCrop library
//!
//! Define frame ranges and crops on a folder of videos, preview them, and
//! batch-export cropped clips, stills and caption files for training sets.

pub mod adapters;
pub mod app;
pub mod cli;
pub mod domain;
pub mod error;
pub mod ports;
pub mod utils;

// Re-export commonly used types
pub use domain::errors::DomainError;
pub use domain::model::{AspectConstraint, CropRect, FrameIndex, Range, RangeId, VideoProperties};
pub use error::{RangeCropError, RangeCropResult};
