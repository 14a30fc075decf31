//! facecheck-media — Frame source for the verification pipeline.
//!
//! Converts decoded images into canonical RGB8 frames and loads the
//! reference-image / video-frame dataset layout from disk.

pub mod dataset;
pub mod frame;

pub use dataset::{discover_videos, load_frame, load_reference_images, ReferenceImage, SourceError, Video};
pub use frame::{ChannelOrder, Frame, FrameError};
