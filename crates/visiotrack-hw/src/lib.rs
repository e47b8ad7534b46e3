//! visiotrack-hw: where visitor photos come from.
//!
//! Either a live V4L2 snapshot or an uploaded image file. Both produce a
//! [`CapturedImage`](visiotrack_core::CapturedImage): a data-URL preview for
//! the record plus JPEG bytes for the analyzer.

pub mod camera;
pub mod frame;
pub mod upload;

pub use camera::{Camera, CameraError, PixelFormat};
pub use frame::Frame;
pub use upload::{image_from_bytes, load_upload, SourceError};
