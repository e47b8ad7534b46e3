//! V4L2 camera snapshots via the `v4l` crate.

use crate::frame::{self, Frame, FrameError};
use std::path::Path;
use thiserror::Error;
use v4l::buffer::Type as BufType;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;
use visiotrack_core::CapturedImage;

const REQUESTED_WIDTH: u32 = 1280;
const REQUESTED_HEIGHT: u32 = 720;
const MMAP_BUFFERS: u32 = 4;
const EBUSY: i32 = 16;
const DARK_THRESHOLD_PCT: f32 = 0.95;
/// Raw captures tried per snapshot before giving up on dark frames.
const MAX_SNAPSHOT_ATTEMPTS: usize = 10;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error("device busy")]
    DeviceBusy,
    #[error("format negotiation failed: {0}")]
    FormatNegotiationFailed(String),
    #[error("streaming not supported")]
    StreamingNotSupported,
    #[error("only dark frames captured; check lighting or lens cover")]
    TooDark,
    #[error("frame conversion failed: {0}")]
    Frame(#[from] FrameError),
}

/// Info about a discovered V4L2 device.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub path: String,
    pub name: String,
    pub driver: String,
    pub bus: String,
}

/// Negotiated pixel format for the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// YUYV 4:2:2 packed, converted to RGB.
    Yuyv,
    /// 8-bit grayscale, replicated to RGB.
    Grey,
    /// 16-bit little-endian grayscale, downscaled to 8-bit.
    Y16,
}

/// V4L2 camera device handle.
pub struct Camera {
    device: Device,
    pub width: u32,
    pub height: u32,
    pub device_path: String,
    pub fourcc: FourCC,
    pixel_format: PixelFormat,
}

impl PixelFormat {
    fn from_fourcc(fourcc: FourCC) -> Option<Self> {
        match &fourcc.repr {
            b"YUYV" => Some(PixelFormat::Yuyv),
            b"GREY" => Some(PixelFormat::Grey),
            b"Y16 " | b"Y16\0" => Some(PixelFormat::Y16),
            _ => None,
        }
    }
}

fn is_capture_device(caps: &v4l::capability::Capabilities) -> bool {
    caps.capabilities
        .contains(v4l::capability::Flags::VIDEO_CAPTURE)
}

impl Camera {
    /// Open the webcam at `device_path` and negotiate a snapshot format.
    pub fn open(device_path: &str) -> Result<Self, CameraError> {
        if !Path::new(device_path).exists() {
            return Err(CameraError::DeviceNotFound(device_path.to_string()));
        }

        let device = Device::with_path(device_path).map_err(|e| match e.raw_os_error() {
            Some(EBUSY) => CameraError::DeviceBusy,
            _ => CameraError::DeviceNotFound(format!("{device_path}: {e}")),
        })?;
        let caps = device
            .query_caps()
            .map_err(|e| CameraError::CaptureFailed(format!("query capabilities: {e}")))?;
        if !is_capture_device(&caps) {
            return Err(CameraError::StreamingNotSupported);
        }

        let mut wanted = device
            .format()
            .map_err(|e| CameraError::FormatNegotiationFailed(format!("read format: {e}")))?;
        wanted.fourcc = FourCC::new(b"YUYV");
        wanted.width = REQUESTED_WIDTH;
        wanted.height = REQUESTED_HEIGHT;
        let format = device
            .set_format(&wanted)
            .map_err(|e| CameraError::FormatNegotiationFailed(format!("set format: {e}")))?;

        // Monochrome webcams answer with GREY or Y16.
        let pixel_format = PixelFormat::from_fourcc(format.fourcc).ok_or_else(|| {
            CameraError::FormatNegotiationFailed(format!(
                "{} offers {}, need YUYV, GREY or Y16",
                caps.card, format.fourcc
            ))
        })?;

        tracing::info!(
            device = device_path,
            card = %caps.card,
            width = format.width,
            height = format.height,
            fourcc = %format.fourcc,
            "camera ready"
        );

        Ok(Self {
            device,
            width: format.width,
            height: format.height,
            device_path: device_path.to_string(),
            fourcc: format.fourcc,
            pixel_format,
        })
    }

    /// Take one snapshot, discarding `warmup_frames` first so auto-exposure
    /// can settle, and skipping dark frames.
    pub fn snapshot(&self, warmup_frames: usize) -> Result<Frame, CameraError> {
        let mut stream = MmapStream::with_buffers(&self.device, BufType::VideoCapture, MMAP_BUFFERS)
            .map_err(|e| CameraError::CaptureFailed(format!("failed to create mmap stream: {e}")))?;

        for _ in 0..warmup_frames {
            stream.next().map_err(|e| {
                CameraError::CaptureFailed(format!("failed to dequeue warmup buffer: {e}"))
            })?;
        }

        for _ in 0..MAX_SNAPSHOT_ATTEMPTS {
            let (buf, meta) = stream
                .next()
                .map_err(|e| CameraError::CaptureFailed(format!("failed to dequeue buffer: {e}")))?;

            let luma = self.buf_to_luma(buf)?;
            if frame::is_dark_frame(&luma, DARK_THRESHOLD_PCT) {
                tracing::debug!(seq = meta.sequence, "skipping dark frame");
                continue;
            }

            let data = match self.pixel_format {
                PixelFormat::Yuyv => frame::yuyv_to_rgb(buf, self.width, self.height)?,
                PixelFormat::Grey | PixelFormat::Y16 => frame::grey_to_rgb(&luma),
            };
            tracing::info!(seq = meta.sequence, "snapshot captured");
            return Ok(Frame {
                data,
                width: self.width,
                height: self.height,
                sequence: meta.sequence,
            });
        }

        Err(CameraError::TooDark)
    }

    /// Snapshot encoded as a JPEG ready for analysis.
    pub fn capture_image(&self, warmup_frames: usize) -> Result<CapturedImage, CameraError> {
        Ok(self.snapshot(warmup_frames)?.to_captured_image()?)
    }

    /// Luma plane of a raw buffer, based on the negotiated format.
    fn buf_to_luma(&self, buf: &[u8]) -> Result<Vec<u8>, CameraError> {
        let pixels = (self.width * self.height) as usize;

        match self.pixel_format {
            PixelFormat::Grey => {
                if buf.len() < pixels {
                    return Err(CameraError::CaptureFailed(format!(
                        "GREY buffer too short: expected {pixels}, got {}",
                        buf.len()
                    )));
                }
                Ok(buf[..pixels].to_vec())
            }
            PixelFormat::Y16 => {
                let expected_bytes = pixels * 2;
                if buf.len() < expected_bytes {
                    return Err(CameraError::CaptureFailed(format!(
                        "Y16 buffer too short: expected {expected_bytes}, got {}",
                        buf.len()
                    )));
                }
                // High byte of each little-endian sample.
                Ok(buf[..expected_bytes].iter().skip(1).step_by(2).copied().collect())
            }
            PixelFormat::Yuyv => {
                let expected_bytes = pixels * 2;
                if buf.len() < expected_bytes {
                    return Err(FrameError::InvalidLength {
                        expected: expected_bytes,
                        actual: buf.len(),
                    }
                    .into());
                }
                Ok(frame::yuyv_luma(&buf[..expected_bytes]))
            }
        }
    }

    /// Capture-capable devices among `/dev/video0` to `/dev/video15`.
    pub fn list_devices() -> Vec<DeviceInfo> {
        (0..16)
            .map(|i| format!("/dev/video{i}"))
            .filter(|path| Path::new(path).exists())
            .filter_map(|path| {
                let caps = Device::with_path(&path).ok()?.query_caps().ok()?;
                is_capture_device(&caps).then(|| DeviceInfo {
                    path,
                    name: caps.card,
                    driver: caps.driver,
                    bus: caps.bus,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_format_from_fourcc() {
        assert_eq!(PixelFormat::from_fourcc(FourCC::new(b"YUYV")), Some(PixelFormat::Yuyv));
        assert_eq!(PixelFormat::from_fourcc(FourCC::new(b"GREY")), Some(PixelFormat::Grey));
        assert_eq!(PixelFormat::from_fourcc(FourCC::new(b"Y16 ")), Some(PixelFormat::Y16));
        assert_eq!(PixelFormat::from_fourcc(FourCC::new(b"MJPG")), None);
    }

    #[test]
    fn test_open_missing_device() {
        assert!(matches!(
            Camera::open("/dev/visiotrack-no-such-camera"),
            Err(CameraError::DeviceNotFound(_))
        ));
    }
}
