//! Photo upload: validate an image file and prepare it for analysis.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::path::Path;
use thiserror::Error;
use visiotrack_core::{CapturedImage, ImageMime};

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("unsupported image type {0} (need JPEG, PNG or WebP)")]
    Unsupported(String),
    #[error("not an image file")]
    NotAnImage,
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("image decode/encode failed: {0}")]
    Image(#[from] image::ImageError),
}

/// Read an image file and prepare it for analysis.
pub fn load_upload(path: &Path) -> Result<CapturedImage, SourceError> {
    let bytes = std::fs::read(path).map_err(|source| SourceError::Read {
        path: path.display().to_string(),
        source,
    })?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "read upload");
    image_from_bytes(&bytes)
}

/// Validate raw image bytes and build a [`CapturedImage`].
///
/// The type is sniffed from content, not trusted from a file name. Non-JPEG
/// uploads are transcoded to JPEG for the analyzer; the preview keeps the
/// original encoding.
pub fn image_from_bytes(bytes: &[u8]) -> Result<CapturedImage, SourceError> {
    let format = image::guess_format(bytes).map_err(|_| SourceError::NotAnImage)?;
    let mime = match format {
        ImageFormat::Jpeg => ImageMime::Jpeg,
        ImageFormat::Png => ImageMime::Png,
        ImageFormat::WebP => ImageMime::Webp,
        other => return Err(SourceError::Unsupported(other.to_mime_type().to_string())),
    };

    // Decode even JPEGs so truncated or corrupt files are rejected up front.
    let decoded = image::load_from_memory_with_format(bytes, format)?;
    let jpeg = match mime {
        ImageMime::Jpeg => bytes.to_vec(),
        _ => encode_jpeg(&decoded)?,
    };

    tracing::info!(
        mime = mime.as_str(),
        width = decoded.width(),
        height = decoded.height(),
        "upload accepted"
    );

    Ok(CapturedImage {
        preview: data_url(mime, bytes),
        jpeg_base64: STANDARD.encode(&jpeg),
        mime,
    })
}

/// Encode as baseline JPEG. Alpha is dropped.
pub(crate) fn encode_jpeg(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img.to_rgb8()).write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)?;
    Ok(buf)
}

pub(crate) fn data_url(mime: ImageMime, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime.as_str(), STANDARD.encode(bytes))
}
