//! Image re-encoding into the virtual format.
//!
//! The engine treats the codec as opaque: bytes and [`CodecParams`] in,
//! bytes out. [`WebpCodec`] is the bundled implementation on top of the
//! `image` crate; any `Fn(&[u8], &CodecParams) -> Result<Vec<u8>, CodecError>`
//! closure is a codec too.

use image::codecs::webp::WebPEncoder;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default encoder quality.
pub const DEFAULT_QUALITY: f32 = 80.0;

/// Parameters passed through to the codec untouched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecParams {
    /// Lossy quality, 0 to 100.
    pub quality: f32,
    /// Request lossless output.
    pub lossless: bool,
}

impl Default for CodecParams {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
            lossless: false,
        }
    }
}

/// Errors that can occur while transcoding.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The input could not be decoded as an image.
    #[error("Failed to decode source image: {0}")]
    Decode(#[source] image::ImageError),

    /// The decoded image could not be encoded.
    #[error("Failed to encode image: {0}")]
    Encode(#[source] image::ImageError),

    /// The codec does not handle this input.
    #[error("Unsupported input: {0}")]
    Unsupported(String),
}

/// Re-encodes image bytes into the virtual format.
pub trait Codec: Send + Sync {
    /// Transcode `bytes` with `params`.
    ///
    /// # Errors
    ///
    /// [`CodecError`] on malformed or unsupported input.
    fn transcode(&self, bytes: &[u8], params: &CodecParams) -> Result<Vec<u8>, CodecError>;
}

impl<F> Codec for F
where
    F: Fn(&[u8], &CodecParams) -> Result<Vec<u8>, CodecError> + Send + Sync,
{
    fn transcode(&self, bytes: &[u8], params: &CodecParams) -> Result<Vec<u8>, CodecError> {
        self(bytes, params)
    }
}

/// WebP encoder backed by the `image` crate.
///
/// The `image` WebP encoder only writes lossless output, so `quality` is
/// accepted but has no effect here.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebpCodec;

impl WebpCodec {
    /// Create a new WebP codec.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Codec for WebpCodec {
    fn transcode(&self, bytes: &[u8], params: &CodecParams) -> Result<Vec<u8>, CodecError> {
        if bytes.is_empty() {
            return Err(CodecError::Unsupported("empty input".to_string()));
        }

        let img = image::load_from_memory(bytes).map_err(CodecError::Decode)?;
        if !params.lossless {
            log::debug!(
                "Lossless WebP encoder in use, quality {} ignored",
                params.quality
            );
        }

        // The encoder only takes 8-bit luma or RGB(A)
        let img = if img.color().has_alpha() {
            DynamicImage::ImageRgba8(img.to_rgba8())
        } else {
            DynamicImage::ImageRgb8(img.to_rgb8())
        };

        let mut out = Vec::new();
        img.write_with_encoder(WebPEncoder::new_lossless(&mut out))
            .map_err(CodecError::Encode)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 0])
        });
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_webp_codec_produces_webp() {
        let out = WebpCodec::new()
            .transcode(&png_bytes(32, 32), &CodecParams::default())
            .unwrap();
        assert_eq!(&out[0..4], b"RIFF");
        assert_eq!(&out[8..12], b"WEBP");
    }

    #[test]
    fn test_webp_codec_output_decodes_to_same_dimensions() {
        let out = WebpCodec::new()
            .transcode(&png_bytes(17, 9), &CodecParams::default())
            .unwrap();
        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (17, 9));
    }

    #[test]
    fn test_webp_codec_rejects_garbage() {
        let err = WebpCodec::new()
            .transcode(b"definitely not an image", &CodecParams::default())
            .unwrap_err();
        assert!(matches!(err, CodecError::Decode(_)));
    }

    #[test]
    fn test_webp_codec_rejects_empty() {
        let err = WebpCodec::new()
            .transcode(&[], &CodecParams::default())
            .unwrap_err();
        assert!(matches!(err, CodecError::Unsupported(_)));
    }

    #[test]
    fn test_codec_params_default() {
        let params = CodecParams::default();
        assert_eq!(params.quality, 80.0);
        assert!(!params.lossless);
    }
}
