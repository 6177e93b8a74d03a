//! Image encoding: bound the pixel size, then negotiate JPEG quality
//! against the byte cap.
//!
//! Multimodal APIs cap each image at a few megabytes and cap its longest
//! edge. Dimensions are fixed first (one Lanczos resample), then the
//! bitmap is encoded at decreasing quality until it fits. Encoding happens
//! in memory so the cap is checked before anything touches the disk.

use crate::config::JpegPolicy;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};
use tracing::{debug, warn};

/// A JPEG-encoded page ready to be written.
#[derive(Debug, Clone)]
pub struct EncodedJpeg {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub quality: u8,
    /// Still above `max_bytes` at `min_quality`.
    pub oversized: bool,
}

/// Target dimensions for an image whose longest edge must not exceed
/// `max_dimension`. Returns `None` when no resize is needed.
///
/// Scaled dimensions are truncated, never rounded, and never below 1 px.
pub fn fit_within(width: u32, height: u32, max_dimension: u32) -> Option<(u32, u32)> {
    let max_dimension = max_dimension.max(1);
    let longest = width.max(height);
    if longest <= max_dimension {
        return None;
    }
    // Integer arithmetic: the longest edge lands exactly on max_dimension.
    let scale = |side: u32| {
        let scaled = u64::from(side) * u64::from(max_dimension) / u64::from(longest);
        (scaled as u32).clamp(1, max_dimension)
    };
    Some((scale(width), scale(height)))
}

/// Downscale `img` so its longest edge is at most `max_dimension`.
pub fn downscale(img: DynamicImage, max_dimension: u32) -> DynamicImage {
    match fit_within(img.width(), img.height(), max_dimension) {
        Some((w, h)) => {
            debug!(
                "Downscaling {}x{} → {}x{} px",
                img.width(),
                img.height(),
                w,
                h
            );
            img.resize_exact(w, h, FilterType::Lanczos3)
        }
        None => img,
    }
}

/// Encode an RGB bitmap as JPEG at a single quality.
pub fn encode_jpeg(rgb: &RgbImage, quality: u8) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality).encode_image(rgb)?;
    Ok(buf)
}

/// The sequence of qualities tried under `policy`: initial, then down by
/// `step`, ending exactly at `min_quality`.
pub fn quality_ladder(policy: &JpegPolicy) -> Vec<u8> {
    let mut ladder = vec![policy.initial_quality];
    let mut q = policy.initial_quality;
    while q > policy.min_quality {
        q = q.saturating_sub(policy.step.max(1)).max(policy.min_quality);
        ladder.push(q);
    }
    ladder
}

/// Encode `img` as JPEG, lowering quality until it fits `policy.max_bytes`.
///
/// If even `min_quality` is too large, the floor-quality encoding is
/// returned with `oversized = true`; the caller writes it anyway.
pub fn encode_within_cap(
    img: &DynamicImage,
    policy: &JpegPolicy,
) -> Result<EncodedJpeg, image::ImageError> {
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();

    let mut last: Option<(u8, Vec<u8>)> = None;
    for quality in quality_ladder(policy) {
        let bytes = encode_jpeg(&rgb, quality)?;
        if bytes.len() <= policy.max_bytes {
            return Ok(EncodedJpeg {
                bytes,
                width,
                height,
                quality,
                oversized: false,
            });
        }
        debug!(
            "JPEG at quality {} is {} bytes (cap {}), lowering",
            quality,
            bytes.len(),
            policy.max_bytes
        );
        last = Some((quality, bytes));
    }

    // The ladder is never empty, so `last` is set whenever we get here.
    let (quality, bytes) = last.unwrap_or_default();
    warn!(
        "JPEG still {} bytes at floor quality {} (cap {})",
        bytes.len(),
        quality,
        policy.max_bytes
    );
    Ok(EncodedJpeg {
        bytes,
        width,
        height,
        quality,
        oversized: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, Rgba, RgbaImage};

    /// High-entropy image: JPEG size depends strongly on quality.
    fn noise(w: u32, h: u32) -> DynamicImage {
        let mut state: u32 = 0x1234_5678;
        let img = RgbImage::from_fn(w, h, |_, _| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            let [a, b, c, _] = state.to_le_bytes();
            Rgb([a, b, c])
        });
        DynamicImage::ImageRgb8(img)
    }

    fn policy(max_bytes: usize) -> JpegPolicy {
        JpegPolicy {
            max_bytes,
            ..JpegPolicy::default()
        }
    }

    #[test]
    fn default_ladder_steps_by_ten_to_thirty() {
        assert_eq!(quality_ladder(&JpegPolicy::default()), vec![70, 60, 50, 40, 30]);
    }

    #[test]
    fn ladder_lands_exactly_on_floor() {
        let p = JpegPolicy {
            initial_quality: 75,
            min_quality: 30,
            step: 20,
            max_bytes: 1,
        };
        assert_eq!(quality_ladder(&p), vec![75, 55, 35, 30]);
    }

    #[test]
    fn ladder_single_step_when_initial_is_floor() {
        let p = JpegPolicy {
            initial_quality: 30,
            ..JpegPolicy::default()
        };
        assert_eq!(quality_ladder(&p), vec![30]);
    }

    #[test]
    fn fit_within_truncates() {
        // 5000x3000 → scale 0.8192 → 4096 x 2457.6 → 2457
        assert_eq!(fit_within(5000, 3000, 4096), Some((4096, 2457)));
        assert_eq!(fit_within(3000, 5000, 4096), Some((2457, 4096)));
        assert_eq!(fit_within(4096, 100, 4096), None);
        assert_eq!(fit_within(10_000, 1, 100), Some((100, 1)));
    }

    #[test]
    fn fit_within_zero_cap_means_one_pixel() {
        assert_eq!(fit_within(10, 5, 0), Some((1, 1)));
    }

    #[test]
    fn downscale_bounds_longest_edge() {
        let img = noise(300, 120);
        let out = downscale(img, 100);
        assert_eq!((out.width(), out.height()), (100, 40));
    }

    #[test]
    fn small_image_keeps_initial_quality() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            32,
            32,
            Rgba([255, 0, 0, 255]),
        ));
        let enc = encode_within_cap(&img, &JpegPolicy::default()).unwrap();
        assert_eq!(enc.quality, 70);
        assert!(!enc.oversized);
        assert_eq!((enc.width, enc.height), (32, 32));
        // JPEG SOI marker
        assert_eq!(&enc.bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn quality_drops_until_under_cap() {
        let img = noise(256, 256);
        let rgb = img.to_rgb8();
        let at_70 = encode_jpeg(&rgb, 70).unwrap().len();
        let at_30 = encode_jpeg(&rgb, 30).unwrap().len();
        assert!(at_70 > at_30, "noise must compress better at low quality");

        let enc = encode_within_cap(&img, &policy(at_30)).unwrap();
        assert!(enc.bytes.len() <= at_30);
        assert!(enc.quality < 70 && enc.quality >= 30);
        assert!(!enc.oversized);
    }

    #[test]
    fn floor_quality_result_is_flagged_when_still_too_big() {
        let img = noise(128, 128);
        let enc = encode_within_cap(&img, &policy(100)).unwrap();
        assert_eq!(enc.quality, 30);
        assert!(enc.oversized);
        assert!(enc.bytes.len() > 100);
    }
}
