//! Frame type and pixel conversion: YUYV/GREY to RGB, dark-frame detection.

use image::{Rgb, RgbImage};

/// Luma below this counts as dark.
const DARK_LUMA: u32 = 32;

/// A captured RGB frame.
#[derive(Clone)]
pub struct Frame {
    pub image: RgbImage,
    pub sequence: u32,
    pub is_dark: bool,
}

impl Frame {
    /// Wrap an already-decoded image, classifying it as dark or not.
    pub fn new(image: RgbImage, sequence: u32) -> Self {
        let is_dark = is_dark_frame(&image, 0.95);
        Self { image, sequence, is_dark }
    }

    /// Average luma (0.0–255.0).
    pub fn avg_brightness(&self) -> f32 {
        let count = self.image.width() as usize * self.image.height() as usize;
        if count == 0 {
            return 0.0;
        }
        self.image.pixels().map(|p| luma(p) as f32).sum::<f32>() / count as f32
    }
}

/// BT.601 luma of an RGB pixel.
fn luma(p: &Rgb<u8>) -> u32 {
    (299 * p[0] as u32 + 587 * p[1] as u32 + 114 * p[2] as u32) / 1000
}

/// Convert packed YUYV (4:2:2) to RGB using BT.601 limited-range coefficients.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V]; both pixels share U/V.
pub fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Result<RgbImage, FrameError> {
    let expected = width as usize * height as usize * 2;
    if yuyv.len() < expected {
        return Err(FrameError::InvalidLength { expected, actual: yuyv.len() });
    }

    let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
    for chunk in yuyv[..expected].chunks_exact(4) {
        let (u, v) = (chunk[1] as i32 - 128, chunk[3] as i32 - 128);
        for y in [chunk[0], chunk[2]] {
            let c = 298 * (y as i32 - 16);
            rgb.push(clamp_u8((c + 409 * v + 128) >> 8));
            rgb.push(clamp_u8((c - 100 * u - 208 * v + 128) >> 8));
            rgb.push(clamp_u8((c + 516 * u + 128) >> 8));
        }
    }

    RgbImage::from_raw(width, height, rgb).ok_or(FrameError::InvalidLength {
        expected,
        actual: yuyv.len(),
    })
}

/// Replicate an 8-bit grayscale buffer into RGB.
pub fn grey_to_rgb(grey: &[u8], width: u32, height: u32) -> Result<RgbImage, FrameError> {
    let expected = width as usize * height as usize;
    if grey.len() < expected {
        return Err(FrameError::InvalidLength { expected, actual: grey.len() });
    }
    let rgb = grey[..expected].iter().flat_map(|&g| [g, g, g]).collect();
    RgbImage::from_raw(width, height, rgb).ok_or(FrameError::InvalidLength {
        expected,
        actual: grey.len(),
    })
}

fn clamp_u8(v: i32) -> u8 {
    v.clamp(0, 255) as u8
}

/// Check if a frame is dark: more than `threshold_pct` of pixels have luma below 32.
pub fn is_dark_frame(image: &RgbImage, threshold_pct: f32) -> bool {
    let total = image.width() as usize * image.height() as usize;
    if total == 0 {
        return true;
    }
    let dark = image.pixels().filter(|p| luma(p) < DARK_LUMA).count();
    (dark as f32 / total as f32) > threshold_pct
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid buffer length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuyv_black_and_white() {
        // 2x1: [Y0=16, U=128, Y1=235, V=128] → black then white.
        let rgb = yuyv_to_rgb(&[16, 128, 235, 128], 2, 1).unwrap();
        assert_eq!(*rgb.get_pixel(0, 0), Rgb([0, 0, 0]));
        assert_eq!(*rgb.get_pixel(1, 0), Rgb([255, 255, 255]));
    }

    #[test]
    fn test_yuyv_red_dominant() {
        // High V pushes red up and green down.
        let rgb = yuyv_to_rgb(&[81, 90, 81, 240], 2, 1).unwrap();
        let p = rgb.get_pixel(0, 0);
        assert!(p[0] > 200 && p[1] < 60, "got {p:?}");
    }

    #[test]
    fn test_yuyv_invalid_length() {
        assert!(yuyv_to_rgb(&[100, 128], 2, 1).is_err());
    }

    #[test]
    fn test_grey_to_rgb() {
        let rgb = grey_to_rgb(&[10, 200], 2, 1).unwrap();
        assert_eq!(*rgb.get_pixel(0, 0), Rgb([10, 10, 10]));
        assert_eq!(*rgb.get_pixel(1, 0), Rgb([200, 200, 200]));
        assert!(grey_to_rgb(&[1], 2, 1).is_err());
    }

    #[test]
    fn test_dark_frame() {
        assert!(is_dark_frame(&RgbImage::new(10, 10), 0.95));
        assert!(!is_dark_frame(&RgbImage::from_pixel(10, 10, Rgb([128, 128, 128])), 0.95));
        assert!(is_dark_frame(&RgbImage::new(0, 0), 0.95));
    }

    #[test]
    fn test_dark_frame_borderline() {
        // 94 dark pixels of 100 → not dark at 95%.
        let mut img = RgbImage::from_pixel(10, 10, Rgb([10, 10, 10]));
        for x in 0..6 {
            img.put_pixel(x, 0, Rgb([200, 200, 200]));
        }
        assert!(!is_dark_frame(&img, 0.95));
    }

    #[test]
    fn test_avg_brightness() {
        let frame = Frame::new(RgbImage::from_pixel(2, 2, Rgb([100, 100, 100])), 0);
        assert!((frame.avg_brightness() - 100.0).abs() < 1e-3);
        assert!(!frame.is_dark);
    }
}
