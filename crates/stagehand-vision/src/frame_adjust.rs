use image::{imageops, RgbImage};

/// Integer parameters in 0..=100 with 50 as neutral, exactly as the
/// tracking pipeline's camera settings (C12) describe them.
#[derive(Debug, Clone, Copy)]
pub struct FrameAdjustments {
    pub mirror_x: bool,
    pub mirror_y: bool,
    pub resolution: Option<(u32, u32)>,
    pub rotation: Rotation,
    pub clahe: bool,
    pub brightness: u8,
    pub exposure: u8,
    pub contrast: u8,
    pub saturation: u8,
}

impl Default for FrameAdjustments {
    fn default() -> Self {
        Self {
            mirror_x: false,
            mirror_y: false,
            resolution: None,
            rotation: Rotation::None,
            clahe: false,
            brightness: 50,
            exposure: 50,
            contrast: 50,
            saturation: 50,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    None,
    Clockwise90,
    Rotate180,
    CounterClockwise90,
}

/// Applies the tracking pipeline's frame adjustments in the fixed order the
/// original pipeline used: mirror, resize, rotate, CLAHE, brightness/
/// exposure, contrast, saturation.
pub fn process_frame(frame: &RgbImage, adjustments: &FrameAdjustments) -> RgbImage {
    let mut out = mirror(frame, adjustments.mirror_x, adjustments.mirror_y);

    if let Some((w, h)) = adjustments.resolution {
        out = imageops::resize(&out, w, h, imageops::FilterType::Triangle);
    }

    out = rotate(&out, adjustments.rotation);

    if adjustments.clahe {
        out = apply_clahe_lite(&out);
    }

    if adjustments.brightness != 50 || adjustments.exposure != 50 {
        out = adjust_brightness_exposure(&out, adjustments.brightness, adjustments.exposure);
    }

    if adjustments.contrast != 50 {
        out = adjust_contrast(&out, adjustments.contrast);
    }

    if adjustments.saturation != 50 {
        out = adjust_saturation(&out, adjustments.saturation);
    }

    out
}

fn mirror(frame: &RgbImage, mirror_x: bool, mirror_y: bool) -> RgbImage {
    match (mirror_x, mirror_y) {
        (true, true) => imageops::flip_horizontal(&imageops::flip_vertical(frame)),
        (true, false) => imageops::flip_horizontal(frame),
        (false, true) => imageops::flip_vertical(frame),
        (false, false) => frame.clone(),
    }
}

fn rotate(frame: &RgbImage, rotation: Rotation) -> RgbImage {
    match rotation {
        Rotation::None => frame.clone(),
        Rotation::Clockwise90 => imageops::rotate90(frame),
        Rotation::Rotate180 => imageops::rotate180(frame),
        Rotation::CounterClockwise90 => imageops::rotate270(frame),
    }
}

/// `alpha = clamp(exposure/50, 0, 2)`, `beta = clamp((brightness/50 - 1) *
/// 127.5, -127.5, 127.5)`, applied per-channel as `alpha*x + beta`.
fn adjust_brightness_exposure(frame: &RgbImage, brightness: u8, exposure: u8) -> RgbImage {
    let alpha = (exposure as f32 / 50.0).clamp(0.0, 2.0);
    let beta = ((brightness as f32 / 50.0 - 1.0) * 127.5).clamp(-127.5, 127.5);

    let mut out = frame.clone();
    for pixel in out.pixels_mut() {
        for channel in pixel.0.iter_mut() {
            *channel = (*channel as f32 * alpha + beta).round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

/// Scales each pixel around the frame's mean intensity by
/// `clamp(contrast/50, 0, 2)`.
fn adjust_contrast(frame: &RgbImage, contrast: u8) -> RgbImage {
    let factor = (contrast as f32 / 50.0).clamp(0.0, 2.0);
    let mean = mean_intensity(frame);

    let mut out = frame.clone();
    for pixel in out.pixels_mut() {
        for channel in pixel.0.iter_mut() {
            let adjusted = (*channel as f32 - mean) * factor + mean;
            *channel = adjusted.round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

fn mean_intensity(frame: &RgbImage) -> f32 {
    let mut sum = 0u64;
    let mut count = 0u64;
    for pixel in frame.pixels() {
        for channel in pixel.0.iter() {
            sum += *channel as u64;
            count += 1;
        }
    }
    if count == 0 {
        0.0
    } else {
        sum as f32 / count as f32
    }
}

/// Scales HSV saturation by `clamp(saturation/50, 0, 2)`.
fn adjust_saturation(frame: &RgbImage, saturation: u8) -> RgbImage {
    let factor = (saturation as f32 / 50.0).clamp(0.0, 2.0);
    let mut out = frame.clone();

    for pixel in out.pixels_mut() {
        let (r, g, b) = (pixel[0] as f32, pixel[1] as f32, pixel[2] as f32);
        let (h, s, v) = rgb_to_hsv(r, g, b);
        let s = (s * factor).clamp(0.0, 1.0);
        let (r, g, b) = hsv_to_rgb(h, s, v);
        pixel.0 = [r as u8, g as u8, b as u8];
    }
    out
}

/// Tile-based luma equalization with a clip limit, approximating CLAHE
/// without a dedicated crate: each 8x8 tile's luma histogram is clipped and
/// redistributed, then each pixel's RGB channels are rescaled by the ratio
/// between its new and old luma so colour is preserved.
fn apply_clahe_lite(frame: &RgbImage) -> RgbImage {
    const TILE: u32 = 8;
    const CLIP_LIMIT: u32 = 40;

    let (width, height) = frame.dimensions();
    let mut out = frame.clone();

    let tiles_x = width.div_ceil(TILE);
    let tiles_y = height.div_ceil(TILE);

    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx * TILE;
            let y0 = ty * TILE;
            let x1 = (x0 + TILE).min(width);
            let y1 = (y0 + TILE).min(height);

            let mut histogram = [0u32; 256];
            for y in y0..y1 {
                for x in x0..x1 {
                    let p = frame.get_pixel(x, y);
                    histogram[luma(p[0], p[1], p[2]) as usize] += 1;
                }
            }

            clip_histogram(&mut histogram, CLIP_LIMIT);
            let cdf = cumulative_distribution(&histogram);

            for y in y0..y1 {
                for x in x0..x1 {
                    let p = frame.get_pixel(x, y);
                    let old_luma = luma(p[0], p[1], p[2]);
                    let new_luma = cdf[old_luma as usize];
                    let ratio = if old_luma == 0 {
                        1.0
                    } else {
                        new_luma as f32 / old_luma as f32
                    };
                    let out_pixel = out.get_pixel_mut(x, y);
                    out_pixel.0 = [
                        (p[0] as f32 * ratio).clamp(0.0, 255.0) as u8,
                        (p[1] as f32 * ratio).clamp(0.0, 255.0) as u8,
                        (p[2] as f32 * ratio).clamp(0.0, 255.0) as u8,
                    ];
                }
            }
        }
    }

    out
}

fn luma(r: u8, g: u8, b: u8) -> u8 {
    (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32).round() as u8
}

fn clip_histogram(histogram: &mut [u32; 256], clip_limit: u32) {
    let mut excess = 0u32;
    for bin in histogram.iter_mut() {
        if *bin > clip_limit {
            excess += *bin - clip_limit;
            *bin = clip_limit;
        }
    }
    let redistribute = excess / 256;
    for bin in histogram.iter_mut() {
        *bin += redistribute;
    }
}

fn cumulative_distribution(histogram: &[u32; 256]) -> [u8; 256] {
    let total: u32 = histogram.iter().sum();
    let mut cdf = [0u8; 256];
    let mut running = 0u32;
    for (i, count) in histogram.iter().enumerate() {
        running += count;
        cdf[i] = if total == 0 {
            i as u8
        } else {
            ((running as f32 / total as f32) * 255.0).round() as u8
        };
    }
    cdf
}

fn rgb_to_hsv(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let h = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (((g - b) / delta) % 6.0)
    } else if max == g {
        60.0 * (((b - r) / delta) + 2.0)
    } else {
        60.0 * (((r - g) / delta) + 4.0)
    };

    let s = if max == 0.0 { 0.0 } else { delta / max };
    (h, s, max / 255.0)
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> (f32, f32, f32) {
    let c = v * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = v - c;

    let (r1, g1, b1) = if (0.0..60.0).contains(&h) {
        (c, x, 0.0)
    } else if (60.0..120.0).contains(&h) {
        (x, c, 0.0)
    } else if (120.0..180.0).contains(&h) {
        (0.0, c, x)
    } else if (180.0..240.0).contains(&h) {
        (0.0, x, c)
    } else if (240.0..300.0).contains(&h) {
        (x, 0.0, c)
    } else {
        (c, 0.0, x)
    };

    ((r1 + m) * 255.0, (g1 + m) * 255.0, (b1 + m) * 255.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neutral_settings_are_a_no_op() {
        let frame = RgbImage::from_pixel(4, 4, image::Rgb([100, 150, 200]));
        let out = process_frame(&frame, &FrameAdjustments::default());
        assert_eq!(frame, out);
    }

    #[test]
    fn mirror_x_flips_horizontally() {
        let mut frame = RgbImage::new(2, 1);
        frame.put_pixel(0, 0, image::Rgb([1, 1, 1]));
        frame.put_pixel(1, 0, image::Rgb([2, 2, 2]));

        let adjustments = FrameAdjustments {
            mirror_x: true,
            ..Default::default()
        };
        let out = process_frame(&frame, &adjustments);
        assert_eq!(out.get_pixel(0, 0).0, [2, 2, 2]);
        assert_eq!(out.get_pixel(1, 0).0, [1, 1, 1]);
    }

    #[test]
    fn max_brightness_brightens_pixels() {
        let frame = RgbImage::from_pixel(2, 2, image::Rgb([100, 100, 100]));
        let adjustments = FrameAdjustments {
            brightness: 100,
            ..Default::default()
        };
        let out = process_frame(&frame, &adjustments);
        assert!(out.get_pixel(0, 0)[0] > 100);
    }
}
