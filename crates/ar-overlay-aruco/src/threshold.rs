//! Binarization for candidate search and Otsu thresholds for cell decoding.

use image::{GrayImage, Luma};
use serde::{Deserialize, Serialize};

/// How a grayscale frame is split into dark foreground and background.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ThresholdMode {
    /// One global Otsu threshold for the whole frame.
    Otsu,
    /// A pixel is foreground when it is more than `offset` below the mean of
    /// its `(2 * block_radius + 1)²` neighbourhood.
    AdaptiveMean { block_radius: u32, offset: u8 },
}

impl Default for ThresholdMode {
    fn default() -> Self {
        Self::AdaptiveMean {
            block_radius: 7,
            offset: 7,
        }
    }
}

/// Binarize `gray`; dark foreground pixels become 255, the rest 0.
pub fn binarize(gray: &GrayImage, mode: ThresholdMode) -> GrayImage {
    match mode {
        ThresholdMode::Otsu => {
            let t = otsu_threshold_from_samples(gray.as_raw());
            GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
                if gray.get_pixel(x, y).0[0] <= t {
                    Luma([255])
                } else {
                    Luma([0])
                }
            })
        }
        ThresholdMode::AdaptiveMean {
            block_radius,
            offset,
        } => adaptive_mean(gray, block_radius, offset),
    }
}

fn adaptive_mean(gray: &GrayImage, radius: u32, offset: u8) -> GrayImage {
    let (w, h) = gray.dimensions();
    let (wu, hu) = (w as usize, h as usize);
    let mut out = GrayImage::new(w, h);
    if wu == 0 || hu == 0 {
        return out;
    }

    // (w+1) x (h+1) summed-area table
    let stride = wu + 1;
    let mut integral = vec![0u64; stride * (hu + 1)];
    let data = gray.as_raw();
    for y in 0..hu {
        let mut row = 0u64;
        for x in 0..wu {
            row += data[y * wu + x] as u64;
            integral[(y + 1) * stride + x + 1] = integral[y * stride + x + 1] + row;
        }
    }

    let r = radius as usize;
    for y in 0..hu {
        let y0 = y.saturating_sub(r);
        let y1 = (y + r + 1).min(hu);
        for x in 0..wu {
            let x0 = x.saturating_sub(r);
            let x1 = (x + r + 1).min(wu);
            let sum = integral[y1 * stride + x1] + integral[y0 * stride + x0]
                - integral[y0 * stride + x1]
                - integral[y1 * stride + x0];
            let count = ((x1 - x0) * (y1 - y0)) as u64;
            let v = data[y * wu + x] as u64 + offset as u64;
            if v * count < sum {
                out.put_pixel(x as u32, y as u32, Luma([255]));
            }
        }
    }
    out
}

/// Otsu threshold of a set of intensities; values `<= t` form the dark class.
pub(crate) fn otsu_threshold_from_samples(samples: &[u8]) -> u8 {
    if samples.is_empty() {
        return 127;
    }

    let (min_v, max_v) = samples
        .iter()
        .fold((255u8, 0u8), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if min_v == max_v {
        return min_v;
    }

    let mut hist = [0u32; 256];
    for &v in samples {
        hist[v as usize] += 1;
    }
    if hist.iter().filter(|&&h| h > 0).count() <= 2 {
        return ((min_v as u16 + max_v as u16) / 2) as u8;
    }

    let total = samples.len() as f64;
    let sum_total: f64 = hist
        .iter()
        .enumerate()
        .map(|(i, &h)| i as f64 * h as f64)
        .sum();

    let mut sum_b = 0f64;
    let mut w_b = 0f64;
    let mut best_var = -1f64;
    let mut best_t = 127u8;

    for (t, &h) in hist.iter().enumerate() {
        w_b += h as f64;
        if w_b < 1.0 {
            continue;
        }
        let w_f = total - w_b;
        if w_f < 1.0 {
            break;
        }

        sum_b += t as f64 * h as f64;
        let m_b = sum_b / w_b;
        let m_f = (sum_total - sum_b) / w_f;

        let var_between = w_b * w_f * (m_b - m_f) * (m_b - m_f);
        if var_between > best_var {
            best_var = var_between;
            best_t = t as u8;
        }
    }

    best_t
}
