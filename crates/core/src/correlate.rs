//! Zero-mean normalized cross-correlation, searched coarse to fine.
//!
//! Scores are the correlation coefficient of the template and each screen
//! window: brightness offsets cancel out, and flat windows score 0 instead of
//! looking like every light-coloured template.

use image::imageops::{self, FilterType};
use image::{GrayImage, ImageBuffer, Luma};
use imageproc::integral_image::{integral_image, integral_squared_image, sum_image_pixels};
use imageproc::template_matching::{find_extremes, match_template_parallel, MatchTemplateMethod};

pub type Scores = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Smallest template side kept on the coarse pass.
const MIN_COARSE_SIDE: u32 = 8;
const MAX_COARSE_FACTOR: u32 = 4;
/// Per-pixel grey-level variance below which a window counts as flat.
const MIN_VARIANCE: f64 = 1.0;

/// Best window for `template` on `screen`: `(score, left, top)`.
///
/// `None` when the template itself has no contrast to correlate.
pub fn best_match(screen: &GrayImage, template: &GrayImage) -> Option<(f32, u32, u32)> {
    let factor = coarse_factor(template);
    if factor > 1 {
        if let Some(hit) = coarse_to_fine(screen, template, factor) {
            return Some(hit);
        }
    }
    let scores = zero_mean_scores(screen, template)?;
    Some(peak(&scores))
}

fn coarse_factor(template: &GrayImage) -> u32 {
    let (tw, th) = template.dimensions();
    (tw.min(th) / MIN_COARSE_SIDE).clamp(1, MAX_COARSE_FACTOR)
}

/// Search a downscaled copy, then rescore the neighbourhood of the coarse
/// peak at full resolution.
fn coarse_to_fine(screen: &GrayImage, template: &GrayImage, factor: u32) -> Option<(f32, u32, u32)> {
    let (sw, sh) = screen.dimensions();
    let (tw, th) = template.dimensions();

    let small_screen = imageops::resize(screen, sw / factor, sh / factor, FilterType::Triangle);
    let small_template = imageops::resize(template, tw / factor, th / factor, FilterType::Triangle);
    let coarse = zero_mean_scores(&small_screen, &small_template)?;
    let (_, cx, cy) = peak(&coarse);

    let reach = 2 * factor;
    let x0 = (cx * factor).saturating_sub(reach);
    let y0 = (cy * factor).saturating_sub(reach);
    let x1 = (cx * factor + reach).min(sw - tw);
    let y1 = (cy * factor + reach).min(sh - th);
    let window = imageops::crop_imm(screen, x0, y0, x1 - x0 + tw, y1 - y0 + th).to_image();

    let fine = zero_mean_scores(&window, template)?;
    let (score, x, y) = peak(&fine);
    Some((score, x0 + x, y0 + y))
}

fn peak(scores: &Scores) -> (f32, u32, u32) {
    let extremes = find_extremes(scores);
    let (x, y) = extremes.max_value_location;
    (extremes.max_value, x, y)
}

/// Correlation coefficient for every window position, in `[-1, 1]`.
pub fn zero_mean_scores(screen: &GrayImage, template: &GrayImage) -> Option<Scores> {
    let (tw, th) = template.dimensions();
    let n = (tw * th) as f64;

    let (t_sum, t_squares) = template.pixels().fold((0.0, 0.0), |(s, q), p| {
        let v = p[0] as f64;
        (s + v, q + v * v)
    });
    let t_spread = t_squares - t_sum * t_sum / n;
    if t_spread < MIN_VARIANCE * n {
        return None;
    }
    let t_norm = t_spread.sqrt();

    let raw = match_template_parallel(screen, template, MatchTemplateMethod::CrossCorrelation);
    let sums = integral_image::<_, f64>(screen);
    let squares = integral_squared_image::<_, f64>(screen);

    Some(Scores::from_fn(raw.width(), raw.height(), |x, y| {
        let (right, bottom) = (x + tw - 1, y + th - 1);
        let s = sum_image_pixels(&sums, x, y, right, bottom)[0];
        let q = sum_image_pixels(&squares, x, y, right, bottom)[0];
        let spread = q - s * s / n;
        if spread < MIN_VARIANCE * n {
            return Luma([0.0]);
        }
        let centred = raw.get_pixel(x, y)[0] as f64 - s * t_sum / n;
        Luma([(centred / (spread.sqrt() * t_norm)).clamp(-1.0, 1.0) as f32])
    }))
}
