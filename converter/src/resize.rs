use serde::{Deserialize, Serialize};

pub const DEFAULT_QUALITY: f64 = 0.9;

/// Output size before rounding. Fractions are kept until a surface is
/// allocated so chained ratios don't accumulate rounding error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
}

impl Dimensions {
    /// Integer surface size, at least one pixel on each axis.
    pub fn surface(&self) -> (u32, u32) {
        (to_pixels(self.width), to_pixels(self.height))
    }
}

fn to_pixels(value: f64) -> u32 {
    let rounded = value.round();
    if rounded.is_nan() || rounded < 1.0 {
        1
    } else if rounded > u32::MAX as f64 {
        u32::MAX
    } else {
        rounded as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResizeSpec {
    pub source_width: u32,
    pub source_height: u32,
    pub requested_width: Option<u32>,
    pub requested_height: Option<u32>,
}

impl ResizeSpec {
    pub fn output(&self) -> Dimensions {
        resize(
            self.source_width,
            self.source_height,
            self.requested_width,
            self.requested_height,
        )
    }
}

/// Computes the output size. A zero request counts as absent.
///
/// With both axes requested the aspect ratio is not preserved; with one axis
/// the other follows the source ratio; with none the source size is kept.
pub fn resize(
    source_width: u32,
    source_height: u32,
    requested_width: Option<u32>,
    requested_height: Option<u32>,
) -> Dimensions {
    let req_w = requested_width.filter(|w| *w > 0);
    let req_h = requested_height.filter(|h| *h > 0);
    let src_w = source_width as f64;
    let src_h = source_height as f64;

    match (req_w, req_h) {
        (Some(w), Some(h)) => Dimensions {
            width: w as f64,
            height: h as f64,
        },
        (Some(w), None) if source_width > 0 => Dimensions {
            width: w as f64,
            height: src_h * (w as f64 / src_w),
        },
        (None, Some(h)) if source_height > 0 => Dimensions {
            width: src_w * (h as f64 / src_h),
            height: h as f64,
        },
        _ => Dimensions {
            width: src_w,
            height: src_h,
        },
    }
}

/// Reads a dimension field the way a browser's `parseInt` would: leading
/// whitespace is skipped and the leading digits are used. Empty, non-numeric
/// and zero values are treated as not set.
pub fn parse_dimension(raw: &str) -> Option<u32> {
    let trimmed = raw.trim_start();
    let digits: &str = trimmed
        .split(|c: char| !c.is_ascii_digit())
        .next()
        .unwrap_or("");
    if digits.is_empty() {
        return None;
    }
    digits.parse::<u32>().ok().filter(|v| *v > 0)
}

/// Reads the encoder quality field; anything unusable falls back to 0.9.
pub fn parse_quality(raw: &str) -> f64 {
    match leading_float(raw.trim_start()) {
        Some(q) if q > 0.0 && q <= 1.0 => q,
        _ => DEFAULT_QUALITY,
    }
}

fn leading_float(text: &str) -> Option<f64> {
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;
    for (idx, ch) in text.char_indices() {
        match ch {
            '+' | '-' if idx == 0 => {}
            '0'..='9' => seen_digit = true,
            '.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end = idx + ch.len_utf8();
    }
    if !seen_digit {
        return None;
    }
    text[..end].parse::<f64>().ok()
}
