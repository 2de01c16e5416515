// ============================================================================
// COLOR MODEL — pixel color strings, eraser blend, ordered-dither gradients
// ============================================================================
//
// Pixels travel as strings: "" (transparent), "#RRGGBB", "#RRGGBBAA",
// "rgb(r, g, b)" or "rgba(r, g, b, a)" with a in [0, 1].  Everything here is
// best-effort: input that cannot be read becomes transparent, never an error.

use image::Rgba;

/// Alpha at or below this is treated as fully transparent.
pub const ALPHA_EPSILON: f32 = 0.001;

/// Number of discrete levels a dithered gradient ratio is quantized into.
pub const DITHER_BANDS: u32 = 8;

/// 4×4 ordered-dither (Bayer) threshold matrix, indexed `[y % 4][x % 4]`.
const BAYER_4X4: [[u8; 4]; 4] = [
    [0, 8, 2, 10],
    [12, 4, 14, 6],
    [3, 11, 1, 9],
    [15, 7, 13, 5],
];

/// A decoded pixel color.  RGB channels are 0–255, alpha is 0.0–1.0.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Color {
    pub const TRANSPARENT: Color = Color { r: 0, g: 0, b: 0, a: 0.0 };

    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub fn rgba(r: u8, g: u8, b: u8, a: f32) -> Self {
        let a = if a.is_finite() { a.clamp(0.0, 1.0) } else { 0.0 };
        Self { r, g, b, a }
    }

    pub fn is_transparent(&self) -> bool {
        self.a <= ALPHA_EPSILON
    }

    /// Encode in the form the engine emits: `""`, `#RRGGBB`, or `rgba(...)`.
    pub fn encode(&self) -> String {
        if self.is_transparent() {
            return String::new();
        }
        let a = (self.a * 1000.0).round() / 1000.0;
        if a >= 1.0 {
            format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        } else {
            format!("rgba({}, {}, {}, {})", self.r, self.g, self.b, a)
        }
    }

    pub fn to_rgba8(&self) -> Rgba<u8> {
        if self.is_transparent() {
            return Rgba([0, 0, 0, 0]);
        }
        Rgba([self.r, self.g, self.b, (self.a * 255.0).round() as u8])
    }

    pub fn from_rgba8(p: Rgba<u8>) -> Self {
        if p[3] == 0 {
            return Self::TRANSPARENT;
        }
        Self::rgba(p[0], p[1], p[2], p[3] as f32 / 255.0)
    }
}

/// Parse a color string, returning `None` when it is not one of the accepted forms.
pub fn try_parse(s: &str) -> Option<Color> {
    let s = s.trim();
    if s.is_empty() || !s.is_ascii() {
        return None;
    }
    if let Some(hex) = s.strip_prefix('#') {
        return parse_hex(hex);
    }
    let lower = s.to_ascii_lowercase();
    let body = lower
        .strip_prefix("rgba(")
        .or_else(|| lower.strip_prefix("rgb("))?
        .strip_suffix(')')?;
    parse_functional(body)
}

fn parse_hex(hex: &str) -> Option<Color> {
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    match hex.len() {
        6 => Some(Color::rgb(channel(0)?, channel(2)?, channel(4)?)),
        8 => {
            let a = channel(6)? as f32 / 255.0;
            Some(Color::rgba(channel(0)?, channel(2)?, channel(4)?, a))
        }
        _ => None,
    }
}

fn parse_functional(body: &str) -> Option<Color> {
    let parts: Vec<f32> = body
        .split(',')
        .map(|p| p.trim().parse::<f32>().ok().filter(|v| v.is_finite()))
        .collect::<Option<Vec<_>>>()?;
    let channel = |v: f32| v.clamp(0.0, 255.0).round() as u8;
    match parts.as_slice() {
        [r, g, b] => Some(Color::rgb(channel(*r), channel(*g), channel(*b))),
        [r, g, b, a] => Some(Color::rgba(channel(*r), channel(*g), channel(*b), *a)),
        _ => None,
    }
}

/// Parse a color string.  Unrecognized input yields fully transparent black.
pub fn parse(s: &str) -> Color {
    try_parse(s).unwrap_or(Color::TRANSPARENT)
}

/// Re-encode any accepted input into the emitted form.
pub fn normalize(s: &str) -> String {
    parse(s).encode()
}

/// Compose `#RRGGBB` from float channels, clamped to [0, 255] and rounded.
pub fn compose(r: f32, g: f32, b: f32) -> String {
    let c = |v: f32| if v.is_finite() { v.clamp(0.0, 255.0).round() as u8 } else { 0 };
    format!("#{:02X}{:02X}{:02X}", c(r), c(g), c(b))
}

/// Linear per-channel interpolation between two colors.
///
/// When either endpoint fails to parse, the result switches hard from
/// `fallback_start` to `fallback_end` at `ratio == 0.5`.
pub fn mix(start: &str, end: &str, ratio: f32, fallback_start: &str, fallback_end: &str) -> String {
    let t = if ratio.is_finite() { ratio.clamp(0.0, 1.0) } else { 0.0 };
    match (try_parse(start), try_parse(end)) {
        (Some(a), Some(b)) => {
            let lerp = |x: u8, y: u8| (x as f32 + (y as f32 - x as f32) * t).round() as u8;
            Color::rgba(
                lerp(a.r, b.r),
                lerp(a.g, b.g),
                lerp(a.b, b.b),
                a.a + (b.a - a.a) * t,
            )
            .encode()
        }
        _ => {
            if t < 0.5 {
                fallback_start.to_string()
            } else {
                fallback_end.to_string()
            }
        }
    }
}

/// Quantize a continuous ratio into [`DITHER_BANDS`] levels using the 4×4
/// Bayer matrix at `(x mod 4, y mod 4)`.  Pure function of its inputs.
pub fn dithered_ratio(ratio: f32, x: i32, y: i32) -> f32 {
    let r = if ratio.is_finite() { ratio.clamp(0.0, 1.0) } else { 0.0 };
    let steps = (DITHER_BANDS - 1) as f32;
    let scaled = r * steps;
    let base = scaled.floor();
    let frac = scaled - base;
    let cell = BAYER_4X4[y.rem_euclid(4) as usize][x.rem_euclid(4) as usize];
    let threshold = (cell as f32 + 0.5) / 16.0;
    let band = if frac > threshold { base + 1.0 } else { base };
    (band / steps).min(1.0)
}

/// Scale the alpha of `existing` by `1 - strength/100`.  Fully transparent
/// once the resulting alpha drops to [`ALPHA_EPSILON`].
pub fn eraser_blend(existing: &str, strength_percent: f32) -> String {
    let c = parse(existing);
    if c.is_transparent() {
        return String::new();
    }
    let strength = if strength_percent.is_finite() {
        strength_percent.clamp(0.0, 100.0)
    } else {
        100.0
    };
    let a = c.a * (1.0 - strength / 100.0);
    if a <= ALPHA_EPSILON {
        return String::new();
    }
    Color::rgba(c.r, c.g, c.b, a).encode()
}

/// Decode a color string straight to RGBA bytes.
pub fn to_rgba8(s: &str) -> Rgba<u8> {
    parse(s).to_rgba8()
}

/// Encode RGBA bytes as a color string.
pub fn from_rgba8(p: Rgba<u8>) -> String {
    Color::from_rgba8(p).encode()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_accepted_forms() {
        assert_eq!(parse("#FF8000"), Color::rgb(255, 128, 0));
        assert_eq!(parse("#ff800080").a, 128.0 / 255.0);
        assert_eq!(parse("rgb(1, 2, 3)"), Color::rgb(1, 2, 3));
        assert_eq!(parse("rgba(10,20,30,0.5)"), Color::rgba(10, 20, 30, 0.5));
        assert_eq!(parse("RGBA(300, -4, 7, 2)"), Color::rgb(255, 0, 7));
    }

    #[test]
    fn unparseable_is_transparent() {
        for s in ["", "red", "#12345", "#GGGGGG", "rgb(1,2)", "rgb(a,b,c)", "#ÿÿÿ"] {
            assert_eq!(parse(s), Color::TRANSPARENT, "input {s:?}");
            assert!(try_parse(s).is_none());
        }
    }

    #[test]
    fn encode_emits_hex_or_rgba() {
        assert_eq!(Color::rgb(255, 0, 0).encode(), "#FF0000");
        assert_eq!(Color::rgba(1, 2, 3, 0.25).encode(), "rgba(1, 2, 3, 0.25)");
        assert_eq!(Color::rgba(1, 2, 3, 0.0005).encode(), "");
        assert_eq!(normalize("#ff0000"), "#FF0000");
        assert_eq!(normalize("#FF0000FF"), "#FF0000");
    }

    #[test]
    fn compose_clamps_and_rounds() {
        assert_eq!(compose(255.6, -3.0, 127.5), "#FF0080");
        assert_eq!(compose(f32::NAN, 0.0, 0.0), "#000000");
    }

    #[test]
    fn mix_interpolates_or_switches() {
        assert_eq!(mix("#000000", "#FFFFFF", 0.5, "a", "b"), "#808080");
        assert_eq!(mix("#000000", "#FFFFFF", 0.0, "a", "b"), "#000000");
        assert_eq!(mix("#000000", "nope", 0.49, "a", "b"), "a");
        assert_eq!(mix("#000000", "nope", 0.5, "a", "b"), "b");
    }

    #[test]
    fn dither_is_banded_and_deterministic() {
        for y in 0..8 {
            for x in 0..8 {
                let v = dithered_ratio(0.37, x, y);
                assert_eq!(v, dithered_ratio(0.37, x, y));
                let band = v * (DITHER_BANDS - 1) as f32;
                assert!((band - band.round()).abs() < 1e-5);
            }
        }
        assert_eq!(dithered_ratio(0.0, 3, 1), 0.0);
        assert_eq!(dithered_ratio(1.0, 3, 1), 1.0);
        assert_eq!(dithered_ratio(-2.0, -1, -5), 0.0);
    }

    #[test]
    fn dither_spreads_intermediate_values() {
        // 0.5 * 7 = 3.5 sits between bands 3 and 4: both must appear in a 4×4 tile.
        let mut seen = std::collections::HashSet::new();
        for y in 0..4 {
            for x in 0..4 {
                seen.insert((dithered_ratio(0.5, x, y) * 7.0).round() as i32);
            }
        }
        assert_eq!(seen, [3, 4].into_iter().collect());
    }

    #[test]
    fn eraser_scales_alpha() {
        assert_eq!(eraser_blend("#FF0000", 50.0), "rgba(255, 0, 0, 0.5)");
        assert_eq!(eraser_blend("#FF0000", 100.0), "");
        assert_eq!(eraser_blend("rgba(0, 0, 0, 0.001)", 10.0), "");
        assert_eq!(eraser_blend("", 10.0), "");
        assert_eq!(eraser_blend("#00FF00", 0.0), "#00FF00");
    }

    #[test]
    fn rgba8_conversion() {
        assert_eq!(to_rgba8("#102030"), Rgba([16, 32, 48, 255]));
        assert_eq!(to_rgba8(""), Rgba([0, 0, 0, 0]));
        assert_eq!(from_rgba8(Rgba([16, 32, 48, 255])), "#102030");
        assert_eq!(from_rgba8(Rgba([9, 9, 9, 0])), "");
    }
}
