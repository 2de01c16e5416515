use serde::{Deserialize, Serialize};

use crate::canvas::{LayerId, LayerRegistry};
use crate::color;
use crate::selection::{SelectionRect, SelectionState};

use super::draw::writable;

/// Shape primitives the shape tool can stamp.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeKind {
    /// Axis-aligned box filling the bounds.
    Square,
    /// Ellipse inscribed in the bounds.
    Circle,
}

/// How the interior of a shape is painted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShapeFillMode {
    /// Stroke only.
    None,
    #[default]
    Solid,
    Gradient,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GradientKind {
    #[default]
    Linear,
    Radial,
}

/// Gradient endpoints and geometry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GradientOptions {
    pub start_color: String,
    pub end_color: String,
    pub kind: GradientKind,
    /// Direction of a linear gradient; 0° runs left → right, 90° top → bottom.
    pub angle_degrees: f32,
    /// Quantize through the ordered-dither matrix.
    pub dither: bool,
}

impl Default for GradientOptions {
    fn default() -> Self {
        Self {
            start_color: "#000000".to_string(),
            end_color: "#FFFFFF".to_string(),
            kind: GradientKind::Linear,
            angle_degrees: 0.0,
            dither: true,
        }
    }
}

impl GradientOptions {
    /// Position of (x, y) along the gradient, normalized over the inclusive
    /// bounding box `(min_x, min_y, max_x, max_y)`.
    pub fn ratio_at(&self, bbox: (u32, u32, u32, u32), x: u32, y: u32) -> f32 {
        let (min_x, min_y, max_x, max_y) = bbox;
        let half_w = (max_x.saturating_sub(min_x) + 1) as f32 * 0.5;
        let half_h = (max_y.saturating_sub(min_y) + 1) as f32 * 0.5;
        let dx = x as f32 + 0.5 - (min_x as f32 + half_w);
        let dy = y as f32 + 0.5 - (min_y as f32 + half_h);
        let ratio = match self.kind {
            GradientKind::Linear => {
                let (sin, cos) = self.angle_degrees.to_radians().sin_cos();
                let extent = half_w * cos.abs() + half_h * sin.abs();
                if extent <= f32::EPSILON {
                    0.5
                } else {
                    0.5 + (dx * cos + dy * sin) / (2.0 * extent)
                }
            }
            GradientKind::Radial => {
                let max = (half_w * half_w + half_h * half_h).sqrt();
                (dx * dx + dy * dy).sqrt() / max
            }
        };
        ratio.clamp(0.0, 1.0)
    }

    /// Color for (x, y): projected ratio, optionally dithered, then mixed.
    pub fn color_at(&self, bbox: (u32, u32, u32, u32), x: u32, y: u32) -> String {
        let mut ratio = self.ratio_at(bbox, x, y);
        if self.dither {
            ratio = color::dithered_ratio(ratio, x as i32, y as i32);
        }
        color::mix(&self.start_color, &self.end_color, ratio, &self.start_color, &self.end_color)
    }
}

/// Per-call shape styling.  Stateless value object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShapeDrawOptions {
    /// Stroke width in pixels; 0 draws no stroke.
    pub stroke_thickness: u32,
    pub stroke_color: String,
    pub fill_mode: ShapeFillMode,
    pub fill_color: String,
    pub gradient: GradientOptions,
}

impl Default for ShapeDrawOptions {
    fn default() -> Self {
        Self {
            stroke_thickness: 1,
            stroke_color: "#000000".to_string(),
            fill_mode: ShapeFillMode::None,
            fill_color: "#FFFFFF".to_string(),
            gradient: GradientOptions::default(),
        }
    }
}

/// How a covered pixel is painted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelRole {
    Stroke,
    Fill,
}

/// Classify (x, y) against a shape with the given bounds.  `None` = not covered.
pub fn classify(kind: ShapeKind, b: &SelectionRect, thickness: u32, x: u32, y: u32) -> Option<PixelRole> {
    if !b.contains(x, y) {
        return None;
    }
    match kind {
        ShapeKind::Square => {
            let right = b.x.saturating_add(b.w).saturating_sub(1);
            let bottom = b.y.saturating_add(b.h).saturating_sub(1);
            let edge = (x - b.x).min(right - x).min(y - b.y).min(bottom - y);
            Some(if edge < thickness { PixelRole::Stroke } else { PixelRole::Fill })
        }
        ShapeKind::Circle => {
            let rx = b.w as f32 * 0.5;
            let ry = b.h as f32 * 0.5;
            let px = x as f32 + 0.5 - (b.x as f32 + rx);
            let py = y as f32 + 0.5 - (b.y as f32 + ry);
            if (px / rx).powi(2) + (py / ry).powi(2) > 1.0 {
                return None;
            }
            let t = thickness as f32;
            let (irx, iry) = (rx - t, ry - t);
            let outside_inner =
                irx <= 0.0 || iry <= 0.0 || (px / irx).powi(2) + (py / iry).powi(2) > 1.0;
            Some(if thickness > 0 && outside_inner { PixelRole::Stroke } else { PixelRole::Fill })
        }
    }
}

/// Rasterize a square or circle into `layer`.  Degenerate bounds are coerced
/// to 1×1; bounds starting off-canvas draw nothing.  Returns `true` when any
/// pixel changed.
pub fn draw_shape(
    layers: &mut LayerRegistry,
    selection: &SelectionState,
    layer: LayerId,
    kind: ShapeKind,
    bounds: SelectionRect,
    options: &ShapeDrawOptions,
) -> bool {
    let (w, h) = (layers.width(), layers.height());
    let Some(store) = layers.get_mut(layer) else {
        return false;
    };
    if bounds.x >= w || bounds.y >= h {
        return false;
    }
    // keep x + w inside u32
    let b = SelectionRect::new(
        bounds.x,
        bounds.y,
        bounds.w.clamp(1, u32::MAX - bounds.x),
        bounds.h.clamp(1, u32::MAX - bounds.y),
    );
    let bbox = (b.x, b.y, b.x + b.w - 1, b.y + b.h - 1);
    let stroke = color::normalize(&options.stroke_color);
    let fill = color::normalize(&options.fill_color);

    let mut changed = false;
    for y in b.y..(b.y + b.h).min(h) {
        for x in b.x..(b.x + b.w).min(w) {
            if !writable(selection, w, h, x, y) {
                continue;
            }
            let value = match classify(kind, &b, options.stroke_thickness, x, y) {
                None => continue,
                Some(PixelRole::Stroke) => stroke.clone(),
                Some(PixelRole::Fill) => match options.fill_mode {
                    ShapeFillMode::None => continue,
                    ShapeFillMode::Solid => fill.clone(),
                    ShapeFillMode::Gradient => options.gradient.color_at(bbox, x, y),
                },
            };
            changed |= store.set(x, y, &value);
        }
    }
    changed
}
