// ============================================================================
// TRANSFORM OPERATIONS — flip, rotate, scale, skew, perspective distort
// ============================================================================
//
// Free-form transforms size their output to the transformed corners of the
// source rectangle and fill it by inverse mapping: each destination pixel
// center is mapped back into the source and sampled nearest-neighbor.  No
// interpolation, so hard pixel-art edges survive.

use rayon::prelude::*;

use crate::canvas::{LayerId, LayerRegistry, PixelBuffer};
use crate::log_warn;
use crate::selection::SelectionState;

type Mat3 = [[f64; 3]; 3];

/// Slack used when snapping transformed bounds to whole pixels.
const BOUNDS_EPSILON: f64 = 1e-6;

/// Result of a free-form transform: the new block plus the position of its
/// top-left corner relative to the source block's top-left.
#[derive(Clone, Debug, PartialEq)]
pub struct Transformed {
    pub buffer: PixelBuffer,
    pub offset_x: i32,
    pub offset_y: i32,
}

// ---------------------------------------------------------------------------
//  Exact index remaps
// ---------------------------------------------------------------------------

/// Mirror left↔right.
pub fn flip_horizontal(src: &PixelBuffer) -> PixelBuffer {
    let mut out = PixelBuffer::new(src.width, src.height);
    for y in 0..src.height {
        for x in 0..src.width {
            let i = out.index(src.width - 1 - x, y);
            out.pixels[i] = src.pixels[src.index(x, y)].clone();
        }
    }
    out
}

/// Mirror top↔bottom.
pub fn flip_vertical(src: &PixelBuffer) -> PixelBuffer {
    let mut out = PixelBuffer::new(src.width, src.height);
    for y in 0..src.height {
        for x in 0..src.width {
            let i = out.index(x, src.height - 1 - y);
            out.pixels[i] = src.pixels[src.index(x, y)].clone();
        }
    }
    out
}

/// Rotate 90° clockwise.  W×H becomes H×W.
pub fn rotate_90cw(src: &PixelBuffer) -> PixelBuffer {
    let mut out = PixelBuffer::new(src.height, src.width);
    for y in 0..src.height {
        for x in 0..src.width {
            // (x, y) → (old_h - 1 - y, x)
            let i = out.index(src.height - 1 - y, x);
            out.pixels[i] = src.pixels[src.index(x, y)].clone();
        }
    }
    out
}

/// Rotate 90° counter-clockwise.  W×H becomes H×W.
pub fn rotate_90ccw(src: &PixelBuffer) -> PixelBuffer {
    let mut out = PixelBuffer::new(src.height, src.width);
    for y in 0..src.height {
        for x in 0..src.width {
            // (x, y) → (y, old_w - 1 - x)
            let i = out.index(y, src.width - 1 - x);
            out.pixels[i] = src.pixels[src.index(x, y)].clone();
        }
    }
    out
}

/// Rotate 180°: the row-major order reversed.
pub fn rotate_180(src: &PixelBuffer) -> PixelBuffer {
    let pixels = src.pixels.iter().rev().cloned().collect();
    PixelBuffer { width: src.width, height: src.height, pixels }
}

// ---------------------------------------------------------------------------
//  Inverse-mapped resampling
// ---------------------------------------------------------------------------

/// Rotate by an arbitrary angle about the block center.  Positive degrees
/// turn clockwise on screen (y grows downward).
pub fn rotate_by_angle(src: &PixelBuffer, degrees: f32) -> Transformed {
    let (sin, cos) = (degrees as f64).to_radians().sin_cos();
    let cx = src.width as f64 * 0.5;
    let cy = src.height as f64 * 0.5;
    let forward = [
        [cos, -sin, cx - cos * cx + sin * cy],
        [sin, cos, cy - sin * cx - cos * cy],
        [0.0, 0.0, 1.0],
    ];
    resample_forward(src, forward)
}

/// Scale by independent factors.  Negative factors mirror; a zero factor
/// collapses to a single transparent pixel.
pub fn scale(src: &PixelBuffer, sx: f32, sy: f32) -> Transformed {
    let forward = [[sx as f64, 0.0, 0.0], [0.0, sy as f64, 0.0], [0.0, 0.0, 1.0]];
    resample_forward(src, forward)
}

/// Shear by angles in degrees: `x' = x + tan(kx)·y`, `y' = y + tan(ky)·x`.
pub fn skew(src: &PixelBuffer, skew_x_degrees: f32, skew_y_degrees: f32) -> Transformed {
    let kx = (skew_x_degrees as f64).to_radians().tan();
    let ky = (skew_y_degrees as f64).to_radians().tan();
    let forward = [[1.0, kx, 0.0], [ky, 1.0, 0.0], [0.0, 0.0, 1.0]];
    resample_forward(src, forward)
}

/// Perspective distort: map the source rectangle's corners onto `corners`,
/// given as `[top_left, top_right, bottom_right, bottom_left]` in the source
/// block's coordinate space.
pub fn distort(src: &PixelBuffer, corners: [(f32, f32); 4]) -> Transformed {
    let (w, h) = (src.width as f64, src.height as f64);
    let src_pts = [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)];
    let dst_pts = corners.map(|(x, y)| (x as f64, y as f64));
    match homography(&dst_pts, &src_pts) {
        Some(inverse) => {
            let (min_x, min_y, out_w, out_h) = output_bounds(&dst_pts);
            resample(src, &inverse, min_x, min_y, out_w, out_h)
        }
        None => {
            log_warn!("distort: degenerate corner set {:?}", corners);
            collapsed()
        }
    }
}

fn collapsed() -> Transformed {
    Transformed { buffer: PixelBuffer::new(1, 1), offset_x: 0, offset_y: 0 }
}

fn resample_forward(src: &PixelBuffer, forward: Mat3) -> Transformed {
    let Some(inverse) = invert_3x3(&forward) else {
        log_warn!("transform: singular matrix, output collapsed");
        return collapsed();
    };
    let (w, h) = (src.width as f64, src.height as f64);
    let mut corners = [(0.0, 0.0); 4];
    for (slot, (x, y)) in corners.iter_mut().zip([(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)]) {
        let Some(p) = project(&forward, x, y) else {
            return collapsed();
        };
        *slot = p;
    }
    let (min_x, min_y, out_w, out_h) = output_bounds(&corners);
    resample(src, &inverse, min_x, min_y, out_w, out_h)
}

/// Whole-pixel bounding box of a point set: `(min_x, min_y, width, height)`,
/// at least 1×1.
fn output_bounds(points: &[(f64, f64)]) -> (i32, i32, u32, u32) {
    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for &(x, y) in points {
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }
    let x0 = (min_x + BOUNDS_EPSILON).floor();
    let y0 = (min_y + BOUNDS_EPSILON).floor();
    let x1 = (max_x - BOUNDS_EPSILON).ceil();
    let y1 = (max_y - BOUNDS_EPSILON).ceil();
    let w = (x1 - x0).max(1.0) as u32;
    let h = (y1 - y0).max(1.0) as u32;
    (x0 as i32, y0 as i32, w, h)
}

/// Fill an `out_w × out_h` block whose top-left sits at (min_x, min_y) by
/// mapping each pixel center through `inverse` into `src`.
fn resample(src: &PixelBuffer, inverse: &Mat3, min_x: i32, min_y: i32, out_w: u32, out_h: u32) -> Transformed {
    let mut dst = PixelBuffer::new(out_w, out_h);
    let src_w = src.width as i64;
    let src_h = src.height as i64;

    dst.pixels.par_chunks_mut(out_w as usize).enumerate().for_each(|(dy, row)| {
        let py = min_y as f64 + dy as f64 + 0.5;
        for (dx, cell) in row.iter_mut().enumerate() {
            let px = min_x as f64 + dx as f64 + 0.5;
            let Some((sx, sy)) = project(inverse, px, py) else { continue };
            let (sx, sy) = (sx.floor() as i64, sy.floor() as i64);
            if sx < 0 || sy < 0 || sx >= src_w || sy >= src_h {
                continue;
            }
            *cell = src.pixels[(sy * src_w + sx) as usize].clone();
        }
    });

    Transformed { buffer: dst, offset_x: min_x, offset_y: min_y }
}

/// Apply a projective matrix to a point; `None` on the line at infinity.
fn project(m: &Mat3, x: f64, y: f64) -> Option<(f64, f64)> {
    let w = m[2][0] * x + m[2][1] * y + m[2][2];
    if w.abs() < 1e-12 {
        return None;
    }
    Some(((m[0][0] * x + m[0][1] * y + m[0][2]) / w, (m[1][0] * x + m[1][1] * y + m[1][2]) / w))
}

/// Invert a 3×3 matrix.  `None` on singular input.
fn invert_3x3(m: &Mat3) -> Option<Mat3> {
    let (a, b, c) = (m[0][0], m[0][1], m[0][2]);
    let (d, e, f) = (m[1][0], m[1][1], m[1][2]);
    let (g, h, i) = (m[2][0], m[2][1], m[2][2]);

    let det = a * (e * i - f * h) - b * (d * i - f * g) + c * (d * h - e * g);
    if det.abs() < 1e-12 {
        return None;
    }
    let inv = 1.0 / det;
    Some([
        [(e * i - f * h) * inv, (c * h - b * i) * inv, (b * f - c * e) * inv],
        [(f * g - d * i) * inv, (a * i - c * g) * inv, (c * d - a * f) * inv],
        [(d * h - e * g) * inv, (b * g - a * h) * inv, (a * e - b * d) * inv],
    ])
}

/// Projective matrix taking each `from[i]` to `to[i]`, solved as an 8×8
/// linear system with partial pivoting.
fn homography(from: &[(f64, f64); 4], to: &[(f64, f64); 4]) -> Option<Mat3> {
    let mut a = [[0.0f64; 9]; 8];
    for k in 0..4 {
        let (x, y) = from[k];
        let (u, v) = to[k];
        a[2 * k] = [x, y, 1.0, 0.0, 0.0, 0.0, -x * u, -y * u, u];
        a[2 * k + 1] = [0.0, 0.0, 0.0, x, y, 1.0, -x * v, -y * v, v];
    }

    for col in 0..8 {
        let pivot = (col..8).max_by(|&r, &s| a[r][col].abs().total_cmp(&a[s][col].abs()))?;
        if a[pivot][col].abs() < 1e-10 {
            return None;
        }
        a.swap(col, pivot);
        for row in 0..8 {
            if row == col {
                continue;
            }
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..9 {
                a[row][k] -= factor * a[col][k];
            }
        }
    }

    let h: Vec<f64> = (0..8).map(|r| a[r][8] / a[r][r]).collect();
    let m = [[h[0], h[1], h[2]], [h[3], h[4], h[5]], [h[6], h[7], 1.0]];
    m.iter().flatten().all(|v| v.is_finite()).then_some(m)
}

// ---------------------------------------------------------------------------
//  Layer and canvas wrappers
// ---------------------------------------------------------------------------

fn remap_layer(layers: &mut LayerRegistry, layer: LayerId, op: fn(&PixelBuffer) -> PixelBuffer) -> bool {
    let (w, h) = (layers.width(), layers.height());
    let Some(store) = layers.get_mut(layer) else {
        return false;
    };
    let before = PixelBuffer::from_store(store, w, h);
    let after = op(&before);
    store.replace(&after.pixels, after.width);
    before != after
}

/// Flip one layer left↔right within the canvas.  Entries outside the canvas
/// are dropped.  Returns whether anything changed.
pub fn flip_layer_horizontal(layers: &mut LayerRegistry, layer: LayerId) -> bool {
    remap_layer(layers, layer, flip_horizontal)
}

/// Flip one layer top↔bottom within the canvas.
pub fn flip_layer_vertical(layers: &mut LayerRegistry, layer: LayerId) -> bool {
    remap_layer(layers, layer, flip_vertical)
}

/// Rotate one layer 180° within the canvas.
pub fn rotate_layer_180(layers: &mut LayerRegistry, layer: LayerId) -> bool {
    remap_layer(layers, layer, rotate_180)
}

fn rotate_canvas(
    layers: &mut LayerRegistry,
    selection: &mut SelectionState,
    op: fn(&PixelBuffer) -> PixelBuffer,
) {
    let (w, h) = (layers.width(), layers.height());
    layers.stores_mut().collect::<Vec<_>>().into_par_iter().for_each(|store| {
        let rotated = op(&PixelBuffer::from_store(store, w, h));
        store.replace(&rotated.pixels, rotated.width);
    });
    layers.resize_canvas(h, w);
    selection.set_canvas_size(h, w);
    selection.clear();
}

/// Rotate every layer 90° clockwise and swap the canvas dimensions.  The
/// selection is dropped.
pub fn rotate_canvas_90cw(layers: &mut LayerRegistry, selection: &mut SelectionState) {
    rotate_canvas(layers, selection, rotate_90cw);
}

/// Rotate every layer 90° counter-clockwise and swap the canvas dimensions.
pub fn rotate_canvas_90ccw(layers: &mut LayerRegistry, selection: &mut SelectionState) {
    rotate_canvas(layers, selection, rotate_90ccw);
}
