// ============================================================================
// DRAWING — brush, eraser, line, flood fill, gradient fill
// ============================================================================
//
// Every write goes through `writable`: pixels outside the canvas or outside a
// committed selection are skipped silently.  Calls report whether anything
// actually changed so the host can skip recording no-op history steps.

use crate::canvas::{LayerId, LayerRegistry, PixelStore};
use crate::color;
use crate::selection::SelectionState;

use super::shapes::GradientOptions;

/// Eraser strength used when the caller does not pass one.
pub const DEFAULT_ERASER_STRENGTH: f32 = 100.0;

/// What a stamp writes into each covered pixel.
#[derive(Clone, Debug, PartialEq)]
pub enum Paint {
    /// Normalized color string.
    Color(String),
    /// Eraser with strength in percent.
    Erase(f32),
}

impl Paint {
    /// `Some(color)` paints, `None` erases.
    pub fn from_option(color: Option<&str>, eraser_strength: Option<f32>) -> Self {
        match color {
            Some(c) => Paint::Color(color::normalize(c)),
            None => Paint::Erase(eraser_strength.unwrap_or(DEFAULT_ERASER_STRENGTH)),
        }
    }
}

/// Whether an operation may write (x, y).
#[inline]
pub(crate) fn writable(selection: &SelectionState, w: u32, h: u32, x: u32, y: u32) -> bool {
    x < w && y < h && selection.active().is_none_or(|s| s.is_within(x, y))
}

fn apply(store: &mut PixelStore, x: u32, y: u32, paint: &Paint) -> bool {
    match paint {
        Paint::Color(c) => store.set(x, y, c),
        Paint::Erase(strength) => {
            let next = color::eraser_blend(store.get(x, y), *strength);
            store.set(x, y, &next)
        }
    }
}

/// Stamp a `size × size` square centered on (cx, cy).  Even sizes lean
/// toward the top-left.
fn stamp(
    store: &mut PixelStore,
    selection: &SelectionState,
    w: u32,
    h: u32,
    cx: i64,
    cy: i64,
    size: u32,
    paint: &Paint,
) -> bool {
    let size = size.max(1) as i64;
    let x0 = cx - size / 2;
    let y0 = cy - size / 2;
    let mut changed = false;
    for y in y0.max(0)..(y0 + size).min(h as i64) {
        for x in x0.max(0)..(x0 + size).min(w as i64) {
            let (x, y) = (x as u32, y as u32);
            if writable(selection, w, h, x, y) {
                changed |= apply(store, x, y, paint);
            }
        }
    }
    changed
}

/// Paint (or erase, when `color` is `None`) a square brush footprint.
/// Returns `true` when any pixel changed; a missing layer changes nothing.
pub fn brush(
    layers: &mut LayerRegistry,
    selection: &SelectionState,
    layer: LayerId,
    x: i32,
    y: i32,
    size: u32,
    color: Option<&str>,
    eraser_strength: Option<f32>,
) -> bool {
    let (w, h) = (layers.width(), layers.height());
    let Some(store) = layers.get_mut(layer) else {
        return false;
    };
    let paint = Paint::from_option(color, eraser_strength);
    stamp(store, selection, w, h, x.into(), y.into(), size, &paint)
}

/// Integer Bresenham rasterization, endpoints included.  Steps are produced
/// lazily so long segments never allocate.
#[derive(Clone, Debug)]
pub struct Bresenham {
    x: i64,
    y: i64,
    x1: i64,
    y1: i64,
    dx: i64,
    dy: i64,
    sx: i64,
    sy: i64,
    err: i64,
    done: bool,
}

pub fn bresenham(x0: i64, y0: i64, x1: i64, y1: i64) -> Bresenham {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    Bresenham {
        x: x0,
        y: y0,
        x1,
        y1,
        dx,
        dy,
        sx: if x0 < x1 { 1 } else { -1 },
        sy: if y0 < y1 { 1 } else { -1 },
        err: dx + dy,
        done: false,
    }
}

impl Iterator for Bresenham {
    type Item = (i64, i64);

    fn next(&mut self) -> Option<(i64, i64)> {
        if self.done {
            return None;
        }
        let point = (self.x, self.y);
        if self.x == self.x1 && self.y == self.y1 {
            self.done = true;
            return Some(point);
        }
        let e2 = 2 * self.err;
        if e2 >= self.dy {
            self.err += self.dy;
            self.x += self.sx;
        }
        if e2 <= self.dx {
            self.err += self.dx;
            self.y += self.sy;
        }
        Some(point)
    }
}

/// Liang–Barsky clip of a segment to `[lo, hi]` on both axes.  A segment
/// that lies fully inside comes back unchanged; `None` when it misses.
fn clip_segment(
    from: (i64, i64),
    to: (i64, i64),
    lo: (i64, i64),
    hi: (i64, i64),
) -> Option<((i64, i64), (i64, i64))> {
    let inside = |p: (i64, i64)| p.0 >= lo.0 && p.0 <= hi.0 && p.1 >= lo.1 && p.1 <= hi.1;
    if inside(from) && inside(to) {
        return Some((from, to));
    }
    let (x0, y0) = (from.0 as f64, from.1 as f64);
    let (dx, dy) = ((to.0 - from.0) as f64, (to.1 - from.1) as f64);
    let mut t0 = 0.0f64;
    let mut t1 = 1.0f64;
    let edges = [
        (-dx, x0 - lo.0 as f64),
        (dx, hi.0 as f64 - x0),
        (-dy, y0 - lo.1 as f64),
        (dy, hi.1 as f64 - y0),
    ];
    for (p, q) in edges {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let t = q / p;
        if p < 0.0 {
            t0 = t0.max(t);
        } else {
            t1 = t1.min(t);
        }
        if t0 > t1 {
            return None;
        }
    }
    let at = |t: f64| {
        (
            ((x0 + t * dx).round() as i64).clamp(lo.0, hi.0),
            ((y0 + t * dy).round() as i64).clamp(lo.1, hi.1),
        )
    };
    Some((at(t0), at(t1)))
}

/// Stamp the brush at every Bresenham step between two points.  The segment
/// is first clipped to the canvas widened by the brush size, so far
/// off-canvas endpoints cost nothing.
pub fn line(
    layers: &mut LayerRegistry,
    selection: &SelectionState,
    layer: LayerId,
    from: (i32, i32),
    to: (i32, i32),
    size: u32,
    color: Option<&str>,
    eraser_strength: Option<f32>,
) -> bool {
    let (w, h) = (layers.width(), layers.height());
    let Some(store) = layers.get_mut(layer) else {
        return false;
    };
    let pad = size.max(1) as i64;
    let Some((a, b)) = clip_segment(
        (from.0.into(), from.1.into()),
        (to.0.into(), to.1.into()),
        (-pad, -pad),
        (w as i64 - 1 + pad, h as i64 - 1 + pad),
    ) else {
        return false;
    };
    let paint = Paint::from_option(color, eraser_strength);
    let mut changed = false;
    for (x, y) in bresenham(a.0, a.1, b.0, b.1) {
        changed |= stamp(store, selection, w, h, x, y, size, &paint);
    }
    changed
}

/// A connected component found by [`discover_region`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FillRegion {
    pub pixels: Vec<(u32, u32)>,
    /// Inclusive bounding box `(min_x, min_y, max_x, max_y)`.
    pub bbox: Option<(u32, u32, u32, u32)>,
}

/// 4-connected component of pixels whose color equals the seed's exactly
/// and that are writable under the selection.  Explicit DFS stack.
pub fn discover_region(
    store: &PixelStore,
    selection: &SelectionState,
    w: u32,
    h: u32,
    seed_x: u32,
    seed_y: u32,
) -> FillRegion {
    if !writable(selection, w, h, seed_x, seed_y) {
        return FillRegion::default();
    }
    let wu = w as usize;
    let target = store.get(seed_x, seed_y);
    let matches = |x: u32, y: u32| writable(selection, w, h, x, y) && store.get(x, y) == target;

    // visited doubles as the queued marker
    let mut visited = vec![false; wu * h as usize];
    let mut stack: Vec<u32> = Vec::with_capacity(256);
    let seed_idx = seed_y as usize * wu + seed_x as usize;
    visited[seed_idx] = true;
    stack.push(seed_idx as u32);

    let mut pixels = Vec::new();
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (seed_x, seed_y, seed_x, seed_y);

    while let Some(idx) = stack.pop() {
        let x = (idx as usize % wu) as u32;
        let y = (idx as usize / wu) as u32;
        pixels.push((x, y));
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);

        let mut visit = |nx: u32, ny: u32| {
            let ni = ny as usize * wu + nx as usize;
            if !visited[ni] && matches(nx, ny) {
                visited[ni] = true;
                stack.push(ni as u32);
            }
        };
        if x > 0 {
            visit(x - 1, y);
        }
        if x + 1 < w {
            visit(x + 1, y);
        }
        if y > 0 {
            visit(x, y - 1);
        }
        if y + 1 < h {
            visit(x, y + 1);
        }
    }

    FillRegion { pixels, bbox: Some((min_x, min_y, max_x, max_y)) }
}

/// Flood fill the seed's 4-connected same-color region.  `None` erases.
/// Returns the number of pixels changed; a seed outside the canvas, outside
/// the selection, or already holding the fill color changes nothing.
pub fn flood_fill(
    layers: &mut LayerRegistry,
    selection: &SelectionState,
    layer: LayerId,
    x: i32,
    y: i32,
    color: Option<&str>,
) -> usize {
    let (w, h) = (layers.width(), layers.height());
    if x < 0 || y < 0 || x as u32 >= w || y as u32 >= h {
        return 0;
    }
    let (x, y) = (x as u32, y as u32);
    let Some(store) = layers.get_mut(layer) else {
        return 0;
    };
    let fill = color.map(color::normalize).unwrap_or_default();
    if color::normalize(store.get(x, y)) == fill {
        return 0;
    }
    let region = discover_region(store, selection, w, h, x, y);
    region.pixels.iter().filter(|&&(px, py)| store.set(px, py, &fill)).count()
}

/// Flood-discover the seed's region, then recolor it along a gradient
/// projected over the region's bounding box.  Returns the changed count.
pub fn gradient_fill(
    layers: &mut LayerRegistry,
    selection: &SelectionState,
    layer: LayerId,
    x: i32,
    y: i32,
    gradient: &GradientOptions,
) -> usize {
    let (w, h) = (layers.width(), layers.height());
    if x < 0 || y < 0 || x as u32 >= w || y as u32 >= h {
        return 0;
    }
    let Some(store) = layers.get_mut(layer) else {
        return 0;
    };
    let region = discover_region(store, selection, w, h, x as u32, y as u32);
    let Some(bbox) = region.bbox else {
        return 0;
    };
    let mut changed = 0;
    for &(px, py) in &region.pixels {
        let c = gradient.color_at(bbox, px, py);
        if store.set(px, py, &c) {
            changed += 1;
        }
    }
    changed
}

/// Fill every pixel of the committed selection.  No selection → no effect.
pub fn fill_selection(
    layers: &mut LayerRegistry,
    selection: &SelectionState,
    layer: LayerId,
    color: &str,
) -> usize {
    let (w, h) = (layers.width(), layers.height());
    let Some(active) = selection.active() else {
        return 0;
    };
    let Some(store) = layers.get_mut(layer) else {
        return 0;
    };
    let fill = color::normalize(color);
    active
        .to_cells(w, h)
        .into_iter()
        .filter(|&(x, y)| store.set(x, y, &fill))
        .count()
}

/// Make every pixel of the committed selection transparent.
pub fn delete_selection(layers: &mut LayerRegistry, selection: &SelectionState, layer: LayerId) -> usize {
    fill_selection(layers, selection, layer, "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::shapes::GradientKind;
    use crate::selection::SelectionTool;

    fn setup(w: u32, h: u32) -> (LayerRegistry, SelectionState, LayerId) {
        let mut reg = LayerRegistry::new(w, h);
        let id = LayerId::new();
        reg.ensure(id);
        (reg, SelectionState::new(w, h), id)
    }

    #[test]
    fn single_pixel_brush() {
        let (mut reg, sel, id) = setup(4, 4);
        assert!(brush(&mut reg, &sel, id, 1, 1, 1, Some("#FF0000"), None));
        let buf = reg.get_buffer(id).unwrap();
        for (i, v) in buf.iter().enumerate() {
            if i == 5 {
                assert_eq!(v, "#FF0000");
            } else {
                assert_eq!(v, "");
            }
        }
    }

    #[test]
    fn brush_is_idempotent() {
        let (mut reg, sel, id) = setup(8, 8);
        assert!(brush(&mut reg, &sel, id, 4, 4, 3, Some("#00FF00"), None));
        let before = reg.get_buffer(id);
        assert!(!brush(&mut reg, &sel, id, 4, 4, 3, Some("#00ff00"), None));
        assert_eq!(reg.get_buffer(id), before);
    }

    #[test]
    fn even_brush_leans_top_left() {
        let (mut reg, sel, id) = setup(6, 6);
        brush(&mut reg, &sel, id, 3, 3, 2, Some("#000000"), None);
        let store = reg.get(id).unwrap();
        let mut painted: Vec<_> = store.iter().map(|(p, _)| p).collect();
        painted.sort();
        assert_eq!(painted, vec![(2, 2), (2, 3), (3, 2), (3, 3)]);
    }

    #[test]
    fn brush_clips_at_canvas_edge() {
        let (mut reg, sel, id) = setup(4, 4);
        assert!(brush(&mut reg, &sel, id, 0, 0, 3, Some("#000000"), None));
        assert_eq!(reg.get(id).unwrap().len(), 4);
        assert!(!brush(&mut reg, &sel, id, -10, -10, 3, Some("#000000"), None));
    }

    #[test]
    fn eraser_blends_alpha() {
        let (mut reg, sel, id) = setup(4, 4);
        brush(&mut reg, &sel, id, 1, 1, 1, Some("#FF0000"), None);
        assert!(brush(&mut reg, &sel, id, 1, 1, 1, None, Some(50.0)));
        assert_eq!(reg.get(id).unwrap().get(1, 1), "rgba(255, 0, 0, 0.5)");
        assert!(brush(&mut reg, &sel, id, 1, 1, 1, None, None));
        assert!(reg.get(id).unwrap().is_empty());
        assert!(!brush(&mut reg, &sel, id, 1, 1, 1, None, None));
    }

    #[test]
    fn selection_gates_writes() {
        let (mut reg, mut sel, id) = setup(6, 6);
        sel.begin(0, 0, SelectionTool::Rectangle);
        sel.update(1, 1);
        sel.commit();
        assert!(brush(&mut reg, &sel, id, 1, 1, 3, Some("#000000"), None));
        assert_eq!(reg.get(id).unwrap().len(), 4);
        assert!(!brush(&mut reg, &sel, id, 4, 4, 1, Some("#000000"), None));
    }

    #[test]
    fn missing_layer_is_no_effect() {
        let (mut reg, sel, _) = setup(4, 4);
        let ghost = LayerId::new();
        assert!(!brush(&mut reg, &sel, ghost, 1, 1, 1, Some("#FF0000"), None));
        assert!(!line(&mut reg, &sel, ghost, (0, 0), (3, 3), 1, Some("#FF0000"), None));
        assert_eq!(flood_fill(&mut reg, &sel, ghost, 1, 1, Some("#FF0000")), 0);
        assert!(!reg.contains(ghost));
    }

    #[test]
    fn bresenham_steps_are_continuous() {
        let pts: Vec<_> = bresenham(0, 0, 5, 2).collect();
        assert_eq!(pts.first(), Some(&(0, 0)));
        assert_eq!(pts.last(), Some(&(5, 2)));
        assert_eq!(pts.len(), 6);
        for pair in pts.windows(2) {
            assert!((pair[1].0 - pair[0].0).abs() <= 1);
            assert!((pair[1].1 - pair[0].1).abs() <= 1);
        }
        assert_eq!(bresenham(3, 3, 3, 3).collect::<Vec<_>>(), vec![(3, 3)]);
    }

    #[test]
    fn line_covers_every_step() {
        let (mut reg, sel, id) = setup(10, 10);
        assert!(line(&mut reg, &sel, id, (0, 9), (9, 0), 1, Some("#123456"), None));
        let store = reg.get(id).unwrap();
        assert_eq!(store.len(), 10);
        for i in 0..10 {
            assert_eq!(store.get(i, 9 - i), "#123456");
        }
    }

    #[test]
    fn line_with_far_off_canvas_endpoints() {
        let (mut reg, sel, id) = setup(4, 3);
        assert!(line(&mut reg, &sel, id, (i32::MIN, 0), (i32::MAX, 0), 1, Some("#FF0000"), None));
        let store = reg.get(id).unwrap();
        assert_eq!(store.len(), 4);
        for x in 0..4 {
            assert_eq!(store.get(x, 0), "#FF0000");
        }
        assert!(!line(&mut reg, &sel, id, (i32::MIN, i32::MIN), (i32::MIN, i32::MAX), 3, Some("#FF0000"), None));
        assert!(line(&mut reg, &sel, id, (i32::MAX, i32::MAX), (i32::MIN, i32::MIN), 1, Some("#00FF00"), None));
        assert_eq!(reg.get(id).unwrap().get(1, 1), "#00FF00");
    }

    #[test]
    fn line_erases_along_its_path() {
        let (mut reg, sel, id) = setup(4, 2);
        line(&mut reg, &sel, id, (0, 0), (3, 0), 1, Some("#FF0000"), None);
        line(&mut reg, &sel, id, (0, 1), (3, 1), 1, Some("#0000FF"), None);
        assert!(line(&mut reg, &sel, id, (0, 0), (3, 0), 1, None, Some(50.0)));
        let store = reg.get(id).unwrap();
        for x in 0..4 {
            assert_eq!(store.get(x, 0), "rgba(255, 0, 0, 0.5)");
            assert_eq!(store.get(x, 1), "#0000FF");
        }
        assert!(line(&mut reg, &sel, id, (0, 0), (3, 0), 1, None, None));
        assert_eq!(reg.get(id).unwrap().len(), 4);
    }

    #[test]
    fn flood_fill_ignores_diagonal_neighbors() {
        let (mut reg, sel, id) = setup(5, 5);
        let store = reg.get_mut(id).unwrap();
        // L: down the left column, then along row 2
        for (x, y) in [(0, 0), (0, 1), (0, 2), (1, 2), (2, 2)] {
            store.set(x, y, "#FF0000");
        }
        store.set(3, 3, "#FF0000");
        assert_eq!(flood_fill(&mut reg, &sel, id, 0, 0, Some("#0000FF")), 5);
        let store = reg.get(id).unwrap();
        assert_eq!(store.get(2, 2), "#0000FF");
        assert_eq!(store.get(3, 3), "#FF0000");
        assert_eq!(store.get(1, 1), "");
    }

    #[test]
    fn flood_fill_stays_in_region() {
        let (mut reg, sel, id) = setup(5, 5);
        // vertical wall at x = 2
        line(&mut reg, &sel, id, (2, 0), (2, 4), 1, Some("#000000"), None);
        let changed = flood_fill(&mut reg, &sel, id, 0, 0, Some("#FF0000"));
        assert_eq!(changed, 10);
        let store = reg.get(id).unwrap();
        assert_eq!(store.get(1, 4), "#FF0000");
        assert_eq!(store.get(2, 2), "#000000");
        assert_eq!(store.get(3, 3), "");
        assert_eq!(flood_fill(&mut reg, &sel, id, 0, 0, Some("#ff0000")), 0);
    }

    #[test]
    fn flood_fill_seed_outside_canvas_is_noop() {
        let (mut reg, sel, id) = setup(3, 3);
        assert_eq!(flood_fill(&mut reg, &sel, id, 3, 0, Some("#FF0000")), 0);
        assert_eq!(flood_fill(&mut reg, &sel, id, -1, 0, Some("#FF0000")), 0);
        assert!(reg.get(id).unwrap().is_empty());
    }

    #[test]
    fn flood_fill_respects_selection() {
        let (mut reg, mut sel, id) = setup(6, 6);
        sel.begin(0, 0, SelectionTool::Rectangle);
        sel.update(2, 5);
        sel.commit();
        assert_eq!(flood_fill(&mut reg, &sel, id, 0, 0, Some("#00FF00")), 18);
        assert_eq!(flood_fill(&mut reg, &sel, id, 5, 5, Some("#00FF00")), 0);
    }

    #[test]
    fn flood_fill_erase() {
        let (mut reg, sel, id) = setup(3, 1);
        line(&mut reg, &sel, id, (0, 0), (2, 0), 1, Some("#ABCDEF"), None);
        assert_eq!(flood_fill(&mut reg, &sel, id, 1, 0, None), 3);
        assert!(reg.get(id).unwrap().is_empty());
    }

    #[test]
    fn gradient_fill_runs_start_to_end() {
        let (mut reg, sel, id) = setup(8, 2);
        let grad = GradientOptions {
            start_color: "#000000".into(),
            end_color: "#FFFFFF".into(),
            dither: false,
            ..GradientOptions::default()
        };
        assert_eq!(gradient_fill(&mut reg, &sel, id, 0, 0, &grad), 16);
        let store = reg.get(id).unwrap();
        let left = color::parse(store.get(0, 0)).r;
        let right = color::parse(store.get(7, 0)).r;
        assert!(left < 40, "left {left}");
        assert!(right > 215, "right {right}");
        assert!(color::parse(store.get(3, 1)).r <= color::parse(store.get(4, 1)).r);
    }

    #[test]
    fn radial_gradient_fill_brightens_outward() {
        let (mut reg, sel, id) = setup(9, 9);
        let grad = GradientOptions {
            kind: GradientKind::Radial,
            dither: false,
            ..GradientOptions::default()
        };
        assert_eq!(gradient_fill(&mut reg, &sel, id, 4, 4, &grad), 81);
        let store = reg.get(id).unwrap();
        let r = |x, y| color::parse(store.get(x, y)).r;
        assert!(r(4, 4) < 20, "center {}", r(4, 4));
        assert!(r(0, 0) > 200, "corner {}", r(0, 0));
        assert!(r(4, 4) < r(2, 4) && r(2, 4) < r(0, 4));
        assert_eq!(r(0, 0), r(8, 8));
    }

    #[test]
    fn dithered_gradient_fill_uses_bands() {
        let (mut reg, sel, id) = setup(16, 4);
        let grad = GradientOptions { dither: true, ..GradientOptions::default() };
        assert_eq!(gradient_fill(&mut reg, &sel, id, 0, 0, &grad), 64);
        let steps = (color::DITHER_BANDS - 1) as f32;
        let bands: Vec<u8> = (0..color::DITHER_BANDS)
            .map(|k| (255.0 * (k as f32 / steps)).round() as u8)
            .collect();
        let store = reg.get(id).unwrap();
        let mut seen = std::collections::HashSet::new();
        for y in 0..4 {
            for x in 0..16 {
                let c = color::parse(store.get(x, y));
                assert!(bands.contains(&c.r), "({x}, {y}) -> {}", store.get(x, y));
                seen.insert(c.r);
            }
        }
        assert!(seen.len() >= 4);
    }

    #[test]
    fn fill_and_delete_selection() {
        let (mut reg, mut sel, id) = setup(4, 4);
        assert_eq!(fill_selection(&mut reg, &sel, id, "#FF0000"), 0);
        sel.begin(1, 1, SelectionTool::Rectangle);
        sel.update(2, 2);
        sel.commit();
        assert_eq!(fill_selection(&mut reg, &sel, id, "#FF0000"), 4);
        assert_eq!(fill_selection(&mut reg, &sel, id, "#FF0000"), 0);
        assert_eq!(delete_selection(&mut reg, &sel, id), 4);
        assert!(reg.get(id).unwrap().is_empty());
    }
}
