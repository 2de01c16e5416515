// ============================================================================
// SELECTION SYSTEM — geometric and mask regions, region algebra
// ============================================================================
//
// A selection is exactly one of Rect / Ellipse / Polygon / Mask.  Once a
// region operation (invert, polygon grow) materializes a mask, the mask is the
// selection and the original geometry is gone.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Tool that starts a selection drag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionTool {
    Rectangle,
    Ellipse,
    Lasso,
}

/// Integer box in canvas pixels.  Membership is half-open:
/// `x <= px < x + w`, `y <= py < y + h`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionRect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl SelectionRect {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    #[inline]
    pub fn contains(&self, px: u32, py: u32) -> bool {
        px >= self.x
            && py >= self.y
            && px < self.x.saturating_add(self.w)
            && py < self.y.saturating_add(self.h)
    }

    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }

    /// Smallest box containing every point, inclusive of the points themselves.
    fn around<I: IntoIterator<Item = (u32, u32)>>(points: I) -> Self {
        let mut it = points.into_iter();
        let Some((fx, fy)) = it.next() else {
            return Self::default();
        };
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (fx, fy, fx, fy);
        for (x, y) in it {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        Self::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1)
    }
}

/// An active region.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Selection {
    Rect(SelectionRect),
    /// Ellipse inscribed in the box.
    Ellipse(SelectionRect),
    Polygon { points: Vec<(u32, u32)>, bounds: SelectionRect },
    Mask { cells: HashSet<(u32, u32)>, bounds: SelectionRect },
}

impl Selection {
    pub fn bounds(&self) -> SelectionRect {
        match self {
            Selection::Rect(r) | Selection::Ellipse(r) => *r,
            Selection::Polygon { bounds, .. } | Selection::Mask { bounds, .. } => *bounds,
        }
    }

    pub fn is_mask(&self) -> bool {
        matches!(self, Selection::Mask { .. })
    }

    /// Membership test.  Ellipse and polygon sample the pixel center.
    pub fn is_within(&self, x: u32, y: u32) -> bool {
        match self {
            Selection::Mask { cells, .. } => cells.contains(&(x, y)),
            Selection::Rect(r) => r.contains(x, y),
            Selection::Ellipse(r) => ellipse_contains(r, x, y),
            Selection::Polygon { points, bounds } => {
                bounds.contains(x, y)
                    && point_in_polygon(points, x as f32 + 0.5, y as f32 + 0.5)
            }
        }
    }

    /// Every member pixel inside the `w × h` canvas.
    pub fn to_cells(&self, w: u32, h: u32) -> HashSet<(u32, u32)> {
        if let Selection::Mask { cells, .. } = self {
            return cells.iter().copied().filter(|&(x, y)| x < w && y < h).collect();
        }
        let b = self.bounds();
        let mut cells = HashSet::new();
        for y in b.y..b.y.saturating_add(b.h).min(h) {
            for x in b.x..b.x.saturating_add(b.w).min(w) {
                if self.is_within(x, y) {
                    cells.insert((x, y));
                }
            }
        }
        cells
    }

    fn from_cells(cells: HashSet<(u32, u32)>) -> Self {
        let bounds = SelectionRect::around(cells.iter().copied());
        Selection::Mask { cells, bounds }
    }
}

fn ellipse_contains(r: &SelectionRect, x: u32, y: u32) -> bool {
    if r.is_empty() {
        return false;
    }
    let rx = r.w as f32 * 0.5;
    let ry = r.h as f32 * 0.5;
    let dx = (x as f32 + 0.5 - (r.x as f32 + rx)) / rx;
    let dy = (y as f32 + 0.5 - (r.y as f32 + ry)) / ry;
    dx * dx + dy * dy <= 1.0
}

/// Even-odd ray casting.  Polygons with fewer than three points contain nothing.
pub fn point_in_polygon(points: &[(u32, u32)], px: f32, py: f32) -> bool {
    let n = points.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = (points[i].0 as f32, points[i].1 as f32);
        let (xj, yj) = (points[j].0 as f32, points[j].1 as f32);
        if (yi > py) != (yj > py) && px < (xj - xi) * (py - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Lifecycle of the selection: `Empty → Building → Committed → Empty`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum SelectionPhase {
    #[default]
    Empty,
    Building { anchor: (u32, u32), region: Selection },
    Committed(Selection),
}

/// The selection value an engine call operates on.  Owned by the host and
/// passed explicitly; it knows the canvas size so every coordinate it stores
/// stays inside `[0, width) × [0, height)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SelectionState {
    width: u32,
    height: u32,
    phase: SelectionPhase,
}

impl SelectionState {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height, phase: SelectionPhase::Empty }
    }

    pub fn set_canvas_size(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    pub fn canvas_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn phase(&self) -> &SelectionPhase {
        &self.phase
    }

    /// The region being built or committed, if any.
    pub fn selection(&self) -> Option<&Selection> {
        match &self.phase {
            SelectionPhase::Empty => None,
            SelectionPhase::Building { region, .. } => Some(region),
            SelectionPhase::Committed(sel) => Some(sel),
        }
    }

    fn selection_mut(&mut self) -> Option<&mut Selection> {
        match &mut self.phase {
            SelectionPhase::Empty => None,
            SelectionPhase::Building { region, .. } => Some(region),
            SelectionPhase::Committed(sel) => Some(sel),
        }
    }

    /// The committed region that gates drawing.
    pub fn active(&self) -> Option<&Selection> {
        match &self.phase {
            SelectionPhase::Committed(sel) => Some(sel),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active().is_some()
    }

    pub fn bounds(&self) -> Option<SelectionRect> {
        self.selection().map(Selection::bounds)
    }

    /// Membership in the current region; `false` when there is none.
    pub fn is_within(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height && self.selection().is_some_and(|s| s.is_within(x, y))
    }

    /// Whether a drawing operation may touch (x, y): inside the canvas and,
    /// when a selection is committed, inside it.
    pub fn allows(&self, x: u32, y: u32) -> bool {
        x < self.width
            && y < self.height
            && self.active().is_none_or(|s| s.is_within(x, y))
    }

    fn clamp_point(&self, x: i32, y: i32) -> (u32, u32) {
        let max_x = self.width.saturating_sub(1) as i64;
        let max_y = self.height.saturating_sub(1) as i64;
        ((x as i64).clamp(0, max_x) as u32, (y as i64).clamp(0, max_y) as u32)
    }

    /// Start a new selection drag at (x, y), discarding any previous one.
    pub fn begin(&mut self, x: i32, y: i32, tool: SelectionTool) {
        let anchor = self.clamp_point(x, y);
        let region = match tool {
            SelectionTool::Rectangle => Selection::Rect(SelectionRect::new(anchor.0, anchor.1, 0, 0)),
            SelectionTool::Ellipse => Selection::Ellipse(SelectionRect::new(anchor.0, anchor.1, 0, 0)),
            SelectionTool::Lasso => Selection::Polygon {
                points: vec![anchor],
                bounds: SelectionRect::new(anchor.0, anchor.1, 1, 1),
            },
        };
        self.phase = SelectionPhase::Building { anchor, region };
    }

    /// Rectangle / ellipse drag: box from the fixed anchor to the cursor,
    /// inclusive of both.  Aspect locking is the caller's job.
    pub fn update(&mut self, x: i32, y: i32) {
        let p = self.clamp_point(x, y);
        if let SelectionPhase::Building { anchor, region } = &mut self.phase {
            let r = SelectionRect::around([*anchor, p]);
            match region {
                Selection::Rect(b) | Selection::Ellipse(b) => *b = r,
                _ => {}
            }
        }
    }

    /// Lasso drag: append a point unless it repeats the last one.
    pub fn add_point(&mut self, x: i32, y: i32) {
        let p = self.clamp_point(x, y);
        if let SelectionPhase::Building { region: Selection::Polygon { points, bounds }, .. } =
            &mut self.phase
        {
            if points.last() == Some(&p) {
                return;
            }
            points.push(p);
            *bounds = SelectionRect::around(points.iter().copied());
        }
    }

    /// Finish the drag.  Zero-area boxes become 1×1; a lasso with fewer than
    /// three points deselects.
    pub fn commit(&mut self) {
        let phase = std::mem::take(&mut self.phase);
        self.phase = match phase {
            SelectionPhase::Building { region, .. } => match region {
                Selection::Rect(r) => SelectionPhase::Committed(Selection::Rect(self.at_least_one(r))),
                Selection::Ellipse(r) => {
                    SelectionPhase::Committed(Selection::Ellipse(self.at_least_one(r)))
                }
                Selection::Polygon { points, .. } if points.len() < 3 => SelectionPhase::Empty,
                other => SelectionPhase::Committed(other),
            },
            other => other,
        };
    }

    fn at_least_one(&self, r: SelectionRect) -> SelectionRect {
        let w = r.w.max(1).min(self.width.saturating_sub(r.x).max(1));
        let h = r.h.max(1).min(self.height.saturating_sub(r.y).max(1));
        SelectionRect::new(r.x, r.y, w, h)
    }

    /// Deselect.
    pub fn clear(&mut self) {
        self.phase = SelectionPhase::Empty;
    }

    /// Set a committed selection directly (clamped to the canvas).
    pub fn set(&mut self, selection: Selection) {
        let (w, h) = (self.width, self.height);
        let clamped = match selection {
            Selection::Rect(r) => Selection::Rect(self.clamp_rect(r)),
            Selection::Ellipse(r) => Selection::Ellipse(self.clamp_rect(r)),
            Selection::Polygon { points, .. } => {
                let points: Vec<_> =
                    points.into_iter().map(|(x, y)| self.clamp_point(x as i32, y as i32)).collect();
                let bounds = SelectionRect::around(points.iter().copied());
                Selection::Polygon { points, bounds }
            }
            Selection::Mask { cells, .. } => Selection::from_cells(
                cells.into_iter().filter(|&(x, y)| x < w && y < h).collect(),
            ),
        };
        self.phase = SelectionPhase::Committed(clamped);
    }

    fn clamp_rect(&self, r: SelectionRect) -> SelectionRect {
        let x = r.x.min(self.width.saturating_sub(1));
        let y = r.y.min(self.height.saturating_sub(1));
        let w = r.w.max(1).min(self.width - x);
        let h = r.h.max(1).min(self.height - y);
        SelectionRect::new(x, y, w, h)
    }

    /// Flip membership of every canvas pixel.  O(w·h); the result is always a
    /// committed mask and the previous geometry is discarded.
    pub fn invert(&mut self) {
        let (w, h) = (self.width, self.height);
        let current = self.selection();
        let mut cells = HashSet::new();
        for y in 0..h {
            for x in 0..w {
                if !current.is_some_and(|s| s.is_within(x, y)) {
                    cells.insert((x, y));
                }
            }
        }
        self.phase = SelectionPhase::Committed(Selection::from_cells(cells));
    }

    /// Grow the selection by `n` pixels.
    ///
    /// Rect / ellipse: the box expands by `n` per side (clamped), so a grown
    /// ellipse is still the ellipse inscribed in the bigger box.  Polygon /
    /// mask: every boundary cell contributes a `(2n+1)²` square neighborhood,
    /// and the result becomes a mask.
    pub fn grow(&mut self, n: u32) {
        if n == 0 {
            return;
        }
        let (w, h) = (self.width, self.height);
        let grown = match self.selection() {
            None => return,
            Some(Selection::Rect(r)) => Selection::Rect(expand(r, n, w, h)),
            Some(Selection::Ellipse(r)) => Selection::Ellipse(expand(r, n, w, h)),
            Some(sel) => Selection::from_cells(dilate(&sel.to_cells(w, h), n, w, h)),
        };
        if let Some(slot) = self.selection_mut() {
            *slot = grown;
        }
    }

    /// Translate the selection.  Each rect origin, polygon point, and mask
    /// cell is clamped on its own, so a mask pushed into an edge can lose
    /// cells to collisions.
    pub fn move_by(&mut self, dx: i32, dy: i32) {
        if dx == 0 && dy == 0 {
            return;
        }
        let (w, h) = (self.width, self.height);
        let shift = |v: u32, d: i32, max: u32| -> u32 {
            (v as i64 + d as i64).clamp(0, max as i64) as u32
        };
        let Some(sel) = self.selection_mut() else { return };
        match sel {
            Selection::Rect(r) | Selection::Ellipse(r) => {
                r.x = shift(r.x, dx, w.saturating_sub(r.w));
                r.y = shift(r.y, dy, h.saturating_sub(r.h));
            }
            Selection::Polygon { points, bounds } => {
                for p in points.iter_mut() {
                    *p = (shift(p.0, dx, w.saturating_sub(1)), shift(p.1, dy, h.saturating_sub(1)));
                }
                *bounds = SelectionRect::around(points.iter().copied());
            }
            Selection::Mask { cells, bounds } => {
                let moved: HashSet<(u32, u32)> = cells
                    .iter()
                    .map(|&(x, y)| (shift(x, dx, w.saturating_sub(1)), shift(y, dy, h.saturating_sub(1))))
                    .collect();
                *bounds = SelectionRect::around(moved.iter().copied());
                *cells = moved;
            }
        }
    }
}

fn expand(r: &SelectionRect, n: u32, w: u32, h: u32) -> SelectionRect {
    let x0 = r.x.saturating_sub(n);
    let y0 = r.y.saturating_sub(n);
    let x1 = r.x.saturating_add(r.w).saturating_add(n).min(w);
    let y1 = r.y.saturating_add(r.h).saturating_add(n).min(h);
    SelectionRect::new(x0, y0, x1.saturating_sub(x0), y1.saturating_sub(y0))
}

/// Square-neighborhood dilation seeded from boundary cells only.
fn dilate(cells: &HashSet<(u32, u32)>, n: u32, w: u32, h: u32) -> HashSet<(u32, u32)> {
    let mut out = cells.clone();
    let is_boundary = |x: u32, y: u32| {
        x == 0
            || y == 0
            || !cells.contains(&(x - 1, y))
            || !cells.contains(&(x + 1, y))
            || !cells.contains(&(x, y - 1))
            || !cells.contains(&(x, y + 1))
    };
    for &(x, y) in cells {
        if !is_boundary(x, y) {
            continue;
        }
        let x0 = x.saturating_sub(n);
        let y0 = y.saturating_sub(n);
        let x1 = x.saturating_add(n).min(w.saturating_sub(1));
        let y1 = y.saturating_add(n).min(h.saturating_sub(1));
        for ny in y0..=y1 {
            for nx in x0..=x1 {
                out.insert((nx, ny));
            }
        }
    }
    out
}
