// ============================================================================
// CONTENT-AWARE SCALE — gradient energy, DP seam search, seam removal
// ============================================================================
//
// Shrink-only.  The energy map is rebuilt after every removed seam, which is
// O(seams · w · h): fine for pixel-art canvases, slow for photos.

use image::{GrayImage, ImageBuffer, Luma, Pixel, RgbaImage};
use rayon::prelude::*;

use crate::canvas::{LayerId, LayerRegistry};
use crate::{log_info, log_warn};

/// Energy multiplier for pixels flagged in an importance mask.
pub const IMPORTANCE_WEIGHT: f32 = 10.0;

/// Per-pixel energy, row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct EnergyMap {
    pub width: u32,
    pub height: u32,
    pub values: Vec<f32>,
}

impl EnergyMap {
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.values[y as usize * self.width as usize + x as usize]
    }

    /// Swap rows and columns.
    pub fn transposed(&self) -> EnergyMap {
        let (w, h) = (self.width as usize, self.height as usize);
        let mut values = vec![0.0; w * h];
        for y in 0..h {
            for x in 0..w {
                values[x * h + y] = self.values[y * w + x];
            }
        }
        EnergyMap { width: self.height, height: self.width, values }
    }
}

/// Gradient energy `sqrt(gx² + gy²)` from central differences over all four
/// channels, clamped at the borders.  Pixels with a non-zero importance mask
/// value are multiplied by [`IMPORTANCE_WEIGHT`].
pub fn energy(img: &RgbaImage, importance: Option<&GrayImage>) -> EnergyMap {
    energy_weighted(img, importance, IMPORTANCE_WEIGHT)
}

/// [`energy`] with a caller-chosen importance multiplier.
pub fn energy_weighted(img: &RgbaImage, importance: Option<&GrayImage>, weight: f32) -> EnergyMap {
    let (w, h) = img.dimensions();
    let mut values = vec![0.0f32; w as usize * h as usize];
    if w == 0 || h == 0 {
        return EnergyMap { width: w, height: h, values };
    }
    let importance = importance.filter(|m| m.dimensions() == (w, h));

    values.par_chunks_mut(w as usize).enumerate().for_each(|(y, row)| {
        let y = y as u32;
        let up = y.saturating_sub(1);
        let down = (y + 1).min(h - 1);
        for (x, cell) in row.iter_mut().enumerate() {
            let x = x as u32;
            let left = x.saturating_sub(1);
            let right = (x + 1).min(w - 1);
            let gx = channel_delta_sq(img.get_pixel(left, y).0, img.get_pixel(right, y).0);
            let gy = channel_delta_sq(img.get_pixel(x, up).0, img.get_pixel(x, down).0);
            let mut e = (gx + gy).sqrt();
            if importance.is_some_and(|m| m.get_pixel(x, y)[0] > 0) {
                e *= weight;
            }
            *cell = e;
        }
    });

    EnergyMap { width: w, height: h, values }
}

#[inline]
fn channel_delta_sq(a: [u8; 4], b: [u8; 4]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(&p, &q)| {
            let d = p as f32 - q as f32;
            d * d
        })
        .sum()
}

/// Minimum-cost top-to-bottom seam: one x per row, neighbors differ by at
/// most one column.  Ties go to the leftmost / straight-down candidate.
pub fn find_vertical_seam(map: &EnergyMap) -> Vec<u32> {
    let (w, h) = (map.width as usize, map.height as usize);
    if w == 0 || h == 0 {
        return Vec::new();
    }
    let mut cost = map.values.clone();
    let mut parent = vec![0u32; w * h];

    for y in 1..h {
        for x in 0..w {
            let above = (y - 1) * w;
            let mut best_x = x;
            let mut best = cost[above + x];
            if x > 0 && cost[above + x - 1] < best {
                best_x = x - 1;
                best = cost[above + x - 1];
            }
            if x + 1 < w && cost[above + x + 1] < best {
                best_x = x + 1;
                best = cost[above + x + 1];
            }
            cost[y * w + x] += best;
            parent[y * w + x] = best_x as u32;
        }
    }

    let last = (h - 1) * w;
    let mut x = (0..w)
        .min_by(|&a, &b| cost[last + a].total_cmp(&cost[last + b]))
        .unwrap_or(0);
    let mut seam = vec![0u32; h];
    for y in (0..h).rev() {
        seam[y] = x as u32;
        x = parent[y * w + x] as usize;
    }
    seam
}

/// Minimum-cost left-to-right seam: one y per column.  Runs the vertical
/// search on the transposed map.
pub fn find_horizontal_seam(map: &EnergyMap) -> Vec<u32> {
    find_vertical_seam(&map.transposed())
}

/// Drop one pixel per row at `seam[y]`, shifting the rest left.
pub fn remove_vertical_seam<P: Pixel>(
    img: &ImageBuffer<P, Vec<P::Subpixel>>,
    seam: &[u32],
) -> ImageBuffer<P, Vec<P::Subpixel>> {
    let (w, h) = img.dimensions();
    if w <= 1 || seam.len() != h as usize {
        return img.clone();
    }
    let mut out = ImageBuffer::new(w - 1, h);
    for y in 0..h {
        let cut = seam[y as usize];
        for x in 0..w - 1 {
            let sx = if x < cut { x } else { x + 1 };
            out.put_pixel(x, y, *img.get_pixel(sx, y));
        }
    }
    out
}

/// Drop one pixel per column at `seam[x]`, shifting the rest up.
pub fn remove_horizontal_seam<P: Pixel>(
    img: &ImageBuffer<P, Vec<P::Subpixel>>,
    seam: &[u32],
) -> ImageBuffer<P, Vec<P::Subpixel>> {
    let (w, h) = img.dimensions();
    if h <= 1 || seam.len() != w as usize {
        return img.clone();
    }
    let mut out = ImageBuffer::new(w, h - 1);
    for x in 0..w {
        let cut = seam[x as usize];
        for y in 0..h - 1 {
            let sy = if y < cut { y } else { y + 1 };
            out.put_pixel(x, y, *img.get_pixel(x, sy));
        }
    }
    out
}

/// Row-major source index of every surviving pixel, carried through seam
/// removal next to the image.
type IndexGrid = ImageBuffer<Luma<u32>, Vec<u32>>;

/// Shrink `img` to `target_w × target_h` by removing vertical seams, then
/// horizontal seams.  Targets above the source size clamp to it; a zero
/// target yields an empty image.
pub fn content_aware_scale(
    img: &RgbaImage,
    target_w: u32,
    target_h: u32,
    importance: Option<&GrayImage>,
) -> RgbaImage {
    content_aware_scale_weighted(img, target_w, target_h, importance, IMPORTANCE_WEIGHT)
}

/// [`content_aware_scale`] with a caller-chosen importance multiplier.
pub fn content_aware_scale_weighted(
    img: &RgbaImage,
    target_w: u32,
    target_h: u32,
    importance: Option<&GrayImage>,
    weight: f32,
) -> RgbaImage {
    carve(img, target_w, target_h, importance, weight).0
}

fn carve(
    img: &RgbaImage,
    target_w: u32,
    target_h: u32,
    importance: Option<&GrayImage>,
    weight: f32,
) -> (RgbaImage, IndexGrid) {
    let (w, h) = img.dimensions();
    let tw = target_w.min(w);
    let th = target_h.min(h);
    if (tw, th) != (target_w, target_h) {
        log_warn!(
            "content-aware scale only shrinks: target {}x{} clamped to {}x{}",
            target_w, target_h, tw, th
        );
    }
    if tw == 0 || th == 0 {
        return (RgbaImage::new(tw, th), IndexGrid::new(tw, th));
    }

    let mut mask: Option<GrayImage> = match importance {
        Some(m) if m.dimensions() == (w, h) => Some(m.clone()),
        Some(m) => {
            log_warn!(
                "importance mask {}x{} does not match image {}x{}, ignoring it",
                m.width(), m.height(), w, h
            );
            None
        }
        None => None,
    };

    log_info!("content-aware scale {}x{} -> {}x{}", w, h, tw, th);
    let mut current = img.clone();
    let mut index = IndexGrid::from_fn(w, h, |x, y| Luma([y * w + x]));

    while current.width() > tw {
        let map = energy_weighted(&current, mask.as_ref(), weight);
        let seam = find_vertical_seam(&map);
        current = remove_vertical_seam(&current, &seam);
        index = remove_vertical_seam(&index, &seam);
        mask = mask.map(|m| remove_vertical_seam(&m, &seam));
    }
    while current.height() > th {
        let map = energy_weighted(&current, mask.as_ref(), weight);
        let seam = find_horizontal_seam(&map);
        current = remove_horizontal_seam(&current, &seam);
        index = remove_horizontal_seam(&index, &seam);
        mask = mask.map(|m| remove_horizontal_seam(&m, &seam));
    }
    (current, index)
}

/// Content-aware shrink of one layer's canvas-sized contents.  The layer
/// store is replaced by the carved block anchored at the origin; the canvas
/// size is left to the caller.  Surviving cells keep their stored color
/// strings unchanged.  Returns the new block size, `None` when the layer does
/// not exist.
pub fn carve_layer(
    layers: &mut LayerRegistry,
    layer: LayerId,
    target_w: u32,
    target_h: u32,
    importance: Option<&GrayImage>,
    weight: f32,
) -> Option<(u32, u32)> {
    let src = layers.layer_pixels(layer)?;
    let (_, index) = carve(&src.to_rgba_image(), target_w, target_h, importance, weight);
    let pixels: Vec<String> = index
        .pixels()
        .map(|p| src.pixels.get(p.0[0] as usize).cloned().unwrap_or_default())
        .collect();
    let (w, h) = index.dimensions();
    layers.get_mut(layer)?.replace(&pixels, w);
    Some((w, h))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn ramp(w: u32, h: u32, step: u8) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, _| Rgba([x as u8 * step, 0, 0, 255]))
    }

    #[test]
    fn energy_of_flat_image_is_zero() {
        let img = RgbaImage::from_pixel(4, 3, Rgba([9, 9, 9, 255]));
        assert!(energy(&img, None).values.iter().all(|&e| e == 0.0));
    }

    #[test]
    fn energy_uses_central_differences() {
        let map = energy(&ramp(4, 1, 20), None);
        assert_eq!(map.get(0, 0), 20.0);
        assert_eq!(map.get(1, 0), 40.0);
        assert_eq!(map.get(3, 0), 20.0);
    }

    #[test]
    fn importance_multiplies_energy() {
        let img = ramp(4, 1, 20);
        let mut mask = GrayImage::new(4, 1);
        mask.put_pixel(1, 0, Luma([255]));
        let map = energy(&img, Some(&mask));
        assert_eq!(map.get(1, 0), 400.0);
        assert_eq!(map.get(2, 0), 40.0);
    }

    #[test]
    fn vertical_seam_is_connected_and_cheapest() {
        let map = EnergyMap {
            width: 4,
            height: 3,
            values: vec![
                5.0, 1.0, 5.0, 5.0, //
                5.0, 5.0, 1.0, 5.0, //
                5.0, 5.0, 5.0, 1.0, //
            ],
        };
        assert_eq!(find_vertical_seam(&map), vec![1, 2, 3]);
    }

    #[test]
    fn horizontal_seam_uses_transpose() {
        let map = EnergyMap {
            width: 3,
            height: 3,
            values: vec![
                9.0, 9.0, 9.0, //
                1.0, 9.0, 9.0, //
                9.0, 1.0, 1.0, //
            ],
        };
        let seam = find_horizontal_seam(&map);
        assert_eq!(seam, vec![1, 2, 2]);
        assert_eq!(map.transposed().transposed(), map);
    }

    #[test]
    fn seam_removal_shrinks_one_dimension() {
        let img = ramp(5, 3, 10);
        let v = remove_vertical_seam(&img, &[0, 1, 4]);
        assert_eq!(v.dimensions(), (4, 3));
        assert_eq!(v.get_pixel(0, 0)[0], 10);
        assert_eq!(v.get_pixel(1, 1)[0], 20);
        assert_eq!(v.get_pixel(3, 2)[0], 30);
        let hz = remove_horizontal_seam(&img, &[0, 0, 2, 1, 1]);
        assert_eq!(hz.dimensions(), (5, 2));
    }

    #[test]
    fn scale_hits_exact_target() {
        let img = RgbaImage::from_fn(9, 7, |x, y| Rgba([(x * 31 % 256) as u8, (y * 57 % 256) as u8, 3, 255]));
        for (tw, th) in [(9, 7), (5, 7), (9, 2), (1, 1), (4, 3)] {
            assert_eq!(content_aware_scale(&img, tw, th, None).dimensions(), (tw, th));
        }
    }

    #[test]
    fn growing_targets_clamp_to_source() {
        let img = ramp(4, 4, 5);
        assert_eq!(content_aware_scale(&img, 10, 2, None).dimensions(), (4, 2));
    }

    #[test]
    fn zero_target_gives_empty_image() {
        let img = ramp(4, 4, 5);
        assert_eq!(content_aware_scale(&img, 0, 0, None).dimensions(), (0, 0));
        assert_eq!(content_aware_scale(&img, 0, 3, None).dimensions(), (0, 3));
        assert_eq!(content_aware_scale(&img, 2, 0, None).dimensions(), (2, 0));
    }

    #[test]
    fn low_energy_columns_go_first() {
        // flat background with one bright line at x = 3
        let img = RgbaImage::from_fn(6, 4, |x, _| {
            if x == 3 { Rgba([255, 255, 255, 255]) } else { Rgba([0, 0, 0, 255]) }
        });
        let out = content_aware_scale(&img, 4, 4, None);
        let bright = (0..4).filter(|&x| out.get_pixel(x, 0)[0] == 255).count();
        assert_eq!(bright, 1);
    }

    #[test]
    fn importance_mask_protects_marked_columns() {
        let img = ramp(6, 3, 20);
        let plain = content_aware_scale(&img, 5, 3, None);
        assert_eq!(plain.get_pixel(0, 0)[0], 20);

        let mut mask = GrayImage::new(6, 3);
        for y in 0..3 {
            mask.put_pixel(0, y, Luma([255]));
            mask.put_pixel(5, y, Luma([255]));
        }
        let kept = content_aware_scale(&img, 5, 3, Some(&mask));
        assert_eq!(kept.get_pixel(0, 0)[0], 0);
        assert_eq!(kept.get_pixel(4, 0)[0], 100);
    }

    #[test]
    fn carve_layer_replaces_store() {
        let mut reg = LayerRegistry::new(4, 4);
        let id = LayerId::new();
        reg.ensure(id).set(0, 0, "#FF0000");
        assert_eq!(carve_layer(&mut reg, id, 2, 3, None, IMPORTANCE_WEIGHT), Some((2, 3)));
        assert!(reg.get(id).unwrap().iter().all(|((x, y), _)| x < 2 && y < 3));
        assert_eq!(carve_layer(&mut reg, LayerId::new(), 2, 2, None, IMPORTANCE_WEIGHT), None);
    }

    #[test]
    fn carve_layer_keeps_surviving_strings() {
        let mut reg = LayerRegistry::new(2, 1);
        let id = LayerId::new();
        let store = reg.ensure(id);
        store.set(0, 0, "#ff0000");
        store.set(1, 0, "rgba(0, 0, 255, 0.5)");
        assert_eq!(carve_layer(&mut reg, id, 2, 1, None, IMPORTANCE_WEIGHT), Some((2, 1)));
        assert_eq!(reg.get(id).unwrap().get(0, 0), "#ff0000");
        assert_eq!(reg.get(id).unwrap().get(1, 0), "rgba(0, 0, 255, 0.5)");

        // equal energies: the leftmost column goes
        assert_eq!(carve_layer(&mut reg, id, 1, 1, None, IMPORTANCE_WEIGHT), Some((1, 1)));
        let store = reg.get(id).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(0, 0), "rgba(0, 0, 255, 0.5)");
    }

    #[test]
    fn carve_layer_moves_cells_with_their_strings() {
        let mut reg = LayerRegistry::new(6, 4);
        let id = LayerId::new();
        let store = reg.ensure(id);
        for y in 0..4 {
            for x in 0..6 {
                store.set(x, y, if x == 3 { "#ffffff" } else { "#000000" });
            }
        }
        assert_eq!(carve_layer(&mut reg, id, 4, 4, None, IMPORTANCE_WEIGHT), Some((4, 4)));
        let store = reg.get(id).unwrap();
        let bright: Vec<_> = store.iter().filter(|(_, v)| *v == "#ffffff").collect();
        assert_eq!(bright.len(), 4);
        assert!(store.iter().all(|(_, v)| v == "#ffffff" || v == "#000000"));
    }
}
