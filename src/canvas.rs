use std::collections::HashMap;
use std::fmt;

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::color;

// ============================================================================
// LAYER IDS
// ============================================================================

/// Stable identifier for a layer.  The layer owns exactly one [`PixelStore`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayerId(Uuid);

impl LayerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for LayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// PIXEL STORE – sparse coordinate → color map
// ============================================================================

/// Sparse per-layer pixel map.  A missing entry is a transparent pixel, and
/// transparent values are never stored.
///
/// Entries outside the current canvas are kept on purpose: a canvas that
/// shrinks and grows back gets its pixels back.  Use [`PixelStore::prune`] to
/// drop them explicitly.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PixelStore {
    pixels: HashMap<(u32, u32), String>,
}

impl PixelStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Color at (x, y), `""` when unset.
    pub fn get(&self, x: u32, y: u32) -> &str {
        self.pixels.get(&(x, y)).map(String::as_str).unwrap_or("")
    }

    /// Write a color exactly as given.  Transparent or unparsable input
    /// removes the entry.  Returns `true` when the stored value changed.
    pub fn set(&mut self, x: u32, y: u32, value: &str) -> bool {
        if !is_visible(value) {
            return self.pixels.remove(&(x, y)).is_some();
        }
        match self.pixels.get_mut(&(x, y)) {
            Some(existing) if existing == value => false,
            Some(existing) => {
                *existing = value.to_string();
                true
            }
            None => {
                self.pixels.insert((x, y), value.to_string());
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn clear(&mut self) {
        self.pixels.clear();
    }

    /// Iterate the non-transparent entries in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = ((u32, u32), &str)> + '_ {
        self.pixels.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// Row-major dense copy of the `w × h` canvas area, `""` for unset cells.
    pub fn materialize(&self, w: u32, h: u32) -> Vec<String> {
        let mut out = vec![String::new(); w as usize * h as usize];
        for (&(x, y), v) in &self.pixels {
            if x < w && y < h {
                out[y as usize * w as usize + x as usize] = v.clone();
            }
        }
        out
    }

    /// Rebuild the map from a dense row-major buffer of the given width,
    /// dropping transparent cells.
    pub fn replace(&mut self, buffer: &[String], width: u32) {
        self.pixels.clear();
        if width == 0 {
            return;
        }
        for (i, value) in buffer.iter().enumerate() {
            if !is_visible(value) {
                continue;
            }
            let x = (i % width as usize) as u32;
            let y = (i / width as usize) as u32;
            self.pixels.insert((x, y), value.clone());
        }
    }

    /// Drop every entry outside `[0, w) × [0, h)`.  Returns the number removed.
    pub fn prune(&mut self, w: u32, h: u32) -> usize {
        let before = self.pixels.len();
        self.pixels.retain(|&(x, y), _| x < w && y < h);
        before - self.pixels.len()
    }
}

/// A value worth storing: parses and is not transparent.
fn is_visible(value: &str) -> bool {
    color::try_parse(value).is_some_and(|c| !c.is_transparent())
}

// ============================================================================
// PIXEL BUFFER – dense rectangular block of color strings
// ============================================================================

/// A dense, row-major block of color strings (`index = y * width + x`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<String>,
}

impl PixelBuffer {
    /// Fully transparent buffer.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![String::new(); width as usize * height as usize],
        }
    }

    /// Wrap an existing row-major array.  A length mismatch is padded with
    /// transparent cells or truncated.
    pub fn from_vec(width: u32, height: u32, mut pixels: Vec<String>) -> Self {
        pixels.resize(width as usize * height as usize, String::new());
        Self { width, height, pixels }
    }

    pub fn from_store(store: &PixelStore, width: u32, height: u32) -> Self {
        Self { width, height, pixels: store.materialize(width, height) }
    }

    #[inline]
    pub fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    pub fn get(&self, x: u32, y: u32) -> &str {
        if x >= self.width || y >= self.height {
            return "";
        }
        &self.pixels[self.index(x, y)]
    }

    pub fn set(&mut self, x: u32, y: u32, value: &str) {
        if x < self.width && y < self.height {
            let i = self.index(x, y);
            self.pixels[i] = value.to_string();
        }
    }

    pub fn to_rgba_image(&self) -> RgbaImage {
        let mut out = RgbaImage::new(self.width, self.height);
        for (i, value) in self.pixels.iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            let x = (i % self.width as usize) as u32;
            let y = (i / self.width as usize) as u32;
            out.put_pixel(x, y, color::to_rgba8(value));
        }
        out
    }

    pub fn from_rgba_image(img: &RgbaImage) -> Self {
        let pixels = img.pixels().map(|p| color::from_rgba8(*p)).collect();
        Self { width: img.width(), height: img.height(), pixels }
    }
}

// ============================================================================
// LAYER REGISTRY – owns every layer's store plus the canvas size
// ============================================================================

/// Explicitly owned map of layer stores, passed into every engine call.
#[derive(Clone, Debug, Default)]
pub struct LayerRegistry {
    width: u32,
    height: u32,
    stores: HashMap<LayerId, PixelStore>,
}

impl LayerRegistry {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height, stores: HashMap::new() }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Change the canvas size.  Existing store entries are not remapped or
    /// truncated.
    pub fn resize_canvas(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    /// Lazily create an empty store for `id`.  Idempotent.
    pub fn ensure(&mut self, id: LayerId) -> &mut PixelStore {
        self.stores.entry(id).or_default()
    }

    pub fn contains(&self, id: LayerId) -> bool {
        self.stores.contains_key(&id)
    }

    pub fn get(&self, id: LayerId) -> Option<&PixelStore> {
        self.stores.get(&id)
    }

    pub fn get_mut(&mut self, id: LayerId) -> Option<&mut PixelStore> {
        self.stores.get_mut(&id)
    }

    /// Drop a layer together with its store.
    pub fn remove(&mut self, id: LayerId) -> Option<PixelStore> {
        self.stores.remove(&id)
    }

    pub fn insert(&mut self, id: LayerId, store: PixelStore) {
        self.stores.insert(id, store);
    }

    pub fn layer_ids(&self) -> Vec<LayerId> {
        let mut ids: Vec<LayerId> = self.stores.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    /// Dense canvas-sized buffer of a layer, `None` when the layer does not exist.
    pub fn get_buffer(&self, id: LayerId) -> Option<Vec<String>> {
        self.get(id).map(|s| s.materialize(self.width, self.height))
    }

    /// Replace a layer's contents from a canvas-sized dense buffer.
    /// Returns `false` when the layer does not exist.
    pub fn set_buffer(&mut self, id: LayerId, buffer: &[String]) -> bool {
        let width = self.width;
        match self.stores.get_mut(&id) {
            Some(store) => {
                store.replace(buffer, width);
                true
            }
            None => false,
        }
    }

    /// Ensure the layer exists, then return its dense `w × h` buffer.
    pub fn ensure_buffer(&mut self, id: LayerId, w: u32, h: u32) -> Vec<String> {
        self.ensure(id).materialize(w, h)
    }

    /// The layer as a [`PixelBuffer`] covering the canvas.
    pub fn layer_pixels(&self, id: LayerId) -> Option<PixelBuffer> {
        self.get(id).map(|s| PixelBuffer::from_store(s, self.width, self.height))
    }

    pub(crate) fn stores_mut(&mut self) -> impl Iterator<Item = &mut PixelStore> + '_ {
        self.stores.values_mut()
    }

    pub(crate) fn stores(&self) -> impl Iterator<Item = (&LayerId, &PixelStore)> + '_ {
        self.stores.iter()
    }
}
