//! PixelFE: a sparse, string-colored raster engine for pixel-art editing.
//!
//! Layers live in a [`canvas::LayerRegistry`]; every drawing, selection,
//! transform and seam-carving call takes the registry (and the selection
//! state where it gates writes) explicitly.

#[macro_use]
pub mod logger;
pub mod canvas;
pub mod cli;
pub mod color;
pub mod history;
pub mod io;
pub mod ops;
pub mod selection;
pub mod settings;

pub use canvas::{LayerId, LayerRegistry, PixelBuffer, PixelStore};
pub use color::Color;
pub use history::EngineSnapshot;
pub use selection::{Selection, SelectionPhase, SelectionRect, SelectionState, SelectionTool};
pub use settings::EngineSettings;
