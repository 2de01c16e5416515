// ============================================================================
// ENGINE SNAPSHOTS – whole-engine state for the host's undo stack
// ============================================================================
//
// The engine keeps no history of its own.  A host captures a snapshot before
// an edit, pushes it onto its undo stack, and restores it later.  Snapshots
// serialize with bincode so hosts can spill them to disk.

use serde::{Deserialize, Serialize};

use crate::canvas::{LayerId, LayerRegistry, PixelStore};
use crate::log_warn;
use crate::selection::SelectionState;

const SNAPSHOT_MAGIC: &str = "PXFS";
const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug)]
pub enum SnapshotError {
    Serialize(String),
    InvalidFormat(String),
}

impl std::fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotError::Serialize(e) => write!(f, "Serialization error: {}", e),
            SnapshotError::InvalidFormat(e) => write!(f, "Invalid format: {}", e),
        }
    }
}

impl std::error::Error for SnapshotError {}

impl From<Box<bincode::ErrorKind>> for SnapshotError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        SnapshotError::Serialize(e.to_string())
    }
}

/// Sparse contents of one layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayerSnapshot {
    pub id: LayerId,
    /// `(x, y, color)`, sorted row-major.
    pub cells: Vec<(u32, u32, String)>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    magic: String,
    version: u32,
    pub width: u32,
    pub height: u32,
    pub layers: Vec<LayerSnapshot>,
    pub selection: SelectionState,
}

impl EngineSnapshot {
    /// Copy the registry and selection state.
    pub fn capture(layers: &LayerRegistry, selection: &SelectionState) -> Self {
        let mut snaps: Vec<LayerSnapshot> = layers
            .stores()
            .map(|(id, store)| {
                let mut cells: Vec<(u32, u32, String)> = store
                    .iter()
                    .map(|((x, y), v)| (x, y, v.to_string()))
                    .collect();
                cells.sort_by_key(|&(x, y, _)| (y, x));
                LayerSnapshot { id: *id, cells }
            })
            .collect();
        snaps.sort_by_key(|s| s.id);

        Self {
            magic: SNAPSHOT_MAGIC.to_string(),
            version: SNAPSHOT_VERSION,
            width: layers.width(),
            height: layers.height(),
            layers: snaps,
            selection: selection.clone(),
        }
    }

    /// Overwrite `layers` and `selection` with the captured state.  Layers
    /// created after the capture are dropped.
    pub fn restore(&self, layers: &mut LayerRegistry, selection: &mut SelectionState) {
        let mut registry = LayerRegistry::new(self.width, self.height);
        for snap in &self.layers {
            let mut store = PixelStore::new();
            for (x, y, v) in &snap.cells {
                store.set(*x, *y, v);
            }
            registry.insert(snap.id, store);
        }
        *layers = registry;
        *selection = self.selection.clone();
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, SnapshotError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SnapshotError> {
        let snap: EngineSnapshot = bincode::deserialize(bytes).map_err(|e| {
            log_warn!("snapshot decode failed: {}", e);
            SnapshotError::from(e)
        })?;
        if snap.magic != SNAPSHOT_MAGIC {
            return Err(SnapshotError::InvalidFormat(format!("bad magic {:?}", snap.magic)));
        }
        if snap.version > SNAPSHOT_VERSION {
            return Err(SnapshotError::InvalidFormat(format!(
                "unsupported snapshot version {}",
                snap.version
            )));
        }
        Ok(snap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::SelectionTool;

    fn sample() -> (LayerRegistry, SelectionState, LayerId) {
        let mut reg = LayerRegistry::new(6, 4);
        let id = LayerId::new();
        let store = reg.ensure(id);
        store.set(1, 1, "#FF0000");
        store.set(5, 3, "rgba(0, 0, 255, 0.5)");
        reg.ensure(LayerId::new());
        let mut sel = SelectionState::new(6, 4);
        sel.begin(0, 0, SelectionTool::Ellipse);
        sel.update(3, 2);
        sel.commit();
        (reg, sel, id)
    }

    #[test]
    fn restore_undoes_later_edits() {
        let (mut reg, mut sel, id) = sample();
        let snap = EngineSnapshot::capture(&reg, &sel);

        reg.get_mut(id).unwrap().set(1, 1, "");
        reg.ensure(LayerId::new());
        reg.resize_canvas(10, 10);
        sel.clear();

        snap.restore(&mut reg, &mut sel);
        assert_eq!(reg.len(), 2);
        assert_eq!((reg.width(), reg.height()), (6, 4));
        assert_eq!(reg.get(id).unwrap().get(1, 1), "#FF0000");
        assert!(sel.is_active());
    }

    #[test]
    fn bytes_survive_bincode() {
        let (reg, sel, _) = sample();
        let snap = EngineSnapshot::capture(&reg, &sel);
        let bytes = snap.to_bytes().unwrap();
        assert_eq!(EngineSnapshot::from_bytes(&bytes).unwrap(), snap);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(EngineSnapshot::from_bytes(&[1, 2, 3]).is_err());

        let (reg, sel, _) = sample();
        let mut snap = EngineSnapshot::capture(&reg, &sel);
        snap.magic = "NOPE".into();
        let bytes = snap.to_bytes().unwrap();
        assert!(matches!(
            EngineSnapshot::from_bytes(&bytes),
            Err(SnapshotError::InvalidFormat(_))
        ));
    }
}
