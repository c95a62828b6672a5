// src/resources/cubemap.rs
//! Cubemap objects. Fixed RGBA8 layout, six faces per mip level; no other
//! format is supported. Cubemaps are immutable after construction, so they
//! carry no change event.

use std::cell::RefCell;
use std::rc::Rc;

use super::{next_id, CubemapId};

/// Face order: +X, -X, +Y, -Y, +Z, -Z.
pub struct CubemapLevel {
    pub faces: [Vec<u8>; 6],
}

pub type CubemapRef = Rc<RefCell<Cubemap>>;

pub struct Cubemap {
    id: CubemapId,
    size: u32,
    levels: Vec<CubemapLevel>,
}

impl Cubemap {
    /// Build a cubemap from a full mip chain. `levels[0]` is `size` pixels
    /// square, each further level halves (minimum 1). Every face must hold
    /// exactly `side * side * 4` bytes of RGBA8 data.
    pub fn from_levels(size: u32, levels: Vec<CubemapLevel>) -> CubemapRef {
        assert!(!levels.is_empty(), "cubemap needs at least one mip level");
        for (mip, level) in levels.iter().enumerate() {
            let side = (size >> mip).max(1) as usize;
            for face in &level.faces {
                assert_eq!(
                    face.len(),
                    side * side * 4,
                    "cubemap face size mismatch at mip {mip}"
                );
            }
        }
        Rc::new(RefCell::new(Self {
            id: CubemapId(next_id()),
            size,
            levels,
        }))
    }

    /// Single-level cubemap.
    pub fn from_faces(size: u32, faces: [Vec<u8>; 6]) -> CubemapRef {
        Self::from_levels(size, vec![CubemapLevel { faces }])
    }

    pub fn id(&self) -> CubemapId {
        self.id
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn levels(&self) -> &[CubemapLevel] {
        &self.levels
    }
}
