// src/resources/mod.rs
//! Engine-side resource objects.
//!
//! These are the CPU-side descriptions the resource cache maps to GPU
//! handles: 2D textures, cubemaps, geometry/index buffers and shader
//! effects. Every object gets a stable opaque id at construction; the
//! cache keys its maps by id, never by address.

pub mod buffer;
pub mod cubemap;
pub mod shader;
pub mod texture;

pub use buffer::{BlockKind, BufferRef, BufferUsage, DataBuffer, ElementKind, UnloadPolicy, UpdateMode};
pub use cubemap::{Cubemap, CubemapRef};
pub use shader::{Shader, ShaderRef, UniformValue};
pub use texture::{ColorFormat, Region, Texture2d, TextureFilter, TextureRef, TextureWrap};

use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Hand out the next resource id. Ids are unique across all resource
/// kinds for the lifetime of the process.
pub(crate) fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

macro_rules! resource_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) u64);

        impl $name {
            pub fn raw(self) -> u64 {
                self.0
            }
        }
    };
}

resource_id!(
    /// Identity of a [`Texture2d`].
    TextureId
);
resource_id!(
    /// Identity of a [`Cubemap`].
    CubemapId
);
resource_id!(
    /// Identity of a [`DataBuffer`].
    BufferId
);
resource_id!(
    /// Identity of a [`Shader`].
    ShaderId
);
