// src/resources/buffer.rs
//! Geometry and index buffer objects.
//!
//! A buffer is element kind × per-element dimension × element count worth
//! of bytes, plus the hints the driver needs: which binding point it feeds
//! and whether its contents are static or dynamic. Buffers with an
//! automatic unload policy give up their CPU copy once uploaded.

use std::cell::RefCell;
use std::rc::Rc;

use crate::event::Event;

use super::{next_id, BufferId};

/// Scalar type of one buffer element component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    F32,
    F64,
}

impl ElementKind {
    pub fn size(self) -> u32 {
        match self {
            ElementKind::U8 | ElementKind::I8 => 1,
            ElementKind::U16 | ElementKind::I16 => 2,
            ElementKind::U32 | ElementKind::I32 | ElementKind::F32 => 4,
            ElementKind::F64 => 8,
        }
    }
}

/// Binding point the buffer feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Vertex,
    Index,
    PixelPack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    Static,
    Dynamic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnloadPolicy {
    Manual,
    Automatic,
}

/// Driver usage hint, the (static|dynamic) × (vertex|index|pixel-readback)
/// product collapsed to the four GL access patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
    StaticDraw,
    DynamicDraw,
    StaticCopy,
    DynamicCopy,
}

/// Fired after a buffer's contents change. The whole buffer re-uploads.
#[derive(Debug, Clone, Copy)]
pub struct BufferChange;

pub type BufferRef = Rc<RefCell<DataBuffer>>;

pub struct DataBuffer {
    id: BufferId,
    element: ElementKind,
    dimension: u32,
    count: u32,
    block: BlockKind,
    update: UpdateMode,
    unload_policy: UnloadPolicy,
    data: Option<Vec<u8>>,
    changed: Event<BufferChange>,
}

impl DataBuffer {
    pub fn new(
        block: BlockKind,
        element: ElementKind,
        dimension: u32,
        data: Vec<u8>,
    ) -> BufferRef {
        let stride = (element.size() * dimension) as usize;
        assert!(stride > 0);
        assert!(
            data.len() % stride == 0,
            "buffer length {} is not a multiple of element stride {stride}",
            data.len()
        );
        let count = (data.len() / stride) as u32;
        Rc::new(RefCell::new(Self {
            id: BufferId(next_id()),
            element,
            dimension,
            count,
            block,
            update: UpdateMode::Static,
            unload_policy: UnloadPolicy::Manual,
            data: Some(data),
            changed: Event::new(),
        }))
    }

    /// Vertex buffer of 2-component floats.
    pub fn from_vec2s(values: &[[f32; 2]]) -> BufferRef {
        Self::new(BlockKind::Vertex, ElementKind::F32, 2, bytemuck::cast_slice(values).to_vec())
    }

    /// Vertex buffer of 3-component floats.
    pub fn from_vec3s(values: &[[f32; 3]]) -> BufferRef {
        Self::new(BlockKind::Vertex, ElementKind::F32, 3, bytemuck::cast_slice(values).to_vec())
    }

    /// Index buffer of 32-bit indices.
    pub fn from_indices(indices: &[u32]) -> BufferRef {
        Self::new(BlockKind::Index, ElementKind::U32, 1, bytemuck::cast_slice(indices).to_vec())
    }

    pub fn id(&self) -> BufferId {
        self.id
    }

    pub fn element(&self) -> ElementKind {
        self.element
    }

    pub fn dimension(&self) -> u32 {
        self.dimension
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn block(&self) -> BlockKind {
        self.block
    }

    pub fn update_mode(&self) -> UpdateMode {
        self.update
    }

    pub fn set_update_mode(&mut self, update: UpdateMode) {
        self.update = update;
    }

    pub fn unload_policy(&self) -> UnloadPolicy {
        self.unload_policy
    }

    pub fn set_unload_policy(&mut self, policy: UnloadPolicy) {
        self.unload_policy = policy;
    }

    /// GPU-side size: element size × element count × per-element dimension.
    pub fn byte_len(&self) -> u32 {
        self.element.size() * self.count * self.dimension
    }

    pub fn usage(&self) -> BufferUsage {
        match (self.update, self.block) {
            (UpdateMode::Static, BlockKind::PixelPack) => BufferUsage::StaticCopy,
            (UpdateMode::Static, _) => BufferUsage::StaticDraw,
            (UpdateMode::Dynamic, BlockKind::PixelPack) => BufferUsage::DynamicCopy,
            (UpdateMode::Dynamic, _) => BufferUsage::DynamicDraw,
        }
    }

    pub fn is_resident(&self) -> bool {
        self.data.is_some()
    }

    pub fn bytes(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    /// Drop the CPU-side copy (the GPU copy, if any, stays valid).
    pub fn unload(&mut self) {
        self.data = None;
    }

    /// Replace the contents and fire the change event. The new data must
    /// keep the element stride; the element count may change.
    pub fn set_data(&mut self, data: Vec<u8>) {
        let stride = (self.element.size() * self.dimension) as usize;
        assert!(data.len() % stride == 0);
        self.count = (data.len() / stride) as u32;
        self.data = Some(data);
        self.changed.notify(&BufferChange);
    }

    pub fn changed(&self) -> &Event<BufferChange> {
        &self.changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_len_is_size_times_count_times_dimension() {
        let buf = DataBuffer::from_vec3s(&[[0.0, 0.0, 0.0], [1.0, 1.0, 1.0]]);
        let buf = buf.borrow();
        assert_eq!(buf.count(), 2);
        assert_eq!(buf.byte_len(), 4 * 2 * 3);
    }

    #[test]
    fn usage_hint_follows_mode_and_block() {
        let buf = DataBuffer::from_indices(&[0, 1, 2]);
        assert_eq!(buf.borrow().usage(), BufferUsage::StaticDraw);
        buf.borrow_mut().set_update_mode(UpdateMode::Dynamic);
        assert_eq!(buf.borrow().usage(), BufferUsage::DynamicDraw);

        let pack = DataBuffer::new(BlockKind::PixelPack, ElementKind::U8, 1, vec![0; 16]);
        assert_eq!(pack.borrow().usage(), BufferUsage::StaticCopy);
    }

    #[test]
    fn set_data_fires_change_and_updates_count() {
        let buf = DataBuffer::from_vec2s(&[[0.0, 0.0]]);
        let fired = Rc::new(std::cell::Cell::new(false));
        let fired2 = fired.clone();
        let _sub = buf.borrow().changed().attach(move |_| fired2.set(true));

        buf.borrow_mut()
            .set_data(bytemuck::cast_slice(&[[1.0f32, 2.0], [3.0, 4.0]]).to_vec());
        assert!(fired.get());
        assert_eq!(buf.borrow().count(), 2);
    }
}
