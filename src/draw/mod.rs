//! Draw module - the backend-neutral draw-data snapshot
//!
//! The UI core produces geometry in its own per-frame buffers. Backends never
//! touch those directly; they consume a [`DrawData`] snapshot captured once
//! per render call. Command metadata is copied into the snapshot, vertex and
//! index buffers are shared by refcount with the frame that produced them, so
//! a held snapshot stays intact even after the core starts the next frame.

use std::fmt;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};

use crate::core::{Float2, Float4, Vec2};

/// Opaque texture identifier, chosen by whoever registered the texture with
/// the backend. The font atlas is id 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TextureId(pub u64);

/// Single vertex of a draw list.
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
#[repr(C)]
pub struct DrawVertex {
    pub position: Vec2,
    pub tex_coord: Vec2,
    /// Packed 0xAABBGGRR.
    pub color: u32,
}

/// Called instead of rendering the command's vertices, for advanced uses.
pub type DrawCallback = dyn Fn(&DrawData, &DrawCommand) + Send + Sync;

/// One GPU draw call worth of state.
#[derive(Clone)]
pub struct DrawCommand {
    /// Number of indices (multiple of 3) rendered as triangles.
    pub element_count: u32,
    /// Clipping rectangle (x1, y1, x2, y2) in display coordinates.
    pub clip_rect: Float4,
    pub texture: TextureId,
    /// When set, backends invoke this instead of drawing the vertices.
    pub callback: Option<Arc<DrawCallback>>,
}

impl fmt::Debug for DrawCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DrawCommand")
            .field("element_count", &self.element_count)
            .field("clip_rect", &self.clip_rect)
            .field("texture", &self.texture)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

/// An ordered batch of commands over one vertex/index buffer pair.
#[derive(Debug, Clone, Default)]
pub struct DrawList {
    pub commands: Vec<DrawCommand>,
    pub vertices: Arc<[DrawVertex]>,
    pub indices: Arc<[u32]>,
}

/// Flat snapshot of one frame's geometry. Valid content-wise for exactly one
/// frame; rebuilt in full by every capture.
#[derive(Debug, Clone, Default)]
pub struct DrawData {
    pub lists: Vec<DrawList>,
    pub vertex_count: u32,
    pub index_count: u32,
    pub display_pos: Float2,
    pub display_size: Float2,
    pub framebuffer_scale: Float2,
}

impl DrawData {
    /// Total number of triangles across all lists.
    pub fn triangle_count(&self) -> u32 {
        self.index_count / 3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_layout() {
        // Backends build their input layouts against these offsets.
        assert_eq!(std::mem::size_of::<DrawVertex>(), 20);
        assert_eq!(std::mem::offset_of!(DrawVertex, position), 0);
        assert_eq!(std::mem::offset_of!(DrawVertex, tex_coord), 8);
        assert_eq!(std::mem::offset_of!(DrawVertex, color), 16);
    }

    #[test]
    fn test_triangle_count() {
        let data = DrawData {
            index_count: 12,
            ..Default::default()
        };
        assert_eq!(data.triangle_count(), 4);
    }
}
