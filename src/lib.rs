//! Lucarne - immediate-mode UI bridge for render hosts
//!
//! # Architecture
//! - **Contexts**: one per UI surface, owning IO state, retained window
//!   placement and the per-frame geometry; swapped through a registry
//! - **Snapshots**: command metadata copied, vertex/index buffers shared by
//!   refcount, so a captured frame survives the next one
//! - **Backends**: Vulkan and D3D12 record into host-owned command streams
//!   and cache one render target per swapchain back buffer
//!
//! The host drives everything: it owns the device, the swapchain and the
//! frame loop, and talks to the bridge through the [`api::UiApi`] trait.

pub mod api;
pub mod context;
pub mod core;
pub mod draw;
pub mod input;
pub mod ui;

pub mod backend;

/// Convenient re-exports for common usage
pub mod prelude {
    pub use crate::api::{RenderCallbackSite, UiApi, UiBridge, UiRenderCallback};
    pub use crate::backend::{BackBufferHandle, CommandRecorder, RenderApi, RenderBackend};
    pub use crate::context::{ContextDesc, ContextId, WindowHandle};
    pub use crate::core::{ColorF, Float2, Float4, Rect, Vec2};
    pub use crate::draw::{DrawData, DrawList, DrawVertex, TextureId};
    pub use crate::input::{KeyboardEvent, MouseButton, MouseEvent};
    pub use crate::ui::plot::{Graph, GraphFlags, GraphValues};
}

pub use crate::api::{UiApi, UiBridge};
pub use crate::core::{ColorF, Float2, Float4, Rect, Vec2};
pub use crate::draw::{DrawData, DrawList, DrawVertex};
