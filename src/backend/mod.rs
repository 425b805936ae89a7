//! Backend module - GPU rendering backends
//!
//! A backend owns the device-side resources for one context: pipeline,
//! geometry buffers, font texture and the per-swapchain-slot render targets.
//! The host retains ownership of the device, the swapchain and the command
//! recorder; the backend only records into what it is handed each frame.

use crate::draw::DrawData;

pub mod cache;

#[cfg(any(feature = "vulkan", feature = "dx12"))]
pub mod shaders;

pub use cache::TargetCache;

/// Number of swapchain back buffers every cache is sized for.
pub const BACK_BUFFER_COUNT: usize = 3;

/// Which graphics API the host drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderApi {
    D3D12,
    Vulkan,
}

/// Raw back-buffer resource handle as the host's API knows it: an
/// `ID3D12Resource*` or a `VkImage`. Equality of the raw value is what the
/// target cache keys on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BackBufferHandle(pub u64);

/// Raw handle of the host's open command recorder for this frame: an
/// `ID3D12GraphicsCommandList*` or a `VkCommandBuffer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommandRecorder(pub u64);

/// Common interface for the rendering backends. One instance serves one
/// context; the host calls `render` once per frame with that frame's
/// recorder, back buffer and buffer index.
pub trait RenderBackend {
    /// Which API this backend records through. Contexts declare the API they
    /// target in their descriptor; the bridge rejects mismatches.
    fn api(&self) -> RenderApi;

    /// Name of the backend (e.g. "Vulkan", "D3D12").
    fn name(&self) -> &str;

    /// Backend-specific value contexts expose to the host (the Vulkan render
    /// pass handle; 0 where the API needs nothing).
    fn api_payload(&self) -> u64;

    /// Record this frame's UI geometry into the host's recorder, targeting
    /// `back_buffer` at swapchain slot `index`.
    fn render(
        &mut self,
        recorder: CommandRecorder,
        back_buffer: BackBufferHandle,
        index: u32,
        draw_data: &DrawData,
    ) -> Result<(), String>;

    /// Drop every cached per-back-buffer target, e.g. before a swapchain
    /// resize. Targets are rebuilt lazily on the next `render`.
    fn invalidate_device_objects(&mut self);
}

#[cfg(feature = "vulkan")]
pub mod vulkan;

#[cfg(feature = "vulkan")]
pub use vulkan::VulkanBackend;

#[cfg(all(feature = "dx12", windows))]
pub mod dx12;

#[cfg(all(feature = "dx12", windows))]
pub use dx12::Dx12Backend;
