//! Host-facing API - the bridge between a render host and the UI core
//!
//! Hosts talk to a [`UiBridge`] through the [`UiApi`] trait, one method per
//! operation instead of a table of raw function pointers, so the compiler
//! checks every call site. The bridge owns the context registry and the
//! rendering backend; everything else is forwarding with frame-phase checks.

use crate::backend::{BackBufferHandle, CommandRecorder, RenderBackend};
use crate::context::{Context, ContextDesc, ContextId, ContextRegistry};
use crate::core::Vec2;
use crate::draw::DrawData;
use crate::input::{KeyboardEvent, MouseEvent};
use crate::ui::plot::{Graph, GraphValues};
use crate::ui::{BackendFlags, WindowState};

/// Callback other components register to draw their own UI each frame. The
/// `bool` is true on the final invocation of a frame, after which no more
/// widget calls are allowed.
pub type UiRenderCallback = Box<dyn FnMut(&mut dyn UiApi, bool) + Send>;

/// Where a registered render callback fires: inside the host's main overlay
/// window pass, or once per frame regardless of window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderCallbackSite {
    Window,
    Anywhere,
}

/// Frame ordering as the bridge sees it. `render` is only legal while a frame
/// is being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum FramePhase {
    #[default]
    Idle,
    Recording,
}

/// Everything a host can ask of the UI bridge.
pub trait UiApi {
    /// Create a context for one UI surface and make it current.
    fn create_context(&mut self, desc: &ContextDesc) -> Result<ContextId, String>;

    /// Destroy a context, releasing everything `create_context` built for
    /// it. Destroying the current context leaves no context current.
    fn destroy_context(&mut self, id: ContextId) -> Result<(), String>;

    fn set_current_context(&mut self, id: ContextId);

    fn current_context(&self) -> Option<ContextId>;

    /// Backend payload held by the current context (the Vulkan render pass
    /// handle; 0 for D3D12 or while no backend is attached).
    fn api_data(&self) -> Option<u64>;

    /// Begin a frame on the current context.
    fn new_frame(&mut self, elapsed_time: f32) -> Result<(), String>;

    /// Finalize the current frame and record its draw commands into the
    /// host's `recorder` targeting `back_buffer` at swapchain slot `index`.
    fn render(
        &mut self,
        recorder: CommandRecorder,
        back_buffer: BackBufferHandle,
        index: u32,
    ) -> Result<(), String>;

    /// The last rendered frame's geometry snapshot. Stays valid until the
    /// next `render` on the same context.
    fn draw_data(&self) -> Option<&DrawData>;

    /// Route a mouse event to the current context. Returns true when the
    /// host should also process the event itself.
    fn feed_mouse_event(&mut self, event: &MouseEvent) -> bool;

    /// Keyboard routing through the bridge is not supported; hosts drive the
    /// UI core's key map directly. Always returns false.
    fn feed_keyboard_event(&mut self, event: &KeyboardEvent) -> bool;

    fn register_render_callback(&mut self, site: RenderCallbackSite, callback: UiRenderCallback);

    /// Invoke the callbacks registered for the window site, passing
    /// `final_frame` through.
    fn trigger_render_window_callbacks(&mut self, final_frame: bool);

    /// Invoke the callbacks registered for the anywhere site.
    fn trigger_render_anywhere_callbacks(&mut self, final_frame: bool);

    // Widgets, forwarded to the current context.
    fn begin(&mut self, title: &str) -> bool;
    fn end(&mut self);
    fn text(&mut self, text: &str);
    fn button(&mut self, label: &str) -> bool;
    fn plot_graph(&mut self, graph: &Graph, values: &[GraphValues]);

    fn set_display_size(&mut self, size: Vec2);
    fn display_size(&self) -> Option<Vec2>;
    fn window_state(&self, title: &str) -> Option<WindowState>;

    /// RGBA32 font atlas of the current context, for backends built outside
    /// the bridge: `(pixels, width, height)`.
    fn font_atlas_pixels(&mut self) -> Option<(Vec<u8>, u32, u32)>;

    /// Serialized window placement of the current context.
    fn save_settings(&self) -> Vec<u8>;
    fn load_settings(&mut self, blob: &[u8]);
}

/// The bridge: context registry plus the backend that turns snapshots into
/// GPU work. Constructed without a backend for headless use; rendering then
/// fails until one is attached.
#[derive(Default)]
pub struct UiBridge {
    registry: ContextRegistry,
    backend: Option<Box<dyn RenderBackend>>,
    window_callbacks: Vec<UiRenderCallback>,
    anywhere_callbacks: Vec<UiRenderCallback>,
    phase: FramePhase,
}

impl UiBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backend(backend: Box<dyn RenderBackend>) -> Self {
        Self {
            backend: Some(backend),
            ..Self::default()
        }
    }

    /// Attach (or replace) the backend. Live contexts pick up the new
    /// backend's payload and capabilities.
    pub fn attach_backend(&mut self, backend: Box<dyn RenderBackend>) {
        log::info!("attached {} backend", backend.name());
        let api = backend.api();
        let payload = backend.api_payload();
        for context in self.registry.iter_mut() {
            if context.api != api {
                log::warn!(
                    "context targets {:?} but attached backend is {:?}",
                    context.api,
                    api
                );
            }
            context.api_data = payload;
            context.ui.io.backend_flags.insert(BackendFlags::HAS_VTX_OFFSET);
        }
        self.backend = Some(backend);
    }

    pub fn backend(&self) -> Option<&dyn RenderBackend> {
        self.backend.as_deref()
    }

    /// Backend-specific payload contexts need at creation (the Vulkan render
    /// pass handle).
    fn api_payload(&self) -> u64 {
        self.backend.as_ref().map_or(0, |b| b.api_payload())
    }

    fn current_mut(&mut self) -> Result<&mut Context, String> {
        self.registry
            .current_mut()
            .ok_or_else(|| "no current context".to_string())
    }
}

impl UiApi for UiBridge {
    fn create_context(&mut self, desc: &ContextDesc) -> Result<ContextId, String> {
        if desc.width == 0 || desc.height == 0 {
            return Err(format!(
                "invalid context size {}x{}",
                desc.width, desc.height
            ));
        }
        if let Some(backend) = &self.backend {
            if backend.api() != desc.api {
                return Err(format!(
                    "context targets {:?} but backend is {:?}",
                    desc.api,
                    backend.api()
                ));
            }
        }
        let mut context = Context::new(desc, self.api_payload());
        if self.backend.is_some() {
            context.ui.io.backend_flags.insert(BackendFlags::HAS_VTX_OFFSET);
        }
        let id = self.registry.insert(context);
        self.registry.set_current(id);
        log::info!(
            "created context {:?} ({}x{})",
            id,
            desc.width,
            desc.height
        );
        Ok(id)
    }

    fn destroy_context(&mut self, id: ContextId) -> Result<(), String> {
        if self.registry.remove(id).is_none() {
            return Err(format!("destroy of unknown context {:?}", id));
        }
        log::info!("destroyed context {:?}", id);
        if self.registry.is_empty() {
            if let Some(backend) = &mut self.backend {
                backend.invalidate_device_objects();
            }
        }
        Ok(())
    }

    fn set_current_context(&mut self, id: ContextId) {
        self.registry.set_current(id);
    }

    fn current_context(&self) -> Option<ContextId> {
        self.registry.current_id()
    }

    fn api_data(&self) -> Option<u64> {
        self.registry.current().map(|c| c.api_data)
    }

    fn new_frame(&mut self, elapsed_time: f32) -> Result<(), String> {
        self.current_mut()?.new_frame(elapsed_time);
        self.phase = FramePhase::Recording;
        Ok(())
    }

    fn render(
        &mut self,
        recorder: CommandRecorder,
        back_buffer: BackBufferHandle,
        index: u32,
    ) -> Result<(), String> {
        if self.phase != FramePhase::Recording {
            return Err("render before new_frame".to_string());
        }
        let Some(backend) = self.backend.as_mut() else {
            return Err("render without a backend".to_string());
        };
        let Some(context) = self.registry.current_mut() else {
            return Err("no current context".to_string());
        };
        let draw_data = context.capture_draw_data();
        self.phase = FramePhase::Idle;
        backend
            .render(recorder, back_buffer, index, draw_data)
            .inspect_err(|e| log::warn!("frame skipped: {}", e))
    }

    fn draw_data(&self) -> Option<&DrawData> {
        self.registry.current().map(|c| &c.snapshot)
    }

    fn feed_mouse_event(&mut self, event: &MouseEvent) -> bool {
        match self.registry.current_mut() {
            Some(context) => context.feed_mouse_event(event),
            None => true,
        }
    }

    fn feed_keyboard_event(&mut self, event: &KeyboardEvent) -> bool {
        if let Some(context) = self.registry.current() {
            log::debug!(
                "keyboard feed is not supported, dropping {:?} (host key {})",
                event.key,
                context.ui.io.key_index(event.key)
            );
        }
        false
    }

    fn register_render_callback(&mut self, site: RenderCallbackSite, callback: UiRenderCallback) {
        match site {
            RenderCallbackSite::Window => self.window_callbacks.push(callback),
            RenderCallbackSite::Anywhere => self.anywhere_callbacks.push(callback),
        }
    }

    fn trigger_render_window_callbacks(&mut self, final_frame: bool) {
        // Callbacks re-enter through UiApi, so they cannot stay borrowed
        // from self while running.
        let mut callbacks = std::mem::take(&mut self.window_callbacks);
        for callback in &mut callbacks {
            callback(self, final_frame);
        }
        // Callbacks registered during the run land behind the existing ones.
        callbacks.append(&mut self.window_callbacks);
        self.window_callbacks = callbacks;
    }

    fn trigger_render_anywhere_callbacks(&mut self, final_frame: bool) {
        let mut callbacks = std::mem::take(&mut self.anywhere_callbacks);
        for callback in &mut callbacks {
            callback(self, final_frame);
        }
        callbacks.append(&mut self.anywhere_callbacks);
        self.anywhere_callbacks = callbacks;
    }

    fn begin(&mut self, title: &str) -> bool {
        match self.registry.current_mut() {
            Some(context) => context.ui.begin(title),
            None => {
                log::warn!("begin({:?}) with no current context", title);
                false
            }
        }
    }

    fn end(&mut self) {
        if let Some(context) = self.registry.current_mut() {
            context.ui.end();
        }
    }

    fn text(&mut self, text: &str) {
        if let Some(context) = self.registry.current_mut() {
            context.ui.text(text);
        }
    }

    fn button(&mut self, label: &str) -> bool {
        match self.registry.current_mut() {
            Some(context) => context.ui.button(label),
            None => false,
        }
    }

    fn plot_graph(&mut self, graph: &Graph, values: &[GraphValues]) {
        if let Some(context) = self.registry.current_mut() {
            let Context { ui, plot, .. } = context;
            plot.plot_graph(ui, graph, values);
        }
    }

    fn set_display_size(&mut self, size: Vec2) {
        if let Some(context) = self.registry.current_mut() {
            context.ui.io.display_size = size;
        }
    }

    fn display_size(&self) -> Option<Vec2> {
        self.registry.current().map(|c| c.ui.io.display_size)
    }

    fn window_state(&self, title: &str) -> Option<WindowState> {
        self.registry
            .current()
            .and_then(|c| c.ui.window_state(title))
            .cloned()
    }

    fn font_atlas_pixels(&mut self) -> Option<(Vec<u8>, u32, u32)> {
        let context = self.registry.current_mut()?;
        let (pixels, width, height) = context.ui.font_atlas_pixels();
        Some((pixels.to_vec(), width, height))
    }

    fn save_settings(&self) -> Vec<u8> {
        self.registry
            .current()
            .map(|c| c.ui.save_settings())
            .unwrap_or_default()
    }

    fn load_settings(&mut self, blob: &[u8]) {
        if let Some(context) = self.registry.current_mut() {
            context.ui.load_settings(blob);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RenderApi;
    use crate::context::WindowHandle;

    fn desc() -> ContextDesc {
        ContextDesc {
            api: RenderApi::Vulkan,
            back_buffer_format: 0,
            width: 640,
            height: 480,
            window: WindowHandle(0),
        }
    }

    struct StubBackend;

    impl RenderBackend for StubBackend {
        fn api(&self) -> RenderApi {
            RenderApi::Vulkan
        }

        fn name(&self) -> &str {
            "Stub"
        }

        fn api_payload(&self) -> u64 {
            0xBEEF
        }

        fn render(
            &mut self,
            _recorder: CommandRecorder,
            _back_buffer: BackBufferHandle,
            _index: u32,
            _draw_data: &DrawData,
        ) -> Result<(), String> {
            Ok(())
        }

        fn invalidate_device_objects(&mut self) {}
    }

    #[test]
    fn test_create_makes_current() {
        let mut bridge = UiBridge::new();
        let id = bridge.create_context(&desc()).unwrap();
        assert_eq!(bridge.current_context(), Some(id));
    }

    #[test]
    fn test_zero_size_rejected() {
        let mut bridge = UiBridge::new();
        let bad = ContextDesc {
            width: 0,
            ..desc()
        };
        assert!(bridge.create_context(&bad).is_err());
    }

    #[test]
    fn test_destroy_is_symmetric() {
        let mut bridge = UiBridge::new();
        let mut last = None;
        for _ in 0..16 {
            let id = bridge.create_context(&desc()).unwrap();
            bridge.destroy_context(id).unwrap();
            last = Some(id);
        }
        assert!(bridge.current_context().is_none());
        // Double destroy is an error, not a crash.
        assert!(bridge.destroy_context(last.unwrap()).is_err());
    }

    #[test]
    fn test_attach_refreshes_live_contexts() {
        let mut bridge = UiBridge::new();
        bridge.create_context(&desc()).unwrap();
        assert_eq!(bridge.api_data(), Some(0));

        bridge.attach_backend(Box::new(StubBackend));
        assert_eq!(bridge.api_data(), Some(0xBEEF));
        let io = &bridge.registry.current().unwrap().ui.io;
        assert!(io.backend_flags.contains(BackendFlags::HAS_VTX_OFFSET));
    }

    #[test]
    fn test_backend_api_mismatch_rejected() {
        let mut bridge = UiBridge::with_backend(Box::new(StubBackend));
        let bad = ContextDesc {
            api: RenderApi::D3D12,
            ..desc()
        };
        assert!(bridge.create_context(&bad).is_err());
        assert!(bridge.create_context(&desc()).is_ok());
    }

    #[test]
    fn test_keyboard_feed_unsupported() {
        use crate::input::{KeyEventKind, KeyModifiers, KeyValue};
        let mut bridge = UiBridge::new();
        bridge.create_context(&desc()).unwrap();
        let event = KeyboardEvent {
            key: KeyValue::Enter,
            kind: KeyEventKind::Down,
            modifiers: KeyModifiers::empty(),
        };
        assert!(!bridge.feed_keyboard_event(&event));
    }

    #[test]
    fn test_render_without_backend_fails() {
        let mut bridge = UiBridge::new();
        bridge.create_context(&desc()).unwrap();
        bridge.new_frame(0.016).unwrap();
        let err = bridge.render(CommandRecorder(1), BackBufferHandle(1), 0);
        assert!(err.is_err());
    }

    #[test]
    fn test_callbacks_reentrant() {
        let mut bridge = UiBridge::new();
        bridge.create_context(&desc()).unwrap();
        bridge.new_frame(0.016).unwrap();
        bridge.register_render_callback(
            RenderCallbackSite::Window,
            Box::new(|api, final_frame| {
                if !final_frame {
                    api.begin("FromCallback");
                    api.end();
                }
            }),
        );
        bridge.trigger_render_window_callbacks(false);
        bridge.trigger_render_window_callbacks(true);
        // The callback survives both invocations.
        let ctx_windows = bridge.window_state("FromCallback");
        assert!(ctx_windows.is_some());
    }

    #[test]
    fn test_callback_sites_independent() {
        use std::sync::atomic::{AtomicU32, Ordering};
        use std::sync::Arc;

        let mut bridge = UiBridge::new();
        bridge.create_context(&desc()).unwrap();
        let hits = Arc::new(AtomicU32::new(0));
        let counter = hits.clone();
        bridge.register_render_callback(
            RenderCallbackSite::Anywhere,
            Box::new(move |_, _| {
                counter.fetch_add(1, Ordering::Relaxed);
            }),
        );
        bridge.trigger_render_window_callbacks(false);
        assert_eq!(hits.load(Ordering::Relaxed), 0);
        bridge.trigger_render_anywhere_callbacks(false);
        assert_eq!(hits.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_font_atlas_is_opaque_white() {
        let mut bridge = UiBridge::new();
        assert!(bridge.font_atlas_pixels().is_none());
        bridge.create_context(&desc()).unwrap();
        let (pixels, width, height) = bridge.font_atlas_pixels().unwrap();
        assert_eq!(pixels.len(), (width * height * 4) as usize);
        assert!(pixels.iter().all(|&b| b == 0xFF));
    }
}
