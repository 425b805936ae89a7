//! Context lifecycle - one UI surface's state plus the registry that tracks
//! which context is current
//!
//! The UI core and the plotting state live inside the same [`Context`], and
//! the registry only ever swaps whole contexts, so the two can never point at
//! different surfaces. Destruction is symmetric with creation: everything a
//! context owns is dropped with it, and the registry forgets it atomically.

use crate::backend::RenderApi;
use crate::core::{to_float2, to_vec2, Float2, Vec2};
use crate::draw::{DrawCommand, DrawData, DrawList};
use crate::input::{ButtonState, MouseButton, MouseEvent, MouseEventKind, MOUSE_BUTTON_COUNT};
use crate::ui::plot::PlotState;
use crate::ui::UiState;

/// Raw platform window handle (HWND or equivalent), opaque to this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowHandle(pub isize);

/// Everything needed to create a context.
#[derive(Debug, Clone, Copy)]
pub struct ContextDesc {
    /// Which graphics API the host drives this context with.
    pub api: RenderApi,
    /// Back-buffer pixel format as the target API's numeric format id
    /// (DXGI_FORMAT / VkFormat).
    pub back_buffer_format: u32,
    pub width: u32,
    pub height: u32,
    pub window: WindowHandle,
}

/// One UI surface: the wrapped UI core, the plotting state, the most recent
/// draw-data snapshot and the per-frame mouse bookkeeping.
pub struct Context {
    pub ui: UiState,
    pub plot: PlotState,
    /// The API this context was created for.
    pub api: RenderApi,
    /// Backend-specific payload; the Vulkan render pass handle, 0 for D3D12.
    /// Refreshed when a backend is attached after creation.
    pub api_data: u64,
    pub snapshot: DrawData,
    pub mouse: [ButtonState; MOUSE_BUTTON_COUNT],
}

impl Context {
    pub fn new(desc: &ContextDesc, api_data: u64) -> Self {
        let mut ui = UiState::new();
        ui.io.display_size = Vec2::new(desc.width as f32, desc.height as f32);
        // Host key ids happen to be the slot indices; hosts with their own
        // scan codes overwrite this table after creation.
        for (slot, entry) in ui.io.key_map.iter_mut().enumerate() {
            *entry = slot as u32;
        }
        Self {
            ui,
            plot: PlotState::new(),
            api: desc.api,
            api_data,
            snapshot: DrawData::default(),
            mouse: [ButtonState::default(); MOUSE_BUTTON_COUNT],
        }
    }

    /// Begin a frame: hand the accumulated button state to the UI core, then
    /// consume the edge flags.
    pub fn new_frame(&mut self, elapsed_time: f32) {
        for (i, button) in self.mouse.iter_mut().enumerate() {
            self.ui.io.mouse_down[i] = button.down;
            self.ui.io.mouse_clicked[i] = button.pressed;
            button.clear_edges();
        }
        self.ui.new_frame(elapsed_time);
    }

    /// Capture the UI core's finalized frame into this context's snapshot.
    /// Command metadata is copied; vertex/index buffers are shared with the
    /// frame that produced them.
    pub fn capture_draw_data(&mut self) -> &DrawData {
        let io_display = self.ui.io.display_size;
        let io_scale = self.ui.io.framebuffer_scale;
        let frame = self.ui.finalize();

        let mut lists = Vec::with_capacity(frame.lists.len());
        let mut vertex_count = 0u32;
        let mut index_count = 0u32;
        for (commands, vertices, indices) in &frame.lists {
            vertex_count += vertices.len() as u32;
            index_count += indices.len() as u32;
            lists.push(DrawList {
                commands: commands
                    .iter()
                    .map(|c| DrawCommand {
                        element_count: c.element_count,
                        clip_rect: c.clip_rect,
                        texture: c.texture,
                        callback: c.callback.clone(),
                    })
                    .collect(),
                vertices: vertices.clone(),
                indices: indices.clone(),
            });
        }

        self.snapshot = DrawData {
            lists,
            vertex_count,
            index_count,
            display_pos: Float2::default(),
            display_size: to_float2(io_display),
            framebuffer_scale: to_float2(io_scale),
        };
        &self.snapshot
    }

    /// Route one mouse event into the UI core's IO state.
    ///
    /// Returns true when the host should still handle the event itself,
    /// i.e. the UI does not want exclusive capture.
    pub fn feed_mouse_event(&mut self, event: &MouseEvent) -> bool {
        match event.kind {
            MouseEventKind::ButtonDown(button) => {
                let state = &mut self.mouse[button as usize];
                state.pressed = true;
                state.down = true;
            }
            MouseEventKind::ButtonUp(button) => {
                let state = &mut self.mouse[button as usize];
                state.released = true;
                state.down = false;
            }
            MouseEventKind::Move => {
                // The cursor stays where the button first went down this
                // frame, so a press plus same-batch jitter cannot start a
                // drag from the wrong origin.
                if !self.mouse.iter().any(|b| b.pressed) {
                    self.ui.io.mouse_pos = to_vec2(event.coords);
                }
            }
            MouseEventKind::Scroll => {
                self.ui.io.mouse_wheel_h += event.coords.x;
                self.ui.io.mouse_wheel += event.coords.y;
            }
        }
        !self.ui.io.want_capture_mouse
    }

    pub fn button_state(&self, button: MouseButton) -> ButtonState {
        self.mouse[button as usize]
    }
}

/// Identifier of a context slot in a [`ContextRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(usize);

/// Owns every live context and the notion of "current". Instance this per
/// UI thread instead of reaching for a process global.
#[derive(Default)]
pub struct ContextRegistry {
    slots: Vec<Option<Box<Context>>>,
    current: Option<ContextId>,
}

impl ContextRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, context: Context) -> ContextId {
        let boxed = Box::new(context);
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if slot.is_none() {
                *slot = Some(boxed);
                return ContextId(i);
            }
        }
        self.slots.push(Some(boxed));
        ContextId(self.slots.len() - 1)
    }

    /// Drop the context. Clears the current pointer when it referred to the
    /// removed context.
    pub fn remove(&mut self, id: ContextId) -> Option<Box<Context>> {
        if self.current == Some(id) {
            self.current = None;
        }
        self.slots.get_mut(id.0)?.take()
    }

    /// Make `id` current. UI and plot state swap together by construction.
    pub fn set_current(&mut self, id: ContextId) {
        debug_assert!(self.contains(id), "set_current on a destroyed context");
        if self.contains(id) {
            self.current = Some(id);
        }
    }

    pub fn contains(&self, id: ContextId) -> bool {
        self.slots.get(id.0).is_some_and(|s| s.is_some())
    }

    pub fn current_id(&self) -> Option<ContextId> {
        self.current
    }

    pub fn get_mut(&mut self, id: ContextId) -> Option<&mut Context> {
        self.slots.get_mut(id.0)?.as_deref_mut()
    }

    pub fn current(&self) -> Option<&Context> {
        self.slots.get(self.current?.0)?.as_deref()
    }

    pub fn current_mut(&mut self) -> Option<&mut Context> {
        let id = self.current?;
        self.slots.get_mut(id.0)?.as_deref_mut()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Context> {
        self.slots.iter_mut().filter_map(|s| s.as_deref_mut())
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::MouseButton;

    fn desc() -> ContextDesc {
        ContextDesc {
            api: RenderApi::Vulkan,
            back_buffer_format: 0,
            width: 800,
            height: 600,
            window: WindowHandle(0),
        }
    }

    #[test]
    fn test_key_map_defaults_to_identity() {
        use crate::input::KeyValue;
        let ctx = Context::new(&desc(), 0);
        for key in KeyValue::ALL {
            assert_eq!(ctx.ui.io.key_index(key), key as u32);
        }
    }

    #[test]
    fn test_press_release_same_frame() {
        let mut ctx = Context::new(&desc(), 0);
        ctx.feed_mouse_event(&MouseEvent::button_down(MouseButton::Left));
        ctx.feed_mouse_event(&MouseEvent::button_up(MouseButton::Left));
        let state = ctx.button_state(MouseButton::Left);
        assert!(state.pressed);
        assert!(state.released);
        assert!(!state.down);
    }

    #[test]
    fn test_press_held_across_frame() {
        let mut ctx = Context::new(&desc(), 0);
        ctx.feed_mouse_event(&MouseEvent::button_down(MouseButton::Left));
        let state = ctx.button_state(MouseButton::Left);
        assert!(state.pressed);
        assert!(state.down);
        assert!(!state.released);

        ctx.new_frame(0.016);
        let state = ctx.button_state(MouseButton::Left);
        assert!(!state.pressed, "edge consumed by new_frame");
        assert!(state.down, "level state persists");
        assert!(ctx.ui.io.mouse_down[0]);
        assert!(ctx.ui.io.mouse_clicked[0]);
    }

    #[test]
    fn test_move_suppressed_while_pressed() {
        let mut ctx = Context::new(&desc(), 0);
        ctx.feed_mouse_event(&MouseEvent::moved(100.0, 100.0));
        assert_eq!(ctx.ui.io.mouse_pos, Vec2::new(100.0, 100.0));

        ctx.feed_mouse_event(&MouseEvent::button_down(MouseButton::Right));
        ctx.feed_mouse_event(&MouseEvent::moved(104.0, 98.0));
        assert_eq!(ctx.ui.io.mouse_pos, Vec2::new(100.0, 100.0));

        ctx.new_frame(0.016);
        ctx.feed_mouse_event(&MouseEvent::moved(104.0, 98.0));
        assert_eq!(ctx.ui.io.mouse_pos, Vec2::new(104.0, 98.0));
    }

    #[test]
    fn test_scroll_accumulates() {
        let mut ctx = Context::new(&desc(), 0);
        ctx.new_frame(0.016);
        ctx.feed_mouse_event(&MouseEvent::scroll(1.0, 2.0));
        ctx.feed_mouse_event(&MouseEvent::scroll(3.0, -1.0));
        assert_eq!(ctx.ui.io.mouse_wheel_h, 4.0);
        assert_eq!(ctx.ui.io.mouse_wheel, 1.0);

        ctx.new_frame(0.016);
        assert_eq!(ctx.ui.io.mouse_wheel_h, 0.0);
        assert_eq!(ctx.ui.io.mouse_wheel, 0.0);
    }

    #[test]
    fn test_snapshot_isolated_from_live_frame() {
        let mut ctx = Context::new(&desc(), 0);
        ctx.new_frame(0.016);
        ctx.ui.begin("Test");
        ctx.ui.end();
        let captured = ctx.capture_draw_data().clone();
        assert_eq!(captured.index_count, 12);

        // Wreck the live frame output; the snapshot must not notice.
        ctx.ui.frame_mut().lists.clear();
        assert_eq!(ctx.snapshot.index_count, 12);
        assert_eq!(ctx.snapshot.lists.len(), 1);
        assert_eq!(ctx.snapshot.lists[0].commands[0].element_count, 12);

        // Starting the next frame does not invalidate the held copy either.
        ctx.new_frame(0.016);
        assert_eq!(captured.lists[0].indices.len(), 12);
    }

    #[test]
    fn test_registry_current_coupling() {
        let mut registry = ContextRegistry::new();
        let a = registry.insert(Context::new(&desc(), 0));
        let b = registry.insert(Context::new(&desc(), 0));

        registry.set_current(b);
        {
            let ctx = registry.current_mut().unwrap();
            ctx.new_frame(0.016);
            ctx.ui.begin("win");
            let graph = crate::ui::plot::Graph {
                min_x: 0.0,
                max_x: 1.0,
                min_y: 0.0,
                max_y: 1.0,
                x_axis: vec![0.0, 1.0],
                ..Default::default()
            };
            let (ui, plot) = (&mut ctx.ui, &mut ctx.plot);
            plot.plot_graph(ui, &graph, &[]);
            ctx.ui.end();
        }

        assert_eq!(registry.get_mut(b).unwrap().plot.plots_drawn(), 1);
        assert_eq!(registry.get_mut(b).unwrap().ui.frame_count(), 1);
        assert_eq!(registry.get_mut(a).unwrap().plot.plots_drawn(), 0);
        assert_eq!(registry.get_mut(a).unwrap().ui.frame_count(), 0);
    }

    #[test]
    fn test_registry_remove_clears_current() {
        let mut registry = ContextRegistry::new();
        let a = registry.insert(Context::new(&desc(), 0));
        registry.set_current(a);
        assert!(registry.current().is_some());
        registry.remove(a);
        assert!(registry.current_id().is_none());
        assert!(registry.is_empty());
    }
}
