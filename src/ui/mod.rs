//! UI core - minimal immediate-mode state the bridge wraps
//!
//! This is the collaborator the rest of the crate treats as "the GUI
//! library": per-frame IO state, retained window placement, and draw-list
//! production. Widgets are deliberately few; the bridge forwards to them
//! without adding behavior of its own.

pub mod plot;

use std::collections::HashMap;
use std::sync::Arc;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::core::{ColorF, Float4, Rect, Vec2};
use crate::draw::{DrawCallback, DrawVertex, TextureId};
use crate::input::{KeyValue, MOUSE_BUTTON_COUNT};

const TITLE_BAR_HEIGHT: f32 = 20.0;
const CHAR_WIDTH: f32 = 7.0;
const LINE_HEIGHT: f32 = 13.0;
const FONT_ATLAS_DIM: u32 = 4;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ConfigFlags: u32 {
        /// Only the title bar counts as hovering the window for mouse
        /// capture; the body stays click-through.
        const CAPTURE_FROM_TITLE_BAR_ONLY = 1 << 0;
    }
}

bitflags! {
    /// What the renderer bound to this core can honor. Set by the bridge
    /// when a backend is attached.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct BackendFlags: u32 {
        /// Draws are issued with a base-vertex offset per list, so lists
        /// larger than 64k vertices render correctly.
        const HAS_VTX_OFFSET = 1 << 0;
    }
}

/// Per-frame IO block, the core's half of the input contract.
#[derive(Debug, Clone)]
pub struct Io {
    pub display_size: Vec2,
    pub framebuffer_scale: Vec2,
    pub delta_time: f32,
    pub mouse_pos: Vec2,
    pub mouse_down: [bool; MOUSE_BUTTON_COUNT],
    pub mouse_clicked: [bool; MOUSE_BUTTON_COUNT],
    pub mouse_wheel: f32,
    pub mouse_wheel_h: f32,
    pub want_capture_mouse: bool,
    pub config_flags: ConfigFlags,
    pub backend_flags: BackendFlags,
    /// Host key id for each of the core's key slots, in [`KeyValue::ALL`]
    /// order. Filled in at context creation.
    pub key_map: [u32; KeyValue::COUNT],
}

impl Io {
    /// Host key id bound to `key`'s slot.
    pub fn key_index(&self, key: KeyValue) -> u32 {
        self.key_map[key as usize]
    }
}

impl Default for Io {
    fn default() -> Self {
        Self {
            display_size: Vec2::ZERO,
            framebuffer_scale: Vec2::new(1.0, 1.0),
            delta_time: 0.0,
            mouse_pos: Vec2::ZERO,
            mouse_down: [false; MOUSE_BUTTON_COUNT],
            mouse_clicked: [false; MOUSE_BUTTON_COUNT],
            mouse_wheel: 0.0,
            mouse_wheel_h: 0.0,
            want_capture_mouse: false,
            config_flags: ConfigFlags::empty(),
            backend_flags: BackendFlags::empty(),
            key_map: [0; KeyValue::COUNT],
        }
    }
}

/// Retained per-window placement, the only state the settings blob persists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowState {
    pub pos: Vec2,
    pub size: Vec2,
    pub collapsed: bool,
}

/// A draw command as the core records it; the geometry bridge copies these
/// into the snapshot rather than referencing them.
#[derive(Clone)]
pub struct UiDrawCmd {
    pub element_count: u32,
    pub clip_rect: Float4,
    pub texture: TextureId,
    pub callback: Option<Arc<DrawCallback>>,
}

/// One window's geometry for the frame under construction.
#[derive(Default)]
pub struct UiDrawList {
    pub commands: Vec<UiDrawCmd>,
    pub vertices: Vec<DrawVertex>,
    pub indices: Vec<u32>,
    batch_start: u32,
    clip_rect: Float4,
}

impl UiDrawList {
    fn add_quad(&mut self, rect: Rect, color: ColorF) {
        let base = self.vertices.len() as u32;
        let uv = white_uv();
        let col = color.packed();
        let (min, max) = (rect.min, rect.max);
        self.vertices.push(DrawVertex { position: min, tex_coord: uv, color: col });
        self.vertices.push(DrawVertex { position: Vec2::new(max.x, min.y), tex_coord: uv, color: col });
        self.vertices.push(DrawVertex { position: max, tex_coord: uv, color: col });
        self.vertices.push(DrawVertex { position: Vec2::new(min.x, max.y), tex_coord: uv, color: col });
        self.indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    /// Close the current geometry batch into one command, if non-empty.
    fn flush_batch(&mut self) {
        let pending = self.indices.len() as u32 - self.batch_start;
        if pending > 0 {
            self.commands.push(UiDrawCmd {
                element_count: pending,
                clip_rect: self.clip_rect,
                texture: TextureId(0),
                callback: None,
            });
            self.batch_start = self.indices.len() as u32;
        }
    }
}

/// One finalized frame: the buffers backends will consume, refcounted so a
/// snapshot can outlive the frame that produced it.
#[derive(Default)]
pub struct UiFrame {
    pub lists: Vec<(Vec<UiDrawCmd>, Arc<[DrawVertex]>, Arc<[u32]>)>,
}

fn white_uv() -> Vec2 {
    // Center of the all-white atlas.
    Vec2::new(0.5, 0.5)
}

/// The immediate-mode core: IO, retained window placement, frame geometry.
pub struct UiState {
    pub io: Io,
    windows: HashMap<String, WindowState>,
    /// Open windows, innermost last, each with the index of its draw list.
    window_stack: Vec<(String, usize)>,
    lists: Vec<UiDrawList>,
    frame: UiFrame,
    finalized: bool,
    frame_count: u64,
    next_window_cascade: f32,
    font_pixels: Option<Vec<u8>>,
}

impl UiState {
    pub fn new() -> Self {
        Self {
            io: Io::default(),
            windows: HashMap::new(),
            window_stack: Vec::new(),
            lists: Vec::new(),
            frame: UiFrame::default(),
            finalized: false,
            frame_count: 0,
            next_window_cascade: 0.0,
            font_pixels: None,
        }
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Start a new frame. Clears last frame's geometry and capture state and
    /// zeroes the wheel accumulators; hosts that want the accumulated wheel
    /// deltas read them off [`Io`] before calling this.
    pub fn new_frame(&mut self, delta_time: f32) {
        self.io.delta_time = delta_time;
        self.io.mouse_wheel = 0.0;
        self.io.mouse_wheel_h = 0.0;
        self.io.want_capture_mouse = false;
        self.window_stack.clear();
        self.lists.clear();
        self.frame = UiFrame::default();
        self.finalized = false;
        self.frame_count += 1;
    }

    /// Open a window, emitting its chrome (background + title bar quads).
    /// Returns false when the window is collapsed and its contents should be
    /// skipped; `end` must be called either way.
    pub fn begin(&mut self, title: &str) -> bool {
        let cascade = self.next_window_cascade;
        let state = self.windows.entry(title.to_string()).or_insert_with(|| {
            WindowState {
                pos: Vec2::new(60.0 + cascade, 60.0 + cascade),
                size: Vec2::new(320.0, 240.0),
                collapsed: false,
            }
        });
        self.next_window_cascade += 24.0;

        let rect = Rect::from_pos_size(state.pos, state.size);
        let title_rect = Rect::from_pos_size(state.pos, Vec2::new(state.size.x, TITLE_BAR_HEIGHT));
        let collapsed = state.collapsed;

        let capture_rect = if self
            .io
            .config_flags
            .contains(ConfigFlags::CAPTURE_FROM_TITLE_BAR_ONLY)
        {
            title_rect
        } else {
            rect
        };
        if capture_rect.contains(self.io.mouse_pos) {
            self.io.want_capture_mouse = true;
        }

        let mut list = UiDrawList {
            clip_rect: Float4::new(rect.min.x, rect.min.y, rect.max.x, rect.max.y),
            ..Default::default()
        };
        if !collapsed {
            list.add_quad(rect, ColorF::new(0.12, 0.13, 0.14, 0.95));
        }
        list.add_quad(title_rect, ColorF::new(0.27, 0.27, 0.27, 1.0));
        self.lists.push(list);
        self.window_stack
            .push((title.to_string(), self.lists.len() - 1));

        !collapsed
    }

    /// Close the innermost open window.
    pub fn end(&mut self) {
        let Some((_, index)) = self.window_stack.pop() else {
            log::warn!("end() without matching begin()");
            return;
        };
        if let Some(list) = self.lists.get_mut(index) {
            list.flush_batch();
        }
    }

    fn current_list(&mut self) -> Option<&mut UiDrawList> {
        let index = match self.window_stack.last() {
            Some(&(_, index)) => index,
            None => {
                log::warn!("widget call outside begin()/end()");
                return None;
            }
        };
        self.lists.get_mut(index)
    }

    pub(crate) fn has_open_window(&self) -> bool {
        !self.window_stack.is_empty()
    }

    pub(crate) fn cursor(&self) -> Vec2 {
        let (title, index) = self.window_stack.last().expect("cursor() with no window");
        let state = &self.windows[title.as_str()];
        // One line per widget already emitted past the chrome quads.
        let emitted = self.lists.get(*index).map_or(0, |l| l.vertices.len() / 4);
        let line = emitted.saturating_sub(2) as f32;
        Vec2::new(state.pos.x + 8.0, state.pos.y + TITLE_BAR_HEIGHT + 4.0 + line * (LINE_HEIGHT + 4.0))
    }

    /// Emit one quad per character cell.
    pub fn text(&mut self, text: &str) {
        let pos = if self.window_stack.is_empty() { Vec2::ZERO } else { self.cursor() };
        let Some(list) = self.current_list() else { return };
        for (i, _) in text.chars().enumerate() {
            let cell = Rect::from_pos_size(
                Vec2::new(pos.x + i as f32 * CHAR_WIDTH, pos.y),
                Vec2::new(CHAR_WIDTH, LINE_HEIGHT),
            );
            list.add_quad(cell, ColorF::new(0.9, 0.9, 0.9, 1.0));
        }
    }

    /// Emit a button quad; true when clicked this frame.
    pub fn button(&mut self, label: &str) -> bool {
        let pos = if self.window_stack.is_empty() { Vec2::ZERO } else { self.cursor() };
        let size = Vec2::new(label.chars().count() as f32 * CHAR_WIDTH + 16.0, LINE_HEIGHT + 8.0);
        let rect = Rect::from_pos_size(pos, size);
        let hovered = rect.contains(self.io.mouse_pos);
        let color = if hovered {
            ColorF::new(0.62, 0.62, 0.62, 1.0)
        } else {
            ColorF::new(0.16, 0.16, 0.16, 1.0)
        };
        let Some(list) = self.current_list() else { return false };
        list.add_quad(rect, color);
        hovered && self.io.mouse_clicked[0]
    }

    /// Queue a draw callback in the current window's list. The surrounding
    /// geometry batch is flushed first so ordering is preserved.
    pub fn draw_callback(&mut self, callback: Arc<DrawCallback>) {
        let Some(list) = self.current_list() else { return };
        list.flush_batch();
        let clip = list.clip_rect;
        list.commands.push(UiDrawCmd {
            element_count: 0,
            clip_rect: clip,
            texture: TextureId(0),
            callback: Some(callback),
        });
    }

    pub(crate) fn add_quad(&mut self, rect: Rect, color: ColorF) {
        if let Some(list) = self.current_list() {
            list.add_quad(rect, color);
        }
    }

    /// Finalize the frame's draw lists. Idempotent within one frame.
    pub fn finalize(&mut self) -> &UiFrame {
        if !self.finalized {
            while let Some((title, index)) = self.window_stack.pop() {
                log::warn!("window {:?} not closed before render", title);
                if let Some(list) = self.lists.get_mut(index) {
                    list.flush_batch();
                }
            }
            let lists = std::mem::take(&mut self.lists);
            self.frame.lists = lists
                .into_iter()
                .map(|mut l| {
                    l.flush_batch();
                    (l.commands, Arc::from(l.vertices), Arc::from(l.indices))
                })
                .collect();
            self.finalized = true;
            self.next_window_cascade = 0.0;
        }
        &self.frame
    }

    /// Mutable access to the live frame output, for isolation tests and
    /// advanced hosts. Most callers want the snapshot instead.
    pub fn frame_mut(&mut self) -> &mut UiFrame {
        &mut self.frame
    }

    /// RGBA32 font atlas pixels, built on first use.
    pub fn font_atlas_pixels(&mut self) -> (&[u8], u32, u32) {
        let pixels = self
            .font_pixels
            .get_or_insert_with(|| vec![0xFF; (FONT_ATLAS_DIM * FONT_ATLAS_DIM * 4) as usize]);
        (pixels.as_slice(), FONT_ATLAS_DIM, FONT_ATLAS_DIM)
    }

    /// Serialize retained window placement into an opaque blob.
    pub fn save_settings(&self) -> Vec<u8> {
        bincode::serialize(&self.windows).unwrap_or_default()
    }

    /// Restore retained window placement from a blob produced by
    /// [`save_settings`](Self::save_settings). Unparseable blobs are ignored.
    pub fn load_settings(&mut self, blob: &[u8]) {
        match bincode::deserialize(blob) {
            Ok(windows) => self.windows = windows,
            Err(e) => log::warn!("discarding unreadable settings blob: {}", e),
        }
    }

    pub fn window_state(&self, title: &str) -> Option<&WindowState> {
        self.windows.get(title)
    }
}

impl Default for UiState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_window_chrome() {
        let mut ui = UiState::new();
        ui.io.display_size = Vec2::new(800.0, 600.0);
        ui.new_frame(0.016);
        assert!(ui.begin("Test"));
        ui.end();
        let frame = ui.finalize();

        assert_eq!(frame.lists.len(), 1);
        let (commands, vertices, indices) = &frame.lists[0];
        // Background + title bar.
        assert_eq!(vertices.len(), 8);
        assert_eq!(indices.len(), 12);
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].element_count, 12);
    }

    #[test]
    fn test_finalize_idempotent() {
        let mut ui = UiState::new();
        ui.new_frame(0.016);
        ui.begin("A");
        ui.end();
        let count = ui.finalize().lists.len();
        assert_eq!(ui.finalize().lists.len(), count);
    }

    #[test]
    fn test_window_placement_retained() {
        let mut ui = UiState::new();
        ui.new_frame(0.016);
        ui.begin("A");
        ui.end();
        ui.finalize();
        let first = ui.window_state("A").unwrap().pos;

        ui.new_frame(0.016);
        ui.begin("A");
        ui.end();
        ui.finalize();
        assert_eq!(ui.window_state("A").unwrap().pos, first);
    }

    #[test]
    fn test_settings_roundtrip() {
        let mut ui = UiState::new();
        ui.new_frame(0.016);
        ui.begin("Stats");
        ui.end();
        ui.finalize();
        let blob = ui.save_settings();

        let mut other = UiState::new();
        other.load_settings(&blob);
        assert_eq!(
            other.window_state("Stats").unwrap().pos,
            ui.window_state("Stats").unwrap().pos
        );
    }

    #[test]
    fn test_capture_follows_hover() {
        let mut ui = UiState::new();
        ui.new_frame(0.016);
        ui.begin("A");
        ui.end();
        ui.finalize();
        let inside = ui.window_state("A").unwrap().pos;

        ui.io.mouse_pos = Vec2::new(inside.x + 1.0, inside.y + 1.0);
        ui.new_frame(0.016);
        ui.begin("A");
        ui.end();
        assert!(ui.io.want_capture_mouse);

        ui.io.mouse_pos = Vec2::new(-100.0, -100.0);
        ui.new_frame(0.016);
        ui.begin("A");
        ui.end();
        assert!(!ui.io.want_capture_mouse);
    }

    #[test]
    fn test_nested_windows_route_widgets() {
        let mut ui = UiState::new();
        ui.new_frame(0.016);
        ui.begin("Outer");
        ui.begin("Inner");
        ui.end();
        // After the inner window closes, widgets belong to the outer one.
        ui.text("x");
        ui.end();
        let frame = ui.finalize();

        assert_eq!(frame.lists.len(), 2);
        let (_, outer_vertices, _) = &frame.lists[0];
        let (_, inner_vertices, _) = &frame.lists[1];
        // Outer: chrome plus one character cell; inner: chrome only.
        assert_eq!(outer_vertices.len(), 12);
        assert_eq!(inner_vertices.len(), 8);
    }

    #[test]
    fn test_title_bar_only_capture() {
        let mut ui = UiState::new();
        ui.io.config_flags = ConfigFlags::CAPTURE_FROM_TITLE_BAR_ONLY;
        ui.new_frame(0.016);
        ui.begin("A");
        ui.end();
        ui.finalize();
        let pos = ui.window_state("A").unwrap().pos;

        // Hovering the body no longer captures.
        ui.io.mouse_pos = Vec2::new(pos.x + 5.0, pos.y + TITLE_BAR_HEIGHT + 5.0);
        ui.new_frame(0.016);
        ui.begin("A");
        ui.end();
        assert!(!ui.io.want_capture_mouse);

        ui.io.mouse_pos = Vec2::new(pos.x + 5.0, pos.y + 5.0);
        ui.new_frame(0.016);
        ui.begin("A");
        ui.end();
        assert!(ui.io.want_capture_mouse);
    }

    #[test]
    fn test_draw_callback_splits_batches() {
        let mut ui = UiState::new();
        ui.new_frame(0.016);
        ui.begin("A");
        ui.draw_callback(Arc::new(|_, _| {}));
        ui.text("x");
        ui.end();
        let frame = ui.finalize();
        let (commands, _, _) = &frame.lists[0];
        // chrome batch, callback, text batch
        assert_eq!(commands.len(), 3);
        assert!(commands[1].callback.is_some());
        assert_eq!(commands[1].element_count, 0);
    }
}
