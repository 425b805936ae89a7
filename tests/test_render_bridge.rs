//! End-to-end bridge tests against a recording backend.
//!
//! The mock backend drives the same per-back-buffer target cache the GPU
//! backends use, so target creation and release behavior is observable
//! without a device.

use std::sync::{Arc, Mutex};

use lucarne::backend::{BackBufferHandle, CommandRecorder, RenderApi, RenderBackend, TargetCache};
use lucarne::context::{ContextDesc, WindowHandle};
use lucarne::draw::DrawData;
use lucarne::{UiApi, UiBridge};

#[derive(Default)]
struct RenderLog {
    frames: Vec<(u64, u32, u32)>, // (back buffer, index, element total)
    creations: u32,
    releases: u32,
    invalidations: u32,
}

struct MockTarget;

struct MockBackend {
    log: Arc<Mutex<RenderLog>>,
    targets: TargetCache<MockTarget>,
}

impl MockBackend {
    fn new() -> (Self, Arc<Mutex<RenderLog>>) {
        let log = Arc::new(Mutex::new(RenderLog::default()));
        (
            Self {
                log: log.clone(),
                targets: TargetCache::new(),
            },
            log,
        )
    }
}

impl RenderBackend for MockBackend {
    fn api(&self) -> RenderApi {
        RenderApi::Vulkan
    }

    fn name(&self) -> &str {
        "Mock"
    }

    fn api_payload(&self) -> u64 {
        0xCAFE
    }

    fn render(
        &mut self,
        _recorder: CommandRecorder,
        back_buffer: BackBufferHandle,
        index: u32,
        draw_data: &DrawData,
    ) -> Result<(), String> {
        let log = &self.log;
        self.targets.resolve(index, back_buffer, |_, displaced| {
            let mut log = log.lock().unwrap();
            if displaced.is_some() {
                log.releases += 1;
            }
            log.creations += 1;
            Ok::<_, String>(MockTarget)
        })?;

        let elements: u32 = draw_data
            .lists
            .iter()
            .flat_map(|l| l.commands.iter())
            .map(|c| c.element_count)
            .sum();
        self.log
            .lock()
            .unwrap()
            .frames
            .push((back_buffer.0, index, elements));
        Ok(())
    }

    fn invalidate_device_objects(&mut self) {
        let mut log = self.log.lock().unwrap();
        log.invalidations += 1;
        log.releases += self.targets.drain().count() as u32;
    }
}

fn desc() -> ContextDesc {
    ContextDesc {
        api: RenderApi::Vulkan,
        back_buffer_format: 0,
        width: 800,
        height: 600,
        window: WindowHandle(0),
    }
}

fn bridge_with_log() -> (UiBridge, Arc<Mutex<RenderLog>>) {
    let (backend, log) = MockBackend::new();
    (UiBridge::with_backend(Box::new(backend)), log)
}

#[test]
fn test_frame_renders_window_chrome() {
    let (mut bridge, log) = bridge_with_log();
    bridge.create_context(&desc()).unwrap();

    bridge.new_frame(0.016).unwrap();
    assert!(bridge.begin("Stats"));
    bridge.end();
    bridge
        .render(CommandRecorder(1), BackBufferHandle(0xA), 0)
        .unwrap();

    let log = log.lock().unwrap();
    assert_eq!(log.creations, 1);
    // Background + title bar, two quads.
    assert_eq!(log.frames, vec![(0xA, 0, 12)]);
}

#[test]
fn test_stable_handle_creates_target_once() {
    let (mut bridge, log) = bridge_with_log();
    bridge.create_context(&desc()).unwrap();

    for _ in 0..5 {
        bridge.new_frame(0.016).unwrap();
        bridge.begin("Stats");
        bridge.end();
        bridge
            .render(CommandRecorder(1), BackBufferHandle(0xA), 0)
            .unwrap();
    }

    let log = log.lock().unwrap();
    assert_eq!(log.creations, 1);
    assert_eq!(log.releases, 0);
    assert_eq!(log.frames.len(), 5);
}

#[test]
fn test_swapchain_recreation_rebuilds_and_releases() {
    let (mut bridge, log) = bridge_with_log();
    bridge.create_context(&desc()).unwrap();

    for handle in [0xA, 0xA, 0xB] {
        bridge.new_frame(0.016).unwrap();
        bridge.begin("Stats");
        bridge.end();
        bridge
            .render(CommandRecorder(1), BackBufferHandle(handle), 0)
            .unwrap();
    }

    let log = log.lock().unwrap();
    assert_eq!(log.creations, 2);
    assert_eq!(log.releases, 1, "displaced target must be released");
}

#[test]
fn test_back_buffer_slots_cached_independently() {
    let (mut bridge, log) = bridge_with_log();
    bridge.create_context(&desc()).unwrap();

    for (handle, index) in [(0xA, 0), (0xB, 1), (0xC, 2), (0xA, 0), (0xB, 1)] {
        bridge.new_frame(0.016).unwrap();
        bridge.begin("Stats");
        bridge.end();
        bridge
            .render(CommandRecorder(1), BackBufferHandle(handle), index)
            .unwrap();
    }

    assert_eq!(log.lock().unwrap().creations, 3);
}

#[test]
fn test_snapshot_survives_next_frame() {
    let (mut bridge, _log) = bridge_with_log();
    bridge.create_context(&desc()).unwrap();

    bridge.new_frame(0.016).unwrap();
    bridge.begin("Stats");
    bridge.text("hi");
    bridge.end();
    bridge
        .render(CommandRecorder(1), BackBufferHandle(0xA), 0)
        .unwrap();

    let before = bridge.draw_data().unwrap().index_count;
    assert!(before > 12, "text must add geometry beyond window chrome");

    // Starting and abandoning the next frame leaves the snapshot intact.
    bridge.new_frame(0.016).unwrap();
    assert_eq!(bridge.draw_data().unwrap().index_count, before);
}

#[test]
fn test_render_before_new_frame_fails() {
    let (mut bridge, _log) = bridge_with_log();
    bridge.create_context(&desc()).unwrap();
    assert!(bridge
        .render(CommandRecorder(1), BackBufferHandle(0xA), 0)
        .is_err());
}

#[test]
fn test_context_payload_comes_from_backend() {
    let (mut bridge, _log) = bridge_with_log();
    bridge.create_context(&desc()).unwrap();
    assert_eq!(bridge.backend().unwrap().api_payload(), 0xCAFE);
    assert_eq!(bridge.api_data(), Some(0xCAFE));
}

#[test]
fn test_attach_after_create_updates_payload() {
    let (backend, _log) = MockBackend::new();
    let mut bridge = UiBridge::new();
    bridge.create_context(&desc()).unwrap();
    // Headless bridge: no backend yet, so the payload is empty.
    assert_eq!(bridge.api_data(), Some(0));

    bridge.attach_backend(Box::new(backend));
    assert_eq!(bridge.api_data(), Some(0xCAFE));
}

#[test]
fn test_destroying_last_context_invalidates_targets() {
    let (mut bridge, log) = bridge_with_log();
    let a = bridge.create_context(&desc()).unwrap();
    let b = bridge.create_context(&desc()).unwrap();

    bridge.set_current_context(a);
    bridge.new_frame(0.016).unwrap();
    bridge.begin("Stats");
    bridge.end();
    bridge
        .render(CommandRecorder(1), BackBufferHandle(0xA), 0)
        .unwrap();

    bridge.destroy_context(a).unwrap();
    assert_eq!(log.lock().unwrap().invalidations, 0, "context b still live");

    bridge.destroy_context(b).unwrap();
    let log = log.lock().unwrap();
    assert_eq!(log.invalidations, 1);
    assert_eq!(log.releases, 1);
}

#[test]
fn test_mouse_capture_round_trip() {
    use lucarne::input::MouseEvent;

    let (mut bridge, _log) = bridge_with_log();
    bridge.create_context(&desc()).unwrap();

    bridge.new_frame(0.016).unwrap();
    bridge.begin("Stats");
    bridge.end();
    bridge
        .render(CommandRecorder(1), BackBufferHandle(0xA), 0)
        .unwrap();

    let pos = bridge.window_state("Stats").unwrap().pos;

    // Move over the window; once the next frame sees the hover the UI
    // claims the mouse.
    assert!(bridge.feed_mouse_event(&MouseEvent::moved(pos.x + 2.0, pos.y + 2.0)));
    bridge.new_frame(0.016).unwrap();
    bridge.begin("Stats");
    bridge.end();
    assert!(!bridge.feed_mouse_event(&MouseEvent::moved(pos.x + 3.0, pos.y + 3.0)));

    // Moving away releases the capture on the following frame.
    bridge.feed_mouse_event(&MouseEvent::moved(-50.0, -50.0));
    bridge.new_frame(0.016).unwrap();
    bridge.begin("Stats");
    bridge.end();
    assert!(bridge.feed_mouse_event(&MouseEvent::moved(-51.0, -51.0)));
}

#[test]
fn test_settings_round_trip_across_bridges() {
    let (mut bridge, _log) = bridge_with_log();
    bridge.create_context(&desc()).unwrap();
    bridge.new_frame(0.016).unwrap();
    bridge.begin("Persisted");
    bridge.end();
    bridge
        .render(CommandRecorder(1), BackBufferHandle(0xA), 0)
        .unwrap();
    let pos = bridge.window_state("Persisted").unwrap().pos;
    let blob = bridge.save_settings();

    let (mut fresh, _log) = bridge_with_log();
    fresh.create_context(&desc()).unwrap();
    fresh.load_settings(&blob);
    assert_eq!(fresh.window_state("Persisted").unwrap().pos, pos);
}
