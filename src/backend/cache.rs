//! Per-back-buffer render-target cache
//!
//! Swapchain back buffers are identified by their raw API handle. A target
//! (RTV / image view + framebuffer) is built lazily the first time a slot is
//! rendered to and rebuilt only when the handle occupying that slot changes,
//! which happens on swapchain recreation. The displaced target is handed back
//! to the rebuild closure so its GPU resources can be released rather than
//! leaked.

use super::{BackBufferHandle, BACK_BUFFER_COUNT};

/// Cache of `R` targets, one per swapchain slot, keyed by the raw back-buffer
/// handle last seen in that slot.
pub struct TargetCache<R> {
    slots: [Option<(BackBufferHandle, R)>; BACK_BUFFER_COUNT],
}

impl<R> Default for TargetCache<R> {
    fn default() -> Self {
        Self {
            slots: [const { None }; BACK_BUFFER_COUNT],
        }
    }
}

impl<R> TargetCache<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the target for `index`, rebuilding it when the slot is empty or
    /// its cached handle differs from `handle`. On rebuild the closure
    /// receives the displaced target, if any, and must release it.
    pub fn resolve<E, F>(&mut self, index: u32, handle: BackBufferHandle, rebuild: F) -> Result<&mut R, E>
    where
        F: FnOnce(BackBufferHandle, Option<R>) -> Result<R, E>,
    {
        debug_assert!(
            (index as usize) < BACK_BUFFER_COUNT,
            "back-buffer index {} out of range",
            index
        );
        let slot = &mut self.slots[index as usize % BACK_BUFFER_COUNT];
        if !matches!(slot, Some((cached, _)) if *cached == handle) {
            let displaced = slot.take().map(|(_, target)| target);
            let built = rebuild(handle, displaced)?;
            *slot = Some((handle, built));
        }
        match slot {
            Some((_, target)) => Ok(target),
            None => unreachable!("slot filled above"),
        }
    }

    /// Empty every slot, yielding the cached targets for release.
    pub fn drain(&mut self) -> impl Iterator<Item = R> + '_ {
        self.slots.iter_mut().filter_map(|s| s.take().map(|(_, r)| r))
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|s| s.is_none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Target(u64);

    #[test]
    fn test_same_handle_builds_once() {
        let mut cache: TargetCache<Target> = TargetCache::new();
        let mut builds = 0;
        for _ in 0..5 {
            let target = cache
                .resolve::<(), _>(0, BackBufferHandle(0xA), |h, displaced| {
                    builds += 1;
                    assert!(displaced.is_none());
                    Ok(Target(h.0))
                })
                .unwrap();
            assert_eq!(*target, Target(0xA));
        }
        assert_eq!(builds, 1);
    }

    #[test]
    fn test_handle_change_rebuilds_and_releases() {
        let mut cache: TargetCache<Target> = TargetCache::new();
        cache
            .resolve::<(), _>(1, BackBufferHandle(0xA), |h, _| Ok(Target(h.0)))
            .unwrap();

        let mut released = None;
        cache
            .resolve::<(), _>(1, BackBufferHandle(0xB), |h, displaced| {
                released = displaced;
                Ok(Target(h.0))
            })
            .unwrap();
        assert_eq!(released, Some(Target(0xA)));
    }

    #[test]
    fn test_slots_independent() {
        let mut cache: TargetCache<Target> = TargetCache::new();
        for i in 0..BACK_BUFFER_COUNT as u32 {
            cache
                .resolve::<(), _>(i, BackBufferHandle(i as u64), |h, _| Ok(Target(h.0)))
                .unwrap();
        }
        // Re-resolving slot 0 must not disturb the others.
        let mut builds = 0;
        cache
            .resolve::<(), _>(0, BackBufferHandle(0), |h, _| {
                builds += 1;
                Ok(Target(h.0))
            })
            .unwrap();
        assert_eq!(builds, 0);
    }

    #[test]
    fn test_rebuild_error_leaves_slot_empty() {
        let mut cache: TargetCache<Target> = TargetCache::new();
        let err = cache.resolve(0, BackBufferHandle(0xA), |_, _| Err("boom"));
        assert_eq!(err.err(), Some("boom"));
        assert!(cache.is_empty());

        // Next attempt rebuilds from scratch.
        cache
            .resolve::<(), _>(0, BackBufferHandle(0xA), |h, _| Ok(Target(h.0)))
            .unwrap();
        assert!(!cache.is_empty());
    }

    #[test]
    fn test_drain_yields_all_targets() {
        let mut cache: TargetCache<Target> = TargetCache::new();
        for i in 0..2u32 {
            cache
                .resolve::<(), _>(i, BackBufferHandle(i as u64), |h, _| Ok(Target(h.0)))
                .unwrap();
        }
        let drained: Vec<_> = cache.drain().collect();
        assert_eq!(drained.len(), 2);
        assert!(cache.is_empty());
    }
}
