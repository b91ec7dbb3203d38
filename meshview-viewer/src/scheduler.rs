//! Repeated per-frame callbacks
//!
//! A [`FrameScheduler`] invokes every registered callback once per frame
//! with the time since the previous frame. [`ManualScheduler`] is driven
//! explicitly, which is what the CLI and tests use.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(u64);

pub type FrameCallback = Box<dyn FnMut(Duration)>;

pub trait FrameScheduler {
    /// Call `callback` on every frame until cancelled
    fn request_frames(&self, callback: FrameCallback) -> FrameHandle;

    /// Stop a registration; unknown or already cancelled handles are ignored
    fn cancel(&self, handle: FrameHandle);
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    callbacks: Vec<(FrameHandle, FrameCallback)>,
    /// Cancelled while taken out for a frame
    cancelled: HashSet<FrameHandle>,
    frames: u64,
}

/// Scheduler advanced by [`ManualScheduler::run_frame`]. Clones share the
/// same registrations.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    inner: Rc<RefCell<Registry>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one frame, returning how many callbacks ran. Callbacks may
    /// register or cancel during the frame.
    pub fn run_frame(&self, delta: Duration) -> usize {
        let mut running = {
            let mut inner = self.inner.borrow_mut();
            inner.frames += 1;
            std::mem::take(&mut inner.callbacks)
        };

        let mut ran = 0;
        for (handle, callback) in running.iter_mut() {
            if self.inner.borrow().cancelled.contains(handle) {
                continue;
            }
            callback(delta);
            ran += 1;
        }

        let mut inner = self.inner.borrow_mut();
        let cancelled = std::mem::take(&mut inner.cancelled);
        running.retain(|(h, _)| !cancelled.contains(h));
        running.append(&mut inner.callbacks);
        inner.callbacks = running;
        ran
    }

    pub fn run_frames(&self, count: usize, delta: Duration) {
        for _ in 0..count {
            self.run_frame(delta);
        }
    }

    /// Live registrations
    pub fn active_count(&self) -> usize {
        self.inner.borrow().callbacks.len()
    }

    pub fn frame_count(&self) -> u64 {
        self.inner.borrow().frames
    }
}

impl FrameScheduler for ManualScheduler {
    fn request_frames(&self, callback: FrameCallback) -> FrameHandle {
        let mut inner = self.inner.borrow_mut();
        let handle = FrameHandle(inner.next_id);
        inner.next_id += 1;
        inner.callbacks.push((handle, callback));
        handle
    }

    fn cancel(&self, handle: FrameHandle) {
        let mut inner = self.inner.borrow_mut();
        let before = inner.callbacks.len();
        inner.callbacks.retain(|(h, _)| *h != handle);
        if inner.callbacks.len() == before {
            inner.cancelled.insert(handle);
        }
    }
}
