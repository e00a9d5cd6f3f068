//! Display-refresh scheduling.
//!
//! The render loop never sleeps. It asks a [`RefreshScheduler`] to call it
//! back before the next repaint, and re-arms itself from inside that
//! callback. Headless runs drive a [`VirtualDisplay`] that ticks at a fixed
//! refresh rate.

use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RefreshHandle(u64);

pub trait RefreshScheduler {
    /// Registers interest in the next refresh.
    fn request_refresh(&mut self) -> RefreshHandle;

    /// Drops a pending request. Unknown or already-fired handles are ignored.
    fn cancel_refresh(&mut self, handle: RefreshHandle);
}

pub struct VirtualDisplay {
    refresh_hz: u32,
    refreshes: u64,
    next_handle: u64,
    pending: Vec<RefreshHandle>,
}

impl VirtualDisplay {
    pub fn new(refresh_hz: u32) -> Self {
        Self {
            refresh_hz: refresh_hz.max(1),
            refreshes: 0,
            next_handle: 1,
            pending: Vec::new(),
        }
    }

    pub fn refresh_hz(&self) -> u32 {
        self.refresh_hz
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.refresh_hz as f64)
    }

    /// Time of the most recent refresh.
    pub fn now(&self) -> Duration {
        Duration::from_secs_f64(self.refreshes as f64 / self.refresh_hz as f64)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Advances to the next refresh and hands back every callback that was
    /// waiting for it. Requests made while handling them wait for the
    /// following refresh.
    pub fn vsync(&mut self) -> Vec<RefreshHandle> {
        self.refreshes += 1;
        std::mem::take(&mut self.pending)
    }
}

impl RefreshScheduler for VirtualDisplay {
    fn request_refresh(&mut self) -> RefreshHandle {
        let handle = RefreshHandle(self.next_handle);
        self.next_handle += 1;
        self.pending.push(handle);
        handle
    }

    fn cancel_refresh(&mut self, handle: RefreshHandle) {
        self.pending.retain(|h| *h != handle);
    }
}
