//! Periodic scan scheduling.
//!
//! The [`Scanner`] asks the control surface for a rescan on a fixed
//! cadence while active. Rejected requests are routine (radio busy, OS
//! throttling); the scanner tracks consecutive rejections and gives up
//! escalating after three in a row, accepting degraded scanning instead.
//! It is the only component that issues scan requests, so pausing it is
//! enough to quiesce the radio during a connection attempt.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::AbortHandle;
use tracing::{debug, warn};

use crate::control::WifiControl;

/// Delay between consecutive rescan requests.
pub const SCAN_INTERVAL: Duration = Duration::from_secs(20);

/// Consecutive rejections tolerated before the counter self-resets.
const MAX_SCAN_REJECTIONS: u32 = 3;

struct ScannerState {
    paused: bool,
    rejections: u32,
    pending: Option<AbortHandle>,
}

/// Periodic rescan driver. Clones share one schedule.
pub struct Scanner<C: WifiControl + 'static> {
    control: Arc<C>,
    interval: Duration,
    state: Arc<Mutex<ScannerState>>,
}

impl<C: WifiControl + 'static> Clone for Scanner<C> {
    fn clone(&self) -> Self {
        Self {
            control: self.control.clone(),
            interval: self.interval,
            state: self.state.clone(),
        }
    }
}

impl<C: WifiControl + 'static> Scanner<C> {
    pub fn new(control: Arc<C>) -> Self {
        Self::with_interval(control, SCAN_INTERVAL)
    }

    pub fn with_interval(control: Arc<C>, interval: Duration) -> Self {
        Self {
            control,
            interval,
            state: Arc::new(Mutex::new(ScannerState {
                paused: true,
                rejections: 0,
                pending: None,
            })),
        }
    }

    /// Start (or keep) scanning. Schedules an immediate tick only when no
    /// tick is already pending, so repeated resumes do not double the
    /// cadence.
    pub fn resume(&self) {
        let mut state = self.state.lock().unwrap();
        state.paused = false;
        if state.pending.is_none() {
            state.pending = Some(Self::schedule(
                self.control.clone(),
                self.state.clone(),
                Duration::ZERO,
                self.interval,
            ));
        }
    }

    /// Stop scanning: the pending tick is cancelled and the rejection
    /// counter cleared.
    pub fn pause(&self) {
        let mut state = self.state.lock().unwrap();
        state.paused = true;
        state.rejections = 0;
        if let Some(pending) = state.pending.take() {
            pending.abort();
        }
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().unwrap().paused
    }

    /// Consecutive rejections observed since the last accepted request.
    pub fn rejection_count(&self) -> u32 {
        self.state.lock().unwrap().rejections
    }

    fn schedule(
        control: Arc<C>,
        state: Arc<Mutex<ScannerState>>,
        delay: Duration,
        interval: Duration,
    ) -> AbortHandle {
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            Self::tick(control, state, interval);
        });
        task.abort_handle()
    }

    fn tick(control: Arc<C>, state: Arc<Mutex<ScannerState>>, interval: Duration) {
        let mut guard = state.lock().unwrap();
        if guard.paused {
            guard.pending = None;
            return;
        }

        if control.request_scan() {
            guard.rejections = 0;
        } else {
            guard.rejections += 1;
            debug!(rejections = guard.rejections, "scan request rejected");
            if guard.rejections >= MAX_SCAN_REJECTIONS {
                warn!("scan requests rejected {MAX_SCAN_REJECTIONS} times in a row");
                guard.rejections = 0;
            }
        }

        guard.pending = Some(Self::schedule(
            control.clone(),
            state.clone(),
            interval,
            interval,
        ));
    }
}
