//! Per-device key read loop
//!
//! Each handle owns at most one loop task. The task polls the transport on a
//! fixed interval, decodes every report and hands key events to the
//! registered callback. A read error tears the device down and leaves the
//! loop stopped; nothing restarts it.
//!
//! All transitions go through one atomic state so the error path and an
//! external [`ReadLoop::stop`] can race without tearing the device down
//! twice.

use crate::device::{DeviceHandle, WeakHandle};
use protocol::{DeviceError, ReportKind, classify};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace, warn};

/// Default poll cadence
pub const DEFAULT_READ_INTERVAL: Duration = Duration::from_millis(100);

/// Key callback: `(handle, logical key, key state)`
pub type KeyCallback = Arc<dyn Fn(&DeviceHandle, u8, u8) + Send + Sync>;

/// Read loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LoopState {
    Stopped = 0,
    Running = 1,
    ErrorRecovering = 2,
}

impl LoopState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            1 => LoopState::Running,
            2 => LoopState::ErrorRecovering,
            _ => LoopState::Stopped,
        }
    }
}

struct LoopTask {
    cancel: watch::Sender<bool>,
    join: JoinHandle<()>,
}

/// Control block for one handle's loop
pub(crate) struct ReadLoop {
    state: AtomicU8,
    // Held across the join in `stop`, so a second stopper waits for the first
    task: Mutex<Option<LoopTask>>,
}

impl ReadLoop {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU8::new(LoopState::Stopped as u8),
            task: Mutex::new(None),
        }
    }

    pub(crate) fn state(&self) -> LoopState {
        LoopState::from_raw(self.state.load(Ordering::SeqCst))
    }

    /// Start polling, replacing any running loop
    pub(crate) async fn start(
        &self,
        handle: &DeviceHandle,
        callback: KeyCallback,
        interval: Duration,
    ) {
        let mut slot = self.task.lock().await;
        self.stop_locked(&mut slot).await;

        let (cancel, cancel_rx) = watch::channel(false);
        self.state.store(LoopState::Running as u8, Ordering::SeqCst);
        let join = tokio::spawn(run(handle.downgrade(), callback, interval, cancel_rx));
        *slot = Some(LoopTask { cancel, join });
        debug!("Read loop started for {}", handle.identity());
    }

    /// Stop polling and wait for the in-flight read
    ///
    /// Idempotent; safe to call while the loop is recovering from an error.
    pub(crate) async fn stop(&self) {
        let mut slot = self.task.lock().await;
        self.stop_locked(&mut slot).await;
    }

    async fn stop_locked(&self, slot: &mut Option<LoopTask>) {
        // An error-recovering loop finishes its own teardown and lands in Stopped
        let _ = self.state.compare_exchange(
            LoopState::Running as u8,
            LoopState::Stopped as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );

        if let Some(task) = slot.take() {
            let _ = task.cancel.send(true);
            if let Err(e) = task.join.await
                && e.is_panic()
            {
                warn!("Read loop task panicked: {}", e);
            }
        }
    }

    /// Claim the error path; false if a stop already won
    fn begin_recovery(&self) -> bool {
        self.state
            .compare_exchange(
                LoopState::Running as u8,
                LoopState::ErrorRecovering as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }

    fn finish_recovery(&self) {
        self.state.store(LoopState::Stopped as u8, Ordering::SeqCst);
    }
}

async fn run(
    weak: WeakHandle,
    callback: KeyCallback,
    interval: Duration,
    mut cancel: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            // Err means the controller went away, which also ends the loop
            _ = cancel.changed() => break,
            _ = ticker.tick() => {}
        }

        let Some(handle) = weak.upgrade() else {
            break;
        };

        let result = handle.read().await;
        if *cancel.borrow() {
            break;
        }

        match result {
            Ok(report) => match classify(&report) {
                ReportKind::Short => {
                    trace!(
                        "Discarding {}-byte frame from {}",
                        report.buffer.len(),
                        handle.path()
                    );
                }
                ReportKind::WriteAck => {
                    trace!("Write acknowledged by {}", handle.path());
                }
                ReportKind::Key { key, status } => callback(&handle, key, status),
            },
            Err(e) => {
                recover(&handle, e).await;
                break;
            }
        }
    }
}

async fn recover(handle: &DeviceHandle, error: DeviceError) {
    let read_loop = handle.read_loop();
    if !read_loop.begin_recovery() {
        debug!("Read error on {} after stop: {}", handle.path(), error);
        return;
    }

    warn!("Read error on {}, closing device: {}", handle.identity(), error);
    handle.teardown().await;
    read_loop.finish_recovery();
}
