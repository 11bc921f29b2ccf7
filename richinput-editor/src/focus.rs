use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, RecvTimeoutError, Sender};

use crate::state::{ChangeOrigin, SharedEditorState};

/// How long a focus request stays pending before it is reset.
pub const FOCUS_RESET_DELAY: Duration = Duration::from_secs(1);

enum FocusSignal {
    Arm(u64),
    Shutdown,
}

/// Resets `focus_request` after a fixed delay.
///
/// There is no acknowledgment from the page, so the reset is purely
/// time-based. Re-arming before expiry restarts the delay; only the newest
/// request generation is cleared.
pub struct FocusTimer {
    tx: Sender<FocusSignal>,
    worker: Option<JoinHandle<()>>,
}

impl FocusTimer {
    pub fn spawn(state: SharedEditorState, delay: Duration) -> Self {
        let (tx, rx) = unbounded::<FocusSignal>();

        let worker = std::thread::Builder::new()
            .name("richinput-focus".to_string())
            .spawn(move || {
                let mut pending: Option<(u64, Instant)> = None;
                // Arms can arrive out of order when requests race.
                let mut newest = 0u64;
                loop {
                    let signal = match pending {
                        Some((_, deadline)) => match rx.recv_deadline(deadline) {
                            Ok(signal) => Some(signal),
                            Err(RecvTimeoutError::Timeout) => None,
                            Err(RecvTimeoutError::Disconnected) => break,
                        },
                        None => match rx.recv() {
                            Ok(signal) => Some(signal),
                            Err(_) => break,
                        },
                    };

                    match signal {
                        Some(FocusSignal::Arm(generation)) => {
                            newest = newest.max(generation);
                            pending = Some((newest, Instant::now() + delay));
                        }
                        Some(FocusSignal::Shutdown) => break,
                        None => {
                            if let Some((generation, _)) = pending.take() {
                                if state.expire_focus_request(ChangeOrigin::Timer, generation) {
                                    log::debug!("Focus request {} expired", generation);
                                }
                            }
                        }
                    }
                }
            });

        let worker = match worker {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::error!("Failed to spawn focus timer thread: {}", e);
                None
            }
        };

        Self { tx, worker }
    }

    /// Start (or restart) the reset countdown for request `generation`.
    pub fn arm(&self, generation: u64) {
        if self.tx.send(FocusSignal::Arm(generation)).is_err() {
            log::warn!("Focus timer is not running; focus request will not self-clear");
        }
    }
}

impl Drop for FocusTimer {
    fn drop(&mut self) {
        let _ = self.tx.send(FocusSignal::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
