//! Periodic expiry scan on its own thread and runtime.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::runtime::Builder;
use tokio::sync::oneshot;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::collaborators::{Collaborators, Router};
use crate::error::PostOfficeError;
use crate::observability::events;
use crate::routing::address_manager::AddressManager;

const COMPONENT: &str = "expiry_scanner";
const EXPIRY_SCANNER_THREAD_NAME: &str = "post-office-expiry-scanner";

/// Result of one pass over every bound queue.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct ScanOutcome {
    pub(crate) scanned: usize,
    pub(crate) failed: usize,
}

/// Expires overdue entries of every queue in one sequential pass.
///
/// The queue set is snapshotted up front. A failing queue is logged and the
/// pass moves on to the next one, as does a panicking one in builds that
/// unwind.
pub(crate) async fn scan_once(
    address_manager: &dyn AddressManager,
    router: &dyn Router,
    collaborators: &Collaborators,
) -> ScanOutcome {
    let mut outcome = ScanOutcome::default();

    for binding in address_manager.bindings().into_values() {
        let queue = binding.queue().clone();
        outcome.scanned += 1;

        let expiry = queue.expire_messages(
            collaborators.storage.as_ref(),
            router,
            collaborators.queue_settings.as_ref(),
        );
        // Only contains panics under `panic = "unwind"`; the release profile
        // aborts instead.
        match AssertUnwindSafe(expiry).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                outcome.failed += 1;
                error!(
                    event = events::EXPIRY_QUEUE_FAILED,
                    component = COMPONENT,
                    queue = queue.name(),
                    err = %err,
                    "failed to expire messages"
                );
            }
            Err(_) => {
                outcome.failed += 1;
                error!(
                    event = events::EXPIRY_QUEUE_PANICKED,
                    component = COMPONENT,
                    queue = queue.name(),
                    "expiry panicked"
                );
            }
        }
    }

    debug!(
        event = events::EXPIRY_SCAN_DONE,
        component = COMPONENT,
        scanned = outcome.scanned,
        failed = outcome.failed,
        "expiry scan finished"
    );
    outcome
}

/// Handle to the background expiry thread.
pub(crate) struct ExpiryScanner {
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl ExpiryScanner {
    /// Starts scanning every `period`; the first scan runs one period after
    /// start. Scans never overlap and missed ticks are skipped.
    pub(crate) fn spawn(
        period: Duration,
        address_manager: Arc<dyn AddressManager>,
        router: Arc<dyn Router>,
        collaborators: Collaborators,
    ) -> Result<Self, PostOfficeError> {
        let (shutdown, mut shutdown_rx) = oneshot::channel();

        let thread = thread::Builder::new()
            .name(EXPIRY_SCANNER_THREAD_NAME.to_string())
            .spawn(move || {
                let runtime = match Builder::new_current_thread().enable_all().build() {
                    Ok(runtime) => runtime,
                    Err(err) => {
                        error!(
                            event = events::RUNTIME_SPAWN_FAILED,
                            component = COMPONENT,
                            err = %err,
                            "failed to build expiry scanner runtime"
                        );
                        return;
                    }
                };

                runtime.block_on(async move {
                    let mut ticker = interval(period);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    ticker.tick().await;

                    loop {
                        tokio::select! {
                            _ = &mut shutdown_rx => break,
                            _ = ticker.tick() => {
                                scan_once(address_manager.as_ref(), router.as_ref(), &collaborators)
                                    .await;
                            }
                        }
                    }
                });
            })
            .map_err(|err| {
                error!(
                    event = events::RUNTIME_SPAWN_FAILED,
                    component = COMPONENT,
                    err = %err,
                    "failed to spawn expiry scanner thread"
                );
                PostOfficeError::Runtime(err.to_string())
            })?;

        info!(
            event = events::EXPIRY_SCANNER_STARTED,
            component = COMPONENT,
            period_ms = period.as_millis() as u64,
            "expiry scanner started"
        );
        Ok(Self {
            shutdown: Some(shutdown),
            thread: Some(thread),
        })
    }

    /// Signals the scanner and waits for an in-progress scan to finish.
    pub(crate) async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        let Some(thread) = self.thread.take() else {
            return;
        };

        match tokio::task::spawn_blocking(move || thread.join()).await {
            Ok(Ok(())) => info!(
                event = events::EXPIRY_SCANNER_STOPPED,
                component = COMPONENT,
                "expiry scanner stopped"
            ),
            _ => warn!(
                event = events::EXPIRY_SCANNER_STOPPED,
                component = COMPONENT,
                "expiry scanner thread ended abnormally"
            ),
        }
    }
}

impl Drop for ExpiryScanner {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}
