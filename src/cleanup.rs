/// Cleanup Scheduler
///
/// Background loop that periodically reclaims spent-token bookkeeping:
/// invalidation entries past their expiry and families past their absolute
/// deadline. Sweeps take the store locks only briefly, so verification and
/// rotation keep running while a sweep is in progress.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use crate::auth::{SweepReport, TokenService};

struct Running {
    shutdown_tx: watch::Sender<()>,
    handle: JoinHandle<()>,
}

pub struct CleanupScheduler {
    service: Arc<TokenService>,
    interval: Duration,
    running: Mutex<Option<Running>>,
}

impl CleanupScheduler {
    /// # Arguments
    /// * `service` - Token service whose stores are swept
    /// * `interval` - Time between sweeps (default: 5 minutes)
    pub fn new(service: Arc<TokenService>, interval: Duration) -> Self {
        Self {
            service,
            interval,
            running: Mutex::new(None),
        }
    }

    /// Spawn the sweep loop
    ///
    /// Must be called from within a tokio runtime. The first sweep runs
    /// immediately.
    ///
    /// # Returns
    /// `false` if the loop was already running
    pub fn start(&self) -> bool {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if running.is_some() {
            warn!("Cleanup scheduler already running");
            return false;
        }

        let (shutdown_tx, mut shutdown_rx) = watch::channel(());
        let service = self.service.clone();
        let period = self.interval;

        let handle = tokio::spawn(async move {
            info!(interval_secs = period.as_secs(), "Cleanup scheduler started");

            let mut timer = interval(period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        info!("Cleanup scheduler received shutdown signal");
                        break;
                    }
                    _ = timer.tick() => {
                        run_sweep(&service);
                    }
                }
            }

            info!("Cleanup scheduler stopped");
        });

        *running = Some(Running {
            shutdown_tx,
            handle,
        });
        true
    }

    /// Signal the loop to stop and wait for it to finish
    ///
    /// Calling `stop` when the loop is not running is a no-op.
    pub async fn stop(&self) {
        let running = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(Running {
            shutdown_tx,
            handle,
        }) = running
        {
            let _ = shutdown_tx.send(());
            if let Err(e) = handle.await {
                warn!(error = %e, "Cleanup scheduler task ended abnormally");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Run one sweep on the caller's task
    pub fn run_once(&self) -> SweepReport {
        run_sweep(&self.service)
    }
}

fn run_sweep(service: &TokenService) -> SweepReport {
    let report = service.purge_expired();
    if report.invalidated_removed > 0 || report.families_removed > 0 {
        info!(
            invalidated_removed = report.invalidated_removed,
            families_removed = report.families_removed,
            "Expired session state swept"
        );
    } else {
        tracing::debug!("Cleanup sweep found nothing to remove");
    }
    report
}
