//! Background rate refresh job.
//!
//! Waits an initial delay, then runs [`ConversionService::refresh_all_rates`]
//! on a fixed interval until cancelled.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use folio_types::{CurrencyRepository, RateSource};

use crate::ConversionService;

/// Refresh job timing.
#[derive(Debug, Clone, Copy)]
pub struct RefreshSchedule {
    /// Delay before the first run
    pub initial_delay: Duration,
    /// Time between runs
    pub interval: Duration,
}

impl Default for RefreshSchedule {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(60),
            interval: Duration::from_secs(6 * 60 * 60),
        }
    }
}

/// How one refresh cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed,
    Failed,
    Panicked,
}

/// Periodically refreshes exchange rates from the rate source.
pub struct RefreshJob<R: CurrencyRepository, S: RateSource> {
    service: Arc<ConversionService<R, S>>,
    schedule: RefreshSchedule,
}

impl<R: CurrencyRepository, S: RateSource> RefreshJob<R, S> {
    pub fn new(service: Arc<ConversionService<R, S>>, schedule: RefreshSchedule) -> Self {
        Self { service, schedule }
    }

    /// Starts the job on the runtime; it stops when `shutdown` is cancelled.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    async fn run(self, shutdown: CancellationToken) {
        info!(
            initial_delay_secs = self.schedule.initial_delay.as_secs(),
            interval_secs = self.schedule.interval.as_secs(),
            "Rate refresh job started"
        );

        tokio::select! {
            _ = tokio::time::sleep(self.schedule.initial_delay) => {}
            _ = shutdown.cancelled() => {
                info!("Rate refresh job cancelled before first run");
                return;
            }
        }

        // First tick completes immediately.
        let mut ticker = interval(self.schedule.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_cycle().await;
                }
                _ = shutdown.cancelled() => {
                    break;
                }
            }
        }

        info!("Rate refresh job stopped");
    }

    /// Runs one refresh in its own task so a panic ends only this cycle.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let service = Arc::clone(&self.service);
        let handle = tokio::spawn(async move { service.refresh_all_rates().await });

        match handle.await {
            Ok(Ok(summary)) => {
                info!(
                    rates_checked = summary.rates_checked,
                    prices_inserted = summary.prices_inserted,
                    "Scheduled rate refresh finished"
                );
                CycleOutcome::Completed
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Scheduled rate refresh failed");
                CycleOutcome::Failed
            }
            Err(e) if e.is_panic() => {
                error!(error = %e, "Scheduled rate refresh panicked");
                CycleOutcome::Panicked
            }
            Err(e) => {
                error!(error = %e, "Scheduled rate refresh task was cancelled");
                CycleOutcome::Failed
            }
        }
    }
}
