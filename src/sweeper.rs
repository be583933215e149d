use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use tokio_util::sync::CancellationToken;

use crate::service::SubscriptionService;

/// Default pause between two sweeps of expired unverified subscribers
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Background task purging subscribers that never verified in time
pub struct SweepTask {
    service: SubscriptionService,
    interval: Duration,
}

impl SweepTask {
    pub fn new(service: SubscriptionService, interval: Duration) -> Self {
        Self { service, interval }
    }

    /// Spawn the sweep loop. The first sweep runs immediately, then once per interval
    /// until `shutdown` is cancelled.
    pub fn start(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!(interval_secs = self.interval.as_secs(), "Sweep task started");
            let mut ticker = interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        // Failures are retried on the next tick
                        if let Err(error) = self.service.sweep().await {
                            tracing::error!(error.cause_chain = ?error, "Failed to sweep expired subscribers");
                        }
                    }
                    _ = shutdown.cancelled() => {
                        tracing::info!("Sweep task received shutdown signal");
                        break;
                    }
                }
            }
            tracing::info!("Sweep task stopped");
        })
    }
}
