//! Periodic health polling.
//!
//! Samples the aggregator on a fixed interval and reports status changes.
//! Snapshots are taken on a clock, so bursts of transactions between two
//! ticks only surface as their net effect.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::debug;

use crate::engine::TelemetryAggregator;
use crate::model::{SystemStatus, TelemetrySnapshot};

/// Spawn a task that polls `telemetry` every `every` and calls `on_change`
/// with the previous status, the new status and the snapshot that showed it.
///
/// The task runs until the returned handle is aborted.
pub fn spawn_health_poller<F>(
    telemetry: Arc<TelemetryAggregator>,
    every: Duration,
    mut on_change: F,
) -> JoinHandle<()>
where
    F: FnMut(SystemStatus, SystemStatus, &TelemetrySnapshot) + Send + 'static,
{
    let every = every.max(Duration::from_millis(1));
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last = telemetry.status();

        loop {
            ticker.tick().await;
            let snapshot = telemetry.snapshot();
            if snapshot.status != last {
                debug!(from = %last, to = %snapshot.status, "Health poller observed change");
                on_change(last, snapshot.status, &snapshot);
                last = snapshot.status;
            }
        }
    })
}
