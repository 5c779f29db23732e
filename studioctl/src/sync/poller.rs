use crate::sync::{state::JobsState, store::JobStore};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Background refresh loop for a [`JobStore`].
///
/// Sleeps until some job is pending or processing, then refreshes every `poll_interval`
/// until nothing is active any more. Only one loop runs per store.
pub(crate) async fn run(store: JobStore, shutdown: CancellationToken) {
    let period = store.settings().poll_interval;
    let mut rx = store.subscribe();
    info!("Job poller running");

    loop {
        // Park until there is something to watch
        let armed = tokio::select! {
            _ = shutdown.cancelled() => false,
            changed = rx.wait_for(JobsState::has_active) => changed.is_ok(),
        };
        if !armed {
            break;
        }
        debug!("Active jobs present, polling every {period:?}");

        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Job poller stopped");
                    return;
                }
                _ = ticker.tick() => {}
            }

            if !store.has_active_jobs() {
                debug!("No active jobs, poller idle");
                break;
            }

            // Spawned so a slow response can't hold back the next tick
            let refresh_store = store.clone();
            let refresh_shutdown = shutdown.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = refresh_shutdown.cancelled() => {}
                    result = refresh_store.refresh_jobs() => {
                        if let Err(e) = result {
                            warn!("Job refresh failed, retrying next tick: {e}");
                        }
                    }
                }
            });
        }
    }

    info!("Job poller stopped");
}
