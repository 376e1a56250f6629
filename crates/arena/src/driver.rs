use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::service::Arena;

const LOG_TARGET: &str = "arena::driver";

/// Sweep every room on a fixed interval until `shutdown` fires, so rooms
/// nobody touches still move past their deadlines.
pub fn spawn_ticker(
    arena: Arc<Arena>,
    clock: Arc<dyn Clock>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    let period = Duration::from_millis(arena.config().tick_interval_ms);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!(target: LOG_TARGET, "ticker stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let summary = arena.tick_all(clock.now_ms());
                    if summary.forced > 0 || summary.errors > 0 {
                        debug!(
                            target: LOG_TARGET,
                            rooms = summary.rooms,
                            forced = summary.forced,
                            errors = summary.errors,
                            "tick"
                        );
                    }
                }
            }
        }
    })
}
