use crate::manager::LogManager;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

/// Run [`LogManager::cleanup_async`] now and then once every `period`.
///
/// Outcomes go to the manager's cleanup notifications as usual. Periods
/// shorter than one second are raised to one second. Abort the returned
/// handle to stop the schedule.
pub fn spawn_periodic_cleanup(manager: Arc<LogManager>, period: Duration) -> JoinHandle<()> {
    let period = period.max(Duration::from_secs(1));

    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            manager.cleanup_async().await;
        }
    })
}
