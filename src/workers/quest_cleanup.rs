use chrono::{DateTime, Duration, Utc};

use crate::rewards::clock::LocalClock;
use crate::store::Store;

/// Drops daily quest sets older than `retention_days` local days.
pub async fn run(store: &Store, clock: &LocalClock, retention_days: i64, now: DateTime<Utc>) {
    tracing::debug!("quest_cleanup: start");
    let cutoff = clock.local_date(now) - Duration::days(retention_days.max(1));
    match store.prune_daily_quests_before(cutoff) {
        Ok(count) => tracing::info!(cleaned = count, %cutoff, "quest_cleanup: done"),
        Err(e) => tracing::error!(error=%e, "quest_cleanup failed"),
    }
}
