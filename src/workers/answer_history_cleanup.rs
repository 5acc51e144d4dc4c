use chrono::{DateTime, Duration, Utc};

use crate::store::Store;

/// 超过一天未更新的连击历史已无意义（连击窗口只有 60 秒）
const IDLE_HISTORY_TTL_HOURS: i64 = 24;

pub async fn run(store: &Store, now: DateTime<Utc>) {
    tracing::debug!("answer_history_cleanup: start");
    let cutoff = now - Duration::hours(IDLE_HISTORY_TTL_HOURS);
    match store.prune_idle_answer_history(cutoff) {
        Ok(count) => tracing::info!(cleaned = count, "answer_history_cleanup: done"),
        Err(e) => tracing::error!(error=%e, "answer_history_cleanup failed"),
    }
}
