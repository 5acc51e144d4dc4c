pub mod actions;
pub mod badges;
pub mod clock;
pub mod combo;
pub mod error;
pub mod grading;
pub mod leaderboard;
pub mod ledger;
pub mod locks;
pub mod quests;
pub mod streak;
pub mod types;

use std::sync::Arc;

use crate::config::RewardsConfig;
use crate::store::Store;

pub use error::RewardError;

use self::clock::LocalClock;
use self::grading::TaskGrader;
use self::leaderboard::Leaderboard;
use self::ledger::StatsLedger;
use self::quests::{QuestCatalog, QuestScheduler, DEFAULT_CATALOG};

/// The progression engine: one ledger shared by every reward path.
pub struct RewardEngine {
    ledger: Arc<StatsLedger>,
    quests: QuestScheduler,
    grader: TaskGrader,
    leaderboard: Leaderboard,
}

impl RewardEngine {
    pub fn new(store: Arc<Store>, config: &RewardsConfig) -> Self {
        Self::with_catalog(store, config, DEFAULT_CATALOG.clone())
    }

    pub fn with_catalog(store: Arc<Store>, config: &RewardsConfig, catalog: QuestCatalog) -> Self {
        let clock = LocalClock::new(config.utc_offset_minutes);
        let ledger = Arc::new(StatsLedger::new(store.clone(), clock));
        Self {
            quests: QuestScheduler::new(ledger.clone(), Arc::new(catalog)),
            grader: TaskGrader::new(ledger.clone()),
            leaderboard: Leaderboard::new(store, clock),
            ledger,
        }
    }

    pub fn ledger(&self) -> &StatsLedger {
        &self.ledger
    }

    pub fn quests(&self) -> &QuestScheduler {
        &self.quests
    }

    pub fn grader(&self) -> &TaskGrader {
        &self.grader
    }

    pub fn leaderboard(&self) -> &Leaderboard {
        &self.leaderboard
    }

    pub fn clock(&self) -> &LocalClock {
        self.ledger.clock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ledger_writes_feed_the_daily_leaderboard() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::open(dir.path().join("db").to_str().unwrap()).unwrap());
        let engine = RewardEngine::new(store, &RewardsConfig::default());

        engine.ledger().apply_action("u1", "complete_course", None).await.unwrap();
        engine.ledger().apply_action("u2", "complete_chapter", None).await.unwrap();

        let ranked = engine
            .leaderboard()
            .ranking(leaderboard::LeaderboardWindow::Daily, 10)
            .unwrap();
        let ids: Vec<&str> = ranked.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["u1", "u2"]);
        assert_eq!(ranked[0].courses_completed, 1);
    }
}
