use chrono::{DateTime, NaiveDate, Utc};
use sled::transaction::{ConflictableTransactionError, TransactionError, Transactional};

use crate::rewards::types::{DailyQuestSet, UserProgress};
use crate::store::keys;
use crate::store::{Mutation, Store, StoreError};

/// Business-rule reasons a claim transaction aborts without writing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimRejection {
    SetMissing,
    QuestMissing,
    NotCompleted,
    AlreadyClaimed,
}

#[derive(Debug)]
enum ClaimAbort {
    Rejected(ClaimRejection),
    Corrupt(String),
}

#[derive(Debug, Clone)]
pub struct ClaimCommit<A> {
    pub quests: DailyQuestSet,
    pub progress: UserProgress,
    pub award: A,
}

impl Store {
    pub fn get_daily_quests(
        &self,
        user_id: &str,
        date: &str,
    ) -> Result<Option<DailyQuestSet>, StoreError> {
        let key = keys::daily_quest_key(user_id, date)?;
        match self.daily_quests.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    /// First writer wins; a racing initializer gets the stored set back.
    pub fn insert_daily_quests_if_absent(
        &self,
        set: &DailyQuestSet,
    ) -> Result<(DailyQuestSet, bool), StoreError> {
        let key = keys::daily_quest_key(&set.user_id, &set.date)?;
        Self::insert_if_absent(&self.daily_quests, &key, set)
    }

    pub fn update_daily_quests<R, F>(
        &self,
        user_id: &str,
        date: &str,
        mutate: F,
    ) -> Result<(DailyQuestSet, R), StoreError>
    where
        F: FnMut(&mut DailyQuestSet) -> Mutation<R>,
    {
        let key = keys::daily_quest_key(user_id, date)?;
        Self::cas_update(&self.daily_quests, "daily_quests", &key, || None, mutate)
    }

    /// Marks one quest claimed and applies `award` to the user's ledger in a single
    /// transaction over both trees. `award` receives the quest's reward and may be re-run
    /// by sled on conflict.
    pub fn claim_daily_quest<A, F>(
        &self,
        user_id: &str,
        date: &str,
        quest_id: &str,
        now: DateTime<Utc>,
        award: F,
    ) -> Result<Result<ClaimCommit<A>, ClaimRejection>, StoreError>
    where
        F: Fn(&mut UserProgress, u32) -> A,
    {
        let quest_key = keys::daily_quest_key(user_id, date)?;
        let progress_key = keys::progress_key(user_id)?;

        let outcome = (&self.daily_quests, &self.user_progress).transaction(
            |(quests_tx, progress_tx)| {
                let reject =
                    |r: ClaimRejection| ConflictableTransactionError::Abort(ClaimAbort::Rejected(r));
                let corrupt =
                    |e: serde_json::Error| ConflictableTransactionError::Abort(ClaimAbort::Corrupt(e.to_string()));

                let raw = quests_tx
                    .get(quest_key.as_bytes())?
                    .ok_or_else(|| reject(ClaimRejection::SetMissing))?;
                let mut set: DailyQuestSet = serde_json::from_slice(&raw).map_err(corrupt)?;

                let quest = set
                    .quests
                    .iter_mut()
                    .find(|q| q.id == quest_id)
                    .ok_or_else(|| reject(ClaimRejection::QuestMissing))?;
                if quest.claimed {
                    return Err(reject(ClaimRejection::AlreadyClaimed));
                }
                if !quest.completed {
                    return Err(reject(ClaimRejection::NotCompleted));
                }
                quest.claimed = true;
                let reward = quest.xp_reward;
                set.total_xp_earned = set.total_xp_earned.saturating_add(reward);

                let mut progress = match progress_tx.get(progress_key.as_bytes())? {
                    Some(raw) => serde_json::from_slice::<UserProgress>(&raw).map_err(corrupt)?,
                    None => UserProgress::new(user_id, now),
                };
                let award_out = award(&mut progress, reward);

                let set_bytes = serde_json::to_vec(&set).map_err(corrupt)?;
                let progress_bytes = serde_json::to_vec(&progress).map_err(corrupt)?;
                quests_tx.insert(quest_key.as_bytes(), set_bytes)?;
                progress_tx.insert(progress_key.as_bytes(), progress_bytes)?;

                Ok(ClaimCommit {
                    quests: set,
                    progress,
                    award: award_out,
                })
            },
        );

        match outcome {
            Ok(commit) => Ok(Ok(commit)),
            Err(TransactionError::Abort(ClaimAbort::Rejected(rejection))) => Ok(Err(rejection)),
            Err(TransactionError::Abort(ClaimAbort::Corrupt(message))) => {
                Err(StoreError::Validation(format!("corrupt quest claim data: {message}")))
            }
            Err(TransactionError::Storage(e)) => Err(StoreError::Sled(e)),
        }
    }

    /// Removes quest sets whose day is strictly before `cutoff`.
    pub fn prune_daily_quests_before(&self, cutoff: NaiveDate) -> Result<usize, StoreError> {
        let mut stale = Vec::new();
        for item in self.daily_quests.iter() {
            let (key, _) = item?;
            match keys::parse_daily_quest_date(&key) {
                Some(day) if day < cutoff => stale.push(key),
                Some(_) => {}
                None => {
                    tracing::warn!(key = %String::from_utf8_lossy(&key), "Unparseable daily quest key");
                }
            }
        }

        let mut batch = sled::Batch::default();
        for key in &stale {
            batch.remove(key.clone());
        }
        self.daily_quests.apply_batch(batch)?;
        Ok(stale.len())
    }
}
