use chrono::{DateTime, Utc};

use crate::rewards::types::{AnswerHistory, RecentAnswer, TaskAnswer};
use crate::store::keys;
use crate::store::{Mutation, Store, StoreError};

impl Store {
    /// Records the first answer for a task. When one already exists it is returned
    /// unchanged and `false` signals that nothing was written.
    pub fn record_task_answer_if_absent(
        &self,
        answer: &TaskAnswer,
    ) -> Result<(TaskAnswer, bool), StoreError> {
        let key = keys::task_answer_key(
            &answer.user_id,
            &answer.roadmap_id,
            &answer.chapter_id,
            &answer.task_id,
        )?;
        Self::insert_if_absent(&self.task_answers, &key, answer)
    }

    pub fn list_chapter_answers(
        &self,
        user_id: &str,
        roadmap_id: &str,
        chapter_id: &str,
    ) -> Result<Vec<TaskAnswer>, StoreError> {
        let prefix = keys::task_answer_chapter_prefix(user_id, roadmap_id, chapter_id)?;
        self.scan_answers(&prefix)
    }

    pub fn list_roadmap_answers(
        &self,
        user_id: &str,
        roadmap_id: &str,
    ) -> Result<Vec<TaskAnswer>, StoreError> {
        let prefix = keys::task_answer_roadmap_prefix(user_id, roadmap_id)?;
        self.scan_answers(&prefix)
    }

    fn scan_answers(&self, prefix: &str) -> Result<Vec<TaskAnswer>, StoreError> {
        let mut answers = Vec::new();
        for item in self.task_answers.scan_prefix(prefix.as_bytes()) {
            let (_, raw) = item?;
            answers.push(Self::deserialize::<TaskAnswer>(&raw)?);
        }
        Ok(answers)
    }

    pub fn get_answer_history(&self, user_id: &str) -> Result<Option<AnswerHistory>, StoreError> {
        let key = keys::answer_history_key(user_id)?;
        match self.answer_history.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn append_answer_history(
        &self,
        user_id: &str,
        answer: RecentAnswer,
        cap: usize,
    ) -> Result<AnswerHistory, StoreError> {
        let key = keys::answer_history_key(user_id)?;
        let (history, ()) = Self::cas_update(
            &self.answer_history,
            "answer_history",
            &key,
            || Some(AnswerHistory::new(user_id, answer.answered_at)),
            |history: &mut AnswerHistory| {
                history.push(answer, cap);
                Mutation::Changed(())
            },
        )?;
        Ok(history)
    }

    /// Drops histories not written since `cutoff`; returns how many were removed.
    pub fn prune_idle_answer_history(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut removed = 0;
        for item in self.answer_history.iter() {
            let (key, raw) = item?;
            let idle = match Self::deserialize::<AnswerHistory>(&raw) {
                Ok(history) => history.updated_at < cutoff,
                Err(e) => {
                    tracing::warn!(error = %e, "Dropping undecodable answer history");
                    true
                }
            };
            // Only remove the exact value we inspected, a concurrent append wins.
            if idle
                && self
                    .answer_history
                    .compare_and_swap(&key, Some(&raw), None::<Vec<u8>>)?
                    .is_ok()
            {
                removed += 1;
            }
        }
        Ok(removed)
    }
}
