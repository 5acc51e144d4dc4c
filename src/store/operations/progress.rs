use chrono::{DateTime, Utc};

use crate::rewards::types::UserProgress;
use crate::store::keys;
use crate::store::{Mutation, Store, StoreError};

impl Store {
    pub fn get_progress(&self, user_id: &str) -> Result<Option<UserProgress>, StoreError> {
        let key = keys::progress_key(user_id)?;
        match self.user_progress.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    /// Atomic read-modify-write of a user's ledger, creating it with defaults on first touch.
    pub fn update_progress<R, F>(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
        mutate: F,
    ) -> Result<(UserProgress, R), StoreError>
    where
        F: FnMut(&mut UserProgress) -> Mutation<R>,
    {
        let key = keys::progress_key(user_id)?;
        Self::cas_update(
            &self.user_progress,
            "user_progress",
            &key,
            || Some(UserProgress::new(user_id, now)),
            mutate,
        )
    }

    /// Like `update_progress`, but leaves a missing ledger missing and returns `None`.
    pub fn update_existing_progress<R, F>(
        &self,
        user_id: &str,
        mutate: F,
    ) -> Result<Option<(UserProgress, R)>, StoreError>
    where
        F: FnMut(&mut UserProgress) -> Mutation<R>,
    {
        let key = keys::progress_key(user_id)?;
        match Self::cas_update(&self.user_progress, "user_progress", &key, || None, mutate) {
            Ok(updated) => Ok(Some(updated)),
            Err(StoreError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Full scan in key (user id) order. Undecodable rows are skipped with a warning.
    pub fn list_progress(&self) -> Result<Vec<UserProgress>, StoreError> {
        let mut out = Vec::new();
        for item in self.user_progress.iter() {
            let (key, raw) = item?;
            match Self::deserialize::<UserProgress>(&raw) {
                Ok(progress) => out.push(progress),
                Err(e) => {
                    tracing::warn!(
                        key = %String::from_utf8_lossy(&key),
                        error = %e,
                        "Skipping undecodable progress row"
                    );
                }
            }
        }
        Ok(out)
    }
}
