pub mod keys;
pub mod migrate;
pub mod operations;
pub mod trees;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::Db;
use thiserror::Error;

use crate::constants::MAX_CAS_RETRIES;

#[derive(Debug)]
pub struct Store {
    db: Db,
    pub user_progress: sled::Tree,
    pub daily_quests: sled::Tree,
    pub roadmaps: sled::Tree,
    pub task_answers: sled::Tree,
    pub answer_history: sled::Tree,
    pub meta: sled::Tree,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("not found: entity={entity}, key={key}")]
    NotFound { entity: String, key: String },
    #[error("conflict: entity={entity}, key={key}")]
    Conflict { entity: String, key: String },
    #[error("CAS retry exhausted after {attempts} attempts: entity={entity}, key={key}")]
    CasRetryExhausted {
        entity: String,
        key: String,
        attempts: u32,
    },
    #[error("validation error: {0}")]
    Validation(String),
    #[error("migration error at version {version}: {message}")]
    Migration { version: u32, message: String },
}

impl StoreError {
    /// Contention and storage hiccups may succeed on a later attempt; everything else won't.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::CasRetryExhausted { .. } | Self::Sled(_))
    }
}

/// Result of a read-modify-write closure: whether the value must be written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation<R> {
    Changed(R),
    Unchanged(R),
}

impl<R> Mutation<R> {
    fn into_parts(self) -> (R, bool) {
        match self {
            Mutation::Changed(r) => (r, true),
            Mutation::Unchanged(r) => (r, false),
        }
    }
}

impl Store {
    pub fn open(sled_path: &str) -> Result<Self, StoreError> {
        let db = sled::open(sled_path)?;
        let user_progress = db.open_tree(trees::USER_PROGRESS)?;
        let daily_quests = db.open_tree(trees::DAILY_QUESTS)?;
        let roadmaps = db.open_tree(trees::ROADMAPS)?;
        let task_answers = db.open_tree(trees::TASK_ANSWERS)?;
        let answer_history = db.open_tree(trees::ANSWER_HISTORY)?;
        let meta = db.open_tree(trees::META)?;

        Ok(Self {
            db,
            user_progress,
            daily_quests,
            roadmaps,
            task_answers,
            answer_history,
            meta,
        })
    }

    pub fn run_migrations(&self) -> Result<(), StoreError> {
        migrate::run(self)
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    pub(crate) fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
        Ok(serde_json::to_vec(value)?)
    }

    pub(crate) fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Bounded optimistic read-modify-write of one key.
    ///
    /// `init` supplies the value used when the key is absent; returning `None` turns a
    /// missing key into `StoreError::NotFound`. A freshly initialized value is always
    /// persisted, an existing one only when the closure reports `Mutation::Changed`.
    /// The closure may run several times, so it must not have side effects outside the value.
    pub(crate) fn cas_update<T, R, I, F>(
        tree: &sled::Tree,
        entity: &str,
        key: &str,
        init: I,
        mut mutate: F,
    ) -> Result<(T, R), StoreError>
    where
        T: Serialize + DeserializeOwned,
        I: Fn() -> Option<T>,
        F: FnMut(&mut T) -> Mutation<R>,
    {
        for attempt in 1..=MAX_CAS_RETRIES {
            let current = tree.get(key.as_bytes())?;
            let (mut value, existed) = match current.as_ref() {
                Some(raw) => (Self::deserialize::<T>(raw)?, true),
                None => match init() {
                    Some(fresh) => (fresh, false),
                    None => {
                        return Err(StoreError::NotFound {
                            entity: entity.to_string(),
                            key: key.to_string(),
                        })
                    }
                },
            };

            let (out, changed) = mutate(&mut value).into_parts();
            if existed && !changed {
                return Ok((value, out));
            }

            let bytes = Self::serialize(&value)?;
            match tree.compare_and_swap(key.as_bytes(), current, Some(bytes))? {
                Ok(()) => return Ok((value, out)),
                Err(_) => {
                    tracing::debug!(entity, key, attempt, "CAS conflict, retrying");
                }
            }
        }

        Err(StoreError::CasRetryExhausted {
            entity: entity.to_string(),
            key: key.to_string(),
            attempts: MAX_CAS_RETRIES,
        })
    }

    /// Insert `value` only if `key` is absent; returns the value that ended up stored
    /// and whether this call wrote it.
    pub(crate) fn insert_if_absent<T>(
        tree: &sled::Tree,
        key: &str,
        value: &T,
    ) -> Result<(T, bool), StoreError>
    where
        T: Serialize + DeserializeOwned + Clone,
    {
        let bytes = Self::serialize(value)?;
        match tree.compare_and_swap(key.as_bytes(), None::<&[u8]>, Some(bytes))? {
            Ok(()) => Ok((value.clone(), true)),
            Err(cas) => match cas.current {
                Some(existing) => Ok((Self::deserialize(&existing)?, false)),
                // The competing writer removed the key again; ours is the value to report.
                None => Ok((value.clone(), false)),
            },
        }
    }
}
