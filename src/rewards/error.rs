use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum RewardError {
    #[error("{0}")]
    Validation(String),
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },
    #[error("quest not found: {0}")]
    QuestNotFound(String),
    #[error("quest not completed: {0}")]
    QuestNotCompleted(String),
    #[error("quest already claimed: {0}")]
    AlreadyClaimed(String),
    #[error("store busy: {0}")]
    Transient(String),
    #[error(transparent)]
    Store(StoreError),
}

impl RewardError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(entity: &str, id: &str) -> Self {
        Self::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    /// Only contention and storage hiccups are worth retrying; business-rule rejections never are.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<StoreError> for RewardError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Validation(message) => Self::Validation(message),
            StoreError::NotFound { entity, key } => Self::NotFound { entity, id: key },
            other if other.is_transient() => Self::Transient(other.to_string()),
            other => Self::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_are_classified() {
        let busy: RewardError = StoreError::CasRetryExhausted {
            entity: "user_progress".into(),
            key: "u1".into(),
            attempts: 20,
        }
        .into();
        assert!(busy.is_retryable());

        let invalid: RewardError = StoreError::Validation("user_id must not be empty".into()).into();
        assert!(matches!(invalid, RewardError::Validation(_)));
        assert!(!invalid.is_retryable());

        let missing: RewardError = StoreError::NotFound {
            entity: "roadmap".into(),
            key: "u1:r1".into(),
        }
        .into();
        assert!(matches!(missing, RewardError::NotFound { .. }));
    }

    #[test]
    fn conflicts_are_not_retryable() {
        assert!(!RewardError::AlreadyClaimed("q1".into()).is_retryable());
        assert!(!RewardError::QuestNotCompleted("q1".into()).is_retryable());
    }
}
