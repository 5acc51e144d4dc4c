use chrono::NaiveDate;

use crate::store::StoreError;

const MAX_KEY_COMPONENT_LEN: usize = 128;

/// Key components are joined with `:`, so a component must never contain one.
fn component<'a>(name: &str, value: &'a str) -> Result<&'a str, StoreError> {
    if value.is_empty() {
        return Err(StoreError::Validation(format!("{name} must not be empty")));
    }
    if value.len() > MAX_KEY_COMPONENT_LEN {
        return Err(StoreError::Validation(format!(
            "{name} exceeds {MAX_KEY_COMPONENT_LEN} bytes"
        )));
    }
    if value.contains(':') {
        return Err(StoreError::Validation(format!("{name} must not contain ':'")));
    }
    Ok(value)
}

pub fn progress_key(user_id: &str) -> Result<String, StoreError> {
    Ok(component("user_id", user_id)?.to_string())
}

pub fn daily_quest_key(user_id: &str, date: &str) -> Result<String, StoreError> {
    Ok(format!(
        "{}:{}",
        component("user_id", user_id)?,
        component("date", date)?
    ))
}

/// Calendar day encoded in a daily quest key (`{user_id}:{YYYY-MM-DD}`).
pub fn parse_daily_quest_date(key: &[u8]) -> Option<NaiveDate> {
    let key = std::str::from_utf8(key).ok()?;
    let (_, date) = key.rsplit_once(':')?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

pub fn roadmap_key(user_id: &str, roadmap_id: &str) -> Result<String, StoreError> {
    Ok(format!(
        "{}:{}",
        component("user_id", user_id)?,
        component("roadmap_id", roadmap_id)?
    ))
}

pub fn task_answer_key(
    user_id: &str,
    roadmap_id: &str,
    chapter_id: &str,
    task_id: &str,
) -> Result<String, StoreError> {
    Ok(format!(
        "{}{}",
        task_answer_chapter_prefix(user_id, roadmap_id, chapter_id)?,
        component("task_id", task_id)?
    ))
}

pub fn task_answer_chapter_prefix(
    user_id: &str,
    roadmap_id: &str,
    chapter_id: &str,
) -> Result<String, StoreError> {
    Ok(format!(
        "{}{}:",
        task_answer_roadmap_prefix(user_id, roadmap_id)?,
        component("chapter_id", chapter_id)?
    ))
}

pub fn task_answer_roadmap_prefix(user_id: &str, roadmap_id: &str) -> Result<String, StoreError> {
    Ok(format!(
        "{}:{}:",
        component("user_id", user_id)?,
        component("roadmap_id", roadmap_id)?
    ))
}

pub fn answer_history_key(user_id: &str) -> Result<String, StoreError> {
    progress_key(user_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colon_in_component_is_rejected() {
        let err = daily_quest_key("u:1", "2024-01-01").unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert!(progress_key("").is_err());
    }

    #[test]
    fn chapter_prefix_is_prefix_of_task_key() {
        let prefix = task_answer_chapter_prefix("u1", "r1", "c1").unwrap();
        let key = task_answer_key("u1", "r1", "c1", "t1").unwrap();
        assert!(key.starts_with(&prefix));
        assert!(prefix.starts_with(&task_answer_roadmap_prefix("u1", "r1").unwrap()));
        // c1 must not match c10
        let other = task_answer_key("u1", "r1", "c10", "t1").unwrap();
        assert!(!other.starts_with(&prefix));
    }

    #[test]
    fn daily_quest_date_round_trips_through_key() {
        let key = daily_quest_key("u1", "2024-03-09").unwrap();
        assert_eq!(
            parse_daily_quest_date(key.as_bytes()),
            NaiveDate::from_ymd_opt(2024, 3, 9)
        );
        assert_eq!(parse_daily_quest_date(b"garbage"), None);
    }
}
