use serde::{Deserialize, Serialize};

use crate::constants::MAX_EXPLICIT_XP;
use crate::rewards::error::RewardError;

/// Reward-triggering actions with a fixed XP value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    CompleteChapter,
    CompleteCourse,
    CompleteLesson,
    CorrectAnswer,
    PerfectQuiz,
    GenerateCourse,
    ViewCourse,
    ClaimQuest,
}

/// Learning actions drive the streak state machine; other actions only keep it alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionCategory {
    Learning,
    Other,
}

impl Action {
    pub const ALL: [Action; 8] = [
        Action::CompleteChapter,
        Action::CompleteCourse,
        Action::CompleteLesson,
        Action::CorrectAnswer,
        Action::PerfectQuiz,
        Action::GenerateCourse,
        Action::ViewCourse,
        Action::ClaimQuest,
    ];

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == raw)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CompleteChapter => "complete_chapter",
            Self::CompleteCourse => "complete_course",
            Self::CompleteLesson => "complete_lesson",
            Self::CorrectAnswer => "correct_answer",
            Self::PerfectQuiz => "perfect_quiz",
            Self::GenerateCourse => "generate_course",
            Self::ViewCourse => "view_course",
            Self::ClaimQuest => "claim_quest",
        }
    }

    pub fn base_xp(self) -> u32 {
        match self {
            Self::CompleteChapter => 5,
            Self::CompleteCourse => 50,
            Self::CompleteLesson => 3,
            Self::CorrectAnswer => 1,
            Self::PerfectQuiz => 2,
            Self::GenerateCourse => 10,
            Self::ViewCourse => 0,
            // quest rewards always arrive as an explicit value
            Self::ClaimQuest => 0,
        }
    }

    pub fn category(self) -> ActionCategory {
        match self {
            Self::ClaimQuest => ActionCategory::Other,
            _ => ActionCategory::Learning,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::CompleteChapter => "Chapter Complete",
            Self::CompleteCourse => "Course Complete",
            Self::CompleteLesson => "Lesson Complete",
            Self::CorrectAnswer => "Correct Answer",
            Self::PerfectQuiz => "Perfect Quiz",
            Self::GenerateCourse => "Course Created",
            Self::ViewCourse => "Course Viewed",
            Self::ClaimQuest => "Quest Reward",
        }
    }

    fn description(self, xp: u32) -> String {
        match self {
            Self::CompleteChapter => format!("Finished a chapter (+{xp} XP)"),
            Self::CompleteCourse => format!("Finished every chapter of a course (+{xp} XP)"),
            Self::CompleteLesson => format!("Finished a lesson (+{xp} XP)"),
            Self::CorrectAnswer => format!("Answered a task correctly (+{xp} XP)"),
            Self::PerfectQuiz => format!("Answered every task of a chapter correctly (+{xp} XP)"),
            Self::GenerateCourse => format!("Generated a new course (+{xp} XP)"),
            Self::ViewCourse => "Opened a course".to_string(),
            Self::ClaimQuest => format!("Claimed a daily quest (+{xp} XP)"),
        }
    }
}

/// An action after table lookup and override handling, ready to be applied to a ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAction {
    pub key: String,
    pub action: Option<Action>,
    pub category: ActionCategory,
    pub xp: u32,
    pub title: String,
    pub description: String,
}

fn known(action: Action, xp: u32) -> ResolvedAction {
    ResolvedAction {
        key: action.as_str().to_string(),
        action: Some(action),
        category: action.category(),
        xp,
        title: action.title().to_string(),
        description: action.description(xp),
    }
}

/// Quest rewards come from the validated catalog, not from the caller.
pub fn quest_reward(xp: u32) -> ResolvedAction {
    known(Action::ClaimQuest, xp)
}

/// `Ok(None)` means an unknown action without an explicit value: nothing to record.
pub fn resolve(raw: &str, explicit: Option<u32>) -> Result<Option<ResolvedAction>, RewardError> {
    let key = raw.trim();
    if key.is_empty() {
        return Err(RewardError::validation("action is required"));
    }
    if let Some(value) = explicit {
        if value > MAX_EXPLICIT_XP {
            return Err(RewardError::validation(format!(
                "value must be at most {MAX_EXPLICIT_XP}"
            )));
        }
    }

    let resolved = match (Action::parse(key), explicit) {
        (Some(action), _) => known(action, explicit.unwrap_or_else(|| action.base_xp())),
        (None, Some(xp)) => ResolvedAction {
            key: key.to_string(),
            action: None,
            category: ActionCategory::Other,
            xp,
            title: "Bonus XP".to_string(),
            description: format!("{key} (+{xp} XP)"),
        },
        (None, None) => return Ok(None),
    };
    Ok(Some(resolved))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_values() {
        let chapter = resolve("complete_chapter", None).unwrap().unwrap();
        assert_eq!(chapter.xp, 5);
        assert_eq!(chapter.category, ActionCategory::Learning);

        let course = resolve("complete_course", None).unwrap().unwrap();
        assert_eq!(course.xp, 50);
        assert_eq!(resolve("generate_course", None).unwrap().unwrap().xp, 10);
        assert_eq!(resolve("perfect_quiz", None).unwrap().unwrap().xp, 2);
    }

    #[test]
    fn explicit_value_overrides_table() {
        let partial = resolve("correct_answer", Some(6)).unwrap().unwrap();
        assert_eq!(partial.xp, 6);
        assert_eq!(partial.action, Some(Action::CorrectAnswer));
    }

    #[test]
    fn unknown_action_without_value_is_noop() {
        assert!(resolve("dance", None).unwrap().is_none());
    }

    #[test]
    fn unknown_action_with_value_is_bonus() {
        let bonus = resolve("event_bonus", Some(25)).unwrap().unwrap();
        assert_eq!(bonus.title, "Bonus XP");
        assert_eq!(bonus.category, ActionCategory::Other);
    }

    #[test]
    fn oversized_or_empty_input_is_rejected() {
        assert!(matches!(
            resolve("correct_answer", Some(MAX_EXPLICIT_XP + 1)),
            Err(RewardError::Validation(_))
        ));
        assert!(matches!(resolve("  ", None), Err(RewardError::Validation(_))));
    }

    #[test]
    fn claim_quest_is_not_a_learning_action() {
        assert_eq!(Action::ClaimQuest.category(), ActionCategory::Other);
        assert_eq!(Action::parse("claim_quest"), Some(Action::ClaimQuest));
    }
}
