use std::collections::{BTreeMap, BTreeSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::XP_PER_LEVEL;

/// `⌊xp / 500⌋ + 1`
pub fn level_for_xp(xp: u64) -> u32 {
    u32::try_from(xp / XP_PER_LEVEL)
        .unwrap_or(u32::MAX - 1)
        .saturating_add(1)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub action: String,
    pub title: String,
    pub description: String,
    pub xp: u32,
    pub timestamp: DateTime<Utc>,
}

/// XP accumulated within one leaderboard period (a day key or an ISO week key).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WindowXp {
    pub period: String,
    pub xp: u64,
}

impl WindowXp {
    pub fn add(&mut self, period: &str, xp: u64) {
        if self.period != period {
            self.period = period.to_string();
            self.xp = 0;
        }
        self.xp = self.xp.saturating_add(xp);
    }

    /// XP for `period`, zero once the accumulator belongs to an older period.
    pub fn value_for(&self, period: &str) -> u64 {
        if self.period == period {
            self.xp
        } else {
            0
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProgress {
    pub user_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub xp: u64,
    pub level: u32,
    pub streak: u32,
    #[serde(default)]
    pub longest_streak: u32,
    pub badges: BTreeSet<String>,
    pub achievements: Vec<Achievement>,
    #[serde(default)]
    pub action_counts: BTreeMap<String, u32>,
    #[serde(default)]
    pub daily_xp: WindowXp,
    #[serde(default)]
    pub weekly_xp: WindowXp,
    pub last_active: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProgress {
    pub fn new(user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            display_name: None,
            xp: 0,
            level: level_for_xp(0),
            streak: 0,
            longest_streak: 0,
            badges: BTreeSet::new(),
            achievements: Vec::new(),
            action_counts: BTreeMap::new(),
            daily_xp: WindowXp::default(),
            weekly_xp: WindowXp::default(),
            last_active: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn action_count(&self, action: &str) -> u32 {
        self.action_counts.get(action).copied().unwrap_or(0)
    }

    pub fn courses_completed(&self) -> u32 {
        self.action_count("complete_course")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestType {
    CompleteChapters,
    CorrectAnswers,
    EarnXp,
    PerfectQuiz,
    ViewCourses,
    GenerateCourse,
}

impl QuestType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CompleteChapters => "complete_chapters",
            Self::CorrectAnswers => "correct_answers",
            Self::EarnXp => "earn_xp",
            Self::PerfectQuiz => "perfect_quiz",
            Self::ViewCourses => "view_courses",
            Self::GenerateCourse => "generate_course",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuestInstance {
    pub id: String,
    pub title: String,
    pub description: String,
    pub target: u32,
    pub xp_reward: u32,
    #[serde(rename = "type")]
    pub quest_type: QuestType,
    pub progress: u32,
    pub completed: bool,
    pub claimed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DailyQuestSet {
    pub user_id: String,
    pub date: String,
    pub quests: Vec<QuestInstance>,
    #[serde(rename = "totalXPEarned")]
    pub total_xp_earned: u32,
    pub created_at: DateTime<Utc>,
}

impl DailyQuestSet {
    pub fn all_completed(&self) -> bool {
        self.quests.iter().all(|q| q.completed)
    }

    pub fn all_claimed(&self) -> bool {
        self.quests.iter().all(|q| q.claimed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MatchPair {
    pub left: String,
    pub right: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TaskKind {
    #[default]
    MultipleChoice,
    TrueFalse,
    FreeText,
    Matching { pairs: Vec<MatchPair> },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub kind: TaskKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    pub id: String,
    pub title: String,
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Roadmap {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub chapters: Vec<Chapter>,
    #[serde(default)]
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

impl Roadmap {
    pub fn chapter(&self, chapter_id: &str) -> Option<&Chapter> {
        self.chapters.iter().find(|c| c.id == chapter_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskAnswer {
    pub user_id: String,
    pub roadmap_id: String,
    pub chapter_id: String,
    pub task_id: String,
    pub is_correct: bool,
    pub user_answer: serde_json::Value,
    pub xp_awarded: u32,
    pub answered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RecentAnswer {
    pub correct: bool,
    pub answered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerHistory {
    pub user_id: String,
    pub answers: VecDeque<RecentAnswer>,
    pub updated_at: DateTime<Utc>,
}

impl AnswerHistory {
    pub fn new(user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            answers: VecDeque::new(),
            updated_at: now,
        }
    }

    pub fn push(&mut self, answer: RecentAnswer, cap: usize) {
        self.answers.push_back(answer);
        while self.answers.len() > cap {
            self.answers.pop_front();
        }
        self.updated_at = answer.answered_at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_formula_boundaries() {
        assert_eq!(level_for_xp(0), 1);
        assert_eq!(level_for_xp(499), 1);
        assert_eq!(level_for_xp(500), 2);
        assert_eq!(level_for_xp(4_999), 10);
        assert_eq!(level_for_xp(u64::MAX), u32::MAX);
    }

    #[test]
    fn window_resets_on_new_period() {
        let mut w = WindowXp::default();
        w.add("2024-01-01", 10);
        w.add("2024-01-01", 5);
        assert_eq!(w.value_for("2024-01-01"), 15);
        assert_eq!(w.value_for("2024-01-02"), 0);
        w.add("2024-01-02", 3);
        assert_eq!(w.value_for("2024-01-02"), 3);
    }

    #[test]
    fn matching_task_kind_serializes_with_tag() {
        let task = Task {
            id: "t1".into(),
            prompt: "pair them".into(),
            kind: TaskKind::Matching {
                pairs: vec![MatchPair {
                    left: "a".into(),
                    right: "1".into(),
                }],
            },
        };
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["kind"]["type"], "matching");
        let back: Task = serde_json::from_value(json).unwrap();
        assert_eq!(back, task);
    }

    #[test]
    fn history_is_capped() {
        let now = Utc::now();
        let mut h = AnswerHistory::new("u1", now);
        for _ in 0..5 {
            h.push(
                RecentAnswer {
                    correct: true,
                    answered_at: now,
                },
                3,
            );
        }
        assert_eq!(h.answers.len(), 3);
    }

    #[test]
    fn quest_set_uses_total_xp_earned_field_name() {
        let set = DailyQuestSet {
            user_id: "u1".into(),
            date: "2024-01-01".into(),
            quests: vec![],
            total_xp_earned: 7,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&set).unwrap();
        assert_eq!(json["totalXPEarned"], 7);
    }
}
