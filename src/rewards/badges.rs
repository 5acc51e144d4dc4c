use serde::Serialize;

use crate::constants::{
    BOOKWORM_LESSON_COMPLETIONS, LEVEL_BADGE_LEGEND, LEVEL_BADGE_RISING, SCHOLAR_COURSE_COMPLETIONS,
    STREAK_BADGE_MONTH, STREAK_BADGE_WEEK,
};
use crate::rewards::actions::{Action, ActionCategory};
use crate::rewards::types::UserProgress;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BadgeId {
    FirstSteps,
    Perfectionist,
    Streak7,
    Streak30,
    Level10,
    Level50,
    NightOwl,
    EarlyBird,
    Scholar,
    Bookworm,
}

impl BadgeId {
    pub const ALL: [BadgeId; 10] = [
        BadgeId::FirstSteps,
        BadgeId::Perfectionist,
        BadgeId::Streak7,
        BadgeId::Streak30,
        BadgeId::Level10,
        BadgeId::Level50,
        BadgeId::NightOwl,
        BadgeId::EarlyBird,
        BadgeId::Scholar,
        BadgeId::Bookworm,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::FirstSteps => "first_steps",
            Self::Perfectionist => "perfectionist",
            Self::Streak7 => "streak_7",
            Self::Streak30 => "streak_30",
            Self::Level10 => "level_10",
            Self::Level50 => "level_50",
            Self::NightOwl => "night_owl",
            Self::EarlyBird => "early_bird",
            Self::Scholar => "scholar",
            Self::Bookworm => "bookworm",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::FirstSteps => "First Steps",
            Self::Perfectionist => "Perfectionist",
            Self::Streak7 => "Week Warrior",
            Self::Streak30 => "Monthly Master",
            Self::Level10 => "Rising Star",
            Self::Level50 => "Legend",
            Self::NightOwl => "Night Owl",
            Self::EarlyBird => "Early Bird",
            Self::Scholar => "Scholar",
            Self::Bookworm => "Bookworm",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::FirstSteps => "Complete your first lesson, chapter or course",
            Self::Perfectionist => "Answer every task of a chapter correctly",
            Self::Streak7 => "Learn 7 days in a row",
            Self::Streak30 => "Learn 30 days in a row",
            Self::Level10 => "Reach level 10",
            Self::Level50 => "Reach level 50",
            Self::NightOwl => "Learn between midnight and 4 AM",
            Self::EarlyBird => "Learn between 4 AM and 6 AM",
            Self::Scholar => "Complete 10 courses",
            Self::Bookworm => "Complete 100 lessons or chapters",
        }
    }
}

/// What the rules look at: the ledger after the mutation plus the category and local
/// hour of the action that caused it.
#[derive(Debug, Clone, Copy)]
pub struct BadgeContext<'a> {
    pub progress: &'a UserProgress,
    pub category: ActionCategory,
    pub local_hour: u32,
}

fn earned(badge: BadgeId, ctx: &BadgeContext<'_>) -> bool {
    let p = ctx.progress;
    let lesson_like = p.action_count(Action::CompleteLesson.as_str())
        .saturating_add(p.action_count(Action::CompleteChapter.as_str()));
    let learning = ctx.category == ActionCategory::Learning;

    match badge {
        BadgeId::FirstSteps => lesson_like.saturating_add(p.courses_completed()) >= 1,
        BadgeId::Perfectionist => p.action_count(Action::PerfectQuiz.as_str()) >= 1,
        BadgeId::Streak7 => p.streak >= STREAK_BADGE_WEEK,
        BadgeId::Streak30 => p.streak >= STREAK_BADGE_MONTH,
        BadgeId::Level10 => p.level >= LEVEL_BADGE_RISING,
        BadgeId::Level50 => p.level >= LEVEL_BADGE_LEGEND,
        BadgeId::NightOwl => learning && ctx.local_hour < 4,
        BadgeId::EarlyBird => learning && (4..6).contains(&ctx.local_hour),
        BadgeId::Scholar => p.courses_completed() >= SCHOLAR_COURSE_COMPLETIONS,
        BadgeId::Bookworm => lesson_like >= BOOKWORM_LESSON_COMPLETIONS,
    }
}

/// Badges whose predicate holds and which the user does not hold yet, in catalog order.
pub fn evaluate(ctx: &BadgeContext<'_>) -> Vec<BadgeId> {
    BadgeId::ALL
        .into_iter()
        .filter(|badge| !ctx.progress.badges.contains(badge.as_str()))
        .filter(|badge| earned(*badge, ctx))
        .collect()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeStatus {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub unlocked: bool,
}

pub fn catalog_for(progress: &UserProgress) -> Vec<BadgeStatus> {
    BadgeId::ALL
        .into_iter()
        .map(|badge| BadgeStatus {
            id: badge.as_str(),
            name: badge.name(),
            description: badge.description(),
            unlocked: progress.badges.contains(badge.as_str()),
        })
        .collect()
}
