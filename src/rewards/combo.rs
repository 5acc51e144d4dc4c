use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::constants::COMBO_WINDOW_SECS;
use crate::rewards::types::AnswerHistory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum ComboTier {
    None,
    Double,
    Triple,
    Quadruple,
    Quintuple,
}

impl ComboTier {
    pub fn for_streak(streak: u32) -> Self {
        match streak {
            0..=1 => Self::None,
            2..=4 => Self::Double,
            5..=9 => Self::Triple,
            10..=19 => Self::Quadruple,
            _ => Self::Quintuple,
        }
    }

    pub fn multiplier(self) -> u32 {
        match self {
            Self::None => 1,
            Self::Double => 2,
            Self::Triple => 3,
            Self::Quadruple => 4,
            Self::Quintuple => 5,
        }
    }
}

/// Consecutive-correct-answer counter with a 60 s inactivity window.
/// The multiplier is for display only and never feeds back into XP.
#[derive(Debug, Clone, Default)]
pub struct ComboTracker {
    streak: u32,
    last_correct: Option<DateTime<Utc>>,
}

impl ComboTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn streak(&self) -> u32 {
        self.streak
    }

    pub fn tier(&self) -> ComboTier {
        ComboTier::for_streak(self.streak)
    }

    pub fn multiplier(&self) -> u32 {
        self.tier().multiplier()
    }

    fn window() -> Duration {
        Duration::seconds(COMBO_WINDOW_SECS)
    }

    fn lapsed(&self, now: DateTime<Utc>) -> bool {
        self.last_correct
            .map(|last| now - last > Self::window())
            .unwrap_or(false)
    }

    /// Records a correct answer. Returns the new tier when this answer crossed into it.
    pub fn increment(&mut self, now: DateTime<Utc>) -> Option<ComboTier> {
        if self.lapsed(now) {
            self.reset();
        }
        let before = self.tier();
        self.streak = self.streak.saturating_add(1);
        self.last_correct = Some(now);
        let after = self.tier();
        (after > before).then_some(after)
    }

    pub fn reset(&mut self) {
        self.streak = 0;
        self.last_correct = None;
    }

    /// Drops the combo once the inactivity window has passed; true when it did.
    pub fn expire_if_idle(&mut self, now: DateTime<Utc>) -> bool {
        if self.lapsed(now) {
            self.reset();
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComboSnapshot {
    pub streak: u32,
    pub multiplier: u32,
    /// Set when the most recent answer entered a new tier.
    pub tier_up: Option<u32>,
}

/// Replays a user's recent answers to reconstruct the combo as of `now`.
pub fn combo_from_history(history: &AnswerHistory, now: DateTime<Utc>) -> ComboSnapshot {
    let mut tracker = ComboTracker::new();
    let mut tier_up = None;
    for answer in &history.answers {
        tier_up = if answer.correct {
            tracker.increment(answer.answered_at)
        } else {
            tracker.reset();
            None
        };
    }
    if tracker.expire_if_idle(now) {
        tier_up = None;
    }
    ComboSnapshot {
        streak: tracker.streak(),
        multiplier: tracker.multiplier(),
        tier_up: tier_up.map(ComboTier::multiplier),
    }
}
