use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::OwnedMutexGuard;

use crate::rewards::actions::{self, ResolvedAction};
use crate::rewards::badges::{self, BadgeContext};
use crate::rewards::clock::LocalClock;
use crate::rewards::error::RewardError;
use crate::rewards::locks::UserLocks;
use crate::rewards::streak;
use crate::rewards::types::{level_for_xp, Achievement, UserProgress};
use crate::store::{Mutation, Store};
use crate::validation::{validate_display_name, validate_identifier};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ActionOutcome {
    pub xp_gained: u32,
    pub new_xp: u64,
    pub new_level: u32,
    pub leveled_up: bool,
    pub current_streak: u32,
    pub new_badges: Vec<String>,
}

impl ActionOutcome {
    fn unchanged(progress: &UserProgress) -> Self {
        Self {
            xp_gained: 0,
            new_xp: progress.xp,
            new_level: progress.level,
            leveled_up: false,
            current_streak: progress.streak,
            new_badges: Vec::new(),
        }
    }
}

/// Applies one resolved action to a ledger in memory. This is the single place where XP,
/// level, achievements, streak and badges change; every write path goes through it.
pub(crate) fn apply_to_progress(
    progress: &mut UserProgress,
    action: &ResolvedAction,
    now: DateTime<Utc>,
    clock: &LocalClock,
) -> ActionOutcome {
    let old_level = progress.level;
    let xp = u64::from(action.xp);

    progress.xp = progress.xp.saturating_add(xp);
    progress.level = level_for_xp(progress.xp);
    progress.daily_xp.add(&clock.date_key(now), xp);
    progress.weekly_xp.add(&clock.week_key(now), xp);

    progress.achievements.push(Achievement {
        action: action.key.clone(),
        title: action.title.clone(),
        description: action.description.clone(),
        xp: action.xp,
        timestamp: now,
    });
    let count = progress.action_counts.entry(action.key.clone()).or_insert(0);
    *count = count.saturating_add(1);

    progress.streak =
        streak::after_action(progress.streak, progress.last_active, now, action.category, clock);
    progress.longest_streak = progress.longest_streak.max(progress.streak);
    progress.last_active = Some(now);
    progress.updated_at = now;

    let unlocked = badges::evaluate(&BadgeContext {
        progress: &*progress,
        category: action.category,
        local_hour: clock.local_hour(now),
    });
    let new_badges: Vec<String> = unlocked.iter().map(|b| b.as_str().to_string()).collect();
    progress.badges.extend(new_badges.iter().cloned());

    ActionOutcome {
        xp_gained: action.xp,
        new_xp: progress.xp,
        new_level: progress.level,
        leveled_up: progress.level > old_level,
        current_streak: progress.streak,
        new_badges,
    }
}

fn usable_display_name(display_name: Option<&str>) -> Option<&str> {
    display_name
        .map(str::trim)
        .filter(|name| validate_display_name(name).is_ok())
}

/// Per-user XP / level / streak / badge ledger backed by the `user_progress` tree.
pub struct StatsLedger {
    store: Arc<Store>,
    clock: LocalClock,
    locks: UserLocks,
}

impl StatsLedger {
    pub fn new(store: Arc<Store>, clock: LocalClock) -> Self {
        Self {
            store,
            clock,
            locks: UserLocks::new(),
        }
    }

    pub fn clock(&self) -> &LocalClock {
        &self.clock
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Serializes every ledger write for `user_id` within this process.
    pub(crate) async fn lock_user(&self, user_id: &str) -> OwnedMutexGuard<()> {
        self.locks.acquire(user_id).await
    }

    /// Passive read: lazily creates the ledger, refreshes the display name and breaks a
    /// stale streak. Writes only when something changed.
    pub async fn snapshot(
        &self,
        user_id: &str,
        display_name: Option<&str>,
    ) -> Result<UserProgress, RewardError> {
        validate_identifier("userId", user_id).map_err(RewardError::Validation)?;
        let display_name = usable_display_name(display_name);

        let _guard = self.lock_user(user_id).await;
        let now = Utc::now();
        let clock = self.clock;
        let (progress, ()) = self.store.update_progress(user_id, now, |p| {
            let mut changed = false;
            if let Some(name) = display_name {
                if p.display_name.as_deref() != Some(name) {
                    p.display_name = Some(name.to_string());
                    changed = true;
                }
            }
            let streak = streak::on_read(p.streak, p.last_active, now, &clock);
            if streak != p.streak {
                p.streak = streak;
                changed = true;
            }
            if changed {
                p.updated_at = now;
                Mutation::Changed(())
            } else {
                Mutation::Unchanged(())
            }
        })?;
        Ok(progress)
    }

    /// Copies the caller's display name onto an existing ledger after a write path created
    /// or touched it. Never creates a ledger and never fails the request.
    pub async fn refresh_display_name(&self, user_id: &str, display_name: Option<&str>) {
        let Some(name) = usable_display_name(display_name) else {
            return;
        };

        let _guard = self.lock_user(user_id).await;
        let result = self.store.update_existing_progress(user_id, |p| {
            if p.display_name.as_deref() == Some(name) {
                Mutation::Unchanged(())
            } else {
                p.display_name = Some(name.to_string());
                Mutation::Changed(())
            }
        });
        if let Err(e) = result {
            tracing::warn!(user_id, error = %e, "Failed to refresh display name");
        }
    }

    pub async fn apply_action(
        &self,
        user_id: &str,
        action: &str,
        explicit_value: Option<u32>,
    ) -> Result<ActionOutcome, RewardError> {
        self.apply_action_at(user_id, action, explicit_value, Utc::now())
            .await
    }

    pub async fn apply_action_at(
        &self,
        user_id: &str,
        action: &str,
        explicit_value: Option<u32>,
        now: DateTime<Utc>,
    ) -> Result<ActionOutcome, RewardError> {
        validate_identifier("userId", user_id).map_err(RewardError::Validation)?;
        let Some(resolved) = actions::resolve(action, explicit_value)? else {
            tracing::debug!(user_id, action, "Unknown action without value, nothing to record");
            let current = self.store.get_progress(user_id)?;
            return Ok(current
                .map(|p| ActionOutcome::unchanged(&p))
                .unwrap_or_else(|| ActionOutcome::unchanged(&UserProgress::new(user_id, now))));
        };

        let _guard = self.lock_user(user_id).await;
        let clock = self.clock;
        let (_, outcome) = self.store.update_progress(user_id, now, |p| {
            Mutation::Changed(apply_to_progress(p, &resolved, now, &clock))
        })?;

        tracing::info!(
            user_id,
            action = %resolved.key,
            xp = outcome.xp_gained,
            level = outcome.new_level,
            streak = outcome.current_streak,
            badges = ?outcome.new_badges,
            "Reward applied"
        );
        Ok(outcome)
    }

    /// Secondary bookkeeping attached to a primary action: failures are logged, never returned.
    pub async fn apply_action_soft(
        &self,
        user_id: &str,
        action: &str,
        explicit_value: Option<u32>,
    ) -> Option<ActionOutcome> {
        match self.apply_action(user_id, action, explicit_value).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                tracing::warn!(user_id, action, error = %e, "Reward bookkeeping failed");
                None
            }
        }
    }
}
