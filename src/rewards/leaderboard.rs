use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::rewards::clock::LocalClock;
use crate::rewards::error::RewardError;
use crate::rewards::types::UserProgress;
use crate::store::Store;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LeaderboardWindow {
    Daily,
    Weekly,
    #[default]
    AllTime,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub id: String,
    pub name: String,
    pub xp: u64,
    pub level: u32,
    pub courses_completed: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RankChange {
    pub id: String,
    pub rank: usize,
    pub previous_rank: Option<usize>,
    /// previous − current; positive means the user moved up. `None` for newcomers.
    pub delta: Option<i64>,
}

fn window_xp(p: &UserProgress, window: LeaderboardWindow, clock: &LocalClock, now: DateTime<Utc>) -> u64 {
    match window {
        LeaderboardWindow::Daily => p.daily_xp.value_for(&clock.date_key(now)),
        LeaderboardWindow::Weekly => p.weekly_xp.value_for(&clock.week_key(now)),
        LeaderboardWindow::AllTime => p.xp,
    }
}

/// Ranks users by the window's XP, highest first. The sort is stable over the input
/// order, so equal scores keep user-id order when the input comes from a key scan.
pub fn rank_users(
    users: Vec<UserProgress>,
    window: LeaderboardWindow,
    clock: &LocalClock,
    now: DateTime<Utc>,
    limit: usize,
) -> Vec<LeaderboardEntry> {
    let mut scored: Vec<(u64, UserProgress)> = users
        .into_iter()
        .map(|p| (window_xp(&p, window, clock, now), p))
        .filter(|(xp, _)| window == LeaderboardWindow::AllTime || *xp > 0)
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));

    scored
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(index, (xp, p))| LeaderboardEntry {
            rank: index + 1,
            name: p.display_name.clone().unwrap_or_else(|| p.user_id.clone()),
            courses_completed: p.courses_completed(),
            id: p.user_id,
            xp,
            level: p.level,
        })
        .collect()
}

/// Rank deltas between two polls, in the order of `current`.
pub fn rank_changes<P, C>(previous: &[P], current: &[C]) -> Vec<RankChange>
where
    P: AsRef<str>,
    C: AsRef<str>,
{
    let before: HashMap<&str, usize> = previous
        .iter()
        .enumerate()
        .map(|(index, id)| (id.as_ref(), index + 1))
        .collect();

    current
        .iter()
        .enumerate()
        .map(|(index, id)| {
            let rank = index + 1;
            let previous_rank = before.get(id.as_ref()).copied();
            RankChange {
                id: id.as_ref().to_string(),
                rank,
                previous_rank,
                delta: previous_rank.map(|prev| prev as i64 - rank as i64),
            }
        })
        .collect()
}

pub struct Leaderboard {
    store: Arc<Store>,
    clock: LocalClock,
}

impl Leaderboard {
    pub fn new(store: Arc<Store>, clock: LocalClock) -> Self {
        Self { store, clock }
    }

    pub fn ranking(
        &self,
        window: LeaderboardWindow,
        limit: usize,
    ) -> Result<Vec<LeaderboardEntry>, RewardError> {
        let users = self.store.list_progress()?;
        Ok(rank_users(users, window, &self.clock, Utc::now(), limit))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn user(id: &str, xp: u64, daily: u64, day: &str) -> UserProgress {
        let mut p = UserProgress::new(id, Utc::now());
        p.xp = xp;
        p.daily_xp.add(day, daily);
        p
    }

    #[test]
    fn all_time_sorted_with_stable_ties() {
        let clock = LocalClock::default();
        let now = Utc::now();
        let users = vec![user("a", 10, 0, "x"), user("b", 30, 0, "x"), user("c", 10, 0, "x")];

        let ranked = rank_users(users, LeaderboardWindow::AllTime, &clock, now, 10);
        let ids: Vec<&str> = ranked.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[2].rank, 3);
    }

    #[test]
    fn daily_window_uses_current_day_only() {
        let clock = LocalClock::default();
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        let users = vec![
            user("a", 500, 5, "2024-06-15"),
            user("b", 900, 40, "2024-06-14"),
            user("c", 10, 8, "2024-06-15"),
        ];

        let ranked = rank_users(users, LeaderboardWindow::Daily, &clock, now, 10);
        let ids: Vec<(&str, u64)> = ranked.iter().map(|e| (e.id.as_str(), e.xp)).collect();
        assert_eq!(ids, vec![("c", 8), ("a", 5)]);
    }

    #[test]
    fn limit_truncates() {
        let clock = LocalClock::default();
        let users = (0..5).map(|i| user(&format!("u{i}"), i, 0, "x")).collect();
        assert_eq!(rank_users(users, LeaderboardWindow::AllTime, &clock, Utc::now(), 2).len(), 2);
    }

    #[test]
    fn rank_changes_report_signed_deltas() {
        let previous = ["a", "b", "c"];
        let current = ["c", "a", "d"];
        let changes = rank_changes(&previous, &current);

        assert_eq!(changes[0].delta, Some(2));
        assert_eq!(changes[1].delta, Some(-1));
        assert_eq!(changes[2].delta, None);
        assert_eq!(changes[2].previous_rank, None);
    }

    #[test]
    fn window_serde_names() {
        let w: LeaderboardWindow = serde_json::from_str("\"allTime\"").unwrap();
        assert_eq!(w, LeaderboardWindow::AllTime);
        let w: LeaderboardWindow = serde_json::from_str("\"weekly\"").unwrap();
        assert_eq!(w, LeaderboardWindow::Weekly);
    }
}
