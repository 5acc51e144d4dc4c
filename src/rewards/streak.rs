//! 连续学习天数状态机。纯函数，不访问存储。

use chrono::{DateTime, Utc};

use crate::rewards::actions::ActionCategory;
use crate::rewards::clock::LocalClock;

/// Streak after an action performed at `now`.
///
/// Learning actions advance the streak across consecutive local days and restart it at 1
/// after a gap. Other actions never break a streak; they only lift a zero streak to 1.
pub fn after_action(
    streak: u32,
    last_active: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    category: ActionCategory,
    clock: &LocalClock,
) -> u32 {
    if category == ActionCategory::Other {
        return streak.max(1);
    }

    let Some(last) = last_active else {
        return 1;
    };

    match clock.days_between(last, now) {
        // same day (or a clock that went backwards)
        d if d <= 0 => streak.max(1),
        1 => streak.saturating_add(1),
        _ => 1,
    }
}

/// Streak seen by a read at `now` without any new activity: a gap of more than one day
/// means the streak is already broken.
///
/// Intentionally not `after_action` run on a read: the gap branch there restarts at 1
/// because the action itself counts as a day of learning. A read is no learning, so a
/// broken streak reads as 0 until the next learning action lifts it to 1.
pub fn on_read(streak: u32, last_active: Option<DateTime<Utc>>, now: DateTime<Utc>, clock: &LocalClock) -> u32 {
    match last_active {
        Some(last) if clock.days_between(last, now) > 1 => 0,
        _ => streak,
    }
}
