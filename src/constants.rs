/// CAS（Compare-And-Swap）操作最大重试次数
pub const MAX_CAS_RETRIES: u32 = 20;

/// 每升一级所需 XP
pub const XP_PER_LEVEL: u64 = 500;

/// Upper bound for a caller-supplied XP override on a single action.
pub const MAX_EXPLICIT_XP: u32 = 1_000;

/// 连击窗口（秒）：超过该时长未答对则连击中断
pub const COMBO_WINDOW_SECS: i64 = 60;

/// XP per correctly matched pair in a matching task.
pub const MATCH_PAIR_XP: u32 = 2;

/// 匹配题最多配对数：满分配对奖励不能超过单次 XP 上限
pub const MAX_MATCH_PAIRS: usize = (MAX_EXPLICIT_XP / MATCH_PAIR_XP) as usize;

/// 每日任务数量
pub const QUESTS_PER_DAY: usize = 3;

/// Largest single progress increment accepted for a daily quest.
pub const MAX_QUEST_INCREMENT: u32 = 100;

/// 默认排行榜条数
pub const DEFAULT_LEADERBOARD_LIMIT: usize = 20;

/// 排行榜最大条数
pub const MAX_LEADERBOARD_LIMIT: usize = 100;

/// Number of recent answers kept per user for combo derivation.
pub const ANSWER_HISTORY_CAP: usize = 50;

/// Idle lock entries are pruned once the per-user lock map grows past this size.
pub const USER_LOCK_PRUNE_THRESHOLD: usize = 1_000;

/// Streak thresholds for the streak badges.
pub const STREAK_BADGE_WEEK: u32 = 7;
pub const STREAK_BADGE_MONTH: u32 = 30;

/// Level thresholds for the level badges.
pub const LEVEL_BADGE_RISING: u32 = 10;
pub const LEVEL_BADGE_LEGEND: u32 = 50;

/// Cumulative completion thresholds.
pub const SCHOLAR_COURSE_COMPLETIONS: u32 = 10;
pub const BOOKWORM_LESSON_COMPLETIONS: u32 = 100;
