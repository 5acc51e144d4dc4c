pub const USER_PROGRESS: &str = "user_progress";
pub const DAILY_QUESTS: &str = "daily_quests";
pub const ROADMAPS: &str = "roadmaps";
pub const TASK_ANSWERS: &str = "task_answers";
pub const ANSWER_HISTORY: &str = "answer_history";
pub const META: &str = "meta";
