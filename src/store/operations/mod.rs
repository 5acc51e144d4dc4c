pub mod answers;
pub mod daily_quests;
pub mod progress;
pub mod roadmaps;
