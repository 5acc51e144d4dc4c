use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::constants::{MAX_EXPLICIT_XP, MAX_QUEST_INCREMENT, QUESTS_PER_DAY};
use crate::rewards::actions;
use crate::rewards::error::RewardError;
use crate::rewards::ledger::{apply_to_progress, ActionOutcome, StatsLedger};
use crate::rewards::types::{DailyQuestSet, QuestInstance, QuestType};
use crate::store::operations::daily_quests::ClaimRejection;
use crate::store::Mutation;
use crate::validation::validate_identifier;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestTemplate {
    pub id: String,
    pub title: String,
    pub description: String,
    pub quest_type: QuestType,
    pub target: u32,
    pub xp_reward: u32,
}

impl QuestTemplate {
    pub fn new(
        id: &str,
        title: &str,
        description: &str,
        quest_type: QuestType,
        target: u32,
        xp_reward: u32,
    ) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            quest_type,
            target,
            xp_reward,
        }
    }

    fn instantiate(&self) -> QuestInstance {
        QuestInstance {
            id: self.id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            target: self.target,
            xp_reward: self.xp_reward,
            quest_type: self.quest_type,
            progress: 0,
            completed: false,
            claimed: false,
        }
    }
}

/// A validated set of quest templates. Enough distinct types to fill a day is guaranteed.
#[derive(Debug, Clone)]
pub struct QuestCatalog {
    templates: Vec<QuestTemplate>,
}

impl QuestCatalog {
    pub fn new(templates: Vec<QuestTemplate>) -> Result<Self, RewardError> {
        let mut ids = HashSet::new();
        let mut types = HashSet::new();
        for t in &templates {
            validate_identifier("quest id", &t.id).map_err(RewardError::Validation)?;
            if !ids.insert(t.id.as_str()) {
                return Err(RewardError::validation(format!("duplicate quest id: {}", t.id)));
            }
            if t.target == 0 {
                return Err(RewardError::validation(format!("quest {} has zero target", t.id)));
            }
            if t.xp_reward > MAX_EXPLICIT_XP {
                return Err(RewardError::validation(format!(
                    "quest {} reward exceeds {MAX_EXPLICIT_XP}",
                    t.id
                )));
            }
            types.insert(t.quest_type);
        }
        if types.len() < QUESTS_PER_DAY {
            return Err(RewardError::validation(format!(
                "catalog needs at least {QUESTS_PER_DAY} quest types, got {}",
                types.len()
            )));
        }
        Ok(Self { templates })
    }

    pub fn templates(&self) -> &[QuestTemplate] {
        &self.templates
    }
}

static DEFAULT_TEMPLATES: Lazy<Vec<QuestTemplate>> = Lazy::new(|| {
    vec![
        QuestTemplate::new("chapter_sprint", "Chapter Sprint", "Complete 2 chapters", QuestType::CompleteChapters, 2, 30),
        QuestTemplate::new("chapter_marathon", "Chapter Marathon", "Complete 4 chapters", QuestType::CompleteChapters, 4, 60),
        QuestTemplate::new("sharp_mind", "Sharp Mind", "Answer 10 tasks correctly", QuestType::CorrectAnswers, 10, 20),
        QuestTemplate::new("quiz_whiz", "Quiz Whiz", "Answer 25 tasks correctly", QuestType::CorrectAnswers, 25, 45),
        QuestTemplate::new("xp_hunter", "XP Hunter", "Earn 50 XP", QuestType::EarnXp, 50, 25),
        QuestTemplate::new("xp_grinder", "XP Grinder", "Earn 150 XP", QuestType::EarnXp, 150, 50),
        QuestTemplate::new("flawless", "Flawless", "Finish a chapter without mistakes", QuestType::PerfectQuiz, 1, 35),
        QuestTemplate::new("explorer", "Explorer", "Open 3 courses", QuestType::ViewCourses, 3, 15),
        QuestTemplate::new("creator", "Creator", "Generate a new course", QuestType::GenerateCourse, 1, 20),
    ]
});

pub static DEFAULT_CATALOG: Lazy<QuestCatalog> = Lazy::new(|| QuestCatalog {
    templates: DEFAULT_TEMPLATES.clone(),
});

fn first_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    u64::from_be_bytes(buf)
}

/// First 8 bytes of SHA-256 over the date key.
pub fn quest_seed(date: &str) -> u64 {
    first_u64(&Sha256::digest(date.as_bytes()))
}

fn order_key(seed: u64, template_id: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(seed.to_be_bytes());
    hasher.update(template_id.as_bytes());
    first_u64(&hasher.finalize())
}

/// The day's quests: a pure function of the date key and the catalog. Templates are
/// ordered by a hash of (seed, id), ties by catalog position, and the first template of
/// each not yet seen type is taken.
pub fn select_quests<'a>(date: &str, catalog: &'a QuestCatalog) -> Vec<&'a QuestTemplate> {
    let seed = quest_seed(date);
    let mut ordered: Vec<(u64, usize, &QuestTemplate)> = catalog
        .templates()
        .iter()
        .enumerate()
        .map(|(index, t)| (order_key(seed, &t.id), index, t))
        .collect();
    ordered.sort_by_key(|(key, index, _)| (*key, *index));

    let mut seen = HashSet::new();
    let mut chosen = Vec::with_capacity(QUESTS_PER_DAY);
    for (_, _, template) in ordered {
        if chosen.len() == QUESTS_PER_DAY {
            break;
        }
        if seen.insert(template.quest_type) {
            chosen.push(template);
        }
    }
    chosen
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyQuestView {
    pub date: String,
    pub quests: Vec<QuestInstance>,
    #[serde(rename = "totalXPEarned")]
    pub total_xp_earned: u32,
    pub all_completed: bool,
    pub all_claimed: bool,
}

impl From<DailyQuestSet> for DailyQuestView {
    fn from(set: DailyQuestSet) -> Self {
        Self {
            all_completed: set.all_completed(),
            all_claimed: set.all_claimed(),
            date: set.date,
            quests: set.quests,
            total_xp_earned: set.total_xp_earned,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimOutcome {
    pub quest_id: String,
    pub xp_reward: u32,
    pub reward: ActionOutcome,
    pub quests: DailyQuestView,
}

pub struct QuestScheduler {
    ledger: Arc<StatsLedger>,
    catalog: Arc<QuestCatalog>,
}

impl QuestScheduler {
    pub fn new(ledger: Arc<StatsLedger>, catalog: Arc<QuestCatalog>) -> Self {
        Self { ledger, catalog }
    }

    pub fn today(&self, now: DateTime<Utc>) -> String {
        self.ledger.clock().date_key(now)
    }

    /// Reads the day's set, materializing it on first access. Racing initializers
    /// converge on whichever write landed first.
    pub fn get_or_init(&self, user_id: &str, date: &str) -> Result<DailyQuestSet, RewardError> {
        validate_identifier("userId", user_id).map_err(RewardError::Validation)?;
        let store = self.ledger.store();
        if let Some(existing) = store.get_daily_quests(user_id, date)? {
            return Ok(existing);
        }

        let set = DailyQuestSet {
            user_id: user_id.to_string(),
            date: date.to_string(),
            quests: select_quests(date, &self.catalog)
                .into_iter()
                .map(QuestTemplate::instantiate)
                .collect(),
            total_xp_earned: 0,
            created_at: Utc::now(),
        };
        let (stored, created) = store.insert_daily_quests_if_absent(&set)?;
        if created {
            tracing::debug!(user_id, date, "Daily quests materialized");
        }
        Ok(stored)
    }

    pub fn update_progress(
        &self,
        user_id: &str,
        date: &str,
        quest_type: QuestType,
        increment: u32,
    ) -> Result<DailyQuestSet, RewardError> {
        if increment == 0 || increment > MAX_QUEST_INCREMENT {
            return Err(RewardError::validation(format!(
                "increment must be between 1 and {MAX_QUEST_INCREMENT}"
            )));
        }
        self.get_or_init(user_id, date)?;

        let (set, newly_completed) =
            self.ledger
                .store()
                .update_daily_quests(user_id, date, |set| {
                    let mut changed = false;
                    let mut newly_completed = Vec::new();
                    for quest in set
                        .quests
                        .iter_mut()
                        .filter(|q| q.quest_type == quest_type && !q.completed)
                    {
                        quest.progress = quest.progress.saturating_add(increment).min(quest.target);
                        quest.completed = quest.progress >= quest.target;
                        if quest.completed {
                            newly_completed.push(quest.id.clone());
                        }
                        changed = true;
                    }
                    if changed {
                        Mutation::Changed(newly_completed)
                    } else {
                        Mutation::Unchanged(newly_completed)
                    }
                })?;

        for quest_id in &newly_completed {
            tracing::info!(user_id, date, quest_id = %quest_id, "Daily quest completed");
        }
        Ok(set)
    }

    /// Marks a completed quest claimed and credits its reward to the ledger in one
    /// transaction; a second claim is rejected instead of paying twice.
    pub async fn claim(
        &self,
        user_id: &str,
        date: &str,
        quest_id: &str,
    ) -> Result<ClaimOutcome, RewardError> {
        if quest_id.trim().is_empty() {
            return Err(RewardError::validation("questId is required"));
        }
        self.get_or_init(user_id, date)?;

        let _guard = self.ledger.lock_user(user_id).await;
        let now = Utc::now();
        let clock = *self.ledger.clock();
        let commit = self.ledger.store().claim_daily_quest(
            user_id,
            date,
            quest_id,
            now,
            |progress, reward| {
                apply_to_progress(progress, &actions::quest_reward(reward), now, &clock)
            },
        )?;

        let commit = match commit {
            Ok(commit) => commit,
            Err(ClaimRejection::SetMissing | ClaimRejection::QuestMissing) => {
                return Err(RewardError::QuestNotFound(quest_id.to_string()))
            }
            Err(ClaimRejection::NotCompleted) => {
                return Err(RewardError::QuestNotCompleted(quest_id.to_string()))
            }
            Err(ClaimRejection::AlreadyClaimed) => {
                return Err(RewardError::AlreadyClaimed(quest_id.to_string()))
            }
        };

        let reward = commit.award;
        let xp_reward = reward.xp_gained;
        tracing::info!(user_id, date, quest_id, xp = xp_reward, "Daily quest claimed");

        Ok(ClaimOutcome {
            quest_id: quest_id.to_string(),
            xp_reward,
            reward,
            quests: commit.quests.into(),
        })
    }
}
