use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::{ANSWER_HISTORY_CAP, MATCH_PAIR_XP, MAX_EXPLICIT_XP, MAX_MATCH_PAIRS};
use crate::rewards::actions::Action;
use crate::rewards::combo::{combo_from_history, ComboSnapshot};
use crate::rewards::error::RewardError;
use crate::rewards::ledger::{ActionOutcome, StatsLedger};
use crate::rewards::types::{
    AnswerHistory, Chapter, MatchPair, RecentAnswer, Roadmap, Task, TaskAnswer, TaskKind,
};
use crate::store::Mutation;
use crate::validation::validate_identifier;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeRequest {
    pub roadmap_id: String,
    pub chapter_id: String,
    pub task_id: String,
    #[serde(default)]
    pub is_correct: bool,
    #[serde(default)]
    pub user_answer: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeOutcome {
    pub is_correct: bool,
    pub xp_awarded: u32,
    pub already_answered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_pairs: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_pairs: Option<u32>,
    pub reward: Option<ActionOutcome>,
    pub combo: ComboSnapshot,
    pub chapter_completed: bool,
    pub course_completed: bool,
    pub completion_rewards: Vec<ActionOutcome>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchGrade {
    pub correct: u32,
    pub total: u32,
}

impl MatchGrade {
    pub fn all_correct(&self) -> bool {
        self.total > 0 && self.correct == self.total
    }
}

/// Grades a matching answer given as an object `{ left: right, ... }`. Anything else
/// counts as zero correct pairs.
pub fn grade_matching(pairs: &[MatchPair], answer: &Value) -> MatchGrade {
    let total = u32::try_from(pairs.len()).unwrap_or(u32::MAX);
    let Some(given) = answer.as_object() else {
        return MatchGrade { correct: 0, total };
    };
    let correct = pairs
        .iter()
        .filter(|pair| given.get(&pair.left).and_then(Value::as_str) == Some(pair.right.as_str()))
        .count();
    MatchGrade {
        correct: u32::try_from(correct).unwrap_or(u32::MAX),
        total,
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterInput {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoadmapInput {
    pub id: String,
    pub title: String,
    pub chapters: Vec<ChapterInput>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoadmapView {
    #[serde(flatten)]
    pub roadmap: Roadmap,
    pub answered_task_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterOutcome {
    pub roadmap: Roadmap,
    pub created: bool,
    pub reward: Option<ActionOutcome>,
}

fn validate_roadmap(input: &RoadmapInput) -> Result<(), RewardError> {
    validate_identifier("roadmapId", &input.id).map_err(RewardError::Validation)?;
    if input.title.trim().is_empty() {
        return Err(RewardError::validation("title is required"));
    }
    if input.chapters.is_empty() {
        return Err(RewardError::validation("a roadmap needs at least one chapter"));
    }
    let mut chapter_ids = HashSet::new();
    for chapter in &input.chapters {
        validate_identifier("chapterId", &chapter.id).map_err(RewardError::Validation)?;
        if !chapter_ids.insert(chapter.id.as_str()) {
            return Err(RewardError::validation(format!("duplicate chapter id: {}", chapter.id)));
        }
        // 没有任务的章节永远无法完成，课程奖励也就永远不会发放
        if chapter.tasks.is_empty() {
            return Err(RewardError::validation(format!(
                "chapter {} needs at least one task",
                chapter.id
            )));
        }
        let mut task_ids = HashSet::new();
        for task in &chapter.tasks {
            validate_identifier("taskId", &task.id).map_err(RewardError::Validation)?;
            if !task_ids.insert(task.id.as_str()) {
                return Err(RewardError::validation(format!("duplicate task id: {}", task.id)));
            }
            if let TaskKind::Matching { pairs } = &task.kind {
                if pairs.len() > MAX_MATCH_PAIRS {
                    return Err(RewardError::validation(format!(
                        "task {} has more than {MAX_MATCH_PAIRS} pairs",
                        task.id
                    )));
                }
            }
        }
    }
    Ok(())
}

/// Grades roadmap tasks and fires the completion rewards that follow from them.
pub struct TaskGrader {
    ledger: Arc<StatsLedger>,
}

impl TaskGrader {
    pub fn new(ledger: Arc<StatsLedger>) -> Self {
        Self { ledger }
    }

    pub async fn register_roadmap(
        &self,
        user_id: &str,
        input: RoadmapInput,
    ) -> Result<RegisterOutcome, RewardError> {
        validate_identifier("userId", user_id).map_err(RewardError::Validation)?;
        validate_roadmap(&input)?;

        let roadmap = Roadmap {
            id: input.id,
            user_id: user_id.to_string(),
            title: input.title.trim().to_string(),
            chapters: input
                .chapters
                .into_iter()
                .map(|c| Chapter {
                    id: c.id,
                    title: c.title,
                    tasks: c.tasks,
                    completed: false,
                })
                .collect(),
            completed: false,
            created_at: Utc::now(),
        };

        let (stored, created) = self.ledger.store().insert_roadmap_if_absent(&roadmap)?;
        let reward = if created {
            tracing::info!(user_id, roadmap_id = %stored.id, "Roadmap registered");
            self.ledger
                .apply_action_soft(user_id, Action::GenerateCourse.as_str(), None)
                .await
        } else {
            None
        };

        Ok(RegisterOutcome {
            roadmap: stored,
            created,
            reward,
        })
    }

    pub fn roadmap_view(&self, user_id: &str, roadmap_id: &str) -> Result<RoadmapView, RewardError> {
        let store = self.ledger.store();
        let roadmap = store
            .get_roadmap(user_id, roadmap_id)?
            .ok_or_else(|| RewardError::not_found("roadmap", roadmap_id))?;
        let answered_task_ids = store
            .list_roadmap_answers(user_id, roadmap_id)?
            .into_iter()
            .map(|a| a.task_id)
            .collect();
        Ok(RoadmapView {
            roadmap,
            answered_task_ids,
        })
    }

    pub async fn grade_task(
        &self,
        user_id: &str,
        req: GradeRequest,
    ) -> Result<GradeOutcome, RewardError> {
        validate_identifier("userId", user_id).map_err(RewardError::Validation)?;
        validate_identifier("roadmapId", &req.roadmap_id).map_err(RewardError::Validation)?;
        validate_identifier("chapterId", &req.chapter_id).map_err(RewardError::Validation)?;
        validate_identifier("taskId", &req.task_id).map_err(RewardError::Validation)?;

        let store = self.ledger.store();
        let roadmap = store
            .get_roadmap(user_id, &req.roadmap_id)?
            .ok_or_else(|| RewardError::not_found("roadmap", &req.roadmap_id))?;
        let chapter = roadmap
            .chapter(&req.chapter_id)
            .ok_or_else(|| RewardError::not_found("chapter", &req.chapter_id))?;
        let task = chapter
            .tasks
            .iter()
            .find(|t| t.id == req.task_id)
            .ok_or_else(|| RewardError::not_found("task", &req.task_id))?;

        let (is_correct, xp, match_grade) = match &task.kind {
            TaskKind::Matching { pairs } => {
                let grade = grade_matching(pairs, &req.user_answer);
                let xp = grade.correct.saturating_mul(MATCH_PAIR_XP).min(MAX_EXPLICIT_XP);
                (grade.all_correct(), xp, Some(grade))
            }
            _ => {
                let xp = if req.is_correct { Action::CorrectAnswer.base_xp() } else { 0 };
                (req.is_correct, xp, None)
            }
        };

        let now = Utc::now();
        let answer = TaskAnswer {
            user_id: user_id.to_string(),
            roadmap_id: req.roadmap_id.clone(),
            chapter_id: req.chapter_id.clone(),
            task_id: req.task_id.clone(),
            is_correct,
            user_answer: req.user_answer.clone(),
            xp_awarded: xp,
            answered_at: now,
        };
        let (stored, inserted) = store.record_task_answer_if_absent(&answer)?;

        if !inserted {
            let combo = self.current_combo(user_id);
            return Ok(GradeOutcome {
                is_correct: stored.is_correct,
                xp_awarded: 0,
                already_answered: true,
                correct_pairs: None,
                total_pairs: None,
                reward: None,
                combo,
                chapter_completed: chapter.completed,
                course_completed: roadmap.completed,
                completion_rewards: Vec::new(),
            });
        }

        let reward = if xp > 0 {
            let explicit = match_grade.map(|_| xp);
            self.ledger
                .apply_action_soft(user_id, Action::CorrectAnswer.as_str(), explicit)
                .await
        } else {
            None
        };

        let combo = self.record_history(user_id, is_correct, now);
        let (chapter_completed, course_completed, completion_rewards) =
            self.complete_chapter_if_done(user_id, &req.roadmap_id, chapter).await;

        Ok(GradeOutcome {
            is_correct,
            xp_awarded: reward.as_ref().map(|r| r.xp_gained).unwrap_or(0),
            already_answered: false,
            correct_pairs: match_grade.map(|g| g.correct),
            total_pairs: match_grade.map(|g| g.total),
            reward,
            combo,
            chapter_completed,
            course_completed,
            completion_rewards,
        })
    }

    fn current_combo(&self, user_id: &str) -> ComboSnapshot {
        let now = Utc::now();
        match self.ledger.store().get_answer_history(user_id) {
            Ok(Some(history)) => combo_from_history(&history, now),
            Ok(None) => combo_from_history(&AnswerHistory::new(user_id, now), now),
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Failed to read answer history");
                combo_from_history(&AnswerHistory::new(user_id, now), now)
            }
        }
    }

    fn record_history(&self, user_id: &str, correct: bool, now: DateTime<Utc>) -> ComboSnapshot {
        let answer = RecentAnswer {
            correct,
            answered_at: now,
        };
        match self
            .ledger
            .store()
            .append_answer_history(user_id, answer, ANSWER_HISTORY_CAP)
        {
            Ok(history) => combo_from_history(&history, now),
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Failed to append answer history");
                self.current_combo(user_id)
            }
        }
    }

    /// Once every task of the chapter has an answer, flips the chapter (and possibly the
    /// course) to completed exactly once and issues the completion rewards. Fails soft.
    async fn complete_chapter_if_done(
        &self,
        user_id: &str,
        roadmap_id: &str,
        chapter: &Chapter,
    ) -> (bool, bool, Vec<ActionOutcome>) {
        let store = self.ledger.store();
        let answers = match store.list_chapter_answers(user_id, roadmap_id, &chapter.id) {
            Ok(answers) => answers,
            Err(e) => {
                tracing::warn!(user_id, roadmap_id, chapter_id = %chapter.id, error = %e, "Failed to list chapter answers");
                return (false, false, Vec::new());
            }
        };

        let answered: HashSet<&str> = answers.iter().map(|a| a.task_id.as_str()).collect();
        let all_answered =
            !chapter.tasks.is_empty() && chapter.tasks.iter().all(|t| answered.contains(t.id.as_str()));
        if !all_answered {
            return (false, false, Vec::new());
        }
        let perfect = answers.iter().all(|a| a.is_correct);

        let chapter_id = chapter.id.clone();
        let transition = store.update_roadmap(user_id, roadmap_id, |roadmap| {
            let Some(ch) = roadmap.chapters.iter_mut().find(|c| c.id == chapter_id) else {
                return Mutation::Unchanged((false, false));
            };
            if ch.completed {
                return Mutation::Unchanged((false, false));
            }
            ch.completed = true;
            let course_done = !roadmap.completed && roadmap.chapters.iter().all(|c| c.completed);
            if course_done {
                roadmap.completed = true;
            }
            Mutation::Changed((true, course_done))
        });

        let (chapter_done, course_done) = match transition {
            Ok((_, flags)) => flags,
            Err(e) => {
                tracing::warn!(user_id, roadmap_id, chapter_id = %chapter.id, error = %e, "Failed to mark chapter completed");
                return (false, false, Vec::new());
            }
        };
        if !chapter_done {
            return (false, false, Vec::new());
        }

        let mut rewards = Vec::new();
        rewards.extend(
            self.ledger
                .apply_action_soft(user_id, Action::CompleteChapter.as_str(), None)
                .await,
        );
        if perfect {
            rewards.extend(
                self.ledger
                    .apply_action_soft(user_id, Action::PerfectQuiz.as_str(), None)
                    .await,
            );
        }
        if course_done {
            rewards.extend(
                self.ledger
                    .apply_action_soft(user_id, Action::CompleteCourse.as_str(), None)
                    .await,
            );
        }
        tracing::info!(user_id, roadmap_id, chapter_id = %chapter.id, perfect, course_done, "Chapter completed");

        (true, course_done, rewards)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;
    use crate::rewards::clock::LocalClock;
    use crate::store::Store;

    fn grader() -> (TempDir, TaskGrader, Arc<Store>) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::open(dir.path().join("db").to_str().unwrap()).unwrap());
        let ledger = Arc::new(StatsLedger::new(store.clone(), LocalClock::default()));
        (dir, TaskGrader::new(ledger), store)
    }

    fn task(id: &str, kind: TaskKind) -> Task {
        Task {
            id: id.into(),
            prompt: String::new(),
            kind,
        }
    }

    fn input() -> RoadmapInput {
        RoadmapInput {
            id: "r1".into(),
            title: "Rust".into(),
            chapters: vec![
                ChapterInput {
                    id: "c1".into(),
                    title: "Basics".into(),
                    tasks: vec![
                        task("t1", TaskKind::MultipleChoice),
                        task(
                            "t2",
                            TaskKind::Matching {
                                pairs: vec![
                                    MatchPair { left: "a".into(), right: "1".into() },
                                    MatchPair { left: "b".into(), right: "2".into() },
                                ],
                            },
                        ),
                    ],
                },
                ChapterInput {
                    id: "c2".into(),
                    title: "More".into(),
                    tasks: vec![task("t3", TaskKind::TrueFalse)],
                },
            ],
        }
    }

    fn request(chapter: &str, task: &str, is_correct: bool, answer: Value) -> GradeRequest {
        GradeRequest {
            roadmap_id: "r1".into(),
            chapter_id: chapter.into(),
            task_id: task.into(),
            is_correct,
            user_answer: answer,
        }
    }

    #[test]
    fn matching_grades_each_pair() {
        let pairs = vec![
            MatchPair { left: "a".into(), right: "1".into() },
            MatchPair { left: "b".into(), right: "2".into() },
        ];
        let half = grade_matching(&pairs, &json!({"a": "1", "b": "1"}));
        assert_eq!(half, MatchGrade { correct: 1, total: 2 });
        assert!(!half.all_correct());
        assert!(grade_matching(&pairs, &json!({"a": "1", "b": "2"})).all_correct());
        assert_eq!(grade_matching(&pairs, &json!("nope")).correct, 0);
    }

    #[tokio::test]
    async fn registration_awards_once() {
        let (_dir, grader, store) = grader();
        let first = grader.register_roadmap("u1", input()).await.unwrap();
        assert!(first.created);
        assert_eq!(first.reward.unwrap().xp_gained, 10);

        let second = grader.register_roadmap("u1", input()).await.unwrap();
        assert!(!second.created);
        assert!(second.reward.is_none());
        assert_eq!(store.get_progress("u1").unwrap().unwrap().xp, 10);
    }

    #[tokio::test]
    async fn invalid_roadmap_is_rejected() {
        let (_dir, grader, _store) = grader();
        let mut bad = input();
        bad.chapters[1].id = "c1".into();
        let err = grader.register_roadmap("u1", bad).await.unwrap_err();
        assert!(matches!(err, RewardError::Validation(_)));
    }

    #[tokio::test]
    async fn chapter_without_tasks_is_rejected() {
        let (_dir, grader, store) = grader();
        let mut bad = input();
        bad.chapters.push(ChapterInput {
            id: "c3".into(),
            title: "Empty".into(),
            tasks: vec![],
        });
        let err = grader.register_roadmap("u1", bad).await.unwrap_err();
        assert!(matches!(err, RewardError::Validation(_)));
        assert!(store.get_roadmap("u1", "r1").unwrap().is_none());
        assert!(store.get_progress("u1").unwrap().is_none());
    }

    fn pairs(n: usize) -> Vec<MatchPair> {
        (0..n)
            .map(|i| MatchPair {
                left: format!("l{i}"),
                right: format!("r{i}"),
            })
            .collect()
    }

    #[tokio::test]
    async fn oversized_matching_task_is_rejected() {
        let (_dir, grader, _store) = grader();
        let mut bad = input();
        bad.chapters[0].tasks[1].kind = TaskKind::Matching {
            pairs: pairs(MAX_MATCH_PAIRS + 1),
        };
        let err = grader.register_roadmap("u1", bad).await.unwrap_err();
        assert!(matches!(err, RewardError::Validation(_)));
    }

    #[tokio::test]
    async fn largest_matching_task_pays_every_pair() {
        let (_dir, grader, store) = grader();
        let mut big = input();
        let all = pairs(MAX_MATCH_PAIRS);
        let answer: serde_json::Map<String, Value> = all
            .iter()
            .map(|p| (p.left.clone(), Value::String(p.right.clone())))
            .collect();
        big.chapters[0].tasks[1].kind = TaskKind::Matching { pairs: all };
        grader.register_roadmap("u1", big).await.unwrap();

        let graded = grader
            .grade_task("u1", request("c1", "t2", false, Value::Object(answer)))
            .await
            .unwrap();
        assert!(graded.is_correct);
        assert_eq!(graded.xp_awarded, MAX_EXPLICIT_XP);

        let stored = store
            .list_chapter_answers("u1", "r1", "c1")
            .unwrap()
            .into_iter()
            .find(|a| a.task_id == "t2")
            .unwrap();
        assert_eq!(stored.xp_awarded, graded.xp_awarded);
        // 10 generate + 1000 pairs
        assert_eq!(store.get_progress("u1").unwrap().unwrap().xp, 1_010);
    }

    #[tokio::test]
    async fn reanswer_awards_nothing() {
        let (_dir, grader, _store) = grader();
        grader.register_roadmap("u1", input()).await.unwrap();

        let first = grader
            .grade_task("u1", request("c1", "t1", true, json!("B")))
            .await
            .unwrap();
        assert_eq!(first.xp_awarded, 1);
        assert!(!first.already_answered);

        let again = grader
            .grade_task("u1", request("c1", "t1", true, json!("B")))
            .await
            .unwrap();
        assert!(again.already_answered);
        assert_eq!(again.xp_awarded, 0);
    }

    #[tokio::test]
    async fn finishing_chapter_and_course_issues_completion_rewards() {
        let (_dir, grader, store) = grader();
        grader.register_roadmap("u1", input()).await.unwrap();

        grader
            .grade_task("u1", request("c1", "t1", true, json!("B")))
            .await
            .unwrap();
        let matched = grader
            .grade_task("u1", request("c1", "t2", false, json!({"a": "1", "b": "2"})))
            .await
            .unwrap();
        assert!(matched.is_correct);
        assert_eq!(matched.xp_awarded, 4);
        assert_eq!(matched.correct_pairs, Some(2));
        assert!(matched.chapter_completed);
        assert!(!matched.course_completed);
        // complete_chapter + perfect_quiz
        assert_eq!(matched.completion_rewards.len(), 2);
        assert_eq!(matched.combo.streak, 2);

        let last = grader
            .grade_task("u1", request("c2", "t3", false, json!(false)))
            .await
            .unwrap();
        assert!(last.chapter_completed);
        assert!(last.course_completed);
        // complete_chapter + complete_course, no perfect_quiz
        assert_eq!(last.completion_rewards.len(), 2);
        assert_eq!(last.combo.streak, 0);

        let p = store.get_progress("u1").unwrap().unwrap();
        // 10 generate + 1 + 4 + 5 + 2 + 5 + 50
        assert_eq!(p.xp, 77);
        assert!(p.badges.contains("first_steps"));
        assert!(p.badges.contains("perfectionist"));

        let view = grader.roadmap_view("u1", "r1").unwrap();
        assert!(view.roadmap.completed);
        assert_eq!(view.answered_task_ids.len(), 3);
    }

    #[tokio::test]
    async fn unknown_task_is_not_found() {
        let (_dir, grader, _store) = grader();
        grader.register_roadmap("u1", input()).await.unwrap();
        let err = grader
            .grade_task("u1", request("c1", "nope", true, Value::Null))
            .await
            .unwrap_err();
        assert!(matches!(err, RewardError::NotFound { .. }));
    }
}
