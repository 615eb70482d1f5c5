//! Behavioral tests for the feedback reconciliation engine and rating
//! aggregation, run against in-memory fakes of the storage and scoring ports.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use interview_prep_core::domain::{
    resolve_visibility, CategoryName, CategoryScore, Feedback, Interview, InterviewUpdate,
    NewFeedback, NewInterview, RatingSummary, ScoreReport, TranscriptEntry, TranscriptRole,
};
use interview_prep_core::feedback::{
    FeedbackEngine, FeedbackError, RatingTarget, ReconcileOutcome,
};
use interview_prep_core::ports::{
    DatabaseService, FeedbackInsert, PortError, PortResult, ScoringError, ScoringService,
};

//=========================================================================================
// In-Memory Fakes
//=========================================================================================

#[derive(Default)]
struct FakeDb {
    interviews: Mutex<HashMap<Uuid, Interview>>,
    feedback: Mutex<HashMap<(Uuid, Uuid), Feedback>>,
    /// When set, `get_feedback_for_attempt` reports nothing even though a
    /// row exists. Simulates the window where a concurrent attempt commits
    /// between the engine's lookup and its insert.
    hide_feedback_lookup: AtomicBool,
    /// When set, every write fails. Simulates an unreachable store.
    fail_writes: AtomicBool,
}

impl FakeDb {
    fn stored_feedback(&self, interview_id: Uuid, user_id: Uuid) -> Option<Feedback> {
        self.feedback
            .lock()
            .unwrap()
            .get(&(interview_id, user_id))
            .cloned()
    }

    fn feedback_count(&self) -> usize {
        self.feedback.lock().unwrap().len()
    }

    fn check_writable(&self) -> PortResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(PortError::Unexpected("store unreachable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DatabaseService for FakeDb {
    async fn create_interview(&self, new: NewInterview) -> PortResult<Interview> {
        self.check_writable()?;
        let interview = Interview {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            role: new.role,
            level: new.level,
            interview_type: new.interview_type,
            questions: new.questions,
            techstack: new.techstack,
            visibility: resolve_visibility(new.visibility),
            finalized: true,
            cover_image: new.cover_image,
            created_at: Utc::now(),
        };
        self.interviews
            .lock()
            .unwrap()
            .insert(interview.id, interview.clone());
        Ok(interview)
    }

    async fn get_interview_by_id(&self, interview_id: Uuid) -> PortResult<Interview> {
        self.interviews
            .lock()
            .unwrap()
            .get(&interview_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Interview {} not found", interview_id)))
    }

    async fn get_interviews_by_user(&self, user_id: Uuid) -> PortResult<Vec<Interview>> {
        let mut interviews: Vec<Interview> = self
            .interviews
            .lock()
            .unwrap()
            .values()
            .filter(|i| i.user_id == user_id)
            .cloned()
            .collect();
        interviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(interviews)
    }

    async fn get_latest_interviews(&self, exclude_user: Uuid) -> PortResult<Vec<Interview>> {
        Ok(self
            .interviews
            .lock()
            .unwrap()
            .values()
            .filter(|i| i.finalized && i.user_id != exclude_user)
            .cloned()
            .collect())
    }

    async fn update_interview(
        &self,
        interview_id: Uuid,
        user_id: Uuid,
        update: InterviewUpdate,
    ) -> PortResult<()> {
        self.check_writable()?;
        let mut interviews = self.interviews.lock().unwrap();
        let interview = interviews
            .get_mut(&interview_id)
            .ok_or_else(|| PortError::NotFound(format!("Interview {} not found", interview_id)))?;
        if interview.user_id != user_id {
            return Err(PortError::Unauthorized);
        }
        interview.questions = update.questions;
        if let Some(visibility) = update.visibility {
            interview.visibility = visibility;
        }
        Ok(())
    }

    async fn get_feedback_for_attempt(
        &self,
        interview_id: Uuid,
        user_id: Uuid,
    ) -> PortResult<Option<Feedback>> {
        if self.hide_feedback_lookup.load(Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(self.stored_feedback(interview_id, user_id))
    }

    async fn create_feedback_if_absent(&self, new: NewFeedback) -> PortResult<FeedbackInsert> {
        self.check_writable()?;
        let mut feedback = self.feedback.lock().unwrap();
        let key = (new.interview_id, new.user_id);
        if let Some(existing) = feedback.get(&key) {
            return Ok(FeedbackInsert::AlreadyExists(existing.clone()));
        }
        let now = Utc::now();
        let record = Feedback {
            id: Uuid::new_v4(),
            interview_id: new.interview_id,
            user_id: new.user_id,
            total_score: new.report.total_score,
            category_scores: new.report.category_scores,
            strengths: new.report.strengths,
            areas_for_improvement: new.report.areas_for_improvement,
            final_assessment: new.report.final_assessment,
            user_rating: None,
            created_at: now,
            updated_at: now,
        };
        feedback.insert(key, record.clone());
        Ok(FeedbackInsert::Inserted(record))
    }

    async fn update_feedback_scores(
        &self,
        feedback_id: Uuid,
        report: ScoreReport,
    ) -> PortResult<()> {
        self.check_writable()?;
        let mut feedback = self.feedback.lock().unwrap();
        let record = feedback
            .values_mut()
            .find(|f| f.id == feedback_id)
            .ok_or_else(|| PortError::NotFound(format!("Feedback {} not found", feedback_id)))?;
        record.total_score = report.total_score;
        record.category_scores = report.category_scores;
        record.strengths = report.strengths;
        record.areas_for_improvement = report.areas_for_improvement;
        record.final_assessment = report.final_assessment;
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn set_feedback_rating(&self, feedback_id: Uuid, rating: u8) -> PortResult<()> {
        self.check_writable()?;
        let mut feedback = self.feedback.lock().unwrap();
        let record = feedback
            .values_mut()
            .find(|f| f.id == feedback_id)
            .ok_or_else(|| PortError::NotFound(format!("Feedback {} not found", feedback_id)))?;
        record.user_rating = Some(rating);
        Ok(())
    }

    async fn get_feedback_for_interview(&self, interview_id: Uuid) -> PortResult<Vec<Feedback>> {
        Ok(self
            .feedback
            .lock()
            .unwrap()
            .values()
            .filter(|f| f.interview_id == interview_id)
            .cloned()
            .collect())
    }
}

/// A scoring fake that replays a scripted sequence of results.
struct ScriptedScorer {
    results: Mutex<VecDeque<Result<ScoreReport, ScoringError>>>,
}

impl ScriptedScorer {
    fn new(results: Vec<Result<ScoreReport, ScoringError>>) -> Self {
        Self {
            results: Mutex::new(results.into()),
        }
    }
}

#[async_trait]
impl ScoringService for ScriptedScorer {
    async fn score_transcript(
        &self,
        _transcript: &[TranscriptEntry],
    ) -> Result<ScoreReport, ScoringError> {
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ScoringError::Unavailable("script exhausted".to_string())))
    }
}

//=========================================================================================
// Test Helpers
//=========================================================================================

fn report(total_score: u8) -> ScoreReport {
    report_with_assessment(total_score, "A solid attempt overall.")
}

fn report_with_assessment(total_score: u8, final_assessment: &str) -> ScoreReport {
    ScoreReport {
        total_score,
        category_scores: CategoryName::ALL
            .iter()
            .map(|name| CategoryScore {
                name: *name,
                score: total_score,
                comment: format!("{} was adequate.", name.as_str()),
            })
            .collect(),
        strengths: vec!["Clear articulation".to_string()],
        areas_for_improvement: vec!["More concrete examples".to_string()],
        final_assessment: final_assessment.to_string(),
    }
}

fn transcript() -> Vec<TranscriptEntry> {
    vec![
        TranscriptEntry {
            role: TranscriptRole::Assistant,
            content: "Tell me about yourself.".to_string(),
        },
        TranscriptEntry {
            role: TranscriptRole::User,
            content: "I have five years of backend experience.".to_string(),
        },
    ]
}

fn engine_with(
    scores: Vec<Result<ScoreReport, ScoringError>>,
) -> (Arc<FakeDb>, FeedbackEngine) {
    let db = Arc::new(FakeDb::default());
    let engine = FeedbackEngine::new(db.clone(), Arc::new(ScriptedScorer::new(scores)));
    (db, engine)
}

//=========================================================================================
// Reconciliation
//=========================================================================================

#[tokio::test]
async fn first_attempt_creates_feedback() {
    let (db, engine) = engine_with(vec![Ok(report(60))]);
    let interview_id = Uuid::new_v4();
    let user_id = Uuid::new_v4();

    let outcome = engine
        .reconcile_feedback(interview_id, user_id, &transcript())
        .await
        .unwrap();

    let stored = db.stored_feedback(interview_id, user_id).unwrap();
    assert_eq!(outcome, ReconcileOutcome::Created(stored.id));
    assert_eq!(stored.total_score, 60);
    assert_eq!(stored.category_scores.len(), 5);
    assert_eq!(stored.user_rating, None);
}

#[tokio::test]
async fn lower_score_is_retained() {
    let (db, engine) = engine_with(vec![
        Ok(report_with_assessment(70, "First attempt.")),
        Ok(report_with_assessment(55, "Second attempt.")),
    ]);
    let interview_id = Uuid::new_v4();
    let user_id = Uuid::new_v4();

    engine
        .reconcile_feedback(interview_id, user_id, &transcript())
        .await
        .unwrap();
    let outcome = engine
        .reconcile_feedback(interview_id, user_id, &transcript())
        .await
        .unwrap();

    let stored = db.stored_feedback(interview_id, user_id).unwrap();
    assert_eq!(
        outcome,
        ReconcileOutcome::Retained {
            feedback_id: stored.id,
            discarded_score: 55,
        }
    );
    assert_eq!(stored.total_score, 70);
    assert_eq!(stored.final_assessment, "First attempt.");
}

#[tokio::test]
async fn equal_score_updates_commentary() {
    let (db, engine) = engine_with(vec![
        Ok(report_with_assessment(70, "First attempt.")),
        Ok(report_with_assessment(70, "Second attempt, same score.")),
    ]);
    let interview_id = Uuid::new_v4();
    let user_id = Uuid::new_v4();

    engine
        .reconcile_feedback(interview_id, user_id, &transcript())
        .await
        .unwrap();
    let outcome = engine
        .reconcile_feedback(interview_id, user_id, &transcript())
        .await
        .unwrap();

    let stored = db.stored_feedback(interview_id, user_id).unwrap();
    assert_eq!(outcome, ReconcileOutcome::Updated(stored.id));
    assert_eq!(stored.total_score, 70);
    assert_eq!(stored.final_assessment, "Second attempt, same score.");
}

#[tokio::test]
async fn higher_score_updates_in_place_and_preserves_rating() {
    let (db, engine) = engine_with(vec![Ok(report(60)), Ok(report(85))]);
    let interview_id = Uuid::new_v4();
    let user_id = Uuid::new_v4();

    let first = engine
        .reconcile_feedback(interview_id, user_id, &transcript())
        .await
        .unwrap();
    let ReconcileOutcome::Created(feedback_id) = first else {
        panic!("expected Created, got {:?}", first);
    };
    engine
        .attach_rating(RatingTarget::FeedbackId(feedback_id), 5)
        .await
        .unwrap();

    let outcome = engine
        .reconcile_feedback(interview_id, user_id, &transcript())
        .await
        .unwrap();

    assert_eq!(outcome, ReconcileOutcome::Updated(feedback_id));
    let stored = db.stored_feedback(interview_id, user_id).unwrap();
    assert_eq!(stored.id, feedback_id);
    assert_eq!(stored.total_score, 85);
    assert_eq!(stored.user_rating, Some(5));
}

#[tokio::test]
async fn stored_score_never_regresses() {
    let scores = [60u8, 55, 80, 70, 90, 10];
    let (db, engine) = engine_with(scores.iter().map(|s| Ok(report(*s))).collect());
    let interview_id = Uuid::new_v4();
    let user_id = Uuid::new_v4();

    let mut best = 0;
    for score in scores {
        engine
            .reconcile_feedback(interview_id, user_id, &transcript())
            .await
            .unwrap();
        best = best.max(score);
        let stored = db.stored_feedback(interview_id, user_id).unwrap();
        assert_eq!(stored.total_score, best);
    }
    assert_eq!(db.feedback_count(), 1);
}

#[tokio::test]
async fn concurrent_create_falls_back_to_merge() {
    let (db, engine) = engine_with(vec![Ok(report(80)), Ok(report(60))]);
    let interview_id = Uuid::new_v4();
    let user_id = Uuid::new_v4();

    engine
        .reconcile_feedback(interview_id, user_id, &transcript())
        .await
        .unwrap();

    // The lookup misses but the insert conflicts, as when another attempt
    // commits in between. The engine must merge against the winning row.
    db.hide_feedback_lookup.store(true, Ordering::SeqCst);
    let outcome = engine
        .reconcile_feedback(interview_id, user_id, &transcript())
        .await
        .unwrap();
    db.hide_feedback_lookup.store(false, Ordering::SeqCst);

    let stored = db.stored_feedback(interview_id, user_id).unwrap();
    assert_eq!(
        outcome,
        ReconcileOutcome::Retained {
            feedback_id: stored.id,
            discarded_score: 60,
        }
    );
    assert_eq!(stored.total_score, 80);
    assert_eq!(db.feedback_count(), 1);
}

#[tokio::test]
async fn malformed_score_result_persists_nothing() {
    let (db, engine) = engine_with(vec![Err(ScoringError::Malformed(
        "expected 5 category scores, got 4".to_string(),
    ))]);

    let result = engine
        .reconcile_feedback(Uuid::new_v4(), Uuid::new_v4(), &transcript())
        .await;

    assert!(matches!(
        result,
        Err(FeedbackError::MalformedScoreResult(_))
    ));
    assert_eq!(db.feedback_count(), 0);
}

#[tokio::test]
async fn scoring_timeout_persists_nothing() {
    let (db, engine) = engine_with(vec![Err(ScoringError::Timeout(30))]);

    let result = engine
        .reconcile_feedback(Uuid::new_v4(), Uuid::new_v4(), &transcript())
        .await;

    assert!(matches!(result, Err(FeedbackError::ScoringTimeout(30))));
    assert_eq!(db.feedback_count(), 0);
}

#[tokio::test]
async fn storage_failure_surfaces_as_persistence_failure() {
    let (db, engine) = engine_with(vec![Ok(report(60))]);
    db.fail_writes.store(true, Ordering::SeqCst);

    let result = engine
        .reconcile_feedback(Uuid::new_v4(), Uuid::new_v4(), &transcript())
        .await;

    assert!(matches!(result, Err(FeedbackError::PersistenceFailure(_))));
    assert_eq!(db.feedback_count(), 0);
}

//=========================================================================================
// Ratings
//=========================================================================================

#[tokio::test]
async fn rating_overwrite_keeps_last_value() {
    let (db, engine) = engine_with(vec![Ok(report(60))]);
    let interview_id = Uuid::new_v4();
    let user_id = Uuid::new_v4();

    engine
        .reconcile_feedback(interview_id, user_id, &transcript())
        .await
        .unwrap();

    let target = RatingTarget::Attempt {
        interview_id,
        user_id,
    };
    engine.attach_rating(target, 2).await.unwrap();
    engine.attach_rating(target, 4).await.unwrap();

    let stored = db.stored_feedback(interview_id, user_id).unwrap();
    assert_eq!(stored.user_rating, Some(4));
}

#[tokio::test]
async fn rating_rejects_out_of_range_values() {
    let (db, engine) = engine_with(vec![Ok(report(60))]);
    let interview_id = Uuid::new_v4();
    let user_id = Uuid::new_v4();

    engine
        .reconcile_feedback(interview_id, user_id, &transcript())
        .await
        .unwrap();

    for bad in [0u8, 6, 200] {
        let result = engine
            .attach_rating(
                RatingTarget::Attempt {
                    interview_id,
                    user_id,
                },
                bad,
            )
            .await;
        assert!(matches!(result, Err(FeedbackError::InvalidRating(r)) if r == bad));
    }
    let stored = db.stored_feedback(interview_id, user_id).unwrap();
    assert_eq!(stored.user_rating, None);
}

#[tokio::test]
async fn rating_unknown_attempt_reports_not_found() {
    let (_db, engine) = engine_with(vec![]);

    let result = engine
        .attach_rating(
            RatingTarget::Attempt {
                interview_id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
            },
            3,
        )
        .await;

    assert!(matches!(result, Err(FeedbackError::FeedbackNotFound)));
}

#[tokio::test]
async fn rating_unknown_feedback_id_reports_not_found() {
    let (_db, engine) = engine_with(vec![]);

    let result = engine
        .attach_rating(RatingTarget::FeedbackId(Uuid::new_v4()), 3)
        .await;

    assert!(matches!(result, Err(FeedbackError::FeedbackNotFound)));
}

#[tokio::test]
async fn average_ignores_unrated_records() {
    let (_db, engine) = engine_with(vec![Ok(report(60)), Ok(report(70)), Ok(report(80))]);
    let interview_id = Uuid::new_v4();
    let raters = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];

    for user_id in raters {
        engine
            .reconcile_feedback(interview_id, user_id, &transcript())
            .await
            .unwrap();
    }
    for (user_id, rating) in raters.iter().zip([3u8, 5]) {
        engine
            .attach_rating(
                RatingTarget::Attempt {
                    interview_id,
                    user_id: *user_id,
                },
                rating,
            )
            .await
            .unwrap();
    }

    let summary = engine.average_rating(interview_id).await.unwrap();
    assert_eq!(
        summary,
        RatingSummary {
            average: 4.0,
            count: 2,
        }
    );
}

#[tokio::test]
async fn average_of_unrated_interview_is_zero() {
    let (_db, engine) = engine_with(vec![Ok(report(60))]);
    let interview_id = Uuid::new_v4();

    // No feedback at all.
    let summary = engine.average_rating(interview_id).await.unwrap();
    assert_eq!(summary, RatingSummary { average: 0.0, count: 0 });

    // Feedback exists but carries no rating yet.
    engine
        .reconcile_feedback(interview_id, Uuid::new_v4(), &transcript())
        .await
        .unwrap();
    let summary = engine.average_rating(interview_id).await.unwrap();
    assert_eq!(summary, RatingSummary { average: 0.0, count: 0 });
}

//=========================================================================================
// End-to-End Scenario
//=========================================================================================

#[tokio::test]
async fn repeated_attempts_then_rating_scenario() {
    let (db, engine) = engine_with(vec![Ok(report(60)), Ok(report(55)), Ok(report(80))]);
    let interview_id = Uuid::new_v4();
    let user_id = Uuid::new_v4();

    let first = engine
        .reconcile_feedback(interview_id, user_id, &transcript())
        .await
        .unwrap();
    let ReconcileOutcome::Created(feedback_id) = first else {
        panic!("expected Created, got {:?}", first);
    };

    let second = engine
        .reconcile_feedback(interview_id, user_id, &transcript())
        .await
        .unwrap();
    assert_eq!(
        second,
        ReconcileOutcome::Retained {
            feedback_id,
            discarded_score: 55,
        }
    );
    assert_eq!(
        db.stored_feedback(interview_id, user_id).unwrap().total_score,
        60
    );

    let third = engine
        .reconcile_feedback(interview_id, user_id, &transcript())
        .await
        .unwrap();
    assert_eq!(third, ReconcileOutcome::Updated(feedback_id));
    assert_eq!(
        db.stored_feedback(interview_id, user_id).unwrap().total_score,
        80
    );

    let rated = engine
        .attach_rating(RatingTarget::FeedbackId(feedback_id), 4)
        .await
        .unwrap();
    assert_eq!(rated, feedback_id);

    let summary = engine.average_rating(interview_id).await.unwrap();
    assert_eq!(summary, RatingSummary { average: 4.0, count: 1 });
    assert_eq!(db.feedback_count(), 1);
}
