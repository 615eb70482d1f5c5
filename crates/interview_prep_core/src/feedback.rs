//! crates/interview_prep_core/src/feedback.rs
//!
//! The feedback reconciliation engine and rating aggregation.
//!
//! A user may retake the same interview any number of times; the engine's
//! policy is best-score-wins. A new attempt never regresses the recorded
//! total score, while an equal-or-better attempt replaces the qualitative
//! commentary along with the numbers.

use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{NewFeedback, RatingSummary, TranscriptEntry};
use crate::ports::{
    DatabaseService, FeedbackInsert, PortError, ScoringError, ScoringService,
};

//=========================================================================================
// Outcomes and Errors
//=========================================================================================

/// What happened to a freshly computed score for a (interview, user) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// First attempt: a new feedback record was created.
    Created(Uuid),
    /// The existing record's score was higher; the new result was discarded.
    /// Carries the discarded score so the caller can report "your new
    /// attempt scored lower".
    Retained {
        feedback_id: Uuid,
        discarded_score: u8,
    },
    /// The new score was equal or better; the record was overwritten in place.
    Updated(Uuid),
}

/// How a rating submission identifies its feedback record.
#[derive(Debug, Clone, Copy)]
pub enum RatingTarget {
    FeedbackId(Uuid),
    Attempt { interview_id: Uuid, user_id: Uuid },
}

#[derive(Debug, thiserror::Error)]
pub enum FeedbackError {
    /// The scoring model's output failed schema validation. Not retryable.
    #[error("scoring model returned a malformed result: {0}")]
    MalformedScoreResult(String),

    /// The scoring model did not answer in time. Retryable by the caller;
    /// the engine itself never retries.
    #[error("scoring model timed out after {0}s")]
    ScoringTimeout(u64),

    /// The scoring model could not be reached. Retryable by the caller.
    #[error("scoring model unavailable: {0}")]
    ScoringUnavailable(String),

    /// Storage was unreachable or rejected a write. The whole operation is
    /// safe to retry: no partial state is left behind.
    #[error("storage failure: {0}")]
    PersistenceFailure(String),

    /// The rating target does not resolve to a feedback record.
    #[error("no feedback record found for the requested target")]
    FeedbackNotFound,

    /// The submitted rating is outside the 1-5 range.
    #[error("rating {0} is outside the allowed 1-5 range")]
    InvalidRating(u8),
}

impl From<ScoringError> for FeedbackError {
    fn from(e: ScoringError) -> Self {
        match e {
            ScoringError::Malformed(msg) => FeedbackError::MalformedScoreResult(msg),
            ScoringError::Timeout(secs) => FeedbackError::ScoringTimeout(secs),
            ScoringError::Unavailable(msg) => FeedbackError::ScoringUnavailable(msg),
        }
    }
}

fn persistence(e: PortError) -> FeedbackError {
    FeedbackError::PersistenceFailure(e.to_string())
}

//=========================================================================================
// The Engine
//=========================================================================================

/// Owns the fate of every scoring result and user rating.
///
/// Holds the two ports it orchestrates; handlers share one instance.
pub struct FeedbackEngine {
    db: Arc<dyn DatabaseService>,
    scorer: Arc<dyn ScoringService>,
}

impl FeedbackEngine {
    pub fn new(db: Arc<dyn DatabaseService>, scorer: Arc<dyn ScoringService>) -> Self {
        Self { db, scorer }
    }

    /// Scores a completed transcript and reconciles the result against any
    /// existing feedback for the (interview, user) pair.
    ///
    /// At most one feedback record exists per pair afterwards, including
    /// under concurrent calls: the storage port's conditional insert decides
    /// the winner, and a loser merges against the winning row.
    pub async fn reconcile_feedback(
        &self,
        interview_id: Uuid,
        user_id: Uuid,
        transcript: &[TranscriptEntry],
    ) -> Result<ReconcileOutcome, FeedbackError> {
        let report = self.scorer.score_transcript(transcript).await?;

        let existing = self
            .db
            .get_feedback_for_attempt(interview_id, user_id)
            .await
            .map_err(persistence)?;

        let existing = match existing {
            Some(feedback) => feedback,
            None => {
                let new = NewFeedback {
                    interview_id,
                    user_id,
                    report: report.clone(),
                };
                match self
                    .db
                    .create_feedback_if_absent(new)
                    .await
                    .map_err(persistence)?
                {
                    FeedbackInsert::Inserted(created) => {
                        return Ok(ReconcileOutcome::Created(created.id));
                    }
                    // A concurrent attempt created the record between our
                    // lookup and insert. Merge against the winning row.
                    FeedbackInsert::AlreadyExists(winner) => winner,
                }
            }
        };

        if existing.total_score > report.total_score {
            return Ok(ReconcileOutcome::Retained {
                feedback_id: existing.id,
                discarded_score: report.total_score,
            });
        }

        let feedback_id = existing.id;
        self.db
            .update_feedback_scores(feedback_id, report)
            .await
            .map_err(persistence)?;
        Ok(ReconcileOutcome::Updated(feedback_id))
    }

    /// Attaches a user-submitted star rating to a feedback record.
    ///
    /// Submitting again overwrites the previous value. Range validation
    /// happens before any I/O.
    pub async fn attach_rating(
        &self,
        target: RatingTarget,
        rating: u8,
    ) -> Result<Uuid, FeedbackError> {
        if !(1..=5).contains(&rating) {
            return Err(FeedbackError::InvalidRating(rating));
        }

        let feedback_id = match target {
            RatingTarget::FeedbackId(id) => id,
            RatingTarget::Attempt {
                interview_id,
                user_id,
            } => self
                .db
                .get_feedback_for_attempt(interview_id, user_id)
                .await
                .map_err(persistence)?
                .ok_or(FeedbackError::FeedbackNotFound)?
                .id,
        };

        match self.db.set_feedback_rating(feedback_id, rating).await {
            Ok(()) => Ok(feedback_id),
            Err(PortError::NotFound(_)) => Err(FeedbackError::FeedbackNotFound),
            Err(e) => Err(persistence(e)),
        }
    }

    /// Computes the unweighted mean of all ratings attached to an
    /// interview's feedback records. Pure read; records without a rating are
    /// ignored, and an interview with no rated records reports zero.
    pub async fn average_rating(
        &self,
        interview_id: Uuid,
    ) -> Result<RatingSummary, FeedbackError> {
        let records = self
            .db
            .get_feedback_for_interview(interview_id)
            .await
            .map_err(persistence)?;

        let ratings: Vec<u8> = records.iter().filter_map(|f| f.user_rating).collect();
        if ratings.is_empty() {
            return Ok(RatingSummary {
                average: 0.0,
                count: 0,
            });
        }

        let sum: u32 = ratings.iter().map(|r| u32::from(*r)).sum();
        Ok(RatingSummary {
            average: f64::from(sum) / ratings.len() as f64,
            count: ratings.len() as u32,
        })
    }
}
