//! crates/interview_prep_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{
    Feedback, Interview, InterviewUpdate, NewFeedback, NewInterview, QuestionRequest,
    ScoreReport, TranscriptEntry,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all storage port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// The error type for the scoring port.
///
/// Malformed output is terminal (the result is discarded, nothing is
/// persisted); timeouts and unavailability are retryable by the caller.
#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    #[error("score result failed validation: {0}")]
    Malformed(String),
    #[error("scoring model timed out after {0}s")]
    Timeout(u64),
    #[error("scoring model unavailable: {0}")]
    Unavailable(String),
}

//=========================================================================================
// Storage Port
//=========================================================================================

/// The outcome of a conditional feedback insert.
///
/// `AlreadyExists` carries the row that won the race so the caller can merge
/// against it instead of blindly retrying.
#[derive(Debug)]
pub enum FeedbackInsert {
    Inserted(Feedback),
    AlreadyExists(Feedback),
}

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Interview Management ---
    async fn create_interview(&self, new: NewInterview) -> PortResult<Interview>;

    async fn get_interview_by_id(&self, interview_id: Uuid) -> PortResult<Interview>;

    /// All interviews owned by a user, newest first.
    async fn get_interviews_by_user(&self, user_id: Uuid) -> PortResult<Vec<Interview>>;

    /// All finalized interviews owned by anyone except `exclude_user`,
    /// visibility already resolved. Callers filter and rank.
    async fn get_latest_interviews(&self, exclude_user: Uuid) -> PortResult<Vec<Interview>>;

    /// Applies an owner-initiated edit. Fails with `Unauthorized` when
    /// `user_id` does not own the interview.
    async fn update_interview(
        &self,
        interview_id: Uuid,
        user_id: Uuid,
        update: InterviewUpdate,
    ) -> PortResult<()>;

    // --- Feedback Management ---
    async fn get_feedback_for_attempt(
        &self,
        interview_id: Uuid,
        user_id: Uuid,
    ) -> PortResult<Option<Feedback>>;

    /// Inserts a feedback record unless one already exists for the
    /// (interview, user) pair. Must be atomic with respect to concurrent
    /// inserts for the same pair; the at-most-one invariant rests on it.
    async fn create_feedback_if_absent(&self, new: NewFeedback) -> PortResult<FeedbackInsert>;

    /// Overwrites the score fields and commentary of an existing record and
    /// refreshes its update timestamp. The id and any attached user rating
    /// are preserved.
    async fn update_feedback_scores(
        &self,
        feedback_id: Uuid,
        report: ScoreReport,
    ) -> PortResult<()>;

    async fn set_feedback_rating(&self, feedback_id: Uuid, rating: u8) -> PortResult<()>;

    async fn get_feedback_for_interview(&self, interview_id: Uuid) -> PortResult<Vec<Feedback>>;
}

//=========================================================================================
// LLM Ports
//=========================================================================================

#[async_trait]
pub trait ScoringService: Send + Sync {
    /// Scores a completed interview transcript.
    ///
    /// Implementations are stateless and side-effect-free: they never write
    /// to storage, and they reject any model output that does not conform to
    /// the `ScoreReport` contract rather than returning partial data.
    async fn score_transcript(
        &self,
        transcript: &[TranscriptEntry],
    ) -> Result<ScoreReport, ScoringError>;
}

#[async_trait]
pub trait QuestionGenerationService: Send + Sync {
    /// Generates the ordered question list for a new interview.
    async fn generate_questions(&self, request: &QuestionRequest) -> PortResult<Vec<String>>;
}
