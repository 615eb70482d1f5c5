pub mod domain;
pub mod feedback;
pub mod ports;

pub use domain::{
    CategoryName, CategoryScore, Feedback, Interview, InterviewType, InterviewUpdate,
    NewFeedback, NewInterview, QuestionRequest, RatingSummary, ScoreReport, TranscriptEntry,
    TranscriptRole,
};
pub use feedback::{FeedbackEngine, FeedbackError, RatingTarget, ReconcileOutcome};
pub use ports::{
    DatabaseService, FeedbackInsert, PortError, PortResult, QuestionGenerationService,
    ScoringError, ScoringService,
};
