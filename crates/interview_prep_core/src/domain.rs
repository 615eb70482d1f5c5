//! crates/interview_prep_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format
//! beyond the serde derives needed to carry them across process boundaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Error returned when parsing a domain enum from its string form.
#[derive(Debug, thiserror::Error)]
#[error("'{0}' is not a valid {1}")]
pub struct ParseEnumError(pub String, pub &'static str);

//=========================================================================================
// Interviews
//=========================================================================================

/// The focus of an interview's question set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterviewType {
    Behavioural,
    Technical,
    Mixed,
}

impl InterviewType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterviewType::Behavioural => "behavioural",
            InterviewType::Technical => "technical",
            InterviewType::Mixed => "mixed",
        }
    }
}

impl FromStr for InterviewType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "behavioural" => Ok(InterviewType::Behavioural),
            "technical" => Ok(InterviewType::Technical),
            "mixed" => Ok(InterviewType::Mixed),
            other => Err(ParseEnumError(other.to_string(), "interview type")),
        }
    }
}

/// A configured question set a user can attempt.
///
/// Owned by its creator. The role is fixed at creation; questions and
/// visibility remain editable by the owner.
#[derive(Debug, Clone)]
pub struct Interview {
    pub id: Uuid,
    pub user_id: Uuid,
    pub role: String,
    pub level: String,
    pub interview_type: InterviewType,
    pub questions: Vec<String>,
    pub techstack: Vec<String>,
    pub visibility: bool,
    pub finalized: bool,
    pub cover_image: String,
    pub created_at: DateTime<Utc>,
}

/// The fields needed to persist a new interview.
#[derive(Debug, Clone)]
pub struct NewInterview {
    pub user_id: Uuid,
    pub role: String,
    pub level: String,
    pub interview_type: InterviewType,
    pub questions: Vec<String>,
    pub techstack: Vec<String>,
    pub visibility: Option<bool>,
    pub cover_image: String,
}

/// An owner-initiated edit to an interview. `visibility: None` leaves the
/// stored value unchanged.
#[derive(Debug, Clone)]
pub struct InterviewUpdate {
    pub questions: Vec<String>,
    pub visibility: Option<bool>,
}

/// Resolves a stored, possibly-absent visibility flag to its effective value.
///
/// Interviews without an explicit flag are public. Every read path goes
/// through here so the default lives in exactly one place.
pub fn resolve_visibility(stored: Option<bool>) -> bool {
    stored.unwrap_or(true)
}

/// The parameters the question generator needs to produce a question set.
#[derive(Debug, Clone)]
pub struct QuestionRequest {
    pub role: String,
    pub level: String,
    pub interview_type: InterviewType,
    pub techstack: Vec<String>,
    pub amount: u8,
}

//=========================================================================================
// Transcripts
//=========================================================================================

/// Who produced an utterance during a voice session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptRole {
    User,
    Assistant,
    System,
}

impl TranscriptRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranscriptRole::User => "user",
            TranscriptRole::Assistant => "assistant",
            TranscriptRole::System => "system",
        }
    }
}

impl FromStr for TranscriptRole {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(TranscriptRole::User),
            "assistant" => Ok(TranscriptRole::Assistant),
            "system" => Ok(TranscriptRole::System),
            other => Err(ParseEnumError(other.to_string(), "transcript role")),
        }
    }
}

/// One utterance from an interview attempt. An ordered sequence of these is
/// the sole input to scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub role: TranscriptRole,
    pub content: String,
}

//=========================================================================================
// Scoring
//=========================================================================================

/// The five evaluation categories, in the order the scoring model must
/// return them. No additions, omissions, or reordering are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CategoryName {
    #[serde(rename = "Communication Skills")]
    CommunicationSkills,
    #[serde(rename = "Technical Knowledge")]
    TechnicalKnowledge,
    #[serde(rename = "Problem Solving")]
    ProblemSolving,
    #[serde(rename = "Cultural Fit")]
    CulturalFit,
    #[serde(rename = "Confidence and Clarity")]
    ConfidenceAndClarity,
}

impl CategoryName {
    /// The canonical category order.
    pub const ALL: [CategoryName; 5] = [
        CategoryName::CommunicationSkills,
        CategoryName::TechnicalKnowledge,
        CategoryName::ProblemSolving,
        CategoryName::CulturalFit,
        CategoryName::ConfidenceAndClarity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryName::CommunicationSkills => "Communication Skills",
            CategoryName::TechnicalKnowledge => "Technical Knowledge",
            CategoryName::ProblemSolving => "Problem Solving",
            CategoryName::CulturalFit => "Cultural Fit",
            CategoryName::ConfidenceAndClarity => "Confidence and Clarity",
        }
    }
}

/// One scored category with the model's commentary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub name: CategoryName,
    pub score: u8,
    pub comment: String,
}

/// A validated scoring result for one transcript.
///
/// The total score is the model's holistic judgment; it is not derived from
/// the category scores and the two are never cross-checked.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreReport {
    pub total_score: u8,
    pub category_scores: Vec<CategoryScore>,
    pub strengths: Vec<String>,
    pub areas_for_improvement: Vec<String>,
    pub final_assessment: String,
}

//=========================================================================================
// Feedback
//=========================================================================================

/// The persisted scoring result for one (interview, user) pair.
///
/// Invariant: at most one of these exists per pair. The reconciliation
/// engine and the storage layer's unique constraint enforce it together.
#[derive(Debug, Clone)]
pub struct Feedback {
    pub id: Uuid,
    pub interview_id: Uuid,
    pub user_id: Uuid,
    pub total_score: u8,
    pub category_scores: Vec<CategoryScore>,
    pub strengths: Vec<String>,
    pub areas_for_improvement: Vec<String>,
    pub final_assessment: String,
    pub user_rating: Option<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The fields needed to persist a first-attempt feedback record.
#[derive(Debug, Clone)]
pub struct NewFeedback {
    pub interview_id: Uuid,
    pub user_id: Uuid,
    pub report: ScoreReport,
}

/// The mean of all user ratings attached to an interview's feedback records.
/// Derived on read, never stored. `count == 0` implies `average == 0.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingSummary {
    pub average: f64,
    pub count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visibility_defaults_to_public() {
        assert!(resolve_visibility(None));
        assert!(resolve_visibility(Some(true)));
        assert!(!resolve_visibility(Some(false)));
    }

    #[test]
    fn category_order_is_fixed() {
        let names: Vec<&str> = CategoryName::ALL.iter().map(|c| c.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Communication Skills",
                "Technical Knowledge",
                "Problem Solving",
                "Cultural Fit",
                "Confidence and Clarity",
            ]
        );
    }

    #[test]
    fn interview_type_round_trips() {
        for ty in [
            InterviewType::Behavioural,
            InterviewType::Technical,
            InterviewType::Mixed,
        ] {
            assert_eq!(ty.as_str().parse::<InterviewType>().unwrap(), ty);
        }
        assert!("onsite".parse::<InterviewType>().is_err());
    }
}
