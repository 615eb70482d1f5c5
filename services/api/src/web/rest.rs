//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.
//!
//! The caller's identity arrives as an `x-user-id` header; validating that
//! identity is the front door's concern, not this service's.

use crate::web::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use interview_prep_core::domain::{
    Feedback, Interview, InterviewType, InterviewUpdate, NewInterview, QuestionRequest,
    TranscriptEntry, TranscriptRole,
};
use interview_prep_core::feedback::{FeedbackError, RatingTarget, ReconcileOutcome};
use interview_prep_core::ports::PortError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::error;
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

/// Cover art assigned to each generated interview.
const INTERVIEW_COVERS: &[&str] = &[
    "/covers/adobe.png",
    "/covers/amazon.png",
    "/covers/facebook.png",
    "/covers/hostinger.png",
    "/covers/pinterest.png",
    "/covers/quora.png",
    "/covers/reddit.png",
    "/covers/skype.png",
    "/covers/spotify.png",
    "/covers/telegram.png",
    "/covers/tiktok.png",
    "/covers/yahoo.png",
];

const DEFAULT_LATEST_LIMIT: usize = 20;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        generate_interview_handler,
        list_latest_interviews_handler,
        get_interview_handler,
        update_interview_handler,
        list_user_interviews_handler,
        submit_transcript_handler,
        get_feedback_handler,
        rate_interview_handler,
        rate_feedback_handler,
        average_rating_handler,
    ),
    components(schemas(
        GenerateInterviewRequest,
        UpdateInterviewRequest,
        SubmitTranscriptRequest,
        TranscriptEntryRequest,
        RatingRequest,
        InterviewResponse,
        InterviewSummaryResponse,
        ReconcileResponse,
        ReconcileStatus,
        FeedbackResponse,
        CategoryScoreResponse,
        RatingResponse,
        RatingSummaryResponse,
    )),
    tags(
        (name = "Interview Prep API", description = "API endpoints for AI-driven mock interviews and scored feedback.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Request and Response Structs
//=========================================================================================

/// The payload for generating a new interview.
#[derive(Deserialize, ToSchema)]
pub struct GenerateInterviewRequest {
    pub role: String,
    pub level: String,
    /// One of `behavioural`, `technical`, `mixed`.
    #[serde(rename = "type")]
    pub interview_type: String,
    /// Comma-separated technology list, e.g. "React, Node.js".
    pub techstack: String,
    pub amount: u8,
    pub visibility: Option<bool>,
}

/// An owner-initiated edit. The role is fixed at creation and cannot change.
#[derive(Deserialize, ToSchema)]
pub struct UpdateInterviewRequest {
    pub questions: Vec<String>,
    pub visibility: Option<bool>,
}

/// One utterance from the completed voice session.
#[derive(Deserialize, ToSchema)]
pub struct TranscriptEntryRequest {
    /// One of `user`, `assistant`, `system`.
    pub role: String,
    pub content: String,
}

/// The full transcript of a completed interview attempt.
#[derive(Deserialize, ToSchema)]
pub struct SubmitTranscriptRequest {
    pub transcript: Vec<TranscriptEntryRequest>,
}

/// A star rating submission.
#[derive(Deserialize, ToSchema)]
pub struct RatingRequest {
    pub rating: u8,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LatestInterviewsQuery {
    /// Maximum number of interviews to return (default 20).
    pub limit: Option<usize>,
}

#[derive(Serialize, ToSchema)]
pub struct InterviewResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub role: String,
    pub level: String,
    #[serde(rename = "type")]
    pub interview_type: String,
    pub questions: Vec<String>,
    pub techstack: Vec<String>,
    pub visibility: bool,
    pub finalized: bool,
    pub cover_image: String,
    pub created_at: DateTime<Utc>,
}

impl InterviewResponse {
    fn from_domain(interview: Interview) -> Self {
        Self {
            id: interview.id,
            user_id: interview.user_id,
            role: interview.role,
            level: interview.level,
            interview_type: interview.interview_type.as_str().to_string(),
            questions: interview.questions,
            techstack: interview.techstack,
            visibility: interview.visibility,
            finalized: interview.finalized,
            cover_image: interview.cover_image,
            created_at: interview.created_at,
        }
    }
}

/// An interview decorated with its rating summary, for browse listings.
#[derive(Serialize, ToSchema)]
pub struct InterviewSummaryResponse {
    #[serde(flatten)]
    pub interview: InterviewResponse,
    pub average_rating: f64,
    pub rating_count: u32,
}

/// What happened to the freshly scored attempt.
#[derive(Serialize, ToSchema, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileStatus {
    Created,
    Updated,
    Retained,
}

/// The result of submitting a transcript for scoring.
#[derive(Serialize, ToSchema)]
pub struct ReconcileResponse {
    pub feedback_id: Uuid,
    pub status: ReconcileStatus,
    /// Present only when the previous score was kept: the score the new
    /// attempt would have received.
    pub discarded_score: Option<u8>,
}

#[derive(Serialize, ToSchema)]
pub struct CategoryScoreResponse {
    pub name: String,
    pub score: u8,
    pub comment: String,
}

#[derive(Serialize, ToSchema)]
pub struct FeedbackResponse {
    pub id: Uuid,
    pub interview_id: Uuid,
    pub user_id: Uuid,
    pub total_score: u8,
    pub category_scores: Vec<CategoryScoreResponse>,
    pub strengths: Vec<String>,
    pub areas_for_improvement: Vec<String>,
    pub final_assessment: String,
    pub user_rating: Option<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FeedbackResponse {
    fn from_domain(feedback: Feedback) -> Self {
        Self {
            id: feedback.id,
            interview_id: feedback.interview_id,
            user_id: feedback.user_id,
            total_score: feedback.total_score,
            category_scores: feedback
                .category_scores
                .into_iter()
                .map(|c| CategoryScoreResponse {
                    name: c.name.as_str().to_string(),
                    score: c.score,
                    comment: c.comment,
                })
                .collect(),
            strengths: feedback.strengths,
            areas_for_improvement: feedback.areas_for_improvement,
            final_assessment: feedback.final_assessment,
            user_rating: feedback.user_rating,
            created_at: feedback.created_at,
            updated_at: feedback.updated_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct RatingResponse {
    pub feedback_id: Uuid,
}

#[derive(Serialize, ToSchema)]
pub struct RatingSummaryResponse {
    pub average: f64,
    pub count: u32,
}

//=========================================================================================
// Shared Extraction and Error Mapping
//=========================================================================================

fn require_user_id(headers: &HeaderMap) -> Result<Uuid, (StatusCode, String)> {
    let user_id_str = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                "x-user-id header is required".to_string(),
            )
        })?;

    Uuid::parse_str(user_id_str).map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            "Invalid x-user-id format".to_string(),
        )
    })
}

fn optional_user_id(headers: &HeaderMap) -> Result<Option<Uuid>, (StatusCode, String)> {
    match headers.get("x-user-id") {
        None => Ok(None),
        Some(_) => require_user_id(headers).map(Some),
    }
}

fn port_error_response(context: &str, e: PortError) -> (StatusCode, String) {
    match e {
        PortError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        PortError::Unauthorized => (
            StatusCode::FORBIDDEN,
            "Only the interview's creator may do that".to_string(),
        ),
        PortError::Unexpected(_) => {
            error!("{}: {:?}", context, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("{} failed", context),
            )
        }
    }
}

/// Maps engine errors onto the three user-visible states the UI knows how to
/// show: scoring trouble (retry), bad input, or "something went wrong".
fn feedback_error_response(context: &str, e: FeedbackError) -> (StatusCode, String) {
    match e {
        FeedbackError::MalformedScoreResult(_) => {
            error!("{}: {:?}", context, e);
            (
                StatusCode::BAD_GATEWAY,
                "The scoring model returned an unusable result".to_string(),
            )
        }
        FeedbackError::ScoringTimeout(_) | FeedbackError::ScoringUnavailable(_) => {
            error!("{}: {:?}", context, e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Scoring is temporarily unavailable, please try again".to_string(),
            )
        }
        FeedbackError::PersistenceFailure(_) => {
            error!("{}: {:?}", context, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("{} failed", context),
            )
        }
        FeedbackError::FeedbackNotFound => (
            StatusCode::NOT_FOUND,
            "No feedback found for this interview".to_string(),
        ),
        FeedbackError::InvalidRating(r) => (
            StatusCode::BAD_REQUEST,
            format!("Rating {} is outside the allowed 1-5 range", r),
        ),
    }
}

fn parse_transcript(
    entries: Vec<TranscriptEntryRequest>,
) -> Result<Vec<TranscriptEntry>, (StatusCode, String)> {
    if entries.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Transcript must not be empty".to_string(),
        ));
    }
    entries
        .into_iter()
        .map(|entry| {
            let role = entry.role.parse::<TranscriptRole>().map_err(|e| {
                (StatusCode::BAD_REQUEST, e.to_string())
            })?;
            Ok(TranscriptEntry {
                role,
                content: entry.content,
            })
        })
        .collect()
}

//=========================================================================================
// Interview Handlers
//=========================================================================================

/// Generate a new interview from role, level, tech stack, and focus.
///
/// The question list comes from the question-generation model; the interview
/// is persisted as finalized and owned by the calling user.
#[utoipa::path(
    post,
    path = "/interviews",
    request_body = GenerateInterviewRequest,
    responses(
        (status = 201, description = "Interview created successfully", body = InterviewResponse),
        (status = 400, description = "Bad request (e.g., missing header or invalid type)"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn generate_interview_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<GenerateInterviewRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user_id = require_user_id(&headers)?;

    let interview_type = req
        .interview_type
        .parse::<InterviewType>()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    if req.amount == 0 {
        return Err((
            StatusCode::BAD_REQUEST,
            "At least one question is required".to_string(),
        ));
    }

    let techstack: Vec<String> = req
        .techstack
        .split(',')
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();

    let question_request = QuestionRequest {
        role: req.role.clone(),
        level: req.level.clone(),
        interview_type,
        techstack: techstack.clone(),
        amount: req.amount,
    };
    let questions = app_state
        .question_adapter
        .generate_questions(&question_request)
        .await
        .map_err(|e| port_error_response("Question generation", e))?;

    let cover_image =
        INTERVIEW_COVERS[Uuid::new_v4().as_u128() as usize % INTERVIEW_COVERS.len()];
    let new_interview = NewInterview {
        user_id,
        role: req.role,
        level: req.level,
        interview_type,
        questions,
        techstack,
        visibility: req.visibility,
        cover_image: cover_image.to_string(),
    };

    let interview = app_state
        .db
        .create_interview(new_interview)
        .await
        .map_err(|e| port_error_response("Interview creation", e))?;

    Ok((
        StatusCode::CREATED,
        Json(InterviewResponse::from_domain(interview)),
    ))
}

/// List the latest public interviews from other users.
///
/// Each entry carries its rating summary; the list is sorted best-rated
/// first and bounded by `limit`.
#[utoipa::path(
    get,
    path = "/interviews",
    responses(
        (status = 200, description = "Latest public interviews", body = [InterviewSummaryResponse]),
        (status = 400, description = "Bad request"),
        (status = 500, description = "Internal server error")
    ),
    params(
        LatestInterviewsQuery,
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn list_latest_interviews_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<LatestInterviewsQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user_id = require_user_id(&headers)?;
    let limit = query.limit.unwrap_or(DEFAULT_LATEST_LIMIT);

    let interviews = app_state
        .db
        .get_latest_interviews(user_id)
        .await
        .map_err(|e| port_error_response("Interview listing", e))?;

    let mut summaries = Vec::new();
    for interview in interviews.into_iter().filter(|i| i.visibility) {
        let summary = app_state
            .engine
            .average_rating(interview.id)
            .await
            .map_err(|e| feedback_error_response("Rating summary", e))?;
        summaries.push(InterviewSummaryResponse {
            interview: InterviewResponse::from_domain(interview),
            average_rating: summary.average,
            rating_count: summary.count,
        });
    }

    summaries.sort_by(|a, b| {
        b.average_rating
            .partial_cmp(&a.average_rating)
            .unwrap_or(Ordering::Equal)
    });
    summaries.truncate(limit);

    Ok(Json(summaries))
}

/// Fetch a single interview.
///
/// Private interviews are visible only to their owner; everyone else sees
/// "not found" rather than a hint that the interview exists.
#[utoipa::path(
    get,
    path = "/interviews/{id}",
    responses(
        (status = 200, description = "The interview", body = InterviewResponse),
        (status = 404, description = "Interview not found or not visible"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("id" = Uuid, Path, description = "The interview ID."),
        ("x-user-id" = Option<Uuid>, Header, description = "The unique ID of the requesting user, if any.")
    )
)]
pub async fn get_interview_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let requesting_user = optional_user_id(&headers)?;

    let interview = app_state
        .db
        .get_interview_by_id(id)
        .await
        .map_err(|e| port_error_response("Interview fetch", e))?;

    if !interview.visibility && requesting_user != Some(interview.user_id) {
        return Err((
            StatusCode::NOT_FOUND,
            format!("Interview {} not found", id),
        ));
    }

    Ok(Json(InterviewResponse::from_domain(interview)))
}

/// Edit an interview's questions and visibility. Owner only.
#[utoipa::path(
    patch,
    path = "/interviews/{id}",
    request_body = UpdateInterviewRequest,
    responses(
        (status = 200, description = "Interview updated"),
        (status = 400, description = "Bad request"),
        (status = 403, description = "Caller does not own the interview"),
        (status = 404, description = "Interview not found"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("id" = Uuid, Path, description = "The interview ID."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn update_interview_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateInterviewRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user_id = require_user_id(&headers)?;

    if req.questions.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "An interview needs at least one question".to_string(),
        ));
    }

    let update = InterviewUpdate {
        questions: req.questions,
        visibility: req.visibility,
    };
    app_state
        .db
        .update_interview(id, user_id, update)
        .await
        .map_err(|e| port_error_response("Interview update", e))?;

    Ok(StatusCode::OK)
}

/// List all interviews owned by a user, newest first.
#[utoipa::path(
    get,
    path = "/users/{id}/interviews",
    responses(
        (status = 200, description = "The user's interviews", body = [InterviewResponse]),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("id" = Uuid, Path, description = "The user ID.")
    )
)]
pub async fn list_user_interviews_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let interviews = app_state
        .db
        .get_interviews_by_user(id)
        .await
        .map_err(|e| port_error_response("Interview listing", e))?;

    let responses: Vec<InterviewResponse> = interviews
        .into_iter()
        .map(InterviewResponse::from_domain)
        .collect();
    Ok(Json(responses))
}

//=========================================================================================
// Feedback Handlers
//=========================================================================================

/// Score a completed interview attempt and reconcile the result.
///
/// The response tells the caller which of the three user-visible states to
/// show: a new best score was recorded (`created`/`updated`), or the
/// previous score was kept because the new attempt scored lower
/// (`retained`, with the discarded score).
#[utoipa::path(
    post,
    path = "/interviews/{id}/feedback",
    request_body = SubmitTranscriptRequest,
    responses(
        (status = 200, description = "Existing feedback reconciled", body = ReconcileResponse),
        (status = 201, description = "First feedback created", body = ReconcileResponse),
        (status = 400, description = "Bad request"),
        (status = 502, description = "The scoring model returned an unusable result"),
        (status = 503, description = "Scoring temporarily unavailable, retry later"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("id" = Uuid, Path, description = "The interview ID."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn submit_transcript_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<SubmitTranscriptRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user_id = require_user_id(&headers)?;
    let transcript = parse_transcript(req.transcript)?;

    let outcome = app_state
        .engine
        .reconcile_feedback(id, user_id, &transcript)
        .await
        .map_err(|e| feedback_error_response("Feedback reconciliation", e))?;

    let (status, response) = match outcome {
        ReconcileOutcome::Created(feedback_id) => (
            StatusCode::CREATED,
            ReconcileResponse {
                feedback_id,
                status: ReconcileStatus::Created,
                discarded_score: None,
            },
        ),
        ReconcileOutcome::Updated(feedback_id) => (
            StatusCode::OK,
            ReconcileResponse {
                feedback_id,
                status: ReconcileStatus::Updated,
                discarded_score: None,
            },
        ),
        ReconcileOutcome::Retained {
            feedback_id,
            discarded_score,
        } => (
            StatusCode::OK,
            ReconcileResponse {
                feedback_id,
                status: ReconcileStatus::Retained,
                discarded_score: Some(discarded_score),
            },
        ),
    };

    Ok((status, Json(response)))
}

/// Fetch the calling user's feedback for an interview.
#[utoipa::path(
    get,
    path = "/interviews/{id}/feedback",
    responses(
        (status = 200, description = "The user's feedback", body = FeedbackResponse),
        (status = 404, description = "No feedback for this user and interview"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("id" = Uuid, Path, description = "The interview ID."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn get_feedback_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user_id = require_user_id(&headers)?;

    let feedback = app_state
        .db
        .get_feedback_for_attempt(id, user_id)
        .await
        .map_err(|e| port_error_response("Feedback fetch", e))?
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                "No feedback found for this interview".to_string(),
            )
        })?;

    Ok(Json(FeedbackResponse::from_domain(feedback)))
}

//=========================================================================================
// Rating Handlers
//=========================================================================================

/// Rate an interview via the caller's feedback record.
#[utoipa::path(
    post,
    path = "/interviews/{id}/rating",
    request_body = RatingRequest,
    responses(
        (status = 200, description = "Rating saved", body = RatingResponse),
        (status = 400, description = "Rating outside the 1-5 range"),
        (status = 404, description = "No feedback to attach the rating to"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("id" = Uuid, Path, description = "The interview ID."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn rate_interview_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<RatingRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user_id = require_user_id(&headers)?;

    let target = RatingTarget::Attempt {
        interview_id: id,
        user_id,
    };
    let feedback_id = app_state
        .engine
        .attach_rating(target, req.rating)
        .await
        .map_err(|e| feedback_error_response("Rating submission", e))?;

    Ok(Json(RatingResponse { feedback_id }))
}

/// Rate an interview by feedback record id.
#[utoipa::path(
    post,
    path = "/feedback/{id}/rating",
    request_body = RatingRequest,
    responses(
        (status = 200, description = "Rating saved", body = RatingResponse),
        (status = 400, description = "Rating outside the 1-5 range"),
        (status = 404, description = "Feedback not found"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("id" = Uuid, Path, description = "The feedback ID.")
    )
)]
pub async fn rate_feedback_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<RatingRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let feedback_id = app_state
        .engine
        .attach_rating(RatingTarget::FeedbackId(id), req.rating)
        .await
        .map_err(|e| feedback_error_response("Rating submission", e))?;

    Ok(Json(RatingResponse { feedback_id }))
}

/// The mean of all ratings attached to an interview's feedback records.
#[utoipa::path(
    get,
    path = "/interviews/{id}/rating",
    responses(
        (status = 200, description = "The rating summary", body = RatingSummaryResponse),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("id" = Uuid, Path, description = "The interview ID.")
    )
)]
pub async fn average_rating_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let summary = app_state
        .engine
        .average_rating(id)
        .await
        .map_err(|e| feedback_error_response("Rating summary", e))?;

    Ok(Json(RatingSummaryResponse {
        average: summary.average,
        count: summary.count,
    }))
}
