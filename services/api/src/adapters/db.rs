//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use interview_prep_core::domain::{
    resolve_visibility, CategoryScore, Feedback, Interview, InterviewType, InterviewUpdate,
    NewFeedback, NewInterview, ScoreReport,
};
use interview_prep_core::ports::{DatabaseService, FeedbackInsert, PortError, PortResult};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

const INTERVIEW_COLUMNS: &str =
    "id, user_id, role, level, interview_type, questions, techstack, visibility, finalized, \
     cover_image, created_at";

const FEEDBACK_COLUMNS: &str =
    "id, interview_id, user_id, total_score, category_scores, strengths, \
     areas_for_improvement, final_assessment, user_rating, created_at, updated_at";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct InterviewRecord {
    id: Uuid,
    user_id: Uuid,
    role: String,
    level: String,
    interview_type: String,
    questions: Vec<String>,
    techstack: Vec<String>,
    visibility: Option<bool>,
    finalized: bool,
    cover_image: String,
    created_at: DateTime<Utc>,
}

impl InterviewRecord {
    fn to_domain(self) -> PortResult<Interview> {
        let interview_type = self
            .interview_type
            .parse::<InterviewType>()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(Interview {
            id: self.id,
            user_id: self.user_id,
            role: self.role,
            level: self.level,
            interview_type,
            questions: self.questions,
            techstack: self.techstack,
            // The stored flag is nullable; the public-by-default rule is
            // applied here, at the read boundary.
            visibility: resolve_visibility(self.visibility),
            finalized: self.finalized,
            cover_image: self.cover_image,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct FeedbackRecord {
    id: Uuid,
    interview_id: Uuid,
    user_id: Uuid,
    total_score: i16,
    category_scores: serde_json::Value,
    strengths: Vec<String>,
    areas_for_improvement: Vec<String>,
    final_assessment: String,
    user_rating: Option<i16>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl FeedbackRecord {
    fn to_domain(self) -> PortResult<Feedback> {
        let category_scores: Vec<CategoryScore> = serde_json::from_value(self.category_scores)
            .map_err(|e| {
                PortError::Unexpected(format!("Malformed category scores in storage: {}", e))
            })?;
        let total_score = u8::try_from(self.total_score).map_err(|_| {
            PortError::Unexpected(format!("Stored total score {} out of range", self.total_score))
        })?;
        let user_rating = match self.user_rating {
            Some(r) => Some(u8::try_from(r).map_err(|_| {
                PortError::Unexpected(format!("Stored rating {} out of range", r))
            })?),
            None => None,
        };
        Ok(Feedback {
            id: self.id,
            interview_id: self.interview_id,
            user_id: self.user_id,
            total_score,
            category_scores,
            strengths: self.strengths,
            areas_for_improvement: self.areas_for_improvement,
            final_assessment: self.final_assessment,
            user_rating,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn category_scores_json(report: &ScoreReport) -> PortResult<serde_json::Value> {
    serde_json::to_value(&report.category_scores)
        .map_err(|e| PortError::Unexpected(format!("Failed to serialize category scores: {}", e)))
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_interview(&self, new: NewInterview) -> PortResult<Interview> {
        let sql = format!(
            "INSERT INTO interviews \
             (id, user_id, role, level, interview_type, questions, techstack, visibility, \
              finalized, cover_image, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, TRUE, $9, $10) \
             RETURNING {INTERVIEW_COLUMNS}"
        );
        let record = sqlx::query_as::<_, InterviewRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(new.user_id)
            .bind(&new.role)
            .bind(&new.level)
            .bind(new.interview_type.as_str())
            .bind(&new.questions)
            .bind(&new.techstack)
            .bind(new.visibility)
            .bind(&new.cover_image)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;
        record.to_domain()
    }

    async fn get_interview_by_id(&self, interview_id: Uuid) -> PortResult<Interview> {
        let sql = format!("SELECT {INTERVIEW_COLUMNS} FROM interviews WHERE id = $1");
        let record = sqlx::query_as::<_, InterviewRecord>(&sql)
            .bind(interview_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => {
                    PortError::NotFound(format!("Interview {} not found", interview_id))
                }
                _ => unexpected(e),
            })?;
        record.to_domain()
    }

    async fn get_interviews_by_user(&self, user_id: Uuid) -> PortResult<Vec<Interview>> {
        let sql = format!(
            "SELECT {INTERVIEW_COLUMNS} FROM interviews \
             WHERE user_id = $1 ORDER BY created_at DESC"
        );
        let records = sqlx::query_as::<_, InterviewRecord>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn get_latest_interviews(&self, exclude_user: Uuid) -> PortResult<Vec<Interview>> {
        let sql = format!(
            "SELECT {INTERVIEW_COLUMNS} FROM interviews \
             WHERE finalized = TRUE AND user_id <> $1 ORDER BY created_at DESC"
        );
        let records = sqlx::query_as::<_, InterviewRecord>(&sql)
            .bind(exclude_user)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn update_interview(
        &self,
        interview_id: Uuid,
        user_id: Uuid,
        update: InterviewUpdate,
    ) -> PortResult<()> {
        let interview = self.get_interview_by_id(interview_id).await?;
        if interview.user_id != user_id {
            return Err(PortError::Unauthorized);
        }

        // COALESCE leaves the stored flag untouched when no new value was
        // supplied, so an absent flag stays absent.
        sqlx::query(
            "UPDATE interviews SET questions = $2, visibility = COALESCE($3, visibility) \
             WHERE id = $1",
        )
        .bind(interview_id)
        .bind(&update.questions)
        .bind(update.visibility)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn get_feedback_for_attempt(
        &self,
        interview_id: Uuid,
        user_id: Uuid,
    ) -> PortResult<Option<Feedback>> {
        let sql = format!(
            "SELECT {FEEDBACK_COLUMNS} FROM feedback \
             WHERE interview_id = $1 AND user_id = $2"
        );
        let record = sqlx::query_as::<_, FeedbackRecord>(&sql)
            .bind(interview_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?;
        record.map(|r| r.to_domain()).transpose()
    }

    async fn create_feedback_if_absent(&self, new: NewFeedback) -> PortResult<FeedbackInsert> {
        let categories = category_scores_json(&new.report)?;
        let now = Utc::now();

        // The unique constraint on (interview_id, user_id) makes this insert
        // the single point where the at-most-one invariant is decided, even
        // under concurrent attempts. No row back means we lost the race.
        let sql = format!(
            "INSERT INTO feedback \
             (id, interview_id, user_id, total_score, category_scores, strengths, \
              areas_for_improvement, final_assessment, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9) \
             ON CONFLICT (interview_id, user_id) DO NOTHING \
             RETURNING {FEEDBACK_COLUMNS}"
        );
        let inserted = sqlx::query_as::<_, FeedbackRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(new.interview_id)
            .bind(new.user_id)
            .bind(i16::from(new.report.total_score))
            .bind(categories)
            .bind(&new.report.strengths)
            .bind(&new.report.areas_for_improvement)
            .bind(&new.report.final_assessment)
            .bind(now)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?;

        if let Some(record) = inserted {
            return Ok(FeedbackInsert::Inserted(record.to_domain()?));
        }

        // Feedback rows are never deleted, so the conflicting row must exist.
        match self
            .get_feedback_for_attempt(new.interview_id, new.user_id)
            .await?
        {
            Some(winner) => Ok(FeedbackInsert::AlreadyExists(winner)),
            None => Err(PortError::Unexpected(
                "Feedback insert conflicted but no existing row was found".to_string(),
            )),
        }
    }

    async fn update_feedback_scores(
        &self,
        feedback_id: Uuid,
        report: ScoreReport,
    ) -> PortResult<()> {
        let categories = category_scores_json(&report)?;
        let result = sqlx::query(
            "UPDATE feedback SET total_score = $2, category_scores = $3, strengths = $4, \
             areas_for_improvement = $5, final_assessment = $6, updated_at = $7 \
             WHERE id = $1",
        )
        .bind(feedback_id)
        .bind(i16::from(report.total_score))
        .bind(categories)
        .bind(&report.strengths)
        .bind(&report.areas_for_improvement)
        .bind(&report.final_assessment)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Feedback {} not found",
                feedback_id
            )));
        }
        Ok(())
    }

    async fn set_feedback_rating(&self, feedback_id: Uuid, rating: u8) -> PortResult<()> {
        let result = sqlx::query("UPDATE feedback SET user_rating = $2 WHERE id = $1")
            .bind(feedback_id)
            .bind(i16::from(rating))
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Feedback {} not found",
                feedback_id
            )));
        }
        Ok(())
    }

    async fn get_feedback_for_interview(&self, interview_id: Uuid) -> PortResult<Vec<Feedback>> {
        let sql = format!(
            "SELECT {FEEDBACK_COLUMNS} FROM feedback \
             WHERE interview_id = $1 ORDER BY created_at ASC"
        );
        let records = sqlx::query_as::<_, FeedbackRecord>(&sql)
            .bind(interview_id)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }
}
