//! The sync façade: push-then-pull orchestration over HTTP. This is the only
//! surface exposed to the API gateway.

use axum::extract::{Json, State};
use axum::routing::{get, post};
use axum::Router;
use chrono::{Duration, NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::SyncError;
use crate::ingest::{self, AttemptPayload};
use crate::model::{Question, Submission};
use crate::schema::attempts;
use crate::{analysis, selection, session, utils, DbPool};

pub fn sync_router(pool: DbPool) -> Router {
    Router::new()
        .route("/push", post(push))
        .route("/pull", post(pull))
        .route("/status", get(status))
        .with_state(pool)
}

#[derive(Debug, Deserialize, Validate)]
pub struct PushRequest {
    #[validate(length(min = 1, message = "device_id must not be empty"))]
    pub device_id: String,
    pub attempts: Vec<AttemptPayload>,
}

#[derive(Debug, Serialize)]
pub struct PushResponse {
    pub status: &'static str,
    pub synced_count: usize,
    pub failed_count: usize,
    pub message: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PullRequest {
    #[serde(default)]
    pub last_sync_timestamp: Option<String>,
    #[serde(default)]
    pub subjects: Vec<String>,
    #[validate(range(min = 1, max = 500, message = "limit must be between 1 and 500"))]
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct QuestionPayload {
    pub id: i32,
    pub subject: String,
    pub topic: String,
    pub content: String,
    pub options: Vec<String>,
    pub correct_index: i32,
    pub difficulty: String,
    pub updated_at: String,
}

impl From<Question> for QuestionPayload {
    fn from(question: Question) -> Self {
        let options = serde_json::from_str(&question.options).unwrap_or_else(|e| {
            log::warn!("Question {} has a malformed options payload: {}", question.id, e);
            Vec::new()
        });
        QuestionPayload {
            id: question.id,
            subject: question.subject,
            topic: question.topic,
            content: question.content,
            options,
            correct_index: question.correct_index,
            difficulty: question.difficulty,
            updated_at: utils::to_rfc3339(question.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GradePayload {
    pub submission_id: i32,
    pub assignment_id: i32,
    pub grade: f64,
    pub feedback: Option<String>,
    pub graded_at: String,
}

impl From<Submission> for GradePayload {
    fn from(submission: Submission) -> Self {
        GradePayload {
            submission_id: submission.id,
            assignment_id: submission.assignment_id,
            grade: submission.grade,
            feedback: submission.feedback,
            graded_at: utils::to_rfc3339(submission.graded_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PullResponse {
    pub questions: Vec<QuestionPayload>,
    pub weak_topics: Vec<String>,
    pub total_attempts: usize,
    pub accuracy: f64,
    pub synced_at: String,
    pub new_grades: Vec<GradePayload>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub total_attempts: usize,
    pub accuracy: f64,
    pub weak_topics: Vec<String>,
    pub due_count: usize,
    pub last_synced_at: Option<String>,
}

pub async fn push(
    State(pool): State<DbPool>,
    session: tower_sessions::Session,
    Json(payload): Json<PushRequest>,
) -> Result<Json<PushResponse>, SyncError> {
    let user_id = session::current_user_id(&session)
        .await
        .ok_or(SyncError::Unauthorized)?;
    payload.validate()?;

    let mut conn = pool.get()?;
    let now = Utc::now().naive_utc();
    let outcome = ingest::ingest_batch(
        &mut conn,
        user_id,
        &payload.device_id,
        &payload.attempts,
        now,
    );

    log::info!(
        "Push from user {} device {}: {} synced, {} skipped, {} failed",
        user_id,
        payload.device_id,
        outcome.synced,
        outcome.skipped,
        outcome.failed
    );

    let message = if outcome.skipped > 0 {
        format!(
            "Synced {} attempts ({} already synced, {} failed)",
            outcome.synced, outcome.skipped, outcome.failed
        )
    } else {
        format!("Synced {} attempts ({} failed)", outcome.synced, outcome.failed)
    };

    Ok(Json(PushResponse {
        status: if outcome.failed == 0 { "success" } else { "partial" },
        synced_count: outcome.synced,
        failed_count: outcome.failed,
        message,
    }))
}

pub async fn pull(
    State(pool): State<DbPool>,
    session: tower_sessions::Session,
    Json(payload): Json<PullRequest>,
) -> Result<Json<PullResponse>, SyncError> {
    let user_id = session::current_user_id(&session)
        .await
        .ok_or(SyncError::Unauthorized)?;
    payload.validate()?;

    let cursor = match payload.last_sync_timestamp.as_deref() {
        Some(raw) => Some(utils::parse_client_timestamp(raw).ok_or_else(|| {
            SyncError::BadRequest(format!("Unparseable last_sync_timestamp: {raw}"))
        })?),
        None => None,
    };
    let limit = payload.limit.unwrap_or(selection::DEFAULT_PULL_LIMIT);

    let mut conn = pool.get()?;
    let now = Utc::now().naive_utc();

    let history = analysis::load_history(&mut conn, user_id)?;
    let weak_topics = analysis::weak_topics(&history);
    let (total_attempts, accuracy) = analysis::totals(&history);

    let questions = match cursor {
        Some(cursor) => selection::select_delta(&mut conn, cursor, &payload.subjects, limit)?,
        None => {
            let due_ids = analysis::due_question_ids(&history, now);
            selection::select_bootstrap(&mut conn, &payload.subjects, limit, &due_ids, &weak_topics)?
        }
    };

    let grade_watermark = cursor
        .unwrap_or_else(|| now - Duration::days(selection::BOOTSTRAP_GRADE_WINDOW_DAYS));
    let grades = selection::graded_since(&mut conn, user_id, grade_watermark)?;

    log::info!(
        "Pull for user {}: {} questions ({} mode), {} new grades",
        user_id,
        questions.len(),
        if cursor.is_some() { "delta" } else { "bootstrap" },
        grades.len()
    );

    Ok(Json(PullResponse {
        questions: questions.into_iter().map(Into::into).collect(),
        weak_topics,
        total_attempts,
        accuracy,
        synced_at: utils::to_rfc3339(now),
        new_grades: grades.into_iter().map(Into::into).collect(),
    }))
}

/// Read-only dashboard summary; reuses the pull-side analysis.
pub async fn status(
    State(pool): State<DbPool>,
    session: tower_sessions::Session,
) -> Result<Json<StatusResponse>, SyncError> {
    let user_id = session::current_user_id(&session)
        .await
        .ok_or(SyncError::Unauthorized)?;

    let mut conn = pool.get()?;
    let now = Utc::now().naive_utc();

    let history = analysis::load_history(&mut conn, user_id)?;
    let (total_attempts, accuracy) = analysis::totals(&history);
    let weak_topics = analysis::weak_topics(&history);
    let due_count = analysis::due_question_ids(&history, now).len();

    let last_synced_at: Option<NaiveDateTime> = attempts::table
        .filter(attempts::user_id.eq(user_id))
        .select(diesel::dsl::max(attempts::synced_at))
        .first(&mut conn)?;

    Ok(Json(StatusResponse {
        total_attempts,
        accuracy,
        weak_topics,
        due_count,
        last_synced_at: last_synced_at.map(utils::to_rfc3339),
    }))
}
