use uuid::Uuid;

use crate::api::errors::ApiError;
pub(crate) use crate::core::time::primitive_now_utc as now_primitive;
use crate::core::state::AppState;
use crate::db::models::{ExamSession, Submission};
use crate::repositories;
use crate::schemas::session::{QuestionView, ResultSummary, SessionStateResponse};
use crate::services::timing;

pub(crate) async fn fetch_session(
    pool: &sqlx::PgPool,
    session_token: &str,
) -> Result<ExamSession, ApiError> {
    repositories::sessions::find_by_id(pool, session_token)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch session"))?
        .ok_or_else(|| ApiError::not_found("session_not_found", "Session not found"))
}

pub(crate) async fn fetch_submission(
    pool: &sqlx::PgPool,
    session_id: &str,
) -> Result<Submission, ApiError> {
    repositories::submissions::find_by_session(pool, session_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch submission"))?
        .ok_or_else(|| {
            ApiError::internal("missing submission row", "Submitted session has no submission")
        })
}

/// The question the candidate should see next, or `None` once every
/// snapshot entry has an answer. The answer log is positional, so the
/// current index is simply the log length.
pub(crate) fn next_question_view(session: &ExamSession) -> Option<QuestionView> {
    let index = session.answers.0.len();
    let total = session.questions_snapshot.0.len();
    session
        .questions_snapshot
        .0
        .get(index)
        .map(|question| QuestionView::from_snapshot(question, index, total))
}

pub(crate) fn active_state(
    session: &ExamSession,
    now: time::PrimitiveDateTime,
) -> SessionStateResponse {
    SessionStateResponse {
        session_token: session.id.clone(),
        status: session.status,
        remaining_seconds: timing::remaining_seconds(now, session.expires_at),
        answered_count: session.answers.0.len(),
        total_questions: session.questions_snapshot.0.len(),
        question: next_question_view(session),
        termination_reason: None,
        summary: None,
    }
}

pub(crate) fn submitted_state(
    session_token: &str,
    submission: &Submission,
) -> SessionStateResponse {
    SessionStateResponse {
        session_token: session_token.to_string(),
        status: crate::db::types::SessionStatus::Submitted,
        remaining_seconds: 0,
        answered_count: submission.total as usize,
        total_questions: submission.total as usize,
        question: None,
        termination_reason: Some(submission.termination_reason.clone()),
        summary: Some(ResultSummary::from_submission(submission)),
    }
}

/// Best-effort integrity event insert. A failure here must never fail the
/// request that triggered it; the durable disconnect counter on the session
/// row is what termination decisions read.
pub(crate) async fn record_violation(
    state: &AppState,
    session_id: &str,
    event_type: &str,
    details: Option<&str>,
    question_index: Option<i32>,
) {
    let result = repositories::violations::create(
        state.db(),
        repositories::violations::CreateViolation {
            id: &Uuid::new_v4().to_string(),
            session_id,
            event_type,
            details,
            question_index,
            created_at: now_primitive(),
        },
    )
    .await;

    if let Err(err) = result {
        tracing::warn!(error = %err, session_id, event_type, "Failed to record violation event");
    }
}
