use axum::{
    extract::{Path, State},
    Json,
};
use sqlx::types::Json as SqlJson;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{require_session_match, SessionCapability};
use crate::api::sessions::{helpers, DISCONNECT_TERMINATION_THRESHOLD};
use crate::core::state::AppState;
use crate::core::time::format_primitive;
use crate::db::models::AnswerEntry;
use crate::db::types::SessionStatus;
use crate::repositories;
use crate::schemas::session::{
    DisconnectResponse, SessionStateResponse, SubmitAnswerRequest, ViolationAckResponse,
    ViolationReportRequest,
};
use crate::services::finalize::{self, FinalizeReason};
use crate::services::timing;

pub(in crate::api::sessions) async fn get_question(
    Path(session_token): Path<String>,
    SessionCapability(claims): SessionCapability,
    State(state): State<AppState>,
) -> Result<Json<SessionStateResponse>, ApiError> {
    require_session_match(&claims, &session_token)?;

    let session = helpers::fetch_session(state.db(), &session_token).await?;
    let now = helpers::now_primitive();

    if session.status == SessionStatus::Submitted {
        let submission = helpers::fetch_submission(state.db(), &session.id).await?;
        return Ok(Json(helpers::submitted_state(&session_token, &submission)));
    }

    // Expiry is discovered lazily; no call path assumes a sweeper ran first.
    if timing::is_expired(now, session.expires_at) {
        let submission =
            finalize::finalize_session(state.db(), &session.id, FinalizeReason::TimerExpired)
                .await
                .map_err(|e| ApiError::internal(e, "Failed to finalize expired session"))?;
        return Ok(Json(helpers::submitted_state(&session_token, &submission)));
    }

    if session.answers.0.len() >= session.questions_snapshot.0.len() {
        let submission =
            finalize::finalize_session(state.db(), &session.id, FinalizeReason::Completed)
                .await
                .map_err(|e| ApiError::internal(e, "Failed to finalize completed session"))?;
        return Ok(Json(helpers::submitted_state(&session_token, &submission)));
    }

    Ok(Json(helpers::active_state(&session, now)))
}

pub(in crate::api::sessions) async fn submit_answer(
    Path(session_token): Path<String>,
    SessionCapability(claims): SessionCapability,
    State(state): State<AppState>,
    Json(payload): Json<SubmitAnswerRequest>,
) -> Result<Json<SessionStateResponse>, ApiError> {
    require_session_match(&claims, &session_token)?;
    payload.validate().map_err(|e| ApiError::bad_request("validation_error", e.to_string()))?;

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to begin answer transaction"))?;

    let session = repositories::sessions::lock_by_id(&mut *tx, &session_token)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to lock session"))?
        .ok_or_else(|| ApiError::not_found("session_not_found", "Session not found"))?;

    if session.status == SessionStatus::Submitted {
        tx.rollback().await.ok();
        let submission = helpers::fetch_submission(state.db(), &session.id).await?;
        return Ok(Json(helpers::submitted_state(&session_token, &submission)));
    }

    let now = helpers::now_primitive();
    if timing::is_expired(now, session.expires_at) {
        // Release the row lock before the finalizer takes its own.
        tx.rollback().await.ok();
        let submission =
            finalize::finalize_session(state.db(), &session.id, FinalizeReason::TimerExpired)
                .await
                .map_err(|e| ApiError::internal(e, "Failed to finalize expired session"))?;
        return Ok(Json(helpers::submitted_state(&session_token, &submission)));
    }

    let index = session.answers.0.len();
    let Some(expected) = session.questions_snapshot.0.get(index) else {
        tx.rollback().await.ok();
        let submission =
            finalize::finalize_session(state.db(), &session.id, FinalizeReason::Completed)
                .await
                .map_err(|e| ApiError::internal(e, "Failed to finalize completed session"))?;
        return Ok(Json(helpers::submitted_state(&session_token, &submission)));
    };

    if payload.question_id != expected.question_id {
        return Err(ApiError::bad_request(
            "invalid_question_sequence",
            format!("Expected an answer for question at position {index}"),
        ));
    }

    if let Some(selected) = &payload.selected_option {
        let known = expected.options.iter().any(|option| &option.key == selected);
        if !known {
            return Err(ApiError::bad_request(
                "invalid_option_for_question",
                "Selected option does not belong to this question",
            ));
        }
    }

    let mut answers = session.answers.0.clone();
    answers.push(AnswerEntry {
        question_id: payload.question_id,
        selected_option: payload.selected_option,
        answered_at: format_primitive(now),
    });
    let answered = answers.len();
    let total = session.questions_snapshot.0.len();

    repositories::sessions::update_answers(&mut *tx, &session.id, SqlJson(answers), now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to append answer"))?;
    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit answer"))?;

    if answered >= total {
        let submission =
            finalize::finalize_session(state.db(), &session.id, FinalizeReason::Completed)
                .await
                .map_err(|e| ApiError::internal(e, "Failed to finalize completed session"))?;
        return Ok(Json(helpers::submitted_state(&session_token, &submission)));
    }

    let session = helpers::fetch_session(state.db(), &session_token).await?;
    Ok(Json(helpers::active_state(&session, now)))
}

pub(in crate::api::sessions) async fn disconnect(
    Path(session_token): Path<String>,
    SessionCapability(claims): SessionCapability,
    State(state): State<AppState>,
) -> Result<Json<DisconnectResponse>, ApiError> {
    require_session_match(&claims, &session_token)?;

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to begin disconnect transaction"))?;

    let session = repositories::sessions::lock_by_id(&mut *tx, &session_token)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to lock session"))?
        .ok_or_else(|| ApiError::not_found("session_not_found", "Session not found"))?;

    if session.status == SessionStatus::Submitted {
        tx.rollback().await.ok();
        return Ok(Json(DisconnectResponse {
            disconnect_count: session.disconnect_count,
            terminated: true,
        }));
    }

    let now = helpers::now_primitive();
    if timing::is_expired(now, session.expires_at) {
        tx.rollback().await.ok();
        finalize::finalize_session(state.db(), &session.id, FinalizeReason::TimerExpired)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to finalize expired session"))?;
        return Ok(Json(DisconnectResponse {
            disconnect_count: session.disconnect_count,
            terminated: true,
        }));
    }

    let disconnects = repositories::sessions::increment_disconnects(&mut *tx, &session.id, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to record disconnect"))?;
    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit disconnect"))?;

    helpers::record_violation(
        &state,
        &session.id,
        "disconnect",
        None,
        Some(session.answers.0.len() as i32),
    )
    .await;
    state.redis().cache_disconnect_count(&session.id, disconnects).await;

    let terminated = disconnects >= DISCONNECT_TERMINATION_THRESHOLD;
    if terminated {
        finalize::finalize_session(state.db(), &session.id, FinalizeReason::SecondDisconnect)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to finalize disconnected session"))?;
        tracing::info!(session_token = %session.id, disconnects, "session terminated on disconnect");
    }

    Ok(Json(DisconnectResponse { disconnect_count: disconnects, terminated }))
}

pub(in crate::api::sessions) async fn report_violation(
    Path(session_token): Path<String>,
    SessionCapability(claims): SessionCapability,
    State(state): State<AppState>,
    Json(payload): Json<ViolationReportRequest>,
) -> Result<Json<ViolationAckResponse>, ApiError> {
    require_session_match(&claims, &session_token)?;
    payload.validate().map_err(|e| ApiError::bad_request("validation_error", e.to_string()))?;

    let exam = state.settings().exam();
    let allowed = state
        .redis()
        .rate_limit(
            &format!("violations:{session_token}"),
            exam.violation_report_limit,
            exam.violation_report_window_seconds,
        )
        .await
        .unwrap_or(true);
    if !allowed {
        return Err(ApiError::TooManyRequests("Violation reports are rate limited"));
    }

    // The recorder stays append-only after finalization: late events land in
    // the log for post-hoc analytics, while the count frozen into the
    // submission at grading time is unaffected.
    let session = helpers::fetch_session(state.db(), &session_token).await?;

    helpers::record_violation(
        &state,
        &session.id,
        &payload.event_type,
        payload.details.as_deref(),
        payload.question_index,
    )
    .await;

    let violation_count = repositories::violations::count_for_session(state.db(), &session.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count violations"))?;

    Ok(Json(ViolationAckResponse { recorded: true, violation_count }))
}

pub(in crate::api::sessions) async fn submit_session(
    Path(session_token): Path<String>,
    SessionCapability(claims): SessionCapability,
    State(state): State<AppState>,
) -> Result<Json<SessionStateResponse>, ApiError> {
    require_session_match(&claims, &session_token)?;

    let session = helpers::fetch_session(state.db(), &session_token).await?;
    let now = helpers::now_primitive();

    // A manual submit after the deadline grades as a timer expiry; the
    // finalizer is idempotent either way.
    let reason = if session.status == SessionStatus::Active
        && timing::is_expired(now, session.expires_at)
    {
        FinalizeReason::TimerExpired
    } else {
        FinalizeReason::ManualSubmit
    };

    let submission = finalize::finalize_session(state.db(), &session.id, reason)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to finalize session"))?;

    Ok(Json(helpers::submitted_state(&session_token, &submission)))
}
