use std::collections::HashMap;

use axum::{extract::State, Json};
use rand::rngs::StdRng;
use rand::SeedableRng;
use sqlx::types::Json as SqlJson;
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::sessions::{helpers, DISCONNECT_TERMINATION_THRESHOLD};
use crate::core::{security, state::AppState};
use crate::db::models::{Assessment, ExamSession, QuestionOption};
use crate::db::types::AssessmentStatus;
use crate::repositories;
use crate::schemas::session::{StartSessionRequest, StartSessionResponse};
use crate::services::finalize::{self, FinalizeReason};
use crate::services::snapshot::{self, BankInventory};
use crate::services::{allocation, timing};

pub(in crate::api::sessions) async fn start_session(
    State(state): State<AppState>,
    Json(payload): Json<StartSessionRequest>,
) -> Result<Json<StartSessionResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::bad_request("validation_error", e.to_string()))?;

    let assessment = repositories::assessments::find_by_code(state.db(), &payload.assessment_code)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch assessment"))?
        .ok_or_else(|| ApiError::not_found("assessment_not_found", "Assessment not found"))?;

    let now = helpers::now_primitive();

    if assessment.status != AssessmentStatus::Active {
        return Err(ApiError::conflict(
            "assessment_not_active",
            "Assessment is not accepting sessions",
        ));
    }
    if now < assessment.window_start {
        return Err(ApiError::conflict(
            "assessment_not_open_yet",
            "Assessment window has not opened yet",
        ));
    }
    if now > assessment.window_end {
        return Err(ApiError::conflict("assessment_closed", "Assessment window has closed"));
    }

    let passcode_ok = security::verify_passcode(&payload.passcode, &assessment.passcode_hash)
        .map_err(|e| ApiError::internal(e, "Failed to verify passcode"))?;
    if !passcode_ok {
        return Err(ApiError::forbidden("wrong_passcode", "Wrong passcode"));
    }

    let active_sessions = repositories::sessions::count_active(state.db())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count active sessions"))?;
    if active_sessions >= state.settings().exam().max_concurrent_sessions as i64 {
        return Err(ApiError::TooManyRequests("Too many concurrent sessions, try again shortly"));
    }

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to begin session transaction"))?;

    repositories::sessions::acquire_start_lock(
        &mut *tx,
        &assessment.id,
        &payload.student_external_id,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to serialize session start"))?;

    let existing = repositories::sessions::find_active_for_student(
        &mut *tx,
        &assessment.id,
        &payload.student_external_id,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to check for an active session"))?;

    if let Some(existing) = existing {
        return resume_session(state, tx, &assessment, existing, now).await;
    }

    let attempts = repositories::sessions::count_for_student(
        &mut *tx,
        &assessment.id,
        &payload.student_external_id,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to count attempts"))?;
    if attempts >= i64::from(assessment.allow_retakes) + 1 {
        return Err(ApiError::conflict("attempt_limit_reached", "Attempt limit reached"));
    }

    let expires_at = timing::compute_expiry(now, assessment.duration_minutes, assessment.window_end);
    if timing::is_expired(now, expires_at) {
        return Err(ApiError::conflict(
            "assessment_closed",
            "No usable time remains in the assessment window",
        ));
    }

    let inventories = load_inventories(&mut tx, &assessment).await?;

    // The stored seed is a diagnostic tag only; the draw itself uses fresh
    // OS entropy and cannot be replayed from the column.
    let seed = rand::random::<u32>();
    let mut rng = StdRng::from_entropy();
    let questions = snapshot::draw_snapshot(&mut rng, &assessment.allocation_plan.0, inventories);

    let session_token = Uuid::new_v4().to_string();
    repositories::sessions::create(
        &mut *tx,
        repositories::sessions::CreateSession {
            id: &session_token,
            assessment_id: &assessment.id,
            student_name: &payload.student_name,
            student_external_id: &payload.student_external_id,
            student_email: payload.student_email.as_deref(),
            user_agent: payload.user_agent.as_deref(),
            screen_info: payload.screen_info.as_deref(),
            seed: i32::from_ne_bytes(seed.to_ne_bytes()),
            questions_snapshot: SqlJson(questions),
            started_at: now,
            expires_at,
            window_end: assessment.window_end,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create session"))?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit session start"))?;

    let session = helpers::fetch_session(state.db(), &session_token).await?;
    let capability = security::create_session_capability(&session_token, state.settings())
        .map_err(|e| ApiError::internal(e, "Failed to issue session capability"))?;

    tracing::info!(
        session_token = %session_token,
        assessment_code = %assessment.code,
        student_external_id = %payload.student_external_id,
        "session started"
    );

    Ok(Json(build_response(&assessment, &session, capability, false, now)))
}

/// Resume-with-warning: the reconnect bumps the durable disconnect counter;
/// reaching the threshold terminates instead of resuming. Expired sessions
/// are finalized before the refusal so their grades exist.
async fn resume_session(
    state: AppState,
    tx: sqlx::Transaction<'_, sqlx::Postgres>,
    assessment: &Assessment,
    existing: ExamSession,
    now: time::PrimitiveDateTime,
) -> Result<Json<StartSessionResponse>, ApiError> {
    let mut tx = tx;

    if timing::is_expired(now, existing.expires_at) {
        tx.rollback().await.ok();
        finalize::finalize_session(state.db(), &existing.id, FinalizeReason::TimerExpired)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to finalize expired session"))?;
        return Err(ApiError::conflict("timer_expired", "Session time has run out"));
    }

    if existing.disconnect_count >= DISCONNECT_TERMINATION_THRESHOLD {
        tx.rollback().await.ok();
        finalize::finalize_session(state.db(), &existing.id, FinalizeReason::SecondDisconnect)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to finalize disconnected session"))?;
        return Err(ApiError::conflict(
            "second_disconnect",
            "Session terminated after repeated disconnects",
        ));
    }

    let disconnects = repositories::sessions::increment_disconnects(&mut *tx, &existing.id, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to record reconnect"))?;
    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit reconnect"))?;

    helpers::record_violation(
        &state,
        &existing.id,
        "reconnect_resume",
        None,
        Some(existing.answers.0.len() as i32),
    )
    .await;
    state.redis().cache_disconnect_count(&existing.id, disconnects).await;

    if disconnects >= DISCONNECT_TERMINATION_THRESHOLD {
        finalize::finalize_session(state.db(), &existing.id, FinalizeReason::SecondDisconnect)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to finalize disconnected session"))?;
        return Err(ApiError::conflict(
            "second_disconnect",
            "Session terminated after repeated disconnects",
        ));
    }

    let session = helpers::fetch_session(state.db(), &existing.id).await?;
    let capability = security::create_session_capability(&session.id, state.settings())
        .map_err(|e| ApiError::internal(e, "Failed to issue session capability"))?;

    tracing::info!(session_token = %session.id, disconnects, "session resumed after reconnect");

    Ok(Json(build_response(assessment, &session, capability, true, now)))
}

async fn load_inventories(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    assessment: &Assessment,
) -> Result<Vec<BankInventory>, ApiError> {
    let plan = &assessment.allocation_plan.0;
    let codes: Vec<String> = plan.iter().map(|slice| slice.bank_code.clone()).collect();

    let counts = repositories::banks::question_counts(&mut **tx, &codes)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count bank questions"))?;
    allocation::resolve_plan(plan, &counts, i64::from(assessment.total_questions))
        .map_err(|e| ApiError::conflict(e.code(), e.to_string()))?;

    let mut inventories = Vec::with_capacity(plan.len());
    for slice in plan {
        let bank = repositories::banks::find_by_code(&mut **tx, &slice.bank_code)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to fetch bank"))?
            .ok_or_else(|| ApiError::conflict("bank_not_found", "Question bank not found"))?;

        let questions = repositories::questions::list_by_bank(&mut **tx, &bank.id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to fetch bank questions"))?;
        let question_ids: Vec<String> =
            questions.iter().map(|question| question.id.clone()).collect();
        let options =
            repositories::questions::list_options_for_questions(&mut **tx, &question_ids)
                .await
                .map_err(|e| ApiError::internal(e, "Failed to fetch question options"))?;

        let mut options_by_question: HashMap<String, Vec<QuestionOption>> = HashMap::new();
        for option in options {
            options_by_question.entry(option.question_id.clone()).or_default().push(option);
        }

        let questions = questions
            .into_iter()
            .map(|question| {
                let options = options_by_question.remove(&question.id).unwrap_or_default();
                (question, options)
            })
            .collect();

        inventories.push(BankInventory { bank, questions });
    }

    Ok(inventories)
}

fn build_response(
    assessment: &Assessment,
    session: &ExamSession,
    capability: String,
    resumed: bool,
    now: time::PrimitiveDateTime,
) -> StartSessionResponse {
    StartSessionResponse {
        session_token: session.id.clone(),
        capability_token: capability,
        resumed,
        disconnect_count: session.disconnect_count,
        total_questions: session.questions_snapshot.0.len(),
        answered_count: session.answers.0.len(),
        expires_at: crate::core::time::format_primitive(session.expires_at),
        remaining_seconds: timing::remaining_seconds(now, session.expires_at),
        tab_switch_warn_limit: assessment.tab_switch_warn_limit,
        tab_switch_autosubmit_limit: assessment.tab_switch_autosubmit_limit,
        require_fullscreen: assessment.require_fullscreen,
        question: helpers::next_question_view(session),
    }
}
