use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use sqlx::types::Json as SqlJson;
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentAdmin;
use crate::core::time::{parse_rfc3339, primitive_now_utc};
use crate::core::{security, state::AppState};
use crate::db::models::AllocationSlice;
use crate::db::types::AssessmentStatus;
use crate::repositories;
use crate::schemas::assessment::{
    AdminLoginRequest, AssessmentCreate, AssessmentResponse, AssessmentResultsResponse,
    SubmissionRecordResponse, TokenResponse,
};
use crate::services::allocation;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/assessments", post(create_assessment))
        .route("/assessments/:code", get(get_assessment))
        .route("/assessments/:code/activate", post(activate_assessment))
        .route("/assessments/:code/close", post(close_assessment))
        .route("/assessments/:code/release", post(set_release))
        .route("/assessments/:code/results", get(list_results))
}

async fn login(
    State(state): State<AppState>,
    Json(payload): Json<AdminLoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::bad_request("validation_error", e.to_string()))?;

    let configured = &state.settings().admin().admin_password;
    if configured.is_empty() || payload.password != *configured {
        return Err(ApiError::Unauthorized("Invalid admin credentials"));
    }

    let access_token = security::create_admin_token(state.settings())
        .map_err(|e| ApiError::internal(e, "Failed to issue admin token"))?;

    Ok(Json(TokenResponse { access_token, token_type: "bearer".to_string() }))
}

async fn create_assessment(
    CurrentAdmin(_claims): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<AssessmentCreate>,
) -> Result<Json<AssessmentResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::bad_request("validation_error", e.to_string()))?;

    let window_start = parse_rfc3339(&payload.window_start)
        .map_err(|_| ApiError::bad_request("validation_error", "window_start must be RFC 3339"))?;
    let window_end = parse_rfc3339(&payload.window_end)
        .map_err(|_| ApiError::bad_request("validation_error", "window_end must be RFC 3339"))?;
    if window_end <= window_start {
        return Err(ApiError::bad_request(
            "validation_error",
            "window_end must be after window_start",
        ));
    }

    let plan: Vec<AllocationSlice> = payload
        .allocation_plan
        .iter()
        .map(|slice| AllocationSlice {
            bank_code: allocation::normalize_bank_code(&slice.bank_code),
            count: slice.count,
        })
        .collect();

    // Eager validation against live inventory so misconfigured plans fail at
    // save time, not when the first candidate arrives.
    let codes: Vec<String> = plan.iter().map(|slice| slice.bank_code.clone()).collect();
    let counts = repositories::banks::question_counts(state.db(), &codes)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count bank questions"))?;
    allocation::resolve_plan(&plan, &counts, i64::from(payload.total_questions))
        .map_err(|e| ApiError::bad_request(e.code(), e.to_string()))?;

    let existing = repositories::assessments::find_by_code(state.db(), &payload.code)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to check assessment code"))?;
    if existing.is_some() {
        return Err(ApiError::conflict("assessment_code_taken", "Assessment code already in use"));
    }

    let passcode_hash = security::hash_passcode(&payload.passcode)
        .map_err(|e| ApiError::internal(e, "Failed to hash passcode"))?;

    let now = primitive_now_utc();
    let id = Uuid::new_v4().to_string();
    repositories::assessments::create(
        state.db(),
        repositories::assessments::CreateAssessment {
            id: &id,
            code: &payload.code,
            title: &payload.title,
            duration_minutes: payload.duration_minutes,
            window_start,
            window_end,
            status: AssessmentStatus::Draft,
            passcode_hash: &passcode_hash,
            allocation_plan: SqlJson(plan),
            total_questions: payload.total_questions,
            tab_switch_warn_limit: payload.tab_switch_warn_limit,
            tab_switch_autosubmit_limit: payload.tab_switch_autosubmit_limit,
            require_fullscreen: payload.require_fullscreen,
            allow_retakes: payload.allow_retakes,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create assessment"))?;

    let assessment = fetch_by_code(&state, &payload.code).await?;
    Ok(Json(AssessmentResponse::from_model(assessment)))
}

async fn get_assessment(
    Path(code): Path<String>,
    CurrentAdmin(_claims): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<AssessmentResponse>, ApiError> {
    let assessment = fetch_by_code(&state, &code).await?;
    Ok(Json(AssessmentResponse::from_model(assessment)))
}

/// Activation transactionally closes any other active assessment so the
/// one-active invariant holds even under concurrent activations (the partial
/// unique index backstops it).
async fn activate_assessment(
    Path(code): Path<String>,
    CurrentAdmin(_claims): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<AssessmentResponse>, ApiError> {
    let assessment = fetch_by_code(&state, &code).await?;
    let now = primitive_now_utc();

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to begin activation"))?;

    let closed =
        repositories::assessments::close_other_active(&mut *tx, &assessment.id, now)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to close active assessment"))?;
    repositories::assessments::update_status(&mut *tx, &assessment.id, AssessmentStatus::Active, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to activate assessment"))?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit activation"))?;

    if closed > 0 {
        tracing::info!(code = %code, closed, "previous active assessment closed on activation");
    }

    let assessment = fetch_by_code(&state, &code).await?;
    Ok(Json(AssessmentResponse::from_model(assessment)))
}

async fn close_assessment(
    Path(code): Path<String>,
    CurrentAdmin(_claims): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<AssessmentResponse>, ApiError> {
    let assessment = fetch_by_code(&state, &code).await?;
    let now = primitive_now_utc();

    repositories::assessments::update_status(state.db(), &assessment.id, AssessmentStatus::Closed, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to close assessment"))?;

    let assessment = fetch_by_code(&state, &code).await?;
    Ok(Json(AssessmentResponse::from_model(assessment)))
}

#[derive(Debug, Deserialize)]
struct ReleaseRequest {
    released: bool,
}

async fn set_release(
    Path(code): Path<String>,
    CurrentAdmin(_claims): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<ReleaseRequest>,
) -> Result<Json<AssessmentResponse>, ApiError> {
    let assessment = fetch_by_code(&state, &code).await?;
    let now = primitive_now_utc();

    repositories::assessments::set_results_released(
        state.db(),
        &assessment.id,
        payload.released,
        now,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to update release flag"))?;

    tracing::info!(code = %code, released = payload.released, "results release flag updated");

    let assessment = fetch_by_code(&state, &code).await?;
    Ok(Json(AssessmentResponse::from_model(assessment)))
}

async fn list_results(
    Path(code): Path<String>,
    CurrentAdmin(_claims): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<AssessmentResultsResponse>, ApiError> {
    let assessment = fetch_by_code(&state, &code).await?;

    let submissions = repositories::submissions::list_for_assessment(state.db(), &assessment.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list submissions"))?;

    Ok(Json(AssessmentResultsResponse {
        assessment_code: assessment.code,
        results_released: assessment.results_released,
        submissions: submissions.into_iter().map(SubmissionRecordResponse::from_model).collect(),
    }))
}

async fn fetch_by_code(
    state: &AppState,
    code: &str,
) -> Result<crate::db::models::Assessment, ApiError> {
    repositories::assessments::find_by_code(state.db(), code)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch assessment"))?
        .ok_or_else(|| ApiError::not_found("assessment_not_found", "Assessment not found"))
}
