use axum::{
    extract::{Path, State},
    Json,
};

use crate::api::errors::ApiError;
use crate::api::guards::{require_session_match, SessionCapability};
use crate::api::sessions::helpers;
use crate::core::state::AppState;
use crate::db::types::SessionStatus;
use crate::repositories;
use crate::schemas::session::{ResultSummary, SessionResultResponse};

/// Full per-question breakdown; gated on the assessment's release flag.
pub(in crate::api::sessions) async fn get_result(
    Path(session_token): Path<String>,
    SessionCapability(claims): SessionCapability,
    State(state): State<AppState>,
) -> Result<Json<SessionResultResponse>, ApiError> {
    require_session_match(&claims, &session_token)?;

    let session = helpers::fetch_session(state.db(), &session_token).await?;
    if session.status != SessionStatus::Submitted {
        return Err(ApiError::conflict("session_not_submitted", "Session is not finalized yet"));
    }

    let assessment = repositories::assessments::find_by_id(state.db(), &session.assessment_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch assessment"))?
        .ok_or_else(|| ApiError::not_found("assessment_not_found", "Assessment not found"))?;

    if !assessment.results_released {
        return Err(ApiError::conflict(
            "results_not_released",
            "Results have not been released for this assessment",
        ));
    }

    let submission = helpers::fetch_submission(state.db(), &session.id).await?;

    Ok(Json(SessionResultResponse {
        session_token,
        summary: ResultSummary::from_submission(&submission),
        breakdown: submission.result_payload.0,
    }))
}
