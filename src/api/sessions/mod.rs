pub(crate) mod helpers;
mod play;
mod result;
mod start;

use axum::{routing::get, routing::post, Router};

use crate::core::state::AppState;

/// A session is terminated on its second disconnect; the first one resumes
/// with a warning.
pub(crate) const DISCONNECT_TERMINATION_THRESHOLD: i32 = 2;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/start", post(start::start_session))
        .route("/:session_token/question", get(play::get_question))
        .route("/:session_token/answers", post(play::submit_answer))
        .route("/:session_token/disconnect", post(play::disconnect))
        .route("/:session_token/violations", post(play::report_violation))
        .route("/:session_token/submit", post(play::submit_session))
        .route("/:session_token/result", get(result::get_result))
}
