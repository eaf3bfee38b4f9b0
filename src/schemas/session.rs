use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::db::models::{ResultEntry, SnapshotQuestion, Submission};
use crate::db::types::{DifficultyLevel, SessionStatus};

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct StartSessionRequest {
    #[serde(alias = "assessmentCode")]
    #[validate(length(min = 1, message = "assessment_code must not be empty"))]
    pub(crate) assessment_code: String,
    #[validate(length(min = 1, message = "passcode must not be empty"))]
    pub(crate) passcode: String,
    #[serde(alias = "studentName")]
    #[validate(length(min = 1, max = 200, message = "student_name must be 1-200 characters"))]
    pub(crate) student_name: String,
    #[serde(alias = "studentExternalId")]
    #[validate(length(min = 1, max = 100, message = "student_external_id must be 1-100 characters"))]
    pub(crate) student_external_id: String,
    #[serde(default)]
    #[serde(alias = "studentEmail")]
    pub(crate) student_email: Option<String>,
    #[serde(default)]
    #[serde(alias = "userAgent")]
    pub(crate) user_agent: Option<String>,
    #[serde(default)]
    #[serde(alias = "screenInfo")]
    pub(crate) screen_info: Option<String>,
}

/// One option as shown to the candidate. Correctness never leaves the server
/// while the session is live.
#[derive(Debug, Serialize)]
pub(crate) struct OptionView {
    pub(crate) key: String,
    pub(crate) label: String,
    pub(crate) text: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionView {
    pub(crate) index: usize,
    pub(crate) total: usize,
    pub(crate) question_id: String,
    pub(crate) stem: String,
    pub(crate) category: String,
    pub(crate) difficulty: DifficultyLevel,
    pub(crate) image_url: Option<String>,
    pub(crate) options: Vec<OptionView>,
}

impl QuestionView {
    pub(crate) fn from_snapshot(question: &SnapshotQuestion, index: usize, total: usize) -> Self {
        Self {
            index,
            total,
            question_id: question.question_id.clone(),
            stem: question.stem.clone(),
            category: question.category.clone(),
            difficulty: question.difficulty,
            image_url: question.image_url.clone(),
            options: question
                .options
                .iter()
                .map(|option| OptionView {
                    key: option.key.clone(),
                    label: option.label.clone(),
                    text: option.text.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct StartSessionResponse {
    pub(crate) session_token: String,
    pub(crate) capability_token: String,
    pub(crate) resumed: bool,
    pub(crate) disconnect_count: i32,
    pub(crate) total_questions: usize,
    pub(crate) answered_count: usize,
    pub(crate) expires_at: String,
    pub(crate) remaining_seconds: i64,
    // Integrity-monitor configuration the client enforces locally.
    pub(crate) tab_switch_warn_limit: i32,
    pub(crate) tab_switch_autosubmit_limit: i32,
    pub(crate) require_fullscreen: bool,
    pub(crate) question: Option<QuestionView>,
}

/// Summary visible to the candidate once a session is finalized. The full
/// per-question breakdown stays behind the release gate.
#[derive(Debug, Serialize)]
pub(crate) struct ResultSummary {
    pub(crate) score: i32,
    pub(crate) total: i32,
    pub(crate) percentage: i32,
    pub(crate) time_taken_ms: i64,
    pub(crate) violation_count: i32,
    pub(crate) auto_submitted: bool,
    pub(crate) termination_reason: String,
}

impl ResultSummary {
    pub(crate) fn from_submission(submission: &Submission) -> Self {
        Self {
            score: submission.score,
            total: submission.total,
            percentage: submission.percentage,
            time_taken_ms: submission.time_taken_ms,
            violation_count: submission.violation_count,
            auto_submitted: submission.auto_submitted,
            termination_reason: submission.termination_reason.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct SessionStateResponse {
    pub(crate) session_token: String,
    pub(crate) status: SessionStatus,
    pub(crate) remaining_seconds: i64,
    pub(crate) answered_count: usize,
    pub(crate) total_questions: usize,
    pub(crate) question: Option<QuestionView>,
    pub(crate) termination_reason: Option<String>,
    pub(crate) summary: Option<ResultSummary>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct SubmitAnswerRequest {
    #[serde(alias = "questionId")]
    #[validate(length(min = 1, message = "question_id must not be empty"))]
    pub(crate) question_id: String,
    #[serde(default)]
    #[serde(alias = "selectedOption")]
    pub(crate) selected_option: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct DisconnectResponse {
    pub(crate) disconnect_count: i32,
    pub(crate) terminated: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ViolationReportRequest {
    #[serde(alias = "eventType")]
    #[validate(length(min = 1, max = 100, message = "event_type must be 1-100 characters"))]
    pub(crate) event_type: String,
    #[serde(default)]
    #[validate(length(max = 2000, message = "details too long"))]
    pub(crate) details: Option<String>,
    #[serde(default)]
    #[serde(alias = "questionIndex")]
    pub(crate) question_index: Option<i32>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ViolationAckResponse {
    pub(crate) recorded: bool,
    pub(crate) violation_count: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct SessionResultResponse {
    pub(crate) session_token: String,
    pub(crate) summary: ResultSummary,
    pub(crate) breakdown: Vec<ResultEntry>,
}
