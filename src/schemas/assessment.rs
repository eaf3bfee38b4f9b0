use serde::{Deserialize, Serialize};
use validator::Validate;

pub(crate) use crate::core::time::format_primitive;
use crate::db::models::{AllocationSlice, Assessment, Submission};
use crate::db::types::AssessmentStatus;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct AdminLoginRequest {
    #[validate(length(min = 1, message = "password must not be empty"))]
    pub(crate) password: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct TokenResponse {
    pub(crate) access_token: String,
    pub(crate) token_type: String,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct AllocationSliceCreate {
    #[serde(alias = "bankCode")]
    #[validate(length(min = 1, message = "bank_code must not be empty"))]
    pub(crate) bank_code: String,
    #[validate(range(min = 1, message = "count must be positive"))]
    pub(crate) count: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct AssessmentCreate {
    #[validate(length(min = 1, message = "code must not be empty"))]
    pub(crate) code: String,
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub(crate) title: String,
    #[serde(alias = "durationMinutes")]
    #[validate(range(min = 1, message = "duration_minutes must be positive"))]
    pub(crate) duration_minutes: i32,
    #[serde(alias = "windowStart")]
    pub(crate) window_start: String,
    #[serde(alias = "windowEnd")]
    pub(crate) window_end: String,
    #[validate(length(min = 4, message = "passcode must be at least 4 characters"))]
    pub(crate) passcode: String,
    #[serde(alias = "allocationPlan")]
    #[validate(nested)]
    pub(crate) allocation_plan: Vec<AllocationSliceCreate>,
    #[serde(alias = "totalQuestions")]
    #[validate(range(min = 1, message = "total_questions must be positive"))]
    pub(crate) total_questions: i32,
    #[serde(default = "default_warn_limit")]
    #[serde(alias = "tabSwitchWarnLimit")]
    pub(crate) tab_switch_warn_limit: i32,
    #[serde(default = "default_autosubmit_limit")]
    #[serde(alias = "tabSwitchAutosubmitLimit")]
    pub(crate) tab_switch_autosubmit_limit: i32,
    #[serde(default)]
    #[serde(alias = "requireFullscreen")]
    pub(crate) require_fullscreen: bool,
    #[serde(default)]
    #[serde(alias = "allowRetakes")]
    #[validate(range(min = 0, message = "allow_retakes must be non-negative"))]
    pub(crate) allow_retakes: i32,
}

fn default_warn_limit() -> i32 {
    2
}

fn default_autosubmit_limit() -> i32 {
    5
}

#[derive(Debug, Serialize)]
pub(crate) struct AssessmentResponse {
    pub(crate) id: String,
    pub(crate) code: String,
    pub(crate) title: String,
    pub(crate) duration_minutes: i32,
    pub(crate) window_start: String,
    pub(crate) window_end: String,
    pub(crate) status: AssessmentStatus,
    pub(crate) results_released: bool,
    pub(crate) allocation_plan: Vec<AllocationSlice>,
    pub(crate) total_questions: i32,
    pub(crate) tab_switch_warn_limit: i32,
    pub(crate) tab_switch_autosubmit_limit: i32,
    pub(crate) require_fullscreen: bool,
    pub(crate) allow_retakes: i32,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl AssessmentResponse {
    pub(crate) fn from_model(assessment: Assessment) -> Self {
        Self {
            id: assessment.id,
            code: assessment.code,
            title: assessment.title,
            duration_minutes: assessment.duration_minutes,
            window_start: format_primitive(assessment.window_start),
            window_end: format_primitive(assessment.window_end),
            status: assessment.status,
            results_released: assessment.results_released,
            allocation_plan: assessment.allocation_plan.0,
            total_questions: assessment.total_questions,
            tab_switch_warn_limit: assessment.tab_switch_warn_limit,
            tab_switch_autosubmit_limit: assessment.tab_switch_autosubmit_limit,
            require_fullscreen: assessment.require_fullscreen,
            allow_retakes: assessment.allow_retakes,
            created_at: format_primitive(assessment.created_at),
            updated_at: format_primitive(assessment.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmissionRecordResponse {
    pub(crate) id: String,
    pub(crate) session_id: String,
    pub(crate) student_external_id: String,
    pub(crate) score: i32,
    pub(crate) total: i32,
    pub(crate) percentage: i32,
    pub(crate) time_taken_ms: i64,
    pub(crate) violation_count: i32,
    pub(crate) auto_submitted: bool,
    pub(crate) termination_reason: String,
    pub(crate) created_at: String,
}

impl SubmissionRecordResponse {
    pub(crate) fn from_model(submission: Submission) -> Self {
        Self {
            id: submission.id,
            session_id: submission.session_id,
            student_external_id: submission.student_external_id,
            score: submission.score,
            total: submission.total,
            percentage: submission.percentage,
            time_taken_ms: submission.time_taken_ms,
            violation_count: submission.violation_count,
            auto_submitted: submission.auto_submitted,
            termination_reason: submission.termination_reason,
            created_at: format_primitive(submission.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AssessmentResultsResponse {
    pub(crate) assessment_code: String,
    pub(crate) results_released: bool,
    pub(crate) submissions: Vec<SubmissionRecordResponse>,
}
