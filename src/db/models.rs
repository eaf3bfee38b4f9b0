use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::{AssessmentStatus, DifficultyLevel, SessionStatus};

/// One (bank, count) pair of an assessment's allocation plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct AllocationSlice {
    pub(crate) bank_code: String,
    pub(crate) count: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Assessment {
    pub(crate) id: String,
    pub(crate) code: String,
    pub(crate) title: String,
    pub(crate) duration_minutes: i32,
    pub(crate) window_start: PrimitiveDateTime,
    pub(crate) window_end: PrimitiveDateTime,
    pub(crate) status: AssessmentStatus,
    pub(crate) results_released: bool,
    pub(crate) passcode_hash: String,
    pub(crate) allocation_plan: Json<Vec<AllocationSlice>>,
    pub(crate) total_questions: i32,
    pub(crate) tab_switch_warn_limit: i32,
    pub(crate) tab_switch_autosubmit_limit: i32,
    pub(crate) require_fullscreen: bool,
    pub(crate) allow_retakes: i32,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct QuestionBank {
    pub(crate) id: String,
    pub(crate) code: String,
    pub(crate) name: String,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Question {
    pub(crate) id: String,
    pub(crate) bank_id: String,
    pub(crate) external_id: String,
    pub(crate) category: String,
    pub(crate) difficulty: DifficultyLevel,
    pub(crate) stem: String,
    pub(crate) explanation: Option<String>,
    pub(crate) image_url: Option<String>,
    pub(crate) topic_tag: Option<String>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct QuestionOption {
    pub(crate) id: String,
    pub(crate) question_id: String,
    pub(crate) option_key: String,
    pub(crate) option_text: String,
    pub(crate) is_correct: bool,
}

/// One option inside a session's immutable snapshot. `label` is the
/// per-session display label (A/B/C/D in shuffled order); `key` is the
/// option's original stable key and the only identity used for grading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct SnapshotOption {
    pub(crate) key: String,
    pub(crate) label: String,
    pub(crate) text: String,
    pub(crate) is_correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SnapshotQuestion {
    pub(crate) question_id: String,
    pub(crate) external_id: String,
    pub(crate) bank_code: String,
    pub(crate) bank_name: String,
    pub(crate) category: String,
    pub(crate) difficulty: DifficultyLevel,
    pub(crate) stem: String,
    pub(crate) explanation: Option<String>,
    pub(crate) image_url: Option<String>,
    pub(crate) topic_tag: Option<String>,
    pub(crate) options: Vec<SnapshotOption>,
}

/// Append-only answer log entry. Answers are positional: entry `i` always
/// refers to `questions_snapshot[i]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct AnswerEntry {
    pub(crate) question_id: String,
    pub(crate) selected_option: Option<String>,
    pub(crate) answered_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct ExamSession {
    pub(crate) id: String,
    pub(crate) assessment_id: String,
    pub(crate) student_name: String,
    pub(crate) student_external_id: String,
    pub(crate) student_email: Option<String>,
    pub(crate) user_agent: Option<String>,
    pub(crate) screen_info: Option<String>,
    pub(crate) seed: i32,
    pub(crate) questions_snapshot: Json<Vec<SnapshotQuestion>>,
    pub(crate) answers: Json<Vec<AnswerEntry>>,
    pub(crate) started_at: PrimitiveDateTime,
    pub(crate) expires_at: PrimitiveDateTime,
    pub(crate) window_end: PrimitiveDateTime,
    pub(crate) submitted_at: Option<PrimitiveDateTime>,
    pub(crate) status: SessionStatus,
    pub(crate) disconnect_count: i32,
    pub(crate) termination_reason: Option<String>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

/// Per-question grading breakdown frozen into `result_payload`. Field names
/// are a stable contract with downstream exporters that flatten the JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ResultEntry {
    pub(crate) question_id: String,
    pub(crate) bank_code: String,
    pub(crate) bank_name: String,
    pub(crate) stem: String,
    pub(crate) selected_original_id: Option<String>,
    pub(crate) correct_original_id: Option<String>,
    pub(crate) is_correct: bool,
    pub(crate) explanation: Option<String>,
    pub(crate) difficulty: DifficultyLevel,
    pub(crate) topic_tag: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Submission {
    pub(crate) id: String,
    pub(crate) session_id: String,
    pub(crate) assessment_id: String,
    pub(crate) student_external_id: String,
    pub(crate) score: i32,
    pub(crate) total: i32,
    pub(crate) percentage: i32,
    pub(crate) time_taken_ms: i64,
    pub(crate) violation_count: i32,
    pub(crate) auto_submitted: bool,
    pub(crate) termination_reason: String,
    pub(crate) result_payload: Json<Vec<ResultEntry>>,
    pub(crate) created_at: PrimitiveDateTime,
}
