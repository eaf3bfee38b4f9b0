use sqlx::types::Json;

use crate::db::models::{ResultEntry, Submission};

pub(crate) const COLUMNS: &str = "\
    id, session_id, assessment_id, student_external_id, score, total, \
    percentage, time_taken_ms, violation_count, auto_submitted, \
    termination_reason, result_payload, created_at";

pub(crate) struct CreateSubmission<'a> {
    pub(crate) id: &'a str,
    pub(crate) session_id: &'a str,
    pub(crate) assessment_id: &'a str,
    pub(crate) student_external_id: &'a str,
    pub(crate) score: i32,
    pub(crate) total: i32,
    pub(crate) percentage: i32,
    pub(crate) time_taken_ms: i64,
    pub(crate) violation_count: i32,
    pub(crate) auto_submitted: bool,
    pub(crate) termination_reason: &'a str,
    pub(crate) result_payload: Json<Vec<ResultEntry>>,
    pub(crate) created_at: time::PrimitiveDateTime,
}

pub(crate) async fn find_by_session(
    executor: impl sqlx::PgExecutor<'_>,
    session_id: &str,
) -> Result<Option<Submission>, sqlx::Error> {
    sqlx::query_as::<_, Submission>(&format!(
        "SELECT {COLUMNS} FROM submissions WHERE session_id = $1"
    ))
    .bind(session_id)
    .fetch_optional(executor)
    .await
}

/// Insert guarded by the unique session_id constraint; a concurrent
/// finalizer losing the race simply inserts nothing.
pub(crate) async fn create_if_absent(
    executor: impl sqlx::PgExecutor<'_>,
    submission: CreateSubmission<'_>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO submissions (
            id, session_id, assessment_id, student_external_id, score, total,
            percentage, time_taken_ms, violation_count, auto_submitted,
            termination_reason, result_payload, created_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13)
        ON CONFLICT (session_id) DO NOTHING",
    )
    .bind(submission.id)
    .bind(submission.session_id)
    .bind(submission.assessment_id)
    .bind(submission.student_external_id)
    .bind(submission.score)
    .bind(submission.total)
    .bind(submission.percentage)
    .bind(submission.time_taken_ms)
    .bind(submission.violation_count)
    .bind(submission.auto_submitted)
    .bind(submission.termination_reason)
    .bind(submission.result_payload)
    .bind(submission.created_at)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub(crate) async fn list_for_assessment(
    executor: impl sqlx::PgExecutor<'_>,
    assessment_id: &str,
) -> Result<Vec<Submission>, sqlx::Error> {
    sqlx::query_as::<_, Submission>(&format!(
        "SELECT {COLUMNS} FROM submissions WHERE assessment_id = $1 ORDER BY created_at"
    ))
    .bind(assessment_id)
    .fetch_all(executor)
    .await
}
