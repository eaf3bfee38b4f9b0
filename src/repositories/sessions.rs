use sqlx::types::Json;

use crate::db::models::{AnswerEntry, ExamSession, SnapshotQuestion};
use crate::db::types::SessionStatus;

pub(crate) const COLUMNS: &str = "\
    id, assessment_id, student_name, student_external_id, student_email, \
    user_agent, screen_info, seed, questions_snapshot, answers, started_at, \
    expires_at, window_end, submitted_at, status, disconnect_count, \
    termination_reason, created_at, updated_at";

pub(crate) struct CreateSession<'a> {
    pub(crate) id: &'a str,
    pub(crate) assessment_id: &'a str,
    pub(crate) student_name: &'a str,
    pub(crate) student_external_id: &'a str,
    pub(crate) student_email: Option<&'a str>,
    pub(crate) user_agent: Option<&'a str>,
    pub(crate) screen_info: Option<&'a str>,
    pub(crate) seed: i32,
    pub(crate) questions_snapshot: Json<Vec<SnapshotQuestion>>,
    pub(crate) started_at: time::PrimitiveDateTime,
    pub(crate) expires_at: time::PrimitiveDateTime,
    pub(crate) window_end: time::PrimitiveDateTime,
    pub(crate) created_at: time::PrimitiveDateTime,
    pub(crate) updated_at: time::PrimitiveDateTime,
}

pub(crate) async fn find_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<ExamSession>, sqlx::Error> {
    sqlx::query_as::<_, ExamSession>(&format!("SELECT {COLUMNS} FROM exam_sessions WHERE id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

/// Row-locked fetch; callers must hold an open transaction.
pub(crate) async fn lock_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<ExamSession>, sqlx::Error> {
    sqlx::query_as::<_, ExamSession>(&format!(
        "SELECT {COLUMNS} FROM exam_sessions WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn find_active_for_student(
    executor: impl sqlx::PgExecutor<'_>,
    assessment_id: &str,
    student_external_id: &str,
) -> Result<Option<ExamSession>, sqlx::Error> {
    sqlx::query_as::<_, ExamSession>(&format!(
        "SELECT {COLUMNS} FROM exam_sessions \
         WHERE assessment_id = $1 AND student_external_id = $2 AND status = $3 \
         ORDER BY created_at DESC LIMIT 1"
    ))
    .bind(assessment_id)
    .bind(student_external_id)
    .bind(SessionStatus::Active)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn count_for_student(
    executor: impl sqlx::PgExecutor<'_>,
    assessment_id: &str,
    student_external_id: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM exam_sessions \
         WHERE assessment_id = $1 AND student_external_id = $2",
    )
    .bind(assessment_id)
    .bind(student_external_id)
    .fetch_one(executor)
    .await
}

pub(crate) async fn count_active(executor: impl sqlx::PgExecutor<'_>) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM exam_sessions WHERE status = $1")
        .bind(SessionStatus::Active)
        .fetch_one(executor)
        .await
}

/// Serializes concurrent starts for one (assessment, student) pair for the
/// duration of the surrounding transaction.
pub(crate) async fn acquire_start_lock(
    executor: impl sqlx::PgExecutor<'_>,
    assessment_id: &str,
    student_external_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1 || ':' || $2, 0))")
        .bind(assessment_id)
        .bind(student_external_id)
        .execute(executor)
        .await?;
    Ok(())
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    session: CreateSession<'_>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO exam_sessions (
            id, assessment_id, student_name, student_external_id, student_email,
            user_agent, screen_info, seed, questions_snapshot, answers,
            started_at, expires_at, window_end, status, disconnect_count,
            created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,'[]'::jsonb,$10,$11,$12,$13,0,$14,$15)
        ON CONFLICT DO NOTHING",
    )
    .bind(session.id)
    .bind(session.assessment_id)
    .bind(session.student_name)
    .bind(session.student_external_id)
    .bind(session.student_email)
    .bind(session.user_agent)
    .bind(session.screen_info)
    .bind(session.seed)
    .bind(session.questions_snapshot)
    .bind(session.started_at)
    .bind(session.expires_at)
    .bind(session.window_end)
    .bind(SessionStatus::Active)
    .bind(session.created_at)
    .bind(session.updated_at)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub(crate) async fn update_answers(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    answers: Json<Vec<AnswerEntry>>,
    now: time::PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE exam_sessions SET answers = $1, updated_at = $2 WHERE id = $3")
        .bind(answers)
        .bind(now)
        .bind(id)
        .execute(executor)
        .await?;
    Ok(())
}

/// Increments the durable disconnect counter and returns the new value.
pub(crate) async fn increment_disconnects(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    now: time::PrimitiveDateTime,
) -> Result<i32, sqlx::Error> {
    sqlx::query_scalar(
        "UPDATE exam_sessions SET disconnect_count = disconnect_count + 1, updated_at = $1 \
         WHERE id = $2 RETURNING disconnect_count",
    )
    .bind(now)
    .bind(id)
    .fetch_one(executor)
    .await
}

pub(crate) async fn mark_submitted(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    termination_reason: &str,
    now: time::PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE exam_sessions SET status = $1, submitted_at = $2, \
         termination_reason = $3, updated_at = $2 WHERE id = $4",
    )
    .bind(SessionStatus::Submitted)
    .bind(now)
    .bind(termination_reason)
    .bind(id)
    .execute(executor)
    .await?;
    Ok(())
}

/// Sessions whose deadline has passed but that were never finalized; the
/// sweeper drains these in batches.
pub(crate) async fn list_expired_active(
    executor: impl sqlx::PgExecutor<'_>,
    now: time::PrimitiveDateTime,
    limit: i64,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT id FROM exam_sessions WHERE status = $1 AND expires_at <= $2 \
         ORDER BY expires_at LIMIT $3",
    )
    .bind(SessionStatus::Active)
    .bind(now)
    .bind(limit.clamp(1, 1000))
    .fetch_all(executor)
    .await
}
