use sqlx::types::Json;

use crate::db::models::{AllocationSlice, Assessment};
use crate::db::types::AssessmentStatus;

pub(crate) const COLUMNS: &str = "\
    id, code, title, duration_minutes, window_start, window_end, status, \
    results_released, passcode_hash, allocation_plan, total_questions, \
    tab_switch_warn_limit, tab_switch_autosubmit_limit, require_fullscreen, \
    allow_retakes, created_at, updated_at";

pub(crate) struct CreateAssessment<'a> {
    pub(crate) id: &'a str,
    pub(crate) code: &'a str,
    pub(crate) title: &'a str,
    pub(crate) duration_minutes: i32,
    pub(crate) window_start: time::PrimitiveDateTime,
    pub(crate) window_end: time::PrimitiveDateTime,
    pub(crate) status: AssessmentStatus,
    pub(crate) passcode_hash: &'a str,
    pub(crate) allocation_plan: Json<Vec<AllocationSlice>>,
    pub(crate) total_questions: i32,
    pub(crate) tab_switch_warn_limit: i32,
    pub(crate) tab_switch_autosubmit_limit: i32,
    pub(crate) require_fullscreen: bool,
    pub(crate) allow_retakes: i32,
    pub(crate) created_at: time::PrimitiveDateTime,
    pub(crate) updated_at: time::PrimitiveDateTime,
}

pub(crate) async fn find_by_code(
    executor: impl sqlx::PgExecutor<'_>,
    code: &str,
) -> Result<Option<Assessment>, sqlx::Error> {
    sqlx::query_as::<_, Assessment>(&format!("SELECT {COLUMNS} FROM assessments WHERE code = $1"))
        .bind(code)
        .fetch_optional(executor)
        .await
}

pub(crate) async fn find_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<Assessment>, sqlx::Error> {
    sqlx::query_as::<_, Assessment>(&format!("SELECT {COLUMNS} FROM assessments WHERE id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    assessment: CreateAssessment<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO assessments (
            id, code, title, duration_minutes, window_start, window_end, status,
            results_released, passcode_hash, allocation_plan, total_questions,
            tab_switch_warn_limit, tab_switch_autosubmit_limit, require_fullscreen,
            allow_retakes, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,FALSE,$8,$9,$10,$11,$12,$13,$14,$15,$16)",
    )
    .bind(assessment.id)
    .bind(assessment.code)
    .bind(assessment.title)
    .bind(assessment.duration_minutes)
    .bind(assessment.window_start)
    .bind(assessment.window_end)
    .bind(assessment.status)
    .bind(assessment.passcode_hash)
    .bind(assessment.allocation_plan)
    .bind(assessment.total_questions)
    .bind(assessment.tab_switch_warn_limit)
    .bind(assessment.tab_switch_autosubmit_limit)
    .bind(assessment.require_fullscreen)
    .bind(assessment.allow_retakes)
    .bind(assessment.created_at)
    .bind(assessment.updated_at)
    .execute(executor)
    .await?;

    Ok(())
}

/// Flips any other active assessment to closed in the same statement scope;
/// callers run both updates inside one transaction so the one-active
/// invariant holds transactionally, not by convention.
pub(crate) async fn close_other_active(
    executor: impl sqlx::PgExecutor<'_>,
    keep_id: &str,
    now: time::PrimitiveDateTime,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE assessments SET status = $1, updated_at = $2 WHERE status = $3 AND id != $4",
    )
    .bind(AssessmentStatus::Closed)
    .bind(now)
    .bind(AssessmentStatus::Active)
    .bind(keep_id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

pub(crate) async fn update_status(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    status: AssessmentStatus,
    now: time::PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE assessments SET status = $1, updated_at = $2 WHERE id = $3")
        .bind(status)
        .bind(now)
        .bind(id)
        .execute(executor)
        .await?;
    Ok(())
}

pub(crate) async fn set_results_released(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    released: bool,
    now: time::PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE assessments SET results_released = $1, updated_at = $2 WHERE id = $3")
        .bind(released)
        .bind(now)
        .bind(id)
        .execute(executor)
        .await?;
    Ok(())
}
