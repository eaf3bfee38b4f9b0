pub(crate) struct CreateViolation<'a> {
    pub(crate) id: &'a str,
    pub(crate) session_id: &'a str,
    pub(crate) event_type: &'a str,
    pub(crate) details: Option<&'a str>,
    pub(crate) question_index: Option<i32>,
    pub(crate) created_at: time::PrimitiveDateTime,
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    violation: CreateViolation<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO violation_events (
            id, session_id, event_type, details, question_index, created_at
        ) VALUES ($1,$2,$3,$4,$5,$6)",
    )
    .bind(violation.id)
    .bind(violation.session_id)
    .bind(violation.event_type)
    .bind(violation.details)
    .bind(violation.question_index)
    .bind(violation.created_at)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn count_for_session(
    executor: impl sqlx::PgExecutor<'_>,
    session_id: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM violation_events WHERE session_id = $1")
        .bind(session_id)
        .fetch_one(executor)
        .await
}
