use std::collections::HashMap;

use crate::db::models::QuestionBank;

pub(crate) const COLUMNS: &str = "id, code, name, created_at, updated_at";

pub(crate) async fn find_by_code(
    executor: impl sqlx::PgExecutor<'_>,
    code: &str,
) -> Result<Option<QuestionBank>, sqlx::Error> {
    sqlx::query_as::<_, QuestionBank>(&format!(
        "SELECT {COLUMNS} FROM question_banks WHERE code = $1"
    ))
    .bind(code)
    .fetch_optional(executor)
    .await
}

/// Question counts for the named banks; banks that do not exist are simply
/// absent from the map, which the allocation resolver reports as
/// `bank_not_found`.
pub(crate) async fn question_counts(
    executor: impl sqlx::PgExecutor<'_>,
    bank_codes: &[String],
) -> Result<HashMap<String, i64>, sqlx::Error> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT b.code, COUNT(q.id) FROM question_banks b \
         LEFT JOIN questions q ON q.bank_id = b.id \
         WHERE b.code = ANY($1) \
         GROUP BY b.code",
    )
    .bind(bank_codes)
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().collect())
}
