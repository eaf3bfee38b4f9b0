use crate::db::models::{Question, QuestionOption};

pub(crate) const COLUMNS: &str = "\
    id, bank_id, external_id, category, difficulty, stem, explanation, \
    image_url, topic_tag, created_at, updated_at";

pub(crate) const OPTION_COLUMNS: &str = "id, question_id, option_key, option_text, is_correct";

pub(crate) async fn list_by_bank(
    executor: impl sqlx::PgExecutor<'_>,
    bank_id: &str,
) -> Result<Vec<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "SELECT {COLUMNS} FROM questions WHERE bank_id = $1 ORDER BY external_id"
    ))
    .bind(bank_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn list_options_for_questions(
    executor: impl sqlx::PgExecutor<'_>,
    question_ids: &[String],
) -> Result<Vec<QuestionOption>, sqlx::Error> {
    sqlx::query_as::<_, QuestionOption>(&format!(
        "SELECT {OPTION_COLUMNS} FROM question_options \
         WHERE question_id = ANY($1) ORDER BY question_id, option_key"
    ))
    .bind(question_ids)
    .fetch_all(executor)
    .await
}
