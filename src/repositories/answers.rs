use time::PrimitiveDateTime;

use crate::db::models::Answer;

pub(crate) const COLUMNS: &str = "\
    id, attempt_id, question_id, option_id, text_response, awarded_marks, \
    created_at, updated_at";

pub(crate) struct UpsertAnswer<'a> {
    pub(crate) id: &'a str,
    pub(crate) attempt_id: &'a str,
    pub(crate) question_id: &'a str,
    pub(crate) option_id: Option<&'a str>,
    pub(crate) text_response: Option<&'a str>,
    pub(crate) now: PrimitiveDateTime,
}

/// Last write wins per (attempt, question). A re-save replaces both response
/// fields so switching a question from one option to another clears any
/// stale text, and vice versa.
pub(crate) async fn upsert(
    executor: impl sqlx::PgExecutor<'_>,
    params: UpsertAnswer<'_>,
) -> Result<Answer, sqlx::Error> {
    sqlx::query_as::<_, Answer>(&format!(
        "INSERT INTO answers (
            id, attempt_id, question_id, option_id, text_response, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7)
        ON CONFLICT (attempt_id, question_id) DO UPDATE SET
            option_id = EXCLUDED.option_id,
            text_response = EXCLUDED.text_response,
            updated_at = EXCLUDED.updated_at
        RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.attempt_id)
    .bind(params.question_id)
    .bind(params.option_id)
    .bind(params.text_response)
    .bind(params.now)
    .bind(params.now)
    .fetch_one(executor)
    .await
}

pub(crate) async fn list_by_attempt(
    executor: impl sqlx::PgExecutor<'_>,
    attempt_id: &str,
) -> Result<Vec<Answer>, sqlx::Error> {
    sqlx::query_as::<_, Answer>(&format!(
        "SELECT {COLUMNS} FROM answers WHERE attempt_id = $1 ORDER BY created_at ASC, id ASC"
    ))
    .bind(attempt_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn set_awarded_marks(
    executor: impl sqlx::PgExecutor<'_>,
    attempt_id: &str,
    question_id: &str,
    awarded_marks: f64,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE answers SET awarded_marks = $1, updated_at = $2 \
         WHERE attempt_id = $3 AND question_id = $4",
    )
    .bind(awarded_marks)
    .bind(now)
    .bind(attempt_id)
    .bind(question_id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}
