use std::collections::HashMap;

use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::{Question, QuestionOption};
use crate::db::types::QuestionKind;

pub(crate) const COLUMNS: &str = "\
    id, exam_id, question_text, kind, marks, position, created_at, updated_at";

const OPTION_COLUMNS: &str = "id, question_id, option_text, is_correct, position";

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!("SELECT {COLUMNS} FROM questions WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn list_by_exam(pool: &PgPool, exam_id: &str) -> Result<Vec<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "SELECT {COLUMNS} FROM questions WHERE exam_id = $1 ORDER BY position ASC, id ASC"
    ))
    .bind(exam_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_options(
    pool: &PgPool,
    question_id: &str,
) -> Result<Vec<QuestionOption>, sqlx::Error> {
    sqlx::query_as::<_, QuestionOption>(&format!(
        "SELECT {OPTION_COLUMNS} FROM question_options WHERE question_id = $1 \
         ORDER BY position ASC, id ASC"
    ))
    .bind(question_id)
    .fetch_all(pool)
    .await
}

/// Loads a set's questions with their options in two queries, ordered by
/// question position.
pub(crate) async fn list_for_set_with_options(
    executor: &PgPool,
    set_id: &str,
) -> Result<Vec<(Question, Vec<QuestionOption>)>, sqlx::Error> {
    let questions = sqlx::query_as::<_, Question>(
        "SELECT q.id, q.exam_id, q.question_text, q.kind, q.marks, q.position, \
                q.created_at, q.updated_at \
         FROM questions q \
         JOIN set_questions sq ON sq.question_id = q.id \
         WHERE sq.set_id = $1 \
         ORDER BY q.position ASC, q.id ASC",
    )
    .bind(set_id)
    .fetch_all(executor)
    .await?;

    let options = sqlx::query_as::<_, QuestionOption>(
        "SELECT o.id, o.question_id, o.option_text, o.is_correct, o.position \
         FROM question_options o \
         JOIN set_questions sq ON sq.question_id = o.question_id \
         WHERE sq.set_id = $1 \
         ORDER BY o.position ASC, o.id ASC",
    )
    .bind(set_id)
    .fetch_all(executor)
    .await?;

    let mut grouped: HashMap<String, Vec<QuestionOption>> = HashMap::new();
    for option in options {
        grouped.entry(option.question_id.clone()).or_default().push(option);
    }

    Ok(questions
        .into_iter()
        .map(|question| {
            let options = grouped.remove(&question.id).unwrap_or_default();
            (question, options)
        })
        .collect())
}

pub(crate) struct CreateQuestion<'a> {
    pub(crate) id: &'a str,
    pub(crate) exam_id: &'a str,
    pub(crate) question_text: &'a str,
    pub(crate) kind: QuestionKind,
    pub(crate) marks: f64,
    pub(crate) position: i32,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateQuestion<'_>,
) -> Result<Question, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "INSERT INTO questions (
            id, exam_id, question_text, kind, marks, position, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
        RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.exam_id)
    .bind(params.question_text)
    .bind(params.kind)
    .bind(params.marks)
    .bind(params.position)
    .bind(params.created_at)
    .bind(params.updated_at)
    .fetch_one(executor)
    .await
}

pub(crate) struct CreateOption<'a> {
    pub(crate) id: &'a str,
    pub(crate) question_id: &'a str,
    pub(crate) option_text: &'a str,
    pub(crate) is_correct: bool,
    pub(crate) position: i32,
}

pub(crate) async fn create_option(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateOption<'_>,
) -> Result<QuestionOption, sqlx::Error> {
    sqlx::query_as::<_, QuestionOption>(&format!(
        "INSERT INTO question_options (id, question_id, option_text, is_correct, position)
         VALUES ($1,$2,$3,$4,$5)
         RETURNING {OPTION_COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.question_id)
    .bind(params.option_text)
    .bind(params.is_correct)
    .bind(params.position)
    .fetch_one(executor)
    .await
}

pub(crate) struct UpdateQuestion<'a> {
    pub(crate) question_text: Option<&'a str>,
    pub(crate) marks: Option<f64>,
    pub(crate) position: Option<i32>,
    pub(crate) updated_at: PrimitiveDateTime,
}

pub(crate) async fn update(
    pool: &PgPool,
    id: &str,
    params: UpdateQuestion<'_>,
) -> Result<Question, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "UPDATE questions SET
            question_text = COALESCE($1, question_text),
            marks = COALESCE($2, marks),
            position = COALESCE($3, position),
            updated_at = $4
         WHERE id = $5
         RETURNING {COLUMNS}",
    ))
    .bind(params.question_text)
    .bind(params.marks)
    .bind(params.position)
    .bind(params.updated_at)
    .bind(id)
    .fetch_one(pool)
    .await
}

pub(crate) async fn delete_by_id(pool: &PgPool, id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM questions WHERE id = $1").bind(id).execute(pool).await?;
    Ok(())
}
