use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::ExamSet;

pub(crate) const COLUMNS: &str = "\
    id, exam_id, name, access_password_hash, created_at, updated_at";

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<ExamSet>, sqlx::Error> {
    sqlx::query_as::<_, ExamSet>(&format!("SELECT {COLUMNS} FROM exam_sets WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Assignment depends on this ordering being stable across calls, so it
/// sorts by creation time with id as the tie-break.
pub(crate) async fn list_by_exam(
    executor: impl sqlx::PgExecutor<'_>,
    exam_id: &str,
) -> Result<Vec<ExamSet>, sqlx::Error> {
    sqlx::query_as::<_, ExamSet>(&format!(
        "SELECT {COLUMNS} FROM exam_sets WHERE exam_id = $1 ORDER BY created_at ASC, id ASC"
    ))
    .bind(exam_id)
    .fetch_all(executor)
    .await
}

pub(crate) struct CreateSet<'a> {
    pub(crate) id: &'a str,
    pub(crate) exam_id: &'a str,
    pub(crate) name: &'a str,
    pub(crate) access_password_hash: Option<&'a str>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateSet<'_>,
) -> Result<ExamSet, sqlx::Error> {
    sqlx::query_as::<_, ExamSet>(&format!(
        "INSERT INTO exam_sets (id, exam_id, name, access_password_hash, created_at, updated_at)
         VALUES ($1,$2,$3,$4,$5,$6)
         RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.exam_id)
    .bind(params.name)
    .bind(params.access_password_hash)
    .bind(params.created_at)
    .bind(params.updated_at)
    .fetch_one(executor)
    .await
}

pub(crate) async fn delete_by_id(pool: &PgPool, id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM exam_sets WHERE id = $1").bind(id).execute(pool).await?;
    Ok(())
}

pub(crate) async fn add_question(
    executor: impl sqlx::PgExecutor<'_>,
    set_id: &str,
    question_id: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO set_questions (set_id, question_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(set_id)
    .bind(question_id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub(crate) async fn remove_question(
    pool: &PgPool,
    set_id: &str,
    question_id: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM set_questions WHERE set_id = $1 AND question_id = $2")
        .bind(set_id)
        .bind(question_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub(crate) async fn contains_question(
    executor: impl sqlx::PgExecutor<'_>,
    set_id: &str,
    question_id: &str,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM set_questions WHERE set_id = $1 AND question_id = $2)",
    )
    .bind(set_id)
    .bind(question_id)
    .fetch_one(executor)
    .await
}

pub(crate) async fn max_score(
    executor: impl sqlx::PgExecutor<'_>,
    set_id: &str,
) -> Result<f64, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT COALESCE(SUM(q.marks), 0) FROM questions q \
         JOIN set_questions sq ON sq.question_id = q.id \
         WHERE sq.set_id = $1",
    )
    .bind(set_id)
    .fetch_one(executor)
    .await
}

pub(crate) async fn question_count(
    executor: impl sqlx::PgExecutor<'_>,
    set_id: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM set_questions WHERE set_id = $1")
        .bind(set_id)
        .fetch_one(executor)
        .await
}
