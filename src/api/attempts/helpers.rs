use sqlx::PgPool;

use crate::api::errors::ApiError;
use crate::core::time::primitive_now_utc;
use crate::db::models::{Attempt, Exam, User};
use crate::db::types::{AttemptStatus, UserRole};
use crate::repositories;
use crate::services::attempt_timing;

pub(crate) async fn fetch_attempt(pool: &PgPool, attempt_id: &str) -> Result<Attempt, ApiError> {
    repositories::attempts::find_by_id(pool, attempt_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch attempt"))?
        .ok_or_else(|| ApiError::NotFound("Attempt not found".to_string()))
}

pub(crate) async fn fetch_exam(pool: &PgPool, exam_id: &str) -> Result<Exam, ApiError> {
    repositories::exams::find_by_id(pool, exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch exam"))?
        .ok_or_else(|| ApiError::NotFound("Exam not found".to_string()))
}

/// Students see only their own attempts; staff see everything.
pub(crate) fn ensure_attempt_access(attempt: &Attempt, user: &User) -> Result<(), ApiError> {
    if user.role == UserRole::Student && attempt.student_id != user.id {
        return Err(ApiError::Forbidden("Access denied"));
    }
    Ok(())
}

/// Lazy expiry: an in-progress attempt whose deadline has passed is closed
/// on first touch, graded from whatever answers were saved. Returns the
/// attempt in its current (possibly just-expired) state.
pub(crate) async fn enforce_deadline(
    pool: &PgPool,
    attempt: Attempt,
) -> Result<Attempt, ApiError> {
    if attempt.status != AttemptStatus::InProgress {
        return Ok(attempt);
    }

    let now = primitive_now_utc();
    if !attempt_timing::is_expired(attempt.deadline, now) {
        return Ok(attempt);
    }

    expire_attempt(pool, &attempt).await?;
    repositories::attempts::fetch_one_by_id(pool, &attempt.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch expired attempt"))
}

/// Grades the saved answers and moves the attempt to its terminal expired
/// state. Grading and closing happen with the attempt row locked, so a
/// concurrent submit or answer save cannot interleave; exactly one closing
/// caller wins.
pub(crate) async fn expire_attempt(pool: &PgPool, attempt: &Attempt) -> Result<bool, ApiError> {
    let set_questions = repositories::questions::list_for_set_with_options(pool, &attempt.set_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load set questions"))?;

    let mut tx =
        pool.begin().await.map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let current = repositories::attempts::find_by_id_for_update(&mut *tx, &attempt.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to lock attempt"))?;
    let Some(current) = current else {
        return Ok(false);
    };
    if current.status != AttemptStatus::InProgress {
        return Ok(false);
    }

    let answers = repositories::answers::list_by_attempt(&mut *tx, &attempt.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load answers"))?;
    let outcome = crate::services::scoring::grade(&set_questions, &answers);

    let now = primitive_now_utc();
    for award in &outcome.awards {
        if let Some(marks) = award.awarded_marks {
            repositories::answers::set_awarded_marks(
                &mut *tx,
                &attempt.id,
                &award.question_id,
                marks,
                now,
            )
            .await
            .map_err(|e| ApiError::internal(e, "Failed to persist answer marks"))?;
        }
    }

    let closed = repositories::attempts::close(
        &mut *tx,
        &attempt.id,
        AttemptStatus::Expired,
        outcome.score,
        None,
        now,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to expire attempt"))?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    if closed {
        metrics::counter!("attempts_expired_total").increment(1);
        tracing::info!(
            attempt_id = %attempt.id,
            exam_id = %attempt.exam_id,
            score = outcome.score,
            "Attempt expired past deadline"
        );
    }

    Ok(closed)
}

pub(crate) async fn grade_attempt(
    pool: &PgPool,
    attempt: &Attempt,
) -> Result<crate::services::scoring::GradeOutcome, ApiError> {
    let set_questions = repositories::questions::list_for_set_with_options(pool, &attempt.set_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load set questions"))?;
    let answers = repositories::answers::list_by_attempt(pool, &attempt.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load answers"))?;

    Ok(crate::services::scoring::grade(&set_questions, &answers))
}
