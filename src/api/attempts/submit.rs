use axum::extract::{Path, State};
use axum::Json;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::AttemptStatus;
use crate::repositories;
use crate::schemas::attempt::AttemptResponse;
use crate::services::{attempt_timing, scoring};

use super::helpers;

/// Submit is idempotent: a second call on a closed attempt returns the
/// recorded outcome instead of failing, so clients can retry on timeouts.
/// Grading and the close run with the attempt row locked, the same lock
/// answer saves take, so no answer can slip in after it was scored.
pub(in crate::api::attempts) async fn submit_attempt(
    Path(attempt_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<AttemptResponse>, ApiError> {
    let attempt = helpers::fetch_attempt(state.db(), &attempt_id).await?;
    if attempt.student_id != user.id {
        return Err(ApiError::Forbidden("Access denied"));
    }

    if attempt.status.is_closed() {
        return Ok(Json(AttemptResponse::from_db(attempt)));
    }

    // Set structure is frozen once attempts exist, so this read can sit
    // outside the transaction.
    let set_questions =
        repositories::questions::list_for_set_with_options(state.db(), &attempt.set_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to load set questions"))?;

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let attempt = repositories::attempts::find_by_id_for_update(&mut *tx, &attempt_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to lock attempt"))?
        .ok_or_else(|| ApiError::NotFound("Attempt not found".to_string()))?;

    // Lost the lock race to the expiry sweep.
    if attempt.status.is_closed() {
        return Ok(Json(AttemptResponse::from_db(attempt)));
    }

    let answers = repositories::answers::list_by_attempt(&mut *tx, &attempt.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load answers"))?;
    let outcome = scoring::grade(&set_questions, &answers);

    let now = primitive_now_utc();
    let expired = attempt_timing::is_expired(attempt.deadline, now);
    let (status, submitted_at) = if expired {
        (AttemptStatus::Expired, None)
    } else if outcome.fully_graded {
        (AttemptStatus::Graded, Some(now))
    } else {
        (AttemptStatus::Submitted, Some(now))
    };

    // Awards for unanswered questions have no answer row to land on; the
    // update is a no-op for those and the zero stays implicit in the score.
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

    repositories::attempts::close(&mut *tx, &attempt.id, status, outcome.score, submitted_at, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to close attempt"))?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    let attempt = repositories::attempts::fetch_one_by_id(state.db(), &attempt.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch attempt"))?;

    if expired {
        metrics::counter!("attempts_expired_total").increment(1);
        tracing::info!(
            attempt_id = %attempt.id,
            exam_id = %attempt.exam_id,
            score = outcome.score,
            "Attempt expired past deadline"
        );
    } else {
        metrics::counter!("attempts_submitted_total").increment(1);
        tracing::info!(
            attempt_id = %attempt.id,
            exam_id = %attempt.exam_id,
            score = outcome.score,
            max_score = outcome.max_score,
            status = ?attempt.status,
            "Attempt submitted"
        );
        if attempt.status == AttemptStatus::Graded {
            state.notifier().attempt_graded(&attempt);
        }
    }

    Ok(Json(AttemptResponse::from_db(attempt)))
}
