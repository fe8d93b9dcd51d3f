use anyhow::{Context, Result};

use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::repositories;

const SWEEP_BATCH_SIZE: i64 = 200;

/// Backstop for the lazy expiry on the request path: attempts whose owner
/// never came back still get closed and scored shortly after the deadline.
pub(crate) async fn close_expired_attempts(state: &AppState) -> Result<()> {
    let now = primitive_now_utc();

    let attempts = repositories::attempts::list_in_progress_past_deadline(
        state.db(),
        now,
        SWEEP_BATCH_SIZE,
    )
    .await
    .context("Failed to fetch attempts past deadline")?;

    let in_progress = repositories::attempts::count_in_progress(state.db())
        .await
        .context("Failed to count in-progress attempts")?;
    metrics::gauge!("attempts_in_progress").set(in_progress as f64);

    if attempts.is_empty() {
        return Ok(());
    }

    let mut closed = 0;

    for attempt in &attempts {
        match crate::api::attempts::helpers::expire_attempt(state.db(), attempt).await {
            Ok(true) => closed += 1,
            // Lost to a concurrent submit; the attempt is closed either way.
            Ok(false) => {}
            Err(err) => {
                tracing::error!(
                    attempt_id = %attempt.id,
                    exam_id = %attempt.exam_id,
                    error = ?err,
                    "Failed to expire attempt"
                );
            }
        }
    }

    tracing::info!(swept = attempts.len(), closed_attempts = closed, "Closed expired attempts");

    Ok(())
}
