pub(crate) mod assignment;
pub(crate) mod attempt_timing;
pub(crate) mod notifications;
pub(crate) mod scoring;

use thiserror::Error;

/// Expected, caller-recoverable engine conditions. None of these are system
/// failures; persistence errors stay on the sqlx/anyhow path and surface as
/// internal errors instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum EngineError {
    #[error("exam has no sets configured")]
    NoSetsConfigured,
    #[error("an attempt is already in progress for this exam")]
    AttemptAlreadyActive { attempt_id: String },
    #[error("attempt is no longer accepting writes")]
    AttemptClosed,
    #[error("question is not part of the assigned set")]
    QuestionNotInAssignedSet,
    #[error("all allowed attempts have been used")]
    AttemptsExhausted,
    #[error("outside the exam window")]
    OutsideExamWindow,
}
