mod answer;
mod grade;
pub(crate) mod helpers;
mod list;
mod start;
mod submit;

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::core::state::AppState;

pub(crate) use list::{list_exam_attempts, list_my_attempts};
pub(crate) use start::start_attempt;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/:attempt_id", get(list::get_attempt))
        .route("/:attempt_id/questions", get(list::get_attempt_questions))
        .route("/:attempt_id/answers", put(answer::save_answer).get(answer::list_answers))
        .route("/:attempt_id/submit", post(submit::submit_attempt))
        .route("/:attempt_id/grade", post(grade::grade_answer))
        .route("/:attempt_id/result", get(list::get_result))
}
