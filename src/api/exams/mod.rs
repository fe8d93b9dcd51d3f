mod helpers;
mod manage;
mod questions;
mod sets;

use axum::{routing::get, routing::post, Router};

use crate::api::attempts;
use crate::core::state::AppState;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(manage::create_exam).get(manage::list_exams))
        .route(
            "/:exam_id",
            get(manage::get_exam).patch(manage::update_exam).delete(manage::delete_exam),
        )
        .route("/:exam_id/publish", post(manage::publish_exam))
        .route("/:exam_id/archive", post(manage::archive_exam))
        .route("/:exam_id/questions", post(questions::add_question).get(questions::list_questions))
        .route(
            "/:exam_id/questions/:question_id",
            get(questions::get_question)
                .patch(questions::update_question)
                .delete(questions::delete_question),
        )
        .route("/:exam_id/sets", post(sets::create_set).get(sets::list_sets))
        .route("/:exam_id/sets/:set_id", get(sets::get_set).delete(sets::delete_set))
        .route("/:exam_id/sets/:set_id/questions", post(sets::add_set_question))
        .route(
            "/:exam_id/sets/:set_id/questions/:question_id",
            axum::routing::delete(sets::remove_set_question),
        )
        .route(
            "/:exam_id/attempts",
            post(attempts::start_attempt).get(attempts::list_exam_attempts),
        )
        .route("/:exam_id/attempts/mine", get(attempts::list_my_attempts))
}
