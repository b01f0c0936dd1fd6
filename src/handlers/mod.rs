pub mod cards;
pub mod plans;
pub mod review;
pub mod tasks;

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  routing::{get, post},
  Json, Router,
};
use chrono::NaiveDate;

use crate::error::Error;
use crate::state::AppState;

/// Error wrapper that renders as `{"error": "..."}` with a matching status
#[derive(Debug)]
pub struct ApiError(pub Error);

impl<E: Into<Error>> From<E> for ApiError {
  fn from(err: E) -> Self {
    Self(err.into())
  }
}

impl ApiError {
  fn status(&self) -> StatusCode {
    match &self.0 {
      Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
      Error::NotFound(_) => StatusCode::NOT_FOUND,
      Error::Generation(_) | Error::Validation(_) | Error::Timeout(_) => StatusCode::BAD_GATEWAY,
      _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      tracing::error!("Request failed: {}", self.0);
    } else {
      tracing::debug!("Request rejected: {}", self.0);
    }
    (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
  }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Review dates are calendar days in the learner's local time
pub(crate) fn today() -> NaiveDate {
  chrono::Local::now().date_naive()
}

pub fn router(state: AppState) -> Router {
  Router::new()
    // Deck
    .route("/cards", post(cards::create_card))
    .route("/cards/due", get(cards::due_count))
    .route("/cards/{id}/audio/{side}", get(cards::card_audio))
    .route("/usage", get(cards::model_usage))
    // Review
    .route("/review/start", post(review::start))
    .route("/review/current", get(review::current))
    .route("/review/rate", post(review::rate))
    .route("/review/repeat-mistakes", post(review::repeat_mistakes))
    // Planning
    .route("/plan", get(plans::show).delete(plans::reset))
    .route("/plan/messages", post(plans::send_message))
    .route("/plan/save", post(plans::save))
    .route("/plan/accept", post(plans::accept))
    // Exercises
    .route("/exercise-plans", get(tasks::list_plans))
    .route("/exercise-plans/{id}/tasks", get(tasks::list_tasks))
    .route("/tasks/{id}/submit", post(tasks::submit))
    .route("/tasks/{id}/finish", post(tasks::finish))
    .route("/tasks/{id}/repeat-mistakes", post(tasks::repeat_mistakes))
    .with_state(state)
}
