//! Standalone review of due cards from the whole deck.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use super::{today, ApiResult};
use crate::db;
use crate::error::Error;
use crate::srs::{select_batch, CardView, DueQuery, ReviewSession, ReviewSummary};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StartRequest {
  /// "All" or a category tag
  pub category: Option<String>,
  /// Show the instruction-language side first
  pub b_side_shown: bool,
}

#[derive(Debug, Serialize)]
pub struct RoundResponse {
  pub total: usize,
  pub practice: bool,
  pub card: Option<CardView>,
}

impl From<&ReviewSession> for RoundResponse {
  fn from(session: &ReviewSession) -> Self {
    Self {
      total: session.len(),
      practice: session.is_practice(),
      card: session.current_view(),
    }
  }
}

pub async fn start(
  State(state): State<AppState>,
  Json(request): Json<StartRequest>,
) -> ApiResult<Json<RoundResponse>> {
  let query = DueQuery::new(today(), state.settings.review_batch_size)
    .with_category_filter(request.category.as_deref())?;
  let cards = {
    let conn = db::try_lock(&state.db)?;
    select_batch(&conn, &query)?
  };

  let session = ReviewSession::new(cards, request.b_side_shown);
  let response = RoundResponse::from(&session);
  *state.lock_review()? = Some(session);
  Ok(Json(response))
}

pub async fn current(State(state): State<AppState>) -> ApiResult<Json<RoundResponse>> {
  let review = state.lock_review()?;
  let session = review
    .as_ref()
    .ok_or_else(|| Error::NotFound("no review in progress".to_string()))?;
  Ok(Json(RoundResponse::from(session)))
}

#[derive(Debug, Deserialize)]
pub struct RateRequest {
  pub quality: u8,
}

#[derive(Debug, Serialize)]
pub struct RateResponse {
  pub complete: bool,
  pub card: Option<CardView>,
  /// Present once the last card is rated
  pub summary: Option<ReviewSummary>,
}

/// Rate the current card. The last rating writes the whole batch back.
pub async fn rate(
  State(state): State<AppState>,
  Json(request): Json<RateRequest>,
) -> ApiResult<Json<RateResponse>> {
  let mut review = state.lock_review()?;
  let session = review
    .as_mut()
    .ok_or_else(|| Error::NotFound("no review in progress".to_string()))?;
  session.rate(request.quality)?;

  if !session.is_complete() {
    return Ok(Json(RateResponse {
      complete: false,
      card: session.current_view(),
      summary: None,
    }));
  }

  let mut conn = db::try_lock(&state.db)?;
  let summary = session.commit(&mut conn, today())?;
  Ok(Json(RateResponse {
    complete: true,
    card: None,
    summary: Some(summary),
  }))
}

/// Start a practice round over the failed cards of the finished batch.
pub async fn repeat_mistakes(State(state): State<AppState>) -> ApiResult<Json<RoundResponse>> {
  let mut review = state.lock_review()?;
  let session = review
    .as_mut()
    .ok_or_else(|| Error::NotFound("no review in progress".to_string()))?;
  if !session.is_complete() {
    return Err(Error::InvalidInput("review batch not finished yet".to_string()).into());
  }

  match session.repeat_mistakes() {
    Some(practice) => {
      tracing::debug!("Repeating {} mistake(s)", practice.len());
      *session = practice;
      Ok(Json(RoundResponse::from(&*session)))
    }
    None => Ok(Json(RoundResponse {
      total: 0,
      practice: true,
      card: None,
    })),
  }
}
