use axum::{
  extract::{Path, Query, State},
  http::{header, StatusCode},
  response::IntoResponse,
  Json,
};
use serde::{Deserialize, Serialize};

use super::{today, ApiResult};
use crate::audio::add_card_audio;
use crate::db::{self, CardSide, UsageTotals};
use crate::domain::NewCard;
use crate::error::Error;
use crate::srs::{due_count as count_due, DueQuery};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DueParams {
  pub category: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DueCount {
  pub due: i64,
}

pub async fn due_count(
  State(state): State<AppState>,
  Query(params): Query<DueParams>,
) -> ApiResult<Json<DueCount>> {
  let query = DueQuery::new(today(), state.settings.review_batch_size)
    .with_category_filter(params.category.as_deref())?;
  let conn = db::try_lock(&state.db)?;
  Ok(Json(DueCount {
    due: count_due(&conn, &query)?,
  }))
}

#[derive(Debug, Serialize)]
pub struct CreatedCard {
  pub id: i64,
  pub has_audio: bool,
}

/// Create a card due today, with audio for both sides when synthesis works.
pub async fn create_card(
  State(state): State<AppState>,
  Json(new_card): Json<NewCard>,
) -> ApiResult<impl IntoResponse> {
  let mut card = new_card.into_card(today())?;
  let learner = &state.settings.learner;
  add_card_audio(
    &mut card,
    state.tts.as_ref(),
    &learner.target_language_code,
    &learner.source_language_code,
  )
  .await;

  let conn = db::try_lock(&state.db)?;
  let id = db::insert_card(&conn, &card)?;
  tracing::info!("Created card {} ({})", id, card.a_content);
  Ok((
    StatusCode::CREATED,
    Json(CreatedCard {
      id,
      has_audio: card.has_audio(),
    }),
  ))
}

pub async fn card_audio(
  State(state): State<AppState>,
  Path((id, side)): Path<(i64, String)>,
) -> ApiResult<impl IntoResponse> {
  let side = CardSide::from_str(&side)
    .ok_or_else(|| Error::InvalidInput(format!("unknown card side '{}'", side)))?;
  let conn = db::try_lock(&state.db)?;
  let audio = db::get_card_audio(&conn, id, side)?
    .ok_or_else(|| Error::NotFound(format!("no audio for card {}", id)))?;
  Ok(([(header::CONTENT_TYPE, "audio/mpeg")], audio))
}

pub async fn model_usage(State(state): State<AppState>) -> ApiResult<Json<Vec<UsageTotals>>> {
  let conn = db::try_lock(&state.db)?;
  Ok(Json(db::get_usage_totals(&conn)?))
}
