//! Planning chat: talk to the planner, keep or drop the plan, accept it.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

use super::{today, ApiResult};
use crate::db;
use crate::domain::StudyPlan;
use crate::error::Error;
use crate::exercises::TaskGenerator;
use crate::planning::{recent_plan_records, run_collecting, ChatMessage, Materializer, PlanEvent, PlanGenerator};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct PlanningView {
  pub history: Vec<ChatMessage>,
  pub plan: Option<StudyPlan>,
}

pub async fn show(State(state): State<AppState>) -> Json<PlanningView> {
  let session = state.planning.lock().await;
  Json(PlanningView {
    history: session.history().to_vec(),
    plan: session.plan().cloned(),
  })
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
  pub text: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
  pub events: Vec<PlanEvent>,
  pub plan: Option<StudyPlan>,
}

/// Append the learner's message and run the planner/critic loop over the chat.
///
/// The session only changes when the run completes.
pub async fn send_message(
  State(state): State<AppState>,
  Json(request): Json<MessageRequest>,
) -> ApiResult<Json<MessageResponse>> {
  let settings = &state.settings;
  let mut session = state.planning.lock().await;
  let mut working = session.clone();
  working.push_user_message(&request.text)?;

  let past_plans = {
    let conn = db::try_lock(&state.db)?;
    recent_plan_records(&conn, settings.planning.summary_plans)?
  };

  let generator = PlanGenerator {
    llm: state.llm.as_ref(),
    learner: &settings.learner,
    settings: &settings.llm,
    critique_rounds: settings.planning.critique_rounds,
  };
  let (history, events) = run_collecting(&generator, working.history().to_vec(), &past_plans).await?;
  tracing::debug!("Planning run emitted {} event(s)", events.len());
  working.apply_run(history, &events);
  *session = working;

  Ok(Json(MessageResponse {
    events,
    plan: session.plan().cloned(),
  }))
}

pub async fn save(State(state): State<AppState>) -> ApiResult<StatusCode> {
  let session = state.planning.lock().await;
  session.save(state.store.as_ref())?;
  Ok(StatusCode::NO_CONTENT)
}

pub async fn reset(State(state): State<AppState>) -> ApiResult<StatusCode> {
  let mut session = state.planning.lock().await;
  session.reset(state.store.as_ref())?;
  tracing::info!("Study plan discarded");
  Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct Accepted {
  pub exercise_plan_id: i64,
}

/// Generate every task of the current plan and store it as an exercise plan.
pub async fn accept(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
  let settings = &state.settings;
  let mut session = state.planning.lock().await;
  let plan = session
    .plan()
    .cloned()
    .ok_or_else(|| Error::NotFound("no study plan to accept".to_string()))?;

  let today = today();
  let materializer = Materializer {
    generator: TaskGenerator {
      llm: state.llm.as_ref(),
      tts: state.tts.as_ref(),
      learner: &settings.learner,
      disable_thinking: settings.llm.disable_thinking,
      today,
    },
    retries: settings.llm.retries,
    timeout: settings.llm.timeout,
  };
  let exercise_plan_id = materializer.materialize(&plan, &state.db, today).await?;

  session.reset(state.store.as_ref())?;
  Ok((StatusCode::CREATED, Json(Accepted { exercise_plan_id })))
}
