//! Exercise plans and the attempts made at their tasks.

use axum::{
  extract::{Path, State},
  Json,
};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;

use super::{today, ApiResult};
use crate::db;
use crate::domain::Task;
use crate::error::{Error, Result};
use crate::exercises::{Answers, AttemptState, Evaluation, ExerciseAttempt, TaskView};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct PlanSummary {
  pub id: i64,
  pub title: String,
  pub goal: String,
  pub created_at: NaiveDate,
  pub status: String,
  pub finished: bool,
}

pub async fn list_plans(State(state): State<AppState>) -> ApiResult<Json<Vec<PlanSummary>>> {
  let conn = db::try_lock(&state.db)?;
  let plans = db::get_all_plans(&conn)?
    .into_iter()
    .map(|plan| {
      let status = db::get_plan_status(&conn, plan.id)?;
      Ok(PlanSummary {
        id: plan.id,
        title: plan.title,
        goal: plan.goal,
        created_at: plan.created_at,
        status: status.to_string(),
        finished: status.finished(),
      })
    })
    .collect::<Result<Vec<_>>>()?;
  Ok(Json(plans))
}

pub async fn list_tasks(
  State(state): State<AppState>,
  Path(plan_id): Path<i64>,
) -> ApiResult<Json<Vec<TaskView>>> {
  let conn = db::try_lock(&state.db)?;
  if db::get_exercise_plan(&conn, plan_id)?.is_none() {
    return Err(Error::NotFound(format!("exercise plan {}", plan_id)).into());
  }
  let mut rng = rand::rng();
  let views = db::get_tasks_for_plan(&conn, plan_id)?
    .iter()
    .map(|task| TaskView::build(task, &mut rng))
    .collect::<Result<Vec<_>>>()?;
  Ok(Json(views))
}

fn load_task(conn: &Connection, id: i64) -> Result<Task> {
  db::get_task(conn, id)?.ok_or_else(|| Error::NotFound(format!("task {}", id)))
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
  /// False when some blank or rating is still missing
  pub accepted: bool,
  pub state: AttemptState,
  pub evaluation: Option<Evaluation>,
}

/// Hand in answers and, once complete, evaluate them right away.
pub async fn submit(
  State(state): State<AppState>,
  Path(task_id): Path<i64>,
  Json(answers): Json<Answers>,
) -> ApiResult<Json<SubmitResponse>> {
  let mut attempts = state.lock_attempts()?;
  let mut conn = db::try_lock(&state.db)?;
  let mut task = load_task(&conn, task_id)?;
  let attempt = attempts
    .entry(task_id)
    .or_insert_with(|| ExerciseAttempt::new(&task));

  if !attempt.submit(&task, answers)? {
    return Ok(Json(SubmitResponse {
      accepted: false,
      state: attempt.state(),
      evaluation: None,
    }));
  }

  let evaluation = attempt.evaluate(&mut task, &mut conn, today())?.clone();
  Ok(Json(SubmitResponse {
    accepted: true,
    state: attempt.state(),
    evaluation: Some(evaluation),
  }))
}

#[derive(Debug, Serialize)]
pub struct Finished {
  pub task_id: i64,
  pub result_description: Option<String>,
}

pub async fn finish(
  State(state): State<AppState>,
  Path(task_id): Path<i64>,
) -> ApiResult<Json<Finished>> {
  let mut attempts = state.lock_attempts()?;
  let conn = db::try_lock(&state.db)?;
  let mut task = load_task(&conn, task_id)?;
  let attempt = attempts
    .entry(task_id)
    .or_insert_with(|| ExerciseAttempt::new(&task));

  attempt.finish(&mut task, &conn)?;
  Ok(Json(Finished {
    task_id,
    result_description: task.result_description,
  }))
}

#[derive(Debug, Serialize)]
pub struct PracticeRound {
  pub repeated: bool,
  /// Cards to rate next, in order
  pub card_ids: Vec<i64>,
}

/// Practice the cards failed in the last vocab round.
pub async fn repeat_mistakes(
  State(state): State<AppState>,
  Path(task_id): Path<i64>,
) -> ApiResult<Json<PracticeRound>> {
  let mut attempts = state.lock_attempts()?;
  let attempt = attempts
    .get_mut(&task_id)
    .ok_or_else(|| Error::InvalidInput(format!("task {} has not been evaluated", task_id)))?;

  let repeated = attempt.repeat_mistakes()?;
  let card_ids = match (repeated, attempt.review()) {
    (true, Some(round)) => round.cards().iter().map(|c| c.id).collect(),
    _ => Vec::new(),
  };
  Ok(Json(PracticeRound { repeated, card_ids }))
}
