//! Exercise plans and their tasks

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Result};

use super::cards::{get_cards_for_vocab_task, insert_card};
use super::{format_date, parse_date};
use crate::domain::{ExercisePlan, ExercisePlanStatus, Task, TaskContent, TaskKind, VocabTask};

const TASK_COLUMNS: &str = r#"id, exercise_plan_id, position, kind, finished, title, subtitle,
           result_description, text_below_task, content"#;

/// Serialized task content; vocab cards live in the cards table instead.
fn content_json(content: &TaskContent) -> Result<String> {
  let stored = match content {
    TaskContent::Vocab(v) => serde_json::to_string(&TaskContent::Vocab(VocabTask {
      cards: Vec::new(),
      b_side_shown: v.b_side_shown,
    })),
    other => serde_json::to_string(other),
  };
  stored.map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

/// Persist a fully generated plan: header, tasks and vocab cards, one commit.
///
/// Tasks keep the order of the slice; their positions are rewritten to it.
pub fn save_exercise_plan(
  conn: &mut Connection,
  title: &str,
  goal: &str,
  created_at: NaiveDate,
  tasks: &[Task],
) -> Result<i64> {
  let tx = conn.transaction()?;

  tx.execute(
    "INSERT INTO exercise_plans (created_at, title, goal) VALUES (?1, ?2, ?3)",
    params![format_date(created_at), title, goal],
  )?;
  let plan_id = tx.last_insert_rowid();

  for (position, task) in tasks.iter().enumerate() {
    tx.execute(
      r#"
      INSERT INTO tasks (exercise_plan_id, position, kind, finished, title, subtitle,
                         result_description, text_below_task, content)
      VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
      "#,
      params![
        plan_id,
        position as i64,
        task.kind().as_str(),
        task.finished,
        task.title,
        task.subtitle,
        task.result_description,
        task.text_below_task,
        content_json(&task.content)?,
      ],
    )?;
    let task_id = tx.last_insert_rowid();

    if let TaskContent::Vocab(vocab) = &task.content {
      for card in &vocab.cards {
        let mut card = card.clone();
        card.vocab_task_id = Some(task_id);
        insert_card(&tx, &card)?;
      }
    }
  }

  tx.commit()?;
  Ok(plan_id)
}

pub fn get_exercise_plan(conn: &Connection, id: i64) -> Result<Option<ExercisePlan>> {
  conn
    .query_row(
      "SELECT id, created_at, title, goal FROM exercise_plans WHERE id = ?1",
      params![id],
      row_to_plan,
    )
    .optional()
}

/// Most recent plans first
pub fn get_last_n_plans(conn: &Connection, n: usize) -> Result<Vec<ExercisePlan>> {
  let mut stmt = conn.prepare(
    r#"
    SELECT id, created_at, title, goal
    FROM exercise_plans
    ORDER BY created_at DESC, id DESC
    LIMIT ?1
    "#,
  )?;
  let plans = stmt
    .query_map(params![n as i64], row_to_plan)?
    .collect::<Result<Vec<_>>>()?;
  Ok(plans)
}

pub fn get_all_plans(conn: &Connection) -> Result<Vec<ExercisePlan>> {
  get_last_n_plans(conn, i64::MAX as usize)
}

pub fn get_plan_status(conn: &Connection, plan_id: i64) -> Result<ExercisePlanStatus> {
  conn.query_row(
    r#"
    SELECT COUNT(*), COALESCE(SUM(finished), 0)
    FROM tasks WHERE exercise_plan_id = ?1
    "#,
    params![plan_id],
    |row| {
      let total: i64 = row.get(0)?;
      let finished: i64 = row.get(1)?;
      Ok(ExercisePlanStatus {
        total_tasks: total as usize,
        finished_tasks: finished as usize,
      })
    },
  )
}

/// Tasks of a plan in display order, vocab tasks with their cards
pub fn get_tasks_for_plan(conn: &Connection, plan_id: i64) -> Result<Vec<Task>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {} FROM tasks WHERE exercise_plan_id = ?1 ORDER BY position ASC, id ASC",
    TASK_COLUMNS
  ))?;
  let mut tasks = stmt
    .query_map(params![plan_id], row_to_task)?
    .collect::<Result<Vec<_>>>()?;

  for task in &mut tasks {
    attach_cards(conn, task)?;
  }
  Ok(tasks)
}

pub fn get_task(conn: &Connection, id: i64) -> Result<Option<Task>> {
  let task = conn
    .query_row(
      &format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS),
      params![id],
      row_to_task,
    )
    .optional()?;

  match task {
    Some(mut task) => {
      attach_cards(conn, &mut task)?;
      Ok(Some(task))
    }
    None => Ok(None),
  }
}

pub fn update_result_description(conn: &Connection, task_id: i64, description: Option<&str>) -> Result<()> {
  conn.execute(
    "UPDATE tasks SET result_description = ?1 WHERE id = ?2",
    params![description, task_id],
  )?;
  Ok(())
}

/// Mark a task finished together with its result. Returns false if it already was.
pub fn finish_task(conn: &Connection, task_id: i64, result_description: Option<&str>) -> Result<bool> {
  let changed = conn.execute(
    r#"
    UPDATE tasks
    SET finished = 1, result_description = COALESCE(?1, result_description)
    WHERE id = ?2 AND finished = 0
    "#,
    params![result_description, task_id],
  )?;
  Ok(changed > 0)
}

fn attach_cards(conn: &Connection, task: &mut Task) -> Result<()> {
  if let TaskContent::Vocab(vocab) = &mut task.content {
    vocab.cards = get_cards_for_vocab_task(conn, task.id)?;
  }
  Ok(())
}

fn row_to_plan(row: &rusqlite::Row) -> Result<ExercisePlan> {
  let created_at: String = row.get(1)?;
  Ok(ExercisePlan {
    id: row.get(0)?,
    created_at: parse_date(1, &created_at)?,
    title: row.get(2)?,
    goal: row.get(3)?,
  })
}

fn row_to_task(row: &rusqlite::Row) -> Result<Task> {
  let kind_str: String = row.get(3)?;
  let content_str: String = row.get(9)?;

  let content: TaskContent = serde_json::from_str(&content_str).map_err(|e| {
    rusqlite::Error::FromSqlConversionFailure(9, rusqlite::types::Type::Text, Box::new(e))
  })?;
  if TaskKind::from_str(&kind_str) != Some(content.kind()) {
    return Err(rusqlite::Error::FromSqlConversionFailure(
      3,
      rusqlite::types::Type::Text,
      format!("task kind '{}' does not match its content", kind_str).into(),
    ));
  }

  Ok(Task {
    id: row.get(0)?,
    exercise_plan_id: row.get(1)?,
    position: row.get(2)?,
    finished: row.get(4)?,
    title: row.get(5)?,
    subtitle: row.get(6)?,
    result_description: row.get(7)?,
    text_below_task: row.get(8)?,
    content,
  })
}
