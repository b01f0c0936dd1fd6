use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Kind of exercise a planner may ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskCategory {
  DragAndDrop,
  FillIn,
  SentenceOrder,
  Vocab,
}

impl TaskCategory {
  pub const ALL: [TaskCategory; 4] = [
    Self::DragAndDrop,
    Self::FillIn,
    Self::SentenceOrder,
    Self::Vocab,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::DragAndDrop => "drag_and_drop",
      Self::FillIn => "fill_in",
      Self::SentenceOrder => "sentence_order",
      Self::Vocab => "vocab",
    }
  }
}

/// Abstract description of one exercise, embedded in a [`StudyPlan`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
  pub category: TaskCategory,
  pub title: String,
  /// Instructions for the task generator on what content to include
  pub generation_instruction: String,
  pub purpose: String,
}

/// Proposed plan produced by the planner agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyPlan {
  /// Chat reply shown to the learner
  pub user_message: String,
  pub title: String,
  pub goal: String,
  pub tasks: Vec<TaskSpec>,
}

impl StudyPlan {
  pub fn validate(&self) -> Result<()> {
    if self.tasks.is_empty() {
      return Err(Error::Validation("study plan has no tasks".to_string()));
    }
    if self.title.trim().is_empty() {
      return Err(Error::Validation("study plan has no title".to_string()));
    }
    if let Some(task) = self.tasks.iter().find(|t| t.title.trim().is_empty()) {
      return Err(Error::Validation(format!(
        "{} task without title",
        task.category.as_str()
      )));
    }
    Ok(())
  }
}

/// Persisted, materialized counterpart of an accepted study plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExercisePlan {
  pub id: i64,
  pub created_at: NaiveDate,
  pub title: String,
  pub goal: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExercisePlanStatus {
  pub total_tasks: usize,
  pub finished_tasks: usize,
}

impl ExercisePlanStatus {
  pub fn finished(&self) -> bool {
    self.total_tasks == self.finished_tasks
  }
}

impl fmt::Display for ExercisePlanStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.finished() {
      write!(f, "All tasks finished!")
    } else {
      let remaining = self.total_tasks - self.finished_tasks;
      write!(
        f,
        "{} task(s) of {} total still open",
        remaining, self.total_tasks
      )
    }
  }
}
