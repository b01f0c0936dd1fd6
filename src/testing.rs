//! Test utilities for database setup.
//!
//! Provides helpers that reuse authoritative schema initialization,
//! eliminating schema duplication in test code.

use chrono::NaiveDate;
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use crate::audio::SilentSynthesizer;
use crate::config::{LlmSettings, Settings};
use crate::db::DbPool;
use crate::domain::{Card, CardCategory, StudyPlan, TaskCategory, TaskSpec};
use crate::llm::scripted::ScriptedService;
use crate::planning::{JsonFileStore, PlanningSession};
use crate::state::AppState;

/// Test environment with a teacher.db built from the authoritative schema.
///
/// The database file lives in a temporary directory that is cleaned up
/// when the environment is dropped.
pub struct TestEnv {
  /// Temporary directory (kept alive for database file persistence)
  pub temp: TempDir,
  /// Shared connection, same shape the server uses
  pub pool: DbPool,
}

impl TestEnv {
  /// Create a test environment with the database initialized.
  pub fn new() -> rusqlite::Result<Self> {
    let temp =
      TempDir::new().map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;

    let db_path = temp.path().join("teacher.db");
    let conn = Connection::open(&db_path)?;
    crate::db::schema::run_migrations(&conn)?;

    Ok(Self {
      temp,
      pool: Arc::new(Mutex::new(conn)),
    })
  }

  /// Get the temporary directory path for creating test files.
  pub fn path(&self) -> &Path {
    self.temp.path()
  }

  /// Run a closure against the connection.
  pub fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> T) -> T {
    let mut conn = self.pool.lock().expect("test db lock");
    f(&mut conn)
  }
}

/// Fixed "today" used across tests
pub fn test_today() -> NaiveDate {
  NaiveDate::from_ymd_opt(2025, 5, 20).expect("valid date")
}

/// Card due on `next_date` with a chosen easiness factor
pub fn sample_card(a: &str, b: &str, category: CardCategory, ease: f64, next_date: NaiveDate) -> Card {
  let mut card = Card::new(a.to_string(), b.to_string(), None, category, next_date);
  card.scheduling.ease_factor = ease;
  card
}

/// Single-task study plan as the planner would return it
pub fn sample_plan() -> StudyPlan {
  StudyPlan {
    user_message: "Here is your plan".to_string(),
    title: "Restaurant".to_string(),
    goal: "Order food".to_string(),
    tasks: vec![TaskSpec {
      category: TaskCategory::Vocab,
      title: "Food".to_string(),
      generation_instruction: "10 food words".to_string(),
      purpose: "Vocabulary".to_string(),
    }],
  }
}

/// Handler state over `env` with a scripted model, silent audio and a plan file in the temp dir
pub fn test_state(env: &TestEnv, llm: Arc<ScriptedService>) -> AppState {
  let store = Arc::new(JsonFileStore::new(env.path().join("study_plan.json")));
  let settings = Settings {
    llm: LlmSettings {
      timeout: Duration::from_secs(1),
      ..LlmSettings::default()
    },
    ..Settings::default()
  };
  AppState::new(
    env.pool.clone(),
    llm,
    Arc::new(SilentSynthesizer),
    settings,
    store,
    PlanningSession::new(),
  )
}
