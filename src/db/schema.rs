use rusqlite::{Connection, Result};

fn column_exists(conn: &Connection, table: &str, column: &str) -> bool {
  conn
    .prepare(&format!("SELECT {} FROM {} LIMIT 1", column, table))
    .is_ok()
}

fn add_column_if_missing(conn: &Connection, table: &str, column: &str, column_def: &str) -> Result<()> {
  if !column_exists(conn, table, column) {
    conn.execute(
      &format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, column_def),
      [],
    )?;
  }
  Ok(())
}

pub fn run_migrations(conn: &Connection) -> Result<()> {
  // Create tables with COMPLETE schema for new databases
  // Migrations below handle upgrades for existing databases
  conn.execute_batch(
    r#"
    CREATE TABLE IF NOT EXISTS cards (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      vocab_task_id INTEGER,
      easiness_factor REAL NOT NULL DEFAULT 2.5,
      repetitions INTEGER NOT NULL DEFAULT 0,
      interval_days INTEGER NOT NULL DEFAULT 0,
      quality INTEGER NOT NULL DEFAULT 0,
      a_content TEXT NOT NULL,
      b_content TEXT NOT NULL,
      notes TEXT,
      next_date TEXT NOT NULL,
      a_audio BLOB,
      b_audio BLOB,
      category TEXT NOT NULL,
      FOREIGN KEY (vocab_task_id) REFERENCES tasks(id)
    );

    CREATE TABLE IF NOT EXISTS exercise_plans (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      created_at TEXT NOT NULL,
      title TEXT NOT NULL,
      goal TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS tasks (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      exercise_plan_id INTEGER NOT NULL,
      position INTEGER NOT NULL DEFAULT 0,
      kind TEXT NOT NULL,
      finished INTEGER NOT NULL DEFAULT 0,
      title TEXT NOT NULL,
      subtitle TEXT,
      result_description TEXT,
      text_below_task TEXT,
      content TEXT NOT NULL,
      FOREIGN KEY (exercise_plan_id) REFERENCES exercise_plans(id)
    );

    CREATE TABLE IF NOT EXISTS model_usage (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      model_name TEXT NOT NULL,
      prompt_tokens INTEGER NOT NULL DEFAULT 0,
      response_tokens INTEGER NOT NULL DEFAULT 0,
      thoughts_tokens INTEGER NOT NULL DEFAULT 0,
      total_tokens INTEGER NOT NULL DEFAULT 0,
      created_at TEXT NOT NULL
    );

    -- Indexes
    CREATE INDEX IF NOT EXISTS idx_cards_next_date ON cards(next_date);
    CREATE INDEX IF NOT EXISTS idx_cards_easiness ON cards(easiness_factor);
    CREATE INDEX IF NOT EXISTS idx_cards_category ON cards(category);
    CREATE INDEX IF NOT EXISTS idx_cards_vocab_task ON cards(vocab_task_id);
    CREATE INDEX IF NOT EXISTS idx_exercise_plans_created ON exercise_plans(created_at);
    CREATE INDEX IF NOT EXISTS idx_tasks_plan ON tasks(exercise_plan_id);
    CREATE INDEX IF NOT EXISTS idx_tasks_finished ON tasks(finished);
    CREATE INDEX IF NOT EXISTS idx_model_usage_model ON model_usage(model_name);
    "#,
  )?;

  // ============================================================
  // MIGRATIONS FOR EXISTING DATABASES
  // These are no-ops for new databases (columns already exist)
  // ============================================================

  // Migration: thinking token accounting for reasoning models
  add_column_if_missing(conn, "model_usage", "thoughts_tokens", "INTEGER NOT NULL DEFAULT 0")?;

  // Migration: explicit task ordering within a plan
  let had_position = column_exists(conn, "tasks", "position");
  add_column_if_missing(conn, "tasks", "position", "INTEGER NOT NULL DEFAULT 0")?;

  // Backfill ONLY if we just added the column; insertion order was the display order
  if !had_position {
    conn.execute("UPDATE tasks SET position = id", [])?;
  }

  Ok(())
}
