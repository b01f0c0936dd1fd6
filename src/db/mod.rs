pub mod cards;
pub mod plans;
pub mod schema;
pub mod usage;

use chrono::NaiveDate;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{Error, Result};

// Re-export all public items from submodules
pub use cards::*;
pub use plans::*;
pub use schema::run_migrations;
pub use usage::*;

pub type DbPool = Arc<Mutex<Connection>>;

/// Storage format of every date column
pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

/// Try to acquire the database lock, returning an error if poisoned
pub fn try_lock(pool: &DbPool) -> Result<MutexGuard<'_, Connection>> {
  pool.lock().map_err(|_: PoisonError<_>| {
    tracing::error!("Database mutex poisoned - a thread panicked while holding the lock");
    Error::LockPoisoned
  })
}

pub fn init_db(path: &Path) -> Result<DbPool> {
  crate::config::ensure_parent_dir(path)?;

  let conn = Connection::open(path)?;
  run_migrations(&conn)?;
  Ok(Arc::new(Mutex::new(conn)))
}

pub(crate) fn format_date(date: NaiveDate) -> String {
  date.format(DATE_FORMAT).to_string()
}

/// Parse a stored date column, reporting the column index on failure
pub(crate) fn parse_date(idx: usize, value: &str) -> rusqlite::Result<NaiveDate> {
  NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|e| {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
  })
}
