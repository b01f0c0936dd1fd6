//! Due-card selection for review sessions.
//!
//! A batch is every card due on or before today, optionally restricted to
//! one category, hardest (lowest easiness factor) first, capped at the
//! session batch size.

use chrono::NaiveDate;
use rusqlite::Connection;

use crate::db;
use crate::domain::{Card, CardCategory};
use crate::error::{Error, Result};

/// Category filter value meaning "no filter"
pub const ALL_CATEGORIES: &str = "All";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DueQuery {
  pub today: NaiveDate,
  pub category: Option<CardCategory>,
  pub limit: usize,
}

impl DueQuery {
  pub fn new(today: NaiveDate, limit: usize) -> Self {
    Self {
      today,
      category: None,
      limit,
    }
  }

  /// Apply a category filter as sent by the host ("All" or a category tag).
  pub fn with_category_filter(mut self, filter: Option<&str>) -> Result<Self> {
    self.category = parse_category_filter(filter)?;
    Ok(self)
  }
}

pub fn parse_category_filter(filter: Option<&str>) -> Result<Option<CardCategory>> {
  match filter.map(str::trim) {
    None | Some("") | Some(ALL_CATEGORIES) => Ok(None),
    Some(tag) => CardCategory::from_str(tag)
      .map(Some)
      .ok_or_else(|| Error::InvalidInput(format!("unknown category '{}'", tag))),
  }
}

pub fn select_batch(conn: &Connection, query: &DueQuery) -> Result<Vec<Card>> {
  let cards = db::get_due_cards(conn, query.today, query.category, query.limit)?;
  tracing::debug!(
    "Selected {} due card(s) (category: {:?}, limit: {})",
    cards.len(),
    query.category,
    query.limit
  );
  Ok(cards)
}

pub fn due_count(conn: &Connection, query: &DueQuery) -> Result<i64> {
  Ok(db::get_due_count(conn, query.today, query.category)?)
}
