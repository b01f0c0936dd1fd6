//! Card CRUD and query operations

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Result};

use super::{format_date, parse_date};
use crate::domain::{Card, CardCategory, Scheduling};

const CARD_COLUMNS: &str = r#"id, vocab_task_id, easiness_factor, repetitions, interval_days, quality,
           a_content, b_content, notes, next_date, a_audio, b_audio, category"#;

/// Which side of a card an audio clip belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardSide {
  A,
  B,
}

impl CardSide {
  pub fn from_str(s: &str) -> Option<Self> {
    match s {
      "a" => Some(Self::A),
      "b" => Some(Self::B),
      _ => None,
    }
  }
}

pub fn insert_card(conn: &Connection, card: &Card) -> Result<i64> {
  let s = &card.scheduling;
  conn.execute(
    r#"
    INSERT INTO cards (vocab_task_id, easiness_factor, repetitions, interval_days, quality,
                       a_content, b_content, notes, next_date, a_audio, b_audio, category)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
    "#,
    params![
      card.vocab_task_id,
      s.ease_factor,
      s.repetitions,
      s.interval_days,
      s.quality,
      card.a_content,
      card.b_content,
      card.notes,
      format_date(s.next_date),
      card.a_audio,
      card.b_audio,
      card.category.as_str(),
    ],
  )?;
  Ok(conn.last_insert_rowid())
}

pub fn get_card_by_id(conn: &Connection, id: i64) -> Result<Option<Card>> {
  conn
    .query_row(
      &format!("SELECT {} FROM cards WHERE id = ?1", CARD_COLUMNS),
      params![id],
      row_to_card,
    )
    .optional()
}

/// Cards due on or before `today`, hardest (lowest easiness) first.
pub fn get_due_cards(
  conn: &Connection,
  today: NaiveDate,
  category: Option<CardCategory>,
  limit: usize,
) -> Result<Vec<Card>> {
  let mut stmt = conn.prepare(&format!(
    r#"
    SELECT {}
    FROM cards
    WHERE next_date <= ?1 AND (?2 IS NULL OR category = ?2)
    ORDER BY easiness_factor ASC, id ASC
    LIMIT ?3
    "#,
    CARD_COLUMNS
  ))?;

  let cards = stmt
    .query_map(
      params![format_date(today), category.map(|c| c.as_str()), limit as i64],
      row_to_card,
    )?
    .collect::<Result<Vec<_>>>()?;
  Ok(cards)
}

pub fn get_due_count(conn: &Connection, today: NaiveDate, category: Option<CardCategory>) -> Result<i64> {
  conn.query_row(
    "SELECT COUNT(*) FROM cards WHERE next_date <= ?1 AND (?2 IS NULL OR category = ?2)",
    params![format_date(today), category.map(|c| c.as_str())],
    |row| row.get(0),
  )
}

pub fn get_cards_for_vocab_task(conn: &Connection, vocab_task_id: i64) -> Result<Vec<Card>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {} FROM cards WHERE vocab_task_id = ?1 ORDER BY id ASC",
    CARD_COLUMNS
  ))?;
  let cards = stmt
    .query_map(params![vocab_task_id], row_to_card)?
    .collect::<Result<Vec<_>>>()?;
  Ok(cards)
}

pub fn get_card_audio(conn: &Connection, id: i64, side: CardSide) -> Result<Option<Vec<u8>>> {
  let column = match side {
    CardSide::A => "a_audio",
    CardSide::B => "b_audio",
  };
  conn
    .query_row(
      &format!("SELECT {} FROM cards WHERE id = ?1", column),
      params![id],
      |row| row.get::<_, Option<Vec<u8>>>(0),
    )
    .optional()
    .map(Option::flatten)
}

/// Persist the scheduling state of one reviewed card
pub fn update_card_schedule(conn: &Connection, card: &Card) -> Result<()> {
  let s = &card.scheduling;
  conn.execute(
    r#"
    UPDATE cards
    SET easiness_factor = ?1, repetitions = ?2, interval_days = ?3, quality = ?4, next_date = ?5
    WHERE id = ?6
    "#,
    params![
      s.ease_factor,
      s.repetitions,
      s.interval_days,
      s.quality,
      format_date(s.next_date),
      card.id,
    ],
  )?;
  Ok(())
}

/// Write a whole reviewed batch in a single transaction
pub fn commit_review_batch(conn: &mut Connection, cards: &[Card]) -> Result<()> {
  let tx = conn.transaction()?;
  for card in cards {
    update_card_schedule(&tx, card)?;
  }
  tx.commit()
}

/// Convert a database row to a Card struct
pub(crate) fn row_to_card(row: &rusqlite::Row) -> Result<Card> {
  let next_date_str: String = row.get(9)?;
  let category_str: String = row.get(12)?;
  let category = CardCategory::from_str(&category_str).ok_or_else(|| {
    rusqlite::Error::FromSqlConversionFailure(
      12,
      rusqlite::types::Type::Text,
      format!("unknown card category '{}'", category_str).into(),
    )
  })?;

  Ok(Card {
    id: row.get(0)?,
    vocab_task_id: row.get(1)?,
    scheduling: Scheduling {
      ease_factor: row.get(2)?,
      repetitions: row.get(3)?,
      interval_days: row.get(4)?,
      quality: row.get(5)?,
      next_date: parse_date(9, &next_date_str)?,
    },
    a_content: row.get(6)?,
    b_content: row.get(7)?,
    notes: row.get(8)?,
    a_audio: row.get(10)?,
    b_audio: row.get(11)?,
    category,
  })
}
