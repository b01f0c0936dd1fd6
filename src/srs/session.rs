//! Review session over a batch of cards.
//!
//! Cards are shown one at a time with an in-memory cursor. Ratings are
//! collected and only written back once the whole batch is done, in a
//! single transaction.

use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;

use super::sm2;
use crate::db;
use crate::domain::Card;
use crate::error::{Error, Result};

/// Only a blackout counts as failed in the summary; anything above is remembered
pub const FAILED_RATING: u8 = 0;

/// What the host shows for the current card
#[derive(Debug, Clone, Serialize)]
pub struct CardView {
  pub card_id: i64,
  pub front: String,
  pub back: String,
  pub notes: Option<String>,
  /// Audio side for front/back ("a" or "b"), when stored
  pub front_audio: Option<&'static str>,
  pub back_audio: Option<&'static str>,
  pub position: usize,
  pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardBrief {
  pub a_content: String,
  pub b_content: String,
  pub notes: Option<String>,
}

impl From<&Card> for CardBrief {
  fn from(card: &Card) -> Self {
    Self {
      a_content: card.a_content.clone(),
      b_content: card.b_content.clone(),
      notes: card.notes.clone(),
    }
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewSummary {
  pub correct: Vec<CardBrief>,
  pub failed: Vec<CardBrief>,
}

impl ReviewSummary {
  pub fn total(&self) -> usize {
    self.correct.len() + self.failed.len()
  }

  /// Text stored as a vocab task's result description
  pub fn description(&self) -> String {
    fn list(cards: &[CardBrief]) -> String {
      if cards.is_empty() {
        return "None".to_string();
      }
      cards
        .iter()
        .map(|c| serde_json::to_string_pretty(c).unwrap_or_else(|_| c.a_content.clone()))
        .collect::<Vec<_>>()
        .join(", ")
    }
    format!("Correct: {}\nIncorrect: {}", list(&self.correct), list(&self.failed))
  }
}

#[derive(Debug, Clone)]
pub struct ReviewSession {
  cards: Vec<Card>,
  cursor: usize,
  ratings: Vec<u8>,
  b_side_shown: bool,
  /// Practice rounds (repeated mistakes) never touch the schedule
  practice: bool,
  committed: bool,
}

impl ReviewSession {
  pub fn new(cards: Vec<Card>, b_side_shown: bool) -> Self {
    Self {
      cards,
      cursor: 0,
      ratings: Vec::new(),
      b_side_shown,
      practice: false,
      committed: false,
    }
  }

  pub fn len(&self) -> usize {
    self.cards.len()
  }

  pub fn is_empty(&self) -> bool {
    self.cards.is_empty()
  }

  pub fn cards(&self) -> &[Card] {
    &self.cards
  }

  pub fn is_practice(&self) -> bool {
    self.practice
  }

  pub fn is_complete(&self) -> bool {
    self.cursor >= self.cards.len()
  }

  pub fn position(&self) -> usize {
    self.cursor
  }

  pub fn current(&self) -> Option<&Card> {
    self.cards.get(self.cursor)
  }

  pub fn current_view(&self) -> Option<CardView> {
    let card = self.current()?;
    let (front, back) = card.sides(self.b_side_shown);
    let (front_side, back_side) = if self.b_side_shown { ("b", "a") } else { ("a", "b") };
    let has = |side: &str| match side {
      "a" => card.a_audio.is_some(),
      _ => card.b_audio.is_some(),
    };

    Some(CardView {
      card_id: card.id,
      front: front.to_string(),
      back: back.to_string(),
      notes: card.notes.clone(),
      front_audio: has(front_side).then_some(front_side),
      back_audio: has(back_side).then_some(back_side),
      position: self.cursor,
      total: self.cards.len(),
    })
  }

  /// Record a rating for the current card and advance.
  pub fn rate(&mut self, quality: u8) -> Result<()> {
    if quality > 5 {
      return Err(Error::InvalidInput(format!(
        "quality must be between 0 and 5, got {}",
        quality
      )));
    }
    if self.is_complete() {
      return Err(Error::InvalidInput("review batch already complete".to_string()));
    }
    self.ratings.push(quality);
    self.cursor += 1;
    Ok(())
  }

  pub fn summary(&self) -> ReviewSummary {
    let mut correct = Vec::new();
    let mut failed = Vec::new();
    for (card, &rating) in self.cards.iter().zip(&self.ratings) {
      if rating > FAILED_RATING {
        correct.push(CardBrief::from(card));
      } else {
        failed.push(CardBrief::from(card));
      }
    }
    ReviewSummary { correct, failed }
  }

  /// Cards with the updated schedule applied, in batch order.
  pub fn scheduled_cards(&self, today: NaiveDate) -> Result<Vec<Card>> {
    self
      .cards
      .iter()
      .zip(&self.ratings)
      .map(|(card, &rating)| {
        let mut card = card.clone();
        sm2::update(&mut card, rating, today)?;
        Ok(card)
      })
      .collect()
  }

  /// Write every rating back to the schedule, once, after the batch is done.
  ///
  /// Practice rounds and already committed sessions only return the summary.
  pub fn commit(&mut self, conn: &mut Connection, today: NaiveDate) -> Result<ReviewSummary> {
    if !self.is_complete() {
      return Err(Error::InvalidInput(format!(
        "review batch incomplete: {} of {} rated",
        self.ratings.len(),
        self.cards.len()
      )));
    }

    if !self.practice && !self.committed {
      let updated = self.scheduled_cards(today)?;
      db::commit_review_batch(conn, &updated)?;
      tracing::info!("Committed review batch of {} card(s)", updated.len());
      self.cards = updated;
      self.committed = true;
    }
    Ok(self.summary())
  }

  /// New practice session from the failed cards, if there were any.
  pub fn repeat_mistakes(&self) -> Option<ReviewSession> {
    let failed: Vec<Card> = self
      .cards
      .iter()
      .zip(&self.ratings)
      .filter(|(_, rating)| **rating == FAILED_RATING)
      .map(|(card, _)| card.clone())
      .collect();

    if failed.is_empty() {
      return None;
    }
    Some(ReviewSession {
      practice: true,
      ..ReviewSession::new(failed, self.b_side_shown)
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::CardCategory;
  use crate::testing::{sample_card, test_today, TestEnv};
  use chrono::Duration;

  fn seeded_session(env: &TestEnv) -> ReviewSession {
    let today = test_today();
    let cards = env.with_conn(|conn| {
      ["gato", "perro", "pájaro"]
        .iter()
        .map(|w| {
          let mut card = sample_card(w, "Tier", CardCategory::Noun, 2.5, today);
          card.id = db::insert_card(conn, &card).unwrap();
          card
        })
        .collect::<Vec<_>>()
    });
    ReviewSession::new(cards, true)
  }

  #[test]
  fn test_cursor_advances_and_shows_b_side_first() {
    let env = TestEnv::new().unwrap();
    let mut session = seeded_session(&env);

    let view = session.current_view().unwrap();
    assert_eq!(view.front, "Tier");
    assert_eq!(view.back, "gato");
    assert_eq!(view.position, 0);
    assert_eq!(view.total, 3);
    assert!(view.front_audio.is_none());

    session.rate(4).unwrap();
    assert_eq!(session.current().unwrap().a_content, "perro");
    assert_eq!(session.position(), 1);
  }

  #[test]
  fn test_invalid_rating_rejected() {
    let env = TestEnv::new().unwrap();
    let mut session = seeded_session(&env);
    assert!(matches!(session.rate(6), Err(Error::InvalidInput(_))));
    assert_eq!(session.position(), 0);
  }

  #[test]
  fn test_commit_requires_complete_batch() {
    let env = TestEnv::new().unwrap();
    let mut session = seeded_session(&env);
    session.rate(5).unwrap();
    let result = env.with_conn(|conn| session.commit(conn, test_today()));
    assert!(matches!(result, Err(Error::InvalidInput(_))));
  }

  #[test]
  fn test_commit_writes_whole_batch_once() {
    let env = TestEnv::new().unwrap();
    let today = test_today();
    let mut session = seeded_session(&env);
    for q in [5, 0, 3] {
      session.rate(q).unwrap();
    }
    assert!(session.is_complete());
    assert!(session.rate(4).is_err());

    let summary = env.with_conn(|conn| session.commit(conn, today)).unwrap();
    assert_eq!(summary.correct.len(), 2);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].a_content, "perro");

    env.with_conn(|conn| {
      let due = db::get_due_cards(conn, today, None, 10).unwrap();
      assert!(due.is_empty());
      let tomorrow = db::get_due_cards(conn, today + Duration::days(1), None, 10).unwrap();
      assert_eq!(tomorrow.len(), 3);
      // Failed card surfaces first
      assert_eq!(tomorrow[0].a_content, "perro");
    });

    // Second commit is a no-op
    let again = env.with_conn(|conn| session.commit(conn, today + Duration::days(5))).unwrap();
    assert_eq!(again.total(), 3);
    env.with_conn(|conn| {
      assert_eq!(db::get_due_count(conn, today + Duration::days(1), None).unwrap(), 3);
    });
  }

  #[test]
  fn test_repeat_mistakes_is_practice() {
    let env = TestEnv::new().unwrap();
    let today = test_today();
    let mut session = seeded_session(&env);
    for q in [0, 4, 0] {
      session.rate(q).unwrap();
    }
    env.with_conn(|conn| session.commit(conn, today)).unwrap();

    let mut practice = session.repeat_mistakes().unwrap();
    assert!(practice.is_practice());
    assert_eq!(practice.len(), 2);
    practice.rate(5).unwrap();
    practice.rate(5).unwrap();
    let summary = env.with_conn(|conn| practice.commit(conn, today)).unwrap();
    assert_eq!(summary.correct.len(), 2);

    // The practice round left the schedule untouched
    env.with_conn(|conn| {
      let cards = db::get_due_cards(conn, today + Duration::days(1), None, 10).unwrap();
      let failed: Vec<_> = cards.iter().filter(|c| c.scheduling.quality == 0).collect();
      assert_eq!(failed.len(), 2);
    });
  }

  #[test]
  fn test_no_mistakes_no_repeat() {
    let env = TestEnv::new().unwrap();
    let mut session = seeded_session(&env);
    for _ in 0..3 {
      session.rate(3).unwrap();
    }
    assert!(session.repeat_mistakes().is_none());
  }

  #[test]
  fn test_summary_description() {
    let env = TestEnv::new().unwrap();
    let mut session = seeded_session(&env);
    for q in [1, 0, 2] {
      session.rate(q).unwrap();
    }
    let description = session.summary().description();
    assert!(description.starts_with("Correct: "));
    assert!(description.contains("\"gato\""));
    assert!(description.contains("\nIncorrect: "));
    assert!(description.contains("\"perro\""));

    let empty = ReviewSummary {
      correct: vec![],
      failed: vec![],
    };
    assert_eq!(empty.description(), "Correct: None\nIncorrect: None");
  }
}
