use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Starting easiness factor for a new card
pub const DEFAULT_EASE_FACTOR: f64 = 2.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CardCategory {
  #[serde(rename = "verb")]
  RegularVerb,
  #[serde(rename = "irregular_verb")]
  IrregularVerb,
  #[serde(rename = "noun")]
  Noun,
  #[serde(rename = "adjective")]
  Adjective,
  #[serde(rename = "adverb")]
  Adverb,
  #[serde(rename = "phrase")]
  Phrase,
  #[serde(rename = "idiom")]
  Idiom,
  #[serde(rename = "expression")]
  Expression,
  #[serde(rename = "grammar")]
  Grammar,
  #[serde(rename = "sentence")]
  Sentence,
  #[serde(rename = "question")]
  Question,
  #[serde(rename = "number")]
  Number,
  #[serde(rename = "preposition")]
  Preposition,
  #[serde(rename = "conjunction")]
  Conjunction,
  #[serde(rename = "pronoun")]
  Pronoun,
  #[serde(rename = "article")]
  Article,
  #[serde(rename = "proverb")]
  Proverb,
  #[serde(rename = "slang")]
  Slang,
  #[serde(rename = "cultural note")]
  CulturalNote,
}

impl CardCategory {
  pub const ALL: [CardCategory; 19] = [
    Self::RegularVerb,
    Self::IrregularVerb,
    Self::Noun,
    Self::Adjective,
    Self::Adverb,
    Self::Phrase,
    Self::Idiom,
    Self::Expression,
    Self::Grammar,
    Self::Sentence,
    Self::Question,
    Self::Number,
    Self::Preposition,
    Self::Conjunction,
    Self::Pronoun,
    Self::Article,
    Self::Proverb,
    Self::Slang,
    Self::CulturalNote,
  ];

  pub fn from_str(s: &str) -> Option<Self> {
    Self::ALL.iter().copied().find(|c| c.as_str() == s)
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::RegularVerb => "verb",
      Self::IrregularVerb => "irregular_verb",
      Self::Noun => "noun",
      Self::Adjective => "adjective",
      Self::Adverb => "adverb",
      Self::Phrase => "phrase",
      Self::Idiom => "idiom",
      Self::Expression => "expression",
      Self::Grammar => "grammar",
      Self::Sentence => "sentence",
      Self::Question => "question",
      Self::Number => "number",
      Self::Preposition => "preposition",
      Self::Conjunction => "conjunction",
      Self::Pronoun => "pronoun",
      Self::Article => "article",
      Self::Proverb => "proverb",
      Self::Slang => "slang",
      Self::CulturalNote => "cultural note",
    }
  }
}

/// SM-2 scheduling state carried by every card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scheduling {
  pub ease_factor: f64,
  pub repetitions: i64,
  pub interval_days: i64,
  /// Last review quality rating (0-5)
  pub quality: u8,
  pub next_date: NaiveDate,
}

impl Scheduling {
  pub fn new(today: NaiveDate) -> Self {
    Self {
      ease_factor: DEFAULT_EASE_FACTOR,
      repetitions: 0,
      interval_days: 0,
      quality: 0,
      next_date: today,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
  pub id: i64,
  /// Target-language side
  pub a_content: String,
  /// Instruction-language side
  pub b_content: String,
  pub notes: Option<String>,
  pub category: CardCategory,
  pub scheduling: Scheduling,
  #[serde(skip)]
  pub a_audio: Option<Vec<u8>>,
  #[serde(skip)]
  pub b_audio: Option<Vec<u8>>,
  /// Vocab task that created this card, if any
  pub vocab_task_id: Option<i64>,
}

impl Card {
  pub fn new(
    a_content: String,
    b_content: String,
    notes: Option<String>,
    category: CardCategory,
    today: NaiveDate,
  ) -> Self {
    Self {
      id: 0,
      a_content,
      b_content,
      notes,
      category,
      scheduling: Scheduling::new(today),
      a_audio: None,
      b_audio: None,
      vocab_task_id: None,
    }
  }

  /// Front and back text depending on which side is shown first.
  pub fn sides(&self, b_side_shown: bool) -> (&str, &str) {
    if b_side_shown {
      (&self.b_content, &self.a_content)
    } else {
      (&self.a_content, &self.b_content)
    }
  }

  pub fn has_audio(&self) -> bool {
    self.a_audio.is_some() || self.b_audio.is_some()
  }
}

/// Card payload as produced by authoring flows and the vocab generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCard {
  pub a_content: String,
  pub b_content: String,
  pub category: CardCategory,
  #[serde(default)]
  pub notes: Option<String>,
}

impl NewCard {
  pub fn validate(&self) -> Result<()> {
    if self.a_content.trim().is_empty() || self.b_content.trim().is_empty() {
      return Err(Error::InvalidInput("card sides must not be empty".to_string()));
    }
    Ok(())
  }

  pub fn into_card(self, today: NaiveDate) -> Result<Card> {
    self.validate()?;
    let notes = self.notes.filter(|n| !n.trim().is_empty());
    Ok(Card::new(
      self.a_content.trim().to_string(),
      self.b_content.trim().to_string(),
      notes,
      self.category,
      today,
    ))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
  }

  #[test]
  fn test_category_from_str_roundtrip() {
    for category in CardCategory::ALL {
      assert_eq!(CardCategory::from_str(category.as_str()), Some(category));
    }
  }

  #[test]
  fn test_category_from_str_invalid() {
    assert_eq!(CardCategory::from_str("Verb"), None);
    assert_eq!(CardCategory::from_str(""), None);
    assert_eq!(CardCategory::from_str("cultural_note"), None);
  }

  #[test]
  fn test_category_serde_uses_tags() {
    let json = serde_json::to_string(&CardCategory::CulturalNote).unwrap();
    assert_eq!(json, "\"cultural note\"");
    let parsed: CardCategory = serde_json::from_str("\"verb\"").unwrap();
    assert_eq!(parsed, CardCategory::RegularVerb);
  }

  #[test]
  fn test_card_new_defaults() {
    let card = Card::new(
      "volver".to_string(),
      "zurückkehren".to_string(),
      None,
      CardCategory::IrregularVerb,
      day(),
    );

    assert_eq!(card.id, 0);
    assert!((card.scheduling.ease_factor - 2.5).abs() < f64::EPSILON);
    assert_eq!(card.scheduling.repetitions, 0);
    assert_eq!(card.scheduling.interval_days, 0);
    assert_eq!(card.scheduling.next_date, day());
    assert!(!card.has_audio());
    assert!(card.vocab_task_id.is_none());
  }

  #[test]
  fn test_card_sides() {
    let card = Card::new("dormir".into(), "schlafen".into(), None, CardCategory::RegularVerb, day());
    assert_eq!(card.sides(true), ("schlafen", "dormir"));
    assert_eq!(card.sides(false), ("dormir", "schlafen"));
  }

  #[test]
  fn test_new_card_rejects_empty_side() {
    let new = NewCard {
      a_content: "  ".to_string(),
      b_content: "kosten".to_string(),
      category: CardCategory::RegularVerb,
      notes: None,
    };
    assert!(matches!(new.into_card(day()), Err(Error::InvalidInput(_))));
  }

  #[test]
  fn test_new_card_trims_and_drops_blank_notes() {
    let new = NewCard {
      a_content: " costar ".to_string(),
      b_content: "kosten".to_string(),
      category: CardCategory::IrregularVerb,
      notes: Some("   ".to_string()),
    };
    let card = new.into_card(day()).unwrap();
    assert_eq!(card.a_content, "costar");
    assert!(card.notes.is_none());
  }
}
