//! Concrete exercise tasks.
//!
//! Every task shares a header (title, finished flag, owning plan, ...) and
//! carries exactly one variant of [`TaskContent`]. Dispatch is always an
//! explicit match on that enum.

use serde::{Deserialize, Serialize};

use super::card::Card;
use crate::error::{Error, Result};

/// Marker delimiting a draggable target inside a drag row sentence
pub const DRAG_MARKER: char = '$';

/// Blank delimiters inside a fill-in sentence
pub const BLANK_OPEN: char = '{';
pub const BLANK_CLOSE: char = '}';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
  Vocab,
  FillIn,
  Dragging,
}

impl TaskKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Vocab => "vocab",
      Self::FillIn => "fill_in",
      Self::Dragging => "dragging",
    }
  }

  pub fn from_str(s: &str) -> Option<Self> {
    match s {
      "vocab" => Some(Self::Vocab),
      "fill_in" => Some(Self::FillIn),
      "dragging" => Some(Self::Dragging),
      _ => None,
    }
  }
}

/// Flashcard review over a fixed list of cards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VocabTask {
  #[serde(default)]
  pub cards: Vec<Card>,
  /// Show the instruction-language side first (the harder direction)
  #[serde(default = "default_true")]
  pub b_side_shown: bool,
}

fn default_true() -> bool {
  true
}

/// Piece of a fill-in sentence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Segment {
  Text(String),
  Blank(String),
}

/// Type the missing words into sentence templates like `The capital of {France} is Paris.`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillInTask {
  pub sentences: Vec<String>,
  /// Maximum edit distance for an answer to count as acceptable
  #[serde(default)]
  pub accepted_levenshtein_distance: u32,
}

impl FillInTask {
  /// Split a sentence template into text and blank segments.
  pub fn segments(sentence: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut text = String::new();
    let mut blank: Option<String> = None;

    for ch in sentence.chars() {
      match (ch, blank.as_mut()) {
        (BLANK_OPEN, None) => {
          if !text.is_empty() {
            segments.push(Segment::Text(std::mem::take(&mut text)));
          }
          blank = Some(String::new());
        }
        (BLANK_OPEN, Some(_)) => {
          return Err(Error::Validation(format!("nested blank in '{}'", sentence)));
        }
        (BLANK_CLOSE, Some(_)) => {
          let solution = blank.take().unwrap_or_default();
          if solution.trim().is_empty() {
            return Err(Error::Validation(format!("empty blank in '{}'", sentence)));
          }
          segments.push(Segment::Blank(solution));
        }
        (BLANK_CLOSE, None) => {
          return Err(Error::Validation(format!("unmatched '}}' in '{}'", sentence)));
        }
        (c, Some(b)) => b.push(c),
        (c, None) => text.push(c),
      }
    }

    if blank.is_some() {
      return Err(Error::Validation(format!("unclosed blank in '{}'", sentence)));
    }
    if !text.is_empty() {
      segments.push(Segment::Text(text));
    }
    Ok(segments)
  }

  /// Expected solutions, one list per sentence.
  pub fn all_solutions(&self) -> Result<Vec<Vec<String>>> {
    self.sentences
      .iter()
      .map(|s| {
        Ok(Self::segments(s)?
          .into_iter()
          .filter_map(|seg| match seg {
            Segment::Blank(solution) => Some(solution),
            Segment::Text(_) => None,
          })
          .collect())
      })
      .collect()
  }

  pub fn validate(&self) -> Result<()> {
    if self.sentences.is_empty() {
      return Err(Error::Validation("fill-in task has no sentences".to_string()));
    }
    for (sentence, solutions) in self.sentences.iter().zip(self.all_solutions()?) {
      if solutions.is_empty() {
        return Err(Error::Validation(format!("sentence without blank: '{}'", sentence)));
      }
    }
    Ok(())
  }
}

/// One sentence with `$target$` spans and distractor options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DragRow {
  pub sentence: String,
  pub distractions: Vec<String>,
}

impl DragRow {
  /// Text between each pair of markers, in order.
  pub fn positives(&self) -> Vec<String> {
    self.sentence
      .split(DRAG_MARKER)
      .enumerate()
      .filter(|(i, _)| i % 2 == 1)
      .map(|(_, s)| s.to_string())
      .collect()
  }

  /// Sentence with every `$target$` collapsed to a single `$` placeholder.
  pub fn stripped_sentence(&self) -> String {
    self.sentence
      .split(DRAG_MARKER)
      .enumerate()
      .filter(|(i, _)| i % 2 == 0)
      .map(|(_, s)| s)
      .collect::<Vec<_>>()
      .join(&DRAG_MARKER.to_string())
  }

  pub fn validate(&self) -> Result<()> {
    let markers = self.sentence.matches(DRAG_MARKER).count();
    if markers % 2 != 0 {
      return Err(Error::Validation(format!("unbalanced '$' in '{}'", self.sentence)));
    }
    let positives = self.positives();
    if positives.is_empty() {
      return Err(Error::Validation(
        "no draggable targets provided in the sentence".to_string(),
      ));
    }
    if positives.iter().any(|p| p.is_empty()) {
      return Err(Error::Validation(format!("empty target in '{}'", self.sentence)));
    }
    if self.distractions.is_empty() {
      return Err(Error::Validation("drag row needs at least one distractor".to_string()));
    }
    Ok(())
  }
}

/// Drag the right words into the gaps of each row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraggingTask {
  pub rows: Vec<DragRow>,
}

impl DraggingTask {
  pub fn validate(&self) -> Result<()> {
    if self.rows.is_empty() {
      return Err(Error::Validation("dragging task has no rows".to_string()));
    }
    self.rows.iter().try_for_each(DragRow::validate)
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskContent {
  Vocab(VocabTask),
  FillIn(FillInTask),
  Dragging(DraggingTask),
}

impl TaskContent {
  pub fn kind(&self) -> TaskKind {
    match self {
      Self::Vocab(_) => TaskKind::Vocab,
      Self::FillIn(_) => TaskKind::FillIn,
      Self::Dragging(_) => TaskKind::Dragging,
    }
  }

  /// Number of answerable units per row (cards count as one row each).
  pub fn unit_counts(&self) -> Result<Vec<usize>> {
    match self {
      Self::Vocab(v) => Ok(vec![1; v.cards.len()]),
      Self::FillIn(f) => Ok(f.all_solutions()?.iter().map(Vec::len).collect()),
      Self::Dragging(d) => Ok(d.rows.iter().map(|r| r.positives().len()).collect()),
    }
  }

  pub fn validate(&self) -> Result<()> {
    match self {
      Self::Vocab(v) => {
        if v.cards.is_empty() {
          return Err(Error::Validation("vocab task has no cards".to_string()));
        }
        Ok(())
      }
      Self::FillIn(f) => f.validate(),
      Self::Dragging(d) => d.validate(),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
  pub id: i64,
  pub exercise_plan_id: i64,
  /// Ordinal within the owning plan
  pub position: i64,
  pub finished: bool,
  pub title: String,
  pub subtitle: Option<String>,
  pub result_description: Option<String>,
  pub text_below_task: Option<String>,
  pub content: TaskContent,
}

impl Task {
  pub fn new(title: String, content: TaskContent) -> Self {
    Self {
      id: 0,
      exercise_plan_id: 0,
      position: 0,
      finished: false,
      title,
      subtitle: None,
      result_description: None,
      text_below_task: None,
      content,
    }
  }

  pub fn kind(&self) -> TaskKind {
    self.content.kind()
  }

  /// Append a result, keeping earlier rounds (e.g. repeated mistakes).
  pub fn push_result(&mut self, description: &str) {
    self.result_description = Some(match self.result_description.take() {
      Some(prev) => format!("{}\nNew Round of Failures Practice:\n{}", prev, description),
      None => description.to_string(),
    });
  }
}
