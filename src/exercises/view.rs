//! What the host shows for a task. Solutions stay server side.

use rand::Rng;
use serde::Serialize;

use super::attempt::{shuffled_option_pool, DragOption};
use crate::domain::{FillInTask, Segment, Task, TaskContent};
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Piece {
  Text(String),
  Blank,
}

#[derive(Debug, Clone, Serialize)]
pub struct Flashcard {
  pub card_id: i64,
  pub front: String,
  pub back: String,
  pub notes: Option<String>,
  pub has_audio: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskBody {
  FillIn { sentences: Vec<Vec<Piece>> },
  /// Sentences with one `$` per slot, and the shared option pool
  Dragging { segments: Vec<String>, options: Vec<DragOption> },
  Vocab { cards: Vec<Flashcard> },
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskView {
  pub id: i64,
  pub position: i64,
  pub title: String,
  pub subtitle: Option<String>,
  pub text_below_task: Option<String>,
  pub finished: bool,
  pub result_description: Option<String>,
  pub body: TaskBody,
}

fn masked(sentence: &str) -> Result<Vec<Piece>> {
  Ok(
    FillInTask::segments(sentence)?
      .into_iter()
      .map(|seg| match seg {
        Segment::Text(text) => Piece::Text(text),
        Segment::Blank(_) => Piece::Blank,
      })
      .collect(),
  )
}

impl TaskView {
  pub fn build<R: Rng + ?Sized>(task: &Task, rng: &mut R) -> Result<Self> {
    let body = match &task.content {
      TaskContent::FillIn(fill_in) => TaskBody::FillIn {
        sentences: fill_in.sentences.iter().map(|s| masked(s)).collect::<Result<_>>()?,
      },
      TaskContent::Dragging(dragging) => TaskBody::Dragging {
        segments: dragging.rows.iter().map(|r| r.stripped_sentence()).collect(),
        options: shuffled_option_pool(dragging, rng),
      },
      TaskContent::Vocab(vocab) => TaskBody::Vocab {
        cards: vocab
          .cards
          .iter()
          .map(|card| {
            let (front, back) = card.sides(vocab.b_side_shown);
            Flashcard {
              card_id: card.id,
              front: front.to_string(),
              back: back.to_string(),
              notes: card.notes.clone(),
              has_audio: card.has_audio(),
            }
          })
          .collect(),
      },
    };

    Ok(Self {
      id: task.id,
      position: task.position,
      title: task.title.clone(),
      subtitle: task.subtitle.clone(),
      text_below_task: task.text_below_task.clone(),
      finished: task.finished,
      result_description: task.result_description.clone(),
      body,
    })
  }
}
