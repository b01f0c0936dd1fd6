//! Turning a [`TaskSpec`] into a concrete [`Task`] with the model.
//!
//! Each category has its own system prompt and response shape. Responses
//! are validated before they become tasks; anything unusable ends as `None`.

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use crate::audio::{add_card_audio, AudioSynthesizer};
use crate::config::LearnerProfile;
use crate::domain::{
  CardCategory, DragRow, DraggingTask, FillInTask, NewCard, Task, TaskCategory, TaskContent, TaskSpec,
  VocabTask, DRAG_MARKER,
};
use crate::error::{Error, Result};
use crate::llm::{
  generate_structured, schema, with_timeout, Content, GenerationRequest, GenerationService, StructuredOutput,
};

// ============================================================================
// Response shapes
// ============================================================================

impl StructuredOutput for NewCard {
  fn response_schema() -> Value {
    let tags: Vec<&str> = CardCategory::ALL.iter().map(CardCategory::as_str).collect();
    schema::object(
      &[
        ("a_content", schema::described(schema::string(), "The content of one side")),
        (
          "b_content",
          schema::described(schema::string(), "The content of the translation/other side"),
        ),
        ("category", schema::string_enum(&tags)),
        (
          "notes",
          schema::nullable(schema::described(
            schema::string(),
            "Optional notes and context or examples",
          )),
        ),
      ],
      &["a_content", "b_content", "category"],
    )
  }

  fn validate(&self) -> Result<()> {
    NewCard::validate(self).map_err(|e| Error::Validation(e.to_string()))
  }
}

/// Fill-in task as the model writes it
#[derive(Debug, Deserialize)]
pub struct FillInDraft {
  pub title: String,
  #[serde(default)]
  pub subtitle: Option<String>,
  pub sentences: Vec<String>,
  #[serde(default)]
  pub accepted_levenshtein_distance: u32,
  #[serde(default)]
  pub text_below_task: Option<String>,
}

impl StructuredOutput for FillInDraft {
  fn response_schema() -> Value {
    schema::object(
      &[
        ("title", schema::described(schema::string(), "Main title for the task.")),
        (
          "subtitle",
          schema::nullable(schema::described(
            schema::string(),
            "Optional text shown below the title for context.",
          )),
        ),
        (
          "sentences",
          schema::described(
            schema::array(schema::string()),
            "List of sentence rows for the task. Each row is a sentence template with \
             placeholders delimited by '{}'. Example: 'The capital of {France} is Paris.'",
          ),
        ),
        (
          "accepted_levenshtein_distance",
          schema::described(
            schema::integer(),
            "Maximum Levenshtein distance for an answer to be considered acceptable. \
             0 means only exact matches (after normalization) count.",
          ),
        ),
        (
          "text_below_task",
          schema::nullable(schema::described(
            schema::string(),
            "Optional text or instructions shown after the task.",
          )),
        ),
      ],
      &["title", "sentences", "accepted_levenshtein_distance"],
    )
  }

  fn validate(&self) -> Result<()> {
    self.content().validate()
  }
}

impl FillInDraft {
  fn content(&self) -> FillInTask {
    FillInTask {
      sentences: self.sentences.clone(),
      accepted_levenshtein_distance: self.accepted_levenshtein_distance,
    }
  }

  pub fn into_task(self) -> Task {
    let content = TaskContent::FillIn(self.content());
    let mut task = Task::new(self.title, content);
    task.subtitle = self.subtitle;
    task.text_below_task = self.text_below_task;
    task
  }
}

impl StructuredOutput for DragRow {
  fn response_schema() -> Value {
    schema::object(
      &[
        (
          "sentence",
          schema::described(
            schema::string(),
            "Sentence shown to the user. Mark each draggable target with '$'. \
             Example: 'At what time $does$ your sister dance and how old does she $get$?'",
          ),
        ),
        (
          "distractions",
          schema::described(
            schema::array(schema::string()),
            "Distractor options, similar to the correct answers.",
          ),
        ),
      ],
      &["sentence", "distractions"],
    )
  }

  fn validate(&self) -> Result<()> {
    DragRow::validate(self)
  }
}

/// Drag-and-drop task as the model writes it
#[derive(Debug, Deserialize)]
pub struct DraggingDraft {
  pub title: String,
  #[serde(default)]
  pub text_under_title: Option<String>,
  pub rows: Vec<DragRow>,
  #[serde(default)]
  pub text_below_task: Option<String>,
}

impl StructuredOutput for DraggingDraft {
  fn response_schema() -> Value {
    schema::object(
      &[
        ("title", schema::described(schema::string(), "Main title for the task.")),
        (
          "text_under_title",
          schema::nullable(schema::described(
            schema::string(),
            "Optional text shown below the title for context.",
          )),
        ),
        (
          "rows",
          schema::described(
            schema::array(DragRow::response_schema()),
            "List of sentence rows for the task.",
          ),
        ),
        (
          "text_below_task",
          schema::nullable(schema::described(
            schema::string(),
            "Optional text shown after the main task content.",
          )),
        ),
      ],
      &["title", "rows"],
    )
  }

  fn validate(&self) -> Result<()> {
    DraggingTask {
      rows: self.rows.clone(),
    }
    .validate()
  }
}

impl DraggingDraft {
  pub fn into_task(self) -> Task {
    let content = TaskContent::Dragging(DraggingTask { rows: self.rows });
    let mut task = Task::new(self.title, content);
    task.subtitle = self.text_under_title;
    task.text_below_task = self.text_below_task;
    task
  }
}

/// Translate a sentence by ordering target-language words.
#[derive(Debug, Deserialize)]
pub struct SentenceOrder {
  pub title: String,
  pub subtitle: String,
  pub source_sentence: String,
  pub target_sentence: String,
  #[serde(default)]
  pub distractor_words: Vec<String>,
}

impl StructuredOutput for SentenceOrder {
  fn response_schema() -> Value {
    schema::object(
      &[
        (
          "title",
          schema::described(schema::string(), "Short, descriptive title for the translation task"),
        ),
        (
          "subtitle",
          schema::described(schema::string(), "Instructions or context for the translation activity"),
        ),
        (
          "source_sentence",
          schema::described(schema::string(), "Sentence in the instruction language"),
        ),
        (
          "target_sentence",
          schema::described(
            schema::string(),
            "Correct translation of the sentence in the target language",
          ),
        ),
        (
          "distractor_words",
          schema::described(
            schema::array(schema::string()),
            "Extra words to increase task difficulty",
          ),
        ),
      ],
      &["title", "subtitle", "source_sentence", "target_sentence", "distractor_words"],
    )
  }

  fn validate(&self) -> Result<()> {
    self.row().validate()
  }
}

impl SentenceOrder {
  /// Every target word becomes a slot, in order.
  fn row(&self) -> DragRow {
    let sentence = self
      .target_sentence
      .split_whitespace()
      .map(|word| format!("{m}{word}{m}", m = DRAG_MARKER, word = word.replace(DRAG_MARKER, "")))
      .collect::<Vec<_>>()
      .join(" ");
    DragRow {
      sentence,
      distractions: self.distractor_words.clone(),
    }
  }

  pub fn into_task(self) -> Task {
    let row = self.row();
    let mut task = Task::new(self.title, TaskContent::Dragging(DraggingTask { rows: vec![row] }));
    task.subtitle = Some(format!("{}\n\nSentence:{}", self.subtitle, self.source_sentence));
    task
  }
}

// ============================================================================
// Prompts
// ============================================================================

fn category_blurb(category: TaskCategory, learner: &LearnerProfile) -> (&'static str, String, String) {
  match category {
    TaskCategory::Vocab => (
      "a vocabulary flashcard task",
      "Vocabulary flashcard tasks, often with spaced repetition, where the learner reviews and \
       rates their knowledge of words or phrases."
        .to_string(),
      "Introduce new vocabulary to the user or reinforce previously learned words.".to_string(),
    ),
    TaskCategory::FillIn => (
      "a fill-in-the-blank language learning task",
      "Fill-in-the-blank exercises where the learner types the missing word(s) or letters into a \
       sentence."
        .to_string(),
      "Useful for vocabulary recall, grammar points, or testing specific knowledge in context. Use \
       when you want the learner to actively recall and produce language. Also very good to test \
       if the user conjugates correctly, understands verb tense, or applies correct endings."
        .to_string(),
    ),
    TaskCategory::DragAndDrop => (
      "a drag-and-drop language learning task",
      "Sentence-based tasks where the learner drags and drops words or phrases into blanks to \
       complete a sentence."
        .to_string(),
      "Great for practicing word order, grammar, and sentence structure. Use when the goal is to \
       reinforce syntax or test understanding of sentence construction."
        .to_string(),
    ),
    TaskCategory::SentenceOrder => (
      "a sentence ordering translation task",
      format!(
        "The learner is given a sentence in {} and words in {} along with some distraction \
         words. The user must reorder the words to form a correct sentence.",
        learner.source_language, learner.target_language
      ),
      "Ideal for translation, sentence structure, word order, and understanding how sentences \
       are formed in the target language."
        .to_string(),
    ),
  }
}

pub fn system_prompt(category: TaskCategory, learner: &LearnerProfile) -> String {
  let (what, description, when_to_use) = category_blurb(category, learner);
  format!(
    "{initial}\n\n\
     You are generating {what} for a student learning {target} \
     (instruction language: {source}, level: {level}).\n\
     Task type: {kind}.\n\
     Description: {description}\n\
     When to use: {when_to_use}\n\
     You will receive a title, a generation instruction, and a purpose for the task, along with \
     a JSON output schema. Focus on generating high-quality, level-appropriate content based on \
     the provided details. Ensure the output strictly follows the given schema.",
    initial = learner.initial_prompt,
    target = learner.target_language,
    source = learner.source_language,
    level = learner.level,
    kind = category.as_str(),
  )
}

pub fn spec_contents(spec: &TaskSpec) -> String {
  format!(
    "Title: {}\n\nGeneration Instruction: {}\n\nPurpose: {}",
    spec.title, spec.generation_instruction, spec.purpose
  )
}

// ============================================================================
// Generator
// ============================================================================

/// Everything task generation needs besides the spec itself.
pub struct TaskGenerator<'a> {
  pub llm: &'a dyn GenerationService,
  pub tts: &'a dyn AudioSynthesizer,
  pub learner: &'a LearnerProfile,
  pub disable_thinking: bool,
  pub today: NaiveDate,
}

impl TaskGenerator<'_> {
  /// Generate one task. Failures are logged and yield `None`.
  pub async fn generate(&self, spec: &TaskSpec, timeout: Duration) -> Option<Task> {
    match self.try_generate(spec, timeout).await {
      Ok(Some(task)) => Some(task),
      Ok(None) => {
        tracing::warn!("No {} task generated for '{}'", spec.category.as_str(), spec.title);
        None
      }
      Err(e) => {
        tracing::error!(
          "Generating {} task '{}' failed: {}",
          spec.category.as_str(),
          spec.title,
          e
        );
        None
      }
    }
  }

  fn request(&self, spec: &TaskSpec) -> GenerationRequest {
    GenerationRequest::new(
      system_prompt(spec.category, self.learner),
      vec![Content::user_text(spec_contents(spec))],
    )
    .with_thinking_disabled(self.disable_thinking)
  }

  /// Model response for `spec`, bounded by `timeout`. Audio is not part of the deadline.
  async fn structured<T: StructuredOutput>(&self, spec: &TaskSpec, timeout: Duration) -> Result<Option<T>> {
    with_timeout(timeout, generate_structured::<T>(self.llm, self.request(spec))).await
  }

  async fn try_generate(&self, spec: &TaskSpec, timeout: Duration) -> Result<Option<Task>> {
    let task = match spec.category {
      TaskCategory::Vocab => {
        let Some(cards) = self.structured::<Vec<NewCard>>(spec, timeout).await? else {
          return Ok(None);
        };
        self.vocab_task(spec, cards).await?
      }
      TaskCategory::FillIn => match self.structured::<FillInDraft>(spec, timeout).await? {
        Some(draft) => draft.into_task(),
        None => return Ok(None),
      },
      TaskCategory::DragAndDrop => match self.structured::<DraggingDraft>(spec, timeout).await? {
        Some(draft) => draft.into_task(),
        None => return Ok(None),
      },
      TaskCategory::SentenceOrder => match self.structured::<SentenceOrder>(spec, timeout).await? {
        Some(order) => order.into_task(),
        None => return Ok(None),
      },
    };

    task.content.validate()?;
    Ok(Some(task))
  }

  async fn vocab_task(&self, spec: &TaskSpec, cards: Vec<NewCard>) -> Result<Task> {
    let mut built = Vec::with_capacity(cards.len());
    for new_card in cards {
      let mut card = new_card.into_card(self.today)?;
      add_card_audio(
        &mut card,
        self.tts,
        &self.learner.target_language_code,
        &self.learner.source_language_code,
      )
      .await;
      built.push(card);
    }
    tracing::debug!("Generated {} vocab card(s) for '{}'", built.len(), spec.title);

    let content = TaskContent::Vocab(VocabTask {
      cards: built,
      b_side_shown: true,
    });
    Ok(Task::new(spec.title.clone(), content))
  }
}
