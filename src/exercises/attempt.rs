//! One learner attempt at a task: `Unfilled → Submitted → Evaluated → Finished`.

use chrono::NaiveDate;
use rand::seq::SliceRandom;
use rand::Rng;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db;
use crate::domain::{DraggingTask, Task, TaskContent};
use crate::error::{Error, Result};
use crate::srs::{ReviewSession, ReviewSummary};
use crate::validation::{all_filled, evaluate_dragging, evaluate_fill_in, DragOutcome, FillInOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptState {
  Unfilled,
  Submitted,
  Evaluated,
  Finished,
}

/// What the learner hands in
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Answers {
  /// Fill-in blanks or drag slots, one list per sentence/row
  Blanks(Vec<Vec<String>>),
  /// One 0-5 rating per vocab card
  Ratings(Vec<u8>),
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Evaluation {
  FillIn(FillInOutcome),
  Dragging(DragOutcome),
  Vocab(ReviewSummary),
}

impl Evaluation {
  pub fn summary(&self) -> String {
    match self {
      Self::FillIn(outcome) => outcome.summary.clone(),
      Self::Dragging(outcome) => outcome.summary.clone(),
      Self::Vocab(summary) => summary.description(),
    }
  }
}

/// A draggable option. Ids are stable per task, labels are what gets compared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DragOption {
  pub id: String,
  pub label: String,
}

/// All targets and distractors of every row, in row order.
pub fn option_pool(task: &DraggingTask) -> Vec<DragOption> {
  let mut options = Vec::new();
  for (i, row) in task.rows.iter().enumerate() {
    for (j, label) in row.positives().into_iter().enumerate() {
      options.push(DragOption {
        id: format!("row_{}_pos_{}", i, j),
        label,
      });
    }
    for (j, label) in row.distractions.iter().enumerate() {
      options.push(DragOption {
        id: format!("row_{}_neg_{}", i, j),
        label: label.clone(),
      });
    }
  }
  options
}

pub fn shuffled_option_pool<R: Rng + ?Sized>(task: &DraggingTask, rng: &mut R) -> Vec<DragOption> {
  let mut options = option_pool(task);
  options.shuffle(rng);
  options
}

#[derive(Debug, Clone)]
pub struct ExerciseAttempt {
  task_id: i64,
  state: AttemptState,
  answers: Option<Answers>,
  evaluation: Option<Evaluation>,
  /// Current round of a vocab task; later rounds only hold repeated mistakes
  review: Option<ReviewSession>,
}

impl ExerciseAttempt {
  pub fn new(task: &Task) -> Self {
    let review = match &task.content {
      TaskContent::Vocab(vocab) => Some(ReviewSession::new(vocab.cards.clone(), vocab.b_side_shown)),
      _ => None,
    };
    let state = if task.finished {
      AttemptState::Finished
    } else {
      AttemptState::Unfilled
    };
    Self {
      task_id: task.id,
      state,
      answers: None,
      evaluation: None,
      review,
    }
  }

  pub fn task_id(&self) -> i64 {
    self.task_id
  }

  pub fn state(&self) -> AttemptState {
    self.state
  }

  pub fn evaluation(&self) -> Option<&Evaluation> {
    self.evaluation.as_ref()
  }

  pub fn review(&self) -> Option<&ReviewSession> {
    self.review.as_ref()
  }

  fn expect_state(&self, expected: AttemptState) -> Result<()> {
    if self.state != expected {
      return Err(Error::InvalidInput(format!(
        "task {} is {:?}, expected {:?}",
        self.task_id, self.state, expected
      )));
    }
    Ok(())
  }

  /// Accept answers when every unit is filled. Returns false (and stays unfilled) otherwise.
  pub fn submit(&mut self, task: &Task, answers: Answers) -> Result<bool> {
    self.expect_state(AttemptState::Unfilled)?;

    let complete = match (&task.content, &answers) {
      (TaskContent::Vocab(_), Answers::Ratings(ratings)) => {
        let expected = self.review.as_ref().map_or(0, ReviewSession::len);
        expected > 0 && ratings.len() == expected
      }
      (TaskContent::FillIn(_) | TaskContent::Dragging(_), Answers::Blanks(blanks)) => {
        all_filled(blanks, &task.content.unit_counts()?)
      }
      _ => {
        return Err(Error::InvalidInput(format!(
          "answers do not fit a {} task",
          task.kind().as_str()
        )));
      }
    };

    if !complete {
      return Ok(false);
    }
    self.answers = Some(answers);
    self.state = AttemptState::Submitted;
    Ok(true)
  }

  /// Check the submitted answers and append the result to the task.
  ///
  /// Vocab ratings go through the scheduler and are committed as one batch.
  pub fn evaluate(&mut self, task: &mut Task, conn: &mut Connection, today: NaiveDate) -> Result<&Evaluation> {
    self.expect_state(AttemptState::Submitted)?;
    let answers = self
      .answers
      .take()
      .ok_or_else(|| Error::InvalidInput("nothing submitted".to_string()))?;

    // A rejected evaluation sends the attempt back for new answers
    let evaluation = match self.check(&task.content, answers, conn, today) {
      Ok(evaluation) => evaluation,
      Err(e) => {
        self.state = AttemptState::Unfilled;
        return Err(e);
      }
    };

    task.push_result(&evaluation.summary());
    db::update_result_description(conn, task.id, task.result_description.as_deref())?;
    tracing::info!("Evaluated task {} ({})", task.id, task.kind().as_str());

    self.state = AttemptState::Evaluated;
    Ok(self.evaluation.insert(evaluation))
  }

  fn check(
    &mut self,
    content: &TaskContent,
    answers: Answers,
    conn: &mut Connection,
    today: NaiveDate,
  ) -> Result<Evaluation> {
    match (content, answers) {
      (TaskContent::FillIn(fill_in), Answers::Blanks(blanks)) => {
        Ok(Evaluation::FillIn(evaluate_fill_in(fill_in, &blanks)?))
      }
      (TaskContent::Dragging(dragging), Answers::Blanks(blanks)) => {
        Ok(Evaluation::Dragging(evaluate_dragging(dragging, &blanks)?))
      }
      (TaskContent::Vocab(_), Answers::Ratings(ratings)) => {
        let session = self
          .review
          .as_mut()
          .ok_or_else(|| Error::InvalidInput("vocab task without review round".to_string()))?;
        // Rate a copy so a bad rating leaves the round untouched
        let mut round = session.clone();
        for rating in ratings {
          round.rate(rating)?;
        }
        let summary = round.commit(conn, today)?;
        *session = round;
        Ok(Evaluation::Vocab(summary))
      }
      _ => Err(Error::InvalidInput("answers do not fit the task".to_string())),
    }
  }

  /// Start a practice round with the cards rated as failed. False when there are none.
  pub fn repeat_mistakes(&mut self) -> Result<bool> {
    self.expect_state(AttemptState::Evaluated)?;
    let Some(next) = self.review.as_ref().and_then(ReviewSession::repeat_mistakes) else {
      return Ok(false);
    };
    self.review = Some(next);
    self.evaluation = None;
    self.state = AttemptState::Unfilled;
    Ok(true)
  }

  /// Mark the task finished, persisting the result description with it.
  pub fn finish(&mut self, task: &mut Task, conn: &Connection) -> Result<()> {
    self.expect_state(AttemptState::Evaluated)?;
    if db::finish_task(conn, task.id, task.result_description.as_deref())? {
      tracing::info!("Finished task {}", task.id);
    }
    task.finished = true;
    self.state = AttemptState::Finished;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{CardCategory, DragRow, FillInTask, VocabTask};
  use crate::testing::{sample_card, test_today, TestEnv};
  use chrono::Duration;
  use rand::rngs::StdRng;
  use rand::SeedableRng;

  fn strings(rows: &[&[&str]]) -> Vec<Vec<String>> {
    rows.iter().map(|r| r.iter().map(|s| s.to_string()).collect()).collect()
  }

  fn fill_in_task() -> Task {
    Task::new(
      "Verbos".to_string(),
      TaskContent::FillIn(FillInTask {
        sentences: vec!["Yo {como} pan.".to_string(), "Ella {está} {aquí}.".to_string()],
        accepted_levenshtein_distance: 1,
      }),
    )
  }

  fn drag_task() -> DraggingTask {
    DraggingTask {
      rows: vec![
        DragRow {
          sentence: "Yo $tengo$ un $perro$.".to_string(),
          distractions: vec!["gato".to_string()],
        },
        DragRow {
          sentence: "$Hola$ amigo".to_string(),
          distractions: vec!["Adiós".to_string(), "Buenas".to_string()],
        },
      ],
    }
  }

  /// Plan with one stored task, returned as loaded from the database
  fn stored(env: &TestEnv, task: Task) -> Task {
    env.with_conn(|conn| {
      let plan_id = db::save_exercise_plan(conn, "Plan", "Goal", test_today(), &[task]).unwrap();
      db::get_tasks_for_plan(conn, plan_id).unwrap().remove(0)
    })
  }

  #[test]
  fn test_option_pool_contains_targets_and_distractors() {
    let pool = option_pool(&drag_task());
    let labels: Vec<&str> = pool.iter().map(|o| o.label.as_str()).collect();
    assert_eq!(labels, vec!["tengo", "perro", "gato", "Hola", "Adiós", "Buenas"]);
    assert_eq!(pool[0].id, "row_0_pos_0");
    assert_eq!(pool[4].id, "row_1_neg_0");
  }

  #[test]
  fn test_shuffled_pool_is_permutation() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut shuffled: Vec<String> = shuffled_option_pool(&drag_task(), &mut rng)
      .into_iter()
      .map(|o| o.id)
      .collect();
    let mut ordered: Vec<String> = option_pool(&drag_task()).into_iter().map(|o| o.id).collect();
    shuffled.sort();
    ordered.sort();
    assert_eq!(shuffled, ordered);
  }

  #[test]
  fn test_submit_refused_until_all_filled() {
    let task = fill_in_task();
    let mut attempt = ExerciseAttempt::new(&task);

    let partial = Answers::Blanks(strings(&[&["como"], &["está", " "]]));
    assert!(!attempt.submit(&task, partial).unwrap());
    assert_eq!(attempt.state(), AttemptState::Unfilled);

    let short = Answers::Blanks(strings(&[&["como"]]));
    assert!(!attempt.submit(&task, short).unwrap());

    let full = Answers::Blanks(strings(&[&["como"], &["esta", "aqui"]]));
    assert!(attempt.submit(&task, full).unwrap());
    assert_eq!(attempt.state(), AttemptState::Submitted);
  }

  #[test]
  fn test_submit_wrong_answer_kind() {
    let task = fill_in_task();
    let mut attempt = ExerciseAttempt::new(&task);
    assert!(matches!(
      attempt.submit(&task, Answers::Ratings(vec![5])),
      Err(Error::InvalidInput(_))
    ));
  }

  #[test]
  fn test_fill_in_lifecycle_persists_result() {
    let env = TestEnv::new().unwrap();
    let mut task = stored(&env, fill_in_task());
    let mut attempt = ExerciseAttempt::new(&task);

    assert!(attempt
      .submit(&task, Answers::Blanks(strings(&[&["comó"], &["esta", "alli"]])))
      .unwrap());
    let summary = env.with_conn(|conn| {
      attempt
        .evaluate(&mut task, conn, test_today())
        .unwrap()
        .summary()
    });
    assert!(summary.starts_with("You answered 2 out of 3 fields correctly."));
    assert_eq!(attempt.state(), AttemptState::Evaluated);

    env.with_conn(|conn| attempt.finish(&mut task, conn).unwrap());
    assert_eq!(attempt.state(), AttemptState::Finished);
    assert!(task.finished);

    let reloaded = env.with_conn(|conn| db::get_task(conn, task.id).unwrap().unwrap());
    assert!(reloaded.finished);
    assert_eq!(reloaded.result_description.as_deref(), Some(summary.as_str()));
  }

  #[test]
  fn test_finish_requires_evaluation() {
    let env = TestEnv::new().unwrap();
    let mut task = stored(&env, fill_in_task());
    let mut attempt = ExerciseAttempt::new(&task);
    let result = env.with_conn(|conn| attempt.finish(&mut task, conn));
    assert!(matches!(result, Err(Error::InvalidInput(_))));
    assert!(!task.finished);
  }

  #[test]
  fn test_dragging_evaluation_exact_match() {
    let env = TestEnv::new().unwrap();
    let drag = Task::new("Orden".to_string(), TaskContent::Dragging(drag_task()));
    let mut task = stored(&env, drag);
    let mut attempt = ExerciseAttempt::new(&task);

    assert!(attempt
      .submit(&task, Answers::Blanks(strings(&[&["tengo", "gato"], &["hola"]])))
      .unwrap());
    let evaluation = env.with_conn(|conn| attempt.evaluate(&mut task, conn, test_today()).unwrap().clone());
    let Evaluation::Dragging(outcome) = evaluation else {
      panic!("expected drag outcome");
    };
    assert_eq!(outcome.total_slots, 3);
    assert_eq!(outcome.mismatches.len(), 2);
  }

  #[test]
  fn test_vocab_ratings_commit_schedule_and_repeat() {
    let env = TestEnv::new().unwrap();
    let today = test_today();
    let cards = vec![
      sample_card("gato", "Katze", CardCategory::Noun, 2.5, today),
      sample_card("perro", "Hund", CardCategory::Noun, 2.5, today),
    ];
    let vocab = Task::new(
      "Tiere".to_string(),
      TaskContent::Vocab(VocabTask {
        cards,
        b_side_shown: true,
      }),
    );
    let mut task = stored(&env, vocab);
    let mut attempt = ExerciseAttempt::new(&task);

    assert!(!attempt.submit(&task, Answers::Ratings(vec![4])).unwrap());
    assert!(attempt.submit(&task, Answers::Ratings(vec![4, 0])).unwrap());
    env.with_conn(|conn| attempt.evaluate(&mut task, conn, today).unwrap());

    let TaskContent::Vocab(vocab) = &task.content else {
      panic!("expected vocab");
    };
    let (gato, perro) = env.with_conn(|conn| {
      (
        db::get_card_by_id(conn, vocab.cards[0].id).unwrap().unwrap(),
        db::get_card_by_id(conn, vocab.cards[1].id).unwrap().unwrap(),
      )
    });
    assert_eq!(gato.scheduling.next_date, today + Duration::days(1));
    assert_eq!(gato.scheduling.repetitions, 1);
    assert_eq!(perro.scheduling.repetitions, 0);
    assert!((perro.scheduling.ease_factor - 1.7).abs() < 1e-9);

    // Practice round holds only the failed card and leaves the schedule alone
    assert!(attempt.repeat_mistakes().unwrap());
    assert_eq!(attempt.review().map(ReviewSession::len), Some(1));
    assert!(attempt.submit(&task, Answers::Ratings(vec![5])).unwrap());
    env.with_conn(|conn| attempt.evaluate(&mut task, conn, today).unwrap());
    let perro_after = env.with_conn(|conn| db::get_card_by_id(conn, perro.id).unwrap().unwrap());
    assert_eq!(perro_after.scheduling.repetitions, 0);

    let description = task.result_description.clone().unwrap();
    assert!(description.contains("New Round of Failures Practice:"));
    assert!(!attempt.repeat_mistakes().unwrap());
  }

  #[test]
  fn test_vocab_invalid_rating_keeps_round() {
    let env = TestEnv::new().unwrap();
    let today = test_today();
    let vocab = Task::new(
      "Tiere".to_string(),
      TaskContent::Vocab(VocabTask {
        cards: vec![sample_card("gato", "Katze", CardCategory::Noun, 2.5, today)],
        b_side_shown: false,
      }),
    );
    let mut task = stored(&env, vocab);
    let mut attempt = ExerciseAttempt::new(&task);

    assert!(attempt.submit(&task, Answers::Ratings(vec![9])).unwrap());
    let result = env.with_conn(|conn| attempt.evaluate(&mut task, conn, today).map(|_| ()));
    assert!(matches!(result, Err(Error::InvalidInput(_))));
    assert_eq!(attempt.review().map(ReviewSession::position), Some(0));
    assert_eq!(attempt.state(), AttemptState::Unfilled);
    assert!(task.result_description.is_none());

    assert!(attempt.submit(&task, Answers::Ratings(vec![3])).unwrap());
    env.with_conn(|conn| attempt.evaluate(&mut task, conn, today).unwrap());
    assert_eq!(attempt.state(), AttemptState::Evaluated);
  }
}
