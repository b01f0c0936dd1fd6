//! Answer checking for exercise tasks.
//!
//! Fill-in blanks are compared leniently: case, surrounding whitespace and
//! accents are ignored, and a per-task edit distance is tolerated.
//! Drag-and-drop slots require the exact label.

use serde::{Deserialize, Serialize};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::domain::{DraggingTask, FillInTask};
use crate::error::{Error, Result};

// ============================================================================
// Result types
// ============================================================================

/// Verdict for a single fill-in blank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlankVerdict {
  /// Identical after normalization
  Perfect,
  /// Within the accepted edit distance
  Acceptable,
  Wrong,
}

impl BlankVerdict {
  pub fn is_correct(&self) -> bool {
    !matches!(self, Self::Wrong)
  }
}

/// An expected answer next to what the learner gave
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mismatch {
  pub expected: String,
  pub actual: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FillInOutcome {
  /// One verdict per blank, grouped by sentence
  pub verdicts: Vec<Vec<BlankVerdict>>,
  pub errors: Vec<Mismatch>,
  pub total_fields: usize,
  pub summary: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DragOutcome {
  pub mismatches: Vec<Mismatch>,
  pub total_slots: usize,
  pub summary: String,
}

// ============================================================================
// Normalization
// ============================================================================

/// Normalize an answer for comparison
/// - Converts to lowercase
/// - Trims and collapses whitespace
/// - Strips accents (canonical decomposition, combining marks dropped)
pub fn normalize_answer(input: &str) -> String {
  input
    .to_lowercase()
    .nfd()
    .filter(|c| !is_combining_mark(*c))
    .collect::<String>()
    .split_whitespace()
    .collect::<Vec<_>>()
    .join(" ")
}

/// Calculate simple Levenshtein distance between two strings
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
  let a_chars: Vec<char> = a.chars().collect();
  let b_chars: Vec<char> = b.chars().collect();
  let a_len = a_chars.len();
  let b_len = b_chars.len();

  if a_len == 0 {
    return b_len;
  }
  if b_len == 0 {
    return a_len;
  }

  // Two rolling rows are enough
  let mut prev: Vec<usize> = (0..=b_len).collect();
  let mut curr = vec![0usize; b_len + 1];

  for i in 1..=a_len {
    curr[0] = i;
    for j in 1..=b_len {
      let cost = if a_chars[i - 1] == b_chars[j - 1] { 0 } else { 1 };
      curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
    }
    std::mem::swap(&mut prev, &mut curr);
  }

  prev[b_len]
}

/// Judge one blank against its expected solution
pub fn judge_blank(user_input: &str, expected: &str, tolerance: u32) -> BlankVerdict {
  let user = normalize_answer(user_input);
  if user.is_empty() {
    return BlankVerdict::Wrong;
  }
  let expected = normalize_answer(expected);

  if user == expected {
    BlankVerdict::Perfect
  } else if levenshtein_distance(&user, &expected) <= tolerance as usize {
    BlankVerdict::Acceptable
  } else {
    BlankVerdict::Wrong
  }
}

// ============================================================================
// Task evaluation
// ============================================================================

/// True when every answerable unit has a non-blank answer.
pub fn all_filled(answers: &[Vec<String>], unit_counts: &[usize]) -> bool {
  answers.len() == unit_counts.len()
    && answers
      .iter()
      .zip(unit_counts)
      .all(|(row, &n)| row.len() == n && row.iter().all(|a| !a.trim().is_empty()))
}

fn check_shape(answers: &[Vec<String>], expected: &[Vec<String>]) -> Result<()> {
  if answers.len() != expected.len() {
    return Err(Error::InvalidInput(format!(
      "expected answers for {} rows, got {}",
      expected.len(),
      answers.len()
    )));
  }
  for (i, (row, solutions)) in answers.iter().zip(expected).enumerate() {
    if row.len() != solutions.len() {
      return Err(Error::InvalidInput(format!(
        "row {}: expected {} answers, got {}",
        i,
        solutions.len(),
        row.len()
      )));
    }
  }
  Ok(())
}

fn incorrect_answers_markdown(errors: &[Mismatch]) -> String {
  errors
    .iter()
    .map(|m| format!("- **Expected:** `{}`   **Your answer:** `{}`", m.expected, m.actual))
    .collect::<Vec<_>>()
    .join("\n")
}

pub fn evaluate_fill_in(task: &FillInTask, answers: &[Vec<String>]) -> Result<FillInOutcome> {
  let solutions = task.all_solutions()?;
  check_shape(answers, &solutions)?;

  let mut verdicts = Vec::with_capacity(solutions.len());
  let mut errors = Vec::new();

  for (row, expected_row) in answers.iter().zip(&solutions) {
    let row_verdicts: Vec<BlankVerdict> = row
      .iter()
      .zip(expected_row)
      .map(|(user, expected)| {
        let verdict = judge_blank(user, expected, task.accepted_levenshtein_distance);
        if !verdict.is_correct() {
          errors.push(Mismatch {
            expected: expected.clone(),
            actual: user.clone(),
          });
        }
        verdict
      })
      .collect();
    verdicts.push(row_verdicts);
  }

  let total_fields: usize = solutions.iter().map(Vec::len).sum();
  let summary = if errors.is_empty() {
    format!("Excellent! You answered all {} fields correctly.", total_fields)
  } else {
    format!(
      "You answered {} out of {} fields correctly.\n\n### Incorrect Answers:\n{}\n",
      total_fields - errors.len(),
      total_fields,
      incorrect_answers_markdown(&errors)
    )
  };

  Ok(FillInOutcome {
    verdicts,
    errors,
    total_fields,
    summary,
  })
}

pub fn evaluate_dragging(task: &DraggingTask, answers: &[Vec<String>]) -> Result<DragOutcome> {
  let expected: Vec<Vec<String>> = task.rows.iter().map(|r| r.positives()).collect();
  check_shape(answers, &expected)?;

  let mismatches: Vec<Mismatch> = answers
    .iter()
    .zip(&expected)
    .flat_map(|(row, positives)| row.iter().zip(positives))
    .filter(|(actual, expected)| actual != expected)
    .map(|(actual, expected)| Mismatch {
      expected: expected.clone(),
      actual: actual.clone(),
    })
    .collect();

  let total_slots: usize = expected.iter().map(Vec::len).sum();
  let summary = if mismatches.is_empty() {
    "All answers are correct!".to_string()
  } else {
    format!(
      "You placed {} out of {} words correctly.\n\n### Incorrect Answers:\n{}\n",
      total_slots - mismatches.len(),
      total_slots,
      incorrect_answers_markdown(&mismatches)
    )
  };

  Ok(DragOutcome {
    mismatches,
    total_slots,
    summary,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::DragRow;

  fn answers(rows: &[&[&str]]) -> Vec<Vec<String>> {
    rows
      .iter()
      .map(|r| r.iter().map(|s| s.to_string()).collect())
      .collect()
  }

  #[test]
  fn test_levenshtein() {
    assert_eq!(levenshtein_distance("cat", "cat"), 0);
    assert_eq!(levenshtein_distance("cat", "bat"), 1);
    assert_eq!(levenshtein_distance("cat", "cars"), 2);
    assert_eq!(levenshtein_distance("", "abc"), 3);
    assert_eq!(levenshtein_distance("niño", "nino"), 1);
  }

  #[test]
  fn test_normalize_strips_accents_and_case() {
    assert_eq!(normalize_answer("  Está  "), "esta");
    assert_eq!(normalize_answer("CANCIÓN"), "cancion");
    assert_eq!(normalize_answer("pingüino"), "pinguino");
    assert_eq!(normalize_answer("el   niño"), "el nino");
  }

  #[test]
  fn test_judge_blank() {
    assert_eq!(judge_blank("París", "paris", 0), BlankVerdict::Perfect);
    assert_eq!(judge_blank("Pariss", "París", 1), BlankVerdict::Acceptable);
    assert_eq!(judge_blank("Pariss", "París", 0), BlankVerdict::Wrong);
    assert_eq!(judge_blank("   ", "a", 5), BlankVerdict::Wrong);
  }

  #[test]
  fn test_all_filled() {
    let counts = vec![2, 1];
    assert!(all_filled(&answers(&[&["a", "b"], &["c"]]), &counts));
    assert!(!all_filled(&answers(&[&["a", " "], &["c"]]), &counts));
    assert!(!all_filled(&answers(&[&["a", "b"]]), &counts));
    assert!(!all_filled(&answers(&[&["a"], &["c"]]), &counts));
  }

  #[test]
  fn test_evaluate_fill_in_all_correct() {
    let task = FillInTask {
      sentences: vec![
        "Ella {está} cansada.".to_string(),
        "Nosotros {somos} de {Berlín}.".to_string(),
      ],
      accepted_levenshtein_distance: 1,
    };
    let outcome = evaluate_fill_in(&task, &answers(&[&["esta"], &["Somos", "berlin"]])).unwrap();
    assert!(outcome.errors.is_empty());
    assert_eq!(outcome.total_fields, 3);
    assert_eq!(outcome.summary, "Excellent! You answered all 3 fields correctly.");
    assert_eq!(outcome.verdicts[1], vec![BlankVerdict::Perfect, BlankVerdict::Perfect]);
  }

  #[test]
  fn test_evaluate_fill_in_with_errors() {
    let task = FillInTask {
      sentences: vec!["Yo {tengo} {hambre}.".to_string()],
      accepted_levenshtein_distance: 1,
    };
    let outcome = evaluate_fill_in(&task, &answers(&[&["tenga", "sed"]])).unwrap();
    assert_eq!(outcome.verdicts[0], vec![BlankVerdict::Acceptable, BlankVerdict::Wrong]);
    assert_eq!(
      outcome.errors,
      vec![Mismatch {
        expected: "hambre".to_string(),
        actual: "sed".to_string()
      }]
    );
    assert!(outcome.summary.starts_with("You answered 1 out of 2 fields correctly."));
    assert!(outcome.summary.contains("**Expected:** `hambre`"));
  }

  #[test]
  fn test_evaluate_fill_in_shape_mismatch() {
    let task = FillInTask {
      sentences: vec!["{a} {b}".to_string()],
      accepted_levenshtein_distance: 0,
    };
    assert!(matches!(
      evaluate_fill_in(&task, &answers(&[&["a"]])),
      Err(Error::InvalidInput(_))
    ));
  }

  #[test]
  fn test_evaluate_dragging_exact_only() {
    let task = DraggingTask {
      rows: vec![
        DragRow {
          sentence: "Ella $baila$ y $canta$".to_string(),
          distractions: vec!["bailas".to_string()],
        },
        DragRow {
          sentence: "Yo $soy$ alto".to_string(),
          distractions: vec!["estoy".to_string()],
        },
      ],
    };

    let ok = evaluate_dragging(&task, &answers(&[&["baila", "canta"], &["soy"]])).unwrap();
    assert!(ok.mismatches.is_empty());
    assert_eq!(ok.total_slots, 3);
    assert_eq!(ok.summary, "All answers are correct!");

    // Close is not good enough for drag slots
    let bad = evaluate_dragging(&task, &answers(&[&["bailas", "canta"], &["Soy"]])).unwrap();
    assert_eq!(
      bad.mismatches,
      vec![
        Mismatch {
          expected: "baila".to_string(),
          actual: "bailas".to_string()
        },
        Mismatch {
          expected: "soy".to_string(),
          actual: "Soy".to_string()
        },
      ]
    );
    assert!(bad.summary.starts_with("You placed 1 out of 3 words correctly."));

    // Options are compared as placed, whitespace included
    let padded = evaluate_dragging(&task, &answers(&[&["baila ", "canta"], &["soy"]])).unwrap();
    assert_eq!(padded.mismatches.len(), 1);
    assert_eq!(padded.mismatches[0].actual, "baila ");
  }
}
