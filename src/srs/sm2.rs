use chrono::{Duration, NaiveDate};

use crate::domain::Card;
use crate::error::{Error, Result};

pub const MIN_EASE_FACTOR: f64 = 1.3;

/// Lowest rating that counts as a successful recall
pub const PASS_THRESHOLD: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sm2Result {
  pub ease_factor: f64,
  pub interval_days: i64,
  pub repetitions: i64,
}

pub fn calculate_sm2(
  quality: u8,
  current_ease_factor: f64,
  current_interval: i64,
  current_repetitions: i64,
) -> Result<Sm2Result> {
  if quality > 5 {
    return Err(Error::InvalidInput(format!(
      "quality must be between 0 and 5, got {}",
      quality
    )));
  }
  let q = quality as f64;

  let (new_interval, new_repetitions) = if quality < PASS_THRESHOLD {
    // Failed review: reset
    (1, 0)
  } else {
    let repetitions = current_repetitions + 1;
    // Growth uses the ease factor from before this review
    let interval = match repetitions {
      1 => 1,
      2 => 6,
      _ => ((current_interval as f64) * current_ease_factor).round() as i64,
    };
    (interval.max(1), repetitions)
  };

  // EF' = EF + (0.1 - (5 - q) * (0.08 + (5 - q) * 0.02))
  let ease_delta = 0.1 - (5.0 - q) * (0.08 + (5.0 - q) * 0.02);
  let new_ease_factor = (current_ease_factor + ease_delta).max(MIN_EASE_FACTOR);

  Ok(Sm2Result {
    ease_factor: new_ease_factor,
    interval_days: new_interval,
    repetitions: new_repetitions,
  })
}

/// Apply one review to the card's scheduling state.
///
/// An invalid rating leaves the card untouched.
pub fn update(card: &mut Card, quality: u8, today: NaiveDate) -> Result<()> {
  let s = &mut card.scheduling;
  let result = calculate_sm2(quality, s.ease_factor, s.interval_days, s.repetitions)?;

  s.ease_factor = result.ease_factor;
  s.interval_days = result.interval_days;
  s.repetitions = result.repetitions;
  s.quality = quality;
  s.next_date = today + Duration::days(result.interval_days);
  Ok(())
}
