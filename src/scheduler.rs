//! SM-2 spaced repetition for generated flashcards.
//!
//! Learner ratings map onto SM-2 quality values:
//! - again: 0
//! - hard: 3
//! - good: 4
//! - easy: 5

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const INITIAL_EASE_FACTOR: f64 = 2.5;
pub const MIN_EASE_FACTOR: f64 = 1.3;

/// Upper bound on a review interval. Keeps next-review dates inside four-digit years.
pub const MAX_INTERVAL_DAYS: f64 = 36_500.0;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewChoice {
    Again,
    Hard,
    Good,
    Easy,
}

impl ReviewChoice {
    pub fn quality(self) -> u8 {
        match self {
            ReviewChoice::Again => 0,
            ReviewChoice::Hard => 3,
            ReviewChoice::Good => 4,
            ReviewChoice::Easy => 5,
        }
    }

    /// Map a 1-4 button index onto a choice.
    pub fn from_int(value: i32) -> Option<Self> {
        match value {
            1 => Some(ReviewChoice::Again),
            2 => Some(ReviewChoice::Hard),
            3 => Some(ReviewChoice::Good),
            4 => Some(ReviewChoice::Easy),
            _ => None,
        }
    }
}

impl FromStr for ReviewChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "again" => Ok(ReviewChoice::Again),
            "hard" => Ok(ReviewChoice::Hard),
            "good" => Ok(ReviewChoice::Good),
            "easy" => Ok(ReviewChoice::Easy),
            other => Err(format!("unknown review choice: {}", other)),
        }
    }
}

/// The four fields of a flashcard the scheduler is allowed to change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SchedulingState {
    pub repetition_number: u32,
    pub interval: f64,
    pub ease_factor: f64,
    pub next_review_date: DateTime<Utc>,
}

impl SchedulingState {
    /// State of a freshly created card: due immediately.
    pub fn initial(now: DateTime<Utc>) -> Self {
        Self {
            repetition_number: 0,
            interval: 0.0,
            ease_factor: INITIAL_EASE_FACTOR,
            next_review_date: now,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Sm2Scheduler;

impl Sm2Scheduler {
    pub fn new() -> Self {
        Self
    }

    /// Advance `state` by one review. Pure and total.
    pub fn schedule(
        &self,
        state: &SchedulingState,
        choice: ReviewChoice,
        now: DateTime<Utc>,
    ) -> SchedulingState {
        let quality = f64::from(choice.quality());

        let (repetition_number, interval) = if quality < 3.0 {
            (0, 1.0)
        } else {
            let interval = match state.repetition_number {
                0 => 1.0,
                1 => 6.0,
                // Uses the ease factor from before this review.
                _ => (state.interval * state.ease_factor).round(),
            };
            (state.repetition_number + 1, interval.min(MAX_INTERVAL_DAYS))
        };

        let penalty = 5.0 - quality;
        let ease_factor =
            (state.ease_factor + (0.1 - penalty * (0.08 + penalty * 0.02))).max(MIN_EASE_FACTOR);

        let delay = Duration::milliseconds((interval * MILLIS_PER_DAY).round() as i64);
        let next_review_date = now.checked_add_signed(delay).unwrap_or(now);

        SchedulingState {
            repetition_number,
            interval,
            ease_factor,
            next_review_date,
        }
    }
}
