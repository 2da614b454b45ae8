//! SM-2 spaced-repetition scheduling. Pure: no I/O, no shared state.

use chrono::{Duration, NaiveDateTime};

pub const MIN_EASE: f64 = 1.3;
pub const INITIAL_EASE: f64 = 2.5;

/// Schedule state carried between attempts for one (user, question).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SrsState {
    pub interval: i32,
    pub ease: f64,
    pub reps: i32,
}

impl Default for SrsState {
    fn default() -> Self {
        SrsState {
            interval: 0,
            ease: INITIAL_EASE,
            reps: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scheduled {
    pub interval: i32,
    pub ease: f64,
    pub reps: i32,
    pub next_review_date: NaiveDateTime,
}

/// Maps observed behavior to an SM-2 quality rating: incorrect answers are
/// 2 ("forgot, but recognized"), correct answers 4. A planned refinement
/// splits correct answers into 3/4/5 by response time.
pub fn quality_from_result(is_correct: bool) -> i32 {
    if is_correct { 4 } else { 2 }
}

/// One SM-2 step. The ease adjustment applies on every answer, including
/// failures; quality < 3 resets repetitions and makes the question due
/// immediately.
pub fn schedule(quality: i32, prior: SrsState, now: NaiveDateTime) -> Scheduled {
    let q = quality.clamp(0, 5);
    let shortfall = (5 - q) as f64;
    let ease = (prior.ease + (0.1 - shortfall * (0.08 + shortfall * 0.02))).max(MIN_EASE);

    let (reps, interval) = if q < 3 {
        (0, 0)
    } else {
        let reps = prior.reps + 1;
        let interval = match reps {
            1 => 1,
            2 => 6,
            _ => (prior.interval as f64 * ease).round() as i32,
        };
        (reps, interval)
    };

    Scheduled {
        interval,
        ease,
        reps,
        next_review_date: now + Duration::days(interval as i64),
    }
}
