//! Idempotent batch ingestion of client-recorded attempts.
//!
//! Every element carries the idempotency key (user, question, device,
//! attempted_at); replaying a batch is always safe. Failures are counted
//! per element and never abort the rest of the batch.

use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Deserialize;
use thiserror::Error;

use crate::model::NewAttempt;
use crate::schema::{attempts, questions};
use crate::srs::{self, SrsState};
use crate::utils;

/// One client-recorded answer inside a push batch.
#[derive(Debug, Clone, Deserialize)]
pub struct AttemptPayload {
    pub question_id: i32,
    pub selected_option: i32,
    pub is_correct: bool,
    pub attempted_at: String,
    #[serde(default)]
    pub time_taken_ms: Option<i32>,
    #[serde(default)]
    pub confidence_level: Option<i32>,
    #[serde(default)]
    pub network_type: Option<String>,
    #[serde(default)]
    pub app_version: Option<String>,
}

/// Per-element failures; counted into `failed`, never a batch abort.
#[derive(Error, Debug)]
pub enum AttemptError {
    #[error("unparseable attempted_at {0:?}")]
    InvalidTimestamp(String),
    #[error("confidence_level {0} out of range 1-5")]
    InvalidConfidence(i32),
    #[error("negative time_taken_ms {0}")]
    InvalidTimeTaken(i32),
    #[error("unknown question {0}")]
    UnknownQuestion(i32),
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
}

#[derive(Debug, Default, PartialEq)]
pub struct PushOutcome {
    pub synced: usize,
    pub skipped: usize,
    pub failed: usize,
}

enum ElementOutcome {
    Inserted,
    Skipped,
}

/// Processes a batch in increasing `attempted_at` order so scheduling
/// chained through the batch is deterministic regardless of how the client
/// buffered its log.
pub fn ingest_batch(
    conn: &mut SqliteConnection,
    user_id: i32,
    device_id: &str,
    batch: &[AttemptPayload],
    now: NaiveDateTime,
) -> PushOutcome {
    let mut outcome = PushOutcome::default();

    let mut ordered: Vec<(NaiveDateTime, &AttemptPayload)> = Vec::with_capacity(batch.len());
    for payload in batch {
        match utils::parse_client_timestamp(&payload.attempted_at) {
            Some(attempted_at) => ordered.push((attempted_at, payload)),
            None => {
                log::warn!(
                    "Rejecting attempt for question {}: {}",
                    payload.question_id,
                    AttemptError::InvalidTimestamp(payload.attempted_at.clone())
                );
                outcome.failed += 1;
            }
        }
    }
    ordered.sort_by_key(|(attempted_at, _)| *attempted_at);

    for (attempted_at, payload) in ordered {
        // An immediate transaction serializes the seed-read/insert pair
        // through SQLite's writer lock, making "last commit wins" the
        // deterministic outcome of racing devices.
        let result = conn.immediate_transaction(|conn| {
            ingest_one(conn, user_id, device_id, payload, attempted_at, now)
        });
        match result {
            Ok(ElementOutcome::Inserted) => outcome.synced += 1,
            Ok(ElementOutcome::Skipped) => outcome.skipped += 1,
            Err(e) => {
                log::warn!(
                    "Rejecting attempt for question {}: {}",
                    payload.question_id,
                    e
                );
                outcome.failed += 1;
            }
        }
    }

    outcome
}

fn ingest_one(
    conn: &mut SqliteConnection,
    user_id: i32,
    device_id: &str,
    payload: &AttemptPayload,
    attempted_at: NaiveDateTime,
    now: NaiveDateTime,
) -> Result<ElementOutcome, AttemptError> {
    if let Some(level) = payload.confidence_level {
        if !(1..=5).contains(&level) {
            return Err(AttemptError::InvalidConfidence(level));
        }
    }
    if let Some(ms) = payload.time_taken_ms {
        if ms < 0 {
            return Err(AttemptError::InvalidTimeTaken(ms));
        }
    }

    // Soft-deleted questions stay resolvable: attempts against retired
    // content are still worth recording.
    let question_known: i64 = questions::table
        .filter(questions::id.eq(payload.question_id))
        .count()
        .get_result(conn)?;
    if question_known == 0 {
        return Err(AttemptError::UnknownQuestion(payload.question_id));
    }

    let already_synced: i64 = attempts::table
        .filter(attempts::user_id.eq(user_id))
        .filter(attempts::question_id.eq(payload.question_id))
        .filter(attempts::device_id.eq(device_id))
        .filter(attempts::attempted_at.eq(attempted_at))
        .count()
        .get_result(conn)?;
    if already_synced > 0 {
        return Ok(ElementOutcome::Skipped);
    }

    let prior = latest_schedule(conn, user_id, payload.question_id)?;
    let scheduled = srs::schedule(srs::quality_from_result(payload.is_correct), prior, now);

    let row = NewAttempt {
        user_id,
        question_id: payload.question_id,
        is_correct: payload.is_correct,
        selected_option: payload.selected_option,
        attempted_at,
        device_id,
        synced_at: now,
        srs_interval: scheduled.interval,
        srs_ease_factor: scheduled.ease,
        srs_repetitions: scheduled.reps,
        next_review_date: Some(scheduled.next_review_date),
        time_taken_ms: payload.time_taken_ms,
        confidence_level: payload.confidence_level,
        network_type: payload.network_type.as_deref(),
        app_version: payload.app_version.as_deref(),
    };

    // A concurrent writer may land the same key between the check above and
    // this insert; the unique index turns that into a skip.
    let inserted = diesel::insert_into(attempts::table)
        .values(&row)
        .on_conflict((
            attempts::user_id,
            attempts::question_id,
            attempts::device_id,
            attempts::attempted_at,
        ))
        .do_nothing()
        .execute(conn)?;

    Ok(if inserted == 0 {
        ElementOutcome::Skipped
    } else {
        ElementOutcome::Inserted
    })
}

/// Seed for the next SM-2 step: the most recent attempt for this (user,
/// question) across all devices, ties broken by insert id so the last
/// committed row wins. Defaults for a first attempt.
fn latest_schedule(
    conn: &mut SqliteConnection,
    user_id: i32,
    question_id: i32,
) -> Result<SrsState, diesel::result::Error> {
    let prior = attempts::table
        .filter(attempts::user_id.eq(user_id))
        .filter(attempts::question_id.eq(question_id))
        .filter(attempts::deleted_at.is_null())
        .order((attempts::attempted_at.desc(), attempts::id.desc()))
        .select((
            attempts::srs_interval,
            attempts::srs_ease_factor,
            attempts::srs_repetitions,
        ))
        .first::<(i32, f64, i32)>(conn)
        .optional()?;

    Ok(match prior {
        Some((interval, ease, reps)) => SrsState { interval, ease, reps },
        None => SrsState::default(),
    })
}
