//! Pure reductions over a user's practice history: weak-topic detection,
//! running totals, and the due-review set. The history is loaded once per
//! request with a single joined query and shared by all three.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::schema::{attempts, questions};

/// A topic is weak when the user has at least this many attempts in it.
pub const WEAK_TOPIC_MIN_ATTEMPTS: usize = 5;
/// ...and their accuracy in it is below this fraction.
pub const WEAK_TOPIC_ACCURACY: f64 = 0.5;

/// One row of a user's practice history, as loaded by [`load_history`].
#[derive(Debug, Clone, Queryable)]
pub struct HistoryRow {
    pub attempt_id: i32,
    pub question_id: i32,
    pub topic: String,
    pub is_correct: bool,
    pub attempted_at: NaiveDateTime,
    pub next_review_date: Option<NaiveDateTime>,
}

/// Loads every non-deleted attempt of the user, joined with its question's
/// topic. Per-user volumes are in the hundreds, so recomputing per request
/// beats maintaining a cache.
pub fn load_history(
    conn: &mut SqliteConnection,
    user_id: i32,
) -> QueryResult<Vec<HistoryRow>> {
    attempts::table
        .inner_join(questions::table)
        .filter(attempts::user_id.eq(user_id))
        .filter(attempts::deleted_at.is_null())
        .select((
            attempts::id,
            attempts::question_id,
            questions::topic,
            attempts::is_correct,
            attempts::attempted_at,
            attempts::next_review_date,
        ))
        .load(conn)
}

/// Topics where accuracy < 50% over at least 5 attempts, weakest first.
pub fn weak_topics(history: &[HistoryRow]) -> Vec<String> {
    let mut per_topic: HashMap<&str, (usize, usize)> = HashMap::new();
    for row in history {
        let entry = per_topic.entry(row.topic.as_str()).or_default();
        entry.0 += 1;
        if row.is_correct {
            entry.1 += 1;
        }
    }

    let mut weak: Vec<(f64, &str)> = per_topic
        .into_iter()
        .filter(|(_, (total, _))| *total >= WEAK_TOPIC_MIN_ATTEMPTS)
        .map(|(topic, (total, correct))| (correct as f64 / total as f64, topic))
        .filter(|(accuracy, _)| *accuracy < WEAK_TOPIC_ACCURACY)
        .collect();
    weak.sort_by(|a, b| {
        a.0.partial_cmp(&b.0)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.1.cmp(b.1))
    });
    weak.into_iter().map(|(_, topic)| topic.to_string()).collect()
}

/// Attempt count and overall accuracy; an empty history reads as 0.0.
pub fn totals(history: &[HistoryRow]) -> (usize, f64) {
    let total = history.len();
    if total == 0 {
        return (0, 0.0);
    }
    let correct = history.iter().filter(|row| row.is_correct).count();
    (total, correct as f64 / total as f64)
}

/// Questions due for review, most overdue first. Only the latest attempt
/// per question counts: a newer schedule supersedes an older overdue one.
/// Same-instant attempts from different devices tie-break on insert id,
/// so the last committed row wins.
pub fn due_question_ids(history: &[HistoryRow], now: NaiveDateTime) -> Vec<i32> {
    let mut latest: HashMap<i32, &HistoryRow> = HashMap::new();
    for row in history {
        latest
            .entry(row.question_id)
            .and_modify(|current| {
                if (row.attempted_at, row.attempt_id)
                    > (current.attempted_at, current.attempt_id)
                {
                    *current = row;
                }
            })
            .or_insert(row);
    }

    let mut due: Vec<(NaiveDateTime, i32)> = latest
        .values()
        .filter_map(|row| {
            row.next_review_date
                .filter(|date| *date <= now)
                .map(|date| (date, row.question_id))
        })
        .collect();
    due.sort();
    due.into_iter().map(|(_, question_id)| question_id).collect()
}
