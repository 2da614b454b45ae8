use chrono::NaiveDateTime;
use diesel::{Insertable, Queryable, Selectable};
use serde::Serialize;

use crate::schema::{attempts, questions, submissions};

#[derive(Queryable, Selectable, Serialize, Debug, Clone)]
#[diesel(table_name = attempts)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Attempt {
    pub id: i32,
    pub user_id: i32,
    pub question_id: i32,
    pub is_correct: bool,
    pub selected_option: i32,
    pub attempted_at: NaiveDateTime,
    pub device_id: String,
    pub synced_at: NaiveDateTime,
    pub srs_interval: i32,
    pub srs_ease_factor: f64,
    pub srs_repetitions: i32,
    pub next_review_date: Option<NaiveDateTime>,
    pub time_taken_ms: Option<i32>,
    pub confidence_level: Option<i32>,
    pub network_type: Option<String>,
    pub app_version: Option<String>,
    pub deleted_at: Option<NaiveDateTime>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = attempts)]
pub struct NewAttempt<'a> {
    pub user_id: i32,
    pub question_id: i32,
    pub is_correct: bool,
    pub selected_option: i32,
    pub attempted_at: NaiveDateTime,
    pub device_id: &'a str,
    pub synced_at: NaiveDateTime,
    pub srs_interval: i32,
    pub srs_ease_factor: f64,
    pub srs_repetitions: i32,
    pub next_review_date: Option<NaiveDateTime>,
    pub time_taken_ms: Option<i32>,
    pub confidence_level: Option<i32>,
    pub network_type: Option<&'a str>,
    pub app_version: Option<&'a str>,
}

/// Owned by the external content store; read-only here. `options` holds a
/// JSON array of answer strings.
#[derive(Queryable, Selectable, Serialize, Debug, Clone)]
#[diesel(table_name = questions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Question {
    pub id: i32,
    pub subject: String,
    pub topic: String,
    pub content: String,
    pub options: String,
    pub correct_index: i32,
    pub difficulty: String,
    pub updated_at: NaiveDateTime,
    pub deleted_at: Option<NaiveDateTime>,
}

/// Owned by the external grading store; read-only here.
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = submissions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Submission {
    pub id: i32,
    pub user_id: i32,
    pub assignment_id: i32,
    pub grade: f64,
    pub feedback: Option<String>,
    pub graded_at: NaiveDateTime,
}
