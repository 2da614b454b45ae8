//! Budget-partitioned content selection for pull responses.
//!
//! Delta mode sends only what changed since the client's cursor. Bootstrap
//! mode splits the budget across due reviews, weak-topic remediation, and
//! fresh material.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use diesel::dsl::sql;
use diesel::prelude::*;
use diesel::sql_types::Integer;
use diesel::sqlite::Sqlite;

use crate::model::{Question, Submission};
use crate::schema::{questions, submissions};

/// Applied when the client omits `limit`; the hard ceiling of 500 is
/// enforced at the request envelope.
pub const DEFAULT_PULL_LIMIT: i64 = 200;
/// Bootstrap pulls report grades from this far back; delta pulls use the cursor.
pub const BOOTSTRAP_GRADE_WINDOW_DAYS: i64 = 7;

/// Share of the budget reserved for due reviews, computed before the other
/// tiers so rounding never starves it.
const DUE_SHARE: f64 = 0.4;

fn available(subjects: &[String]) -> questions::BoxedQuery<'_, Sqlite> {
    let mut query = questions::table
        .filter(questions::deleted_at.is_null())
        .into_boxed();
    if !subjects.is_empty() {
        query = query.filter(questions::subject.eq_any(subjects.iter().map(String::as_str)));
    }
    query
}

/// Non-deleted questions changed after the cursor, freshest first, so a
/// truncated response still converges over repeated calls. Review priority
/// deliberately does not apply here: changed content must reach the client
/// regardless of its schedule.
pub fn select_delta(
    conn: &mut SqliteConnection,
    cursor: NaiveDateTime,
    subjects: &[String],
    limit: i64,
) -> QueryResult<Vec<Question>> {
    available(subjects)
        .filter(questions::updated_at.gt(cursor))
        .order(questions::updated_at.desc())
        .limit(limit)
        .select(Question::as_select())
        .load(conn)
}

/// First-sync selection: due reviews up to 40% of the budget, then weak-topic
/// remediation up to half of what remains, then random fresh material. A
/// tier's shortfall rolls forward, so the total approaches `limit` whenever
/// enough content exists anywhere.
pub fn select_bootstrap(
    conn: &mut SqliteConnection,
    subjects: &[String],
    limit: i64,
    due_ids: &[i32],
    weak_topics: &[String],
) -> QueryResult<Vec<Question>> {
    let mut chosen: Vec<Question> = Vec::new();

    let due_quota = (limit as f64 * DUE_SHARE).floor() as usize;
    if due_quota > 0 && !due_ids.is_empty() {
        let mut due: Vec<Question> = available(subjects)
            .filter(questions::id.eq_any(due_ids.iter().copied()))
            .select(Question::as_select())
            .load(conn)?;
        // due_ids arrives most overdue first; restore that order post-query.
        let rank: HashMap<i32, usize> = due_ids
            .iter()
            .enumerate()
            .map(|(position, id)| (*id, position))
            .collect();
        due.sort_by_key(|q| rank.get(&q.id).copied().unwrap_or(usize::MAX));
        due.truncate(due_quota);
        chosen.extend(due);
    }

    let remaining = limit - chosen.len() as i64;
    let weak_quota = remaining / 2;
    if weak_quota > 0 && !weak_topics.is_empty() {
        let chosen_ids: Vec<i32> = chosen.iter().map(|q| q.id).collect();
        let remediation = available(subjects)
            .filter(questions::topic.eq_any(weak_topics.iter().map(String::as_str)))
            .filter(questions::id.ne_all(chosen_ids))
            .order(sql::<Integer>("RANDOM()"))
            .limit(weak_quota)
            .select(Question::as_select())
            .load(conn)?;
        chosen.extend(remediation);
    }

    let remaining = limit - chosen.len() as i64;
    if remaining > 0 {
        let chosen_ids: Vec<i32> = chosen.iter().map(|q| q.id).collect();
        let fresh = available(subjects)
            .filter(questions::id.ne_all(chosen_ids))
            .order(sql::<Integer>("RANDOM()"))
            .limit(remaining)
            .select(Question::as_select())
            .load(conn)?;
        chosen.extend(fresh);
    }

    Ok(chosen)
}

/// Submissions graded after `since`, newest first. Independent of question
/// selection: "your work was graded" reaches the client even when nothing
/// is due.
pub fn graded_since(
    conn: &mut SqliteConnection,
    user_id: i32,
    since: NaiveDateTime,
) -> QueryResult<Vec<Submission>> {
    submissions::table
        .filter(submissions::user_id.eq(user_id))
        .filter(submissions::graded_at.gt(since))
        .order(submissions::graded_at.desc())
        .select(Submission::as_select())
        .load(conn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use diesel::sqlite::SqliteConnection;

    fn setup_test_db() -> SqliteConnection {
        let mut conn = SqliteConnection::establish(":memory:")
            .expect("Failed to create in-memory database");

        diesel::sql_query(
            r#"
            CREATE TABLE questions (
                id INTEGER PRIMARY KEY NOT NULL,
                subject TEXT NOT NULL,
                topic TEXT NOT NULL,
                content TEXT NOT NULL,
                options TEXT NOT NULL,
                correct_index INTEGER NOT NULL,
                difficulty TEXT NOT NULL,
                updated_at TIMESTAMP NOT NULL,
                deleted_at TIMESTAMP
            )
            "#,
        )
        .execute(&mut conn)
        .expect("Failed to create questions table");

        diesel::sql_query(
            r#"
            CREATE TABLE submissions (
                id INTEGER PRIMARY KEY NOT NULL,
                user_id INTEGER NOT NULL,
                assignment_id INTEGER NOT NULL,
                grade DOUBLE NOT NULL,
                feedback TEXT,
                graded_at TIMESTAMP NOT NULL
            )
            "#,
        )
        .execute(&mut conn)
        .expect("Failed to create submissions table");

        conn
    }

    fn test_now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn insert_question(
        conn: &mut SqliteConnection,
        id: i32,
        subject: &str,
        topic: &str,
        updated_days_ago: i64,
        deleted: bool,
    ) {
        diesel::insert_into(questions::table)
            .values((
                questions::id.eq(id),
                questions::subject.eq(subject),
                questions::topic.eq(topic),
                questions::content.eq(format!("Question {id}")),
                questions::options.eq(r#"["a","b","c","d"]"#),
                questions::correct_index.eq(0),
                questions::difficulty.eq("medium"),
                questions::updated_at.eq(test_now() - Duration::days(updated_days_ago)),
                questions::deleted_at.eq(deleted.then(test_now)),
            ))
            .execute(conn)
            .expect("Failed to insert question");
    }

    #[test]
    fn delta_returns_exactly_the_changed_window() {
        let mut conn = setup_test_db();
        insert_question(&mut conn, 1, "math", "algebra", 10, false);
        insert_question(&mut conn, 2, "math", "algebra", 2, false);
        insert_question(&mut conn, 3, "math", "algebra", 1, false);
        insert_question(&mut conn, 4, "math", "algebra", 1, true);

        let cursor = test_now() - Duration::days(5);
        let changed = select_delta(&mut conn, cursor, &[], 200).unwrap();
        let ids: Vec<i32> = changed.iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![3, 2]);
    }

    #[test]
    fn delta_truncation_keeps_the_freshest_changes() {
        let mut conn = setup_test_db();
        for id in 1..=6 {
            insert_question(&mut conn, id, "math", "algebra", id as i64, false);
        }
        let cursor = test_now() - Duration::days(30);
        let changed = select_delta(&mut conn, cursor, &[], 3).unwrap();
        let ids: Vec<i32> = changed.iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn delta_respects_subject_filter() {
        let mut conn = setup_test_db();
        insert_question(&mut conn, 1, "math", "algebra", 1, false);
        insert_question(&mut conn, 2, "history", "rome", 1, false);

        let cursor = test_now() - Duration::days(5);
        let subjects = vec!["history".to_string()];
        let changed = select_delta(&mut conn, cursor, &subjects, 200).unwrap();
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].id, 2);
    }

    #[test]
    fn bootstrap_partitions_the_budget_across_tiers() {
        let mut conn = setup_test_db();
        // 5 due candidates, a weak topic with plenty of content, 20 others.
        for id in 1..=5 {
            insert_question(&mut conn, id, "math", "algebra", 1, false);
        }
        for id in 6..=15 {
            insert_question(&mut conn, id, "math", "fractions", 1, false);
        }
        for id in 16..=35 {
            insert_question(&mut conn, id, "math", "geometry", 1, false);
        }

        let due_ids = vec![1, 2, 3, 4, 5];
        let weak = vec!["fractions".to_string()];
        let chosen = select_bootstrap(&mut conn, &[], 10, &due_ids, &weak).unwrap();

        assert_eq!(chosen.len(), 10);
        let due_chosen = chosen.iter().filter(|q| due_ids.contains(&q.id)).count();
        assert_eq!(due_chosen, 4); // floor(0.4 * 10)
        // First tier comes first, most overdue first.
        let head: Vec<i32> = chosen[..4].iter().map(|q| q.id).collect();
        assert_eq!(head, vec![1, 2, 3, 4]);
        // Tier 2 draws at least its quota from the weak topic (tier 3 may
        // add more of it at random).
        let weak_chosen = chosen
            .iter()
            .filter(|q| q.topic == "fractions")
            .count();
        assert!(weak_chosen >= 3); // floor((10 - 4) / 2)
    }

    #[test]
    fn bootstrap_never_returns_duplicates() {
        let mut conn = setup_test_db();
        for id in 1..=8 {
            insert_question(&mut conn, id, "math", "fractions", 1, false);
        }
        let due_ids = vec![1, 2];
        let weak = vec!["fractions".to_string()];
        let chosen = select_bootstrap(&mut conn, &[], 20, &due_ids, &weak).unwrap();

        let mut ids: Vec<i32> = chosen.iter().map(|q| q.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), chosen.len());
        assert_eq!(chosen.len(), 8);
    }

    #[test]
    fn tier_shortfall_rolls_forward_into_fresh_material() {
        let mut conn = setup_test_db();
        // No due reviews, no weak topics; everything must come from tier 3.
        for id in 1..=20 {
            insert_question(&mut conn, id, "math", "geometry", 1, false);
        }
        let chosen = select_bootstrap(&mut conn, &[], 10, &[], &[]).unwrap();
        assert_eq!(chosen.len(), 10);
    }

    #[test]
    fn bootstrap_excludes_soft_deleted_questions() {
        let mut conn = setup_test_db();
        insert_question(&mut conn, 1, "math", "algebra", 1, true);
        insert_question(&mut conn, 2, "math", "algebra", 1, false);

        let chosen = select_bootstrap(&mut conn, &[], 10, &[1], &[]).unwrap();
        let ids: Vec<i32> = chosen.iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![2]);
    }

    #[test]
    fn grades_after_the_watermark_only() {
        let mut conn = setup_test_db();
        for (id, days_ago) in [(1, 10), (2, 3), (3, 1)] {
            diesel::insert_into(submissions::table)
                .values((
                    submissions::id.eq(id),
                    submissions::user_id.eq(7),
                    submissions::assignment_id.eq(100 + id),
                    submissions::grade.eq(0.9),
                    submissions::feedback.eq(Some("solid work")),
                    submissions::graded_at.eq(test_now() - Duration::days(days_ago)),
                ))
                .execute(&mut conn)
                .expect("Failed to insert submission");
        }

        let since = test_now() - Duration::days(BOOTSTRAP_GRADE_WINDOW_DAYS);
        let grades = graded_since(&mut conn, 7, since).unwrap();
        let ids: Vec<i32> = grades.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![3, 2]);

        assert!(graded_since(&mut conn, 8, since).unwrap().is_empty());
    }
}
