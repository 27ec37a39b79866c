//! Read-only aggregate queries for the admin dashboard.
//!
//! Everything here is side-effect-free; empty result sets are valid
//! outcomes, and zero-attempt denominators report a 0% rate rather than
//! erroring.

use chrono::Utc;
use rusqlite::Connection;
use serde::Serialize;

use crate::db::Database;
use crate::error::ApiError;
use crate::rewards::streaks::day_bucket;

const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Serialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DifficultyCount {
    pub difficulty: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Overview {
    pub total_words: i64,
    pub total_users: i64,
    pub total_progress_records: i64,
    pub recent_words_added: i64,
    pub known_words_count: i64,
    pub unknown_words_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OverviewReport {
    pub overview: Overview,
    pub words_by_category: Vec<CategoryCount>,
    pub words_by_difficulty: Vec<DifficultyCount>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttemptedWord {
    pub id: i64,
    pub word: String,
    pub total_attempts: i64,
    pub user_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WordSuccessRate {
    pub id: i64,
    pub word: String,
    pub success_rate: f64,
    pub total_attempts: i64,
    pub known_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WordReport {
    pub most_attempted_words: Vec<AttemptedWord>,
    pub highest_success_rate: Vec<WordSuccessRate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserStatistics {
    pub id: i64,
    pub username: String,
    pub words_attempted: i64,
    pub words_known: i64,
    pub total_attempts: i64,
    pub success_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserReport {
    pub user_statistics: Vec<UserStatistics>,
    pub recent_users_count: i64,
    pub total_users: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DayCount {
    pub date: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityReport {
    pub daily_words_created: Vec<DayCount>,
    pub daily_user_registrations: Vec<DayCount>,
}

/// Analytics query service.
#[derive(Clone)]
pub struct Analytics {
    db: Database,
}

impl Analytics {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Dashboard overview: totals plus category/difficulty breakdowns.
    pub fn overview(&self) -> Result<OverviewReport, ApiError> {
        let conn = self.db.conn();

        let total_words: i64 = conn.query_row("SELECT COUNT(*) FROM words", [], |r| r.get(0))?;
        let total_users: i64 =
            conn.query_row("SELECT COUNT(*) FROM users WHERE is_admin = 0", [], |r| r.get(0))?;
        let total_progress_records: i64 =
            conn.query_row("SELECT COUNT(*) FROM user_word_progress", [], |r| r.get(0))?;

        let recent_words_added: i64 = conn.query_row(
            "SELECT COUNT(*) FROM words WHERE day_bucket >= ?1",
            [cutoff_day(7)],
            |r| r.get(0),
        )?;

        let known_words_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM user_word_progress WHERE known = 1",
            [],
            |r| r.get(0),
        )?;
        let unknown_words_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM user_word_progress WHERE known = 0",
            [],
            |r| r.get(0),
        )?;

        let words_by_category = group_counts(&conn, "category")?
            .into_iter()
            .map(|(category, count)| CategoryCount { category, count })
            .collect();
        let words_by_difficulty = group_counts(&conn, "difficulty")?
            .into_iter()
            .map(|(difficulty, count)| DifficultyCount { difficulty, count })
            .collect();

        Ok(OverviewReport {
            overview: Overview {
                total_words,
                total_users,
                total_progress_records,
                recent_words_added,
                known_words_count,
                unknown_words_count,
            },
            words_by_category,
            words_by_difficulty,
        })
    }

    /// Per-word rankings: most attempted and highest success rate.
    pub fn words(&self) -> Result<WordReport, ApiError> {
        let conn = self.db.conn();

        let most_attempted_words = {
            let mut stmt = conn.prepare(
                r#"SELECT w.id, w.word,
                          COALESCE(SUM(p.total_attempts), 0) AS attempts,
                          COUNT(p.id) AS user_count
                   FROM words w
                   JOIN user_word_progress p ON p.word_id = w.id
                   GROUP BY w.id
                   ORDER BY attempts DESC
                   LIMIT 10"#,
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(AttemptedWord {
                    id: row.get(0)?,
                    word: row.get(1)?,
                    total_attempts: row.get(2)?,
                    user_count: row.get(3)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        // LEFT JOIN keeps zero-attempt words in the result with a 0% rate
        // instead of dividing by zero or dropping them.
        let mut highest_success_rate = {
            let mut stmt = conn.prepare(
                r#"SELECT w.id, w.word,
                          COUNT(p.id) AS attempted,
                          COALESCE(SUM(p.known), 0) AS known_count
                   FROM words w
                   LEFT JOIN user_word_progress p ON p.word_id = w.id
                   GROUP BY w.id"#,
            )?;
            let rows = stmt.query_map([], |row| {
                let attempted: i64 = row.get(2)?;
                let known_count: i64 = row.get(3)?;
                Ok(WordSuccessRate {
                    id: row.get(0)?,
                    word: row.get(1)?,
                    success_rate: percentage(known_count, attempted),
                    total_attempts: attempted,
                    known_count,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()?
        };
        highest_success_rate
            .sort_by(|a, b| b.success_rate.partial_cmp(&a.success_rate).unwrap_or(std::cmp::Ordering::Equal));
        highest_success_rate.truncate(10);

        Ok(WordReport {
            most_attempted_words,
            highest_success_rate,
        })
    }

    /// Per-user progress statistics.
    pub fn users(&self) -> Result<UserReport, ApiError> {
        let conn = self.db.conn();

        let mut user_statistics = {
            let mut stmt = conn.prepare(
                r#"SELECT u.id, u.username,
                          COUNT(p.id) AS attempted,
                          COALESCE(SUM(p.known), 0) AS known,
                          COALESCE(SUM(p.total_attempts), 0) AS attempts
                   FROM users u
                   LEFT JOIN user_word_progress p ON p.user_id = u.id
                   WHERE u.is_admin = 0
                   GROUP BY u.id"#,
            )?;
            let rows = stmt.query_map([], |row| {
                let attempted: i64 = row.get(2)?;
                let known: i64 = row.get(3)?;
                Ok(UserStatistics {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    words_attempted: attempted,
                    words_known: known,
                    total_attempts: row.get(4)?,
                    success_rate: percentage(known, attempted),
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()?
        };
        user_statistics
            .sort_by(|a, b| b.success_rate.partial_cmp(&a.success_rate).unwrap_or(std::cmp::Ordering::Equal));

        let recent_users_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM users WHERE is_admin = 0 AND day_bucket >= ?1",
            [cutoff_day(30)],
            |r| r.get(0),
        )?;

        let total_users = user_statistics.len() as i64;
        Ok(UserReport {
            user_statistics,
            recent_users_count,
            total_users,
        })
    }

    /// Daily creation counts over the trailing 30 days, ascending by day.
    pub fn activity(&self) -> Result<ActivityReport, ApiError> {
        let conn = self.db.conn();
        let cutoff = cutoff_day(30);

        let daily_words_created = day_counts(
            &conn,
            "SELECT day_bucket, COUNT(*) FROM words WHERE day_bucket >= ?1
             GROUP BY day_bucket ORDER BY day_bucket ASC",
            &cutoff,
        )?;
        let daily_user_registrations = day_counts(
            &conn,
            "SELECT day_bucket, COUNT(*) FROM users WHERE is_admin = 0 AND day_bucket >= ?1
             GROUP BY day_bucket ORDER BY day_bucket ASC",
            &cutoff,
        )?;

        Ok(ActivityReport {
            daily_words_created,
            daily_user_registrations,
        })
    }
}

/// Day bucket marking the start of a trailing window.
fn cutoff_day(days: i64) -> String {
    day_bucket(Utc::now().timestamp_millis() - days * MS_PER_DAY)
}

/// known/attempted as a percentage, 0 when nothing was attempted.
fn percentage(known: i64, attempted: i64) -> f64 {
    if attempted == 0 {
        return 0.0;
    }
    let rate = known as f64 / attempted as f64 * 100.0;
    (rate * 100.0).round() / 100.0
}

fn group_counts(conn: &Connection, column: &str) -> Result<Vec<(String, i64)>, ApiError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {column}, COUNT(*) FROM words GROUP BY {column}"
    ))?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

fn day_counts(conn: &Connection, sql: &str, cutoff: &str) -> Result<Vec<DayCount>, ApiError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([cutoff], |row| {
        Ok(DayCount {
            date: row.get(0)?,
            count: row.get(1)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthService;
    use crate::config::AuthSettings;
    use crate::progress::{PracticeUpdate, ProgressTracker};
    use crate::words::{Difficulty, NewWord, WordCatalog};
    use tempfile::tempdir;

    fn new_word(text: &str, category: &str, difficulty: Difficulty) -> NewWord {
        NewWord {
            word: text.to_string(),
            image: String::new(),
            pronunciation: String::new(),
            definition: String::new(),
            example: String::new(),
            fun_fact: String::new(),
            description: String::new(),
            category: category.to_string(),
            difficulty,
            language: "english".to_string(),
        }
    }

    #[test]
    fn test_percentage_zero_denominator() {
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(1, 2), 50.0);
        assert_eq!(percentage(1, 3), 33.33);
    }

    #[test]
    fn test_empty_database_reports_are_valid() {
        let dir = tempdir().unwrap();
        let db = Database::open(&dir.path().join("test.db")).unwrap();
        let analytics = Analytics::new(db);

        let overview = analytics.overview().unwrap();
        assert_eq!(overview.overview.total_words, 0);
        assert!(overview.words_by_category.is_empty());

        assert!(analytics.words().unwrap().most_attempted_words.is_empty());
        assert!(analytics.users().unwrap().user_statistics.is_empty());
        assert!(analytics.activity().unwrap().daily_words_created.is_empty());
    }

    #[test]
    fn test_zero_attempt_word_rates_zero() {
        let dir = tempdir().unwrap();
        let db = Database::open(&dir.path().join("test.db")).unwrap();
        let catalog = WordCatalog::new(db.clone());
        catalog.create(&new_word("apple", "food", Difficulty::Easy)).unwrap();

        let report = Analytics::new(db).words().unwrap();
        assert_eq!(report.highest_success_rate.len(), 1);
        assert_eq!(report.highest_success_rate[0].success_rate, 0.0);
        assert!(report.most_attempted_words.is_empty());
    }

    #[test]
    fn test_overview_and_rankings() {
        let dir = tempdir().unwrap();
        let db = Database::open(&dir.path().join("test.db")).unwrap();

        let catalog = WordCatalog::new(db.clone());
        let apple = catalog.create(&new_word("apple", "food", Difficulty::Easy)).unwrap();
        let cat = catalog.create(&new_word("cat", "animals", Difficulty::Medium)).unwrap();

        let auth = AuthService::new(
            db.clone(),
            AuthSettings {
                bcrypt_cost: 4,
                ..AuthSettings::default()
            },
        );
        let amy = auth.register("amy", None, None).unwrap().user.id;

        let tracker = ProgressTracker::new(db.clone());
        let update = PracticeUpdate {
            known: Some(true),
            ..PracticeUpdate::default()
        };
        tracker.record_practice(amy, apple.id, &update).unwrap();
        tracker.record_practice(amy, apple.id, &update).unwrap();
        tracker
            .record_practice(amy, cat.id, &PracticeUpdate::default())
            .unwrap();

        let analytics = Analytics::new(db);

        let overview = analytics.overview().unwrap();
        assert_eq!(overview.overview.total_words, 2);
        assert_eq!(overview.overview.total_users, 1);
        assert_eq!(overview.overview.total_progress_records, 2);
        assert_eq!(overview.overview.known_words_count, 1);
        assert_eq!(overview.words_by_category.len(), 2);

        let words = analytics.words().unwrap();
        assert_eq!(words.most_attempted_words[0].word, "apple");
        assert_eq!(words.most_attempted_words[0].total_attempts, 2);
        // apple: known by its one attempter; cat: not known.
        assert_eq!(words.highest_success_rate[0].word, "apple");
        assert_eq!(words.highest_success_rate[0].success_rate, 100.0);

        let users = analytics.users().unwrap();
        assert_eq!(users.total_users, 1);
        assert_eq!(users.user_statistics[0].words_attempted, 2);
        assert_eq!(users.user_statistics[0].success_rate, 50.0);

        let activity = analytics.activity().unwrap();
        assert_eq!(activity.daily_words_created.len(), 1);
        assert_eq!(activity.daily_words_created[0].count, 2);
        assert_eq!(activity.daily_user_registrations[0].count, 1);
    }
}
