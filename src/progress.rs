//! Progress tracking and the reward loop.
//!
//! Every practice or quiz event upserts the caller's (user, word) progress
//! row and runs the whole reward pass - counters, XP, level, streak, and
//! achievement unlocks - inside a single transaction.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::db::Database;
use crate::error::ApiError;
use crate::rewards::streaks::{StreakStep, current_day_bucket, step_streak};
use crate::rewards::{XpRewards, achievements, apply_xp};

/// Payload for `PUT /words/{id}/progress`. Absent fields keep their
/// stored values.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PracticeUpdate {
    pub known: Option<bool>,
    pub mastery_level: Option<i64>,
    /// Whether this attempt was correct (bumps correct_attempts).
    pub correct: Option<bool>,
}

/// Payload for `POST /quiz/submit`.
#[derive(Debug, Clone, Deserialize)]
pub struct QuizSubmission {
    pub word_id: i64,
    #[serde(default)]
    pub remembered: bool,
    #[serde(default = "default_quiz_type")]
    pub quiz_type: String,
}

fn default_quiz_type() -> String {
    "basic".to_string()
}

/// What one practice/quiz event earned the player.
#[derive(Debug, Clone, Serialize)]
pub struct RewardOutcome {
    pub xp_gained: i64,
    pub xp: i64,
    pub level: i64,
    pub streak: i64,
    pub new_achievements: Vec<String>,
}

/// Progress and reward service.
#[derive(Clone)]
pub struct ProgressTracker {
    db: Database,
}

impl ProgressTracker {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Record a practice event for a word.
    ///
    /// On the transition into `known`, the user's total-words-learned
    /// counter is recomputed as a count over progress rows (never a blind
    /// increment) and the fixed word XP is awarded.
    pub fn record_practice(
        &self,
        user_id: i64,
        word_id: i64,
        update: &PracticeUpdate,
    ) -> Result<RewardOutcome, ApiError> {
        let mut conn = self.db.conn();
        let tx = conn.transaction()?;

        ensure_word_exists(&tx, word_id)?;

        let prior: Option<(bool, i64)> = tx
            .query_row(
                "SELECT known, mastery_level FROM user_word_progress
                 WHERE user_id = ?1 AND word_id = ?2",
                [user_id, word_id],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;

        let (was_known, was_mastery) = prior.unwrap_or((false, 0));
        let known = update.known.unwrap_or(was_known);
        let mastery_level = update.mastery_level.unwrap_or(was_mastery);
        let correct = i64::from(update.correct.unwrap_or(false));
        let now = Utc::now().timestamp_millis();

        tx.execute(
            r#"INSERT INTO user_word_progress
               (user_id, word_id, known, mastery_level, correct_attempts,
                total_attempts, last_practiced)
               VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6)
               ON CONFLICT(user_id, word_id) DO UPDATE SET
                   known = ?3, mastery_level = ?4,
                   correct_attempts = correct_attempts + ?5,
                   total_attempts = total_attempts + 1,
                   last_practiced = ?6"#,
            rusqlite::params![user_id, word_id, known, mastery_level, correct, now],
        )?;

        let mut xp_gained = 0;
        if known && !was_known {
            tx.execute(
                r#"UPDATE users SET total_words_learned =
                       (SELECT COUNT(*) FROM user_word_progress
                        WHERE user_id = ?1 AND known = 1)
                   WHERE id = ?1"#,
                [user_id],
            )?;
            xp_gained = XpRewards::WORD_LEARNED;
        }

        let outcome = finish_reward_pass(&tx, user_id, xp_gained)?;
        tx.commit()?;
        Ok(outcome)
    }

    /// Log a quiz result and award the corresponding XP.
    pub fn submit_quiz(
        &self,
        user_id: i64,
        submission: &QuizSubmission,
    ) -> Result<RewardOutcome, ApiError> {
        let mut conn = self.db.conn();
        let tx = conn.transaction()?;

        ensure_word_exists(&tx, submission.word_id)?;

        let now = Utc::now().timestamp_millis();
        tx.execute(
            r#"INSERT INTO quiz_results (user_id, word_id, remembered, quiz_type, timestamp)
               VALUES (?1, ?2, ?3, ?4, ?5)"#,
            rusqlite::params![
                user_id,
                submission.word_id,
                submission.remembered,
                submission.quiz_type,
                now
            ],
        )?;

        // Quiz events count as attempts on the word as well.
        let correct = i64::from(submission.remembered);
        tx.execute(
            r#"INSERT INTO user_word_progress
               (user_id, word_id, known, mastery_level, correct_attempts,
                total_attempts, last_practiced)
               VALUES (?1, ?2, 0, 0, ?3, 1, ?4)
               ON CONFLICT(user_id, word_id) DO UPDATE SET
                   correct_attempts = correct_attempts + ?3,
                   total_attempts = total_attempts + 1,
                   last_practiced = ?4"#,
            rusqlite::params![user_id, submission.word_id, correct, now],
        )?;

        tx.execute(
            "UPDATE users SET total_quizzes_taken = total_quizzes_taken + 1 WHERE id = ?1",
            [user_id],
        )?;

        let xp_gained = if submission.remembered {
            XpRewards::QUIZ_REMEMBERED
        } else {
            XpRewards::QUIZ_FORGOT
        };

        let outcome = finish_reward_pass(&tx, user_id, xp_gained)?;
        tx.commit()?;
        Ok(outcome)
    }

    /// Unlocked achievement IDs for a user, oldest first.
    pub fn achievements(&self, user_id: i64) -> Result<Vec<String>, ApiError> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(
            "SELECT achievement_id FROM user_achievements
             WHERE user_id = ?1 ORDER BY unlocked_at ASC",
        )?;
        let rows = stmt.query_map([user_id], |row| row.get(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

fn ensure_word_exists(conn: &Connection, word_id: i64) -> Result<(), ApiError> {
    let found: Option<i64> = conn
        .query_row("SELECT id FROM words WHERE id = ?1", [word_id], |r| r.get(0))
        .optional()?;
    found
        .map(|_| ())
        .ok_or_else(|| ApiError::not_found("Word not found"))
}

/// Shared tail of every reward pass: XP + level write, streak step,
/// achievement checks, and the final counter read.
fn finish_reward_pass(
    conn: &Connection,
    user_id: i64,
    xp_gained: i64,
) -> Result<RewardOutcome, ApiError> {
    let streak = update_streak(conn, user_id)?;

    if xp_gained > 0 {
        apply_xp(conn, user_id, xp_gained)?;
    }

    let new_achievements = unlock_achievements(conn, user_id, streak)?;

    let (xp, level) = conn.query_row(
        "SELECT xp, level FROM users WHERE id = ?1",
        [user_id],
        |r| Ok((r.get(0)?, r.get(1)?)),
    )?;

    Ok(RewardOutcome {
        xp_gained,
        xp,
        level,
        streak,
        new_achievements,
    })
}

/// Advance the user's daily streak for an activity happening now.
fn update_streak(conn: &Connection, user_id: i64) -> Result<i64, ApiError> {
    let (current, last_play_date): (i64, Option<String>) = conn.query_row(
        "SELECT COALESCE(streak, 0), last_play_date FROM users WHERE id = ?1",
        [user_id],
        |r| Ok((r.get(0)?, r.get(1)?)),
    )?;

    match step_streak(last_play_date.as_deref(), current) {
        StreakStep::AlreadyCounted => Ok(current),
        StreakStep::Advance(next) => {
            conn.execute(
                "UPDATE users SET streak = ?1, last_play_date = ?2 WHERE id = ?3",
                rusqlite::params![next, current_day_bucket(), user_id],
            )?;
            Ok(next)
        }
    }
}

/// Run all achievement checks and record any fresh unlocks.
fn unlock_achievements(
    conn: &Connection,
    user_id: i64,
    streak: i64,
) -> Result<Vec<String>, ApiError> {
    let unlocked: Vec<String> = {
        let mut stmt = conn
            .prepare("SELECT achievement_id FROM user_achievements WHERE user_id = ?1")?;
        let rows = stmt.query_map([user_id], |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>()?
    };

    let (words_learned, quizzes_taken): (i64, i64) = conn.query_row(
        "SELECT total_words_learned, total_quizzes_taken FROM users WHERE id = ?1",
        [user_id],
        |r| Ok((r.get(0)?, r.get(1)?)),
    )?;

    let mut newly_unlocked = Vec::new();
    newly_unlocked.extend(achievements::check_word_achievements(words_learned, &unlocked));
    newly_unlocked.extend(achievements::check_quiz_achievements(quizzes_taken, &unlocked));
    newly_unlocked.extend(achievements::check_streak_achievements(streak, &unlocked));

    let now = Utc::now().timestamp_millis();
    let mut names = Vec::with_capacity(newly_unlocked.len());
    for id in newly_unlocked {
        conn.execute(
            r#"INSERT OR IGNORE INTO user_achievements (user_id, achievement_id, unlocked_at)
               VALUES (?1, ?2, ?3)"#,
            rusqlite::params![user_id, id.as_str(), now],
        )?;
        names.push(id.as_str().to_string());
    }

    Ok(names)
}
