//! SQLite database connection and schema management.
//!
//! Manages the application database (default `~/.wordquest/wordquest.db`)
//! with automatic schema creation and versioned migrations.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::config::Config;
use crate::rewards::streaks::current_day_bucket;

/// Database wrapper shared by every service.
///
/// A single connection behind a mutex serializes all access, which also
/// serializes the multi-statement counter/level updates that would
/// otherwise race across concurrent requests for the same user.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create the database at the default location.
    pub fn open_default() -> Result<Self> {
        let db_path = Config::global_data_dir().join("wordquest.db");
        Self::open(&db_path)
    }

    /// Open or create the database at a specific path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data dir: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Get a reference to the connection (for queries and transactions).
    pub fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("Database lock poisoned")
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute_batch(SCHEMA_SQL)?;
        drop(conn);
        self.run_migrations()?;
        Ok(())
    }

    /// Run any pending migrations.
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn();

        let version: i32 = conn
            .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))
            .unwrap_or(0);

        // Migration 2: streak columns on users (databases created before the
        // streak system shipped lack them; fresh schemas already have both).
        if version < 2 {
            let has_streak: bool = conn
                .prepare("SELECT COUNT(*) FROM pragma_table_info('users') WHERE name = 'streak'")
                .and_then(|mut s| s.query_row([], |r| r.get::<_, i32>(0)))
                .map(|c| c > 0)
                .unwrap_or(false);

            if !has_streak {
                conn.execute_batch(
                    r#"
                    ALTER TABLE users ADD COLUMN streak INTEGER DEFAULT 0;
                    ALTER TABLE users ADD COLUMN last_play_date TEXT;
                    "#,
                )?;
            }

            conn.execute("INSERT OR REPLACE INTO schema_version VALUES (2)", [])?;
        }

        Ok(())
    }

    /// Seed the word catalog on first run. Returns the number of rows added.
    pub fn seed_sample_words(&self) -> Result<usize> {
        let mut conn = self.conn();

        let existing: i64 = conn.query_row("SELECT COUNT(*) FROM words", [], |r| r.get(0))?;
        if existing > 0 {
            return Ok(0);
        }

        let now = chrono::Utc::now().timestamp_millis();
        let day = current_day_bucket();

        let tx = conn.transaction()?;
        for (word, image, pronunciation, definition, example, fun_fact, difficulty, category) in
            SAMPLE_WORDS
        {
            tx.execute(
                r#"INSERT OR IGNORE INTO words
                   (word, image, pronunciation, definition, example, fun_fact,
                    description, category, difficulty, language,
                    created_at, updated_at, day_bucket)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, '', ?7, ?8, 'english', ?9, ?9, ?10)"#,
                rusqlite::params![
                    word, image, pronunciation, definition, example, fun_fact, category,
                    difficulty, now, day,
                ],
            )?;
        }
        tx.commit()?;

        Ok(SAMPLE_WORDS.len())
    }
}

/// SQL schema for the application database.
const SCHEMA_SQL: &str = r#"
-- User accounts (players and admins share the table, split by is_admin)
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    email TEXT DEFAULT '',
    password_hash TEXT NOT NULL,
    is_admin INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    last_login INTEGER,
    day_bucket TEXT NOT NULL,
    xp INTEGER NOT NULL DEFAULT 0,
    level INTEGER NOT NULL DEFAULT 1,
    streak INTEGER DEFAULT 0,
    last_play_date TEXT,
    total_words_learned INTEGER NOT NULL DEFAULT 0,
    total_quizzes_taken INTEGER NOT NULL DEFAULT 0,
    perfect_scores INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_users_day ON users(day_bucket);

-- Word catalog. Text is lowercased on write; uniqueness is on the
-- normalized text.
CREATE TABLE IF NOT EXISTS words (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    word TEXT NOT NULL UNIQUE,
    image TEXT DEFAULT '',
    pronunciation TEXT DEFAULT '',
    definition TEXT DEFAULT '',
    example TEXT DEFAULT '',
    fun_fact TEXT DEFAULT '',
    description TEXT DEFAULT '',
    category TEXT NOT NULL DEFAULT 'general',
    difficulty TEXT NOT NULL DEFAULT 'easy',
    language TEXT NOT NULL DEFAULT 'english',
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    day_bucket TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_words_category ON words(category);
CREATE INDEX IF NOT EXISTS idx_words_day ON words(day_bucket);

-- Per-user word progress, created lazily on first interaction
CREATE TABLE IF NOT EXISTS user_word_progress (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    word_id INTEGER NOT NULL,
    known INTEGER NOT NULL DEFAULT 0,
    mastery_level INTEGER NOT NULL DEFAULT 0,
    correct_attempts INTEGER NOT NULL DEFAULT 0,
    total_attempts INTEGER NOT NULL DEFAULT 0,
    last_practiced INTEGER,
    FOREIGN KEY (user_id) REFERENCES users (id),
    FOREIGN KEY (word_id) REFERENCES words (id),
    UNIQUE(user_id, word_id)
);
CREATE INDEX IF NOT EXISTS idx_progress_user ON user_word_progress(user_id);
CREATE INDEX IF NOT EXISTS idx_progress_word ON user_word_progress(word_id);

-- Quiz results, append-only
CREATE TABLE IF NOT EXISTS quiz_results (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    word_id INTEGER NOT NULL,
    remembered INTEGER NOT NULL DEFAULT 0,
    quiz_type TEXT NOT NULL DEFAULT 'basic',
    timestamp INTEGER NOT NULL,
    FOREIGN KEY (user_id) REFERENCES users (id),
    FOREIGN KEY (word_id) REFERENCES words (id)
);
CREATE INDEX IF NOT EXISTS idx_quiz_user ON quiz_results(user_id);

-- Unlocked achievements, unique per (user, achievement)
CREATE TABLE IF NOT EXISTS user_achievements (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    achievement_id TEXT NOT NULL,
    unlocked_at INTEGER NOT NULL,
    FOREIGN KEY (user_id) REFERENCES users (id),
    UNIQUE(user_id, achievement_id)
);

-- One virtual pet per user, created at registration
CREATE TABLE IF NOT EXISTS virtual_pets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL UNIQUE,
    name TEXT NOT NULL DEFAULT 'Buddy',
    type TEXT NOT NULL DEFAULT 'cat',
    happiness INTEGER NOT NULL DEFAULT 100,
    growth INTEGER NOT NULL DEFAULT 0,
    accessories TEXT NOT NULL DEFAULT '[]',
    last_fed INTEGER NOT NULL,
    FOREIGN KEY (user_id) REFERENCES users (id)
);

-- Bearer sessions. expires_at NULL means non-expiring.
CREATE TABLE IF NOT EXISTS sessions (
    token TEXT PRIMARY KEY,
    user_id INTEGER NOT NULL,
    created_at INTEGER NOT NULL,
    expires_at INTEGER,
    FOREIGN KEY (user_id) REFERENCES users (id)
);
CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);

-- Schema version
CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY);
INSERT OR IGNORE INTO schema_version VALUES (2);
"#;

/// Starter catalog: (word, image, pronunciation, definition, example,
/// fun_fact, difficulty, category). Word text is stored lowercase.
const SAMPLE_WORDS: &[(&str, &str, &str, &str, &str, &str, &str, &str)] = &[
    (
        "apple", "🍎", "/ˈæpəl/",
        "A round fruit with red or green skin",
        "I eat an apple for breakfast",
        "Apples float because they are 25% air!",
        "easy", "food",
    ),
    (
        "banana", "🍌", "/bəˈnænə/",
        "A long yellow fruit",
        "Monkeys love to eat bananas",
        "Bananas are berries, but strawberries are not!",
        "easy", "food",
    ),
    (
        "orange", "🍊", "/ˈɔːrɪndʒ/",
        "A round citrus fruit",
        "Orange juice is delicious",
        "Oranges were originally green!",
        "easy", "food",
    ),
    (
        "cat", "🐱", "/kæt/",
        "A small furry pet that says meow",
        "My cat loves to play with yarn",
        "Cats sleep 12-16 hours per day!",
        "easy", "animals",
    ),
    (
        "dog", "🐶", "/dɔːɡ/",
        "A loyal pet that barks and wags its tail",
        "Dogs are man's best friend",
        "Dogs can learn over 150 words!",
        "easy", "animals",
    ),
    (
        "house", "🏠", "/haʊs/",
        "A building where people live",
        "My house has a red door",
        "The oldest house is 9,000 years old!",
        "easy", "objects",
    ),
    (
        "tree", "🌳", "/triː/",
        "A tall plant with branches and leaves",
        "Birds build nests in trees",
        "The oldest tree is over 4,800 years old!",
        "easy", "nature",
    ),
    (
        "eye", "👁️", "/aɪ/",
        "The part of your body you see with",
        "I have two brown eyes",
        "Your eyes blink 15-20 times per minute!",
        "easy", "body",
    ),
    (
        "red", "🔴", "/red/",
        "The color of fire and strawberries",
        "Stop signs are red",
        "Red is the first color babies can see!",
        "easy", "colors",
    ),
    (
        "run", "🏃", "/rʌn/",
        "To move very fast with your legs",
        "I run to catch the bus",
        "Humans can run up to 28 miles per hour!",
        "easy", "actions",
    ),
    (
        "elephant", "🐘", "/ˈeləfənt/",
        "A huge gray animal with a long trunk",
        "Elephants never forget",
        "Elephants can't jump!",
        "medium", "animals",
    ),
    (
        "butterfly", "🦋", "/ˈbʌtərflaɪ/",
        "A colorful insect with beautiful wings",
        "Butterflies start as caterpillars",
        "Butterflies taste with their feet!",
        "medium", "animals",
    ),
    (
        "airplane", "✈️", "/ˈerpleɪn/",
        "A flying machine with wings",
        "Airplanes fly high in the sky",
        "The Wright brothers flew for 12 seconds!",
        "medium", "objects",
    ),
    (
        "rainbow", "🌈", "/ˈreɪnboʊ/",
        "Colorful arc in the sky after rain",
        "Rainbows have seven colors",
        "You can never reach the end of a rainbow!",
        "medium", "nature",
    ),
    (
        "jellyfish", "🪼", "/ˈdʒelifɪʃ/",
        "A sea creature that looks like jelly",
        "Jellyfish have no brain or heart",
        "Some jellyfish are immortal!",
        "hard", "animals",
    ),
];

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_and_init() {
        let dir = tempdir().unwrap();
        let db = Database::open(&dir.path().join("test.db")).unwrap();

        let conn = db.conn();
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table'")
            .unwrap();
        let tables: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(tables.contains(&"users".to_string()));
        assert!(tables.contains(&"words".to_string()));
        assert!(tables.contains(&"user_word_progress".to_string()));
        assert!(tables.contains(&"quiz_results".to_string()));
        assert!(tables.contains(&"virtual_pets".to_string()));
        assert!(tables.contains(&"sessions".to_string()));
    }

    #[test]
    fn test_seed_is_idempotent() {
        let dir = tempdir().unwrap();
        let db = Database::open(&dir.path().join("test.db")).unwrap();

        let added = db.seed_sample_words().unwrap();
        assert_eq!(added, SAMPLE_WORDS.len());

        // Second run sees a populated catalog and adds nothing.
        assert_eq!(db.seed_sample_words().unwrap(), 0);

        let count: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM words", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, SAMPLE_WORDS.len() as i64);
    }
}
