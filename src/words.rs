//! Word catalog: listing, CRUD, and bulk import.
//!
//! Word text is lowercased on every write and unique after normalization.
//! The listing joins the viewer's progress so clients get `known` and
//! `mastery_level` alongside each entry.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, types::Value};
use serde::{Deserialize, Serialize};

use crate::db::Database;
use crate::error::ApiError;
use crate::rewards::streaks::current_day_bucket;

/// Difficulty tier. Covers both tier vocabularies found in the wild
/// (easy/medium/hard and beginner/intermediate/advanced).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }
}

/// A catalog entry.
#[derive(Debug, Clone, Serialize)]
pub struct Word {
    pub id: i64,
    pub word: String,
    pub image: String,
    pub pronunciation: String,
    pub definition: String,
    pub example: String,
    pub fun_fact: String,
    pub description: String,
    pub category: String,
    pub difficulty: String,
    pub language: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A catalog entry with the viewer's progress attached.
#[derive(Debug, Clone, Serialize)]
pub struct WordWithProgress {
    #[serde(flatten)]
    pub word: Word,
    pub known: bool,
    pub mastery_level: i64,
}

/// Payload for creating a word (also the bulk-import item shape).
#[derive(Debug, Clone, Deserialize)]
pub struct NewWord {
    #[serde(default)]
    pub word: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub pronunciation: String,
    #[serde(default)]
    pub definition: String,
    #[serde(default)]
    pub example: String,
    #[serde(default)]
    pub fun_fact: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default = "default_difficulty")]
    pub difficulty: Difficulty,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_category() -> String {
    "general".to_string()
}

fn default_difficulty() -> Difficulty {
    Difficulty::Easy
}

fn default_language() -> String {
    "english".to_string()
}

/// Partial update payload; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WordUpdate {
    pub word: Option<String>,
    pub image: Option<String>,
    pub pronunciation: Option<String>,
    pub definition: Option<String>,
    pub example: Option<String>,
    pub fun_fact: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub language: Option<String>,
}

/// Listing filters; all optional, combined with AND.
#[derive(Debug, Clone, Default)]
pub struct WordFilter {
    pub category: Option<String>,
    pub difficulty: Option<String>,
    pub language: Option<String>,
    pub search: Option<String>,
}

/// Result of a bulk import: the committed subset plus per-item errors.
#[derive(Debug, Clone, Serialize)]
pub struct BulkImportReport {
    pub created_words: Vec<String>,
    pub errors: Vec<String>,
}

/// Word catalog service.
#[derive(Clone)]
pub struct WordCatalog {
    db: Database,
}

impl WordCatalog {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// List words, alphabetically, with the viewer's progress joined in.
    /// Anonymous viewers get `known = false` and `mastery_level = 0`.
    pub fn list(
        &self,
        filter: &WordFilter,
        viewer: Option<i64>,
    ) -> Result<Vec<WordWithProgress>, ApiError> {
        let mut sql = String::from(
            r#"SELECT w.id, w.word, w.image, w.pronunciation, w.definition,
                      w.example, w.fun_fact, w.description, w.category,
                      w.difficulty, w.language, w.created_at, w.updated_at,
                      COALESCE(p.known, 0), COALESCE(p.mastery_level, 0)
               FROM words w
               LEFT JOIN user_word_progress p
                      ON p.word_id = w.id AND p.user_id = ?1"#,
        );
        let mut params: Vec<Value> = vec![Value::Integer(viewer.unwrap_or(-1))];

        let mut push_filter = |sql: &mut String, clause: &str, value: String| {
            params.push(Value::Text(value));
            sql.push_str(if params.len() == 2 { " WHERE " } else { " AND " });
            sql.push_str(&clause.replace("?n", &format!("?{}", params.len())));
        };

        if let Some(category) = &filter.category {
            push_filter(&mut sql, "w.category = ?n", category.clone());
        }
        if let Some(difficulty) = &filter.difficulty {
            push_filter(&mut sql, "w.difficulty = ?n", difficulty.clone());
        }
        if let Some(language) = &filter.language {
            push_filter(&mut sql, "w.language = ?n", language.clone());
        }
        if let Some(search) = &filter.search {
            push_filter(&mut sql, "w.word LIKE ?n", format!("%{}%", search.to_lowercase()));
        }

        sql.push_str(" ORDER BY w.word ASC");

        let conn = self.db.conn();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(params), |row| {
            Ok(WordWithProgress {
                word: map_word(row)?,
                known: row.get(13)?,
                mastery_level: row.get(14)?,
            })
        })?;

        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn get(&self, id: i64) -> Result<Word, ApiError> {
        get_word(&self.db.conn(), id)
    }

    /// Create a word. The text is lowercased before the uniqueness check.
    pub fn create(&self, new: &NewWord) -> Result<Word, ApiError> {
        let mut conn = self.db.conn();
        let tx = conn.transaction()?;

        let id = insert_word(&tx, new).map_err(ApiError::BadRequest)?;
        let word = get_word(&tx, id)?;

        tx.commit()?;
        Ok(word)
    }

    /// Partial update; only the provided fields change. Refreshes
    /// `updated_at` and re-normalizes the word text.
    pub fn update(&self, id: i64, update: &WordUpdate) -> Result<Word, ApiError> {
        let mut conn = self.db.conn();
        let tx = conn.transaction()?;

        // 404 before any mutation
        get_word(&tx, id)?;

        if let Some(word) = &update.word {
            let normalized = word.trim().to_lowercase();
            if normalized.is_empty() {
                return Err(ApiError::bad_request("Word is required"));
            }
            let duplicate: Option<i64> = tx
                .query_row(
                    "SELECT id FROM words WHERE word = ?1 AND id != ?2",
                    rusqlite::params![normalized, id],
                    |r| r.get(0),
                )
                .optional()?;
            if duplicate.is_some() {
                return Err(ApiError::bad_request("Word already exists"));
            }
            tx.execute(
                "UPDATE words SET word = ?1 WHERE id = ?2",
                rusqlite::params![normalized, id],
            )?;
        }

        let text_fields = [
            ("image", &update.image),
            ("pronunciation", &update.pronunciation),
            ("definition", &update.definition),
            ("example", &update.example),
            ("fun_fact", &update.fun_fact),
            ("description", &update.description),
            ("category", &update.category),
            ("language", &update.language),
        ];
        for (column, value) in text_fields {
            if let Some(value) = value {
                tx.execute(
                    &format!("UPDATE words SET {column} = ?1 WHERE id = ?2"),
                    rusqlite::params![value, id],
                )?;
            }
        }
        if let Some(difficulty) = update.difficulty {
            tx.execute(
                "UPDATE words SET difficulty = ?1 WHERE id = ?2",
                rusqlite::params![difficulty.as_str(), id],
            )?;
        }

        tx.execute(
            "UPDATE words SET updated_at = ?1 WHERE id = ?2",
            rusqlite::params![Utc::now().timestamp_millis(), id],
        )?;

        let word = get_word(&tx, id)?;
        tx.commit()?;
        Ok(word)
    }

    /// Delete a word and everything hanging off it (progress rows, quiz
    /// results) in one transaction.
    pub fn delete(&self, id: i64) -> Result<(), ApiError> {
        let mut conn = self.db.conn();
        let tx = conn.transaction()?;

        get_word(&tx, id)?;

        tx.execute("DELETE FROM user_word_progress WHERE word_id = ?1", [id])?;
        tx.execute("DELETE FROM quiz_results WHERE word_id = ?1", [id])?;
        tx.execute("DELETE FROM words WHERE id = ?1", [id])?;

        tx.commit()?;
        Ok(())
    }

    /// Best-effort batch create: invalid or duplicate items are reported
    /// per entry, the valid subset commits together.
    pub fn bulk_import(&self, items: &[serde_json::Value]) -> Result<BulkImportReport, ApiError> {
        let mut conn = self.db.conn();
        let tx = conn.transaction()?;

        let mut created_words = Vec::new();
        let mut errors = Vec::new();

        for item in items {
            let new: NewWord = match serde_json::from_value(item.clone()) {
                Ok(new) => new,
                Err(e) => {
                    errors.push(format!("Invalid entry: {e}"));
                    continue;
                }
            };
            // Inserts from earlier in the batch are visible here, so
            // intra-batch duplicates are caught too.
            match insert_word(&tx, &new) {
                Ok(_) => created_words.push(new.word.trim().to_lowercase()),
                Err(reason) => errors.push(reason),
            }
        }

        tx.commit()?;
        Ok(BulkImportReport { created_words, errors })
    }

    /// Distinct non-empty categories, alphabetical.
    pub fn categories(&self) -> Result<Vec<String>, ApiError> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT category FROM words WHERE category != '' ORDER BY category",
        )?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

/// Insert one word, returning a human-readable rejection reason on
/// validation failure. Database errors are stringified the same way so a
/// bulk import never aborts mid-batch.
fn insert_word(conn: &Connection, new: &NewWord) -> Result<i64, String> {
    let normalized = new.word.trim().to_lowercase();
    if normalized.is_empty() {
        return Err("Word is required".to_string());
    }

    let duplicate = conn
        .query_row("SELECT id FROM words WHERE word = ?1", [&normalized], |r| {
            r.get::<_, i64>(0)
        })
        .optional()
        .map_err(|e| e.to_string())?;
    if duplicate.is_some() {
        return Err(format!("Word '{normalized}' already exists"));
    }

    let now = Utc::now().timestamp_millis();
    conn.execute(
        r#"INSERT INTO words (word, image, pronunciation, definition, example,
                              fun_fact, description, category, difficulty,
                              language, created_at, updated_at, day_bucket)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11, ?12)"#,
        rusqlite::params![
            normalized,
            new.image,
            new.pronunciation,
            new.definition,
            new.example,
            new.fun_fact,
            new.description,
            new.category,
            new.difficulty.as_str(),
            new.language,
            now,
            current_day_bucket(),
        ],
    )
    .map_err(|e| e.to_string())?;

    Ok(conn.last_insert_rowid())
}

fn get_word(conn: &Connection, id: i64) -> Result<Word, ApiError> {
    conn.query_row(
        r#"SELECT id, word, image, pronunciation, definition, example,
                  fun_fact, description, category, difficulty, language,
                  created_at, updated_at
           FROM words WHERE id = ?1"#,
        [id],
        |row| map_word(row),
    )
    .optional()?
    .ok_or_else(|| ApiError::not_found("Word not found"))
}

fn map_word(row: &Row) -> rusqlite::Result<Word> {
    Ok(Word {
        id: row.get(0)?,
        word: row.get(1)?,
        image: row.get(2)?,
        pronunciation: row.get(3)?,
        definition: row.get(4)?,
        example: row.get(5)?,
        fun_fact: row.get(6)?,
        description: row.get(7)?,
        category: row.get(8)?,
        difficulty: row.get(9)?,
        language: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn catalog() -> (WordCatalog, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(&dir.path().join("test.db")).unwrap();
        (WordCatalog::new(db), dir)
    }

    fn new_word(text: &str, category: &str) -> NewWord {
        NewWord {
            word: text.to_string(),
            image: String::new(),
            pronunciation: String::new(),
            definition: String::new(),
            example: String::new(),
            fun_fact: String::new(),
            description: String::new(),
            category: category.to_string(),
            difficulty: Difficulty::Easy,
            language: "english".to_string(),
        }
    }

    #[test]
    fn test_create_lowercases_and_rejects_duplicates() {
        let (catalog, _dir) = catalog();

        let word = catalog.create(&new_word("Apple", "food")).unwrap();
        assert_eq!(word.word, "apple");

        // Same text in different case is the same word.
        let err = catalog.create(&new_word("APPLE", "food")).unwrap_err();
        assert_eq!(err.status(), 400);
    }

    #[test]
    fn test_list_filters_and_search() {
        let (catalog, _dir) = catalog();
        catalog.create(&new_word("apple", "food")).unwrap();
        catalog.create(&new_word("banana", "food")).unwrap();
        catalog.create(&new_word("cat", "animals")).unwrap();

        let all = catalog.list(&WordFilter::default(), None).unwrap();
        assert_eq!(all.len(), 3);
        // Alphabetical ordering.
        assert_eq!(all[0].word.word, "apple");

        let food = catalog
            .list(
                &WordFilter {
                    category: Some("food".to_string()),
                    ..WordFilter::default()
                },
                None,
            )
            .unwrap();
        assert_eq!(food.len(), 2);

        let hits = catalog
            .list(
                &WordFilter {
                    search: Some("Ban".to_string()),
                    ..WordFilter::default()
                },
                None,
            )
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].word.word, "banana");
    }

    #[test]
    fn test_update_is_partial() {
        let (catalog, _dir) = catalog();
        let word = catalog.create(&new_word("apple", "food")).unwrap();

        let updated = catalog
            .update(
                word.id,
                &WordUpdate {
                    definition: Some("A fruit".to_string()),
                    ..WordUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(updated.definition, "A fruit");
        assert_eq!(updated.category, "food");
        assert!(updated.updated_at >= word.updated_at);
    }

    #[test]
    fn test_update_unknown_id_is_404() {
        let (catalog, _dir) = catalog();
        let err = catalog.update(999, &WordUpdate::default()).unwrap_err();
        assert_eq!(err.status(), 404);
    }

    #[test]
    fn test_delete_cascades_progress() {
        let (catalog, _dir) = catalog();
        let word = catalog.create(&new_word("apple", "food")).unwrap();

        // Plant a progress row pointing at the word.
        {
            let conn = catalog.db.conn();
            conn.execute(
                r#"INSERT INTO users (username, password_hash, created_at, day_bucket)
                   VALUES ('amy', 'x', 0, '2026-01-01')"#,
                [],
            )
            .unwrap();
            conn.execute(
                "INSERT INTO user_word_progress (user_id, word_id) VALUES (1, ?1)",
                [word.id],
            )
            .unwrap();
        }

        catalog.delete(word.id).unwrap();

        let orphans: i64 = catalog
            .db
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM user_word_progress WHERE word_id = ?1",
                [word.id],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(orphans, 0);

        assert_eq!(catalog.delete(word.id).unwrap_err().status(), 404);
    }

    #[test]
    fn test_bulk_import_commits_valid_subset() {
        let (catalog, _dir) = catalog();
        catalog.create(&new_word("apple", "food")).unwrap();

        let items = vec![
            serde_json::json!({"word": "banana", "category": "food"}),
            serde_json::json!({"word": "apple"}),       // duplicate in table
            serde_json::json!({"category": "food"}),     // missing text
            serde_json::json!({"word": "cherry"}),
            serde_json::json!({"word": "Cherry"}),       // duplicate in batch
        ];

        let report = catalog.bulk_import(&items).unwrap();
        assert_eq!(report.created_words, vec!["banana", "cherry"]);
        assert_eq!(report.errors.len(), 3);

        let count: i64 = catalog
            .db
            .conn()
            .query_row("SELECT COUNT(*) FROM words", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 3);
    }

    #[test]
    fn test_categories_distinct() {
        let (catalog, _dir) = catalog();
        catalog.create(&new_word("apple", "food")).unwrap();
        catalog.create(&new_word("banana", "food")).unwrap();
        catalog.create(&new_word("cat", "animals")).unwrap();

        assert_eq!(catalog.categories().unwrap(), vec!["animals", "food"]);
    }
}
