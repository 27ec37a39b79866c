//! Word catalog handlers.

use serde::Deserialize;

use crate::auth::SessionUser;
use crate::error::ApiError;
use crate::server::{AppState, Reply, parse_json, query_param, to_json};
use crate::words::{NewWord, WordFilter, WordUpdate};

pub fn list(state: &AppState, query: &str, viewer: Option<SessionUser>) -> Result<Reply, ApiError> {
    let filter = WordFilter {
        category: query_param(query, "category"),
        difficulty: query_param(query, "difficulty"),
        language: query_param(query, "language"),
        search: query_param(query, "search"),
    };
    let words = state.words.list(&filter, viewer.map(|s| s.user_id))?;
    Ok((200, to_json(&words)?))
}

pub fn get(state: &AppState, word_id: i64) -> Result<Reply, ApiError> {
    let word = state.words.get(word_id)?;
    Ok((200, to_json(&word)?))
}

pub fn create(state: &AppState, body: &str) -> Result<Reply, ApiError> {
    let new: NewWord = parse_json(body)?;
    let word = state.words.create(&new)?;
    Ok((201, to_json(&word)?))
}

pub fn update(state: &AppState, word_id: i64, body: &str) -> Result<Reply, ApiError> {
    let update: WordUpdate = parse_json(body)?;
    let word = state.words.update(word_id, &update)?;
    Ok((200, to_json(&word)?))
}

pub fn delete(state: &AppState, word_id: i64) -> Result<Reply, ApiError> {
    state.words.delete(word_id)?;
    Ok((200, serde_json::json!({ "message": "Word deleted successfully" })))
}

#[derive(Debug, Deserialize)]
pub struct BulkImportRequest {
    pub words: Vec<serde_json::Value>,
}

pub fn bulk_import(state: &AppState, body: &str) -> Result<Reply, ApiError> {
    let req: BulkImportRequest = parse_json(body)?;
    if req.words.is_empty() {
        return Err(ApiError::bad_request("Words array is required"));
    }

    let report = state.words.bulk_import(&req.words)?;
    let message = format!(
        "Bulk import completed. {} words created.",
        report.created_words.len()
    );

    let mut value = to_json(&report)?;
    value["message"] = serde_json::Value::String(message);
    Ok((200, value))
}

pub fn categories(state: &AppState) -> Result<Reply, ApiError> {
    let categories = state.words.categories()?;
    Ok((200, serde_json::json!({ "categories": categories })))
}
