//! Progress, quiz, and user-stats handlers.

use crate::error::ApiError;
use crate::progress::{PracticeUpdate, QuizSubmission};
use crate::server::{AppState, Reply, parse_json, to_json};

pub fn update(
    state: &AppState,
    user_id: i64,
    word_id: i64,
    body: &str,
) -> Result<Reply, ApiError> {
    let practice: PracticeUpdate = if body.trim().is_empty() {
        PracticeUpdate::default()
    } else {
        parse_json(body)?
    };

    let outcome = state.progress.record_practice(user_id, word_id, &practice)?;
    Ok((200, to_json(&outcome)?))
}

pub fn submit_quiz(state: &AppState, user_id: i64, body: &str) -> Result<Reply, ApiError> {
    let submission: QuizSubmission = parse_json(body)?;
    let outcome = state.progress.submit_quiz(user_id, &submission)?;
    Ok((200, to_json(&outcome)?))
}

/// Profile, unlocked achievements, and the pet in one payload.
pub fn user_stats(state: &AppState, user_id: i64) -> Result<Reply, ApiError> {
    let profile = state
        .auth
        .profile(user_id)?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    let achievements = state.progress.achievements(user_id)?;
    let pet = state.pets.get(user_id)?;

    let mut user = to_json(&profile)?;
    user["achievements"] = to_json(&achievements)?;

    Ok((
        200,
        serde_json::json!({
            "user": user,
            "virtual_pet": to_json(&pet)?,
        }),
    ))
}
