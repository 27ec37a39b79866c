//! Virtual pet handlers.

use crate::error::ApiError;
use crate::server::{AppState, Reply, to_json};

pub fn feed(state: &AppState, user_id: i64) -> Result<Reply, ApiError> {
    let outcome = state.pets.feed(user_id)?;
    Ok((200, to_json(&outcome)?))
}

pub fn play(state: &AppState, user_id: i64) -> Result<Reply, ApiError> {
    let outcome = state.pets.play(user_id)?;
    Ok((200, to_json(&outcome)?))
}
