//! Analytics handlers (admin only; gating happens in the router).

use crate::error::ApiError;
use crate::server::{AppState, Reply, to_json};

pub fn overview(state: &AppState) -> Result<Reply, ApiError> {
    let report = state.analytics.overview()?;
    Ok((200, to_json(&report)?))
}

pub fn words(state: &AppState) -> Result<Reply, ApiError> {
    let report = state.analytics.words()?;
    Ok((200, to_json(&report)?))
}

pub fn users(state: &AppState) -> Result<Reply, ApiError> {
    let report = state.analytics.users()?;
    Ok((200, to_json(&report)?))
}

pub fn activity(state: &AppState) -> Result<Reply, ApiError> {
    let report = state.analytics.activity()?;
    Ok((200, to_json(&report)?))
}
