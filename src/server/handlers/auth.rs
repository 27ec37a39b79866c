//! Auth handlers: register, login, logout, verify.

use serde::Deserialize;

use crate::error::ApiError;
use crate::server::{AppState, Reply, bearer_token, parse_json, to_json};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    pub password: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    pub password: Option<String>,
}

pub fn register(state: &AppState, body: &str) -> Result<Reply, ApiError> {
    let req: RegisterRequest = parse_json(body)?;
    let outcome = state
        .auth
        .register(&req.username, req.password.as_deref(), req.email.as_deref())?;
    Ok((201, to_json(&outcome)?))
}

pub fn login(state: &AppState, body: &str) -> Result<Reply, ApiError> {
    let req: LoginRequest = parse_json(body)?;
    let outcome = state.auth.login(&req.username, req.password.as_deref())?;
    Ok((200, to_json(&outcome)?))
}

/// The client should discard its token; the session row is dropped here.
pub fn logout(state: &AppState, request: &tiny_http::Request) -> Result<Reply, ApiError> {
    let token =
        bearer_token(request).ok_or_else(|| ApiError::unauthorized("Missing bearer token"))?;
    state.auth.logout(&token)?;
    Ok((200, serde_json::json!({ "message": "Successfully logged out" })))
}

pub fn verify(state: &AppState, request: &tiny_http::Request) -> Result<Reply, ApiError> {
    let token =
        bearer_token(request).ok_or_else(|| ApiError::unauthorized("Missing bearer token"))?;
    let session = state
        .auth
        .resolve(&token)?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired token"))?;

    let profile = state
        .auth
        .profile(session.user_id)?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok((200, serde_json::json!({ "user": to_json(&profile)? })))
}
