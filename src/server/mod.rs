//! HTTP server: routing, body handling, and identity resolution.
//!
//! Listens on the configured address and serves the JSON API:
//! - `/auth/*` - register, login, logout, verify
//! - `/words` and `/words/{id}[/progress]` - catalog and progress
//! - `/quiz/submit`, `/user/stats`, `/pet/*` - the reward loop
//! - `/analytics/*` - admin-only aggregates
//! - `/health` - liveness

pub mod handlers;

use std::io::Read;

use anyhow::{Context, Result};
use tiny_http::{Response, Server};
use tracing::{debug, error, info};

use crate::analytics::Analytics;
use crate::auth::{AuthService, SessionUser};
use crate::config::Config;
use crate::db::Database;
use crate::error::ApiError;
use crate::pet::PetKeeper;
use crate::progress::ProgressTracker;
use crate::words::WordCatalog;

const MAX_BODY_BYTES: usize = 1024 * 1024; // 1 MiB

/// Status code plus JSON body, as produced by every handler.
pub type Reply = (u16, serde_json::Value);

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub auth: AuthService,
    pub words: WordCatalog,
    pub progress: ProgressTracker,
    pub pets: PetKeeper,
    pub analytics: Analytics,
}

impl AppState {
    pub fn new(db: Database, config: &Config) -> Self {
        Self {
            auth: AuthService::new(db.clone(), config.auth.clone()),
            words: WordCatalog::new(db.clone()),
            progress: ProgressTracker::new(db.clone()),
            pets: PetKeeper::new(db.clone()),
            analytics: Analytics::new(db),
        }
    }
}

/// Run the HTTP server until the process exits.
pub fn run(state: AppState, bind_addr: &str, port: u16) -> Result<()> {
    let addr = format!("{bind_addr}:{port}");
    let server = Server::http(&addr)
        .map_err(|e| anyhow::anyhow!("Failed to start server on {addr}: {e}"))?;
    info!("Server listening on http://{addr}");

    for request in server.incoming_requests() {
        handle_request(&state, request);
    }

    Ok(())
}

fn handle_request(state: &AppState, mut request: tiny_http::Request) {
    let method = request.method().to_string();
    let url = request.url().to_string();
    let (path, query) = match url.split_once('?') {
        Some((p, q)) => (p, q),
        None => (url.as_str(), ""),
    };

    let body = if matches!(method.as_str(), "POST" | "PUT") {
        match read_request_body(&mut request) {
            Ok(body) => body,
            Err(response) => {
                let _ = request.respond(response);
                return;
            }
        }
    } else {
        String::new()
    };

    debug!("{method} {path}");

    match route(state, &method, path, query, &body, &request) {
        Ok((status, value)) => respond_json(request, status, value),
        Err(e) => {
            let status = e.status();
            if status >= 500 {
                error!("{method} {path} failed: {e}");
            }
            respond_json(request, status, serde_json::json!({ "error": e.to_string() }));
        }
    }
}

fn route(
    state: &AppState,
    method: &str,
    path: &str,
    query: &str,
    body: &str,
    request: &tiny_http::Request,
) -> Result<Reply, ApiError> {
    match (method, path) {
        ("GET", "/health") => Ok((
            200,
            serde_json::json!({
                "status": "healthy",
                "message": "wordquest API is running",
                "version": env!("CARGO_PKG_VERSION"),
            }),
        )),

        // Auth
        ("POST", "/auth/register") => handlers::auth::register(state, body),
        ("POST", "/auth/login") => handlers::auth::login(state, body),
        ("POST", "/auth/logout") => handlers::auth::logout(state, request),
        ("GET", "/auth/verify") => handlers::auth::verify(state, request),

        // Word catalog
        ("GET", "/words") => {
            let viewer = optional_identity(state, request)?;
            handlers::words::list(state, query, viewer)
        }
        ("POST", "/words") => {
            require_admin(state, request)?;
            handlers::words::create(state, body)
        }
        ("GET", "/words/categories") => handlers::words::categories(state),
        ("POST", "/words/bulk-import") => {
            require_admin(state, request)?;
            handlers::words::bulk_import(state, body)
        }
        ("PUT", p) if p.starts_with("/words/") && p.ends_with("/progress") => {
            let session = require_user(state, request)?;
            let word_id = parse_id_from_path(p, Some("progress"))?;
            handlers::progress::update(state, session.user_id, word_id, body)
        }
        ("GET", p) if p.starts_with("/words/") => {
            optional_identity(state, request)?;
            let word_id = parse_id_from_path(p, None)?;
            handlers::words::get(state, word_id)
        }
        ("PUT", p) if p.starts_with("/words/") => {
            require_admin(state, request)?;
            let word_id = parse_id_from_path(p, None)?;
            handlers::words::update(state, word_id, body)
        }
        ("DELETE", p) if p.starts_with("/words/") => {
            require_admin(state, request)?;
            let word_id = parse_id_from_path(p, None)?;
            handlers::words::delete(state, word_id)
        }

        // Progress & rewards
        ("POST", "/quiz/submit") => {
            let session = require_user(state, request)?;
            handlers::progress::submit_quiz(state, session.user_id, body)
        }
        ("GET", "/user/stats") => {
            let session = require_user(state, request)?;
            handlers::progress::user_stats(state, session.user_id)
        }

        // Virtual pet
        ("POST", "/pet/feed") => {
            let session = require_user(state, request)?;
            handlers::pet::feed(state, session.user_id)
        }
        ("POST", "/pet/play") => {
            let session = require_user(state, request)?;
            handlers::pet::play(state, session.user_id)
        }

        // Analytics (admin only)
        ("GET", "/analytics/overview") => {
            require_admin(state, request)?;
            handlers::analytics::overview(state)
        }
        ("GET", "/analytics/words") => {
            require_admin(state, request)?;
            handlers::analytics::words(state)
        }
        ("GET", "/analytics/users") => {
            require_admin(state, request)?;
            handlers::analytics::users(state)
        }
        ("GET", "/analytics/activity") => {
            require_admin(state, request)?;
            handlers::analytics::activity(state)
        }

        _ => Err(ApiError::not_found("Not found")),
    }
}

/// Pull the bearer token out of the Authorization header.
pub fn bearer_token(request: &tiny_http::Request) -> Option<String> {
    request
        .headers()
        .iter()
        .find(|h| h.field.equiv("Authorization"))
        .map(|h| h.value.as_str().to_string())
        .and_then(|v| v.strip_prefix("Bearer ").map(|t| t.trim().to_string()))
        .filter(|t| !t.is_empty())
}

/// Resolve the caller when a token is presented; anonymous is fine, a
/// bad token is not.
fn optional_identity(
    state: &AppState,
    request: &tiny_http::Request,
) -> Result<Option<SessionUser>, ApiError> {
    match bearer_token(request) {
        None => Ok(None),
        Some(token) => state
            .auth
            .resolve(&token)?
            .map(Some)
            .ok_or_else(|| ApiError::unauthorized("Invalid or expired token")),
    }
}

fn require_user(state: &AppState, request: &tiny_http::Request) -> Result<SessionUser, ApiError> {
    let token =
        bearer_token(request).ok_or_else(|| ApiError::unauthorized("Missing bearer token"))?;
    state
        .auth
        .resolve(&token)?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired token"))
}

fn require_admin(state: &AppState, request: &tiny_http::Request) -> Result<SessionUser, ApiError> {
    let session = require_user(state, request)?;
    if !session.is_admin {
        return Err(ApiError::unauthorized("Unauthorized"));
    }
    Ok(session)
}

/// Parse a JSON request body, mapping malformed input to a 400.
pub fn parse_json<T: serde::de::DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|e| ApiError::bad_request(format!("Invalid JSON: {e}")))
}

/// Serialize a handler payload, which should never fail for our types.
pub fn to_json<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, ApiError> {
    Ok(serde_json::to_value(value).context("Failed to serialize response")?)
}

/// Single query parameter by name, percent-decoded.
pub fn query_param(query: &str, key: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}

fn json_content_type() -> tiny_http::Header {
    tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap()
}

fn read_request_body(
    request: &mut tiny_http::Request,
) -> Result<String, Response<std::io::Cursor<Vec<u8>>>> {
    let mut body = String::new();
    let mut reader = request.as_reader().take((MAX_BODY_BYTES + 1) as u64);
    if let Err(e) = reader.read_to_string(&mut body) {
        error!("Failed to read request body: {e}");
        let response = Response::from_string("{\"error\":\"bad_request\"}")
            .with_status_code(400)
            .with_header(json_content_type());
        return Err(response);
    }

    if body.len() > MAX_BODY_BYTES {
        let response = Response::from_string("{\"error\":\"payload_too_large\"}")
            .with_status_code(413)
            .with_header(json_content_type());
        return Err(response);
    }

    Ok(body)
}

fn respond_json(request: tiny_http::Request, status_code: u16, value: serde_json::Value) {
    let body =
        serde_json::to_string(&value).unwrap_or_else(|_| "{\"error\":\"serialize\"}".to_string());
    let response = Response::from_string(body)
        .with_status_code(status_code)
        .with_header(json_content_type());
    let _ = request.respond(response);
}

/// Parse the numeric id out of paths like `/words/7` or `/words/7/progress`.
fn parse_id_from_path(path: &str, suffix: Option<&str>) -> Result<i64, ApiError> {
    let trimmed = path.trim_end_matches('/');
    let trimmed = match suffix {
        Some(suffix) => trimmed
            .strip_suffix(&format!("/{suffix}"))
            .ok_or_else(|| ApiError::bad_request("Invalid path"))?,
        None => trimmed,
    };

    let id_str = trimmed
        .rsplit('/')
        .next()
        .ok_or_else(|| ApiError::bad_request("Invalid path"))?;
    id_str
        .parse::<i64>()
        .map_err(|_| ApiError::bad_request("Invalid word id"))
}
