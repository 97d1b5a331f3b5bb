//! Bearer-key auth for the admin surface. Separate from `crate::auth`
//! (trusted-header principal resolution for proxied traffic) — the admin
//! surface authenticates operators against `AdminConfig.api_key`, not
//! end-user principals.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};

use super::AdminState;

pub async fn admin_auth_middleware(
    State(state): State<AdminState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let expected = format!("Bearer {}", state.api_key);
    let supplied = request.headers().get("authorization").and_then(|h| h.to_str().ok());

    match supplied {
        Some(value) if value == expected => Ok(next.run(request).await),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}
