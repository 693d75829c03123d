//! Access guard for the REST surface.
//!
//! Loopback callers are always admitted. Other callers need
//! `Authorization: Bearer <token>` matching the configured external-access
//! token; without a configured token external access is disabled.

use crate::api::AppState;
use crate::core::domain::error::SwapperError;
use crate::swapper::application::response::api_response::ApiResponse;
use axum::{
    Json,
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;

pub async fn access_guard(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    let peer = connect_info.map(|ConnectInfo(addr)| addr);
    if peer.is_some_and(|addr| addr.ip().is_loopback()) {
        return next.run(request).await;
    }

    let Some(expected) = state.ctx.options.api_token.as_deref() else {
        tracing::warn!(peer = ?peer, "external request rejected");
        return denied(StatusCode::FORBIDDEN, "External access is disabled");
    };

    let provided = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match provided {
        Some(token) if constant_time_eq(token.as_bytes(), expected.as_bytes()) => {
            next.run(request).await
        }
        Some(_) => {
            tracing::warn!("invalid bearer token provided");
            denied(StatusCode::UNAUTHORIZED, "Invalid access token")
        }
        None => {
            tracing::debug!("no bearer token provided");
            denied(StatusCode::UNAUTHORIZED, "Access token required")
        }
    }
}

/// Byte comparison whose running time does not depend on where the inputs differ.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn denied(status: StatusCode, reason: &str) -> Response {
    let error = SwapperError::SecurityDenied(reason.to_string());
    (status, Json(ApiResponse::<()>::failure(error.to_string()))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"letmein", b"letmein"));
        assert!(!constant_time_eq(b"letmein", b"letmeout"));
        assert!(!constant_time_eq(b"letmein", b"letmeim"));
        assert!(!constant_time_eq(b"", b"x"));
        assert!(constant_time_eq(b"", b""));
    }
}
