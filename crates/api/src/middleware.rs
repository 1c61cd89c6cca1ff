use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Method, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use rust_decimal::Decimal;

use walletd_auth::JwtValidator;
use walletd_fraud::{MovementRequest, RequestOrigin};
use walletd_wallet::TransactionType;

use crate::app::errors;
use crate::app::services::AppServices;
use crate::authz;
use crate::context::PrincipalContext;

/// Largest request body the fraud gate will buffer.
const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
}

pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = extract_bearer(req.headers()) else {
        return unauthorized();
    };

    let claims = match state.jwt.validate(token, Utc::now()) {
        Ok(claims) => claims,
        Err(_) => return unauthorized(),
    };

    req.extensions_mut()
        .insert(PrincipalContext::new(claims.sub, claims.roles));

    next.run(req).await
}

fn unauthorized() -> Response {
    errors::json_error(StatusCode::UNAUTHORIZED, "unauthorized", "Unauthorized")
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?;
    let token = header.to_str().ok()?.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}

/// Admin guard: reads need `admin.read`, everything else `admin.write`.
pub async fn admin_middleware(req: Request<Body>, next: Next) -> Response {
    let Some(principal) = req.extensions().get::<PrincipalContext>() else {
        return unauthorized();
    };
    let required = if req.method() == Method::GET {
        authz::ADMIN_READ
    } else {
        authz::ADMIN_WRITE
    };
    if let Err(e) = authz::authorize_principal(principal, &required) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }
    next.run(req).await
}

#[derive(Clone)]
pub struct FraudGateState {
    pub services: Arc<AppServices>,
    pub kind: TransactionType,
}

/// Screens a movement before its handler runs.
///
/// On success the resulting `FraudContext` is placed in the request
/// extensions for the handler to pass on to the ledger. A body whose amount
/// cannot be read is forwarded unscreened; the handler rejects it.
pub async fn fraud_gate_middleware(
    State(state): State<FraudGateState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let Some(principal) = req.extensions().get::<PrincipalContext>().cloned() else {
        return unauthorized();
    };

    let (mut parts, body) = req.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => return errors::bad_request(e),
    };

    if let Some(amount) = probe_amount(&bytes) {
        let origin = RequestOrigin {
            ip_address: client_ip(&parts.headers, parts.extensions.get::<ConnectInfo<SocketAddr>>()),
            user_agent: parts
                .headers
                .get(axum::http::header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        };
        let request = MovementRequest {
            amount,
            kind: state.kind,
        };
        match state
            .services
            .gate
            .screen(principal.account_id(), request, origin)
            .await
        {
            Ok(ctx) => {
                parts.extensions.insert(ctx);
            }
            Err(e) => return errors::gate_error_to_response(e),
        }
    }

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

/// Reads `amount` from a JSON body, as a number or a numeric string.
fn probe_amount(bytes: &[u8]) -> Option<Decimal> {
    let value: serde_json::Value = serde_json::from_slice(bytes).ok()?;
    match value.get("amount")? {
        serde_json::Value::Number(n) => parse_decimal(&n.to_string()),
        serde_json::Value::String(s) => parse_decimal(s.trim()),
        _ => None,
    }
}

fn parse_decimal(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}

/// First `X-Forwarded-For` hop, else the peer address.
fn client_ip(headers: &HeaderMap, peer: Option<&ConnectInfo<SocketAddr>>) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match forwarded {
        Some(ip) => Some(ip.to_string()),
        None => peer.map(|ConnectInfo(addr)| addr.ip().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use rust_decimal_macros::dec;

    #[test]
    fn amount_probe_accepts_numbers_and_strings() {
        assert_eq!(probe_amount(br#"{"amount": 12.5}"#), Some(dec!(12.5)));
        assert_eq!(probe_amount(br#"{"amount": "40"}"#), Some(dec!(40)));
        assert_eq!(probe_amount(br#"{"amount": 1e3}"#), Some(dec!(1000)));
        assert_eq!(probe_amount(br#"{"amount": true}"#), None);
        assert_eq!(probe_amount(b"not json"), None);
    }

    #[test]
    fn forwarded_header_wins_over_peer() {
        let peer = ConnectInfo(SocketAddr::from(([10, 0, 0, 7], 4000)));

        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, Some(&peer)).as_deref(), Some("10.0.0.7"));

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9, 10.0.0.1"));
        assert_eq!(client_ip(&headers, Some(&peer)).as_deref(), Some("203.0.113.9"));
    }

    #[test]
    fn bearer_extraction() {
        let mut headers = HeaderMap::new();
        assert!(extract_bearer(&headers).is_none());
        headers.insert("authorization", HeaderValue::from_static("Bearer abc"));
        assert_eq!(extract_bearer(&headers), Some("abc"));
        headers.insert("authorization", HeaderValue::from_static("Basic abc"));
        assert!(extract_bearer(&headers).is_none());
    }
}
