use async_trait::async_trait;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use email::{AdminGate, CallerContext};

/// Admin check against a single shared bearer token
pub struct BearerTokenGate {
    token: String,
}

impl BearerTokenGate {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl AdminGate for BearerTokenGate {
    async fn is_admin(&self, caller: &CallerContext) -> bool {
        match caller.bearer_token.as_deref() {
            Some(presented) if !self.token.is_empty() => {
                constant_time_eq(presented.as_bytes(), self.token.as_bytes())
            }
            _ => false,
        }
    }
}

/// Caller context from `Authorization: Bearer <token>`
pub fn caller_from_headers(headers: &HeaderMap) -> CallerContext {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|token| CallerContext::with_bearer(token.trim()))
        .unwrap_or_default()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
