//! Bearer-token identity with role-based access checks.
//!
//! Tokens encode role and caller id directly: `Bearer {role}:{id}`, e.g.
//! `Bearer delivery_staff:7`. The upstream auth service is an external
//! collaborator; this layer only parses what it issued and enforces the
//! role floor per route.

use axum::extract::{FromRequestParts, Request};
use axum::http::header;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Roles ordered by privilege; `Ord` follows declaration order so a role
/// floor is a single `>=` comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    DeliveryStaff,
    Admin,
}

impl Role {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "customer" => Some(Self::Customer),
            "delivery_staff" => Some(Self::DeliveryStaff),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerIdentity {
    pub role: Role,
    pub caller_id: u64,
}

impl CallerIdentity {
    pub fn has_role(&self, minimum: Role) -> bool {
        self.role >= minimum
    }
}

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CallerIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerIdentity>()
            .copied()
            .ok_or_else(|| AppError::Unauthorized("authentication required".to_string()))
    }
}

/// 403 with the fixed permission message when the caller's role is below
/// the floor. Checked before any request-specific work.
pub fn require_role(caller: &CallerIdentity, minimum: Role) -> Result<(), AppError> {
    if caller.has_role(minimum) {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

/// Parses the bearer token, if any, and injects the identity into request
/// extensions. Routes that need an identity reject at extraction time, so
/// unauthenticated requests to open routes still pass through.
pub async fn identity_middleware(mut request: Request, next: Next) -> Response {
    if let Some(identity) = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_bearer)
    {
        request.extensions_mut().insert(identity);
    }

    next.run(request).await
}

fn parse_bearer(header_value: &str) -> Option<CallerIdentity> {
    let token = header_value.strip_prefix("Bearer ")?;
    let (role_raw, id_raw) = token.split_once(':')?;

    Some(CallerIdentity {
        role: Role::parse(role_raw.trim())?,
        caller_id: id_raw.trim().parse().ok()?,
    })
}
