//! Fixed-window rate limiting for the verify-delivery endpoint.
//!
//! The code space is only 10,000 values, so this endpoint gets a budget far
//! below general API traffic. Keyed per caller identity; in-memory buckets
//! are enough for a single-instance deployment.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug)]
struct Bucket {
    count: u64,
    window_start: Instant,
}

#[derive(Clone)]
pub struct RateLimiter {
    max_attempts: u64,
    window_secs: u64,
    buckets: Arc<Mutex<HashMap<u64, Bucket>>>,
}

impl RateLimiter {
    pub fn new(max_attempts: u64, window_secs: u64) -> Self {
        Self {
            max_attempts,
            window_secs,
            buckets: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn check(&self, key: u64) -> bool {
        let mut buckets = self.buckets.lock().expect("rate limit lock poisoned");
        let now = Instant::now();

        let bucket = buckets.entry(key).or_insert(Bucket {
            count: 0,
            window_start: now,
        });

        if now.duration_since(bucket.window_start).as_secs() >= self.window_secs {
            bucket.count = 0;
            bucket.window_start = now;
        }

        if bucket.count >= self.max_attempts {
            false
        } else {
            bucket.count += 1;
            true
        }
    }
}

/// Route layer for verify-delivery. Anonymous requests fall through; the
/// handler rejects them with 401/403 before touching any order.
pub async fn verify_rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(identity) = request.extensions().get::<CallerIdentity>() {
        if !state.verify_limiter.check(identity.caller_id) {
            return AppError::RateLimited.into_response();
        }
    }

    next.run(request).await
}
