//! Rate limiting for the login endpoint.
//!
//! Uses a token bucket algorithm with per-IP tracking to slow down password
//! guessing.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    Quota, RateLimiter,
    clock::{Clock, DefaultClock},
    middleware::NoOpMiddleware,
    state::keyed::DefaultKeyedStateStore,
};
use std::{num::NonZeroU32, sync::Arc};
use tracing::{debug, warn};

use crate::auth::{ClientIpHeader, extract_client_ip};

/// Default login attempts per minute per IP.
pub const DEFAULT_LOGIN_PER_MINUTE: u32 = 10;

/// Per-IP rate limiter.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Rate limiting configuration for authentication endpoints.
#[derive(Clone)]
pub struct RateLimitConfig {
    /// Per-IP limiter for login attempts
    pub login: Arc<IpLimiter>,
    /// Where the client IP comes from
    pub ip_header: Option<ClientIpHeader>,
}

impl RateLimitConfig {
    /// Allow `login_per_minute` attempts per IP, all of which may be used in a
    /// burst. Zero is treated as one.
    pub fn new(login_per_minute: u32, ip_header: Option<ClientIpHeader>) -> Self {
        let per_minute = NonZeroU32::new(login_per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            login: Arc::new(RateLimiter::keyed(Quota::per_minute(per_minute))),
            ip_header,
        }
    }

    /// Forget client IPs whose bucket has fully refilled. Returns the number
    /// still tracked.
    pub fn prune(&self) -> usize {
        let remaining = prune_keyed(&*self.login);
        debug!(remaining, "Pruned login rate limiter");
        remaining
    }
}

fn prune_keyed<C: Clock>(
    limiter: &RateLimiter<String, DefaultKeyedStateStore<String>, C, NoOpMiddleware<C::Instant>>,
) -> usize {
    limiter.retain_recent();
    limiter.shrink_to_fit();
    limiter.len()
}

/// Middleware for rate limiting login attempts.
pub async fn rate_limit_login(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = match extract_client_ip(&request, config.ip_header) {
        Ok(ip) => ip,
        Err(reason) => {
            warn!(reason, "Rejecting login without a client IP");
            return (StatusCode::FORBIDDEN, "Unable to determine client IP.").into_response();
        }
    };

    match config.login.check_key(&ip) {
        Ok(_) => next.run(request).await,
        Err(_) => {
            warn!(ip = %ip, "Login rate limit exceeded");
            (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many login attempts. Please wait before trying again.",
            )
                .into_response()
        }
    }
}
