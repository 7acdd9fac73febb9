//! Scheduled removal of expired refresh records and idle rate limiter keys.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::db::RefreshTokenStore;
use crate::jwt::now_unix;
use crate::rate_limit::RateLimitConfig;

/// Interval between cleanup runs.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60); // 1 hour

/// Delete every refresh record whose expiry has passed and prune the login
/// limiter. Returns the number of refresh records removed.
pub async fn run_cleanup(store: &dyn RefreshTokenStore, rate_limit: &RateLimitConfig) -> u64 {
    rate_limit.prune();

    let now = match now_unix() {
        Ok(now) => now as i64,
        Err(e) => {
            error!("Failed to read the clock for cleanup: {}", e);
            return 0;
        }
    };

    match store.delete_expired(now).await {
        Ok(count) => {
            if count > 0 {
                info!("Cleaned up {} expired refresh tokens", count);
            }
            count
        }
        Err(e) => {
            error!("Failed to clean up expired refresh tokens: {}", e);
            0
        }
    }
}

/// Spawn a background task that runs cleanup periodically.
/// Returns a handle that can be used to abort the task.
pub fn spawn_cleanup_scheduler(
    store: Arc<dyn RefreshTokenStore>,
    rate_limit: Arc<RateLimitConfig>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
        // The first tick completes immediately; startup cleanup already ran.
        interval.tick().await;

        loop {
            interval.tick().await;
            run_cleanup(store.as_ref(), &rate_limit).await;
        }
    })
}
