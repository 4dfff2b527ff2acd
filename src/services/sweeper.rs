// src/services/sweeper.rs

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use tokio::task::JoinHandle;

use crate::services::sessions::SessionService;

/// Spawns the periodic expiry sweep. Errors are logged and the loop keeps going.
pub fn spawn(sessions: Arc<SessionService>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately; skip it so startup is not a sweep.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let ttl = sessions.ttl();
            if let Err(e) = sessions.expire_stale(Utc::now(), ttl).await {
                tracing::error!("Expiry sweep failed: {}", e);
            }
        }
    })
}
