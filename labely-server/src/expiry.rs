//! Idle session reaper
//!
//! Periodically expires sessions idle past the TTL so abandoned runs still
//! pay out and free the (user, dataset) slot.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::SessionEngine;

pub fn spawn_reaper(
    engine: Arc<SessionEngine>,
    interval: Duration,
    cancel_token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval_secs = interval.as_secs(), "Session reaper started");
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    info!("Session reaper stopping");
                    break;
                }
                _ = ticker.tick() => {
                    match engine.expire_idle_sessions(Utc::now()).await {
                        Ok(expired) if expired.is_empty() => debug!("No idle sessions"),
                        Ok(expired) => info!(count = expired.len(), "Expired idle sessions"),
                        Err(e) => warn!(error = %e, "Session reaper pass failed"),
                    }
                }
            }
        }
    })
}
