//! Per-caller cooldown
//!
//! Enforces a minimum time between accepted requests from the same caller.
//! Rejected requests are dropped, not queued, and do not restart the window.

use crate::{Error, Result};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Admission gate keyed by caller identity
pub struct CooldownGate {
    /// Minimum time between accepted requests
    cooldown: Duration,
    /// Last accepted request per caller
    last_accepted: RwLock<HashMap<String, Instant>>,
}

impl CooldownGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_accepted: RwLock::new(HashMap::new()),
        }
    }

    /// Admit `caller_id` and start its window, or reject with `RateLimited`
    pub async fn admit(&self, caller_id: &str) -> Result<()> {
        let now = Instant::now();
        let mut last_accepted = self.last_accepted.write().await;

        if let Some(last) = last_accepted.get(caller_id) {
            let elapsed = now.saturating_duration_since(*last);
            if elapsed < self.cooldown {
                let remaining = self.cooldown - elapsed;
                tracing::debug!(
                    caller = caller_id,
                    remaining_ms = remaining.as_millis() as u64,
                    "Request rejected by cooldown"
                );
                return Err(Error::RateLimited(format!(
                    "Cooldown active. Please wait {:.1} more seconds.",
                    remaining.as_secs_f64()
                )));
            }
        }

        last_accepted.insert(caller_id.to_string(), now);
        Ok(())
    }
}
