//! StalenessFilter - 古すぎるデプロイ要求を捨てる

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::domain::Rejection;
use crate::ports::Clock;

/// Requests older than this are assumed superseded.
pub const FRESHNESS_THRESHOLD_SECS: i64 = 60;

pub struct StalenessFilter {
    clock: Arc<dyn Clock>,
}

impl StalenessFilter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn threshold() -> Duration {
        Duration::seconds(FRESHNESS_THRESHOLD_SECS)
    }

    /// Age of a message sent at `sent_at`. Negative under clock skew.
    pub fn age(&self, sent_at: DateTime<Utc>) -> Duration {
        self.clock.now() - sent_at
    }

    pub fn is_stale(&self, sent_at: DateTime<Utc>) -> bool {
        self.age(sent_at) > Self::threshold()
    }

    pub fn check(&self, sent_at: DateTime<Utc>) -> Result<(), Rejection> {
        let age = self.age(sent_at);
        if age > Self::threshold() {
            return Err(Rejection::Stale {
                age_ms: age.num_milliseconds(),
                threshold_secs: FRESHNESS_THRESHOLD_SECS,
            });
        }
        Ok(())
    }
}
