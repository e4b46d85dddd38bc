use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::Disposition;

/// Counters for one poll loop run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollStats {
    pub received: usize,
    pub dispatched: usize,
    pub dispatch_failures: usize,
    pub discarded: usize,
    pub left_for_redelivery: usize,
    pub empty_receives: usize,
    pub receive_errors: usize,
    pub delete_failures: usize,

    /// Rejections by label (`stale`, `malformed_body`, ...).
    pub rejections: BTreeMap<String, usize>,
}

impl PollStats {
    pub fn record(&mut self, disposition: &Disposition) {
        self.received += 1;
        match disposition {
            Disposition::Dispatched { .. } => self.dispatched += 1,
            Disposition::DispatchFailed { .. } => self.dispatch_failures += 1,
            Disposition::Discarded(rejection) => {
                self.discarded += 1;
                *self.rejections.entry(rejection.label().to_string()).or_default() += 1;
            }
            Disposition::LeftForRedelivery(rejection) => {
                self.left_for_redelivery += 1;
                *self.rejections.entry(rejection.label().to_string()).or_default() += 1;
            }
        }
    }
}
