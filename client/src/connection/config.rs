use std::time::Duration;

use depot_shared::MAX_IN_FLIGHT;

/// Tunables for a sync session. The defaults mirror the deployed protocol;
/// tests shrink the timeouts and budgets to keep scenarios small.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Per-priority-class cap on transmitted-but-unanswered requests.
    pub max_in_flight: usize,
    /// Fatal threshold for time spent without a single inbound byte.
    pub stall_timeout: Duration,
    /// Largest stall-clock advance credited to one poll, so a long pause in
    /// the caller's loop cannot inflate the timeout unfairly.
    pub tick_clamp: Duration,
    /// Upper bound on stream-availability checks per poll, keeping a single
    /// poll prompt even under sustained throughput.
    pub pump_budget: usize,
    /// Bucket count for the pending request indexes (capacity knob).
    pub pending_buckets: usize,
    /// Bucket count for the in-flight request indexes (capacity knob).
    pub in_flight_buckets: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_in_flight: MAX_IN_FLIGHT,
            stall_timeout: Duration::from_secs(30),
            tick_clamp: Duration::from_millis(200),
            pump_budget: 100,
            pending_buckets: 4096,
            in_flight_buckets: 32,
        }
    }
}
