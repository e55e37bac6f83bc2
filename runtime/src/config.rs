//! Tunables for the check-in pipeline.

use std::time::Duration;

/// Check-in pipeline configuration.
///
/// Defaults: queue of 100, 50 concurrent workflows, 30s admission wait,
/// 10s spot lock TTL, 5s per store or lock call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckInConfig {
    /// Ingress queue capacity
    pub queue_capacity: usize,
    /// Admission gate capacity (concurrent workflows)
    pub gate_capacity: usize,
    /// How long a workflow waits for an admission ticket
    pub admission_timeout: Duration,
    /// TTL of `spot-lock:*` keys
    pub lock_ttl: Duration,
    /// Budget for a single store or lock call
    pub store_timeout: Duration,
}

impl Default for CheckInConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 100,
            gate_capacity: 50,
            admission_timeout: Duration::from_secs(30),
            lock_ttl: Duration::from_secs(10),
            store_timeout: Duration::from_secs(5),
        }
    }
}
