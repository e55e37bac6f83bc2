//! Application state shared by every handler.

use crate::events::EventHub;
use smart_parking_runtime::{AdmissionGate, CheckOutService, IngressQueue};

/// Handles the HTTP layer needs. Every field is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Producer side of the check-in queue
    pub ingress: IngressQueue,
    /// Synchronous check-out
    pub checkout: CheckOutService,
    /// The orchestrator's admission gate, read for readiness diagnostics
    pub gate: AdmissionGate,
    /// Websocket fan-out
    pub events: EventHub,
}

impl AppState {
    /// Bundle the handles.
    #[must_use]
    pub const fn new(
        ingress: IngressQueue,
        checkout: CheckOutService,
        gate: AdmissionGate,
        events: EventHub,
    ) -> Self {
        Self {
            ingress,
            checkout,
            gate,
            events,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_is_clone() {
        // Axum requires Clone state
        fn assert_clone<T: Clone + Send + Sync + 'static>() {}
        assert_clone::<AppState>();
    }
}
