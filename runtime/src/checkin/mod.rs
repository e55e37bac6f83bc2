//! Check-in workflow.
//!
//! One admitted request moves through an explicit state machine:
//!
//! ```text
//! Admitted → LockingOriginal → VerifyingOriginal ─────────────┐
//!                 │                   │                        ▼
//!                 └─────────→ SearchingAlternative → VerifyingAlternative → Assigning → Committed
//!                                      │                       │                │
//!                                      └───────────────────────┴────────────────┴─────→ Failed
//! ```
//!
//! The booked space always wins over an alternative. Once the search
//! starts it runs exactly once: an alternative that turns out occupied on
//! re-verification ends the workflow with `NoAvailableSpot`.

pub mod actions;
pub mod environment;
pub mod reducer;
pub mod types;

pub use actions::CheckInAction;
pub use environment::CheckInEnvironment;
pub use reducer::CheckInReducer;
pub use types::{AssignStep, CheckInOutcome, CheckInPhase, CheckInState};
