//! HTTP request handlers.

pub mod health;
pub mod reservations;
pub mod websocket;

pub use health::{health_check, readiness};
pub use reservations::{check_in, check_out};
