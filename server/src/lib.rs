//! Smart-parking check-in server.
//!
//! The binary in `main.rs` loads [`Config`], installs tracing and hands
//! over to [`app::run`].

pub mod app;
pub mod config;

pub use config::Config;
