//! HTTP surface of the engagement engine.

pub mod config;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod metrics;
pub mod state;

pub use config::Config;
pub use state::AppState;
