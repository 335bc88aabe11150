pub mod app;
pub mod config;
pub mod metrics;
pub mod store;
pub mod user_handlers;

pub use app::{router, AppState};
