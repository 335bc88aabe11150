pub mod app;
pub mod config;
pub mod metrics;
pub mod proxy;
pub mod upstream;

pub use app::{router, AppState};
