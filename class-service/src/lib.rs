pub mod app;
pub mod class_handlers;
pub mod config;
pub mod memory_store;
pub mod pg_store;
pub mod store;
pub mod student_handlers;
pub mod subject_handlers;

pub use app::{router, AppState};
