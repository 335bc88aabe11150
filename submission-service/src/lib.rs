pub mod app;
pub mod assignment_handlers;
pub mod config;
pub mod directory;
pub mod memory_store;
pub mod pg_store;
pub mod store;
pub mod submission_handlers;
pub mod sweeper;

pub use app::{router, AppState};
pub use sweeper::{OrphanSweeper, SweepReport, SweeperHandle};
