//! Remote reads of facts owned by peer services.

pub mod directory;
pub mod error;
pub mod fetcher;
pub mod model;

pub use directory::{ClassDirectory, ClassServiceClient, CLASS_SERVICE};
pub use error::{FactError, FactResult};
pub use fetcher::{FactFetcher, DEFAULT_TIMEOUT};
pub use model::{ClassRoster, FactKind, SubjectFact};
