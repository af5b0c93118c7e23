// Application layer - use cases and orchestration.
// The service keeps the in-memory ledger and its SQLite copy in step.

pub mod error;
pub mod service;

pub use error::*;
pub use service::*;
