//! Shared types and models for the Optica inventory ledger
//!
//! This crate holds the domain vocabulary used by the backend: stock records,
//! ledger movements, alert classification and the pure validation/replay rules
//! that do not need a database.

pub mod models;
pub mod replay;
pub mod types;
pub mod validation;

pub use models::*;
pub use replay::*;
pub use types::*;
pub use validation::*;
