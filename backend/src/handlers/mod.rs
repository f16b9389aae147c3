//! HTTP handlers

pub mod alerts;
pub mod health;
pub mod movements;
pub mod reconciliation;
pub mod stock;

pub use alerts::*;
pub use health::*;
pub use movements::*;
pub use reconciliation::*;
pub use stock::*;
