//! Domain models for the Optica inventory ledger

mod actor;
mod alert;
mod movement;
mod stock;

pub use actor::*;
pub use alert::*;
pub use movement::*;
pub use stock::*;
