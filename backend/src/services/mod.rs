//! Ledger services
//!
//! The engine components, each a thin cloneable handle over a shared
//! [`LedgerStore`](crate::store::LedgerStore).

pub mod alerts;
pub mod ledger;
pub mod reconciliation;
pub mod retry;
pub mod reversal;
pub mod stock;

pub use alerts::{AlertClassifier, AlertPager};
pub use ledger::MovementLedger;
pub use reconciliation::ReconciliationEngine;
pub use reversal::ReversalCoordinator;
pub use stock::StockService;
