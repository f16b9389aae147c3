//! Persistence seam for the ledger
//!
//! The engine never holds state of its own. Everything it needs from storage is
//! expressed by two traits:
//!
//! - [`LedgerStore`] for plain reads and the simple record lifecycle
//!   (create / annul / threshold changes).
//! - [`LedgerTx`] for one atomic unit of work. Locks taken through a `LedgerTx`
//!   are scoped to a single stock record and held until the transaction is
//!   committed or dropped. Dropping a transaction without committing discards
//!   every staged write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{AlertFilter, AlertView, NewMovement, StockKey, StockMovement, StockRecord};
use uuid::Uuid;

use crate::error::AppResult;

pub mod memory;
pub mod postgres;

pub use memory::MemoryLedgerStore;
pub use postgres::PgLedgerStore;

/// Read access and record lifecycle
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Open a transaction
    async fn begin(&self) -> AppResult<Box<dyn LedgerTx>>;

    /// Fetch a record by id, annulled or not
    async fn get_record(&self, id: Uuid) -> AppResult<Option<StockRecord>>;

    /// Fetch the active record for a composite key
    async fn find_record(&self, key: &StockKey) -> AppResult<Option<StockRecord>>;

    /// Insert a new record. Fails with `DuplicateRecord` when an active record
    /// already holds the key.
    async fn create_record(&self, record: StockRecord) -> AppResult<StockRecord>;

    /// Soft-annul an active record. Fails with `RecordNotFound` when the record
    /// is unknown or already annulled.
    async fn annul_record(
        &self,
        id: Uuid,
        actor_id: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<StockRecord>;

    /// Change the alert threshold of an active record
    async fn set_min_quantity(
        &self,
        id: Uuid,
        min_quantity: i64,
        actor_id: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<StockRecord>;

    async fn get_movement(&self, id: Uuid) -> AppResult<Option<StockMovement>>;

    /// Movements of one record in ledger order
    async fn list_movements(&self, record_id: Uuid) -> AppResult<Vec<StockMovement>>;

    /// A record together with its whole ledger, read from one consistent
    /// snapshot
    async fn ledger_snapshot(
        &self,
        record_id: Uuid,
    ) -> AppResult<Option<(StockRecord, Vec<StockMovement>)>>;

    /// Ids of every active record
    async fn active_record_ids(&self) -> AppResult<Vec<Uuid>>;

    /// Active records in alert, ordered by (branch, product, color, brand),
    /// strictly after `after` when given
    async fn scan_alerts(
        &self,
        filter: &AlertFilter,
        after: Option<StockKey>,
        limit: u32,
    ) -> AppResult<Vec<AlertView>>;

    /// Connectivity check
    async fn ping(&self) -> AppResult<()>;
}

/// One atomic unit of ledger work
#[async_trait]
pub trait LedgerTx: Send {
    /// Lock and read the active record for a key
    async fn lock_record(&mut self, key: &StockKey) -> AppResult<Option<StockRecord>>;

    /// Lock and read an active record by id
    async fn lock_record_by_id(&mut self, id: Uuid) -> AppResult<Option<StockRecord>>;

    /// Lock and read a movement so its reversal flag can be updated
    async fn lock_movement(&mut self, id: Uuid) -> AppResult<Option<StockMovement>>;

    /// Write a new quantity to a record locked by this transaction
    async fn update_quantity(
        &mut self,
        record_id: Uuid,
        quantity: i64,
        actor_id: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<()>;

    /// Append a ledger entry; the store assigns its sequence number
    async fn append_movement(&mut self, movement: NewMovement) -> AppResult<StockMovement>;

    /// Flag a movement as reversed by `reversed_by`. Fails with
    /// `AlreadyReversed` if the flag is already set.
    async fn mark_reversed(
        &mut self,
        movement_id: Uuid,
        reversed_by: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<()>;

    /// Make every staged write visible at once
    async fn commit(self: Box<Self>) -> AppResult<()>;
}
