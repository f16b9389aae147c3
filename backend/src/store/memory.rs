//! In-process ledger store
//!
//! Mirrors the PostgreSQL contract without a database: one async mutex per
//! stock record plays the part of the row lock, and a transaction stages its
//! writes privately until commit publishes them under a single write lock.
//! Used for tests and for embedding the engine without PostgreSQL.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{AlertFilter, AlertView, NewMovement, StockKey, StockMovement, StockRecord};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{LedgerStore, LedgerTx};
use crate::error::{commit_error, AppError, AppResult};

/// Committed state
#[derive(Default)]
struct State {
    records: HashMap<Uuid, StockRecord>,
    active_keys: HashMap<StockKey, Uuid>,
    movements: HashMap<Uuid, StockMovement>,
    /// Movement ids per record, in ledger order
    ledger: HashMap<Uuid, Vec<Uuid>>,
}

impl State {
    fn active_record(&self, id: Uuid) -> Option<&StockRecord> {
        self.records.get(&id).filter(|r| !r.is_annulled())
    }

    fn movements_of(&self, record_id: Uuid) -> Vec<StockMovement> {
        self.ledger
            .get(&record_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.movements.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }
}

struct Inner {
    state: RwLock<State>,
    record_locks: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
    next_sequence: AtomicI64,
    injected_faults: AtomicU32,
    lost_acks: AtomicU32,
}

impl Inner {
    fn read(&self) -> AppResult<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| AppError::Internal("ledger state lock poisoned".to_string()))
    }

    fn write(&self) -> AppResult<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| AppError::Internal("ledger state lock poisoned".to_string()))
    }

    fn record_lock(&self, id: Uuid) -> AppResult<Arc<AsyncMutex<()>>> {
        let mut locks = self
            .record_locks
            .lock()
            .map_err(|_| AppError::Internal("record lock table poisoned".to_string()))?;
        Ok(locks.entry(id).or_default().clone())
    }

    /// Consume one injected fault, if any are pending
    fn take_fault(&self) -> bool {
        take_one(&self.injected_faults)
    }

    fn take_lost_ack(&self) -> bool {
        take_one(&self.lost_acks)
    }
}

fn take_one(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// Ledger store kept entirely in memory
#[derive(Clone)]
pub struct MemoryLedgerStore {
    inner: Arc<Inner>,
}

impl Default for MemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(State::default()),
                record_locks: Mutex::new(HashMap::new()),
                next_sequence: AtomicI64::new(1),
                injected_faults: AtomicU32::new(0),
                lost_acks: AtomicU32::new(0),
            }),
        }
    }

    /// Make the next `count` commits abort before publishing anything, the
    /// way a serialization failure rolls a transaction back
    pub fn inject_transient_faults(&self, count: u32) {
        self.inner.injected_faults.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` commits publish their writes and then report a
    /// dropped connection, as when the server commits but the reply is lost
    pub fn inject_lost_commit_acks(&self, count: u32) {
        self.inner.lost_acks.store(count, Ordering::SeqCst);
    }

    /// Overwrite a record's quantity without touching the ledger.
    ///
    /// Only exists to let reconciliation checks be exercised against drift.
    pub fn corrupt_quantity(&self, id: Uuid, quantity: i64) -> AppResult<()> {
        let mut state = self.inner.write()?;
        let record = state
            .records
            .get_mut(&id)
            .ok_or_else(|| AppError::RecordNotFound(id.to_string()))?;
        record.quantity = quantity;
        Ok(())
    }

    /// Run `f` on an active record while holding its lock
    async fn update_active<F>(&self, id: Uuid, f: F) -> AppResult<StockRecord>
    where
        F: FnOnce(&mut StockRecord),
    {
        let lock = self.inner.record_lock(id)?;
        let _guard = lock.lock().await;

        let mut state = self.inner.write()?;
        let record = state
            .records
            .get_mut(&id)
            .filter(|r| !r.is_annulled())
            .ok_or_else(|| AppError::RecordNotFound(id.to_string()))?;
        f(&mut *record);
        let updated = record.clone();

        if updated.is_annulled() {
            state.active_keys.remove(&updated.key);
        }
        Ok(updated)
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn begin(&self) -> AppResult<Box<dyn LedgerTx>> {
        Ok(Box::new(MemoryTx {
            inner: self.inner.clone(),
            guards: HashMap::new(),
            staged_records: HashMap::new(),
            staged_movements: Vec::new(),
            staged_reversals: Vec::new(),
        }))
    }

    async fn get_record(&self, id: Uuid) -> AppResult<Option<StockRecord>> {
        Ok(self.inner.read()?.records.get(&id).cloned())
    }

    async fn find_record(&self, key: &StockKey) -> AppResult<Option<StockRecord>> {
        let state = self.inner.read()?;
        Ok(state
            .active_keys
            .get(key)
            .and_then(|id| state.records.get(id))
            .cloned())
    }

    async fn create_record(&self, record: StockRecord) -> AppResult<StockRecord> {
        let mut state = self.inner.write()?;
        if state.active_keys.contains_key(&record.key) || state.records.contains_key(&record.id)
        {
            return Err(AppError::DuplicateRecord);
        }
        state.active_keys.insert(record.key, record.id);
        state.records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn annul_record(
        &self,
        id: Uuid,
        actor_id: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<StockRecord> {
        self.update_active(id, |record| {
            record.annulled_at = Some(at);
            record.annulled_by = Some(actor_id);
            record.modified_at = Some(at);
            record.modified_by = Some(actor_id);
        })
        .await
    }

    async fn set_min_quantity(
        &self,
        id: Uuid,
        min_quantity: i64,
        actor_id: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<StockRecord> {
        self.update_active(id, |record| {
            record.min_quantity = min_quantity;
            record.modified_at = Some(at);
            record.modified_by = Some(actor_id);
        })
        .await
    }

    async fn get_movement(&self, id: Uuid) -> AppResult<Option<StockMovement>> {
        Ok(self.inner.read()?.movements.get(&id).cloned())
    }

    async fn list_movements(&self, record_id: Uuid) -> AppResult<Vec<StockMovement>> {
        Ok(self.inner.read()?.movements_of(record_id))
    }

    async fn ledger_snapshot(
        &self,
        record_id: Uuid,
    ) -> AppResult<Option<(StockRecord, Vec<StockMovement>)>> {
        let state = self.inner.read()?;
        Ok(state
            .records
            .get(&record_id)
            .map(|record| (record.clone(), state.movements_of(record_id))))
    }

    async fn active_record_ids(&self) -> AppResult<Vec<Uuid>> {
        let state = self.inner.read()?;
        let mut records: Vec<&StockRecord> =
            state.records.values().filter(|r| !r.is_annulled()).collect();
        records.sort_by_key(|r| r.key);
        Ok(records.into_iter().map(|r| r.id).collect())
    }

    async fn scan_alerts(
        &self,
        filter: &AlertFilter,
        after: Option<StockKey>,
        limit: u32,
    ) -> AppResult<Vec<AlertView>> {
        let state = self.inner.read()?;
        let mut views: Vec<AlertView> = state
            .records
            .values()
            .filter(|r| !r.is_annulled())
            .filter(|r| after.map_or(true, |cursor| r.key > cursor))
            .filter_map(AlertView::from_record)
            .filter(|view| filter.matches(view))
            .collect();

        views.sort_by_key(|v| v.key);
        views.truncate(limit as usize);
        Ok(views)
    }

    async fn ping(&self) -> AppResult<()> {
        self.inner.read().map(|_| ())
    }
}

/// An open in-memory transaction
pub struct MemoryTx {
    inner: Arc<Inner>,
    guards: HashMap<Uuid, OwnedMutexGuard<()>>,
    staged_records: HashMap<Uuid, StockRecord>,
    staged_movements: Vec<StockMovement>,
    staged_reversals: Vec<(Uuid, Uuid, DateTime<Utc>)>,
}

impl MemoryTx {
    async fn acquire(&mut self, id: Uuid) -> AppResult<()> {
        if self.guards.contains_key(&id) {
            return Ok(());
        }
        let lock = self.inner.record_lock(id)?;
        let guard = lock.lock_owned().await;
        self.guards.insert(id, guard);
        Ok(())
    }

    /// The record as this transaction sees it, active only
    fn visible_record(&self, id: Uuid) -> AppResult<Option<StockRecord>> {
        if let Some(staged) = self.staged_records.get(&id) {
            return Ok(Some(staged.clone()));
        }
        Ok(self.inner.read()?.active_record(id).cloned())
    }

    fn visible_movement(&self, id: Uuid) -> AppResult<Option<StockMovement>> {
        if let Some(staged) = self.staged_movements.iter().find(|m| m.id == id) {
            return Ok(Some(staged.clone()));
        }
        let mut movement = self.inner.read()?.movements.get(&id).cloned();
        if let Some(m) = movement.as_mut() {
            if let Some((_, by, at)) = self.staged_reversals.iter().find(|(mid, _, _)| *mid == id) {
                m.reversed = true;
                m.reversed_by = Some(*by);
                m.reversed_at = Some(*at);
            }
        }
        Ok(movement)
    }

    fn require_lock(&self, record_id: Uuid) -> AppResult<()> {
        if self.guards.contains_key(&record_id) {
            Ok(())
        } else {
            Err(AppError::Internal(format!(
                "record {} written without holding its lock",
                record_id
            )))
        }
    }
}

#[async_trait]
impl LedgerTx for MemoryTx {
    async fn lock_record(&mut self, key: &StockKey) -> AppResult<Option<StockRecord>> {
        let id = {
            let state = self.inner.read()?;
            state.active_keys.get(key).copied()
        };
        let Some(id) = id else {
            return Ok(None);
        };
        self.acquire(id).await?;
        // The record may have been annulled while we waited for the lock
        Ok(self.visible_record(id)?.filter(|r| r.key == *key))
    }

    async fn lock_record_by_id(&mut self, id: Uuid) -> AppResult<Option<StockRecord>> {
        let active = {
            let state = self.inner.read()?;
            state.active_record(id).is_some()
        };
        if !active {
            return Ok(None);
        }
        self.acquire(id).await?;
        self.visible_record(id)
    }

    async fn lock_movement(&mut self, id: Uuid) -> AppResult<Option<StockMovement>> {
        let record_id = match self.visible_movement(id)? {
            Some(m) => m.record_id,
            None => return Ok(None),
        };
        // Reversal flags only change under the owning record's lock
        self.acquire(record_id).await?;
        self.visible_movement(id)
    }

    async fn update_quantity(
        &mut self,
        record_id: Uuid,
        quantity: i64,
        actor_id: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        self.require_lock(record_id)?;
        let mut record = self
            .visible_record(record_id)?
            .ok_or_else(|| AppError::RecordNotFound(record_id.to_string()))?;
        record.quantity = quantity;
        record.modified_at = Some(at);
        record.modified_by = Some(actor_id);
        self.staged_records.insert(record_id, record);
        Ok(())
    }

    async fn append_movement(&mut self, movement: NewMovement) -> AppResult<StockMovement> {
        self.require_lock(movement.record_id)?;
        let sequence = self.inner.next_sequence.fetch_add(1, Ordering::SeqCst);
        let movement = movement.into_movement(sequence);
        self.staged_movements.push(movement.clone());
        Ok(movement)
    }

    async fn mark_reversed(
        &mut self,
        movement_id: Uuid,
        reversed_by: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        let movement = self
            .visible_movement(movement_id)?
            .ok_or(AppError::MovementNotFound(movement_id))?;
        self.require_lock(movement.record_id)?;
        if movement.reversed {
            return Err(AppError::AlreadyReversed(movement_id));
        }
        self.staged_reversals.push((movement_id, reversed_by, at));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        if self.inner.take_fault() {
            return Err(AppError::DatabaseError(sqlx::Error::PoolTimedOut));
        }

        let MemoryTx {
            inner,
            guards,
            staged_records,
            staged_movements,
            staged_reversals,
        } = *self;

        {
            let mut state = inner.write()?;
            for (id, record) in staged_records {
                state.records.insert(id, record);
            }
            for movement in staged_movements {
                state
                    .ledger
                    .entry(movement.record_id)
                    .or_default()
                    .push(movement.id);
                state.movements.insert(movement.id, movement);
            }
            for (id, by, at) in staged_reversals {
                if let Some(m) = state.movements.get_mut(&id) {
                    m.reversed = true;
                    m.reversed_by = Some(by);
                    m.reversed_at = Some(at);
                }
            }
        }

        // Locks are released only after the writes are visible
        drop(guards);

        if inner.take_lost_ack() {
            let reset = std::io::Error::from(std::io::ErrorKind::ConnectionReset);
            return Err(commit_error(sqlx::Error::Io(reset)));
        }
        Ok(())
    }
}
