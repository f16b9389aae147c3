//! PostgreSQL ledger store
//!
//! Per-record serialization comes from `SELECT ... FOR UPDATE` row locks held
//! for the life of the transaction. Writers on different records never touch
//! the same row and do not block each other.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{
    AlertFilter, AlertStatus, AlertView, NewMovement, StockKey, StockMovement, StockRecord,
};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{LedgerStore, LedgerTx};
use crate::error::{commit_error, AppError, AppResult};

macro_rules! record_columns {
    () => {
        "id, product_id, branch_id, color_id, brand_id, quantity, min_quantity, \
         created_at, created_by, modified_at, modified_by, annulled_at, annulled_by"
    };
}

macro_rules! movement_columns {
    () => {
        "id, ledger_seq, record_id, kind, delta, quantity_after, reason, actor_id, \
         created_at, reversed, reversed_by, reversed_at, reversal_of"
    };
}

/// Row for the stock_records table
#[derive(Debug, FromRow)]
struct RecordRow {
    id: Uuid,
    product_id: Uuid,
    branch_id: Uuid,
    color_id: Uuid,
    brand_id: Uuid,
    quantity: i64,
    min_quantity: i64,
    created_at: DateTime<Utc>,
    created_by: Uuid,
    modified_at: Option<DateTime<Utc>>,
    modified_by: Option<Uuid>,
    annulled_at: Option<DateTime<Utc>>,
    annulled_by: Option<Uuid>,
}

impl From<RecordRow> for StockRecord {
    fn from(r: RecordRow) -> Self {
        StockRecord {
            id: r.id,
            key: StockKey::new(r.product_id, r.branch_id, r.color_id, r.brand_id),
            quantity: r.quantity,
            min_quantity: r.min_quantity,
            created_at: r.created_at,
            created_by: r.created_by,
            modified_at: r.modified_at,
            modified_by: r.modified_by,
            annulled_at: r.annulled_at,
            annulled_by: r.annulled_by,
        }
    }
}

/// Row for the stock_movements table
#[derive(Debug, FromRow)]
struct MovementRow {
    id: Uuid,
    ledger_seq: i64,
    record_id: Uuid,
    kind: String,
    delta: i64,
    quantity_after: i64,
    reason: String,
    actor_id: Uuid,
    created_at: DateTime<Utc>,
    reversed: bool,
    reversed_by: Option<Uuid>,
    reversed_at: Option<DateTime<Utc>>,
    reversal_of: Option<Uuid>,
}

impl TryFrom<MovementRow> for StockMovement {
    type Error = AppError;

    fn try_from(r: MovementRow) -> Result<Self, Self::Error> {
        let kind = r.kind.parse().map_err(AppError::Internal)?;
        Ok(StockMovement {
            id: r.id,
            sequence: r.ledger_seq,
            record_id: r.record_id,
            kind,
            delta: r.delta,
            quantity_after: r.quantity_after,
            reason: r.reason,
            actor_id: r.actor_id,
            created_at: r.created_at,
            reversed: r.reversed,
            reversed_by: r.reversed_by,
            reversed_at: r.reversed_at,
            reversal_of: r.reversal_of,
        })
    }
}

fn into_movements(rows: Vec<MovementRow>) -> AppResult<Vec<StockMovement>> {
    rows.into_iter().map(StockMovement::try_from).collect()
}

/// Ledger store backed by PostgreSQL
#[derive(Clone)]
pub struct PgLedgerStore {
    db: PgPool,
}

impl PgLedgerStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub fn pool(&self) -> &PgPool {
        &self.db
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn begin(&self) -> AppResult<Box<dyn LedgerTx>> {
        let tx = self.db.begin().await?;
        Ok(Box::new(PgLedgerTx { tx }))
    }

    async fn get_record(&self, id: Uuid) -> AppResult<Option<StockRecord>> {
        let row = sqlx::query_as::<_, RecordRow>(concat!(
            "SELECT ",
            record_columns!(),
            " FROM stock_records WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(StockRecord::from))
    }

    async fn find_record(&self, key: &StockKey) -> AppResult<Option<StockRecord>> {
        let row = sqlx::query_as::<_, RecordRow>(concat!(
            "SELECT ",
            record_columns!(),
            " FROM stock_records
              WHERE product_id = $1 AND branch_id = $2 AND color_id = $3 AND brand_id = $4
                AND annulled_at IS NULL"
        ))
        .bind(key.product_id)
        .bind(key.branch_id)
        .bind(key.color_id)
        .bind(key.brand_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(StockRecord::from))
    }

    async fn create_record(&self, record: StockRecord) -> AppResult<StockRecord> {
        let row = sqlx::query_as::<_, RecordRow>(concat!(
            "INSERT INTO stock_records
                (id, product_id, branch_id, color_id, brand_id, quantity, min_quantity,
                 created_at, created_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING ",
            record_columns!()
        ))
        .bind(record.id)
        .bind(record.key.product_id)
        .bind(record.key.branch_id)
        .bind(record.key.color_id)
        .bind(record.key.brand_id)
        .bind(record.quantity)
        .bind(record.min_quantity)
        .bind(record.created_at)
        .bind(record.created_by)
        .fetch_one(&self.db)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return AppError::DuplicateRecord;
                }
            }
            e.into()
        })?;

        Ok(row.into())
    }

    async fn annul_record(
        &self,
        id: Uuid,
        actor_id: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<StockRecord> {
        let row = sqlx::query_as::<_, RecordRow>(concat!(
            "UPDATE stock_records
             SET annulled_at = $2, annulled_by = $3, modified_at = $2, modified_by = $3
             WHERE id = $1 AND annulled_at IS NULL
             RETURNING ",
            record_columns!()
        ))
        .bind(id)
        .bind(at)
        .bind(actor_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::RecordNotFound(id.to_string()))?;

        Ok(row.into())
    }

    async fn set_min_quantity(
        &self,
        id: Uuid,
        min_quantity: i64,
        actor_id: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<StockRecord> {
        let row = sqlx::query_as::<_, RecordRow>(concat!(
            "UPDATE stock_records
             SET min_quantity = $2, modified_at = $3, modified_by = $4
             WHERE id = $1 AND annulled_at IS NULL
             RETURNING ",
            record_columns!()
        ))
        .bind(id)
        .bind(min_quantity)
        .bind(at)
        .bind(actor_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::RecordNotFound(id.to_string()))?;

        Ok(row.into())
    }

    async fn get_movement(&self, id: Uuid) -> AppResult<Option<StockMovement>> {
        let row = sqlx::query_as::<_, MovementRow>(concat!(
            "SELECT ",
            movement_columns!(),
            " FROM stock_movements WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        row.map(StockMovement::try_from).transpose()
    }

    async fn list_movements(&self, record_id: Uuid) -> AppResult<Vec<StockMovement>> {
        let rows = sqlx::query_as::<_, MovementRow>(concat!(
            "SELECT ",
            movement_columns!(),
            " FROM stock_movements WHERE record_id = $1 ORDER BY ledger_seq"
        ))
        .bind(record_id)
        .fetch_all(&self.db)
        .await?;

        into_movements(rows)
    }

    async fn ledger_snapshot(
        &self,
        record_id: Uuid,
    ) -> AppResult<Option<(StockRecord, Vec<StockMovement>)>> {
        let mut tx = self.db.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;

        let record = sqlx::query_as::<_, RecordRow>(concat!(
            "SELECT ",
            record_columns!(),
            " FROM stock_records WHERE id = $1"
        ))
        .bind(record_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(record) = record else {
            return Ok(None);
        };

        let rows = sqlx::query_as::<_, MovementRow>(concat!(
            "SELECT ",
            movement_columns!(),
            " FROM stock_movements WHERE record_id = $1 ORDER BY ledger_seq"
        ))
        .bind(record_id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some((record.into(), into_movements(rows)?)))
    }

    async fn active_record_ids(&self) -> AppResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id FROM stock_records
            WHERE annulled_at IS NULL
            ORDER BY branch_id, product_id, color_id, brand_id
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(ids)
    }

    async fn scan_alerts(
        &self,
        filter: &AlertFilter,
        after: Option<StockKey>,
        limit: u32,
    ) -> AppResult<Vec<AlertView>> {
        if filter.status == Some(AlertStatus::Normal) {
            return Ok(Vec::new());
        }

        // quantity <= min_quantity covers both "bajo" and "agotado" since
        // min_quantity is never negative
        let rows = sqlx::query_as::<_, RecordRow>(concat!(
            "SELECT ",
            record_columns!(),
            " FROM stock_records
              WHERE annulled_at IS NULL
                AND quantity <= min_quantity
                AND ($1::uuid IS NULL OR branch_id = $1)
                AND ($2::uuid IS NULL OR product_id = $2)
                AND ($3::text IS NULL
                     OR ($3 = 'agotado' AND quantity = 0)
                     OR ($3 = 'bajo' AND quantity > 0))
                AND ($4::uuid IS NULL
                     OR (branch_id, product_id, color_id, brand_id)
                        > ($4::uuid, $5::uuid, $6::uuid, $7::uuid))
              ORDER BY branch_id, product_id, color_id, brand_id
              LIMIT $8"
        ))
        .bind(filter.branch_id)
        .bind(filter.product_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(after.map(|k| k.branch_id))
        .bind(after.map(|k| k.product_id))
        .bind(after.map(|k| k.color_id))
        .bind(after.map(|k| k.brand_id))
        .bind(i64::from(limit))
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(StockRecord::from)
            .filter_map(|record| AlertView::from_record(&record))
            .collect())
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }
}

/// An open PostgreSQL transaction. Dropping it rolls back.
pub struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
    async fn lock_record(&mut self, key: &StockKey) -> AppResult<Option<StockRecord>> {
        let row = sqlx::query_as::<_, RecordRow>(concat!(
            "SELECT ",
            record_columns!(),
            " FROM stock_records
              WHERE product_id = $1 AND branch_id = $2 AND color_id = $3 AND brand_id = $4
                AND annulled_at IS NULL
              FOR UPDATE"
        ))
        .bind(key.product_id)
        .bind(key.branch_id)
        .bind(key.color_id)
        .bind(key.brand_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(StockRecord::from))
    }

    async fn lock_record_by_id(&mut self, id: Uuid) -> AppResult<Option<StockRecord>> {
        let row = sqlx::query_as::<_, RecordRow>(concat!(
            "SELECT ",
            record_columns!(),
            " FROM stock_records WHERE id = $1 AND annulled_at IS NULL FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(StockRecord::from))
    }

    async fn lock_movement(&mut self, id: Uuid) -> AppResult<Option<StockMovement>> {
        let row = sqlx::query_as::<_, MovementRow>(concat!(
            "SELECT ",
            movement_columns!(),
            " FROM stock_movements WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(StockMovement::try_from).transpose()
    }

    async fn update_quantity(
        &mut self,
        record_id: Uuid,
        quantity: i64,
        actor_id: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE stock_records
            SET quantity = $2, modified_at = $3, modified_by = $4
            WHERE id = $1 AND annulled_at IS NULL
            "#,
        )
        .bind(record_id)
        .bind(quantity)
        .bind(at)
        .bind(actor_id)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::RecordNotFound(record_id.to_string()));
        }
        Ok(())
    }

    async fn append_movement(&mut self, movement: NewMovement) -> AppResult<StockMovement> {
        let row = sqlx::query_as::<_, MovementRow>(concat!(
            "INSERT INTO stock_movements
                (id, record_id, kind, delta, quantity_after, reason, actor_id, created_at,
                 reversal_of)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING ",
            movement_columns!()
        ))
        .bind(movement.id)
        .bind(movement.record_id)
        .bind(movement.kind.as_str())
        .bind(movement.delta)
        .bind(movement.quantity_after)
        .bind(&movement.reason)
        .bind(movement.actor_id)
        .bind(movement.created_at)
        .bind(movement.reversal_of)
        .fetch_one(&mut *self.tx)
        .await?;

        row.try_into()
    }

    async fn mark_reversed(
        &mut self,
        movement_id: Uuid,
        reversed_by: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE stock_movements
            SET reversed = TRUE, reversed_by = $2, reversed_at = $3
            WHERE id = $1 AND reversed = FALSE
            "#,
        )
        .bind(movement_id)
        .bind(reversed_by)
        .bind(at)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::AlreadyReversed(movement_id));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await.map_err(commit_error)
    }
}
