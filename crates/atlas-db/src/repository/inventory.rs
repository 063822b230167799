//! # Inventory Ledger
//!
//! The single authority over the `available` / `reserved` stock counters.
//!
//! ## Ledger Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Inventory Ledger                                   │
//! │                                                                         │
//! │  reserve(items)   all-or-nothing hold:                                 │
//! │                   available -= q, reserved += q   per variant          │
//! │                                                                         │
//! │  commit(order)    payment succeeded - make the hold permanent:         │
//! │                   reserved -= q      (available stays decremented)     │
//! │                                                                         │
//! │  release(order)   payment failed / abandoned - undo the hold:          │
//! │                   available += q, reserved -= q                        │
//! │                                                                         │
//! │  Concurrency rule: every mutation is a single CONDITIONAL update       │
//! │  (compare-and-decrement), never a read-then-write pair. Two            │
//! │  simultaneous checkouts on the last unit are arbitrated by SQLite's    │
//! │  row update, not by application reads.                                 │
//! │                                                                         │
//! │  Idempotency rule: commit/release are gated by the order-scoped        │
//! │  stock_state flag, flipped in the same transaction as the counter      │
//! │  updates. Whoever loses the flip is a no-op; the counters are          │
//! │  touched at most once per order, ever.                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All three operations run inside a caller-supplied transaction so the
//! order row and the counters it touches commit or roll back together.
//! Standalone wrappers are provided for callers without one.

use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::debug;

use crate::error::{DbError, DbResult};

// =============================================================================
// Stock Lines
// =============================================================================

/// One variant/quantity pair of a reservation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockLine {
    pub variant_id: String,
    pub quantity: i64,
}

impl StockLine {
    pub fn new(variant_id: impl Into<String>, quantity: i64) -> Self {
        StockLine {
            variant_id: variant_id.into(),
            quantity,
        }
    }
}

// =============================================================================
// Inventory Ledger
// =============================================================================

/// Repository for the stock counters.
///
/// Nothing else in the system mutates `variants.available` or
/// `variants.reserved` (restocking goes through [`super::variant`]'s
/// delta update, which only ever adds to `available`).
#[derive(Debug, Clone)]
pub struct InventoryLedger {
    pool: SqlitePool,
}

impl InventoryLedger {
    /// Creates a new InventoryLedger.
    pub fn new(pool: SqlitePool) -> Self {
        InventoryLedger { pool }
    }

    // -------------------------------------------------------------------------
    // Reserve
    // -------------------------------------------------------------------------

    /// Reserves stock for every line, all-or-nothing, inside `tx`.
    ///
    /// Each line is one conditional update:
    ///
    /// ```sql
    /// UPDATE variants
    /// SET available = available - q, reserved = reserved + q
    /// WHERE id = ? AND is_active = 1 AND available >= q
    /// ```
    ///
    /// A line whose guard matches no row aborts with
    /// [`DbError::InsufficientStock`]; the caller's transaction rolls back,
    /// which undoes every earlier line of the same call. There is no
    /// partial reservation.
    ///
    /// Not retried automatically: the buyer re-validates and retries.
    pub async fn reserve_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        lines: &[StockLine],
    ) -> DbResult<()> {
        let now = chrono::Utc::now();

        for line in lines {
            let result = sqlx::query(
                r#"
                UPDATE variants
                SET available = available - ?1,
                    reserved = reserved + ?1,
                    updated_at = ?2
                WHERE id = ?3 AND is_active = 1 AND available >= ?1
                "#,
            )
            .bind(line.quantity)
            .bind(now)
            .bind(&line.variant_id)
            .execute(&mut **tx)
            .await?;

            if result.rows_affected() == 0 {
                // The guard failed: either the variant is gone or the
                // stock ran out. Read the counter for the error detail;
                // the transaction is rolled back by the caller either way.
                let available: Option<i64> =
                    sqlx::query_scalar("SELECT available FROM variants WHERE id = ?1 AND is_active = 1")
                        .bind(&line.variant_id)
                        .fetch_optional(&mut **tx)
                        .await?;

                return match available {
                    Some(available) => {
                        debug!(
                            variant_id = %line.variant_id,
                            available,
                            requested = line.quantity,
                            "Reservation rejected"
                        );
                        Err(DbError::insufficient_stock(
                            &line.variant_id,
                            available,
                            line.quantity,
                        ))
                    }
                    None => Err(DbError::not_found("Variant", &line.variant_id)),
                };
            }
        }

        debug!(lines = lines.len(), "Stock reserved");
        Ok(())
    }

    /// Standalone reserve: opens its own transaction.
    pub async fn reserve(&self, lines: &[StockLine]) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        self.reserve_tx(&mut tx, lines).await?;
        tx.commit().await?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Commit
    // -------------------------------------------------------------------------

    /// Converts an order's reservation into a permanent decrement,
    /// inside `tx`.
    ///
    /// Gated by flipping `orders.stock_state` from `reserved` to
    /// `committed`; if the flip matches no row the order's stock was
    /// already committed or released and the call is a no-op.
    ///
    /// Returns whether the counters were actually moved.
    pub async fn commit_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        order_id: &str,
        lines: &[StockLine],
    ) -> DbResult<bool> {
        let now = chrono::Utc::now();

        let flipped = sqlx::query(
            r#"
            UPDATE orders
            SET stock_state = 'committed', updated_at = ?1
            WHERE id = ?2 AND stock_state = 'reserved'
            "#,
        )
        .bind(now)
        .bind(order_id)
        .execute(&mut **tx)
        .await?;

        if flipped.rows_affected() == 0 {
            debug!(order_id = %order_id, "Stock commit skipped (not in reserved state)");
            return Ok(false);
        }

        for line in lines {
            sqlx::query(
                r#"
                UPDATE variants
                SET reserved = reserved - ?1, updated_at = ?2
                WHERE id = ?3
                "#,
            )
            .bind(line.quantity)
            .bind(now)
            .bind(&line.variant_id)
            .execute(&mut **tx)
            .await?;
        }

        debug!(order_id = %order_id, lines = lines.len(), "Stock committed");
        Ok(true)
    }

    /// Standalone commit: opens its own transaction.
    pub async fn commit(&self, order_id: &str, lines: &[StockLine]) -> DbResult<bool> {
        let mut tx = self.pool.begin().await?;
        let moved = self.commit_tx(&mut tx, order_id, lines).await?;
        tx.commit().await?;
        Ok(moved)
    }

    // -------------------------------------------------------------------------
    // Release
    // -------------------------------------------------------------------------

    /// Returns an order's reserved quantities back to `available`,
    /// inside `tx`.
    ///
    /// Gated the same way as [`Self::commit_tx`]: the flip from
    /// `reserved` to `released` happens at most once, so releasing an
    /// order whose stock was never reserved, already released, or
    /// already committed is a safe no-op.
    ///
    /// Returns whether the counters were actually moved.
    pub async fn release_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        order_id: &str,
        lines: &[StockLine],
    ) -> DbResult<bool> {
        let now = chrono::Utc::now();

        let flipped = sqlx::query(
            r#"
            UPDATE orders
            SET stock_state = 'released', updated_at = ?1
            WHERE id = ?2 AND stock_state = 'reserved'
            "#,
        )
        .bind(now)
        .bind(order_id)
        .execute(&mut **tx)
        .await?;

        if flipped.rows_affected() == 0 {
            debug!(order_id = %order_id, "Stock release skipped (not in reserved state)");
            return Ok(false);
        }

        for line in lines {
            sqlx::query(
                r#"
                UPDATE variants
                SET available = available + ?1,
                    reserved = reserved - ?1,
                    updated_at = ?2
                WHERE id = ?3
                "#,
            )
            .bind(line.quantity)
            .bind(now)
            .bind(&line.variant_id)
            .execute(&mut **tx)
            .await?;
        }

        debug!(order_id = %order_id, lines = lines.len(), "Stock released");
        Ok(true)
    }

    /// Standalone release: opens its own transaction.
    pub async fn release(&self, order_id: &str, lines: &[StockLine]) -> DbResult<bool> {
        let mut tx = self.pool.begin().await?;
        let moved = self.release_tx(&mut tx, order_id, lines).await?;
        tx.commit().await?;
        Ok(moved)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
