//! # Payment Repository
//!
//! Database operations for payments.
//!
//! ## Payment Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Payment Rules                                    │
//! │                                                                         │
//! │  • At most ONE non-terminal payment per order at any time.             │
//! │    Retrying first cancels the open payment, then inserts a fresh       │
//! │    row — in the same transaction.                                       │
//! │                                                                         │
//! │  • Terminal writes (paid/failed/cancelled) are guarded updates:        │
//! │    WHERE status IN ('unpaid', 'pending'). Zero rows affected means     │
//! │    another writer got there first — the caller re-reads and returns    │
//! │    the recorded outcome instead of double-applying.                    │
//! │                                                                         │
//! │  • Rows are NEVER deleted. The table doubles as the audit history,     │
//! │    and each row carries an append-only note of its transitions.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use atlas_core::{Payment, PaymentStatus};

/// All payment columns, shared by the read queries.
const PAYMENT_COLUMNS: &str = "id, order_id, method, status, amount_cents, currency, \
     intent_id, capture_id, paid_at, note, created_at, updated_at";

/// Repository for payment database operations.
#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: SqlitePool,
}

impl PaymentRepository {
    /// Creates a new PaymentRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PaymentRepository { pool }
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    /// Gets a payment by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Payment>> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(payment)
    }

    /// Gets the order's open (non-terminal) payment, if one exists.
    ///
    /// By invariant there is at most one.
    pub async fn get_open(&self, order_id: &str) -> DbResult<Option<Payment>> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments \
             WHERE order_id = ?1 AND status IN (?2, ?3) \
             ORDER BY created_at DESC, rowid DESC \
             LIMIT 1"
        ))
        .bind(order_id)
        .bind(PaymentStatus::Unpaid)
        .bind(PaymentStatus::Pending)
        .fetch_optional(&self.pool)
        .await?;

        Ok(payment)
    }

    /// Gets the most recent payment for an order (any status).
    pub async fn get_latest(&self, order_id: &str) -> DbResult<Option<Payment>> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments \
             WHERE order_id = ?1 \
             ORDER BY created_at DESC, rowid DESC \
             LIMIT 1"
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(payment)
    }

    /// Gets all payments for an order, oldest first.
    pub async fn list_for_order(&self, order_id: &str) -> DbResult<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments \
             WHERE order_id = ?1 \
             ORDER BY created_at, rowid"
        ))
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }

    // -------------------------------------------------------------------------
    // Writes
    // -------------------------------------------------------------------------

    /// Inserts a payment inside `tx`.
    pub async fn insert_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        payment: &Payment,
    ) -> DbResult<()> {
        debug!(order_id = %payment.order_id, amount = %payment.amount_cents, "Inserting payment");

        sqlx::query(
            r#"
            INSERT INTO payments (
                id, order_id, method, status, amount_cents, currency,
                intent_id, capture_id, paid_at, note, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6,
                ?7, ?8, ?9, ?10, ?11, ?12
            )
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.order_id)
        .bind(payment.method)
        .bind(payment.status)
        .bind(payment.amount_cents)
        .bind(&payment.currency)
        .bind(&payment.intent_id)
        .bind(&payment.capture_id)
        .bind(payment.paid_at)
        .bind(&payment.note)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Records the gateway intent id on a pending payment.
    ///
    /// Guarded: only a pending payment without an intent accepts one.
    /// Returns whether the intent was recorded.
    pub async fn set_intent(&self, payment_id: &str, intent_id: &str) -> DbResult<bool> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE payments
            SET intent_id = ?1, updated_at = ?2
            WHERE id = ?3 AND status = ?4 AND intent_id IS NULL
            "#,
        )
        .bind(intent_id)
        .bind(now)
        .bind(payment_id)
        .bind(PaymentStatus::Pending)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Marks a payment paid, inside `tx`.
    ///
    /// Guarded by the non-terminal statuses; returns false when another
    /// writer already drove the payment to a terminal status.
    ///
    /// `capture_id` is `None` for cash-on-delivery confirmations.
    pub async fn mark_paid_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        payment_id: &str,
        capture_id: Option<&str>,
        paid_at: DateTime<Utc>,
        note_line: &str,
    ) -> DbResult<bool> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = ?1,
                capture_id = ?2,
                paid_at = ?3,
                note = COALESCE(note || char(10), '') || ?4,
                updated_at = ?5
            WHERE id = ?6 AND status IN (?7, ?8)
            "#,
        )
        .bind(PaymentStatus::Paid)
        .bind(capture_id)
        .bind(paid_at)
        .bind(note_line)
        .bind(now)
        .bind(payment_id)
        .bind(PaymentStatus::Unpaid)
        .bind(PaymentStatus::Pending)
        .execute(&mut **tx)
        .await?;

        let applied = result.rows_affected() > 0;
        debug!(payment_id = %payment_id, applied, "Payment mark paid");
        Ok(applied)
    }

    /// Marks a payment failed, inside `tx`. Guarded like [`Self::mark_paid_tx`].
    pub async fn mark_failed_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        payment_id: &str,
        note_line: &str,
    ) -> DbResult<bool> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = ?1,
                note = COALESCE(note || char(10), '') || ?2,
                updated_at = ?3
            WHERE id = ?4 AND status IN (?5, ?6)
            "#,
        )
        .bind(PaymentStatus::Failed)
        .bind(note_line)
        .bind(now)
        .bind(payment_id)
        .bind(PaymentStatus::Unpaid)
        .bind(PaymentStatus::Pending)
        .execute(&mut **tx)
        .await?;

        let applied = result.rows_affected() > 0;
        debug!(payment_id = %payment_id, applied, "Payment mark failed");
        Ok(applied)
    }

    /// Cancels any open payment of the order, inside `tx`.
    ///
    /// Called before inserting a replacement payment (retry) and by the
    /// cancellation/abandonment transitions. Returns the number of rows
    /// cancelled (0 or 1 by invariant).
    pub async fn cancel_open_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        order_id: &str,
        note_line: &str,
    ) -> DbResult<u64> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = ?1,
                note = COALESCE(note || char(10), '') || ?2,
                updated_at = ?3
            WHERE order_id = ?4 AND status IN (?5, ?6)
            "#,
        )
        .bind(PaymentStatus::Cancelled)
        .bind(note_line)
        .bind(now)
        .bind(order_id)
        .bind(PaymentStatus::Unpaid)
        .bind(PaymentStatus::Pending)
        .execute(&mut **tx)
        .await?;

        debug!(order_id = %order_id, cancelled = result.rows_affected(), "Open payments cancelled");
        Ok(result.rows_affected())
    }
}

/// Formats a timestamped audit-trail line for the payment note.
pub fn audit_line(at: DateTime<Utc>, text: &str) -> String {
    format!("[{}] {}", at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true), text)
}

/// Generates a new payment ID.
pub fn generate_payment_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================
