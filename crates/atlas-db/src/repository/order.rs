//! # Order Repository
//!
//! Database operations for orders, their line-item snapshots, and the
//! shipping record.
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Order Lifecycle                                   │
//! │                                                                         │
//! │  1. CREATE (one transaction, driven by the order service)              │
//! │     └── reserve stock → insert_tx() → items → shipping → payment       │
//! │                                                                         │
//! │  2. TRANSITION (guarded conditional update)                            │
//! │     └── transition_tx() → UPDATE ... WHERE status IN (legal sources)   │
//! │         zero rows affected = rejected, caller signals IllegalTransition│
//! │                                                                         │
//! │  3. TERMINAL                                                           │
//! │     └── completed / cancelled rows never match a guard again           │
//! │                                                                         │
//! │  Orders are NEVER deleted once a payment was attempted; cancellation   │
//! │  is a status, not a DELETE.                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use atlas_core::state::OrderEvent;
use atlas_core::{Order, OrderItem, OrderStatus, PaymentStatus, Shipping};

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    /// Gets an order by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(
            r#"
            SELECT
                id, order_number, user_id,
                customer_name, customer_phone, customer_email,
                subtotal_cents, shipping_fee_cents, discount_cents, total_cents,
                status, is_paid, stock_state, voucher_id, note,
                created_at, updated_at, paid_at, completed_at, cancelled_at
            FROM orders
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    /// Gets all items for an order.
    pub async fn get_items(&self, order_id: &str) -> DbResult<Vec<OrderItem>> {
        let items = sqlx::query_as::<_, OrderItem>(
            r#"
            SELECT
                id, order_id, variant_id, product_id,
                sku_snapshot, name_snapshot, color_snapshot, size_snapshot,
                unit_price_cents, quantity, line_total_cents, created_at
            FROM order_items
            WHERE order_id = ?1
            ORDER BY created_at
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Gets the shipping record for an order.
    pub async fn get_shipping(&self, order_id: &str) -> DbResult<Option<Shipping>> {
        let shipping = sqlx::query_as::<_, Shipping>(
            r#"
            SELECT id, order_id, recipient, phone, address_line, city, fee_cents, created_at
            FROM shippings
            WHERE order_id = ?1
            "#,
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(shipping)
    }

    /// Finds pending orders older than `cutoff` with no successful payment.
    ///
    /// This is the abandonment sweeper's work queue. The returned orders
    /// are candidates only: each one is still driven through the guarded
    /// `transition_tx`, so a payment that completes between this read and
    /// the transition simply wins the race.
    pub async fn find_stale_pending(
        &self,
        cutoff: DateTime<Utc>,
        limit: u32,
    ) -> DbResult<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(
            r#"
            SELECT o.id
            FROM orders o
            WHERE o.status = ?1
              AND o.created_at < ?2
              AND NOT EXISTS (
                  SELECT 1 FROM payments p
                  WHERE p.order_id = o.id AND p.status = ?3
              )
            ORDER BY o.created_at
            LIMIT ?4
            "#,
        )
        .bind(OrderStatus::Pending)
        .bind(cutoff)
        .bind(PaymentStatus::Paid)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    // -------------------------------------------------------------------------
    // Writes
    // -------------------------------------------------------------------------

    /// Inserts an order inside `tx`.
    ///
    /// Runs in the same transaction as the stock reservation so a failed
    /// reservation leaves no order behind (and vice versa).
    pub async fn insert_tx(&self, tx: &mut Transaction<'_, Sqlite>, order: &Order) -> DbResult<()> {
        debug!(id = %order.id, order_number = %order.order_number, "Inserting order");

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, order_number, user_id,
                customer_name, customer_phone, customer_email,
                subtotal_cents, shipping_fee_cents, discount_cents, total_cents,
                status, is_paid, stock_state, voucher_id, note,
                created_at, updated_at, paid_at, completed_at, cancelled_at
            ) VALUES (
                ?1, ?2, ?3,
                ?4, ?5, ?6,
                ?7, ?8, ?9, ?10,
                ?11, ?12, ?13, ?14, ?15,
                ?16, ?17, ?18, ?19, ?20
            )
            "#,
        )
        .bind(&order.id)
        .bind(&order.order_number)
        .bind(&order.user_id)
        .bind(&order.customer_name)
        .bind(&order.customer_phone)
        .bind(&order.customer_email)
        .bind(order.subtotal_cents)
        .bind(order.shipping_fee_cents)
        .bind(order.discount_cents)
        .bind(order.total_cents)
        .bind(order.status)
        .bind(order.is_paid)
        .bind(order.stock_state)
        .bind(&order.voucher_id)
        .bind(&order.note)
        .bind(order.created_at)
        .bind(order.updated_at)
        .bind(order.paid_at)
        .bind(order.completed_at)
        .bind(order.cancelled_at)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Inserts a line-item snapshot inside `tx`.
    pub async fn insert_item_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        item: &OrderItem,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO order_items (
                id, order_id, variant_id, product_id,
                sku_snapshot, name_snapshot, color_snapshot, size_snapshot,
                unit_price_cents, quantity, line_total_cents, created_at
            ) VALUES (
                ?1, ?2, ?3, ?4,
                ?5, ?6, ?7, ?8,
                ?9, ?10, ?11, ?12
            )
            "#,
        )
        .bind(&item.id)
        .bind(&item.order_id)
        .bind(&item.variant_id)
        .bind(&item.product_id)
        .bind(&item.sku_snapshot)
        .bind(&item.name_snapshot)
        .bind(&item.color_snapshot)
        .bind(&item.size_snapshot)
        .bind(item.unit_price_cents)
        .bind(item.quantity)
        .bind(item.line_total_cents)
        .bind(item.created_at)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Inserts the shipping record inside `tx`.
    pub async fn insert_shipping_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        shipping: &Shipping,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO shippings (id, order_id, recipient, phone, address_line, city, fee_cents, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&shipping.id)
        .bind(&shipping.order_id)
        .bind(&shipping.recipient)
        .bind(&shipping.phone)
        .bind(&shipping.address_line)
        .bind(&shipping.city)
        .bind(shipping.fee_cents)
        .bind(shipping.created_at)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Applies an order event as a guarded conditional update, inside `tx`.
    ///
    /// ## The Terminal-State Guard
    /// The `WHERE status IN (...)` list is derived from the pure
    /// transition table ([`OrderEvent::source_statuses`]), so the check
    /// and the update are ONE atomic statement. Concurrent writers — a
    /// capture confirmation racing the abandonment sweeper — are
    /// linearized here: the first to commit wins, the loser affects zero
    /// rows and must signal `IllegalTransition`, never overwrite.
    ///
    /// Returns whether the transition was applied.
    pub async fn transition_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        order_id: &str,
        event: OrderEvent,
    ) -> DbResult<bool> {
        let now = Utc::now();
        let sources = event.source_statuses();

        let timestamp_clause = match event {
            OrderEvent::PaymentSucceeded => ", is_paid = 1, paid_at = ?",
            OrderEvent::PaymentFailed | OrderEvent::Abandoned | OrderEvent::CancelRequested => {
                ", cancelled_at = ?"
            }
            OrderEvent::Fulfilled => ", completed_at = ?",
        };

        let placeholders = vec!["?"; sources.len()].join(", ");
        let sql = format!(
            "UPDATE orders SET status = ?, updated_at = ?{timestamp_clause} \
             WHERE id = ? AND status IN ({placeholders})"
        );

        let mut query = sqlx::query(&sql)
            .bind(event.target_status())
            .bind(now)
            .bind(now)
            .bind(order_id);
        for source in sources {
            query = query.bind(*source);
        }

        let result = query.execute(&mut **tx).await?;
        let applied = result.rows_affected() > 0;

        debug!(order_id = %order_id, ?event, applied, "Order transition");
        Ok(applied)
    }

    /// Appends a line to the order's free-text note, inside `tx`.
    pub async fn append_note_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        order_id: &str,
        text: &str,
    ) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE orders
            SET note = COALESCE(note || char(10), '') || ?1, updated_at = ?2
            WHERE id = ?3
            "#,
        )
        .bind(text)
        .bind(now)
        .bind(order_id)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order", order_id));
        }

        Ok(())
    }
}

/// Generates an order number in format: ORD-YYYYMMDD-HHMMSS-XXXXXX
///
/// ## Format
/// - YYYYMMDD-HHMMSS: UTC creation time, so numbers sort by day
/// - XXXXXX: random hex suffix to keep concurrent checkouts unique
///
/// ## Example
/// `ORD-20260215-093042-A41C7F`
pub fn generate_order_number() -> String {
    let now = Utc::now();
    let suffix: String = Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(6)
        .collect::<String>()
        .to_uppercase();

    format!("ORD-{}-{}", now.format("%Y%m%d-%H%M%S"), suffix)
}

/// Generates a new order ID.
pub fn generate_order_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use atlas_core::StockState;

    fn sample_order(id: &str, status: OrderStatus) -> Order {
        let now = Utc::now();
        Order {
            id: id.to_string(),
            order_number: generate_order_number(),
            user_id: None,
            customer_name: "Ada".to_string(),
            customer_phone: "555-0100".to_string(),
            customer_email: None,
            subtotal_cents: 1000,
            shipping_fee_cents: 0,
            discount_cents: 0,
            total_cents: 1000,
            status,
            is_paid: false,
            stock_state: StockState::Reserved,
            voucher_id: None,
            note: None,
            created_at: now,
            updated_at: now,
            paid_at: None,
            completed_at: None,
            cancelled_at: None,
        }
    }

    async fn insert(db: &Database, order: &Order) {
        let mut tx = db.pool().begin().await.unwrap();
        db.orders().insert_tx(&mut tx, order).await.unwrap();
        tx.commit().await.unwrap();
    }

    async fn transition(db: &Database, order_id: &str, event: OrderEvent) -> bool {
        let mut tx = db.pool().begin().await.unwrap();
        let applied = db
            .orders()
            .transition_tx(&mut tx, order_id, event)
            .await
            .unwrap();
        tx.commit().await.unwrap();
        applied
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        insert(&db, &sample_order("ord-1", OrderStatus::Pending)).await;

        let loaded = db.orders().get_by_id("ord-1").await.unwrap().unwrap();
        assert_eq!(loaded.status, OrderStatus::Pending);
        assert_eq!(loaded.total_cents, 1000);
        assert_eq!(loaded.stock_state, StockState::Reserved);
    }

    #[tokio::test]
    async fn test_transition_happy_path() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        insert(&db, &sample_order("ord-1", OrderStatus::Pending)).await;

        assert!(transition(&db, "ord-1", OrderEvent::PaymentSucceeded).await);
        let order = db.orders().get_by_id("ord-1").await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Processing);
        assert!(order.is_paid);
        assert!(order.paid_at.is_some());

        assert!(transition(&db, "ord-1", OrderEvent::Fulfilled).await);
        let order = db.orders().get_by_id("ord-1").await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Completed);
        assert!(order.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_transition_guard_rejects_terminal() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        insert(&db, &sample_order("ord-1", OrderStatus::Pending)).await;

        assert!(transition(&db, "ord-1", OrderEvent::Abandoned).await);
        let cancelled = db.orders().get_by_id("ord-1").await.unwrap().unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);

        // A late capture confirmation must not reopen the order.
        assert!(!transition(&db, "ord-1", OrderEvent::PaymentSucceeded).await);
        let after = db.orders().get_by_id("ord-1").await.unwrap().unwrap();
        assert_eq!(after.status, OrderStatus::Cancelled);
        assert!(!after.is_paid);
        assert_eq!(after.cancelled_at, cancelled.cancelled_at);
    }

    #[tokio::test]
    async fn test_find_stale_pending() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut old = sample_order("ord-old", OrderStatus::Pending);
        old.created_at = Utc::now() - chrono::Duration::minutes(90);
        insert(&db, &old).await;

        let fresh = sample_order("ord-fresh", OrderStatus::Pending);
        insert(&db, &fresh).await;

        let cutoff = Utc::now() - chrono::Duration::minutes(60);
        let stale = db.orders().find_stale_pending(cutoff, 100).await.unwrap();

        assert_eq!(stale, vec!["ord-old".to_string()]);
    }

    #[tokio::test]
    async fn test_append_note() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        insert(&db, &sample_order("ord-1", OrderStatus::Pending)).await;

        let mut tx = db.pool().begin().await.unwrap();
        db.orders()
            .append_note_tx(&mut tx, "ord-1", "first line")
            .await
            .unwrap();
        db.orders()
            .append_note_tx(&mut tx, "ord-1", "second line")
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let order = db.orders().get_by_id("ord-1").await.unwrap().unwrap();
        assert_eq!(order.note.as_deref(), Some("first line\nsecond line"));
    }

    #[test]
    fn test_order_number_format() {
        let number = generate_order_number();
        assert!(number.starts_with("ORD-"));
        assert_eq!(number.len(), "ORD-20260215-093042-A41C7F".len());
    }
}
