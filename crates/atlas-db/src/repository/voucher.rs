//! # Voucher Repository
//!
//! Database operations for discount vouchers.
//!
//! The usage counter follows the same rule as the stock counters: it is
//! only moved by an atomic conditional increment, so two orders racing
//! for a voucher's last use are arbitrated by the row update. The
//! increment runs inside the order-creation transaction — an order that
//! fails to persist does not consume a use.

use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use atlas_core::Voucher;

/// All voucher columns, shared by the read queries.
const VOUCHER_COLUMNS: &str = "id, code, discount_cents, min_subtotal_cents, usage_limit, \
     used_count, is_active, expires_at, created_at";

/// Repository for voucher database operations.
#[derive(Debug, Clone)]
pub struct VoucherRepository {
    pool: SqlitePool,
}

impl VoucherRepository {
    /// Creates a new VoucherRepository.
    pub fn new(pool: SqlitePool) -> Self {
        VoucherRepository { pool }
    }

    /// Gets a voucher by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Voucher>> {
        let voucher = sqlx::query_as::<_, Voucher>(&format!(
            "SELECT {VOUCHER_COLUMNS} FROM vouchers WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(voucher)
    }

    /// Gets a voucher by its human-entered code.
    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<Voucher>> {
        let voucher = sqlx::query_as::<_, Voucher>(&format!(
            "SELECT {VOUCHER_COLUMNS} FROM vouchers WHERE code = ?1"
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(voucher)
    }

    /// Inserts a new voucher.
    pub async fn insert(&self, voucher: &Voucher) -> DbResult<()> {
        debug!(code = %voucher.code, "Inserting voucher");

        sqlx::query(
            r#"
            INSERT INTO vouchers (
                id, code, discount_cents, min_subtotal_cents, usage_limit,
                used_count, is_active, expires_at, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&voucher.id)
        .bind(&voucher.code)
        .bind(voucher.discount_cents)
        .bind(voucher.min_subtotal_cents)
        .bind(voucher.usage_limit)
        .bind(voucher.used_count)
        .bind(voucher.is_active)
        .bind(voucher.expires_at)
        .bind(voucher.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Atomically consumes one use of the voucher, inside `tx`.
    ///
    /// The conditional increment is the authoritative usage-limit check;
    /// the pure validation in atlas-core is only advisory. Returns
    /// whether a use was consumed.
    pub async fn increment_usage_tx(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        voucher_id: &str,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE vouchers
            SET used_count = used_count + 1
            WHERE id = ?1
              AND is_active = 1
              AND (usage_limit IS NULL OR used_count < usage_limit)
            "#,
        )
        .bind(voucher_id)
        .execute(&mut **tx)
        .await?;

        let consumed = result.rows_affected() > 0;
        debug!(voucher_id = %voucher_id, consumed, "Voucher usage increment");
        Ok(consumed)
    }
}

/// Helper to generate a new voucher ID.
pub fn generate_voucher_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::Utc;

    fn sample_voucher(id: &str, usage_limit: Option<i64>) -> Voucher {
        Voucher {
            id: id.to_string(),
            code: format!("CODE-{id}"),
            discount_cents: 1000,
            min_subtotal_cents: 0,
            usage_limit,
            used_count: 0,
            is_active: true,
            expires_at: None,
            created_at: Utc::now(),
        }
    }

    async fn increment(db: &Database, voucher_id: &str) -> bool {
        let mut tx = db.pool().begin().await.unwrap();
        let consumed = db
            .vouchers()
            .increment_usage_tx(&mut tx, voucher_id)
            .await
            .unwrap();
        tx.commit().await.unwrap();
        consumed
    }

    #[tokio::test]
    async fn test_increment_respects_limit() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.vouchers()
            .insert(&sample_voucher("vch-1", Some(2)))
            .await
            .unwrap();

        assert!(increment(&db, "vch-1").await);
        assert!(increment(&db, "vch-1").await);
        // Limit reached: third use is refused
        assert!(!increment(&db, "vch-1").await);

        let voucher = db.vouchers().get_by_id("vch-1").await.unwrap().unwrap();
        assert_eq!(voucher.used_count, 2);
    }

    #[tokio::test]
    async fn test_increment_unlimited() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.vouchers()
            .insert(&sample_voucher("vch-1", None))
            .await
            .unwrap();

        for _ in 0..5 {
            assert!(increment(&db, "vch-1").await);
        }

        let voucher = db.vouchers().get_by_id("vch-1").await.unwrap().unwrap();
        assert_eq!(voucher.used_count, 5);
    }

    #[tokio::test]
    async fn test_get_by_code() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.vouchers()
            .insert(&sample_voucher("vch-1", None))
            .await
            .unwrap();

        let voucher = db.vouchers().get_by_code("CODE-vch-1").await.unwrap().unwrap();
        assert_eq!(voucher.id, "vch-1");

        assert!(db.vouchers().get_by_code("NOPE").await.unwrap().is_none());
    }
}
