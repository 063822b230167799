//! # Variant Repository
//!
//! Database operations for product variants: the catalog read path used
//! by order validation, plus administrative CRUD and restocking.
//!
//! The `available` / `reserved` counters on this table belong to the
//! inventory ledger ([`super::inventory`]); this repository only reads
//! them, and only ever ADDS to `available` when receiving stock.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use atlas_core::Variant;

/// All variant columns, shared by the read queries.
const VARIANT_COLUMNS: &str = "id, product_id, sku, name, color, size, price_cents, \
     available, reserved, is_active, created_at, updated_at";

/// Repository for variant database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.variants();
/// let variant = repo.get_by_id("uuid-here").await?;
/// ```
#[derive(Debug, Clone)]
pub struct VariantRepository {
    pool: SqlitePool,
}

impl VariantRepository {
    /// Creates a new VariantRepository.
    pub fn new(pool: SqlitePool) -> Self {
        VariantRepository { pool }
    }

    /// Gets a variant by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Variant>> {
        let variant = sqlx::query_as::<_, Variant>(&format!(
            "SELECT {VARIANT_COLUMNS} FROM variants WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(variant)
    }

    /// Gets a variant by its SKU.
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Variant>> {
        let variant = sqlx::query_as::<_, Variant>(&format!(
            "SELECT {VARIANT_COLUMNS} FROM variants WHERE sku = ?1"
        ))
        .bind(sku)
        .fetch_optional(&self.pool)
        .await?;

        Ok(variant)
    }

    /// Lists active variants sorted by name.
    pub async fn list_active(&self, limit: u32) -> DbResult<Vec<Variant>> {
        let variants = sqlx::query_as::<_, Variant>(&format!(
            "SELECT {VARIANT_COLUMNS} FROM variants \
             WHERE is_active = 1 ORDER BY name LIMIT ?1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(variants)
    }

    /// Inserts a new variant.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - SKU already exists
    pub async fn insert(&self, variant: &Variant) -> DbResult<()> {
        debug!(sku = %variant.sku, "Inserting variant");

        sqlx::query(
            r#"
            INSERT INTO variants (
                id, product_id, sku, name, color, size, price_cents,
                available, reserved, is_active, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7,
                ?8, ?9, ?10, ?11, ?12
            )
            "#,
        )
        .bind(&variant.id)
        .bind(&variant.product_id)
        .bind(&variant.sku)
        .bind(&variant.name)
        .bind(&variant.color)
        .bind(&variant.size)
        .bind(variant.price_cents)
        .bind(variant.available)
        .bind(variant.reserved)
        .bind(variant.is_active)
        .bind(variant.created_at)
        .bind(variant.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Receives stock: adds `quantity` units to `available`.
    ///
    /// ## Delta Pattern
    /// A delta update, never an absolute assignment — restocking must not
    /// overwrite a concurrent checkout's decrement.
    pub async fn restock(&self, id: &str, quantity: i64) -> DbResult<()> {
        debug!(id = %id, quantity = %quantity, "Restocking variant");

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE variants
            SET available = available + ?1, updated_at = ?2
            WHERE id = ?3
            "#,
        )
        .bind(quantity)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Variant", id));
        }

        Ok(())
    }

    /// Soft-deletes a variant by setting is_active = false.
    ///
    /// ## Why Soft Delete?
    /// - Historical order snapshots still reference this variant
    /// - An inactive variant no longer passes the reservation guard
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Soft-deleting variant");

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE variants
            SET is_active = 0, updated_at = ?1
            WHERE id = ?2
            "#,
        )
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Variant", id));
        }

        Ok(())
    }
}

/// Helper to generate a new variant ID.
pub fn generate_variant_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================
