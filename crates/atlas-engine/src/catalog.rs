//! # Catalog Provider
//!
//! The seam to the product catalog. Order validation needs a pricing and
//! availability view of each variant; where that view comes from is not
//! the engine's business, so it is behind a trait.
//!
//! The numbers read here are a PRE-CHECK only: the inventory ledger's
//! conditional updates are the sole authority on whether stock can
//! actually be reserved.

use async_trait::async_trait;

use crate::error::EngineResult;
use atlas_db::Database;

// =============================================================================
// Pricing View
// =============================================================================

/// The catalog's pricing/availability view of a variant, plus the
/// descriptive fields the order snapshot freezes.
#[derive(Debug, Clone)]
pub struct VariantPricing {
    pub variant_id: String,
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub color: Option<String>,
    pub size: Option<String>,
    pub unit_price_cents: i64,
    /// Availability at read time. Advisory; see module docs.
    pub available: i64,
}

// =============================================================================
// Provider Trait
// =============================================================================

/// Read access to the live catalog.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Returns the pricing view for an active variant, or `None` when the
    /// variant does not exist or is inactive.
    async fn variant_for_pricing(&self, variant_id: &str) -> EngineResult<Option<VariantPricing>>;
}

// =============================================================================
// Database-Backed Provider
// =============================================================================

/// Catalog provider over the local variants table.
#[derive(Debug, Clone)]
pub struct DbCatalog {
    db: Database,
}

impl DbCatalog {
    pub fn new(db: Database) -> Self {
        DbCatalog { db }
    }
}

#[async_trait]
impl CatalogProvider for DbCatalog {
    async fn variant_for_pricing(&self, variant_id: &str) -> EngineResult<Option<VariantPricing>> {
        let variant = self.db.variants().get_by_id(variant_id).await?;

        Ok(variant.filter(|v| v.is_active).map(|v| VariantPricing {
            variant_id: v.id,
            product_id: v.product_id,
            sku: v.sku,
            name: v.name,
            color: v.color,
            size: v.size,
            unit_price_cents: v.price_cents,
            available: v.available,
        }))
    }
}
