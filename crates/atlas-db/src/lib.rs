//! # atlas-db: Database Layer for Atlas Commerce
//!
//! This crate provides database access for the order-fulfillment engine.
//! It uses SQLite for durable storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Atlas Commerce Data Flow                            │
//! │                                                                         │
//! │  atlas-engine (OrderService, PaymentReconciler, Sweeper)               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     atlas-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │ (inventory,   │    │  (embedded)  │  │   │
//! │  │   │               │    │  order,       │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│  payment,     │    │ 001_init.sql │  │   │
//! │  │   │ WAL + busy    │    │  variant,     │    │              │  │   │
//! │  │   │ timeout       │    │  voucher)     │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database (orders, order_items, payments, variants, ...)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations per aggregate
//!
//! ## Usage
//!
//! ```rust,ignore
//! use atlas_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/atlas.db")).await?;
//!
//! // Reserve stock inside a transaction
//! let mut tx = db.pool().begin().await?;
//! db.inventory().reserve_tx(&mut tx, &lines).await?;
//! db.orders().insert_tx(&mut tx, &order).await?;
//! tx.commit().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::inventory::{InventoryLedger, StockLine};
pub use repository::order::OrderRepository;
pub use repository::payment::PaymentRepository;
pub use repository::variant::VariantRepository;
pub use repository::voucher::VoucherRepository;
