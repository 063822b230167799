//! # atlas-engine: Order-Payment-Stock Consistency Engine
//!
//! The orchestration layer of Atlas Commerce: atomically reserves and
//! releases finite inventory across concurrent checkouts, reconciles
//! order state with an asynchronously-confirmed external payment, and
//! recovers deterministically from partial failures.
//!
//! ## Components
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        atlas-engine                                     │
//! │                                                                         │
//! │  ┌──────────────────┐        ┌─────────────────────┐                   │
//! │  │   OrderService   │◄───────│  PaymentReconciler  │────► GatewayClient│
//! │  │  (state machine) │        │  (idempotent        │      (external)  │
//! │  │                  │        │   capture handling) │                   │
//! │  └────────┬─────────┘        └─────────────────────┘                   │
//! │           │      ▲                                                      │
//! │           │      │                                                      │
//! │           │  ┌───┴──────────────────┐                                  │
//! │           │  │  AbandonmentSweeper  │  (periodic task)                 │
//! │           │  └──────────────────────┘                                  │
//! │           ▼                                                             │
//! │  atlas-db: InventoryLedger + repositories (guarded atomic updates)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency Model
//!
//! The engine is invoked from independent concurrent request handlers
//! plus one background sweeper; there is no single-threaded event loop.
//! Every mutating operation is one transaction spanning at most one
//! order's rows plus the variants it touches. Operations on the same
//! order are linearized by the terminal-state guard (first writer wins,
//! later conflicting writers are rejected); operations on different
//! orders touching the same variant are linearized by the ledger's
//! conditional updates.
//!
//! ## Typical Wiring
//!
//! ```rust,ignore
//! let config = EngineConfig::load()?;
//! let db = Database::new(DbConfig::new("./atlas.db")).await?;
//! let catalog = Arc::new(DbCatalog::new(db.clone()));
//! let gateway = Arc::new(HttpGateway::new(&config.gateway)?);
//!
//! let service = OrderService::new(db, catalog, &config);
//! let reconciler = PaymentReconciler::new(service.clone(), gateway, config.gateway.clone());
//!
//! let (sweeper, handle) = AbandonmentSweeper::new(service.clone(), config.sweep.clone());
//! tokio::spawn(sweeper.run());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod catalog;
pub mod config;
pub mod error;
pub mod gateway;
pub mod orders;
pub mod reconciler;
pub mod sweeper;

// =============================================================================
// Re-exports
// =============================================================================

pub use catalog::{CatalogProvider, DbCatalog, VariantPricing};
pub use config::{ConfigError, EngineConfig, GatewayConfig, SweepConfig};
pub use error::{EngineError, EngineResult};
pub use gateway::http::HttpGateway;
pub use gateway::{GatewayClient, GatewayError};
pub use orders::{CustomerInfo, DraftItem, OrderDetail, OrderDraft, OrderService, ShippingInfo};
pub use reconciler::{CaptureOutcome, PaymentReconciler};
pub use sweeper::{AbandonmentSweeper, SweepReport, SweeperHandle};
