//! # Repository Module
//!
//! Database repository implementations for Atlas Commerce.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern Explained                         │
//! │                                                                         │
//! │  The Repository pattern abstracts database access behind a clean API.  │
//! │                                                                         │
//! │  OrderService / PaymentReconciler                                      │
//! │       │                                                                 │
//! │       │  db.inventory().reserve_tx(&mut tx, &lines)                    │
//! │       │  ↓                                                              │
//! │       ▼                                                                 │
//! │  InventoryLedger / OrderRepository / PaymentRepository                 │
//! │       │                                                                 │
//! │       │  Conditional single-statement UPDATEs                          │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Benefits:                                                              │
//! │  • SQL is isolated in one place per aggregate                          │
//! │  • The `_tx` variants compose into one transaction per operation       │
//! │  • Guarded updates are checked via rows_affected, never read-then-    │
//! │    write                                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`variant::VariantRepository`] - Catalog reads, restocking, CRUD
//! - [`inventory::InventoryLedger`] - Reserve / commit / release
//! - [`order::OrderRepository`] - Orders, items, shipping, transitions
//! - [`payment::PaymentRepository`] - Payments and guarded terminal writes
//! - [`voucher::VoucherRepository`] - Vouchers and usage counting

pub mod inventory;
pub mod order;
pub mod payment;
pub mod variant;
pub mod voucher;
