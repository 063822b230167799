//! # Domain Types
//!
//! Core domain types used throughout Atlas Commerce.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Variant      │   │     Order       │   │    Payment      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  sku (business) │   │  order_number   │   │  order_id (FK)  │       │
//! │  │  available      │   │  status         │   │  method         │       │
//! │  │  reserved       │   │  stock_state    │   │  status         │       │
//! │  │  price_cents    │   │  total_cents    │   │  intent_id      │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   OrderItem     │   │    Shipping     │   │    Voucher      │       │
//! │  │  (snapshot)     │   │  (1:1 order)    │   │  (usage count)  │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID: (sku, order_number, etc.) - human-readable, potentially mutable
//!
//! ## Snapshot Pattern
//! Order line items freeze the variant's descriptive data (SKU, name, color,
//! size, unit price) at validation time. They are never re-derived from the
//! live catalog: a price change after checkout must not change an order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Order Status
// =============================================================================

/// The lifecycle status of an order.
///
/// Transitions are owned by the state machine table in [`crate::state`];
/// nothing else may move an order between statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Order created, stock reserved, payment not yet confirmed.
    Pending,
    /// Payment confirmed, stock committed, awaiting fulfillment.
    Processing,
    /// Fulfilled and closed. Terminal.
    Completed,
    /// Cancelled (payment failure, abandonment, or explicit cancel). Terminal.
    Cancelled,
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

// =============================================================================
// Stock State
// =============================================================================

/// The order-scoped inventory flag that makes commit/release idempotent.
///
/// ## Why a flag and not counter arithmetic?
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Commit and release must be IDEMPOTENT and MUTUALLY EXCLUSIVE.          │
/// │                                                                         │
/// │  Re-reading raw counters cannot tell "already committed" apart from     │
/// │  "never reserved". A single conditional flip of this flag can:          │
/// │                                                                         │
/// │      reserved ──commit──► committed     (payment succeeded)             │
/// │      reserved ──release─► released      (failure / abandonment)         │
/// │                                                                         │
/// │  The flip is one guarded UPDATE; whoever loses the race is a no-op.     │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum StockState {
    /// Quantities are held in `variants.reserved` for this order.
    Reserved,
    /// Reservation converted to a permanent decrement.
    Committed,
    /// Reservation returned to `variants.available`.
    Released,
}

// =============================================================================
// Payment Status
// =============================================================================

/// The lifecycle status of a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Cash-on-delivery payment awaiting delivery confirmation.
    Unpaid,
    /// Gateway payment awaiting capture.
    Pending,
    /// Captured successfully. Terminal.
    Paid,
    /// Capture declined by the gateway. Terminal.
    Failed,
    /// Superseded by a retry or swept as abandoned. Terminal.
    Cancelled,
    /// Refunded after capture. Terminal (refund execution is manual).
    Refunded,
}

impl PaymentStatus {
    /// Terminal statuses admit no further transition; a capture replay
    /// against one returns the recorded outcome instead of touching the
    /// gateway.
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Paid
                | PaymentStatus::Failed
                | PaymentStatus::Cancelled
                | PaymentStatus::Refunded
        )
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Collected by the courier on delivery.
    CashOnDelivery,
    /// Captured through the external payment gateway.
    Gateway,
}

impl PaymentMethod {
    /// The status a freshly created payment starts in.
    pub const fn initial_status(&self) -> PaymentStatus {
        match self {
            PaymentMethod::CashOnDelivery => PaymentStatus::Unpaid,
            PaymentMethod::Gateway => PaymentStatus::Pending,
        }
    }
}

// =============================================================================
// Variant
// =============================================================================

/// A sellable product variant with its stock counters.
///
/// `available` and `reserved` are the inventory ledger's source of truth.
/// They are only ever mutated through the ledger's conditional updates,
/// never assigned absolute values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Variant {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Owning product.
    pub product_id: String,

    /// Stock Keeping Unit - business identifier.
    pub sku: String,

    /// Display name shown on order snapshots.
    pub name: String,

    /// Variant color, if the product has color options.
    pub color: Option<String>,

    /// Variant size, if the product has size options.
    pub size: Option<String>,

    /// Price in cents (smallest currency unit).
    pub price_cents: i64,

    /// Units free to sell. Never negative.
    pub available: i64,

    /// Units held by non-terminal orders.
    pub reserved: i64,

    /// Whether the variant is active (soft delete).
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Variant {
    /// Returns the price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

// =============================================================================
// Order
// =============================================================================

/// A customer order.
///
/// ## Invariant
/// `total_cents == subtotal_cents + shipping_fee_cents - discount_cents`,
/// checked at creation and never recomputed afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Order {
    pub id: String,

    /// Human-readable order number; sorts roughly by creation day.
    pub order_number: String,

    /// Owning user. None for guest checkouts.
    pub user_id: Option<String>,

    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: Option<String>,

    pub subtotal_cents: i64,
    pub shipping_fee_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,

    pub status: OrderStatus,

    /// Set exactly once, by the `PaymentSucceeded` transition.
    pub is_paid: bool,

    /// Idempotency flag for the inventory ledger (see [`StockState`]).
    pub stock_state: StockState,

    /// Applied voucher, if any.
    pub voucher_id: Option<String>,

    /// Free-text note (cancel reasons, refund annotations).
    pub note: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Returns the order total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Whether the order has reached a terminal status.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

// =============================================================================
// Order Item
// =============================================================================

/// A line item in an order.
/// Uses snapshot pattern to freeze variant data at order time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub variant_id: String,
    pub product_id: String,
    /// SKU at order time (frozen).
    pub sku_snapshot: String,
    /// Product name at order time (frozen).
    pub name_snapshot: String,
    /// Color at order time (frozen).
    pub color_snapshot: Option<String>,
    /// Size at order time (frozen).
    pub size_snapshot: Option<String>,
    /// Unit price in cents at order time (frozen).
    pub unit_price_cents: i64,
    /// Quantity ordered. Always > 0.
    pub quantity: i64,
    /// unit_price × quantity.
    pub line_total_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    /// Returns the unit price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Returns the line total as Money.
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

// =============================================================================
// Payment
// =============================================================================

/// A payment attempt for an order.
///
/// ## Invariant
/// At most one NON-TERMINAL payment exists per order at any time. Retrying
/// a payment cancels the open one before inserting a fresh row; rows are
/// never deleted, so the table is the payment audit history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Payment {
    pub id: String,
    pub order_id: String,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    /// Amount due in store-currency cents.
    pub amount_cents: i64,
    /// ISO 4217 store currency code.
    pub currency: String,
    /// Gateway intent id. None until the gateway interaction starts.
    pub intent_id: Option<String>,
    /// Gateway capture id. None until captured.
    pub capture_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    /// Append-only audit trail of state transitions.
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Returns the payment amount as Money.
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }

    /// Whether the payment has reached a terminal status.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

// =============================================================================
// Shipping
// =============================================================================

/// Delivery snapshot, exactly one per order.
///
/// The fee is supplied by the caller (rate computation is an external
/// collaborator); it participates in the totals invariant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Shipping {
    pub id: String,
    pub order_id: String,
    pub recipient: String,
    pub phone: String,
    pub address_line: String,
    pub city: String,
    pub fee_cents: i64,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Voucher
// =============================================================================

/// A fixed-amount discount voucher with bounded usage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Voucher {
    pub id: String,
    /// Human-entered code, unique.
    pub code: String,
    /// Fixed discount in cents.
    pub discount_cents: i64,
    /// Minimum subtotal the voucher applies to.
    pub min_subtotal_cents: i64,
    /// None = unlimited.
    pub usage_limit: Option<i64>,
    /// Incremented exactly once per order that applies the voucher.
    pub used_count: i64,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================
