//! # Order Service
//!
//! The Order State Machine: owns order creation and every lifecycle
//! transition. Nothing else writes order status, and all inventory
//! movement goes through the ledger calls made here.
//!
//! ## Operation Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                 One Transaction Per Mutation                            │
//! │                                                                         │
//! │  create_order:                                                         │
//! │    validate (pure, nothing persisted on failure)                       │
//! │      └── tx { reserve → order → items → shipping → payment →           │
//! │              voucher use } commit                                      │
//! │                                                                         │
//! │  settle (payment outcome):                                             │
//! │    tx { guarded payment write → guarded order transition →             │
//! │         ledger commit/release } commit                                 │
//! │      └── any guard that matches zero rows rolls the WHOLE              │
//! │          transaction back: a lost race leaves no partial writes        │
//! │                                                                         │
//! │  cancel / abandon:                                                     │
//! │    tx { guarded order transition → ledger release →                    │
//! │         cancel open payment } commit                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use atlas_core::state::OrderEvent;
use atlas_core::validation::{
    validate_item_count, validate_price_cents, validate_price_tolerance, validate_quantity,
    validate_required, validate_totals, validate_voucher,
};
use atlas_core::{
    Money, Order, OrderItem, OrderStatus, Payment, PaymentMethod, Shipping, StockState,
    ValidationError, Voucher,
};
use atlas_db::repository::order::{generate_order_id, generate_order_number};
use atlas_db::repository::payment::{audit_line, generate_payment_id};
use atlas_db::{Database, DbError, StockLine};

use crate::catalog::{CatalogProvider, VariantPricing};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};

// =============================================================================
// Request / Response Types
// =============================================================================

/// A line item as submitted by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftItem {
    pub variant_id: String,
    pub quantity: i64,
    /// The unit price the client displayed; checked against the catalog
    /// within the configured tolerance. The snapshot always stores the
    /// catalog price.
    pub unit_price_cents: i64,
}

/// Customer identity for the order. `user_id` is None for guest checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerInfo {
    pub user_id: Option<String>,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
}

/// Delivery details. The fee was computed by the external rate provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingInfo {
    pub recipient: String,
    pub phone: String,
    pub address_line: String,
    pub city: String,
    pub fee_cents: i64,
}

/// Everything needed to create an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDraft {
    pub customer: CustomerInfo,
    pub items: Vec<DraftItem>,
    pub shipping: ShippingInfo,
    pub voucher_code: Option<String>,
    pub payment_method: PaymentMethod,
}

/// The full order snapshot public operations return.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetail {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub payments: Vec<Payment>,
    pub shipping: Option<Shipping>,
}

// =============================================================================
// Settlement (crate-internal)
// =============================================================================

/// A payment outcome to apply atomically.
#[derive(Debug, Clone)]
pub(crate) enum SettleOutcome {
    Paid {
        capture_id: Option<String>,
        paid_at: DateTime<Utc>,
        note: String,
    },
    Failed {
        note: String,
    },
}

/// What applying a payment outcome did.
#[derive(Debug)]
pub(crate) enum Settlement {
    /// Payment, order, and stock moved together.
    Applied(Order),
    /// Another writer already drove the payment terminal; nothing changed.
    PaymentAlreadyTerminal,
    /// The order reached a terminal state first (e.g. swept); nothing
    /// changed, including the payment write that was rolled back.
    OrderAlreadyTerminal,
}

// =============================================================================
// Order Service
// =============================================================================

/// Owns the order lifecycle.
#[derive(Clone)]
pub struct OrderService {
    db: Database,
    catalog: Arc<dyn CatalogProvider>,
    store_currency: String,
    price_tolerance: Money,
}

impl OrderService {
    /// Creates an order service.
    pub fn new(db: Database, catalog: Arc<dyn CatalogProvider>, config: &EngineConfig) -> Self {
        OrderService {
            db,
            catalog,
            store_currency: config.store_currency.clone(),
            price_tolerance: Money::from_cents(config.price_tolerance_cents),
        }
    }

    /// Read access to the backing database (used by the reconciler and
    /// the sweeper, which share this service).
    pub(crate) fn db(&self) -> &Database {
        &self.db
    }

    pub(crate) fn store_currency(&self) -> &str {
        &self.store_currency
    }

    // -------------------------------------------------------------------------
    // Create
    // -------------------------------------------------------------------------

    /// Validates a draft and creates the order with its reservation.
    ///
    /// On any validation or reservation failure nothing is persisted:
    /// the reservation, the order rows, the payment row, and the voucher
    /// use all live in one transaction.
    pub async fn create_order(&self, draft: OrderDraft) -> EngineResult<OrderDetail> {
        let now = Utc::now();

        // ---- pure validation, before anything touches the database
        validate_item_count(draft.items.len())?;
        validate_required("customer name", &draft.customer.name)?;
        validate_required("customer phone", &draft.customer.phone)?;
        validate_required("recipient", &draft.shipping.recipient)?;
        validate_required("address", &draft.shipping.address_line)?;
        validate_required("city", &draft.shipping.city)?;
        validate_price_cents("shipping fee", draft.shipping.fee_cents)?;
        for item in &draft.items {
            validate_quantity(item.quantity)?;
            validate_price_cents("unit price", item.unit_price_cents)?;
        }

        // ---- catalog pre-check: price drift and advisory availability
        let mut pricings: Vec<(VariantPricing, i64)> = Vec::with_capacity(draft.items.len());
        for item in &draft.items {
            let pricing = self
                .catalog
                .variant_for_pricing(&item.variant_id)
                .await?
                .ok_or_else(|| EngineError::not_found("Variant", &item.variant_id))?;

            validate_price_tolerance(
                &item.variant_id,
                Money::from_cents(item.unit_price_cents),
                Money::from_cents(pricing.unit_price_cents),
                self.price_tolerance,
            )?;

            if pricing.available < item.quantity {
                return Err(EngineError::InsufficientStock {
                    variant_id: pricing.variant_id.clone(),
                    name: pricing.name.clone(),
                    available: pricing.available,
                    requested: item.quantity,
                });
            }

            pricings.push((pricing, item.quantity));
        }

        let subtotal = pricings.iter().fold(Money::zero(), |acc, (p, qty)| {
            acc + Money::from_cents(p.unit_price_cents).multiply_quantity(*qty)
        });
        let shipping_fee = Money::from_cents(draft.shipping.fee_cents);

        // ---- voucher applicability
        let mut voucher: Option<Voucher> = None;
        let mut discount = Money::zero();
        if let Some(code) = &draft.voucher_code {
            let found = self
                .db
                .vouchers()
                .get_by_code(code)
                .await?
                .ok_or_else(|| EngineError::not_found("Voucher", code))?;
            discount = validate_voucher(&found, subtotal, now)?;
            voucher = Some(found);
        }
        // A discount never drives the total negative
        if discount > subtotal + shipping_fee {
            discount = subtotal + shipping_fee;
        }

        let total = subtotal + shipping_fee - discount;
        validate_totals(subtotal, shipping_fee, discount, total)?;

        // ---- assemble the rows
        let order_id = generate_order_id();
        let order = Order {
            id: order_id.clone(),
            order_number: generate_order_number(),
            user_id: draft.customer.user_id.clone(),
            customer_name: draft.customer.name.clone(),
            customer_phone: draft.customer.phone.clone(),
            customer_email: draft.customer.email.clone(),
            subtotal_cents: subtotal.cents(),
            shipping_fee_cents: shipping_fee.cents(),
            discount_cents: discount.cents(),
            total_cents: total.cents(),
            status: OrderStatus::Pending,
            is_paid: false,
            stock_state: StockState::Reserved,
            voucher_id: voucher.as_ref().map(|v| v.id.clone()),
            note: None,
            created_at: now,
            updated_at: now,
            paid_at: None,
            completed_at: None,
            cancelled_at: None,
        };

        let items: Vec<OrderItem> = pricings
            .iter()
            .map(|(pricing, qty)| OrderItem {
                id: Uuid::new_v4().to_string(),
                order_id: order_id.clone(),
                variant_id: pricing.variant_id.clone(),
                product_id: pricing.product_id.clone(),
                sku_snapshot: pricing.sku.clone(),
                name_snapshot: pricing.name.clone(),
                color_snapshot: pricing.color.clone(),
                size_snapshot: pricing.size.clone(),
                unit_price_cents: pricing.unit_price_cents,
                quantity: *qty,
                line_total_cents: pricing.unit_price_cents * qty,
                created_at: now,
            })
            .collect();

        let shipping = Shipping {
            id: Uuid::new_v4().to_string(),
            order_id: order_id.clone(),
            recipient: draft.shipping.recipient.clone(),
            phone: draft.shipping.phone.clone(),
            address_line: draft.shipping.address_line.clone(),
            city: draft.shipping.city.clone(),
            fee_cents: shipping_fee.cents(),
            created_at: now,
        };

        let payment = Payment {
            id: generate_payment_id(),
            order_id: order_id.clone(),
            method: draft.payment_method,
            status: draft.payment_method.initial_status(),
            amount_cents: total.cents(),
            currency: self.store_currency.clone(),
            intent_id: None,
            capture_id: None,
            paid_at: None,
            note: Some(audit_line(now, "payment created")),
            created_at: now,
            updated_at: now,
        };

        let lines: Vec<StockLine> = items
            .iter()
            .map(|i| StockLine::new(i.variant_id.clone(), i.quantity))
            .collect();

        // ---- one transaction: reservation + rows + voucher use
        let mut tx = self.db.begin().await?;

        if let Err(err) = self.db.inventory().reserve_tx(&mut tx, &lines).await {
            tx.rollback().await.map_err(DbError::from)?;
            return Err(Self::attach_stock_names(err, &pricings));
        }

        self.db.orders().insert_tx(&mut tx, &order).await?;
        for item in &items {
            self.db.orders().insert_item_tx(&mut tx, item).await?;
        }
        self.db.orders().insert_shipping_tx(&mut tx, &shipping).await?;
        self.db.payments().insert_tx(&mut tx, &payment).await?;

        if let Some(voucher) = &voucher {
            let consumed = self
                .db
                .vouchers()
                .increment_usage_tx(&mut tx, &voucher.id)
                .await?;
            if !consumed {
                // Another order took the last use between the advisory
                // check and here.
                tx.rollback().await.map_err(DbError::from)?;
                return Err(ValidationError::VoucherNotApplicable {
                    voucher_id: voucher.id.clone(),
                    reason: "voucher usage limit reached".to_string(),
                }
                .into());
            }
        }

        tx.commit().await.map_err(DbError::from)?;

        info!(
            order_id = %order.id,
            order_number = %order.order_number,
            total = %total,
            items = items.len(),
            "Order created"
        );

        Ok(OrderDetail {
            order,
            items,
            payments: vec![payment],
            shipping: Some(shipping),
        })
    }

    /// Attaches product names to a ledger rejection for the user-facing
    /// message; other errors pass through unchanged.
    fn attach_stock_names(err: DbError, pricings: &[(VariantPricing, i64)]) -> EngineError {
        match err {
            DbError::InsufficientStock {
                variant_id,
                available,
                requested,
            } => {
                let name = pricings
                    .iter()
                    .find(|(p, _)| p.variant_id == variant_id)
                    .map(|(p, _)| p.name.clone())
                    .unwrap_or_else(|| variant_id.clone());
                EngineError::InsufficientStock {
                    variant_id,
                    name,
                    available,
                    requested,
                }
            }
            other => other.into(),
        }
    }

    // -------------------------------------------------------------------------
    // Read
    // -------------------------------------------------------------------------

    /// Returns the full order snapshot.
    pub async fn get_order(&self, order_id: &str) -> EngineResult<OrderDetail> {
        let order = self
            .db
            .orders()
            .get_by_id(order_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Order", order_id))?;

        let items = self.db.orders().get_items(order_id).await?;
        let payments = self.db.payments().list_for_order(order_id).await?;
        let shipping = self.db.orders().get_shipping(order_id).await?;

        Ok(OrderDetail {
            order,
            items,
            payments,
            shipping,
        })
    }

    // -------------------------------------------------------------------------
    // Transitions
    // -------------------------------------------------------------------------

    /// Applies a lifecycle event to an order.
    ///
    /// An event that does not match a legal transition for the order's
    /// current state is rejected with `IllegalTransition` and mutates
    /// nothing — a late duplicate "payment succeeded" cannot reopen a
    /// cancelled order.
    pub async fn transition(&self, order_id: &str, event: OrderEvent) -> EngineResult<Order> {
        match event {
            OrderEvent::PaymentSucceeded => {
                let payment = self.require_open_payment(order_id).await?;
                let now = Utc::now();
                let outcome = SettleOutcome::Paid {
                    capture_id: None,
                    paid_at: now,
                    note: audit_line(now, "payment confirmed"),
                };
                self.settle_to_order(order_id, &payment.id, outcome).await
            }
            OrderEvent::PaymentFailed => {
                let payment = self.require_open_payment(order_id).await?;
                let outcome = SettleOutcome::Failed {
                    note: audit_line(Utc::now(), "payment failed"),
                };
                self.settle_to_order(order_id, &payment.id, outcome).await
            }
            OrderEvent::Abandoned => {
                self.cancel_with(order_id, OrderEvent::Abandoned, "abandoned past staleness threshold")
                    .await
            }
            OrderEvent::CancelRequested => {
                self.cancel_with(order_id, OrderEvent::CancelRequested, "cancelled on request")
                    .await
            }
            OrderEvent::Fulfilled => self.complete_order(order_id).await,
        }
    }

    /// Cancels an order on user/admin request before fulfillment.
    ///
    /// Releases an outstanding reservation. If the stock was already
    /// committed (payment went through), the refund is recorded for
    /// manual handling, never automated.
    pub async fn cancel_order(&self, order_id: &str, reason: &str) -> EngineResult<Order> {
        self.cancel_with(order_id, OrderEvent::CancelRequested, reason)
            .await
    }

    /// Marks a processing order fulfilled.
    pub async fn complete_order(&self, order_id: &str) -> EngineResult<Order> {
        let mut tx = self.db.begin().await?;

        let applied = self
            .db
            .orders()
            .transition_tx(&mut tx, order_id, OrderEvent::Fulfilled)
            .await?;
        if !applied {
            tx.rollback().await.map_err(DbError::from)?;
            return Err(self.illegal_order_transition(order_id).await?);
        }

        tx.commit().await.map_err(DbError::from)?;

        info!(order_id = %order_id, "Order completed");
        self.load_order(order_id).await
    }

    /// Shared cancellation path for user cancels and abandonment sweeps.
    async fn cancel_with(
        &self,
        order_id: &str,
        event: OrderEvent,
        reason: &str,
    ) -> EngineResult<Order> {
        let order = self.load_order(order_id).await?;
        let items = self.db.orders().get_items(order_id).await?;
        let lines: Vec<StockLine> = items
            .iter()
            .map(|i| StockLine::new(i.variant_id.clone(), i.quantity))
            .collect();
        let now = Utc::now();

        let mut tx = self.db.begin().await?;

        let applied = self
            .db
            .orders()
            .transition_tx(&mut tx, order_id, event)
            .await?;
        if !applied {
            tx.rollback().await.map_err(DbError::from)?;
            return Err(self.illegal_order_transition(order_id).await?);
        }

        let released = self
            .db
            .inventory()
            .release_tx(&mut tx, order_id, &lines)
            .await?;

        self.db
            .payments()
            .cancel_open_tx(&mut tx, order_id, &audit_line(now, reason))
            .await?;

        self.db
            .orders()
            .append_note_tx(&mut tx, order_id, &audit_line(now, reason))
            .await?;

        if !released && order.stock_state == StockState::Committed {
            // Paid stock stays decremented; the refund is a manual flow.
            warn!(order_id = %order_id, "Cancelled after stock commit, refund required");
            self.db
                .orders()
                .append_note_tx(
                    &mut tx,
                    order_id,
                    &audit_line(now, "stock already committed, refund to be handled manually"),
                )
                .await?;
        }

        tx.commit().await.map_err(DbError::from)?;

        info!(order_id = %order_id, ?event, "Order cancelled");
        self.load_order(order_id).await
    }

    /// Applies a payment outcome, the order transition it implies, and
    /// the matching ledger movement — in ONE transaction.
    ///
    /// Both guards must pass; if either matches zero rows the whole
    /// transaction rolls back and the caller learns who won.
    pub(crate) async fn settle_payment(
        &self,
        order_id: &str,
        payment_id: &str,
        outcome: SettleOutcome,
    ) -> EngineResult<Settlement> {
        let items = self.db.orders().get_items(order_id).await?;
        let lines: Vec<StockLine> = items
            .iter()
            .map(|i| StockLine::new(i.variant_id.clone(), i.quantity))
            .collect();

        let mut tx = self.db.begin().await?;

        let (payment_applied, event) = match &outcome {
            SettleOutcome::Paid {
                capture_id,
                paid_at,
                note,
            } => {
                let applied = self
                    .db
                    .payments()
                    .mark_paid_tx(&mut tx, payment_id, capture_id.as_deref(), *paid_at, note)
                    .await?;
                (applied, OrderEvent::PaymentSucceeded)
            }
            SettleOutcome::Failed { note } => {
                let applied = self
                    .db
                    .payments()
                    .mark_failed_tx(&mut tx, payment_id, note)
                    .await?;
                (applied, OrderEvent::PaymentFailed)
            }
        };

        if !payment_applied {
            tx.rollback().await.map_err(DbError::from)?;
            return Ok(Settlement::PaymentAlreadyTerminal);
        }

        let order_applied = self
            .db
            .orders()
            .transition_tx(&mut tx, order_id, event)
            .await?;
        if !order_applied {
            // The order is already terminal (e.g. the sweeper won the
            // race). Rolling back also undoes the payment write above.
            tx.rollback().await.map_err(DbError::from)?;
            return Ok(Settlement::OrderAlreadyTerminal);
        }

        match event {
            OrderEvent::PaymentSucceeded => {
                self.db.inventory().commit_tx(&mut tx, order_id, &lines).await?;
            }
            _ => {
                self.db.inventory().release_tx(&mut tx, order_id, &lines).await?;
            }
        }

        tx.commit().await.map_err(DbError::from)?;

        debug!(order_id = %order_id, payment_id = %payment_id, "Payment settled");
        let order = self.load_order(order_id).await?;
        Ok(Settlement::Applied(order))
    }

    /// Settlement wrapper that converts race losses into the
    /// IllegalTransition the public `transition` operation promises.
    async fn settle_to_order(
        &self,
        order_id: &str,
        payment_id: &str,
        outcome: SettleOutcome,
    ) -> EngineResult<Order> {
        match self.settle_payment(order_id, payment_id, outcome).await? {
            Settlement::Applied(order) => Ok(order),
            Settlement::PaymentAlreadyTerminal => {
                let payment = self
                    .db
                    .payments()
                    .get_by_id(payment_id)
                    .await?
                    .ok_or_else(|| EngineError::not_found("Payment", payment_id))?;
                Err(EngineError::illegal_transition(
                    "Payment",
                    payment_id,
                    format!("{:?}", payment.status).to_lowercase(),
                ))
            }
            Settlement::OrderAlreadyTerminal => Err(self.illegal_order_transition(order_id).await?),
        }
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    async fn load_order(&self, order_id: &str) -> EngineResult<Order> {
        self.db
            .orders()
            .get_by_id(order_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Order", order_id))
    }

    /// Finds the open payment or reports what state blocks the event.
    async fn require_open_payment(&self, order_id: &str) -> EngineResult<Payment> {
        if let Some(payment) = self.db.payments().get_open(order_id).await? {
            return Ok(payment);
        }

        // Distinguish "unknown order" from "no open payment".
        let _ = self.load_order(order_id).await?;
        Err(EngineError::illegal_transition(
            "Payment",
            order_id,
            "no open payment".to_string(),
        ))
    }

    /// Builds the IllegalTransition error carrying the current status.
    async fn illegal_order_transition(&self, order_id: &str) -> EngineResult<EngineError> {
        let order = self.load_order(order_id).await?;
        Ok(EngineError::illegal_transition(
            "Order",
            order_id,
            format!("{:?}", order.status).to_lowercase(),
        ))
    }
}
