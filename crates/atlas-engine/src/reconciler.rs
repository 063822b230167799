//! # Payment Reconciler
//!
//! Bridges the Order State Machine and the external payment gateway, and
//! guarantees IDEMPOTENT handling of capture confirmations no matter how
//! many times the webhook or a manual capture endpoint fires.
//!
//! ## Capture Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     confirm_capture(order, intent)                      │
//! │                                                                         │
//! │  payment already terminal? ──yes──► return RECORDED outcome            │
//! │        │                            (replayed = true, NO gateway call) │
//! │        no                                                               │
//! │        ▼                                                                │
//! │  gateway.capture(intent)  [bounded by timeout]                         │
//! │        │                                                                │
//! │        ├── error / timeout ──► GatewayUnavailable                      │
//! │        │                       payment stays PENDING: the gateway may  │
//! │        │                       still be finalizing, and failing it     │
//! │        │                       here could release stock that was in    │
//! │        │                       fact sold. Caller retries later.        │
//! │        │                                                                │
//! │        ├── status COMPLETED ──► settle: payment PAID + order           │
//! │        │                        PROCESSING + stock committed (one tx)  │
//! │        │                                                                │
//! │        └── any other status ──► settle: payment FAILED + order         │
//! │                                 CANCELLED + stock released (one tx)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::{info, warn};

use atlas_core::{Money, OrderStatus, Payment, PaymentMethod, PaymentStatus};
use atlas_db::repository::payment::{audit_line, generate_payment_id};
use atlas_db::DbError;

use crate::config::GatewayConfig;
use crate::error::{EngineError, EngineResult};
use crate::gateway::{CreateIntentRequest, GatewayClient, GatewayIntent};
use crate::orders::{OrderService, Settlement, SettleOutcome};

// =============================================================================
// Capture Outcome
// =============================================================================

/// The explicit result of a capture confirmation.
///
/// Idempotent replays return the previously recorded outcome with
/// `replayed = true` — never a generic "OK" that hides which branch ran.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureOutcome {
    pub order_id: String,
    pub payment_id: String,
    pub status: PaymentStatus,
    pub capture_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub replayed: bool,
}

impl CaptureOutcome {
    fn recorded(payment: &Payment, replayed: bool) -> Self {
        CaptureOutcome {
            order_id: payment.order_id.clone(),
            payment_id: payment.id.clone(),
            status: payment.status,
            capture_id: payment.capture_id.clone(),
            paid_at: payment.paid_at,
            replayed,
        }
    }
}

// =============================================================================
// Payment Reconciler
// =============================================================================

/// Drives the payment lifecycle against the external gateway.
///
/// The exchange rate, minimum charge, and call timeout are explicit
/// construction inputs — the reconciler reads no ambient configuration.
pub struct PaymentReconciler {
    service: OrderService,
    gateway: Arc<dyn GatewayClient>,
    config: GatewayConfig,
}

impl PaymentReconciler {
    /// Creates a payment reconciler.
    pub fn new(
        service: OrderService,
        gateway: Arc<dyn GatewayClient>,
        config: GatewayConfig,
    ) -> Self {
        PaymentReconciler {
            service,
            gateway,
            config,
        }
    }

    // -------------------------------------------------------------------------
    // Open
    // -------------------------------------------------------------------------

    /// Opens a gateway intent for the order's pending payment and returns
    /// the approval link for the buyer.
    ///
    /// The payable amount is a pure function of the order total and the
    /// configured exchange rate, clamped to the gateway minimum charge.
    pub async fn open_gateway_payment(&self, order_id: &str) -> EngineResult<GatewayIntent> {
        let db = self.service.db();

        let order = db
            .orders()
            .get_by_id(order_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Order", order_id))?;
        if order.status != OrderStatus::Pending {
            return Err(EngineError::illegal_transition(
                "Order",
                order_id,
                format!("{:?}", order.status).to_lowercase(),
            ));
        }

        let payment = db
            .payments()
            .get_open(order_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Payment", order_id))?;
        if payment.method != PaymentMethod::Gateway {
            return Err(EngineError::illegal_transition(
                "Payment",
                &payment.id,
                "cash on delivery".to_string(),
            ));
        }
        if payment.intent_id.is_some() {
            return Err(EngineError::illegal_transition(
                "Payment",
                &payment.id,
                "pending with an open intent".to_string(),
            ));
        }

        let amount = order.total().to_settlement(
            self.config.exchange_rate,
            Money::from_cents(self.config.minimum_charge_cents),
        );

        let request = CreateIntentRequest {
            amount_cents: amount.cents(),
            currency: self.config.settlement_currency.clone(),
            reference: order.order_number.clone(),
        };

        let intent = match timeout(self.config.capture_timeout, self.gateway.create_intent(request))
            .await
        {
            Err(_) => return Err(EngineError::gateway_unavailable("create intent timed out")),
            Ok(Err(err)) => return Err(EngineError::gateway_unavailable(err.to_string())),
            Ok(Ok(intent)) => intent,
        };

        let recorded = db.payments().set_intent(&payment.id, &intent.intent_id).await?;
        if !recorded {
            // A concurrent open beat us to the row; its intent stands.
            return Err(EngineError::illegal_transition(
                "Payment",
                &payment.id,
                "pending with an open intent".to_string(),
            ));
        }

        info!(
            order_id = %order_id,
            payment_id = %payment.id,
            intent_id = %intent.intent_id,
            amount = %amount,
            "Gateway payment opened"
        );

        Ok(intent)
    }

    // -------------------------------------------------------------------------
    // Confirm
    // -------------------------------------------------------------------------

    /// Confirms a capture for the given intent, idempotently.
    ///
    /// See the module diagram for the full decision tree. Both the
    /// webhook and the manual capture endpoint call this; calling it
    /// twice yields the same terminal outcome, and the gateway is not
    /// invoked again once the payment is terminal.
    pub async fn confirm_capture(
        &self,
        order_id: &str,
        intent_id: &str,
    ) -> EngineResult<CaptureOutcome> {
        let db = self.service.db();

        // Resolve the payment carrying this intent (terminal ones too:
        // replays must find the recorded outcome).
        let payment = db
            .payments()
            .list_for_order(order_id)
            .await?
            .into_iter()
            .rev()
            .find(|p| p.intent_id.as_deref() == Some(intent_id));
        let payment = match payment {
            Some(payment) => payment,
            None => {
                // Unknown order id and unknown intent read the same from
                // here; tell them apart for the caller.
                let _ = db
                    .orders()
                    .get_by_id(order_id)
                    .await?
                    .ok_or_else(|| EngineError::not_found("Order", order_id))?;
                return Err(EngineError::not_found("Payment", intent_id));
            }
        };

        // Idempotency guard: a terminal payment already has its outcome.
        if payment.is_terminal() {
            info!(
                order_id = %order_id,
                payment_id = %payment.id,
                status = ?payment.status,
                "Capture replay, returning recorded outcome"
            );
            return Ok(CaptureOutcome::recorded(&payment, true));
        }

        // One bounded gateway call. Errors and timeouts leave the
        // payment in its prior state for a later retry.
        let capture = match timeout(self.config.capture_timeout, self.gateway.capture(intent_id))
            .await
        {
            Err(_) => return Err(EngineError::gateway_unavailable("capture timed out")),
            Ok(Err(err)) => return Err(EngineError::gateway_unavailable(err.to_string())),
            Ok(Ok(capture)) => capture,
        };

        let now = Utc::now();
        if capture.is_completed() {
            let outcome = SettleOutcome::Paid {
                capture_id: Some(capture.capture_id.clone()),
                paid_at: capture.captured_at,
                note: audit_line(now, &format!("capture {} confirmed", capture.capture_id)),
            };

            match self.service.settle_payment(order_id, &payment.id, outcome).await? {
                Settlement::Applied(order) => {
                    info!(order_id = %order_id, capture_id = %capture.capture_id, "Capture confirmed");
                    Ok(CaptureOutcome {
                        order_id: order.id,
                        payment_id: payment.id,
                        status: PaymentStatus::Paid,
                        capture_id: Some(capture.capture_id),
                        paid_at: Some(capture.captured_at),
                        replayed: false,
                    })
                }
                Settlement::PaymentAlreadyTerminal => self.recorded_outcome(&payment.id).await,
                Settlement::OrderAlreadyTerminal => {
                    self.flag_capture_after_terminal(order_id, &capture.capture_id)
                        .await
                }
            }
        } else {
            let outcome = SettleOutcome::Failed {
                note: audit_line(now, &format!("capture returned {}", capture.status)),
            };

            match self.service.settle_payment(order_id, &payment.id, outcome).await? {
                Settlement::Applied(order) => {
                    info!(order_id = %order_id, status = %capture.status, "Capture failed");
                    Ok(CaptureOutcome {
                        order_id: order.id,
                        payment_id: payment.id,
                        status: PaymentStatus::Failed,
                        capture_id: None,
                        paid_at: None,
                        replayed: false,
                    })
                }
                Settlement::PaymentAlreadyTerminal => self.recorded_outcome(&payment.id).await,
                Settlement::OrderAlreadyTerminal => {
                    let order = self.service.get_order(order_id).await?.order;
                    Err(EngineError::illegal_transition(
                        "Order",
                        order_id,
                        format!("{:?}", order.status).to_lowercase(),
                    ))
                }
            }
        }
    }

    /// Re-reads a payment another writer drove terminal and returns its
    /// recorded outcome as a replay.
    async fn recorded_outcome(&self, payment_id: &str) -> EngineResult<CaptureOutcome> {
        let payment = self
            .service
            .db()
            .payments()
            .get_by_id(payment_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Payment", payment_id))?;
        Ok(CaptureOutcome::recorded(&payment, true))
    }

    /// The gateway charged the buyer but the order reached a terminal
    /// state first (abandonment sweep won the race). Local state stays
    /// terminal; the charge is flagged for manual refund.
    async fn flag_capture_after_terminal(
        &self,
        order_id: &str,
        capture_id: &str,
    ) -> EngineResult<CaptureOutcome> {
        warn!(
            order_id = %order_id,
            capture_id = %capture_id,
            "Gateway captured after order reached terminal state, refund required"
        );

        let db = self.service.db();
        let mut tx = db.begin().await?;
        db.orders()
            .append_note_tx(
                &mut tx,
                order_id,
                &audit_line(
                    Utc::now(),
                    &format!("gateway capture {capture_id} arrived after terminal state, refund to be handled manually"),
                ),
            )
            .await?;
        tx.commit().await.map_err(DbError::from)?;

        let order = self.service.get_order(order_id).await?.order;
        Err(EngineError::illegal_transition(
            "Order",
            order_id,
            format!("{:?}", order.status).to_lowercase(),
        ))
    }

    // -------------------------------------------------------------------------
    // Retry
    // -------------------------------------------------------------------------

    /// Replaces the order's open payment with a fresh one using a new
    /// method, re-entering the method-specific flow.
    ///
    /// Keeps the single-non-terminal-payment invariant: the cancel and
    /// the insert share one transaction.
    pub async fn retry_payment(
        &self,
        order_id: &str,
        new_method: PaymentMethod,
    ) -> EngineResult<Payment> {
        let db = self.service.db();

        let order = db
            .orders()
            .get_by_id(order_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Order", order_id))?;
        if order.status != OrderStatus::Pending {
            return Err(EngineError::illegal_transition(
                "Order",
                order_id,
                format!("{:?}", order.status).to_lowercase(),
            ));
        }

        let now = Utc::now();
        let payment = Payment {
            id: generate_payment_id(),
            order_id: order_id.to_string(),
            method: new_method,
            status: new_method.initial_status(),
            amount_cents: order.total_cents,
            currency: self.service.store_currency().to_string(),
            intent_id: None,
            capture_id: None,
            paid_at: None,
            note: Some(audit_line(now, "payment created (retry)")),
            created_at: now,
            updated_at: now,
        };

        let mut tx = db.begin().await?;
        db.payments()
            .cancel_open_tx(&mut tx, order_id, &audit_line(now, "superseded by retry"))
            .await?;
        db.payments().insert_tx(&mut tx, &payment).await?;
        tx.commit().await.map_err(DbError::from)?;

        info!(
            order_id = %order_id,
            payment_id = %payment.id,
            method = ?new_method,
            "Payment retried"
        );

        Ok(payment)
    }
}
