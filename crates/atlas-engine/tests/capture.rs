//! Payment reconciliation: capture outcomes, idempotency, retries, and
//! the settlement-currency conversion.

mod common;

use atlas_core::money::ExchangeRate;
use atlas_core::{OrderStatus, PaymentMethod, PaymentStatus, StockState};
use atlas_core::state::OrderEvent;
use atlas_engine::EngineError;
use common::*;

/// Creates a gateway order for 2 tees and opens its payment intent.
/// Returns (order_id, intent_id).
async fn open_order(h: &Harness) -> (String, String) {
    seed_variant(&h.db, "var-tee", "Classic Tee", 1999, 10).await;

    let detail = h
        .service
        .create_order(draft(&[("var-tee", 2, 1999)], PaymentMethod::Gateway))
        .await
        .unwrap();

    let intent = h
        .reconciler
        .open_gateway_payment(&detail.order.id)
        .await
        .unwrap();

    (detail.order.id, intent.intent_id)
}

#[tokio::test]
async fn capture_completed_commits_stock() {
    // Gateway answers COMPLETED: payment PAID, order PROCESSING,
    // reservation becomes a permanent decrement.
    let h = harness().await;
    let (order_id, intent_id) = open_order(&h).await;
    assert_eq!(counters(&h.db, "var-tee").await, (8, 2));

    let outcome = h.reconciler.confirm_capture(&order_id, &intent_id).await.unwrap();
    assert_eq!(outcome.status, PaymentStatus::Paid);
    assert!(outcome.capture_id.is_some());
    assert!(outcome.paid_at.is_some());
    assert!(!outcome.replayed);

    let detail = h.service.get_order(&order_id).await.unwrap();
    assert_eq!(detail.order.status, OrderStatus::Processing);
    assert!(detail.order.is_paid);
    assert!(detail.order.paid_at.is_some());
    assert_eq!(detail.order.stock_state, StockState::Committed);

    // reserved drops to 0, available stays at its reserved-time value
    assert_eq!(counters(&h.db, "var-tee").await, (8, 0));
}

#[tokio::test]
async fn capture_declined_releases_stock() {
    // Gateway answers DECLINED: payment FAILED, order CANCELLED,
    // availability restored to the pre-reservation level.
    let h = harness().await;
    let (order_id, intent_id) = open_order(&h).await;
    h.gateway.script_capture(CaptureScript::Status("DECLINED"));

    let outcome = h.reconciler.confirm_capture(&order_id, &intent_id).await.unwrap();
    assert_eq!(outcome.status, PaymentStatus::Failed);
    assert!(outcome.capture_id.is_none());
    assert!(!outcome.replayed);

    let detail = h.service.get_order(&order_id).await.unwrap();
    assert_eq!(detail.order.status, OrderStatus::Cancelled);
    assert!(!detail.order.is_paid);
    assert_eq!(detail.order.stock_state, StockState::Released);

    assert_eq!(counters(&h.db, "var-tee").await, (10, 0));
}

#[tokio::test]
async fn capture_is_idempotent_and_gateway_called_once() {
    let h = harness().await;
    let (order_id, intent_id) = open_order(&h).await;

    let first = h.reconciler.confirm_capture(&order_id, &intent_id).await.unwrap();
    assert_eq!(h.gateway.capture_calls(), 1);

    // The replay returns the recorded outcome without a second call
    let second = h.reconciler.confirm_capture(&order_id, &intent_id).await.unwrap();
    assert_eq!(h.gateway.capture_calls(), 1);

    assert!(second.replayed);
    assert_eq!(second.status, first.status);
    assert_eq!(second.capture_id, first.capture_id);
    assert_eq!(second.payment_id, first.payment_id);

    // Counters did not move twice
    assert_eq!(counters(&h.db, "var-tee").await, (8, 0));
}

#[tokio::test]
async fn failed_capture_replay_returns_recorded_failure() {
    let h = harness().await;
    let (order_id, intent_id) = open_order(&h).await;
    h.gateway.script_capture(CaptureScript::Status("DECLINED"));

    h.reconciler.confirm_capture(&order_id, &intent_id).await.unwrap();

    let replay = h.reconciler.confirm_capture(&order_id, &intent_id).await.unwrap();
    assert!(replay.replayed);
    assert_eq!(replay.status, PaymentStatus::Failed);
    assert_eq!(h.gateway.capture_calls(), 1);

    // Stock was released exactly once
    assert_eq!(counters(&h.db, "var-tee").await, (10, 0));
}

#[tokio::test]
async fn gateway_error_leaves_payment_pending_for_retry() {
    // A transport failure is NOT a decline: no state changes, and a
    // later retry can still capture.
    let h = harness().await;
    let (order_id, intent_id) = open_order(&h).await;
    h.gateway.script_capture(CaptureScript::TransportError);

    let err = h.reconciler.confirm_capture(&order_id, &intent_id).await.unwrap_err();
    assert!(matches!(err, EngineError::GatewayUnavailable { .. }));

    let detail = h.service.get_order(&order_id).await.unwrap();
    assert_eq!(detail.order.status, OrderStatus::Pending);
    assert_eq!(detail.payments[0].status, PaymentStatus::Pending);
    assert_eq!(detail.order.stock_state, StockState::Reserved);
    assert_eq!(counters(&h.db, "var-tee").await, (8, 2));

    // Retry after the outage succeeds
    let outcome = h.reconciler.confirm_capture(&order_id, &intent_id).await.unwrap();
    assert_eq!(outcome.status, PaymentStatus::Paid);
    assert!(!outcome.replayed);
    assert_eq!(counters(&h.db, "var-tee").await, (8, 0));
}

#[tokio::test]
async fn settlement_conversion_clamps_to_minimum() {
    // Store prices in a low-denomination currency: 240 store cents per
    // settlement cent, gateway minimum 100 settlement cents.
    let mut config = test_config();
    config.store_currency = "VND".to_string();
    config.gateway.exchange_rate = ExchangeRate::from_store_cents(240);
    config.gateway.minimum_charge_cents = 100;
    let h = harness_with(config).await;

    seed_variant(&h.db, "var-tee", "Classic Tee", 119_500, 10).await;

    let detail = h
        .service
        .create_order(draft(&[("var-tee", 1, 119_500)], PaymentMethod::Gateway))
        .await
        .unwrap();

    h.reconciler.open_gateway_payment(&detail.order.id).await.unwrap();

    let requests = h.gateway.intent_requests();
    assert_eq!(requests.len(), 1);
    // total = 119,500 + 500 shipping = 120,000 → 120,000 / 240 = 500
    assert_eq!(requests[0].amount_cents, 500);
    assert_eq!(requests[0].currency, "USD");
    assert_eq!(requests[0].reference, detail.order.order_number);

    // A tiny order clamps up to the gateway minimum
    seed_variant(&h.db, "var-pin", "Enamel Pin", 2_000, 10).await;
    let mut tiny = draft(&[("var-pin", 1, 2_000)], PaymentMethod::Gateway);
    tiny.shipping.fee_cents = 0;
    let tiny = h.service.create_order(tiny).await.unwrap();

    h.reconciler.open_gateway_payment(&tiny.order.id).await.unwrap();
    let requests = h.gateway.intent_requests();
    assert_eq!(requests[1].amount_cents, 100);
}

#[tokio::test]
async fn open_payment_records_intent_and_refuses_a_second() {
    let h = harness().await;
    let (order_id, intent_id) = open_order(&h).await;

    let payment = h.db.payments().get_open(&order_id).await.unwrap().unwrap();
    assert_eq!(payment.intent_id.as_deref(), Some(intent_id.as_str()));

    let err = h.reconciler.open_gateway_payment(&order_id).await.unwrap_err();
    assert!(matches!(err, EngineError::IllegalTransition { .. }));
    assert_eq!(h.gateway.create_calls(), 1);
}

#[tokio::test]
async fn open_payment_rejects_cod_orders() {
    let h = harness().await;
    seed_variant(&h.db, "var-tee", "Classic Tee", 1999, 10).await;

    let detail = h
        .service
        .create_order(draft(&[("var-tee", 1, 1999)], PaymentMethod::CashOnDelivery))
        .await
        .unwrap();

    let err = h.reconciler.open_gateway_payment(&detail.order.id).await.unwrap_err();
    assert!(matches!(err, EngineError::IllegalTransition { .. }));
    assert_eq!(h.gateway.create_calls(), 0);
}

#[tokio::test]
async fn retry_payment_swaps_method_and_keeps_one_open() {
    let h = harness().await;
    let (order_id, _intent_id) = open_order(&h).await;

    let replacement = h
        .reconciler
        .retry_payment(&order_id, PaymentMethod::CashOnDelivery)
        .await
        .unwrap();
    assert_eq!(replacement.status, PaymentStatus::Unpaid);
    assert_eq!(replacement.method, PaymentMethod::CashOnDelivery);

    let payments = h.db.payments().list_for_order(&order_id).await.unwrap();
    assert_eq!(payments.len(), 2);
    assert_eq!(payments[0].status, PaymentStatus::Cancelled);

    let open = h.db.payments().get_open(&order_id).await.unwrap().unwrap();
    assert_eq!(open.id, replacement.id);

    // The replaced COD payment settles through the same transition path
    let order = h
        .service
        .transition(&order_id, OrderEvent::PaymentSucceeded)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Processing);
    assert_eq!(order.stock_state, StockState::Committed);
    assert_eq!(counters(&h.db, "var-tee").await, (8, 0));
}

#[tokio::test]
async fn retry_is_rejected_once_paid() {
    let h = harness().await;
    let (order_id, intent_id) = open_order(&h).await;
    h.reconciler.confirm_capture(&order_id, &intent_id).await.unwrap();

    let err = h
        .reconciler
        .retry_payment(&order_id, PaymentMethod::CashOnDelivery)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::IllegalTransition { .. }));
}

#[tokio::test]
async fn terminal_order_locks_in() {
    let h = harness().await;
    let (order_id, intent_id) = open_order(&h).await;

    h.reconciler.confirm_capture(&order_id, &intent_id).await.unwrap();
    let completed = h.service.complete_order(&order_id).await.unwrap();
    assert_eq!(completed.status, OrderStatus::Completed);
    assert!(completed.completed_at.is_some());

    // Every further event is rejected and the fields stay put
    for event in [
        OrderEvent::PaymentSucceeded,
        OrderEvent::PaymentFailed,
        OrderEvent::Abandoned,
        OrderEvent::CancelRequested,
        OrderEvent::Fulfilled,
    ] {
        let err = h.service.transition(&order_id, event).await.unwrap_err();
        assert!(matches!(err, EngineError::IllegalTransition { .. }));
    }

    let after = h.service.get_order(&order_id).await.unwrap().order;
    assert_eq!(after.status, OrderStatus::Completed);
    assert_eq!(after.completed_at, completed.completed_at);
    assert_eq!(after.paid_at, completed.paid_at);
}

#[tokio::test]
async fn unknown_order_and_intent_are_typed_errors() {
    let h = harness().await;
    let (order_id, _intent) = open_order(&h).await;

    let err = h.reconciler.confirm_capture("ghost", "intent-1").await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound { entity: "Order", .. }));

    let err = h.reconciler.confirm_capture(&order_id, "wrong-intent").await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound { entity: "Payment", .. }));

    assert_eq!(h.gateway.capture_calls(), 0);
}
