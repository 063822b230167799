//! Abandonment sweeping: staleness selection, stock release, and
//! coexistence with the interactive payment path.

mod common;

use std::time::Duration;

use chrono::Utc;

use atlas_core::{OrderStatus, PaymentMethod, PaymentStatus, StockState};
use atlas_engine::{AbandonmentSweeper, SweepConfig, SweepReport};
use common::*;

fn sweep_config() -> SweepConfig {
    SweepConfig {
        staleness: Duration::from_secs(60 * 60),
        poll_interval: Duration::from_secs(60),
        batch_size: 200,
    }
}

#[tokio::test]
async fn sweep_cancels_only_stale_pending_orders() {
    // An order created 90 minutes ago with threshold 60 is swept; one
    // created 30 minutes ago is untouched by the same run.
    let h = harness().await;
    seed_variant(&h.db, "var-tee", "Classic Tee", 1999, 10).await;

    let stale = h
        .service
        .create_order(draft(&[("var-tee", 2, 1999)], PaymentMethod::Gateway))
        .await
        .unwrap();
    backdate_order(&h.db, &stale.order.id, Utc::now() - chrono::Duration::minutes(90)).await;

    let fresh = h
        .service
        .create_order(draft(&[("var-tee", 1, 1999)], PaymentMethod::Gateway))
        .await
        .unwrap();
    backdate_order(&h.db, &fresh.order.id, Utc::now() - chrono::Duration::minutes(30)).await;

    assert_eq!(counters(&h.db, "var-tee").await, (7, 3));

    let (sweeper, _handle) = AbandonmentSweeper::new(h.service.clone(), sweep_config());
    let report = sweeper.sweep_once().await.unwrap();
    assert_eq!(
        report,
        SweepReport {
            scanned: 1,
            cancelled: 1,
            lost_races: 0
        }
    );

    // The stale order is terminal with its stock back and its payment
    // cancelled, with an audit note
    let swept = h.service.get_order(&stale.order.id).await.unwrap();
    assert_eq!(swept.order.status, OrderStatus::Cancelled);
    assert_eq!(swept.order.stock_state, StockState::Released);
    assert!(swept.order.note.as_deref().unwrap().contains("abandoned"));
    assert_eq!(swept.payments[0].status, PaymentStatus::Cancelled);

    // The fresh order is untouched
    let kept = h.service.get_order(&fresh.order.id).await.unwrap();
    assert_eq!(kept.order.status, OrderStatus::Pending);
    assert_eq!(kept.payments[0].status, PaymentStatus::Pending);

    // Only the stale order's two units came back
    assert_eq!(counters(&h.db, "var-tee").await, (9, 1));
}

#[tokio::test]
async fn sweep_is_idempotent_across_runs() {
    let h = harness().await;
    seed_variant(&h.db, "var-tee", "Classic Tee", 1999, 10).await;

    let stale = h
        .service
        .create_order(draft(&[("var-tee", 2, 1999)], PaymentMethod::Gateway))
        .await
        .unwrap();
    backdate_order(&h.db, &stale.order.id, Utc::now() - chrono::Duration::minutes(90)).await;

    let (sweeper, _handle) = AbandonmentSweeper::new(h.service.clone(), sweep_config());

    let first = sweeper.sweep_once().await.unwrap();
    assert_eq!(first.cancelled, 1);

    // A cancelled order no longer matches the stale-pending selection
    let second = sweeper.sweep_once().await.unwrap();
    assert_eq!(
        second,
        SweepReport {
            scanned: 0,
            cancelled: 0,
            lost_races: 0
        }
    );

    assert_eq!(counters(&h.db, "var-tee").await, (10, 0));
}

#[tokio::test]
async fn sweep_never_touches_paid_orders() {
    // A stale order whose payment completed is excluded by the
    // selection; a captured order is not PENDING anyway. Either way the
    // sweep leaves paid work alone.
    let h = harness().await;
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
    h.reconciler
        .confirm_capture(&detail.order.id, &intent.intent_id)
        .await
        .unwrap();

    backdate_order(&h.db, &detail.order.id, Utc::now() - chrono::Duration::minutes(90)).await;

    let (sweeper, _handle) = AbandonmentSweeper::new(h.service.clone(), sweep_config());
    let report = sweeper.sweep_once().await.unwrap();
    assert_eq!(report.scanned, 0);

    let kept = h.service.get_order(&detail.order.id).await.unwrap();
    assert_eq!(kept.order.status, OrderStatus::Processing);
    assert_eq!(kept.order.stock_state, StockState::Committed);
}

#[tokio::test]
async fn late_capture_after_sweep_is_rejected_not_applied() {
    // The sweeper wins the race; the capture confirmation that arrives
    // afterwards must not reopen the order or move stock again.
    let h = harness().await;
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

    backdate_order(&h.db, &detail.order.id, Utc::now() - chrono::Duration::minutes(90)).await;
    let (sweeper, _handle) = AbandonmentSweeper::new(h.service.clone(), sweep_config());
    assert_eq!(sweeper.sweep_once().await.unwrap().cancelled, 1);

    // The payment was cancelled by the sweep, so the late confirmation
    // replays the recorded (cancelled) outcome without a gateway call.
    let outcome = h
        .reconciler
        .confirm_capture(&detail.order.id, &intent.intent_id)
        .await
        .unwrap();
    assert!(outcome.replayed);
    assert_eq!(outcome.status, PaymentStatus::Cancelled);
    assert_eq!(h.gateway.capture_calls(), 0);

    let after = h.service.get_order(&detail.order.id).await.unwrap();
    assert_eq!(after.order.status, OrderStatus::Cancelled);
    assert_eq!(counters(&h.db, "var-tee").await, (10, 0));
}

#[tokio::test]
async fn run_loop_sweeps_and_shuts_down() {
    let h = harness().await;
    seed_variant(&h.db, "var-tee", "Classic Tee", 1999, 10).await;

    let stale = h
        .service
        .create_order(draft(&[("var-tee", 1, 1999)], PaymentMethod::Gateway))
        .await
        .unwrap();
    backdate_order(&h.db, &stale.order.id, Utc::now() - chrono::Duration::minutes(90)).await;

    let config = SweepConfig {
        staleness: Duration::from_secs(60 * 60),
        poll_interval: Duration::from_millis(20),
        batch_size: 200,
    };
    let (sweeper, handle) = AbandonmentSweeper::new(h.service.clone(), config);
    let task = tokio::spawn(sweeper.run());

    // The first interval tick fires immediately; give it a moment
    tokio::time::sleep(Duration::from_millis(200)).await;

    let swept = h.service.get_order(&stale.order.id).await.unwrap();
    assert_eq!(swept.order.status, OrderStatus::Cancelled);

    handle.shutdown().await;
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("sweeper did not shut down")
        .unwrap();
}
