//! # Abandonment Sweeper
//!
//! Periodic task that finds stale pending orders and drives them to
//! `CANCELLED`, releasing their reservations.
//!
//! ## Sweep Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Abandonment Sweeper                                │
//! │                                                                         │
//! │  every poll_interval:                                                  │
//! │                                                                         │
//! │  1. Select: orders PENDING, created_at < now - staleness,              │
//! │             no PAID payment (batch-limited)                            │
//! │                                                                         │
//! │  2. For each candidate:                                                │
//! │     transition(order, Abandoned)                                       │
//! │         ├── applied   → stock released, payment cancelled,             │
//! │         │               audit note stamped                             │
//! │         └── rejected  → a payment completed between the select        │
//! │                         and the guard: the interactive path won,      │
//! │                         the sweep SKIPS the order. Same primitives,   │
//! │                         so the race can only resolve one way.         │
//! │                                                                         │
//! │  Safe to run concurrently with live checkout traffic: it only acts    │
//! │  on orders strictly older than the threshold, and only through the    │
//! │  guarded transition.                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::config::SweepConfig;
use crate::error::{EngineError, EngineResult};
use crate::orders::OrderService;
use atlas_core::state::OrderEvent;

// =============================================================================
// Sweep Report
// =============================================================================

/// What a single sweep run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Stale candidates selected.
    pub scanned: usize,
    /// Orders driven to cancelled.
    pub cancelled: usize,
    /// Candidates whose transition was rejected (payment completed
    /// between the select and the guard).
    pub lost_races: usize,
}

// =============================================================================
// Abandonment Sweeper
// =============================================================================

/// Background task cancelling abandoned checkouts.
pub struct AbandonmentSweeper {
    service: OrderService,
    config: SweepConfig,
    shutdown_rx: mpsc::Receiver<()>,
}

/// Handle for controlling a running sweeper.
#[derive(Clone)]
pub struct SweeperHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl SweeperHandle {
    /// Triggers graceful shutdown.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

impl AbandonmentSweeper {
    /// Creates a sweeper and its control handle.
    pub fn new(service: OrderService, config: SweepConfig) -> (Self, SweeperHandle) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let sweeper = AbandonmentSweeper {
            service,
            config,
            shutdown_rx,
        };

        (sweeper, SweeperHandle { shutdown_tx })
    }

    /// Runs the sweep loop.
    ///
    /// This should be spawned as a background task.
    pub async fn run(mut self) {
        info!(
            staleness_secs = self.config.staleness.as_secs(),
            poll_secs = self.config.poll_interval.as_secs(),
            "Abandonment sweeper starting"
        );

        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.sweep_once().await {
                        Ok(report) if report.scanned > 0 => {
                            info!(
                                scanned = report.scanned,
                                cancelled = report.cancelled,
                                lost_races = report.lost_races,
                                "Sweep complete"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => {
                            error!(?e, "Sweep run failed");
                        }
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Abandonment sweeper shutting down");
                    break;
                }
            }
        }

        info!("Abandonment sweeper stopped");
    }

    /// Performs one sweep over the stale pending orders.
    pub async fn sweep_once(&self) -> EngineResult<SweepReport> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(self.config.staleness)
                .unwrap_or_else(|_| chrono::Duration::hours(1));

        let candidates = self
            .service
            .db()
            .orders()
            .find_stale_pending(cutoff, self.config.batch_size)
            .await?;

        let mut report = SweepReport {
            scanned: candidates.len(),
            ..SweepReport::default()
        };

        for order_id in candidates {
            match self.service.transition(&order_id, OrderEvent::Abandoned).await {
                Ok(_) => {
                    debug!(order_id = %order_id, "Abandoned order swept");
                    report.cancelled += 1;
                }
                Err(EngineError::IllegalTransition { .. }) => {
                    // The interactive path reached the terminal guard
                    // first; this order is no longer ours to cancel.
                    debug!(order_id = %order_id, "Sweep lost the race, skipping");
                    report.lost_races += 1;
                }
                Err(e) => {
                    error!(order_id = %order_id, ?e, "Failed to sweep order");
                }
            }
        }

        Ok(report)
    }
}
