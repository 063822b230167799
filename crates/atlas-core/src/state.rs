//! # Order State Machine
//!
//! The pure transition table for order lifecycles. Every layer above —
//! the order service, the payment reconciler, the abandonment sweeper —
//! consults this table; none of them encode transitions of their own.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Order Lifecycle                                  │
//! │                                                                         │
//! │               PaymentSucceeded          Fulfilled                       │
//! │   ┌─────────┐ ───────────────► ┌────────────┐ ─────► ┌───────────┐     │
//! │   │ PENDING │                  │ PROCESSING │        │ COMPLETED │     │
//! │   └────┬────┘                  └─────┬──────┘        └───────────┘     │
//! │        │                             │                   terminal      │
//! │        │ PaymentFailed               │ CancelRequested                 │
//! │        │ Abandoned                   │                                 │
//! │        │ CancelRequested             ▼                                 │
//! │        │                       ┌───────────┐                           │
//! │        └──────────────────────►│ CANCELLED │  terminal                 │
//! │                                └───────────┘                           │
//! │                                                                         │
//! │  Terminal states admit NO transition. The first writer to reach one    │
//! │  wins; later conflicting writers are rejected, never merged.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::types::OrderStatus;

// =============================================================================
// Order Events
// =============================================================================

/// An event that may move an order between statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderEvent {
    /// The payment for this order was captured.
    PaymentSucceeded,
    /// The gateway declined the capture.
    PaymentFailed,
    /// The abandonment sweeper timed the order out.
    Abandoned,
    /// A user or admin cancelled the order.
    CancelRequested,
    /// Fulfillment finished (picked, shipped, delivered).
    Fulfilled,
}

impl OrderEvent {
    /// The statuses this event may legally fire from.
    ///
    /// The persistence layer turns this slice into the `WHERE status IN`
    /// guard of a conditional update, so the pure table here and the
    /// atomic check in the database can never disagree.
    pub const fn source_statuses(&self) -> &'static [OrderStatus] {
        match self {
            OrderEvent::PaymentSucceeded => &[OrderStatus::Pending],
            OrderEvent::PaymentFailed => &[OrderStatus::Pending],
            OrderEvent::Abandoned => &[OrderStatus::Pending],
            OrderEvent::CancelRequested => &[OrderStatus::Pending, OrderStatus::Processing],
            OrderEvent::Fulfilled => &[OrderStatus::Processing],
        }
    }

    /// The status this event lands in.
    pub const fn target_status(&self) -> OrderStatus {
        match self {
            OrderEvent::PaymentSucceeded => OrderStatus::Processing,
            OrderEvent::PaymentFailed => OrderStatus::Cancelled,
            OrderEvent::Abandoned => OrderStatus::Cancelled,
            OrderEvent::CancelRequested => OrderStatus::Cancelled,
            OrderEvent::Fulfilled => OrderStatus::Completed,
        }
    }
}

// =============================================================================
// Transition Table
// =============================================================================

impl OrderStatus {
    /// Whether this status admits no further transitions.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// Applies an event to this status.
    ///
    /// Returns the resulting status, or `None` when the event does not
    /// match a legal transition (the caller rejects it, it is never
    /// silently applied).
    pub fn next(&self, event: OrderEvent) -> Option<OrderStatus> {
        if event.source_statuses().contains(self) {
            Some(event.target_status())
        } else {
            None
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let pending = OrderStatus::Pending;
        let processing = pending.next(OrderEvent::PaymentSucceeded).unwrap();
        assert_eq!(processing, OrderStatus::Processing);

        let completed = processing.next(OrderEvent::Fulfilled).unwrap();
        assert_eq!(completed, OrderStatus::Completed);
    }

    #[test]
    fn test_failure_paths_cancel() {
        assert_eq!(
            OrderStatus::Pending.next(OrderEvent::PaymentFailed),
            Some(OrderStatus::Cancelled)
        );
        assert_eq!(
            OrderStatus::Pending.next(OrderEvent::Abandoned),
            Some(OrderStatus::Cancelled)
        );
        assert_eq!(
            OrderStatus::Pending.next(OrderEvent::CancelRequested),
            Some(OrderStatus::Cancelled)
        );
        assert_eq!(
            OrderStatus::Processing.next(OrderEvent::CancelRequested),
            Some(OrderStatus::Cancelled)
        );
    }

    #[test]
    fn test_terminal_states_reject_everything() {
        let events = [
            OrderEvent::PaymentSucceeded,
            OrderEvent::PaymentFailed,
            OrderEvent::Abandoned,
            OrderEvent::CancelRequested,
            OrderEvent::Fulfilled,
        ];

        for event in events {
            assert_eq!(OrderStatus::Completed.next(event), None);
            assert_eq!(OrderStatus::Cancelled.next(event), None);
        }
    }

    #[test]
    fn test_late_duplicate_callback_rejected() {
        // A duplicate "payment succeeded" after abandonment must not
        // reopen the cancelled order.
        let swept = OrderStatus::Pending.next(OrderEvent::Abandoned).unwrap();
        assert_eq!(swept.next(OrderEvent::PaymentSucceeded), None);
    }

    #[test]
    fn test_processing_rejects_payment_events() {
        assert_eq!(OrderStatus::Processing.next(OrderEvent::PaymentSucceeded), None);
        assert_eq!(OrderStatus::Processing.next(OrderEvent::PaymentFailed), None);
        assert_eq!(OrderStatus::Processing.next(OrderEvent::Abandoned), None);
    }

    #[test]
    fn test_pending_cannot_complete_directly() {
        assert_eq!(OrderStatus::Pending.next(OrderEvent::Fulfilled), None);
    }

    #[test]
    fn test_is_terminal() {
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(!OrderStatus::Processing.is_terminal());
        assert!(OrderStatus::Completed.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
    }
}
