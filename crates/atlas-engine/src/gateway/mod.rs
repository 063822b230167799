//! # Gateway Client
//!
//! The seam to the external payment gateway.
//!
//! ## Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Gateway Contract                                   │
//! │                                                                         │
//! │  create_intent(amount, currency, reference)                            │
//! │       └── opens a remote payment, returns (intent_id, approval_link)  │
//! │           the buyer completes approval out-of-band                    │
//! │                                                                         │
//! │  capture(intent_id)                                                    │
//! │       └── finalizes the approved intent, returns                      │
//! │           (status, capture_id, amount, captured_at)                   │
//! │                                                                         │
//! │  Status strings are GATEWAY-DEFINED. The reconciler treats exactly    │
//! │  one value ("COMPLETED", case-insensitive) as success; every other    │
//! │  status is a failure. Transport errors are neither — they leave       │
//! │  local state untouched.                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The gateway's internals are out of scope; only this request/response
//! contract is consumed. [`http::HttpGateway`] is the production
//! implementation; tests script the trait directly.

pub mod http;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Wire Types
// =============================================================================

/// Request to open a payment intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateIntentRequest {
    /// Amount in the gateway's settlement currency, smallest unit.
    pub amount_cents: i64,
    /// ISO 4217 settlement currency code.
    pub currency: String,
    /// Merchant reference shown on the gateway side (the order number).
    pub reference: String,
}

/// A freshly opened payment intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayIntent {
    pub intent_id: String,
    /// URL the buyer visits to approve the payment.
    pub approval_link: String,
}

/// The result of a capture call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayCapture {
    /// Gateway-defined status string.
    pub status: String,
    pub capture_id: String,
    pub amount_cents: i64,
    pub captured_at: DateTime<Utc>,
}

impl GatewayCapture {
    /// Whether this capture is the one successful status.
    pub fn is_completed(&self) -> bool {
        self.status.eq_ignore_ascii_case("completed")
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Errors from the gateway client.
///
/// All of them are transient from the engine's point of view: the
/// reconciler maps every variant to `GatewayUnavailable` and changes no
/// local state.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Connection / TLS / timeout failure before a response arrived.
    #[error("gateway transport error: {0}")]
    Transport(String),

    /// The gateway answered with a non-success HTTP status.
    #[error("gateway returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The response body did not match the expected shape.
    #[error("malformed gateway response: {0}")]
    Malformed(String),
}

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

// =============================================================================
// Client Trait
// =============================================================================

/// The payment gateway, as the engine sees it.
#[async_trait]
pub trait GatewayClient: Send + Sync {
    /// Opens a remote payment intent for out-of-band approval.
    async fn create_intent(&self, request: CreateIntentRequest) -> GatewayResult<GatewayIntent>;

    /// Finalizes a previously approved intent.
    async fn capture(&self, intent_id: &str) -> GatewayResult<GatewayCapture>;
}

// =============================================================================
// Unit Tests
// =============================================================================
