//! # Error Types
//!
//! Domain-specific error types for atlas-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  atlas-core errors (this file)                                         │
//! │  └── ValidationError  - Business rule violations, detected by pure     │
//! │                         code before any mutation                       │
//! │                                                                         │
//! │  atlas-db errors (separate crate)                                      │
//! │  └── DbError          - Database operation failures + the ledger's    │
//! │                         InsufficientStock rejection                    │
//! │                                                                         │
//! │  atlas-engine errors (separate crate)                                  │
//! │  └── EngineError      - The taxonomy callers see                       │
//! │                                                                         │
//! │  Flow: ValidationError / DbError → EngineError → caller                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (variant id, counts, cents)
//! 3. Errors are enum variants, never String
//! 4. Each error variant maps to a user-facing message

use thiserror::Error;

// =============================================================================
// Validation Error
// =============================================================================

/// Business rule violations detected before any mutation.
///
/// A draft that fails validation leaves no trace in the system: no
/// order rows, no reservation, no voucher use.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// An order draft without line items.
    #[error("order must contain at least one line item")]
    EmptyOrder,

    /// A submitted unit price drifted from the live catalog price beyond
    /// the allowed tolerance.
    #[error(
        "price for variant {variant_id} is out of tolerance: submitted {submitted_cents}, catalog {catalog_cents} (tolerance {tolerance_cents})"
    )]
    PriceOutOfTolerance {
        variant_id: String,
        submitted_cents: i64,
        catalog_cents: i64,
        tolerance_cents: i64,
    },

    /// The order totals invariant does not hold.
    #[error("order total {actual_cents} does not equal subtotal + shipping - discount ({expected_cents})")]
    TotalsMismatch {
        expected_cents: i64,
        actual_cents: i64,
    },

    /// The voucher cannot be applied to this order.
    #[error("voucher {voucher_id} not applicable: {reason}")]
    VoucherNotApplicable { voucher_id: String, reason: String },
}

// =============================================================================
// Unit Tests
// =============================================================================
