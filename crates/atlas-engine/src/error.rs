//! # Engine Error Taxonomy
//!
//! The typed errors every public engine operation returns.
//!
//! ## Propagation Policy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Error Taxonomy                                   │
//! │                                                                         │
//! │  Validation          bad input, price drift, voucher misuse.           │
//! │                      Rejected BEFORE any mutation.                     │
//! │                                                                         │
//! │  InsufficientStock   per-variant, with available/requested counts      │
//! │                      and the product name for user-facing messages.    │
//! │                      The whole reservation rolled back.                │
//! │                                                                         │
//! │  IllegalTransition   event does not match the current state.           │
//! │                      Rejected, no mutation — this is how a late        │
//! │                      duplicate callback or a lost sweep race reads.    │
//! │                                                                         │
//! │  GatewayUnavailable  transient; the payment was LEFT IN ITS PRIOR      │
//! │                      non-terminal state so a retry can still succeed.  │
//! │                                                                         │
//! │  NotFound            unknown order / payment / variant / voucher id.   │
//! │                                                                         │
//! │  Db                  infrastructure failure (pool, constraint, ...).   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use atlas_db::DbError;

/// Errors returned by the engine's public operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Input rejected before any mutation.
    #[error("Validation error: {0}")]
    Validation(#[from] atlas_core::ValidationError),

    /// The inventory ledger refused a reservation.
    ///
    /// `name` is the human-readable product name, attached by the caller
    /// of the ledger for user-facing error messages.
    #[error("insufficient stock for {name} ({variant_id}): available {available}, requested {requested}")]
    InsufficientStock {
        variant_id: String,
        name: String,
        available: i64,
        requested: i64,
    },

    /// The event does not match a legal transition for the entity's
    /// current state. Nothing was mutated.
    #[error("{entity} {id} is {current}, cannot perform this operation")]
    IllegalTransition {
        entity: &'static str,
        id: String,
        current: String,
    },

    /// The gateway call failed or timed out. No state was changed;
    /// the operation is safe to retry.
    #[error("payment gateway unavailable: {reason}")]
    GatewayUnavailable { reason: String },

    /// Unknown entity id.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Infrastructure failure in the persistence layer.
    #[error("database error: {0}")]
    Db(DbError),
}

impl EngineError {
    /// Creates a NotFound error.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        EngineError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Creates an IllegalTransition error.
    pub fn illegal_transition(
        entity: &'static str,
        id: impl Into<String>,
        current: impl Into<String>,
    ) -> Self {
        EngineError::IllegalTransition {
            entity,
            id: id.into(),
            current: current.into(),
        }
    }

    /// Creates a GatewayUnavailable error.
    pub fn gateway_unavailable(reason: impl Into<String>) -> Self {
        EngineError::GatewayUnavailable {
            reason: reason.into(),
        }
    }
}

/// Lift database errors into the engine taxonomy.
///
/// `InsufficientStock` arrives without the product name; call sites that
/// hold the catalog snapshot enrich it before this conversion runs (see
/// `OrderService::create_order`). The fallback here uses the variant id
/// so the count detail is never lost.
impl From<DbError> for EngineError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => EngineError::NotFound {
                entity: "Record",
                id: format!("{entity}:{id}"),
            },
            DbError::InsufficientStock {
                variant_id,
                available,
                requested,
            } => EngineError::InsufficientStock {
                name: variant_id.clone(),
                variant_id,
                available,
                requested,
            },
            other => EngineError::Db(other),
        }
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_message() {
        let err = EngineError::InsufficientStock {
            variant_id: "var-1".to_string(),
            name: "Classic Tee".to_string(),
            available: 0,
            requested: 2,
        };
        assert_eq!(
            err.to_string(),
            "insufficient stock for Classic Tee (var-1): available 0, requested 2"
        );
    }

    #[test]
    fn test_db_insufficient_stock_lifts_counts() {
        let db_err = DbError::insufficient_stock("var-1", 1, 3);
        match EngineError::from(db_err) {
            EngineError::InsufficientStock {
                variant_id,
                available,
                requested,
                ..
            } => {
                assert_eq!(variant_id, "var-1");
                assert_eq!(available, 1);
                assert_eq!(requested, 3);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
