//! # Validation Module
//!
//! Business rule validation for order drafts.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: THIS MODULE (pure, before any mutation)                      │
//! │  ├── quantities, item count, customer fields                           │
//! │  ├── price tolerance against the live catalog read                     │
//! │  ├── totals invariant                                                  │
//! │  └── voucher applicability                                             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Inventory Ledger (atomic conditional updates)                │
//! │  └── the ONLY authoritative stock check                                │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (NOT NULL, UNIQUE, FK, CHECK constraints)           │
//! │                                                                         │
//! │  A failure in layer 1 aborts order creation with nothing persisted;    │
//! │  the availability numbers read here are a PRE-CHECK only — two         │
//! │  concurrent checkouts are arbitrated by layer 2, never by this code.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::Voucher;
use crate::{MAX_ITEM_QUANTITY, MAX_ORDER_ITEMS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Field Validators
// =============================================================================

/// Validates a required string field (customer name, recipient, ...).
pub fn validate_required(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.len() > 200 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates a quantity value.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price or fee in cents.
///
/// Zero is allowed (free shipping, free items).
pub fn validate_price_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates the number of line items in a draft.
pub fn validate_item_count(count: usize) -> ValidationResult<()> {
    if count == 0 {
        return Err(ValidationError::EmptyOrder);
    }

    if count > MAX_ORDER_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "line items".to_string(),
            min: 1,
            max: MAX_ORDER_ITEMS as i64,
        });
    }

    Ok(())
}

/// Validates a UUID string format.
pub fn validate_uuid(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Order Draft Validators
// =============================================================================

/// Checks a submitted unit price against the live catalog price.
///
/// The client computed its cart against a possibly stale catalog; a
/// drift within `tolerance` is accepted (and the snapshot uses the
/// catalog price), anything larger rejects the draft.
pub fn validate_price_tolerance(
    variant_id: &str,
    submitted: Money,
    catalog: Money,
    tolerance: Money,
) -> ValidationResult<()> {
    if submitted.abs_diff(catalog) > tolerance {
        return Err(ValidationError::PriceOutOfTolerance {
            variant_id: variant_id.to_string(),
            submitted_cents: submitted.cents(),
            catalog_cents: catalog.cents(),
            tolerance_cents: tolerance.cents(),
        });
    }

    Ok(())
}

/// Checks the totals invariant: total == subtotal + shipping - discount.
pub fn validate_totals(
    subtotal: Money,
    shipping_fee: Money,
    discount: Money,
    total: Money,
) -> ValidationResult<()> {
    let expected = subtotal + shipping_fee - discount;

    if expected != total {
        return Err(ValidationError::TotalsMismatch {
            expected_cents: expected.cents(),
            actual_cents: total.cents(),
        });
    }

    Ok(())
}

/// Checks voucher applicability and returns the discount it grants.
///
/// ## Rules
/// - Voucher must be active and not expired
/// - Subtotal must meet the voucher minimum
/// - The usage limit must have headroom
///
/// The headroom check here is advisory: the authoritative enforcement is
/// the atomic conditional increment of `used_count` at persist time,
/// which closes the race between two orders applying the last use.
pub fn validate_voucher(
    voucher: &Voucher,
    subtotal: Money,
    now: DateTime<Utc>,
) -> ValidationResult<Money> {
    let reject = |reason: &str| ValidationError::VoucherNotApplicable {
        voucher_id: voucher.id.clone(),
        reason: reason.to_string(),
    };

    if !voucher.is_active {
        return Err(reject("voucher is inactive"));
    }

    if let Some(expires_at) = voucher.expires_at {
        if now >= expires_at {
            return Err(reject("voucher has expired"));
        }
    }

    if subtotal.cents() < voucher.min_subtotal_cents {
        return Err(reject("subtotal below voucher minimum"));
    }

    if let Some(limit) = voucher.usage_limit {
        if voucher.used_count >= limit {
            return Err(reject("voucher usage limit reached"));
        }
    }

    Ok(Money::from_cents(voucher.discount_cents))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn voucher() -> Voucher {
        Voucher {
            id: "vch-1".to_string(),
            code: "WELCOME10".to_string(),
            discount_cents: 1000,
            min_subtotal_cents: 5000,
            usage_limit: Some(5),
            used_count: 0,
            is_active: true,
            expires_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_validate_item_count() {
        assert!(validate_item_count(1).is_ok());
        assert!(validate_item_count(100).is_ok());
        assert!(validate_item_count(0).is_err());
        assert!(validate_item_count(101).is_err());
    }

    #[test]
    fn test_validate_price_tolerance() {
        let tolerance = Money::from_cents(1);

        // Exact match and one-cent drift are accepted
        assert!(validate_price_tolerance(
            "v",
            Money::from_cents(1000),
            Money::from_cents(1000),
            tolerance
        )
        .is_ok());
        assert!(validate_price_tolerance(
            "v",
            Money::from_cents(1001),
            Money::from_cents(1000),
            tolerance
        )
        .is_ok());

        // Two cents is out of tolerance
        assert!(validate_price_tolerance(
            "v",
            Money::from_cents(1002),
            Money::from_cents(1000),
            tolerance
        )
        .is_err());
    }

    #[test]
    fn test_validate_totals() {
        let subtotal = Money::from_cents(10_000);
        let shipping = Money::from_cents(500);
        let discount = Money::from_cents(1_000);

        assert!(validate_totals(subtotal, shipping, discount, Money::from_cents(9_500)).is_ok());
        assert!(validate_totals(subtotal, shipping, discount, Money::from_cents(10_000)).is_err());
    }

    #[test]
    fn test_validate_voucher_ok() {
        let discount = validate_voucher(&voucher(), Money::from_cents(6_000), Utc::now()).unwrap();
        assert_eq!(discount.cents(), 1000);
    }

    #[test]
    fn test_validate_voucher_rejections() {
        let now = Utc::now();

        let mut inactive = voucher();
        inactive.is_active = false;
        assert!(validate_voucher(&inactive, Money::from_cents(6_000), now).is_err());

        let mut expired = voucher();
        expired.expires_at = Some(now - Duration::hours(1));
        assert!(validate_voucher(&expired, Money::from_cents(6_000), now).is_err());

        assert!(validate_voucher(&voucher(), Money::from_cents(4_000), now).is_err());

        let mut exhausted = voucher();
        exhausted.used_count = 5;
        assert!(validate_voucher(&exhausted, Money::from_cents(6_000), now).is_err());
    }

    #[test]
    fn test_validate_required() {
        assert!(validate_required("name", "Ada").is_ok());
        assert!(validate_required("name", "").is_err());
        assert!(validate_required("name", "   ").is_err());
        assert!(validate_required("name", &"A".repeat(300)).is_err());
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid("id", "").is_err());
        assert!(validate_uuid("id", "not-a-uuid").is_err());
    }
}
