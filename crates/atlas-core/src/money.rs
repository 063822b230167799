//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  In an order pipeline that is fatal: the totals invariant               │
//! │  (total == subtotal + shipping - discount) must hold EXACTLY,           │
//! │  because the payment gateway is charged the stored total.               │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    Every amount is an i64 in the smallest currency unit.                │
//! │    Rounding happens in exactly one place (settlement conversion)        │
//! │    and is explicit.                                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use atlas_core::money::Money;
//!
//! // Create from cents (preferred)
//! let price = Money::from_cents(1099);
//!
//! // Arithmetic operations
//! let doubled = price * 2;
//! let total = price + Money::from_cents(500);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in the smallest currency unit.
///
/// ## Design Decisions
/// - **i64 (signed)**: Allows negative values for discounts and adjustments
/// - **Single field tuple struct**: Zero-cost abstraction over i64
/// - **Derives**: Full serde support for JSON serialization
///
/// ## Where Money Flows
/// ```text
/// Variant.price_cents ──► OrderItem.unit_price_cents ──► line totals
///        │
///        ▼
/// Order.subtotal + shipping - discount ──► Order.total
///        │
///        ▼
/// settlement conversion ──► gateway charge amount
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents (smallest currency unit).
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Multiplies money by a quantity.
    ///
    /// ## Example
    /// ```rust
    /// use atlas_core::money::Money;
    ///
    /// let unit_price = Money::from_cents(299);
    /// let line_total = unit_price.multiply_quantity(3);
    /// assert_eq!(line_total.cents(), 897);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Absolute difference between two amounts.
    ///
    /// Used by the price-tolerance check at order validation time.
    #[inline]
    pub const fn abs_diff(&self, other: Money) -> Money {
        Money((self.0 - other.0).abs())
    }

    /// Converts a store-currency amount into the gateway settlement currency.
    ///
    /// ## Settlement Conversion
    /// ```text
    /// ┌─────────────────────────────────────────────────────────────────────┐
    /// │  The gateway settles in a different currency than the store         │
    /// │  charges in. Conversion is a PURE function of the configured        │
    /// │  exchange rate, never of ambient global state:                      │
    /// │                                                                     │
    /// │    settlement = round_half_up(total / rate)                         │
    /// │    charged    = max(settlement, gateway minimum)                    │
    /// │                                                                     │
    /// │  `rate` is "store cents per settlement cent". Example:              │
    /// │  24,000 VND per USD → 240 store cents per settlement cent,          │
    /// │  so an 120,000 VND order settles as 50,000 / 240 = 500 cents.       │
    /// └─────────────────────────────────────────────────────────────────────┘
    /// ```
    ///
    /// ## Arguments
    /// * `rate` - Exchange rate (must be validated > 0 by the config layer)
    /// * `minimum` - The gateway's minimum chargeable amount, in settlement
    ///   cents; amounts below it are clamped up
    ///
    /// ## Example
    /// ```rust
    /// use atlas_core::money::{ExchangeRate, Money};
    ///
    /// let rate = ExchangeRate::from_store_cents(240);
    /// let total = Money::from_cents(120_000);
    /// let charged = total.to_settlement(rate, Money::from_cents(100));
    /// assert_eq!(charged.cents(), 500);
    ///
    /// // A tiny order is clamped to the gateway minimum
    /// let tiny = Money::from_cents(120);
    /// assert_eq!(tiny.to_settlement(rate, Money::from_cents(100)).cents(), 100);
    /// ```
    pub fn to_settlement(&self, rate: ExchangeRate, minimum: Money) -> Money {
        // i128 intermediate so large order totals cannot overflow
        let rate_cents = rate.store_cents() as i128;
        let converted = (self.0 as i128 * 2 + rate_cents) / (rate_cents * 2);
        let converted = Money::from_cents(converted as i64);

        if converted < minimum {
            minimum
        } else {
            converted
        }
    }
}

// =============================================================================
// Exchange Rate
// =============================================================================

/// Exchange rate expressed as store cents per settlement cent.
///
/// ## Why an integer rate?
/// The same reason Money is an integer: the charged amount must be
/// reproducible. The config layer validates the rate is >= 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRate(i64);

impl ExchangeRate {
    /// Creates a rate from store cents per settlement cent.
    #[inline]
    pub const fn from_store_cents(store_cents: i64) -> Self {
        ExchangeRate(store_cents)
    }

    /// Identity rate: store and settlement currency are the same.
    #[inline]
    pub const fn identity() -> Self {
        ExchangeRate(1)
    }

    /// Returns store cents per settlement cent.
    #[inline]
    pub const fn store_cents(&self) -> i64 {
        self.0
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display implementation shows money in a human-readable format.
///
/// ## Note
/// This is for logs and debugging. Currency symbols and localization
/// belong to the presentation layer.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor())
    }
}

/// Default money is zero.
impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

/// Addition of two Money values.
impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

/// Addition assignment (+=).
impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

/// Subtraction of two Money values.
impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

/// Subtraction assignment (-=).
impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

/// Multiplication by integer (for quantity calculations).
impl Mul<i32> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i32) -> Self {
        Money(self.0 * qty as i64)
    }
}

/// Multiplication by i64.
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
