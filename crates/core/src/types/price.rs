//! Wholesale price per unit.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A per-unit wholesale price.
///
/// Stored in the backend as a plain `numeric` column in the store's currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(#[serde(with = "rust_decimal::serde::float")] Decimal);

impl Price {
    /// The currency every catalog price is quoted in.
    pub const SYMBOL: &'static str = "₹";

    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Create a price from a whole number of rupees.
    #[must_use]
    pub fn from_rupees(rupees: i64) -> Self {
        Self(Decimal::from(rupees))
    }

    /// The decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Whether the price is strictly greater than zero.
    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Format for display with a unit label (e.g., "₹180/kg").
    #[must_use]
    pub fn per_unit(&self, unit: &str) -> String {
        format!("{self}/{unit}")
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", Self::SYMBOL, self.0.normalize())
    }
}
