//! Currency amounts as displayed by the table and configured as thresholds.

use std::fmt;
use std::str::FromStr;

/// A non-negative currency amount stored in hundredths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount {
    cents: u64,
}

impl Amount {
    pub const ZERO: Amount = Amount { cents: 0 };

    /// An amount of whole currency units.
    pub fn from_units(units: u64) -> Self {
        Self {
            cents: units.saturating_mul(100),
        }
    }

    pub fn from_cents(cents: u64) -> Self {
        Self { cents }
    }

    pub fn cents(&self) -> u64 {
        self.cents
    }

    pub fn is_zero(&self) -> bool {
        self.cents == 0
    }

    /// Parse displayed text such as `"$1,250"`, `"150"` or `" $0.50 "`.
    ///
    /// Returns `None` for empty text, negative values, more than two decimal
    /// places, or anything else that is not a plain amount.
    pub fn parse(text: &str) -> Option<Self> {
        let cleaned: String = text
            .trim()
            .trim_start_matches('$')
            .chars()
            .filter(|c| *c != ',' && !c.is_whitespace())
            .collect();
        if cleaned.is_empty() {
            return None;
        }

        let (whole, fraction) = match cleaned.split_once('.') {
            Some((w, f)) => (w, f),
            None => (cleaned.as_str(), ""),
        };
        if whole.is_empty() && fraction.is_empty() {
            return None;
        }
        if !whole.chars().all(|c| c.is_ascii_digit())
            || !fraction.chars().all(|c| c.is_ascii_digit())
            || fraction.len() > 2
        {
            return None;
        }

        let units: u64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
        let frac_cents: u64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<u64>().ok()? * 10,
            _ => fraction.parse().ok()?,
        };
        units
            .checked_mul(100)
            .and_then(|c| c.checked_add(frac_cents))
            .map(Self::from_cents)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let units = self.cents / 100;
        let rest = self.cents % 100;
        if rest == 0 {
            write!(f, "{units}")
        } else {
            write!(f, "{units}.{rest:02}")
        }
    }
}

impl FromStr for Amount {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Amount::parse(s).ok_or_else(|| format!("not a currency amount: {s:?}"))
    }
}
