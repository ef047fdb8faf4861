//! Fixed-point money representation.
//!
//! All monetary values are integer minor units (cents, pence, yen) tagged with
//! a currency. Floating point never enters the arithmetic, so share
//! computations and settlement sums are exact and reproducible.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};
use crate::value_object::ValueObject;

/// ISO 4217 currency tag.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Eur,
    Gbp,
    Jpy,
    Cad,
    Aud,
    Inr,
}

impl Currency {
    /// ISO 4217 alphabetic code.
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
            Currency::Jpy => "JPY",
            Currency::Cad => "CAD",
            Currency::Aud => "AUD",
            Currency::Inr => "INR",
        }
    }

    /// Number of decimal places in the display form (minor units per major
    /// unit is `10^decimals`).
    pub fn decimals(&self) -> u32 {
        match self {
            Currency::Jpy => 0,
            _ => 2,
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "USD" => Some(Currency::Usd),
            "EUR" => Some(Currency::Eur),
            "GBP" => Some(Currency::Gbp),
            "JPY" => Some(Currency::Jpy),
            "CAD" => Some(Currency::Cad),
            "AUD" => Some(Currency::Aud),
            "INR" => Some(Currency::Inr),
            _ => None,
        }
    }
}

impl core::fmt::Display for Currency {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Currency::from_code(s)
            .ok_or_else(|| LedgerError::invalid_amount(format!("unknown currency code: {s}")))
    }
}

/// An exact amount of a single currency, stored in minor units.
///
/// `Money` is signed; call sites decide where negatives are legal (expense
/// totals must be positive, settled amounts never are negative, netting math
/// works on signed intermediates).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    minor_units: i64,
    currency: Currency,
}

impl ValueObject for Money {}

impl Money {
    pub fn from_minor_units(minor_units: i64, currency: Currency) -> Self {
        Self {
            minor_units,
            currency,
        }
    }

    pub fn zero(currency: Currency) -> Self {
        Self {
            minor_units: 0,
            currency,
        }
    }

    /// Parse a decimal string (e.g. `"10.01"`, `"-3.5"`) at the currency's
    /// scale.
    ///
    /// More fraction digits than the currency supports are rejected rather
    /// than rounded; rounding would silently manufacture or destroy minor
    /// units.
    pub fn from_decimal_str(s: &str, currency: Currency) -> LedgerResult<Self> {
        let scale = currency.decimals();
        let trimmed = s.trim();
        let (negative, unsigned) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let (int_part, frac_part) = match unsigned.split_once('.') {
            Some((i, f)) => (i, f),
            None => (unsigned, ""),
        };

        if int_part.is_empty() || !int_part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(LedgerError::invalid_amount(format!(
                "malformed amount: {trimmed:?}"
            )));
        }
        if !frac_part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(LedgerError::invalid_amount(format!(
                "malformed amount: {trimmed:?}"
            )));
        }
        if frac_part.len() > scale as usize {
            return Err(LedgerError::invalid_amount(format!(
                "{currency} amounts support at most {scale} decimal places"
            )));
        }

        let int_val: i64 = int_part.parse().map_err(|_| LedgerError::AmountOverflow)?;
        let frac_val: i64 = if frac_part.is_empty() {
            0
        } else {
            let parsed: i64 = frac_part.parse().map_err(|_| LedgerError::AmountOverflow)?;
            parsed * 10i64.pow(scale - frac_part.len() as u32)
        };

        let magnitude = int_val
            .checked_mul(10i64.pow(scale))
            .and_then(|v| v.checked_add(frac_val))
            .ok_or(LedgerError::AmountOverflow)?;

        Ok(Self {
            minor_units: if negative { -magnitude } else { magnitude },
            currency,
        })
    }

    pub fn minor_units(&self) -> i64 {
        self.minor_units
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn is_zero(&self) -> bool {
        self.minor_units == 0
    }

    pub fn is_positive(&self) -> bool {
        self.minor_units > 0
    }

    pub fn is_negative(&self) -> bool {
        self.minor_units < 0
    }

    pub fn ensure_same_currency(&self, other: &Money) -> LedgerResult<()> {
        if self.currency == other.currency {
            Ok(())
        } else {
            Err(LedgerError::currency_mismatch(
                self.currency,
                other.currency,
            ))
        }
    }

    pub fn checked_add(self, other: Money) -> LedgerResult<Money> {
        self.ensure_same_currency(&other)?;
        let minor_units = self
            .minor_units
            .checked_add(other.minor_units)
            .ok_or(LedgerError::AmountOverflow)?;
        Ok(Self {
            minor_units,
            currency: self.currency,
        })
    }

    pub fn checked_sub(self, other: Money) -> LedgerResult<Money> {
        self.ensure_same_currency(&other)?;
        let minor_units = self
            .minor_units
            .checked_sub(other.minor_units)
            .ok_or(LedgerError::AmountOverflow)?;
        Ok(Self {
            minor_units,
            currency: self.currency,
        })
    }

    /// `self * numerator / denominator`, widened through i128 and truncated
    /// toward zero. Used for proportional share math.
    pub fn multiply_by_ratio(self, numerator: i64, denominator: i64) -> LedgerResult<Money> {
        if denominator == 0 {
            return Err(LedgerError::invalid_amount("division by zero"));
        }
        let scaled = (self.minor_units as i128 * numerator as i128) / denominator as i128;
        let minor_units = i64::try_from(scaled).map_err(|_| LedgerError::AmountOverflow)?;
        Ok(Self {
            minor_units,
            currency: self.currency,
        })
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let scale = self.currency.decimals();
        if scale == 0 {
            return write!(f, "{} {}", self.currency, self.minor_units);
        }
        let factor = 10i64.pow(scale);
        let sign = if self.minor_units < 0 { "-" } else { "" };
        let magnitude = self.minor_units.unsigned_abs();
        let units = magnitude / factor as u64;
        let frac = magnitude % factor as u64;
        write!(
            f,
            "{} {}{}.{:0width$}",
            self.currency,
            sign,
            units,
            frac,
            width = scale as usize
        )
    }
}
