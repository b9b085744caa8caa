//! Exact decimal money amounts stored as integer cents.

use std::fmt::Display;

use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};

use crate::Error;

/// An amount of money with two decimal places, stored as a whole number of cents.
///
/// Sums of amounts are exact, so settlement totals never drift from the sum of
/// their entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(i64);

impl Amount {
    /// The amount zero.
    pub const ZERO: Amount = Amount(0);

    /// The largest amount a single income entry may have, $1,000,000.00.
    pub const MAX_ENTRY_AMOUNT: Amount = Amount(100_000_000);

    /// Create an amount from a number of cents.
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// The amount as a whole number of cents.
    pub fn cents(&self) -> i64 {
        self.0
    }

    /// The amount as a floating point number, for display only.
    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Parse a decimal string such as "200", "12.5" or "12.50".
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidAmount] if `text` is empty, has a sign, has more
    /// than two decimal places, contains anything other than digits and a
    /// single decimal point, or does not fit in 64 bits of cents.
    pub fn parse(text: &str) -> Result<Self, Error> {
        let text = text.trim();
        let invalid = || Error::InvalidAmount(text.to_owned());

        let (whole, fraction) = match text.split_once('.') {
            Some((whole, fraction)) => (whole, Some(fraction)),
            None => (text, None),
        };

        if whole.is_empty() || !whole.bytes().all(|byte| byte.is_ascii_digit()) {
            return Err(invalid());
        }

        let fraction_cents = match fraction {
            None => 0,
            Some(fraction)
                if fraction.is_empty()
                    || fraction.len() > 2
                    || !fraction.bytes().all(|byte| byte.is_ascii_digit()) =>
            {
                return Err(invalid());
            }
            Some(fraction) => {
                let digits: i64 = fraction.parse().map_err(|_| invalid())?;
                if fraction.len() == 1 { digits * 10 } else { digits }
            }
        };

        let whole: i64 = whole.parse().map_err(|_| invalid())?;

        whole
            .checked_mul(100)
            .and_then(|cents| cents.checked_add(fraction_cents))
            .map(Self)
            .ok_or_else(invalid)
    }

    /// Parse the amount of an income entry, which must be greater than zero and
    /// at most [Amount::MAX_ENTRY_AMOUNT].
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidAmount] if [Amount::parse] fails or the amount is
    /// out of range.
    pub fn parse_positive(text: &str) -> Result<Self, Error> {
        let amount = Self::parse(text)?;

        if amount == Self::ZERO || amount > Self::MAX_ENTRY_AMOUNT {
            return Err(Error::InvalidAmount(text.trim().to_owned()));
        }

        Ok(amount)
    }

    /// Add two amounts, returning `None` on overflow.
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    /// Sum `amounts`, returning `None` on overflow.
    pub fn checked_sum(amounts: impl IntoIterator<Item = Self>) -> Option<Self> {
        amounts
            .into_iter()
            .try_fold(Self::ZERO, |total, amount| total.checked_add(amount))
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let cents = self.0.unsigned_abs();

        write!(f, "{sign}{}.{:02}", cents / 100, cents % 100)
    }
}

impl ToSql for Amount {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0))
    }
}

impl FromSql for Amount {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        i64::column_result(value).map(Amount)
    }
}
