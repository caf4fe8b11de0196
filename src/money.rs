//! Helpers for storing exact monetary amounts in SQLite.
//!
//! Amounts are fixed-point decimals with two fractional digits. They are
//! persisted as canonical text (e.g. `12.34`) and summed in application
//! code, never with SQL `SUM`, which computes in binary floating point.

use rusqlite::{Row, types::Type};
use rust_decimal::Decimal;

/// Encode an amount as canonical text with two fractional digits.
pub(crate) fn encode_amount(amount: Decimal) -> String {
    format!("{:.2}", amount.round_dp(2))
}

/// Read an amount column from a row.
///
/// # Errors
/// Returns a conversion error if the column does not hold a decimal number.
pub(crate) fn read_amount(row: &Row, index: usize) -> Result<Decimal, rusqlite::Error> {
    let text: String = row.get(index)?;

    text.parse().map_err(|error: rust_decimal::Error| {
        rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(error))
    })
}

#[cfg(test)]
mod encode_amount_tests {
    use rust_decimal_macros::dec;

    use super::encode_amount;

    #[test]
    fn pads_to_two_fractional_digits() {
        assert_eq!(encode_amount(dec!(5)), "5.00");
        assert_eq!(encode_amount(dec!(3.1)), "3.10");
    }

    #[test]
    fn rounds_excess_precision() {
        assert_eq!(encode_amount(dec!(1.005)), "1.00");
        assert_eq!(encode_amount(dec!(1.015)), "1.02");
    }
}
