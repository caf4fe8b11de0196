//! The configuration that controls the ledger's business rules.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Settings that control the business rules of the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerConfig {
    /// The lowest balance a user may reach by sending money.
    ///
    /// Users with a `min_balance` override on their record use that value
    /// instead. The floor only applies when the user is the source of a
    /// transaction, it does not retroactively invalidate existing debt.
    pub minimum_balance: Decimal,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            minimum_balance: dec!(0.00),
        }
    }
}
