//! Ledger transactions for the credit bookkeeping.
//!
//! This module contains everything related to the stored transaction
//! layers:
//! - The `PendingTransaction` and `FixedTransaction` models and the
//!   `NewTransaction` builder
//! - Validation of the transaction business rules
//! - Finalisation, the atomic pending-to-fixed move
//! - The merged cross-layer transaction listing
//! - Clearing the open expenses of an association's members

mod clear_expenses;
mod core;
mod finalise;
mod query;

pub use clear_expenses::clear_open_expenses;
pub use core::{
    FixedTransaction, NewTransaction, PendingTransaction, cancel_pending_transaction,
    create_pending_transaction, get_fixed_transactions, get_pending_transaction,
    get_pending_transactions,
};
pub use finalise::finalise_transaction;
pub use query::{TransactionLayer, TransactionQuery, TransactionRecord, get_transactions};

pub(crate) use core::{
    create_fixed_transaction_table, create_pending_transaction_table, insert_fixed_transaction,
    validate,
};
