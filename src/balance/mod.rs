//! Balance computation for users and associations.
//!
//! Balances are derived data: the net signed sum of all transactions
//! involving an actor, recomputed from the ledger on every query.

mod core;

pub use core::{
    annotate_user_balances, dining_balance, fixed_balance, get_balance, get_balance_at,
    pending_balance,
};
