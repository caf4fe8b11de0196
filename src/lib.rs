//! Eetlijst is the credit bookkeeping core of a student-association
//! dining-list application.
//!
//! Members organise shared dinners, track who joined and who paid, and
//! settle the costs through an internal ledger of monetary transactions
//! between users and associations. The ledger is layered:
//!
//! - **Fixed transactions** are immutable, settled entries: the closed
//!   books.
//! - **Pending transactions** are stored entries awaiting settlement.
//! - **Pending dining transactions** are virtual entries derived on the
//!   fly from the open costs of tracked dining lists.
//!
//! Balances are recomputed from the transaction set on every query, and
//! finalisation moves a pending transaction to the fixed table in a single
//! atomic step. The periodic settlement batch ([finalise_up_to]) converts
//! the open costs of every due dining list into fixed transactions.

#![warn(missing_docs)]

mod actor;
mod app_state;
mod balance;
mod config;
mod database_id;
mod db;
mod dining;
mod error;
mod money;
mod transaction;

pub use actor::{
    Actor, Association, User, UserMembership, add_membership, create_association, create_user,
    create_user_with_floor, get_association, get_members, get_user, minimum_balance_for,
};
pub use app_state::AppState;
pub use balance::{
    annotate_user_balances, dining_balance, fixed_balance, get_balance, get_balance_at,
    pending_balance,
};
pub use config::LedgerConfig;
pub use database_id::{
    AssociationId, DatabaseId, DiningEntryId, DiningListId, MembershipId, TrackerId,
    TransactionId, UserId,
};
pub use db::initialize as initialize_db;
pub use dining::{
    DiningEntry, DiningList, PendingDiningListTracker, PendingDiningTransaction,
    SettlementSummary, add_dining_entry, create_dining_list, finalise_up_to, get_dining_entries,
    get_dining_list, get_tracked_dining_lists, pending_dining_transactions, track_dining_list,
};
pub use error::Error;
pub use transaction::{
    FixedTransaction, NewTransaction, PendingTransaction, TransactionLayer, TransactionQuery,
    TransactionRecord, cancel_pending_transaction, clear_open_expenses,
    create_pending_transaction, finalise_transaction, get_fixed_transactions,
    get_pending_transaction, get_pending_transactions, get_transactions,
};
