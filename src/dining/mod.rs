//! Dining lists and the settlement of their costs.
//!
//! The dining side of the application owns which users joined a list and
//! what share of the cost they owe. The ledger reads that data as a
//! projection of virtual pending transactions, and the tracker converts
//! those into fixed transactions once a list is ready to be settled.

mod core;
mod tracker;

pub use core::{
    DiningEntry, DiningList, PendingDiningTransaction, add_dining_entry, create_dining_list,
    get_dining_entries, get_dining_list, pending_dining_transactions,
};
pub use tracker::{
    PendingDiningListTracker, SettlementSummary, finalise_up_to, get_tracked_dining_lists,
    track_dining_list,
};

pub(crate) use core::{create_dining_entry_table, create_dining_list_table};
pub(crate) use tracker::create_pending_dining_list_tracker_table;
