//! Tracks which dining lists still have unsettled costs and settles them.
//!
//! A tracker row is the work-queue entry that marks a dining list as
//! having open dining-derived pending transactions. Settlement converts
//! those into fixed transactions and removes the tracker in one atomic
//! step per list.

use rusqlite::{Connection, Row};
use time::{Date, OffsetDateTime};

use crate::{
    Error,
    database_id::{DiningListId, TrackerId},
    dining::core::{dining_transactions_for_list, get_dining_list},
    transaction::{FixedTransaction, insert_fixed_transaction, validate},
};

/// Marks a dining list as having unresolved dining-derived pending
/// transactions.
///
/// Created when the dining side reports the list's costs as finalisable,
/// deleted only by successful settlement.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingDiningListTracker {
    /// The ID of the tracker row.
    pub id: TrackerId,
    /// The dining list awaiting settlement.
    pub dining_list_id: DiningListId,
}

/// The outcome of a settlement batch run.
#[derive(Debug, Default, PartialEq)]
pub struct SettlementSummary {
    /// The number of dining lists that were settled.
    pub settled: usize,
    /// The number of fixed transactions that were created.
    pub transactions: usize,
    /// The dining lists that could not be settled, with the reason. Their
    /// trackers are left in place so the next run picks them up again.
    pub failures: Vec<(DiningListId, Error)>,
}

/// Create the pending dining list tracker table.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub(crate) fn create_pending_dining_list_tracker_table(
    connection: &Connection,
) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS pending_dining_list_tracker (
                id INTEGER PRIMARY KEY,
                dining_list_id INTEGER NOT NULL UNIQUE REFERENCES dining_list(id)
                )",
        (),
    )?;

    Ok(())
}

/// Mark a dining list as awaiting settlement of its costs.
///
/// Call this once the dining side reports the list's costs as final. From
/// this moment the list's entries appear as pending dining transactions in
/// balances and listings.
///
/// # Errors
/// This function will return a:
/// - [Error::AlreadyTracked] if the dining list is already awaiting
///   settlement,
/// - or [Error::SqlError] if the dining list does not exist or there is
///   some other SQL error.
pub fn track_dining_list(
    dining_list_id: DiningListId,
    connection: &Connection,
) -> Result<PendingDiningListTracker, Error> {
    connection.execute(
        "INSERT INTO pending_dining_list_tracker (dining_list_id) VALUES (?1)",
        [dining_list_id],
    )?;

    Ok(PendingDiningListTracker {
        id: connection.last_insert_rowid(),
        dining_list_id,
    })
}

/// Retrieve all trackers, i.e. every dining list that still has unsettled
/// costs.
///
/// # Errors
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn get_tracked_dining_lists(
    connection: &Connection,
) -> Result<Vec<PendingDiningListTracker>, Error> {
    connection
        .prepare("SELECT id, dining_list_id FROM pending_dining_list_tracker ORDER BY id")?
        .query_map([], map_tracker_row)?
        .map(|row_result| row_result.map_err(Error::SqlError))
        .collect()
}

/// Settle every tracked dining list whose date is on or before `date`.
///
/// Each list is settled in its own store transaction: its derived pending
/// transactions become fixed transactions and the tracker row is deleted,
/// all or nothing. A list that fails to settle is logged and skipped; the
/// remaining lists are still processed. Re-running the batch is harmless,
/// settled lists are simply no longer tracked.
///
/// # Errors
/// Returns a [Error::SqlError] if the trackers cannot be enumerated.
/// Per-list failures are reported in the summary instead.
pub fn finalise_up_to(
    date: Date,
    connection: &Connection,
) -> Result<SettlementSummary, Error> {
    let due: Vec<PendingDiningListTracker> = connection
        .prepare(
            "SELECT pending_dining_list_tracker.id, pending_dining_list_tracker.dining_list_id
             FROM pending_dining_list_tracker
             JOIN dining_list ON dining_list.id = pending_dining_list_tracker.dining_list_id
             WHERE dining_list.date <= :date
             ORDER BY dining_list.date, dining_list.id",
        )?
        .query_map(&[(":date", &date)], map_tracker_row)?
        .collect::<Result<_, _>>()?;

    let mut summary = SettlementSummary::default();

    for tracker in due {
        match finalise_dining_list(&tracker, connection) {
            Ok(transactions) => {
                tracing::info!(
                    "settled dining list {} with {} transactions",
                    tracker.dining_list_id,
                    transactions.len()
                );
                summary.settled += 1;
                summary.transactions += transactions.len();
            }
            Err(error) => {
                tracing::error!(
                    "could not settle dining list {}: {}",
                    tracker.dining_list_id,
                    error
                );
                summary.failures.push((tracker.dining_list_id, error));
            }
        }
    }

    Ok(summary)
}

/// Settle a single tracked dining list.
///
/// Materialises every derived pending transaction as a fixed transaction
/// and deletes the tracker row in one store transaction.
pub(crate) fn finalise_dining_list(
    tracker: &PendingDiningListTracker,
    connection: &Connection,
) -> Result<Vec<FixedTransaction>, Error> {
    let list = get_dining_list(tracker.dining_list_id, connection)?;
    let derived = dining_transactions_for_list(&list, connection)?;

    // Only a &Connection is available through the mutex guard.
    let tx = connection.unchecked_transaction()?;
    let confirm_moment = OffsetDateTime::now_utc();
    let mut settled = Vec::with_capacity(derived.len());

    for dining_transaction in &derived {
        let builder = dining_transaction.to_transaction();
        validate(&builder)?;
        settled.push(insert_fixed_transaction(
            &builder,
            confirm_moment,
            Some(list.id),
            &tx,
        )?);
    }

    let deleted = tx.execute(
        "DELETE FROM pending_dining_list_tracker WHERE id = ?1",
        [tracker.id],
    )?;

    if deleted == 0 {
        return Err(Error::AlreadyFinalised);
    }

    tx.commit()?;

    Ok(settled)
}

/// Map a database row to a [PendingDiningListTracker].
fn map_tracker_row(row: &Row) -> Result<PendingDiningListTracker, rusqlite::Error> {
    Ok(PendingDiningListTracker {
        id: row.get(0)?,
        dining_list_id: row.get(1)?,
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod settlement_tests {
    use rusqlite::Connection;
    use rust_decimal_macros::dec;
    use time::macros::date;

    use crate::{
        Error,
        actor::{Actor, create_association, create_user},
        balance::get_balance,
        db::initialize,
        dining::{add_dining_entry, create_dining_list, pending_dining_transactions},
        transaction::get_fixed_transactions,
    };

    use super::{SettlementSummary, finalise_up_to, get_tracked_dining_lists, track_dining_list};

    fn get_test_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn
    }

    #[test]
    fn track_twice_fails() {
        let conn = get_test_connection();
        let association = create_association("Quadrivium", &conn).unwrap();
        let cook = create_user("Piet", &conn).unwrap();
        let list =
            create_dining_list(date!(2025 - 03 - 14), association.id, cook.id, &conn).unwrap();

        track_dining_list(list.id, &conn).expect("Could not track list");

        assert_eq!(
            track_dining_list(list.id, &conn),
            Err(Error::AlreadyTracked)
        );
    }

    #[test]
    fn settles_due_lists_and_deletes_trackers() {
        let conn = get_test_connection();
        let association = create_association("Quadrivium", &conn).unwrap();
        let cook = create_user("Piet", &conn).unwrap();
        let anne = create_user("Anne", &conn).unwrap();
        let bram = create_user("Bram", &conn).unwrap();
        let list =
            create_dining_list(date!(2025 - 03 - 14), association.id, cook.id, &conn).unwrap();
        add_dining_entry(list.id, anne.id, dec!(3.00), &conn).unwrap();
        add_dining_entry(list.id, bram.id, dec!(3.00), &conn).unwrap();
        track_dining_list(list.id, &conn).expect("Could not track list");

        let summary = finalise_up_to(list.date, &conn).expect("Could not settle");

        assert_eq!(
            summary,
            SettlementSummary {
                settled: 1,
                transactions: 2,
                failures: Vec::new(),
            }
        );
        assert_eq!(get_tracked_dining_lists(&conn), Ok(Vec::new()));
        assert_eq!(pending_dining_transactions(None, &conn), Ok(Vec::new()));

        let fixed = get_fixed_transactions(Some(Actor::User(cook.id)), &conn)
            .expect("Could not get fixed transactions");
        assert_eq!(fixed.len(), 2, "want 2 fixed transactions, got {fixed:?}");
        for transaction in &fixed {
            assert_eq!(transaction.target, Some(Actor::User(cook.id)));
            assert_eq!(transaction.amount, dec!(3.00));
            assert_eq!(transaction.dining_list_id, Some(list.id));
        }
    }

    #[test]
    fn settlement_preserves_balances() {
        let conn = get_test_connection();
        let association = create_association("Quadrivium", &conn).unwrap();
        let cook = create_user("Piet", &conn).unwrap();
        let anne = create_user("Anne", &conn).unwrap();
        let list =
            create_dining_list(date!(2025 - 03 - 14), association.id, cook.id, &conn).unwrap();
        add_dining_entry(list.id, anne.id, dec!(4.50), &conn).unwrap();
        track_dining_list(list.id, &conn).expect("Could not track list");

        let cook_before = get_balance(Actor::User(cook.id), &conn).unwrap();
        let anne_before = get_balance(Actor::User(anne.id), &conn).unwrap();

        finalise_up_to(list.date, &conn).expect("Could not settle");

        assert_eq!(get_balance(Actor::User(cook.id), &conn), Ok(cook_before));
        assert_eq!(get_balance(Actor::User(anne.id), &conn), Ok(anne_before));
        assert_eq!(cook_before, dec!(4.50));
        assert_eq!(anne_before, dec!(-4.50));
    }

    #[test]
    fn second_run_is_idempotent() {
        let conn = get_test_connection();
        let association = create_association("Quadrivium", &conn).unwrap();
        let cook = create_user("Piet", &conn).unwrap();
        let anne = create_user("Anne", &conn).unwrap();
        let list =
            create_dining_list(date!(2025 - 03 - 14), association.id, cook.id, &conn).unwrap();
        add_dining_entry(list.id, anne.id, dec!(3.00), &conn).unwrap();
        track_dining_list(list.id, &conn).expect("Could not track list");
        finalise_up_to(list.date, &conn).expect("Could not settle");

        let second = finalise_up_to(list.date, &conn).expect("Could not re-run");

        assert_eq!(second, SettlementSummary::default());
        let fixed = get_fixed_transactions(None, &conn).unwrap();
        assert_eq!(fixed.len(), 1, "want 1 fixed transaction, got {fixed:?}");
    }

    #[test]
    fn cutoff_date_leaves_later_lists_tracked() {
        let conn = get_test_connection();
        let association = create_association("Quadrivium", &conn).unwrap();
        let cook = create_user("Piet", &conn).unwrap();
        let anne = create_user("Anne", &conn).unwrap();
        let due =
            create_dining_list(date!(2025 - 03 - 14), association.id, cook.id, &conn).unwrap();
        let later =
            create_dining_list(date!(2025 - 03 - 21), association.id, cook.id, &conn).unwrap();
        add_dining_entry(due.id, anne.id, dec!(3.00), &conn).unwrap();
        add_dining_entry(later.id, anne.id, dec!(3.00), &conn).unwrap();
        track_dining_list(due.id, &conn).unwrap();
        let later_tracker = track_dining_list(later.id, &conn).unwrap();

        let summary = finalise_up_to(date!(2025 - 03 - 14), &conn).expect("Could not settle");

        assert_eq!(summary.settled, 1);
        assert_eq!(get_tracked_dining_lists(&conn), Ok(vec![later_tracker]));
    }

    #[test]
    fn failing_list_does_not_block_others() {
        let conn = get_test_connection();
        let association = create_association("Quadrivium", &conn).unwrap();
        let cook = create_user("Piet", &conn).unwrap();
        let anne = create_user("Anne", &conn).unwrap();
        let bad =
            create_dining_list(date!(2025 - 03 - 07), association.id, cook.id, &conn).unwrap();
        let good =
            create_dining_list(date!(2025 - 03 - 14), association.id, cook.id, &conn).unwrap();
        // A zero-cost share cannot become a fixed transaction.
        add_dining_entry(bad.id, anne.id, dec!(0.00), &conn).unwrap();
        add_dining_entry(good.id, anne.id, dec!(3.00), &conn).unwrap();
        let bad_tracker = track_dining_list(bad.id, &conn).unwrap();
        track_dining_list(good.id, &conn).unwrap();

        let summary = finalise_up_to(date!(2025 - 03 - 14), &conn).expect("Could not settle");

        assert_eq!(summary.settled, 1);
        assert_eq!(
            summary.failures,
            vec![(
                bad.id,
                Error::InvalidTransaction("the transaction amount must be positive")
            )]
        );
        assert_eq!(get_tracked_dining_lists(&conn), Ok(vec![bad_tracker]));

        let fixed = get_fixed_transactions(None, &conn).unwrap();
        assert_eq!(fixed.len(), 1, "want 1 fixed transaction, got {fixed:?}");
    }
}
