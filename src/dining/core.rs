//! Defines the dining list data models and the pending dining transaction
//! projection.

use rusqlite::{Connection, Row};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::{
    Error,
    actor::Actor,
    database_id::{AssociationId, DiningEntryId, DiningListId, UserId},
    money,
    transaction::NewTransaction,
};

// ============================================================================
// MODELS
// ============================================================================

/// A shared dinner organised under an association.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiningList {
    /// The ID of the dining list.
    pub id: DiningListId,
    /// The date the dinner is served.
    pub date: Date,
    /// The association under which the dinner is organised.
    pub association_id: AssociationId,
    /// The user that claimed the list and paid for the groceries. Dining
    /// costs are owed to this user.
    pub claimed_by: UserId,
}

/// A participant of a dining list and the share of the cost they owe.
///
/// Entry costs are owned by the dining side of the application; the ledger
/// only reads them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiningEntry {
    /// The ID of the dining entry.
    pub id: DiningEntryId,
    /// The dining list the entry belongs to.
    pub dining_list_id: DiningListId,
    /// The participating user.
    pub user_id: UserId,
    /// The share of the dining cost owed by the participant.
    pub cost: Decimal,
}

/// A virtual pending transaction derived from an unsettled dining list.
///
/// This is not a stored row. It is recomputed from the live dining entries
/// of every tracked list and disappears once the list is settled. It can
/// only be materialised into a [crate::FixedTransaction] through the bulk
/// settlement path in [crate::finalise_up_to].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingDiningTransaction {
    /// The dining list the transaction is derived from.
    pub dining_list_id: DiningListId,
    /// The participant owing their share of the cost.
    pub source: UserId,
    /// The user that claimed the dining list.
    pub target: UserId,
    /// The share of the dining cost.
    pub amount: Decimal,
    /// When the transfer was initiated, taken to be the start of the
    /// dinner's date.
    pub order_moment: OffsetDateTime,
    /// A text description of what the transfer is for.
    pub description: String,
}

impl PendingDiningTransaction {
    /// The builder for the fixed transaction this virtual row settles into.
    pub(crate) fn to_transaction(&self) -> NewTransaction {
        NewTransaction {
            source: Some(Actor::User(self.source)),
            target: Some(Actor::User(self.target)),
            amount: self.amount,
            order_moment: self.order_moment,
            description: self.description.clone(),
        }
    }
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create the dining list table.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub(crate) fn create_dining_list_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS dining_list (
                id INTEGER PRIMARY KEY,
                date TEXT NOT NULL,
                association_id INTEGER NOT NULL REFERENCES association(id),
                claimed_by INTEGER NOT NULL REFERENCES user(id)
                )",
        (),
    )?;

    Ok(())
}

/// Create the dining entry table.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub(crate) fn create_dining_entry_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS dining_entry (
                id INTEGER PRIMARY KEY,
                dining_list_id INTEGER NOT NULL REFERENCES dining_list(id),
                user_id INTEGER NOT NULL REFERENCES user(id),
                cost TEXT NOT NULL
                )",
        (),
    )?;

    Ok(())
}

/// Create a new dining list in the database.
///
/// # Errors
/// Returns a [Error::SqlError] if the association or claimant does not
/// exist, or if there is some other SQL error.
pub fn create_dining_list(
    date: Date,
    association_id: AssociationId,
    claimed_by: UserId,
    connection: &Connection,
) -> Result<DiningList, Error> {
    connection.execute(
        "INSERT INTO dining_list (date, association_id, claimed_by) VALUES (?1, ?2, ?3)",
        (date, association_id, claimed_by),
    )?;

    Ok(DiningList {
        id: connection.last_insert_rowid(),
        date,
        association_id,
        claimed_by,
    })
}

/// Retrieve a dining list from the database by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a dining list,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_dining_list(id: DiningListId, connection: &Connection) -> Result<DiningList, Error> {
    connection
        .prepare("SELECT id, date, association_id, claimed_by FROM dining_list WHERE id = :id")?
        .query_row(&[(":id", &id)], map_dining_list_row)
        .map_err(|error| error.into())
}

/// Add a participant with their owed share of the cost to a dining list.
///
/// # Errors
/// Returns a [Error::SqlError] if the dining list or user does not exist,
/// or if there is some other SQL error.
pub fn add_dining_entry(
    dining_list_id: DiningListId,
    user_id: UserId,
    cost: Decimal,
    connection: &Connection,
) -> Result<DiningEntry, Error> {
    connection.execute(
        "INSERT INTO dining_entry (dining_list_id, user_id, cost) VALUES (?1, ?2, ?3)",
        (dining_list_id, user_id, money::encode_amount(cost)),
    )?;

    Ok(DiningEntry {
        id: connection.last_insert_rowid(),
        dining_list_id,
        user_id,
        cost: cost.round_dp(2),
    })
}

/// Retrieve the entries of a dining list.
///
/// # Errors
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn get_dining_entries(
    dining_list_id: DiningListId,
    connection: &Connection,
) -> Result<Vec<DiningEntry>, Error> {
    connection
        .prepare(
            "SELECT id, dining_list_id, user_id, cost FROM dining_entry \
             WHERE dining_list_id = :id ORDER BY id",
        )?
        .query_map(&[(":id", &dining_list_id)], map_dining_entry_row)?
        .map(|row_result| row_result.map_err(Error::SqlError))
        .collect()
}

/// Retrieve the pending dining transactions derived from every tracked
/// dining list, optionally filtered to those involving `user`.
///
/// Associations are never part of dining transactions, so there is no
/// association filter.
///
/// # Errors
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn pending_dining_transactions(
    user: Option<UserId>,
    connection: &Connection,
) -> Result<Vec<PendingDiningTransaction>, Error> {
    let rows = connection
        .prepare(
            "SELECT dining_list.id, dining_list.date, dining_list.claimed_by, \
                    dining_entry.user_id, dining_entry.cost
             FROM pending_dining_list_tracker
             JOIN dining_list ON dining_list.id = pending_dining_list_tracker.dining_list_id
             JOIN dining_entry ON dining_entry.dining_list_id = dining_list.id
             WHERE :user IS NULL OR dining_entry.user_id = :user OR dining_list.claimed_by = :user
             ORDER BY dining_list.date DESC, dining_entry.id",
        )?
        .query_map(&[(":user", &user)], map_derived_transaction_row)?
        .map(|row_result| row_result.map_err(Error::SqlError))
        .collect();

    rows
}

/// Derive the pending dining transactions of a single dining list from its
/// entries, whether or not the list is tracked.
///
/// Settlement already holds the tracker row, which is what guarantees the
/// list is still unsettled.
pub(crate) fn dining_transactions_for_list(
    list: &DiningList,
    connection: &Connection,
) -> Result<Vec<PendingDiningTransaction>, Error> {
    let entries = get_dining_entries(list.id, connection)?;

    Ok(entries
        .into_iter()
        .map(|entry| derive_transaction(list.id, list.date, list.claimed_by, entry.user_id, entry.cost))
        .collect())
}

/// Build the virtual transaction for one dining entry.
fn derive_transaction(
    dining_list_id: DiningListId,
    date: Date,
    claimed_by: UserId,
    user_id: UserId,
    cost: Decimal,
) -> PendingDiningTransaction {
    PendingDiningTransaction {
        dining_list_id,
        source: user_id,
        target: claimed_by,
        amount: cost,
        order_moment: date.midnight().assume_utc(),
        description: format!("Dining list {date}"),
    }
}

/// Map a database row to a [DiningList].
fn map_dining_list_row(row: &Row) -> Result<DiningList, rusqlite::Error> {
    Ok(DiningList {
        id: row.get(0)?,
        date: row.get(1)?,
        association_id: row.get(2)?,
        claimed_by: row.get(3)?,
    })
}

/// Map a database row to a [DiningEntry].
fn map_dining_entry_row(row: &Row) -> Result<DiningEntry, rusqlite::Error> {
    Ok(DiningEntry {
        id: row.get(0)?,
        dining_list_id: row.get(1)?,
        user_id: row.get(2)?,
        cost: money::read_amount(row, 3)?,
    })
}

/// Map a joined tracker/list/entry row to a [PendingDiningTransaction].
fn map_derived_transaction_row(
    row: &Row,
) -> Result<PendingDiningTransaction, rusqlite::Error> {
    let dining_list_id = row.get(0)?;
    let date: Date = row.get(1)?;
    let claimed_by = row.get(2)?;
    let user_id = row.get(3)?;
    let cost = money::read_amount(row, 4)?;

    Ok(derive_transaction(
        dining_list_id,
        date,
        claimed_by,
        user_id,
        cost,
    ))
}

// ============================================================================
// TESTS
// ============================================================================
