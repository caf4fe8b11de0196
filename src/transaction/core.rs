//! Defines the core data models and database queries for ledger transactions.
//!
//! The ledger is layered: fixed transactions are the immutable closed books,
//! pending transactions await settlement, and dining-derived pending
//! transactions live in [crate::dining] as a projection over open dining
//! lists.

use rusqlite::{Connection, Row};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Error, actor,
    actor::Actor,
    balance,
    config::LedgerConfig,
    database_id::{AssociationId, DiningListId, TransactionId, UserId},
    money,
};

// ============================================================================
// MODELS
// ============================================================================

/// An immutable, settled ledger entry.
///
/// Fixed transactions are created by finalising a pending transaction and
/// are never updated or deleted afterwards. The database enforces this with
/// triggers, surfaced as [Error::ImmutableRecord].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedTransaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The actor giving the money, if any.
    pub source: Option<Actor>,
    /// The actor receiving the money, if any.
    pub target: Option<Actor>,
    /// The amount of money transferred, always positive.
    pub amount: Decimal,
    /// When the transfer was initiated.
    pub order_moment: OffsetDateTime,
    /// When the transfer was settled.
    pub confirm_moment: OffsetDateTime,
    /// A text description of what the transfer was for.
    pub description: String,
    /// The dining list that caused this transaction, informational only.
    pub dining_list_id: Option<DiningListId>,
}

/// A mutable, not-yet-settled ledger entry.
///
/// A pending transaction either gets finalised into a [FixedTransaction]
/// or cancelled, both terminal.
///
/// To create a new `PendingTransaction`, use [PendingTransaction::build].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingTransaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The actor giving the money, if any.
    pub source: Option<Actor>,
    /// The actor receiving the money, if any.
    pub target: Option<Actor>,
    /// The amount of money transferred, always positive.
    pub amount: Decimal,
    /// When the transfer was initiated.
    pub order_moment: OffsetDateTime,
    /// A text description of what the transfer was for.
    pub description: String,
}

impl PendingTransaction {
    /// Create a new pending transaction.
    ///
    /// Shortcut for [NewTransaction] for discoverability.
    pub fn build(amount: Decimal, description: &str) -> NewTransaction {
        NewTransaction {
            source: None,
            target: None,
            amount: amount.round_dp(2),
            order_moment: OffsetDateTime::now_utc(),
            description: description.to_owned(),
        }
    }
}

/// A builder for transactions that have not been persisted yet.
///
/// At least one of source and target must be set before the transaction is
/// created, and an association cannot be both.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    /// The actor giving the money.
    pub source: Option<Actor>,
    /// The actor receiving the money.
    pub target: Option<Actor>,
    /// The amount of money to transfer, rounded to two fractional digits.
    pub amount: Decimal,
    /// When the transfer was initiated. Defaults to now.
    pub order_moment: OffsetDateTime,
    /// A text description of what the transfer is for.
    pub description: String,
}

impl NewTransaction {
    /// Set the actor giving the money.
    pub fn source(mut self, actor: Actor) -> Self {
        self.source = Some(actor);
        self
    }

    /// Set the actor receiving the money.
    pub fn target(mut self, actor: Actor) -> Self {
        self.target = Some(actor);
        self
    }

    /// Set the moment the transfer was initiated.
    pub fn order_moment(mut self, moment: OffsetDateTime) -> Self {
        self.order_moment = moment;
        self
    }
}

/// Check the structural rules that hold for every transaction.
///
/// The at-most-one-source and at-most-one-target rules are encoded in the
/// [Actor] type and backed by CHECK constraints for writes that bypass this
/// crate.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidTransaction] if the amount is not positive or neither a
///   source nor a target is set,
/// - or [Error::InvalidTransfer] if both source and target are associations.
pub(crate) fn validate(transaction: &NewTransaction) -> Result<(), Error> {
    if transaction.amount <= Decimal::ZERO {
        return Err(Error::InvalidTransaction(
            "the transaction amount must be positive",
        ));
    }

    if transaction.source.is_none() && transaction.target.is_none() {
        return Err(Error::InvalidTransaction(
            "there must be at least a source or a target",
        ));
    }

    if let (Some(Actor::Association(_)), Some(Actor::Association(_))) =
        (transaction.source, transaction.target)
    {
        return Err(Error::InvalidTransfer);
    }

    Ok(())
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

const PENDING_COLUMNS: &str =
    "id, source_user, source_association, target_user, target_association, \
     amount, order_moment, description";

const FIXED_COLUMNS: &str =
    "id, source_user, source_association, target_user, target_association, \
     amount, order_moment, description, confirm_moment, dining_list_id";

/// Create the pending transaction table.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub(crate) fn create_pending_transaction_table(
    connection: &Connection,
) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS pending_transaction (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source_user INTEGER REFERENCES user(id),
                source_association INTEGER REFERENCES association(id),
                target_user INTEGER REFERENCES user(id),
                target_association INTEGER REFERENCES association(id),
                amount TEXT NOT NULL,
                order_moment TEXT NOT NULL,
                description TEXT NOT NULL,
                CHECK (source_user IS NULL OR source_association IS NULL),
                CHECK (target_user IS NULL OR target_association IS NULL),
                CHECK (source_user IS NOT NULL OR source_association IS NOT NULL
                    OR target_user IS NOT NULL OR target_association IS NOT NULL)
                )",
        (),
    )?;

    Ok(())
}

/// Create the fixed transaction table and its immutability triggers.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub(crate) fn create_fixed_transaction_table(
    connection: &Connection,
) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS fixed_transaction (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source_user INTEGER REFERENCES user(id),
                source_association INTEGER REFERENCES association(id),
                target_user INTEGER REFERENCES user(id),
                target_association INTEGER REFERENCES association(id),
                amount TEXT NOT NULL,
                order_moment TEXT NOT NULL,
                description TEXT NOT NULL,
                confirm_moment TEXT NOT NULL,
                dining_list_id INTEGER REFERENCES dining_list(id),
                CHECK (source_user IS NULL OR source_association IS NULL),
                CHECK (target_user IS NULL OR target_association IS NULL),
                CHECK (source_user IS NOT NULL OR source_association IS NOT NULL
                    OR target_user IS NOT NULL OR target_association IS NOT NULL)
                );

         CREATE TRIGGER IF NOT EXISTS fixed_transaction_no_update
         BEFORE UPDATE ON fixed_transaction
         BEGIN
             SELECT RAISE(ABORT, 'fixed transactions are immutable');
         END;

         CREATE TRIGGER IF NOT EXISTS fixed_transaction_no_delete
         BEFORE DELETE ON fixed_transaction
         BEGIN
             SELECT RAISE(ABORT, 'fixed transactions are immutable');
         END;",
    )?;

    Ok(())
}

/// Create a new pending transaction in the database from a builder.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidTransaction] if the amount is not positive or neither
///   a source nor a target is set,
/// - or [Error::InvalidTransfer] if money would move between two
///   associations,
/// - or [Error::BalanceTooLow] if the source is a user whose balance would
///   fall below their minimum balance floor,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn create_pending_transaction(
    transaction: NewTransaction,
    config: &LedgerConfig,
    connection: &Connection,
) -> Result<PendingTransaction, Error> {
    validate(&transaction)?;

    if let Some(Actor::User(user_id)) = transaction.source {
        let user = actor::get_user(user_id, connection)?;
        let floor = actor::minimum_balance_for(&user, config);
        let current_balance = balance::get_balance(Actor::User(user_id), connection)?;

        if current_balance - transaction.amount < floor {
            return Err(Error::BalanceTooLow);
        }
    }

    let (source_user, source_association) = actor_ids(transaction.source);
    let (target_user, target_association) = actor_ids(transaction.target);

    let query = format!(
        "INSERT INTO pending_transaction \
         (source_user, source_association, target_user, target_association, \
          amount, order_moment, description)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         RETURNING {PENDING_COLUMNS}"
    );

    let transaction = connection.prepare(&query)?.query_row(
        (
            source_user,
            source_association,
            target_user,
            target_association,
            money::encode_amount(transaction.amount),
            transaction.order_moment,
            transaction.description,
        ),
        map_pending_transaction_row,
    )?;

    Ok(transaction)
}

/// Retrieve a pending transaction from the database by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a pending transaction,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_pending_transaction(
    id: TransactionId,
    connection: &Connection,
) -> Result<PendingTransaction, Error> {
    let query = format!("SELECT {PENDING_COLUMNS} FROM pending_transaction WHERE id = :id");

    connection
        .prepare(&query)?
        .query_row(&[(":id", &id)], map_pending_transaction_row)
        .map_err(|error| error.into())
}

/// Retrieve pending transactions, optionally filtered to those involving
/// `actor` as source or target, ordered by order moment descending.
///
/// # Errors
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn get_pending_transactions(
    actor: Option<Actor>,
    connection: &Connection,
) -> Result<Vec<PendingTransaction>, Error> {
    let (clause, id) = actor_clause(actor);
    let query = format!(
        "SELECT {PENDING_COLUMNS} FROM pending_transaction {clause} \
         ORDER BY order_moment DESC, id DESC"
    );
    let mut statement = connection.prepare(&query)?;

    let rows = match id {
        Some(id) => statement.query_map(&[(":id", &id)], map_pending_transaction_row)?,
        None => statement.query_map([], map_pending_transaction_row)?,
    };

    rows.map(|row_result| row_result.map_err(Error::SqlError))
        .collect()
}

/// Retrieve fixed transactions, optionally filtered to those involving
/// `actor` as source or target, ordered by order moment descending.
///
/// # Errors
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn get_fixed_transactions(
    actor: Option<Actor>,
    connection: &Connection,
) -> Result<Vec<FixedTransaction>, Error> {
    let (clause, id) = actor_clause(actor);
    let query = format!(
        "SELECT {FIXED_COLUMNS} FROM fixed_transaction {clause} \
         ORDER BY order_moment DESC, id DESC"
    );
    let mut statement = connection.prepare(&query)?;

    let rows = match id {
        Some(id) => statement.query_map(&[(":id", &id)], map_fixed_transaction_row)?,
        None => statement.query_map([], map_fixed_transaction_row)?,
    };

    rows.map(|row_result| row_result.map_err(Error::SqlError))
        .collect()
}

/// Cancel a pending transaction, removing it from the ledger.
///
/// Cancellation is terminal: the transaction can no longer be finalised.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a pending transaction,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn cancel_pending_transaction(
    id: TransactionId,
    connection: &Connection,
) -> Result<(), Error> {
    let deleted = connection.execute("DELETE FROM pending_transaction WHERE id = ?1", [id])?;

    if deleted == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Insert a fixed transaction.
///
/// Only the finalisation paths create fixed transactions; callers must have
/// validated `transaction` first.
pub(crate) fn insert_fixed_transaction(
    transaction: &NewTransaction,
    confirm_moment: OffsetDateTime,
    dining_list_id: Option<DiningListId>,
    connection: &Connection,
) -> Result<FixedTransaction, Error> {
    let (source_user, source_association) = actor_ids(transaction.source);
    let (target_user, target_association) = actor_ids(transaction.target);

    let query = format!(
        "INSERT INTO fixed_transaction \
         (source_user, source_association, target_user, target_association, \
          amount, order_moment, description, confirm_moment, dining_list_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         RETURNING {FIXED_COLUMNS}"
    );

    let fixed = connection.prepare(&query)?.query_row(
        (
            source_user,
            source_association,
            target_user,
            target_association,
            money::encode_amount(transaction.amount),
            transaction.order_moment,
            &transaction.description,
            confirm_moment,
            dining_list_id,
        ),
        map_fixed_transaction_row,
    )?;

    Ok(fixed)
}

/// Split an optional actor into its user and association columns.
fn actor_ids(actor: Option<Actor>) -> (Option<UserId>, Option<AssociationId>) {
    match actor {
        Some(Actor::User(id)) => (Some(id), None),
        Some(Actor::Association(id)) => (None, Some(id)),
        None => (None, None),
    }
}

/// Combine the user and association columns back into an actor.
pub(crate) fn actor_from_ids(
    user: Option<UserId>,
    association: Option<AssociationId>,
) -> Option<Actor> {
    match (user, association) {
        (Some(id), None) => Some(Actor::User(id)),
        (None, Some(id)) => Some(Actor::Association(id)),
        _ => None,
    }
}

/// WHERE clause and bound ID selecting rows that involve `actor`.
fn actor_clause(actor: Option<Actor>) -> (&'static str, Option<i64>) {
    match actor {
        Some(Actor::User(id)) => ("WHERE source_user = :id OR target_user = :id", Some(id)),
        Some(Actor::Association(id)) => (
            "WHERE source_association = :id OR target_association = :id",
            Some(id),
        ),
        None => ("", None),
    }
}

/// Map a database row to a [PendingTransaction].
pub(crate) fn map_pending_transaction_row(
    row: &Row,
) -> Result<PendingTransaction, rusqlite::Error> {
    Ok(PendingTransaction {
        id: row.get(0)?,
        source: actor_from_ids(row.get(1)?, row.get(2)?),
        target: actor_from_ids(row.get(3)?, row.get(4)?),
        amount: money::read_amount(row, 5)?,
        order_moment: row.get(6)?,
        description: row.get(7)?,
    })
}

/// Map a database row to a [FixedTransaction].
pub(crate) fn map_fixed_transaction_row(
    row: &Row,
) -> Result<FixedTransaction, rusqlite::Error> {
    Ok(FixedTransaction {
        id: row.get(0)?,
        source: actor_from_ids(row.get(1)?, row.get(2)?),
        target: actor_from_ids(row.get(3)?, row.get(4)?),
        amount: money::read_amount(row, 5)?,
        order_moment: row.get(6)?,
        description: row.get(7)?,
        confirm_moment: row.get(8)?,
        dining_list_id: row.get(9)?,
    })
}

// ============================================================================
// TESTS
// ============================================================================
