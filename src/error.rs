//! Defines the crate level error type shared by the ledger modules.

/// The errors that may occur in the ledger.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// A transaction broke one of the structural rules: the amount was not
    /// positive, or neither a source nor a target was given.
    ///
    /// The message describes the rule that was broken and is suitable for
    /// showing to the user as a form error.
    #[error("invalid transaction: {0}")]
    InvalidTransaction(&'static str),

    /// The source user's balance would fall below their minimum balance
    /// floor if the transaction were created.
    #[error("balance becomes too low")]
    BalanceTooLow,

    /// Associations cannot transfer money between each other.
    #[error("associations cannot transfer money between each other")]
    InvalidTransfer,

    /// The pending transaction was already finalised or cancelled.
    ///
    /// When two callers race to finalise the same transaction, the loser
    /// observes the pending row already gone and receives this error.
    #[error("the pending transaction has already been finalised or cancelled")]
    AlreadyFinalised,

    /// A fixed transaction was the subject of an update or delete.
    ///
    /// Fixed transactions are the closed books of the ledger. This error
    /// indicates a broken caller, not a recoverable condition.
    #[error("fixed transactions cannot be changed or deleted")]
    ImmutableRecord,

    /// The dining list is already tracked for settlement.
    #[error("the dining list is already awaiting settlement")]
    AlreadyTracked,

    /// No member of the association has a negative balance to clear.
    #[error("there are no members with a negative balance to process")]
    NoOpenExpenses,

    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// Could not acquire the database lock.
    #[error("could not acquire the database lock")]
    DatabaseLock,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            // Code 1811 occurs when a trigger aborted the statement.
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 1811
                    && desc.contains("fixed transactions are immutable") =>
            {
                Error::ImmutableRecord
            }
            // Code 2067 occurs when a UNIQUE constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067
                    && desc.ends_with("pending_dining_list_tracker.dining_list_id") =>
            {
                Error::AlreadyTracked
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}
