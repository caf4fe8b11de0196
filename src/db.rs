//! Store initialization for the ledger database.

use std::time::Duration;

use rusqlite::Connection;

use crate::{actor, dining, transaction};

/// Create the database schema for the domain models.
///
/// Safe to call on an existing database; tables and triggers are only
/// created when missing.
///
/// # Errors
/// Returns an error if a table or trigger cannot be created or if there is
/// an SQL error.
pub fn initialize(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.pragma_update(None, "foreign_keys", "ON")?;
    connection.busy_timeout(Duration::from_secs(5))?;

    actor::create_user_table(connection)?;
    actor::create_association_table(connection)?;
    actor::create_user_membership_table(connection)?;
    dining::create_dining_list_table(connection)?;
    dining::create_dining_entry_table(connection)?;
    transaction::create_pending_transaction_table(connection)?;
    transaction::create_fixed_transaction_table(connection)?;
    dining::create_pending_dining_list_tracker_table(connection)?;

    Ok(())
}
