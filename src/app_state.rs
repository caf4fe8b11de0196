//! Implements a struct that holds the state shared by request workers.

use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;

use crate::{Error, config::LedgerConfig, db::initialize};

/// The state shared by the request handling workers of the application.
///
/// All ledger state lives in the database; workers share a single
/// connection behind a mutex.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The config that controls the ledger's business rules.
    pub config: LedgerConfig,

    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl AppState {
    /// Create a new [AppState] with a SQLite database connection.
    ///
    /// This function will initialize the database by adding the tables for
    /// the domain models.
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized.
    pub fn new(db_connection: Connection, config: LedgerConfig) -> Result<Self, Error> {
        initialize(&db_connection)?;

        Ok(Self {
            config,
            db_connection: Arc::new(Mutex::new(db_connection)),
        })
    }

    /// Lock the database connection for the current worker.
    ///
    /// # Errors
    /// Returns [Error::DatabaseLock] if the lock is poisoned.
    pub fn lock_connection(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        self.db_connection.lock().map_err(|_| Error::DatabaseLock)
    }
}

#[cfg(test)]
mod app_state_tests {
    use rusqlite::Connection;
    use rust_decimal_macros::dec;

    use crate::{
        actor::{Actor, create_user},
        balance::get_balance,
        config::LedgerConfig,
        transaction::{PendingTransaction, create_pending_transaction},
    };

    use super::AppState;

    #[test]
    fn new_initializes_schema() {
        let conn = Connection::open_in_memory().unwrap();

        let state = AppState::new(conn, LedgerConfig::default()).expect("Could not create state");

        let connection = state.lock_connection().expect("Could not lock connection");
        let user = create_user("Piet", &connection).expect("Could not create user");
        create_pending_transaction(
            PendingTransaction::build(dec!(1.00), "").target(Actor::User(user.id)),
            &state.config,
            &connection,
        )
        .expect("Could not create transaction");

        assert_eq!(get_balance(Actor::User(user.id), &connection), Ok(dec!(1.00)));
    }
}
