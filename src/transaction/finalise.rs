//! Finalisation: the atomic conversion of a pending transaction into a
//! fixed one.

use rusqlite::Connection;
use time::OffsetDateTime;

use crate::{Error, database_id::TransactionId};

use super::core::{
    FixedTransaction, NewTransaction, get_pending_transaction, insert_fixed_transaction, validate,
};

/// Finalise a pending transaction, moving it to the closed books.
///
/// The fixed transaction keeps the pending transaction's source, target,
/// amount, order moment and description; its confirm moment is now. The
/// insert of the fixed row and the delete of the pending row happen in a
/// single store transaction, so the move is never observable half-done.
/// When two callers race on the same transaction, exactly one wins and the
/// other receives [Error::AlreadyFinalised].
///
/// # Errors
/// This function will return a:
/// - [Error::AlreadyFinalised] if the pending transaction no longer
///   exists, because it was already finalised or cancelled,
/// - or [Error::InvalidTransaction]/[Error::InvalidTransfer] if the stored
///   row no longer satisfies the transaction rules,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn finalise_transaction(
    id: TransactionId,
    connection: &Connection,
) -> Result<FixedTransaction, Error> {
    // Only a &Connection is available through the mutex guard.
    let tx = connection.unchecked_transaction()?;

    let pending = match get_pending_transaction(id, &tx) {
        Ok(pending) => pending,
        Err(Error::NotFound) => return Err(Error::AlreadyFinalised),
        Err(error) => return Err(error),
    };

    let builder = NewTransaction {
        source: pending.source,
        target: pending.target,
        amount: pending.amount,
        order_moment: pending.order_moment,
        description: pending.description,
    };
    validate(&builder)?;

    let fixed = insert_fixed_transaction(&builder, OffsetDateTime::now_utc(), None, &tx)?;

    let deleted = tx.execute("DELETE FROM pending_transaction WHERE id = ?1", [id])?;

    if deleted == 0 {
        return Err(Error::AlreadyFinalised);
    }

    tx.commit()?;

    Ok(fixed)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod finalise_tests {
    use rusqlite::Connection;
    use rust_decimal_macros::dec;

    use crate::{
        Error,
        actor::{Actor, create_association, create_user},
        balance::get_balance,
        config::LedgerConfig,
        db::initialize,
        transaction::{
            PendingTransaction, create_pending_transaction, get_fixed_transactions,
            get_pending_transactions,
        },
    };

    use super::finalise_transaction;

    fn get_test_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn
    }

    #[test]
    fn finalise_moves_pending_to_fixed() {
        let conn = get_test_connection();
        let config = LedgerConfig::default();
        let association = create_association("Quadrivium", &conn).unwrap();
        let user = create_user("Piet", &conn).unwrap();
        let pending = create_pending_transaction(
            PendingTransaction::build(dec!(5.00), "Top up")
                .source(Actor::Association(association.id))
                .target(Actor::User(user.id)),
            &config,
            &conn,
        )
        .expect("Could not create transaction");

        let fixed = finalise_transaction(pending.id, &conn).expect("Could not finalise");

        assert_eq!(fixed.source, pending.source);
        assert_eq!(fixed.target, pending.target);
        assert_eq!(fixed.amount, pending.amount);
        assert_eq!(fixed.order_moment, pending.order_moment);
        assert_eq!(fixed.description, pending.description);
        assert!(fixed.confirm_moment >= pending.order_moment);

        assert_eq!(
            get_pending_transactions(Some(Actor::User(user.id)), &conn),
            Ok(Vec::new())
        );
        assert_eq!(
            get_fixed_transactions(Some(Actor::User(user.id)), &conn),
            Ok(vec![fixed])
        );
    }

    #[test]
    fn finalise_preserves_balances() {
        let conn = get_test_connection();
        let config = LedgerConfig::default();
        let association = create_association("Quadrivium", &conn).unwrap();
        let user = create_user("Piet", &conn).unwrap();
        let pending = create_pending_transaction(
            PendingTransaction::build(dec!(5.00), "Top up")
                .source(Actor::Association(association.id))
                .target(Actor::User(user.id)),
            &config,
            &conn,
        )
        .unwrap();

        finalise_transaction(pending.id, &conn).expect("Could not finalise");

        assert_eq!(get_balance(Actor::User(user.id), &conn), Ok(dec!(5.00)));
        assert_eq!(
            get_balance(Actor::Association(association.id), &conn),
            Ok(dec!(-5.00))
        );
    }

    #[test]
    fn finalise_twice_fails() {
        let conn = get_test_connection();
        let config = LedgerConfig::default();
        let user = create_user("Piet", &conn).unwrap();
        let pending = create_pending_transaction(
            PendingTransaction::build(dec!(2.00), "").target(Actor::User(user.id)),
            &config,
            &conn,
        )
        .unwrap();

        finalise_transaction(pending.id, &conn).expect("Could not finalise");

        assert_eq!(
            finalise_transaction(pending.id, &conn),
            Err(Error::AlreadyFinalised)
        );
    }

    #[test]
    fn finalise_unknown_id_fails() {
        let conn = get_test_connection();

        assert_eq!(
            finalise_transaction(99, &conn),
            Err(Error::AlreadyFinalised)
        );
    }
}
