//! Clearing open expenses: an association settles the debt of its members.

use rusqlite::Connection;
use rust_decimal::Decimal;

use crate::{
    Error,
    actor::{Actor, get_association, get_members},
    balance::annotate_user_balances,
    config::LedgerConfig,
    database_id::AssociationId,
};

use super::core::{PendingTransaction, create_pending_transaction};

/// Create a pending transaction from the association to each of its members
/// with a negative overall balance, bringing those members back to zero.
///
/// All transactions are created in a single store transaction so a partial
/// clearing is never observable.
///
/// # Errors
/// This function will return a:
/// - [Error::NoOpenExpenses] if no member has a negative balance,
/// - or [Error::NotFound] if the association does not exist,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn clear_open_expenses(
    association_id: AssociationId,
    config: &LedgerConfig,
    connection: &Connection,
) -> Result<Vec<PendingTransaction>, Error> {
    let association = get_association(association_id, connection)?;
    let members = get_members(association_id, connection)?;
    let balances = annotate_user_balances(&members, connection)?;

    let negative: Vec<_> = members
        .iter()
        .filter_map(|id| match balances.get(id) {
            Some(&balance) if balance < Decimal::ZERO => Some((*id, balance)),
            _ => None,
        })
        .collect();

    if negative.is_empty() {
        return Err(Error::NoOpenExpenses);
    }

    let description = format!("Process open costs to {}", association.name);

    // Only a &Connection is available through the mutex guard.
    let tx = connection.unchecked_transaction()?;
    let mut created = Vec::with_capacity(negative.len());

    for (user_id, balance) in negative {
        created.push(create_pending_transaction(
            PendingTransaction::build(-balance, &description)
                .source(Actor::Association(association_id))
                .target(Actor::User(user_id)),
            config,
            &tx,
        )?);
    }

    tx.commit()?;

    Ok(created)
}

// ============================================================================
// TESTS
// ============================================================================
