//! Balance computation across the three transaction layers.
//!
//! A balance is never stored. It is recomputed from the transaction set on
//! every query: the fixed, pending and pending-dining layers are summed
//! independently and combined, so the ledger stays an append-only log
//! rather than a cached counter that can drift.

use std::collections::HashMap;

use rusqlite::{Connection, ToSql};
use rust_decimal::Decimal;
use time::OffsetDateTime;

use crate::{Error, actor::Actor, database_id::UserId, money};

/// Get the net balance of an actor across all three transaction layers.
///
/// Amounts received are positive, amounts given are negative.
///
/// # Errors
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn get_balance(actor: Actor, connection: &Connection) -> Result<Decimal, Error> {
    let fixed = fixed_balance(actor, None, connection)?;
    let pending = pending_balance(actor, None, connection)?;
    let dining = dining_balance(actor, None, connection)?;

    Ok(fixed + pending + dining)
}

/// Get the net balance of an actor considering only transactions ordered
/// on or before `as_of`.
///
/// # Errors
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn get_balance_at(
    actor: Actor,
    as_of: OffsetDateTime,
    connection: &Connection,
) -> Result<Decimal, Error> {
    let fixed = fixed_balance(actor, Some(as_of), connection)?;
    let pending = pending_balance(actor, Some(as_of), connection)?;
    let dining = dining_balance(actor, Some(as_of), connection)?;

    Ok(fixed + pending + dining)
}

/// Get the balance contribution of the fixed transaction layer.
///
/// # Errors
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn fixed_balance(
    actor: Actor,
    as_of: Option<OffsetDateTime>,
    connection: &Connection,
) -> Result<Decimal, Error> {
    stored_layer_balance("fixed_transaction", actor, as_of, connection)
}

/// Get the balance contribution of the pending transaction layer.
///
/// # Errors
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn pending_balance(
    actor: Actor,
    as_of: Option<OffsetDateTime>,
    connection: &Connection,
) -> Result<Decimal, Error> {
    stored_layer_balance("pending_transaction", actor, as_of, connection)
}

/// Get the balance contribution of the pending dining transaction layer.
///
/// Associations are never part of dining transactions, so their dining
/// balance is always zero.
///
/// # Errors
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn dining_balance(
    actor: Actor,
    as_of: Option<OffsetDateTime>,
    connection: &Connection,
) -> Result<Decimal, Error> {
    let Actor::User(id) = actor else {
        return Ok(Decimal::ZERO);
    };

    // The derived order moment is the start of the list's date, so the
    // cutoff only needs the date part.
    let as_of_date = as_of.map(|moment| moment.date());

    let rows = connection
        .prepare(
            "SELECT dining_entry.user_id, dining_list.claimed_by, dining_entry.cost
             FROM pending_dining_list_tracker
             JOIN dining_list ON dining_list.id = pending_dining_list_tracker.dining_list_id
             JOIN dining_entry ON dining_entry.dining_list_id = dining_list.id
             WHERE (dining_entry.user_id = :id OR dining_list.claimed_by = :id)
             AND (:as_of IS NULL OR dining_list.date <= :as_of)",
        )?
        .query_map(
            &[
                (":id", &id as &dyn ToSql),
                (":as_of", &as_of_date as &dyn ToSql),
            ],
            |row| {
                Ok((
                    row.get::<_, UserId>(0)?,
                    row.get::<_, UserId>(1)?,
                    money::read_amount(row, 2)?,
                ))
            },
        )?
        .collect::<Result<Vec<_>, _>>()?;

    let mut balance = Decimal::ZERO;

    for (participant, claimant, cost) in rows {
        if claimant == id {
            balance += cost;
        }
        if participant == id {
            balance -= cost;
        }
    }

    Ok(balance)
}

/// Get the net balances of many users at once.
///
/// Produces the same results as calling [get_balance] for each user, with
/// one pass over each layer instead of one per user. Users without
/// transactions map to zero.
///
/// # Errors
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn annotate_user_balances(
    user_ids: &[UserId],
    connection: &Connection,
) -> Result<HashMap<UserId, Decimal>, Error> {
    let mut balances: HashMap<UserId, Decimal> =
        user_ids.iter().map(|&id| (id, Decimal::ZERO)).collect();

    for table in ["fixed_transaction", "pending_transaction"] {
        let query = format!(
            "SELECT source_user, target_user, amount FROM {table} \
             WHERE source_user IS NOT NULL OR target_user IS NOT NULL"
        );

        let rows = connection
            .prepare(&query)?
            .query_map([], |row| {
                Ok((
                    row.get::<_, Option<UserId>>(0)?,
                    row.get::<_, Option<UserId>>(1)?,
                    money::read_amount(row, 2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        for (source, target, amount) in rows {
            apply_transfer(&mut balances, source, target, amount);
        }
    }

    let dining_rows = connection
        .prepare(
            "SELECT dining_entry.user_id, dining_list.claimed_by, dining_entry.cost
             FROM pending_dining_list_tracker
             JOIN dining_list ON dining_list.id = pending_dining_list_tracker.dining_list_id
             JOIN dining_entry ON dining_entry.dining_list_id = dining_list.id",
        )?
        .query_map([], |row| {
            Ok((
                row.get::<_, UserId>(0)?,
                row.get::<_, UserId>(1)?,
                money::read_amount(row, 2)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    for (participant, claimant, cost) in dining_rows {
        apply_transfer(&mut balances, Some(participant), Some(claimant), cost);
    }

    Ok(balances)
}

/// Sum a single stored transaction table for one actor.
fn stored_layer_balance(
    table: &str,
    actor: Actor,
    as_of: Option<OffsetDateTime>,
    connection: &Connection,
) -> Result<Decimal, Error> {
    let (source_column, target_column, id) = match actor {
        Actor::User(id) => ("source_user", "target_user", id),
        Actor::Association(id) => ("source_association", "target_association", id),
    };

    let query = format!(
        "SELECT {source_column}, {target_column}, amount FROM {table} \
         WHERE ({source_column} = :id OR {target_column} = :id) \
         AND (:as_of IS NULL OR order_moment <= :as_of)"
    );

    let rows = connection
        .prepare(&query)?
        .query_map(
            &[(":id", &id as &dyn ToSql), (":as_of", &as_of as &dyn ToSql)],
            |row| {
                Ok((
                    row.get::<_, Option<i64>>(0)?,
                    row.get::<_, Option<i64>>(1)?,
                    money::read_amount(row, 2)?,
                ))
            },
        )?
        .collect::<Result<Vec<_>, _>>()?;

    let mut balance = Decimal::ZERO;

    for (source, target, amount) in rows {
        if target == Some(id) {
            balance += amount;
        }
        if source == Some(id) {
            balance -= amount;
        }
    }

    Ok(balance)
}

/// Apply one transfer to the balances of the users it involves.
fn apply_transfer(
    balances: &mut HashMap<UserId, Decimal>,
    source: Option<UserId>,
    target: Option<UserId>,
    amount: Decimal,
) {
    if let Some(balance) = target.and_then(|id| balances.get_mut(&id)) {
        *balance += amount;
    }

    if let Some(balance) = source.and_then(|id| balances.get_mut(&id)) {
        *balance -= amount;
    }
}

// ============================================================================
// TESTS
// ============================================================================
