//! Cross-layer transaction listing.
//!
//! The three layers live in different places (two tables and a
//! projection), so the merged listing is built in application code: fetch
//! each layer, tag every record with its layer and sort by order moment.

use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Error,
    actor::Actor,
    dining::{PendingDiningTransaction, pending_dining_transactions},
};

use super::core::{
    FixedTransaction, PendingTransaction, get_fixed_transactions, get_pending_transactions,
};

/// The layer a transaction record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionLayer {
    /// A settled, immutable transaction.
    Fixed,
    /// A stored pending transaction.
    Pending,
    /// A virtual pending transaction derived from an open dining list.
    PendingDining,
}

/// One row of the merged transaction listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// The layer the record was taken from.
    pub layer: TransactionLayer,
    /// The actor giving the money, if any.
    pub source: Option<Actor>,
    /// The actor receiving the money, if any.
    pub target: Option<Actor>,
    /// The amount of money transferred.
    pub amount: Decimal,
    /// When the transfer was initiated.
    pub order_moment: OffsetDateTime,
    /// A text description of what the transfer was for.
    pub description: String,
}

/// Defines which transactions [get_transactions] should fetch.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TransactionQuery {
    /// Include only transactions involving this actor as source or target.
    pub actor: Option<Actor>,
    /// Include only transactions ordered on or after this moment.
    pub since: Option<OffsetDateTime>,
}

/// Retrieve transactions across all three layers, ordered by order moment
/// descending.
///
/// # Errors
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn get_transactions(
    query: &TransactionQuery,
    connection: &Connection,
) -> Result<Vec<TransactionRecord>, Error> {
    let fixed = get_fixed_transactions(query.actor, connection)?;
    let pending = get_pending_transactions(query.actor, connection)?;

    // Associations are never part of dining transactions.
    let dining = match query.actor {
        Some(Actor::Association(_)) => Vec::new(),
        Some(Actor::User(id)) => pending_dining_transactions(Some(id), connection)?,
        None => pending_dining_transactions(None, connection)?,
    };

    let mut records: Vec<TransactionRecord> = fixed
        .into_iter()
        .map(fixed_record)
        .chain(pending.into_iter().map(pending_record))
        .chain(dining.into_iter().map(dining_record))
        .filter(|record| match query.since {
            Some(since) => record.order_moment >= since,
            None => true,
        })
        .collect();

    records.sort_by(|a, b| b.order_moment.cmp(&a.order_moment));

    Ok(records)
}

fn fixed_record(transaction: FixedTransaction) -> TransactionRecord {
    TransactionRecord {
        layer: TransactionLayer::Fixed,
        source: transaction.source,
        target: transaction.target,
        amount: transaction.amount,
        order_moment: transaction.order_moment,
        description: transaction.description,
    }
}

fn pending_record(transaction: PendingTransaction) -> TransactionRecord {
    TransactionRecord {
        layer: TransactionLayer::Pending,
        source: transaction.source,
        target: transaction.target,
        amount: transaction.amount,
        order_moment: transaction.order_moment,
        description: transaction.description,
    }
}

fn dining_record(transaction: PendingDiningTransaction) -> TransactionRecord {
    TransactionRecord {
        layer: TransactionLayer::PendingDining,
        source: Some(Actor::User(transaction.source)),
        target: Some(Actor::User(transaction.target)),
        amount: transaction.amount,
        order_moment: transaction.order_moment,
        description: transaction.description,
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod query_tests {
    use rusqlite::Connection;
    use rust_decimal_macros::dec;
    use time::{Duration, OffsetDateTime};

    use crate::{
        actor::{Actor, create_association, create_user},
        config::LedgerConfig,
        db::initialize,
        dining::{add_dining_entry, create_dining_list, track_dining_list},
        transaction::{PendingTransaction, create_pending_transaction, finalise_transaction},
    };

    use super::{TransactionLayer, TransactionQuery, get_transactions};

    fn get_test_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn
    }

    #[test]
    fn merges_all_layers_ordered_by_moment_descending() {
        let conn = get_test_connection();
        let config = LedgerConfig::default();
        let association = create_association("Quadrivium", &conn).unwrap();
        let cook = create_user("Piet", &conn).unwrap();
        let user = create_user("Jan", &conn).unwrap();
        let now = OffsetDateTime::now_utc();

        let oldest = create_pending_transaction(
            PendingTransaction::build(dec!(10.00), "Old top up")
                .source(Actor::Association(association.id))
                .target(Actor::User(user.id))
                .order_moment(now - Duration::days(30)),
            &config,
            &conn,
        )
        .unwrap();
        finalise_transaction(oldest.id, &conn).unwrap();

        // Yesterday's list sits between the fixed top up and the recent
        // pending transaction.
        let list_date = (now - Duration::days(1)).date();
        let list = create_dining_list(list_date, association.id, cook.id, &conn).unwrap();
        add_dining_entry(list.id, user.id, dec!(3.00), &conn).unwrap();
        track_dining_list(list.id, &conn).unwrap();

        create_pending_transaction(
            PendingTransaction::build(dec!(1.00), "Recent")
                .source(Actor::Association(association.id))
                .target(Actor::User(user.id))
                .order_moment(now),
            &config,
            &conn,
        )
        .unwrap();

        let records = get_transactions(
            &TransactionQuery {
                actor: Some(Actor::User(user.id)),
                since: None,
            },
            &conn,
        )
        .expect("Could not get transactions");

        let layers: Vec<TransactionLayer> =
            records.iter().map(|record| record.layer).collect();
        assert_eq!(
            layers,
            vec![
                TransactionLayer::Pending,
                TransactionLayer::PendingDining,
                TransactionLayer::Fixed,
            ]
        );

        let moments: Vec<_> = records.iter().map(|record| record.order_moment).collect();
        let mut sorted = moments.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(moments, sorted);
    }

    #[test]
    fn since_filters_out_older_transactions() {
        let conn = get_test_connection();
        let config = LedgerConfig::default();
        let association = create_association("Quadrivium", &conn).unwrap();
        let user = create_user("Jan", &conn).unwrap();
        let now = OffsetDateTime::now_utc();

        create_pending_transaction(
            PendingTransaction::build(dec!(10.00), "Old")
                .source(Actor::Association(association.id))
                .target(Actor::User(user.id))
                .order_moment(now - Duration::days(30)),
            &config,
            &conn,
        )
        .unwrap();
        create_pending_transaction(
            PendingTransaction::build(dec!(1.00), "Recent")
                .source(Actor::Association(association.id))
                .target(Actor::User(user.id))
                .order_moment(now),
            &config,
            &conn,
        )
        .unwrap();

        let records = get_transactions(
            &TransactionQuery {
                actor: None,
                since: Some(now - Duration::days(7)),
            },
            &conn,
        )
        .expect("Could not get transactions");

        assert_eq!(records.len(), 1, "want 1 record, got {records:?}");
        assert_eq!(records[0].description, "Recent");
    }

    #[test]
    fn actor_filter_excludes_unrelated_transactions() {
        let conn = get_test_connection();
        let config = LedgerConfig::default();
        let association = create_association("Quadrivium", &conn).unwrap();
        let jan = create_user("Jan", &conn).unwrap();
        let piet = create_user("Piet", &conn).unwrap();

        create_pending_transaction(
            PendingTransaction::build(dec!(10.00), "For Jan")
                .source(Actor::Association(association.id))
                .target(Actor::User(jan.id)),
            &config,
            &conn,
        )
        .unwrap();

        let for_piet = get_transactions(
            &TransactionQuery {
                actor: Some(Actor::User(piet.id)),
                since: None,
            },
            &conn,
        )
        .unwrap();
        let for_association = get_transactions(
            &TransactionQuery {
                actor: Some(Actor::Association(association.id)),
                since: None,
            },
            &conn,
        )
        .unwrap();

        assert!(for_piet.is_empty(), "want no records, got {for_piet:?}");
        assert_eq!(for_association.len(), 1);
    }
}
