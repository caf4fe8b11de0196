//! Defines the core data models and database queries for the actor directory.

use rusqlite::{Connection, Row};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    config::LedgerConfig,
    database_id::{AssociationId, MembershipId, UserId},
    money,
};

// ============================================================================
// MODELS
// ============================================================================

/// A party that can hold credit: exactly one of a user or an association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Actor {
    /// A member of one of the associations.
    User(UserId),
    /// A student association.
    Association(AssociationId),
}

/// A person that can join dining lists and hold a credit balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// The user's ID in the application database.
    pub id: UserId,
    /// The user's display name.
    pub name: String,
    /// Overrides the system-wide minimum balance floor when set.
    pub min_balance: Option<Decimal>,
}

/// A student association that organises dinners and manages member credit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Association {
    /// The association's ID in the application database.
    pub id: AssociationId,
    /// The association's name.
    pub name: String,
}

/// Records that a user is a member of an association.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserMembership {
    /// The membership's ID in the application database.
    pub id: MembershipId,
    /// The member.
    pub user_id: UserId,
    /// The association the user belongs to.
    pub association_id: AssociationId,
}

/// Resolve the minimum balance floor that applies to `user`.
pub fn minimum_balance_for(user: &User, config: &LedgerConfig) -> Decimal {
    user.min_balance.unwrap_or(config.minimum_balance)
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create the user table.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub(crate) fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                min_balance TEXT
                )",
        (),
    )?;

    Ok(())
}

/// Create the association table.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub(crate) fn create_association_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS association (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE
                )",
        (),
    )?;

    Ok(())
}

/// Create the user membership table.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub(crate) fn create_user_membership_table(
    connection: &Connection,
) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user_membership (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES user(id),
                association_id INTEGER NOT NULL REFERENCES association(id),
                UNIQUE(user_id, association_id)
                )",
        (),
    )?;

    Ok(())
}

/// Create and insert a new user into the database.
///
/// # Errors
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn create_user(name: &str, connection: &Connection) -> Result<User, Error> {
    create_user_with_floor(name, None, connection)
}

/// Create a new user with a personal minimum balance floor.
///
/// # Errors
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn create_user_with_floor(
    name: &str,
    min_balance: Option<Decimal>,
    connection: &Connection,
) -> Result<User, Error> {
    let user = connection
        .prepare("INSERT INTO user (name, min_balance) VALUES (?1, ?2) RETURNING id, name, min_balance")?
        .query_row(
            (name, min_balance.map(money::encode_amount)),
            map_user_row,
        )?;

    Ok(user)
}

/// Get the user from the database with an ID equal to `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not belong to a registered user,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_user(id: UserId, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare("SELECT id, name, min_balance FROM user WHERE id = :id")?
        .query_row(&[(":id", &id)], map_user_row)
        .map_err(|error| error.into())
}

/// Create and insert a new association into the database.
///
/// # Errors
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn create_association(name: &str, connection: &Connection) -> Result<Association, Error> {
    connection.execute("INSERT INTO association (name) VALUES (?1)", (name,))?;

    Ok(Association {
        id: connection.last_insert_rowid(),
        name: name.to_owned(),
    })
}

/// Get the association from the database with an ID equal to `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not belong to an association,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn get_association(
    id: AssociationId,
    connection: &Connection,
) -> Result<Association, Error> {
    connection
        .prepare("SELECT id, name FROM association WHERE id = :id")?
        .query_row(&[(":id", &id)], |row| {
            Ok(Association {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })
        .map_err(|error| error.into())
}

/// Register `user_id` as a member of `association_id`.
///
/// # Errors
/// Returns a [Error::SqlError] if the pair already exists or either ID is
/// invalid.
pub fn add_membership(
    user_id: UserId,
    association_id: AssociationId,
    connection: &Connection,
) -> Result<UserMembership, Error> {
    connection.execute(
        "INSERT INTO user_membership (user_id, association_id) VALUES (?1, ?2)",
        (user_id, association_id),
    )?;

    Ok(UserMembership {
        id: connection.last_insert_rowid(),
        user_id,
        association_id,
    })
}

/// Get the IDs of all members of `association_id`.
///
/// # Errors
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn get_members(
    association_id: AssociationId,
    connection: &Connection,
) -> Result<Vec<UserId>, Error> {
    connection
        .prepare("SELECT user_id FROM user_membership WHERE association_id = :id ORDER BY user_id")?
        .query_map(&[(":id", &association_id)], |row| row.get(0))?
        .map(|id_result| id_result.map_err(Error::SqlError))
        .collect()
}

/// Map a database row to a [User].
fn map_user_row(row: &Row) -> Result<User, rusqlite::Error> {
    let min_balance = match row.get::<_, Option<String>>(2)? {
        Some(_) => Some(money::read_amount(row, 2)?),
        None => None,
    };

    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        min_balance,
    })
}

// ============================================================================
// TESTS
// ============================================================================
