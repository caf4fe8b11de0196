//! Database ID type definitions.

/// Alias for the integer type used for mapping to database IDs.
pub type DatabaseId = i64;

/// ID of a row in the user table.
pub type UserId = DatabaseId;

/// ID of a row in the association table.
pub type AssociationId = DatabaseId;

/// ID of a row in the user membership table.
pub type MembershipId = DatabaseId;

/// ID of a row in the dining list table.
pub type DiningListId = DatabaseId;

/// ID of a row in the dining entry table.
pub type DiningEntryId = DatabaseId;

/// ID of a row in either transaction table.
pub type TransactionId = DatabaseId;

/// ID of a row in the pending dining list tracker table.
pub type TrackerId = DatabaseId;
