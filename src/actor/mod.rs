//! The actor directory: users, associations and association memberships.
//!
//! Every transaction moves money between actors. An actor is exactly one
//! of a user or an association, never both.

mod core;

pub use core::{
    Actor, Association, User, UserMembership, add_membership, create_association, create_user,
    create_user_with_floor, get_association, get_members, get_user, minimum_balance_for,
};

pub(crate) use core::{
    create_association_table, create_user_membership_table, create_user_table,
};
