//! # bookswap-store
//!
//! SQLite persistence for the BookSwap platform.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` and provides typed CRUD helpers for every domain
//! model: users, books, swap requests, and notifications.  Schema migrations
//! run automatically on open.
//!
//! The one multi-step invariant of the system, the atomic ownership exchange
//! of a completed swap, lives here as [`Database::complete_swap`] so that the
//! re-validate-then-commit sequence is a single SQLite transaction.

pub mod books;
pub mod database;
pub mod migrations;
pub mod models;
pub mod notifications;
pub mod swaps;
pub mod users;

mod error;
mod rows;

#[cfg(test)]
mod test_support;

pub use database::Database;
pub use error::StoreError;
pub use models::*;
