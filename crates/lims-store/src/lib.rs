//! LIMS Store
//!
//! Transactional in-memory storage for labware, samples, operations,
//! notes and work links.
//!
//! - [`Database`] holds committed state and hands out [`Transaction`]s
//! - [`Database::transact`] runs a closure as one unit of work
//! - Barcode uniqueness is enforced at commit, so the loser of a race
//!   gets [`StoreError::UniqueViolation`] and none of its writes
//! - [`Fixture`] seeds a database from JSON

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod db;
pub mod error;
pub mod fixture;
mod tables;
pub mod transaction;

// Re-exports
pub use db::{Database, StoreConfig};
pub use error::StoreError;
pub use fixture::Fixture;
pub use transaction::Transaction;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
