//! Database-style backend implementations
//!
//! `InMemory` stores collections as plain vectors of records and relies on the
//! emulated role join. `SqlxBackend` maps collections to SQL tables and runs the
//! role join as a single statement.

mod in_memory;
#[cfg(any(feature = "sqlite", feature = "postgres"))]
pub mod sql;

pub use in_memory::InMemory;
#[cfg(any(feature = "sqlite", feature = "postgres"))]
pub use sql::{DbKind, SqlxBackend};
