//! PostgreSQL persistence module.
//!
//! Provides the connection pool used by the PostgreSQL repositories and
//! the embedded schema migrations.

pub mod pool;

pub use pool::{PostgresPool, PostgresPoolError, MIGRATOR};
