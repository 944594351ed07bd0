//! Database layer for w3bind.
//!
//! Provides SQLite connection pooling (via `r2d2`), WAL-mode initialization,
//! and embedded SQL migrations. The durable signing-session store is the
//! only consumer; the in-memory store needs none of this.
//!
//! Migrations are compiled in with `include_str!` and tracked in the
//! `_w3bind_migrations` table, so several server instances can share one
//! database file and agree on its schema.

mod migrations;
mod pool;

pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool, DbPool, DbRuntimeSettings, PoolError};
