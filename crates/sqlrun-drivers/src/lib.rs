//! sqlrun drivers
//!
//! This crate bundles the built-in database drivers and the registry used to
//! look them up by name.

#[cfg(feature = "postgres")]
pub use sqlrun_driver_postgres as postgres;
#[cfg(feature = "sqlite")]
pub use sqlrun_driver_sqlite as sqlite;

mod registry;

pub use registry::DriverRegistry;

/// Re-export commonly used types from sqlrun-core
pub use sqlrun_core::{Connection, ConnectionConfig, DatabaseDriver, Result, SqlrunError};
