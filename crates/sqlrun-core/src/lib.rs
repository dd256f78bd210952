//! sqlrun core - abstractions shared by the runner and the drivers
//!
//! This crate defines the seams between the execution loop and the database
//! back ends:
//!
//! - `DatabaseDriver` - creates connections from a `ConnectionConfig`
//! - `Connection` - owns statement handles and transaction boundaries
//! - `Statement` - executes text and exposes its results one at a time
//! - `Transaction` - an open unit of work, rolled back unless committed
//! - Result types: `Value`, `Row`, `ColumnMeta`, `StatementOutcome`

mod connection;
mod driver;
mod error;
mod types;

pub use connection::*;
pub use driver::*;
pub use error::*;
pub use types::*;
