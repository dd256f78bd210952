//! PostgreSQL driver implementation

mod connection;
mod driver;

pub use connection::{PostgresConnection, PostgresStatement, PostgresTransaction};
pub use driver::PostgresDriver;
