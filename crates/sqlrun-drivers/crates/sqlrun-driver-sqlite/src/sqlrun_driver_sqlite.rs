//! SQLite database driver implementation

mod connection;
mod driver;

pub use connection::{SqliteConnection, SqliteStatement, SqliteTransaction};
pub use driver::SqliteDriver;
