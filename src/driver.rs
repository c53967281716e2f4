//! The database driver contract.
//!
//! The library consumes these traits and never implements them: a driver
//! crate (or a test double) supplies the connection. Statements bind
//! positionally with the type codes the query IR carries; cursors hand
//! values back under the same codes. Errors cross the boundary as
//! [anyhow::Error] and are wrapped with the failed SQL and parameter count
//! by the execution layer.

use crate::error::Result;
use crate::types::{SqlValue, TypeCode};

pub trait Driver {
    fn prepare(&mut self, sql: &str) -> Result<Box<dyn Statement + '_>>;

    fn set_auto_commit(&mut self, enabled: bool) -> Result<()>;

    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;

    fn set_savepoint(&mut self, name: &str) -> Result<()>;

    fn rollback_to_savepoint(&mut self, name: &str) -> Result<()>;

    fn release_savepoint(&mut self, name: &str) -> Result<()>;
}

pub trait Statement {
    /// Binds the parameter at 0-based `index`.
    fn bind(&mut self, index: usize, code: TypeCode, value: &SqlValue) -> Result<()>;

    fn execute_query(&mut self) -> Result<Box<dyn Cursor + '_>>;

    /// Returns the number of affected rows.
    fn execute_update(&mut self) -> Result<u64>;
}

pub trait Cursor {
    /// Moves to the next row; false once exhausted.
    fn advance(&mut self) -> Result<bool>;

    /// Reads the 0-based column of the current row.
    fn get(&mut self, index: usize, code: TypeCode) -> Result<SqlValue>;
}
