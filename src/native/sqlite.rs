//! `rusqlite` bindings.
//!
//! - [`rusqlite::Connection`] is a [`Connection`](super::Connection): an open
//!   transaction is rolled back before the connection closes after a failure.
//! - [`rusqlite::Statement`] is a [`Statement`](super::Statement), closed by
//!   finalizing it; its bindings are cleared first after a failure.
//! - [`rusqlite::Transaction`] names [`TransactionStrategy`] explicitly: it
//!   commits on success and rolls back after a failure.
//!
//! ```rust
//! use closewise::using;
//! use rusqlite::Connection;
//!
//! let mut conn = Connection::open_in_memory().unwrap();
//! conn.execute_batch("CREATE TABLE t (x INTEGER)").unwrap();
//!
//! let tx = conn.transaction().unwrap();
//! let result = using(tx, |tx| {
//!     tx.execute("INSERT INTO t VALUES (1)", [])?;
//!     Err::<(), _>(rusqlite::Error::InvalidQuery)
//! });
//! assert!(result.is_err());
//!
//! let rows: i64 = conn.query_row("SELECT COUNT(*) FROM t", [], |r| r.get(0)).unwrap();
//! assert_eq!(rows, 0);
//! ```

use crate::failure::{Category, Classify};
use crate::resolve::{Explicit, Shape, Shaped, Shapes};
use crate::resource::{Cause, Managed, Resource};

use super::{Closeable, StatementStrategy};

impl Classify for rusqlite::Error {
    fn category(&self) -> Category {
        match self {
            rusqlite::Error::SqliteFailure(err, _) => match err.code {
                rusqlite::ErrorCode::OperationInterrupted => Category::Interrupted,
                rusqlite::ErrorCode::OutOfMemory => Category::OutOfMemory,
                rusqlite::ErrorCode::InternalMalfunction => Category::Internal,
                _ => Category::Ordinary,
            },
            _ => Category::Ordinary,
        }
    }
}

impl Closeable for rusqlite::Connection {
    type Error = rusqlite::Error;

    fn close(self) -> Result<(), rusqlite::Error> {
        rusqlite::Connection::close(self).map_err(|(_conn, err)| err)
    }
}

impl super::Connection for rusqlite::Connection {
    fn rollback(&mut self) -> Result<(), rusqlite::Error> {
        if self.is_autocommit() {
            return Ok(());
        }
        self.execute_batch("ROLLBACK")
    }
}

crate::managed!(rusqlite::Connection: Connection, Closeable);

impl Closeable for rusqlite::Statement<'_> {
    type Error = rusqlite::Error;

    fn close(self) -> Result<(), rusqlite::Error> {
        self.finalize()
    }
}

impl super::Statement for rusqlite::Statement<'_> {
    fn clear(&mut self) -> Result<(), rusqlite::Error> {
        self.clear_bindings();
        Ok(())
    }
}

impl Shaped for rusqlite::Statement<'_> {
    const SHAPES: Shapes = Shapes::EMPTY.with(Shape::Statement).with(Shape::Closeable);
}

impl Managed for rusqlite::Statement<'_> {
    type Strategy = StatementStrategy;
    const SHAPE: Shape = Shape::Statement;
}

/// Commits a transaction on success and rolls it back after a failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionStrategy;

impl<'conn> Resource<rusqlite::Transaction<'conn>> for TransactionStrategy {
    type Error = rusqlite::Error;
    const NAME: &'static str = "sqlite-transaction";

    fn close(&self, tx: rusqlite::Transaction<'conn>) -> Result<(), rusqlite::Error> {
        tx.commit()
    }

    fn close_after_failure(
        &self,
        tx: rusqlite::Transaction<'conn>,
        _cause: &Cause<'_>,
    ) -> Result<(), rusqlite::Error> {
        tx.rollback()
    }
}

impl<'conn> Explicit for rusqlite::Transaction<'conn> {
    type Strategy = TransactionStrategy;
}

impl Shaped for rusqlite::Transaction<'_> {
    const SHAPES: Shapes = Shapes::EMPTY.with(Shape::Explicit);
}

impl<'conn> Managed for rusqlite::Transaction<'conn> {
    type Strategy = TransactionStrategy;
    const SHAPE: Shape = Shape::Explicit;
}
