//! Built-in strategies for well-known resource interfaces (tier 2).
//!
//! [`Closeable`] is the generic closeable interface. The database-shaped
//! interfaces extend it, which is what makes them more specific:
//!
//! - [`Cursor`]: a result cursor; cancelled before closing after a failure.
//! - [`Statement`]: a prepared or callable statement; cleared before closing
//!   after a failure.
//! - [`Connection`]: rolled back before closing after a failure.
//! - [`PooledConnection`]: returned to its pool on success, invalidated after
//!   a failure so a broken connection is not reused.
//!
//! Implementations for `std` types live in this module too; the `sqlite`
//! feature adds `rusqlite` types.

use std::fmt;

use crate::failure::Classify;
use crate::resource::{Cause, Resource};

mod std_impls;

#[cfg(feature = "sqlite")]
pub mod sqlite;

/// The generic closeable interface.
pub trait Closeable: Sized {
    /// Failure raised while closing.
    type Error: Classify + fmt::Debug;

    /// Release the resource.
    fn close(self) -> Result<(), Self::Error>;

    /// Release the resource after the work using it failed.
    ///
    /// Defaults to [`close`](Closeable::close). Buffered writers override it
    /// to drop pending output instead of flushing it.
    fn abandon(self) -> Result<(), Self::Error> {
        self.close()
    }
}

/// A result cursor.
pub trait Cursor: Closeable {
    /// Abandon any rows not yet fetched.
    fn cancel(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// A prepared or callable statement.
pub trait Statement: Closeable {
    /// Drop bound parameters and pending results.
    fn clear(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// A database connection.
pub trait Connection: Closeable {
    /// Roll back any open transaction.
    fn rollback(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// A connection checked out of a pool. [`Closeable::close`] returns it.
pub trait PooledConnection: Closeable {
    /// Tell the pool to discard this connection instead of reusing it.
    fn invalidate(self) -> Result<(), Self::Error> {
        self.close()
    }
}

/// Run `prepare`, then close regardless, reporting the first failure.
///
/// When both steps fail the close failure is logged, since only one error
/// can be returned.
fn prepare_then_close<R, F>(
    mut resource: R,
    name: &'static str,
    prepare: F,
) -> Result<(), R::Error>
where
    R: Closeable,
    F: FnOnce(&mut R) -> Result<(), R::Error>,
{
    let prepared = prepare(&mut resource);
    let closed = resource.close();
    match (prepared, closed) {
        (Err(first), Err(second)) => {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                strategy = name,
                category = %second.category(),
                "close failed after an earlier cleanup step failed: {:?}",
                second
            );
            #[cfg(not(feature = "tracing"))]
            eprintln!(
                "resource {} close failed after an earlier cleanup step failed: {:?}",
                name, second
            );
            Err(first)
        }
        (Err(first), Ok(())) => Err(first),
        (Ok(()), closed) => closed,
    }
}

/// Strategy for [`Cursor`] types.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CursorStrategy;

impl<R: Cursor> Resource<R> for CursorStrategy {
    type Error = R::Error;
    const NAME: &'static str = "cursor";

    fn close(&self, resource: R) -> Result<(), R::Error> {
        Closeable::close(resource)
    }

    fn close_after_failure(&self, resource: R, _cause: &Cause<'_>) -> Result<(), R::Error> {
        prepare_then_close(resource, <Self as Resource<R>>::NAME, Cursor::cancel)
    }
}

/// Strategy for [`Statement`] types.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatementStrategy;

impl<R: Statement> Resource<R> for StatementStrategy {
    type Error = R::Error;
    const NAME: &'static str = "statement";

    fn close(&self, resource: R) -> Result<(), R::Error> {
        Closeable::close(resource)
    }

    fn close_after_failure(&self, resource: R, _cause: &Cause<'_>) -> Result<(), R::Error> {
        prepare_then_close(resource, <Self as Resource<R>>::NAME, Statement::clear)
    }
}

/// Strategy for [`Connection`] types.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionStrategy;

impl<R: Connection> Resource<R> for ConnectionStrategy {
    type Error = R::Error;
    const NAME: &'static str = "connection";

    fn close(&self, resource: R) -> Result<(), R::Error> {
        Closeable::close(resource)
    }

    fn close_after_failure(&self, resource: R, _cause: &Cause<'_>) -> Result<(), R::Error> {
        prepare_then_close(resource, <Self as Resource<R>>::NAME, Connection::rollback)
    }
}

/// Strategy for [`PooledConnection`] types.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PooledStrategy;

impl<R: PooledConnection> Resource<R> for PooledStrategy {
    type Error = R::Error;
    const NAME: &'static str = "pooled-connection";

    fn close(&self, resource: R) -> Result<(), R::Error> {
        Closeable::close(resource)
    }

    fn close_after_failure(&self, resource: R, _cause: &Cause<'_>) -> Result<(), R::Error> {
        resource.invalidate()
    }
}

/// Strategy for plain [`Closeable`] types.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CloseableStrategy;

impl<R: Closeable> Resource<R> for CloseableStrategy {
    type Error = R::Error;
    const NAME: &'static str = "closeable";

    fn close(&self, resource: R) -> Result<(), R::Error> {
        resource.close()
    }

    fn close_after_failure(&self, resource: R, _cause: &Cause<'_>) -> Result<(), R::Error> {
        resource.abandon()
    }
}
