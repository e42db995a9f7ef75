//! # Closewise
//!
//! Exception-safe resource management: open a resource, run a block of work
//! against it, and release it exactly once however the block exits.
//!
//! How a resource is released is decided per type at compile time. A type
//! declares the shapes it supports and the most specific one wins:
//!
//! 1. an explicitly named strategy
//! 2. a native interface: [`Cursor`], [`Statement`], [`Connection`],
//!    [`PooledConnection`], then [`Closeable`]
//! 3. a `dispose` operation ([`Disposes`])
//! 4. a `close` operation ([`Closes`])
//!
//! A type with none of these is rejected by the compiler.
//!
//! ## Quick Example
//!
//! ```rust
//! use closewise::{managed, using, Closeable};
//! use std::convert::Infallible;
//!
//! struct Lease {
//!     id: u32,
//! }
//!
//! impl Closeable for Lease {
//!     type Error = Infallible;
//!
//!     fn close(self) -> Result<(), Infallible> {
//!         println!("released lease {}", self.id);
//!         Ok(())
//!     }
//! }
//!
//! managed!(Lease: Closeable);
//!
//! let id = using(Lease { id: 7 }, |lease| Ok::<_, String>(lease.id)).unwrap();
//! assert_eq!(id, 7);
//! ```
//!
//! ## Failures
//!
//! Every failure is classified into a [`Category`]. The [`Policy`] decides
//! which categories are fatal (propagated with no cleanup) and which are
//! rethrown (cleanup runs, no recovery). Everything else is ordinary. A
//! failure raised while cleaning up never hides the body's failure; it is
//! attached to it as a suppressed error. See [`ScopeError`].

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod failure;
pub mod native;
pub mod resolve;
pub mod resource;
pub mod scope;
pub mod structural;
pub mod testing;

// Re-exports
pub use failure::{Category, CategorySet, Classify, Policy};
pub use native::{
    Closeable, CloseableStrategy, Connection, ConnectionStrategy, Cursor, CursorStrategy,
    PooledConnection, PooledStrategy, Statement, StatementStrategy,
};
pub use resolve::{Shape, Shaped, Shapes};
pub use resource::{Cause, Managed, Resource, StrategyError};
pub use scope::{using, using_async, Class, Scope, ScopeError};
pub use structural::{
    closing, disposing, CloseStrategy, Closes, Closing, DisposeStrategy, Disposes, Disposing,
};

#[cfg(feature = "sqlite")]
pub use native::sqlite::TransactionStrategy;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::failure::{Category, Classify, Policy};
    pub use crate::managed;
    pub use crate::native::Closeable;
    pub use crate::resource::{Cause, Managed, Resource};
    pub use crate::scope::{using, using_async, Class, Scope, ScopeError};
    pub use crate::structural::{closing, disposing};
}
