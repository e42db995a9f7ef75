//! The resource capability contract.
//!
//! A [`Resource<R>`] is a stateless strategy that knows how to open and close
//! values of type `R` and how to classify failures raised while they are in
//! use. A type is bound to exactly one strategy through [`Managed`]; the
//! binding is an associated type, so it is fixed at compile time and can
//! never change for the lifetime of a handle.
//!
//! # Example
//!
//! ```rust
//! use closewise::{managed, using, Cause, Resource};
//! use std::convert::Infallible;
//!
//! struct Ledger {
//!     entries: Vec<String>,
//! }
//!
//! #[derive(Default)]
//! struct LedgerStrategy;
//!
//! impl Resource<Ledger> for LedgerStrategy {
//!     type Error = Infallible;
//!     const NAME: &'static str = "ledger";
//!
//!     fn close(&self, ledger: Ledger) -> Result<(), Infallible> {
//!         println!("committing {} entries", ledger.entries.len());
//!         Ok(())
//!     }
//!
//!     fn close_after_failure(&self, _ledger: Ledger, _cause: &Cause<'_>) -> Result<(), Infallible> {
//!         // discard instead of committing
//!         Ok(())
//!     }
//! }
//!
//! managed!(Ledger => LedgerStrategy);
//!
//! let total = using(Ledger { entries: Vec::new() }, |ledger| {
//!     ledger.entries.push("deposit".to_string());
//!     Ok::<_, String>(ledger.entries.len())
//! })
//! .unwrap();
//! assert_eq!(total, 1);
//! ```

use std::fmt;

use crate::failure::{Category, Classify, Policy};
use crate::resolve::Shape;

/// Why [`Resource::close_after_failure`] is being called.
#[derive(Clone, Copy)]
pub enum Cause<'a> {
    /// The body returned an error.
    Error {
        /// Category of the error.
        category: Category,
        /// The error itself, for diagnostics.
        error: &'a dyn fmt::Debug,
    },
    /// The body panicked.
    Panic {
        /// The panic message, when the payload was a string.
        message: Option<&'a str>,
    },
}

impl Cause<'_> {
    /// Category of the causing failure; [`Category::Panic`] for panics.
    pub fn category(&self) -> Category {
        match self {
            Cause::Error { category, .. } => *category,
            Cause::Panic { .. } => Category::Panic,
        }
    }

    /// Returns true if the body panicked.
    pub fn is_panic(&self) -> bool {
        matches!(self, Cause::Panic { .. })
    }
}

impl fmt::Debug for Cause<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cause::Error { category, error } => f
                .debug_struct("Error")
                .field("category", category)
                .field("error", error)
                .finish(),
            Cause::Panic { message } => f.debug_struct("Panic").field("message", message).finish(),
        }
    }
}

/// Capability implementation: how to open, close and classify failures for `R`.
///
/// Only [`close`](Resource::close) is required. Strategies hold no state;
/// everything they need arrives as arguments.
///
/// # Failure semantics
///
/// A strategy never swallows a failure from `close` or `close_after_failure`:
/// it returns it and lets the runner combine it with the body's failure.
pub trait Resource<R> {
    /// Failure raised by `open`, `close` and `close_after_failure`.
    type Error: Classify;

    /// Name used in diagnostics.
    const NAME: &'static str;

    /// Called before the body runs. Most resources are open once constructed,
    /// so the default does nothing.
    fn open(&self, resource: &mut R) -> Result<(), Self::Error> {
        let _ = resource;
        Ok(())
    }

    /// Release the resource after the body completed normally.
    fn close(&self, resource: R) -> Result<(), Self::Error>;

    /// Release the resource after the body failed with `cause`.
    ///
    /// Defaults to [`close`](Resource::close). Override to tell a clean
    /// shutdown from a shutdown after error, e.g. roll back instead of commit.
    fn close_after_failure(&self, resource: R, cause: &Cause<'_>) -> Result<(), Self::Error> {
        let _ = cause;
        self.close(resource)
    }

    /// Fatal failures propagate immediately; no cleanup is attempted.
    fn is_fatal(&self, category: Category, policy: &Policy) -> bool {
        policy.is_fatal(category)
    }

    /// Rethrown failures survive cleanup and are never recovered.
    fn is_rethrown(&self, category: Category, policy: &Policy) -> bool {
        policy.is_rethrown(category)
    }
}

/// Binds a resource type to the strategy that manages it.
///
/// Implemented by the [`managed!`](crate::managed) macro, which resolves the
/// strategy from the shapes the type declares, or by hand for generic types.
///
/// A type with no binding is rejected at compile time with "no resource
/// capability found":
///
/// ```compile_fail
/// use closewise::using;
///
/// struct Socket;
///
/// let _ = using(Socket, |_| Ok::<_, String>(()));
/// ```
#[diagnostic::on_unimplemented(
    message = "no resource capability found for `{Self}`",
    label = "`{Self}` has no closing strategy",
    note = "declare its shapes with `closewise::managed!`, or pass a strategy to `Scope::with_strategy`"
)]
pub trait Managed: Sized {
    /// The strategy resolved for this type.
    type Strategy: Resource<Self> + Default;

    /// The shape the strategy was resolved from.
    const SHAPE: Shape = Shape::Explicit;
}

/// The failure type produced by the strategy bound to `R`.
pub type StrategyError<R> = <<R as Managed>::Strategy as Resource<R>>::Error;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fault;
    use std::cell::Cell;
    use std::rc::Rc;

    struct Valve {
        closes: Rc<Cell<u32>>,
    }

    #[derive(Default)]
    struct ValveStrategy;

    impl Resource<Valve> for ValveStrategy {
        type Error = Fault;
        const NAME: &'static str = "valve";

        fn close(&self, valve: Valve) -> Result<(), Fault> {
            valve.closes.set(valve.closes.get() + 1);
            Ok(())
        }
    }

    fn valve() -> (Valve, Rc<Cell<u32>>) {
        let closes = Rc::new(Cell::new(0));
        (
            Valve {
                closes: closes.clone(),
            },
            closes,
        )
    }

    #[test]
    fn open_defaults_to_noop() {
        let (mut valve, closes) = valve();
        assert!(ValveStrategy.open(&mut valve).is_ok());
        assert_eq!(closes.get(), 0);
    }

    #[test]
    fn close_after_failure_defaults_to_close_once() {
        let (valve, closes) = valve();
        let cause = Cause::Error {
            category: Category::Ordinary,
            error: &"boom",
        };
        ValveStrategy.close_after_failure(valve, &cause).unwrap();
        assert_eq!(closes.get(), 1);
    }

    #[test]
    fn default_predicates_follow_policy() {
        let policy = Policy::default().with_fatal(Category::Panic);
        assert!(ValveStrategy.is_fatal(Category::Panic, &policy));
        assert!(!ValveStrategy.is_fatal(Category::Ordinary, &policy));
        assert!(ValveStrategy.is_rethrown(Category::Cancelled, &Policy::lenient()));
        assert!(!ValveStrategy.is_rethrown(Category::Ordinary, &policy));
    }

    #[test]
    fn cause_reports_category() {
        let err = Cause::Error {
            category: Category::Cancelled,
            error: &1,
        };
        assert_eq!(err.category(), Category::Cancelled);
        assert!(!err.is_panic());

        let panic = Cause::Panic {
            message: Some("oops"),
        };
        assert_eq!(panic.category(), Category::Panic);
        assert!(panic.is_panic());
        assert!(format!("{:?}", panic).contains("oops"));
    }
}
