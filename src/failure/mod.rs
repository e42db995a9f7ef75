//! Failure classification.
//!
//! A failure raised while a resource is in use is one of three kinds:
//!
//! - **Fatal**: unrecoverable at the resource-handling layer (out of memory,
//!   stack exhaustion, broken internal invariants). It propagates immediately
//!   and no cleanup is attempted.
//! - **Rethrown-priority**: cancellation, interrupts and control-flow signals.
//!   Cleanup runs, then the failure propagates ahead of any ordinary cleanup
//!   failure and is never recovered.
//! - **Ordinary**: everything else. Cleanup runs and both the original and
//!   any cleanup failure are surfaced.
//!
//! Error types report their [`Category`] through [`Classify`]; a [`Policy`]
//! decides which categories are fatal and which are rethrown.
//!
//! ```rust
//! use closewise::{Category, Classify, Policy};
//! use std::collections::TryReserveError;
//!
//! let mut v: Vec<u8> = Vec::new();
//! let err: TryReserveError = v.try_reserve(usize::MAX).unwrap_err();
//!
//! assert_eq!(err.category(), Category::OutOfMemory);
//! assert!(Policy::default().is_fatal(err.category()));
//! ```

mod category;
mod policy;

pub use category::{Category, CategorySet, Classify};
pub use policy::Policy;
