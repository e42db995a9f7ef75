//! Structural fallbacks (tiers 3 and 4).
//!
//! Any value with a zero-argument `dispose` or `close` operation can be
//! managed, either by implementing [`Disposes`] / [`Closes`] directly or by
//! wrapping it in a [`Disposing`] / [`Closing`] adapter that forwards to its
//! own method. Both are opt-in: a type is never matched just because it
//! happens to have a method with the right name, and a declared native
//! interface always outranks them.
//!
//! ```rust
//! use closewise::{closing, using};
//! use std::sync::atomic::{AtomicBool, Ordering};
//!
//! struct Socket {
//!     open: AtomicBool,
//! }
//!
//! impl Socket {
//!     fn hang_up(self) -> Result<(), String> {
//!         self.open.store(false, Ordering::SeqCst);
//!         Ok(())
//!     }
//! }
//!
//! let socket = closing(Socket { open: AtomicBool::new(true) }, Socket::hang_up);
//! let was_open = using(socket, |s| Ok::<_, String>(s.open.load(Ordering::SeqCst))).unwrap();
//! assert!(was_open);
//! ```

use std::fmt;
use std::ops::{Deref, DerefMut};

use crate::failure::Classify;
use crate::resolve::{Shape, Shaped, Shapes};
use crate::resource::{Managed, Resource};

/// A value with a zero-argument `dispose` operation.
pub trait Disposes: Sized {
    /// Failure raised while disposing.
    type Error: Classify;

    /// Release the value.
    fn dispose(self) -> Result<(), Self::Error>;
}

/// A value with a zero-argument `close` operation.
pub trait Closes: Sized {
    /// Failure raised while closing.
    type Error: Classify;

    /// Release the value.
    fn close(self) -> Result<(), Self::Error>;
}

/// Fallback strategy calling [`Disposes::dispose`] exactly once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisposeStrategy;

impl<R: Disposes> Resource<R> for DisposeStrategy {
    type Error = R::Error;
    const NAME: &'static str = "dispose";

    fn close(&self, resource: R) -> Result<(), R::Error> {
        resource.dispose()
    }
}

/// Fallback strategy calling [`Closes::close`] exactly once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CloseStrategy;

impl<R: Closes> Resource<R> for CloseStrategy {
    type Error = R::Error;
    const NAME: &'static str = "close";

    fn close(&self, resource: R) -> Result<(), R::Error> {
        Closes::close(resource)
    }
}

/// Adapter giving any value a `dispose` operation.
pub struct Disposing<T, F> {
    value: T,
    dispose: F,
}

impl<T, F> Disposing<T, F> {
    /// Wrap `value`; `dispose` releases it.
    pub fn new(value: T, dispose: F) -> Self {
        Disposing { value, dispose }
    }

    /// Unwrap without disposing.
    pub fn into_inner(self) -> T {
        self.value
    }
}

/// Wrap `value` so it is released by `dispose`.
pub fn disposing<T, F, E>(value: T, dispose: F) -> Disposing<T, F>
where
    F: FnOnce(T) -> Result<(), E>,
    E: Classify,
{
    Disposing::new(value, dispose)
}

impl<T, F, E> Disposes for Disposing<T, F>
where
    F: FnOnce(T) -> Result<(), E>,
    E: Classify,
{
    type Error = E;

    fn dispose(self) -> Result<(), E> {
        (self.dispose)(self.value)
    }
}

impl<T, F, E> Shaped for Disposing<T, F>
where
    F: FnOnce(T) -> Result<(), E>,
    E: Classify,
{
    const SHAPES: Shapes = Shapes::EMPTY.with(Shape::Disposes);
}

impl<T, F, E> Managed for Disposing<T, F>
where
    F: FnOnce(T) -> Result<(), E>,
    E: Classify,
{
    type Strategy = DisposeStrategy;
    const SHAPE: Shape = Shape::Disposes;
}

/// Adapter giving any value a `close` operation.
pub struct Closing<T, F> {
    value: T,
    close: F,
}

impl<T, F> Closing<T, F> {
    /// Wrap `value`; `close` releases it.
    pub fn new(value: T, close: F) -> Self {
        Closing { value, close }
    }

    /// Unwrap without closing.
    pub fn into_inner(self) -> T {
        self.value
    }
}

/// Wrap `value` so it is released by `close`.
pub fn closing<T, F, E>(value: T, close: F) -> Closing<T, F>
where
    F: FnOnce(T) -> Result<(), E>,
    E: Classify,
{
    Closing::new(value, close)
}

impl<T, F, E> Closes for Closing<T, F>
where
    F: FnOnce(T) -> Result<(), E>,
    E: Classify,
{
    type Error = E;

    fn close(self) -> Result<(), E> {
        (self.close)(self.value)
    }
}

impl<T, F, E> Shaped for Closing<T, F>
where
    F: FnOnce(T) -> Result<(), E>,
    E: Classify,
{
    const SHAPES: Shapes = Shapes::EMPTY.with(Shape::Closes);
}

impl<T, F, E> Managed for Closing<T, F>
where
    F: FnOnce(T) -> Result<(), E>,
    E: Classify,
{
    type Strategy = CloseStrategy;
    const SHAPE: Shape = Shape::Closes;
}

macro_rules! adapter_access {
    ($adapter:ident) => {
        impl<T, F> Deref for $adapter<T, F> {
            type Target = T;

            fn deref(&self) -> &T {
                &self.value
            }
        }

        impl<T, F> DerefMut for $adapter<T, F> {
            fn deref_mut(&mut self) -> &mut T {
                &mut self.value
            }
        }

        impl<T: fmt::Debug, F> fmt::Debug for $adapter<T, F> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($adapter))
                    .field("value", &self.value)
                    .field("release", &"<function>")
                    .finish()
            }
        }
    };
}

adapter_access!(Disposing);
adapter_access!(Closing);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::resolve;
    use std::cell::Cell;

    #[test]
    fn adapters_bind_to_their_fallback() {
        type D = Disposing<u8, fn(u8) -> Result<(), String>>;
        type C = Closing<u8, fn(u8) -> Result<(), String>>;
        assert_eq!(resolve(<D as Shaped>::SHAPES), Some(<D as Managed>::SHAPE));
        assert_eq!(resolve(<C as Shaped>::SHAPES), Some(<C as Managed>::SHAPE));
        assert_eq!(<D as Managed>::SHAPE.tier(), 3);
        assert_eq!(<C as Managed>::SHAPE.tier(), 4);
    }

    #[test]
    fn dispose_runs_once() {
        let calls = Cell::new(0);
        let handle = disposing(7u8, |_| {
            calls.set(calls.get() + 1);
            Ok::<_, String>(())
        });
        DisposeStrategy.close(handle).unwrap();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn close_failure_is_returned() {
        let handle = closing("conn", |_| Err::<(), _>("refused"));
        assert_eq!(CloseStrategy.close(handle), Err("refused"));
    }

    #[test]
    fn adapters_deref_to_value() {
        let mut handle = closing(vec![1, 2], |_| Ok::<_, String>(()));
        handle.push(3);
        assert_eq!(handle.len(), 3);
        assert_eq!(handle.into_inner(), vec![1, 2, 3]);
    }

    #[test]
    fn debug_hides_release_function() {
        let handle = disposing(1, |_| Ok::<_, String>(()));
        assert_eq!(
            format!("{:?}", handle),
            "Disposing { value: 1, release: \"<function>\" }"
        );
    }
}
