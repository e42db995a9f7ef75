//! Capability resolution: which strategy manages a resource type.
//!
//! A type declares the shapes it conforms to with [`managed!`](crate::managed).
//! [`resolve`] walks one ordered candidate list, [`PRIORITY`], and picks the
//! first declared shape. The pick happens in `const` context and is turned
//! into a strategy type through [`Pick`], so resolution is a compile-time
//! decision: nothing here inspects runtime types.
//!
//! # Tiers
//!
//! | Tier | Shapes (in order) | Strategies |
//! |------|-------------------|------------|
//! | 1 | `Explicit` | the type's own strategy |
//! | 2 | `Cursor`, `Statement`, `Connection`, `PooledConnection`, `Closeable` | [`native`](crate::native) |
//! | 3 | `Disposes` | [`DisposeStrategy`](crate::DisposeStrategy) |
//! | 4 | `Closes` | [`CloseStrategy`](crate::CloseStrategy) |
//!
//! The four specific native interfaces are subtraits of `Closeable`, so a
//! subtype always outranks its supertype, and every native interface outranks
//! both structural fallbacks.
//!
//! # Example
//!
//! ```rust
//! use closewise::{managed, Closeable, Closes, Connection, Managed, Resource, Shape};
//! use std::io;
//!
//! struct Session;
//!
//! impl Closeable for Session {
//!     type Error = io::Error;
//!     fn close(self) -> io::Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! impl Connection for Session {}
//!
//! impl Closes for Session {
//!     type Error = io::Error;
//!     fn close(self) -> io::Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! managed!(Session: Closes, Closeable, Connection);
//!
//! assert_eq!(<Session as Managed>::SHAPE, Shape::Connection);
//! assert_eq!(<<Session as Managed>::Strategy as Resource<Session>>::NAME, "connection");
//! ```

use std::fmt;

use crate::native::{
    CloseableStrategy, ConnectionStrategy, CursorStrategy, PooledStrategy, StatementStrategy,
};
use crate::resource::Resource;
use crate::structural::{CloseStrategy, DisposeStrategy};

/// A capability a type can declare to the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
#[repr(u8)]
pub enum Shape {
    /// The type names its own strategy.
    Explicit = 1,
    /// A result cursor ([`Cursor`](crate::Cursor)).
    Cursor = 2,
    /// A prepared or callable statement ([`Statement`](crate::Statement)).
    Statement = 3,
    /// A database connection ([`Connection`](crate::Connection)).
    Connection = 4,
    /// A connection borrowed from a pool ([`PooledConnection`](crate::PooledConnection)).
    PooledConnection = 5,
    /// The generic closeable interface ([`Closeable`](crate::Closeable)).
    Closeable = 6,
    /// Anything with a `dispose` operation ([`Disposes`](crate::Disposes)).
    Disposes = 7,
    /// Anything with a `close` operation ([`Closes`](crate::Closes)).
    Closes = 8,
}

/// Candidate shapes, highest priority first.
pub const PRIORITY: [Shape; 8] = [
    Shape::Explicit,
    Shape::Cursor,
    Shape::Statement,
    Shape::Connection,
    Shape::PooledConnection,
    Shape::Closeable,
    Shape::Disposes,
    Shape::Closes,
];

impl Shape {
    /// Resolution tier, 1 (highest priority) to 4.
    pub const fn tier(self) -> u8 {
        match self {
            Shape::Explicit => 1,
            Shape::Cursor
            | Shape::Statement
            | Shape::Connection
            | Shape::PooledConnection
            | Shape::Closeable => 2,
            Shape::Disposes => 3,
            Shape::Closes => 4,
        }
    }

    /// The shape [`resolve`] picks for `shapes`.
    ///
    /// Fails const evaluation when nothing matches; only called from the
    /// `managed!` expansion, which always declares at least one shape.
    pub const fn resolved(shapes: Shapes) -> Shape {
        match resolve(shapes) {
            Some(shape) => shape,
            None => panic!("no resource capability found"),
        }
    }

    const fn bit(self) -> u16 {
        1 << (self as u8)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Shape::Explicit => "explicit",
            Shape::Cursor => "cursor",
            Shape::Statement => "statement",
            Shape::Connection => "connection",
            Shape::PooledConnection => "pooled-connection",
            Shape::Closeable => "closeable",
            Shape::Disposes => "dispose",
            Shape::Closes => "close",
        };
        f.write_str(name)
    }
}

/// The set of shapes a type declares.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Shapes(u16);

impl Shapes {
    /// No shapes.
    pub const EMPTY: Shapes = Shapes(0);

    /// Returns a copy with `shape` added.
    pub const fn with(self, shape: Shape) -> Self {
        Shapes(self.0 | shape.bit())
    }

    /// Returns true if `shape` was declared.
    pub const fn contains(self, shape: Shape) -> bool {
        self.0 & shape.bit() != 0
    }

    /// Iterates declared shapes in priority order.
    pub fn iter(self) -> impl Iterator<Item = Shape> {
        PRIORITY.into_iter().filter(move |s| self.contains(*s))
    }
}

impl fmt::Debug for Shapes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl FromIterator<Shape> for Shapes {
    fn from_iter<I: IntoIterator<Item = Shape>>(iter: I) -> Self {
        iter.into_iter().fold(Shapes::EMPTY, Shapes::with)
    }
}

/// Picks the highest-priority declared shape, or `None` when nothing matches.
///
/// ```rust
/// use closewise::resolve::{resolve, Shapes};
/// use closewise::Shape;
///
/// let shapes = Shapes::EMPTY.with(Shape::Closes).with(Shape::Closeable);
/// assert_eq!(resolve(shapes), Some(Shape::Closeable));
/// assert_eq!(resolve(Shapes::EMPTY), None);
/// ```
pub const fn resolve(shapes: Shapes) -> Option<Shape> {
    let mut i = 0;
    while i < PRIORITY.len() {
        if shapes.contains(PRIORITY[i]) {
            return Some(PRIORITY[i]);
        }
        i += 1;
    }
    None
}

/// Numeric form of [`resolve`] used as the [`Candidate`] parameter; 0 means
/// unresolved.
pub const fn selection(shapes: Shapes) -> u8 {
    match resolve(shapes) {
        Some(shape) => shape as u8,
        None => 0,
    }
}

/// The shapes a type declares. Implemented by `managed!`.
pub trait Shaped {
    /// Declared shapes.
    const SHAPES: Shapes;
}

/// A type that names its own strategy (tier 1).
pub trait Explicit: Sized {
    /// The strategy to use.
    type Strategy: Resource<Self> + Default;
}

/// A resolution outcome, indexed by [`selection`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Candidate<const ID: u8>;

/// Maps a resolved candidate to its strategy for `R`.
///
/// Each impl carries the trait bound of its shape, so declaring a shape the
/// type does not implement is a compile error, and so is a type that matches
/// nothing.
#[diagnostic::on_unimplemented(
    message = "no resource capability found for `{R}`",
    label = "no strategy matches the shapes declared for `{R}`",
    note = "implement one of `Cursor`, `Statement`, `Connection`, `PooledConnection`, `Closeable`, `Disposes`, `Closes`, or name an explicit strategy"
)]
pub trait Pick<R> {
    /// The selected strategy.
    type Strategy: Resource<R> + Default;
}

impl<R: Explicit> Pick<R> for Candidate<{ Shape::Explicit as u8 }> {
    type Strategy = R::Strategy;
}

impl<R: crate::native::Cursor> Pick<R> for Candidate<{ Shape::Cursor as u8 }> {
    type Strategy = CursorStrategy;
}

impl<R: crate::native::Statement> Pick<R> for Candidate<{ Shape::Statement as u8 }> {
    type Strategy = StatementStrategy;
}

impl<R: crate::native::Connection> Pick<R> for Candidate<{ Shape::Connection as u8 }> {
    type Strategy = ConnectionStrategy;
}

impl<R: crate::native::PooledConnection> Pick<R> for Candidate<{ Shape::PooledConnection as u8 }> {
    type Strategy = PooledStrategy;
}

impl<R: crate::native::Closeable> Pick<R> for Candidate<{ Shape::Closeable as u8 }> {
    type Strategy = CloseableStrategy;
}

impl<R: crate::structural::Disposes> Pick<R> for Candidate<{ Shape::Disposes as u8 }> {
    type Strategy = DisposeStrategy;
}

impl<R: crate::structural::Closes> Pick<R> for Candidate<{ Shape::Closes as u8 }> {
    type Strategy = CloseStrategy;
}

/// Shape traits by shape name, for the conformance checks `managed!` emits.
#[doc(hidden)]
pub mod conforms {
    pub use crate::native::{Closeable, Connection, Cursor, PooledConnection, Statement};
    pub use crate::resolve::Explicit;
    pub use crate::structural::{Closes, Disposes};
}

/// Binds a concrete type to a strategy.
///
/// Two forms:
///
/// - `managed!(Type: Shape, ...)` declares the shapes `Type` conforms to and
///   lets [`resolve`] pick the strategy.
/// - `managed!(Type => Strategy)` (optionally followed by `: Shape, ...`)
///   names an explicit strategy, which outranks every declared shape.
///
/// Every declared shape is checked against its trait, so the declaration
/// cannot drift from the impls. Generic and lifetime-carrying types cannot
/// use the macro and implement [`Managed`](crate::Managed) by hand.
///
/// Declaring a shape the type does not implement does not compile:
///
/// ```compile_fail
/// use closewise::managed;
///
/// struct Texture;
///
/// managed!(Texture: Closeable);
/// ```
///
/// ```rust
/// use closewise::{managed, Disposes, Managed, Shape};
/// use std::convert::Infallible;
///
/// struct Texture;
///
/// impl Disposes for Texture {
///     type Error = Infallible;
///     fn dispose(self) -> Result<(), Infallible> {
///         Ok(())
///     }
/// }
///
/// managed!(Texture: Disposes);
/// assert_eq!(<Texture as Managed>::SHAPE, Shape::Disposes);
/// ```
#[macro_export]
macro_rules! managed {
    (@bind $ty:ty, [$($shape:ident),+]) => {
        impl $crate::resolve::Shaped for $ty {
            const SHAPES: $crate::resolve::Shapes =
                $crate::resolve::Shapes::EMPTY $(.with($crate::Shape::$shape))+;
        }

        const _: () = {
            $({
                fn conforms<T: $crate::resolve::conforms::$shape>() {}
                let _ = conforms::<$ty>;
            })+
        };

        impl $crate::Managed for $ty {
            type Strategy = <$crate::resolve::Candidate<
                { $crate::resolve::selection(<$ty as $crate::resolve::Shaped>::SHAPES) },
            > as $crate::resolve::Pick<$ty>>::Strategy;

            const SHAPE: $crate::Shape =
                $crate::Shape::resolved(<$ty as $crate::resolve::Shaped>::SHAPES);
        }
    };
    ($ty:ty => $strategy:ty $(: $($shape:ident),+ $(,)?)?) => {
        impl $crate::resolve::Explicit for $ty {
            type Strategy = $strategy;
        }

        $crate::managed!(@bind $ty, [Explicit $($(, $shape)+)?]);
    };
    ($ty:ty : $($shape:ident),+ $(,)?) => {
        $crate::managed!(@bind $ty, [$($shape),+]);
    };
}
