//! Failure categories and the `Classify` trait.

use std::fmt;

/// The class a failure belongs to.
///
/// Classification never looks at resource state: a failure's category is a
/// pure function of the failure itself, obtained through [`Classify`].
///
/// # Examples
///
/// ```rust
/// use closewise::{Category, Classify};
/// use std::io;
///
/// let err = io::Error::from(io::ErrorKind::Interrupted);
/// assert_eq!(err.category(), Category::Interrupted);
/// assert!(Category::Interrupted.is_cancellation());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
#[repr(u8)]
pub enum Category {
    /// Any failure not covered by another category.
    Ordinary = 0,
    /// An allocation could not be satisfied.
    OutOfMemory = 1,
    /// The stack was exhausted and reported as an error.
    StackOverflow = 2,
    /// An internal invariant of the runtime or a library was broken.
    Internal = 3,
    /// The operation was interrupted by a signal.
    Interrupted = 4,
    /// Cooperative cancellation was requested.
    Cancelled = 5,
    /// An early-exit signal used for control flow rather than to report an error.
    ControlFlow = 6,
    /// The protected body panicked.
    Panic = 7,
}

impl Category {
    /// Every category, in declaration order.
    pub const ALL: [Category; 8] = [
        Category::Ordinary,
        Category::OutOfMemory,
        Category::StackOverflow,
        Category::Internal,
        Category::Interrupted,
        Category::Cancelled,
        Category::ControlFlow,
        Category::Panic,
    ];

    /// Returns true for interrupt and cancellation signals.
    ///
    /// These are always rethrown-priority, whatever a strategy or policy says.
    pub const fn is_cancellation(self) -> bool {
        matches!(self, Category::Interrupted | Category::Cancelled)
    }

    /// Snake-case name used in logs and serialized policies.
    pub const fn name(self) -> &'static str {
        match self {
            Category::Ordinary => "ordinary",
            Category::OutOfMemory => "out_of_memory",
            Category::StackOverflow => "stack_overflow",
            Category::Internal => "internal",
            Category::Interrupted => "interrupted",
            Category::Cancelled => "cancelled",
            Category::ControlFlow => "control_flow",
            Category::Panic => "panic",
        }
    }

    const fn bit(self) -> u16 {
        1 << (self as u8)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A set of categories.
///
/// Small and `Copy`, so policies can be built in `const` context.
///
/// ```rust
/// use closewise::{Category, CategorySet};
///
/// const SIGNALS: CategorySet = CategorySet::EMPTY
///     .with(Category::Interrupted)
///     .with(Category::Cancelled);
///
/// assert!(SIGNALS.contains(Category::Cancelled));
/// assert!(!SIGNALS.contains(Category::Ordinary));
/// assert_eq!(SIGNALS.len(), 2);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(into = "Vec<Category>", from = "Vec<Category>")
)]
pub struct CategorySet(u16);

impl CategorySet {
    /// The empty set.
    pub const EMPTY: CategorySet = CategorySet(0);

    /// Returns a copy of this set with `category` added.
    pub const fn with(self, category: Category) -> Self {
        CategorySet(self.0 | category.bit())
    }

    /// Returns a copy of this set with `category` removed.
    pub const fn without(self, category: Category) -> Self {
        CategorySet(self.0 & !category.bit())
    }

    /// Returns true if `category` is in the set.
    pub const fn contains(self, category: Category) -> bool {
        self.0 & category.bit() != 0
    }

    /// Union of two sets.
    pub const fn union(self, other: CategorySet) -> Self {
        CategorySet(self.0 | other.0)
    }

    /// Returns true if the set has no members.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of categories in the set.
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Iterates the members in declaration order.
    pub fn iter(self) -> impl Iterator<Item = Category> {
        Category::ALL.into_iter().filter(move |c| self.contains(*c))
    }
}

impl fmt::Debug for CategorySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl FromIterator<Category> for CategorySet {
    fn from_iter<I: IntoIterator<Item = Category>>(iter: I) -> Self {
        iter.into_iter().fold(CategorySet::EMPTY, CategorySet::with)
    }
}

impl From<Vec<Category>> for CategorySet {
    fn from(categories: Vec<Category>) -> Self {
        categories.into_iter().collect()
    }
}

impl From<CategorySet> for Vec<Category> {
    fn from(set: CategorySet) -> Self {
        set.iter().collect()
    }
}

/// Maps a failure value to its [`Category`].
///
/// The default method classifies everything as [`Category::Ordinary`], so
/// application error types usually opt in with an empty impl and override
/// `category` only for the variants that carry a signal.
///
/// ```rust
/// use closewise::{Category, Classify};
///
/// #[derive(Debug)]
/// enum JobError {
///     Timeout,
///     Cancelled,
/// }
///
/// impl Classify for JobError {
///     fn category(&self) -> Category {
///         match self {
///             JobError::Cancelled => Category::Cancelled,
///             JobError::Timeout => Category::Ordinary,
///         }
///     }
/// }
///
/// assert_eq!(JobError::Cancelled.category(), Category::Cancelled);
/// ```
pub trait Classify {
    /// The category of this failure.
    fn category(&self) -> Category {
        Category::Ordinary
    }
}

impl Classify for std::io::Error {
    fn category(&self) -> Category {
        match self.kind() {
            std::io::ErrorKind::Interrupted => Category::Interrupted,
            std::io::ErrorKind::OutOfMemory => Category::OutOfMemory,
            _ => Category::Ordinary,
        }
    }
}

impl Classify for std::collections::TryReserveError {
    fn category(&self) -> Category {
        Category::OutOfMemory
    }
}

impl Classify for std::convert::Infallible {
    fn category(&self) -> Category {
        match *self {}
    }
}

impl<B, C> Classify for std::ops::ControlFlow<B, C> {
    fn category(&self) -> Category {
        Category::ControlFlow
    }
}

impl Classify for Box<dyn std::error::Error + Send + Sync> {
    fn category(&self) -> Category {
        match self.downcast_ref::<std::io::Error>() {
            Some(io) => io.category(),
            None => Category::Ordinary,
        }
    }
}

impl Classify for std::fmt::Error {}
impl Classify for String {}
impl Classify for &'static str {}

#[cfg(feature = "proptest")]
impl proptest::arbitrary::Arbitrary for Category {
    type Parameters = ();
    type Strategy = proptest::strategy::BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        use proptest::strategy::Strategy;
        proptest::sample::select(Category::ALL.to_vec()).boxed()
    }
}
