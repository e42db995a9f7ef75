//! Classification policy: which categories are fatal and which are rethrown.

use super::category::{Category, CategorySet};

/// Which failure categories are fatal and which are rethrown-priority.
///
/// Policies are pure data. They are the only extension point of the default
/// [`Resource::is_fatal`](crate::Resource::is_fatal) and
/// [`Resource::is_rethrown`](crate::Resource::is_rethrown) predicates; a
/// strategy that needs something else overrides the predicate itself.
///
/// # Defaults
///
/// - fatal: [`Category::OutOfMemory`], [`Category::StackOverflow`], [`Category::Internal`]
/// - rethrown: [`Category::Interrupted`], [`Category::Cancelled`],
///   [`Category::ControlFlow`], [`Category::Panic`]
///
/// Interrupt and cancellation are rethrown even when removed from the set.
///
/// # Examples
///
/// ```rust
/// use closewise::{Category, Policy};
///
/// let policy = Policy::default()
///     .with_fatal(Category::Panic)
///     .without_rethrown(Category::ControlFlow);
///
/// assert!(policy.is_fatal(Category::Panic));
/// assert!(!policy.is_rethrown(Category::ControlFlow));
///
/// // Cancellation cannot be downgraded.
/// let policy = policy.without_rethrown(Category::Cancelled);
/// assert!(policy.is_rethrown(Category::Cancelled));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct Policy {
    fatal: CategorySet,
    rethrown: CategorySet,
}

impl Policy {
    /// Categories that are fatal unless configured otherwise.
    pub const DEFAULT_FATAL: CategorySet = CategorySet::EMPTY
        .with(Category::OutOfMemory)
        .with(Category::StackOverflow)
        .with(Category::Internal);

    /// Categories that are rethrown-priority unless configured otherwise.
    pub const DEFAULT_RETHROWN: CategorySet = CategorySet::EMPTY
        .with(Category::Interrupted)
        .with(Category::Cancelled)
        .with(Category::ControlFlow)
        .with(Category::Panic);

    /// The default policy, usable in `const` context.
    pub const fn standard() -> Self {
        Policy {
            fatal: Self::DEFAULT_FATAL,
            rethrown: Self::DEFAULT_RETHROWN,
        }
    }

    /// A policy with no fatal categories and only the mandatory rethrown ones.
    pub const fn lenient() -> Self {
        Policy {
            fatal: CategorySet::EMPTY,
            rethrown: CategorySet::EMPTY,
        }
    }

    /// Build a policy from explicit sets.
    pub const fn new(fatal: CategorySet, rethrown: CategorySet) -> Self {
        Policy { fatal, rethrown }
    }

    /// Mark `category` as fatal.
    pub const fn with_fatal(self, category: Category) -> Self {
        Policy {
            fatal: self.fatal.with(category),
            ..self
        }
    }

    /// Stop treating `category` as fatal.
    pub const fn without_fatal(self, category: Category) -> Self {
        Policy {
            fatal: self.fatal.without(category),
            ..self
        }
    }

    /// Mark `category` as rethrown-priority.
    pub const fn with_rethrown(self, category: Category) -> Self {
        Policy {
            rethrown: self.rethrown.with(category),
            ..self
        }
    }

    /// Stop treating `category` as rethrown-priority.
    ///
    /// Has no effect on interrupt and cancellation.
    pub const fn without_rethrown(self, category: Category) -> Self {
        Policy {
            rethrown: self.rethrown.without(category),
            ..self
        }
    }

    /// The configured fatal set.
    pub const fn fatal(&self) -> CategorySet {
        self.fatal
    }

    /// The configured rethrown set, not including the mandatory members.
    pub const fn rethrown(&self) -> CategorySet {
        self.rethrown
    }

    /// Returns true if failures of `category` must propagate without cleanup.
    pub const fn is_fatal(&self, category: Category) -> bool {
        self.fatal.contains(category)
    }

    /// Returns true if failures of `category` must survive cleanup.
    pub const fn is_rethrown(&self, category: Category) -> bool {
        category.is_cancellation() || self.rethrown.contains(category)
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self::standard()
    }
}
