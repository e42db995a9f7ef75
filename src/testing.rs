//! Testing utilities for code that manages resources.
//!
//! - [`Journal`] records what happened to a resource, in order
//! - [`Fault`] is a failure whose category is chosen by the test
//! - [`MockHandle`] is a resource whose strategy, [`MockStrategy`], records
//!   every call in a journal and fails wherever the test scripted it to
//!
//! # Example
//!
//! ```rust
//! use closewise::testing::{Event, Fault, Journal, MockHandle};
//! use closewise::{assert_cleaned_up, using, Category};
//!
//! let journal = Journal::new();
//! let result = using(MockHandle::new(&journal), |handle| {
//!     handle.touch();
//!     Err::<(), _>(Fault::new("lost"))
//! });
//!
//! assert!(result.is_err());
//! assert_cleaned_up!(journal);
//! assert_eq!(
//!     journal.events(),
//!     vec![Event::Opened, Event::Used, Event::ClosedAfter(Category::Ordinary)]
//! );
//! ```

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::failure::{Category, Classify};
use crate::resource::{Cause, Resource};

/// Something that happened to a [`MockHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    /// The strategy's `open` ran.
    Opened,
    /// The body touched the handle.
    Used,
    /// `close` ran after a normal exit.
    Closed,
    /// `close_after_failure` ran for a failure of this category.
    ClosedAfter(Category),
}

/// Shared, ordered event log.
///
/// Clones share the same log, so a test keeps one clone and hands the other
/// to the resource under test.
#[derive(Debug)]
pub struct Journal<E = Event> {
    events: Arc<Mutex<Vec<E>>>,
}

impl<E> Clone for Journal<E> {
    fn clone(&self) -> Self {
        Journal {
            events: Arc::clone(&self.events),
        }
    }
}

impl<E> Default for Journal<E> {
    fn default() -> Self {
        Journal {
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<E> Journal<E> {
    /// Create an empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event.
    pub fn record(&self, event: E) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    /// Snapshot of every event so far.
    pub fn events(&self) -> Vec<E>
    where
        E: Clone,
    {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// How many times `event` was recorded.
    pub fn count(&self, event: &E) -> usize
    where
        E: PartialEq,
    {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| *e == event)
            .count()
    }
}

impl Journal<Event> {
    /// Number of cleanup calls of either kind.
    pub fn closes(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| matches!(e, Event::Closed | Event::ClosedAfter(_)))
            .count()
    }
}

/// A labelled failure with a chosen category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    category: Category,
    label: String,
}

impl Fault {
    /// An ordinary failure.
    pub fn new(label: impl Into<String>) -> Self {
        Self::with_category(label, Category::Ordinary)
    }

    /// A failure of any category.
    pub fn with_category(label: impl Into<String>, category: Category) -> Self {
        Fault {
            category,
            label: label.into(),
        }
    }

    /// A failure fatal under the default policy.
    pub fn fatal(label: impl Into<String>) -> Self {
        Self::with_category(label, Category::OutOfMemory)
    }

    /// A cancellation.
    pub fn cancelled(label: impl Into<String>) -> Self {
        Self::with_category(label, Category::Cancelled)
    }

    /// The label given at construction.
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

impl std::error::Error for Fault {}

impl Classify for Fault {
    fn category(&self) -> Category {
        self.category
    }
}

#[cfg(feature = "proptest")]
impl proptest::arbitrary::Arbitrary for Fault {
    type Parameters = ();
    type Strategy = proptest::strategy::BoxedStrategy<Self>;

    fn arbitrary_with(_: ()) -> Self::Strategy {
        use proptest::prelude::*;
        ("[a-z]{1,8}", any::<Category>())
            .prop_map(|(label, category)| Fault::with_category(label, category))
            .boxed()
    }
}

#[derive(Debug, Default)]
struct Script {
    open: Option<Fault>,
    close: Option<Fault>,
    close_after: Option<Fault>,
}

/// A resource that logs to a [`Journal`] and fails on demand.
#[derive(Debug)]
pub struct MockHandle {
    journal: Journal,
    script: Script,
}

impl MockHandle {
    /// A handle that succeeds at everything.
    pub fn new(journal: &Journal) -> Self {
        MockHandle {
            journal: journal.clone(),
            script: Script::default(),
        }
    }

    /// Make `open` fail with `fault`.
    pub fn failing_open(mut self, fault: Fault) -> Self {
        self.script.open = Some(fault);
        self
    }

    /// Make `close` fail with `fault`.
    pub fn failing_close(mut self, fault: Fault) -> Self {
        self.script.close = Some(fault);
        self
    }

    /// Make `close_after_failure` fail with `fault`.
    pub fn failing_close_after(mut self, fault: Fault) -> Self {
        self.script.close_after = Some(fault);
        self
    }

    /// Record a use of the handle.
    pub fn touch(&self) {
        self.journal.record(Event::Used);
    }

    /// The journal this handle logs to.
    pub fn journal(&self) -> &Journal {
        &self.journal
    }
}

fn scripted(fault: Option<Fault>) -> Result<(), Fault> {
    fault.map_or(Ok(()), Err)
}

/// Strategy for [`MockHandle`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MockStrategy;

impl Resource<MockHandle> for MockStrategy {
    type Error = Fault;
    const NAME: &'static str = "mock";

    fn open(&self, handle: &mut MockHandle) -> Result<(), Fault> {
        handle.journal.record(Event::Opened);
        scripted(handle.script.open.take())
    }

    fn close(&self, handle: MockHandle) -> Result<(), Fault> {
        handle.journal.record(Event::Closed);
        scripted(handle.script.close)
    }

    fn close_after_failure(&self, handle: MockHandle, cause: &Cause<'_>) -> Result<(), Fault> {
        handle.journal.record(Event::ClosedAfter(cause.category()));
        scripted(handle.script.close_after)
    }
}

crate::managed!(MockHandle => MockStrategy);

/// Assert that a journal shows exactly one cleanup call.
///
/// # Example
///
/// ```rust
/// use closewise::assert_cleaned_up;
/// use closewise::testing::{Event, Journal};
///
/// let journal = Journal::new();
/// journal.record(Event::Opened);
/// journal.record(Event::Closed);
/// assert_cleaned_up!(journal);
/// ```
#[macro_export]
macro_rules! assert_cleaned_up {
    ($journal:expr) => {
        match $journal.closes() {
            1 => {}
            n => panic!("Expected exactly one cleanup, got {}: {:?}", n, $journal.events()),
        }
    };
}

/// Assert that a journal shows no cleanup call at all.
///
/// # Example
///
/// ```rust
/// use closewise::assert_not_cleaned_up;
/// use closewise::testing::{Event, Journal};
///
/// let journal = Journal::new();
/// journal.record(Event::Opened);
/// assert_not_cleaned_up!(journal);
/// ```
#[macro_export]
macro_rules! assert_not_cleaned_up {
    ($journal:expr) => {
        match $journal.closes() {
            0 => {}
            n => panic!("Expected no cleanup, got {}: {:?}", n, $journal.events()),
        }
    };
}
