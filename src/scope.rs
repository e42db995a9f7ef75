//! Protected blocks: open a resource, run a body, always close.
//!
//! [`Scope`] runs one body against one resource and releases it through the
//! resource's strategy however the body exits:
//!
//! - [`using`] / [`Scope::run`] - synchronous body
//! - [`using_async`] / [`Scope::run_async`] - async body, synchronous cleanup
//! - [`Scope::run_or_recover`] - lets ordinary failures be recovered after cleanup
//! - [`ScopeError`] - which phase failed, with any secondary failure attached
//!
//! # Failure handling
//!
//! | Body outcome | What happens | Result |
//! |---|---|---|
//! | `Ok(v)` | `close` | `Ok(v)`, or `Close { suppressed: None }` |
//! | fatal `Err(t)` | nothing | `Body { class: Fatal }` |
//! | other `Err(t)` | `close_after_failure` | `Body { suppressed }` |
//! | other `Err(t)`, fatal cleanup `t2` | `close_after_failure` | `Close { error: t2, suppressed: Some(t) }` |
//! | panic | `close_after_failure` unless panics are fatal | the panic resumes |
//!
//! # Example
//!
//! ```rust
//! use closewise::testing::{Fault, Journal, MockHandle};
//! use closewise::{using, Class, ScopeError};
//!
//! let journal = Journal::new();
//! let handle = MockHandle::new(&journal).failing_close_after(Fault::new("flush failed"));
//!
//! let err = using(handle, |_| Err::<(), _>(Fault::new("query failed"))).unwrap_err();
//!
//! match err {
//!     ScopeError::Body { error, suppressed, class } => {
//!         assert_eq!(error.label(), "query failed");
//!         assert_eq!(suppressed.unwrap().label(), "flush failed");
//!         assert_eq!(class, Class::Ordinary);
//!     }
//!     other => panic!("unexpected: {:?}", other),
//! }
//! ```

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use futures::FutureExt;

use crate::failure::{Category, Classify, Policy};
use crate::resource::{Cause, Managed, Resource, StrategyError};

// ============================================================================
// Class and ScopeError
// ============================================================================

/// How a body failure was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Class {
    /// Propagated immediately; no cleanup was attempted.
    Fatal,
    /// Cleanup ran; the failure takes priority and is never recovered.
    Rethrown,
    /// Cleanup ran; the failure may be recovered.
    Ordinary,
}

/// Error returned by a protected block.
///
/// Each variant names the phase whose failure is primary. A secondary
/// failure is never dropped: it is carried in `suppressed`.
///
/// # Variants
///
/// - `Open` - the strategy's `open` failed; the body never ran
/// - `Body` - the body failed; `suppressed` holds a non-fatal cleanup failure
/// - `Close` - cleanup failed; `suppressed` holds the body failure when a
///   fatal cleanup failure took precedence over it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeError<E, C> {
    /// Opening the resource failed.
    Open(C),
    /// The body failed.
    Body {
        /// The body's failure.
        error: E,
        /// A non-fatal failure raised while cleaning up after it.
        suppressed: Option<C>,
        /// How the body's failure was classified.
        class: Class,
    },
    /// Cleanup failed.
    Close {
        /// The cleanup failure.
        error: C,
        /// The body failure it took precedence over, if any.
        suppressed: Option<E>,
    },
}

impl<E, C> ScopeError<E, C> {
    /// Returns the open failure, if any.
    pub fn open_error(&self) -> Option<&C> {
        match self {
            ScopeError::Open(e) => Some(e),
            _ => None,
        }
    }

    /// Returns the body failure, whether primary or suppressed.
    pub fn body_error(&self) -> Option<&E> {
        match self {
            ScopeError::Body { error, .. } => Some(error),
            ScopeError::Close { suppressed, .. } => suppressed.as_ref(),
            ScopeError::Open(_) => None,
        }
    }

    /// Returns the cleanup failure, whether primary or suppressed.
    pub fn cleanup_error(&self) -> Option<&C> {
        match self {
            ScopeError::Body { suppressed, .. } => suppressed.as_ref(),
            ScopeError::Close { error, .. } => Some(error),
            ScopeError::Open(_) => None,
        }
    }

    /// Classification of the body failure, when the body failure is primary.
    pub fn class(&self) -> Option<Class> {
        match self {
            ScopeError::Body { class, .. } => Some(*class),
            _ => None,
        }
    }

    /// Returns true if the primary failure is fatal.
    ///
    /// A `Close` error only carries a suppressed body failure when its
    /// cleanup failure was classified fatal.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ScopeError::Body {
                class: Class::Fatal,
                ..
            } | ScopeError::Close {
                suppressed: Some(_),
                ..
            }
        )
    }

    /// Extract the body failure, discarding everything else.
    pub fn into_body_error(self) -> Option<E> {
        match self {
            ScopeError::Body { error, .. } => Some(error),
            ScopeError::Close { suppressed, .. } => suppressed,
            ScopeError::Open(_) => None,
        }
    }

    /// Maps the body failure type.
    pub fn map_body<F, E2>(self, f: F) -> ScopeError<E2, C>
    where
        F: FnOnce(E) -> E2,
    {
        match self {
            ScopeError::Open(c) => ScopeError::Open(c),
            ScopeError::Body {
                error,
                suppressed,
                class,
            } => ScopeError::Body {
                error: f(error),
                suppressed,
                class,
            },
            ScopeError::Close { error, suppressed } => ScopeError::Close {
                error,
                suppressed: suppressed.map(f),
            },
        }
    }
}

impl<E: fmt::Display, C: fmt::Display> fmt::Display for ScopeError<E, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeError::Open(e) => write!(f, "open failed: {}", e),
            ScopeError::Body {
                error,
                suppressed: None,
                ..
            } => write!(f, "{}", error),
            ScopeError::Body {
                error,
                suppressed: Some(cleanup),
                ..
            } => write!(f, "{}; cleanup also failed: {}", error, cleanup),
            ScopeError::Close {
                error,
                suppressed: None,
            } => write!(f, "close failed: {}", error),
            ScopeError::Close {
                error,
                suppressed: Some(body),
            } => write!(f, "fatal cleanup failure: {}; after: {}", error, body),
        }
    }
}

impl<E, C> std::error::Error for ScopeError<E, C>
where
    E: std::error::Error + 'static,
    C: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScopeError::Open(e) => Some(e),
            ScopeError::Body { error, .. } => Some(error),
            ScopeError::Close { error, .. } => Some(error),
        }
    }
}

// ============================================================================
// Scope
// ============================================================================

/// One protected block over one resource.
///
/// The strategy is fixed when the scope is built: [`Scope::new`] takes the
/// one bound by [`Managed`], [`Scope::with_strategy`] takes an explicit one.
pub struct Scope<R, S> {
    resource: R,
    strategy: S,
    policy: Policy,
}

impl<R, S: Resource<R>> fmt::Debug for Scope<R, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("resource", &"<resource>")
            .field("strategy", &S::NAME)
            .field("policy", &self.policy)
            .finish()
    }
}

impl<R: Managed> Scope<R, R::Strategy> {
    /// A scope using the strategy resolved for `R`.
    pub fn new(resource: R) -> Self {
        Scope {
            resource,
            strategy: R::Strategy::default(),
            policy: Policy::default(),
        }
    }
}

impl<R, S: Resource<R>> Scope<R, S> {
    /// A scope using `strategy`, whatever `R` would resolve to.
    pub fn with_strategy(resource: R, strategy: S) -> Self {
        Scope {
            resource,
            strategy,
            policy: Policy::default(),
        }
    }

    /// Replace the classification policy.
    pub fn policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    /// Classify a failure category under this scope's strategy and policy.
    pub fn classify(&self, category: Category) -> Class {
        classify(&self.strategy, &self.policy, category)
    }

    /// Run `body` and release the resource.
    pub fn run<T, E, F>(self, body: F) -> Result<T, ScopeError<E, S::Error>>
    where
        F: FnOnce(&mut R) -> Result<T, E>,
        E: Classify + fmt::Debug,
        S::Error: fmt::Debug,
    {
        let Scope {
            mut resource,
            strategy,
            policy,
        } = self;
        if let Err(error) = strategy.open(&mut resource) {
            return Err(ScopeError::Open(error));
        }
        let outcome = {
            let resource = &mut resource;
            panic::catch_unwind(AssertUnwindSafe(move || body(resource)))
        };
        settle(&strategy, &policy, resource, outcome)
    }

    /// Run `body`, release the resource, then give `recover` a chance to turn
    /// an ordinary failure into a value.
    ///
    /// Only an [`Class::Ordinary`] failure whose cleanup succeeded reaches
    /// `recover`. A failure `recover` returns is classified again.
    pub fn run_or_recover<T, E, F, G>(
        self,
        body: F,
        recover: G,
    ) -> Result<T, ScopeError<E, S::Error>>
    where
        F: FnOnce(&mut R) -> Result<T, E>,
        G: FnOnce(E) -> Result<T, E>,
        E: Classify + fmt::Debug,
        S::Error: fmt::Debug,
    {
        let Scope {
            mut resource,
            strategy,
            policy,
        } = self;
        if let Err(error) = strategy.open(&mut resource) {
            return Err(ScopeError::Open(error));
        }
        let outcome = {
            let resource = &mut resource;
            panic::catch_unwind(AssertUnwindSafe(move || body(resource)))
        };
        match settle(&strategy, &policy, resource, outcome) {
            Err(ScopeError::Body {
                error,
                suppressed: None,
                class: Class::Ordinary,
            }) => recover(error).map_err(|error| {
                let class = classify(&strategy, &policy, error.category());
                ScopeError::Body {
                    error,
                    suppressed: None,
                    class,
                }
            }),
            settled => settled,
        }
    }

    /// Run an async `body` and release the resource once it completes.
    ///
    /// ```rust
    /// use closewise::testing::{Event, Fault, Journal, MockHandle};
    /// use closewise::Scope;
    ///
    /// # tokio_test::block_on(async {
    /// let journal = Journal::new();
    /// let value = Scope::new(MockHandle::new(&journal))
    ///     .run_async(async |handle: &mut MockHandle| {
    ///         handle.touch();
    ///         Ok::<_, Fault>(5)
    ///     })
    ///     .await
    ///     .unwrap();
    ///
    /// assert_eq!(value, 5);
    /// assert_eq!(journal.events(), vec![Event::Opened, Event::Used, Event::Closed]);
    /// # });
    /// ```
    pub async fn run_async<T, E, F>(self, body: F) -> Result<T, ScopeError<E, S::Error>>
    where
        F: AsyncFnOnce(&mut R) -> Result<T, E>,
        E: Classify + fmt::Debug,
        S::Error: fmt::Debug,
    {
        let Scope {
            mut resource,
            strategy,
            policy,
        } = self;
        if let Err(error) = strategy.open(&mut resource) {
            return Err(ScopeError::Open(error));
        }
        let outcome = AssertUnwindSafe(body(&mut resource)).catch_unwind().await;
        settle(&strategy, &policy, resource, outcome)
    }
}

/// Run `body` against `resource` using its resolved strategy and the default
/// policy.
///
/// ```rust
/// use closewise::{closing, using};
///
/// let conn = closing(String::from("db"), |_| Ok::<_, String>(()));
/// let len = using(conn, |c| Ok::<_, String>(c.len())).unwrap();
/// assert_eq!(len, 2);
/// ```
pub fn using<R, T, E, F>(resource: R, body: F) -> Result<T, ScopeError<E, StrategyError<R>>>
where
    R: Managed,
    F: FnOnce(&mut R) -> Result<T, E>,
    E: Classify + fmt::Debug,
    StrategyError<R>: fmt::Debug,
{
    Scope::new(resource).run(body)
}

/// Async form of [`using`].
pub async fn using_async<R, T, E, F>(
    resource: R,
    body: F,
) -> Result<T, ScopeError<E, StrategyError<R>>>
where
    R: Managed,
    F: AsyncFnOnce(&mut R) -> Result<T, E>,
    E: Classify + fmt::Debug,
    StrategyError<R>: fmt::Debug,
{
    Scope::new(resource).run_async(body).await
}

// ============================================================================
// Settling
// ============================================================================

fn classify<R, S: Resource<R>>(strategy: &S, policy: &Policy, category: Category) -> Class {
    if strategy.is_fatal(category, policy) {
        Class::Fatal
    } else if category.is_cancellation() || strategy.is_rethrown(category, policy) {
        Class::Rethrown
    } else {
        Class::Ordinary
    }
}

fn settle<R, S, T, E>(
    strategy: &S,
    policy: &Policy,
    resource: R,
    outcome: std::thread::Result<Result<T, E>>,
) -> Result<T, ScopeError<E, S::Error>>
where
    S: Resource<R>,
    E: Classify + fmt::Debug,
    S::Error: fmt::Debug,
{
    match outcome {
        Ok(Ok(value)) => match strategy.close(resource) {
            Ok(()) => Ok(value),
            Err(error) => Err(ScopeError::Close {
                error,
                suppressed: None,
            }),
        },
        Ok(Err(error)) => Err(settle_failure(strategy, policy, resource, error)),
        Err(payload) => settle_panic(strategy, policy, resource, payload),
    }
}

fn settle_failure<R, S, E>(
    strategy: &S,
    policy: &Policy,
    resource: R,
    error: E,
) -> ScopeError<E, S::Error>
where
    S: Resource<R>,
    E: Classify + fmt::Debug,
    S::Error: fmt::Debug,
{
    let category = error.category();
    let class = classify(strategy, policy, category);

    if class == Class::Fatal {
        #[cfg(feature = "tracing")]
        tracing::debug!(
            strategy = S::NAME,
            %category,
            "fatal failure, skipping cleanup"
        );
        return ScopeError::Body {
            error,
            suppressed: None,
            class,
        };
    }

    let cause = Cause::Error {
        category,
        error: &error,
    };
    match strategy.close_after_failure(resource, &cause) {
        Ok(()) => ScopeError::Body {
            error,
            suppressed: None,
            class,
        },
        Err(cleanup) if strategy.is_fatal(cleanup.category(), policy) => {
            #[cfg(feature = "tracing")]
            tracing::error!(
                strategy = S::NAME,
                cleanup = ?cleanup,
                "fatal cleanup failure overrides {:?}",
                error
            );
            ScopeError::Close {
                error: cleanup,
                suppressed: Some(error),
            }
        }
        Err(cleanup) => {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                strategy = S::NAME,
                %category,
                "resource cleanup failed: {:?}",
                cleanup
            );
            ScopeError::Body {
                error,
                suppressed: Some(cleanup),
                class,
            }
        }
    }
}

fn settle_panic<R, S, T, E>(
    strategy: &S,
    policy: &Policy,
    resource: R,
    payload: Box<dyn Any + Send>,
) -> Result<T, ScopeError<E, S::Error>>
where
    S: Resource<R>,
    S::Error: fmt::Debug,
{
    if !strategy.is_fatal(Category::Panic, policy) {
        let cause = Cause::Panic {
            message: panic_message(payload.as_ref()),
        };
        if let Err(cleanup) = strategy.close_after_failure(resource, &cause) {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                strategy = S::NAME,
                "resource cleanup failed after panic: {:?}",
                cleanup
            );
            #[cfg(not(feature = "tracing"))]
            eprintln!(
                "resource {} cleanup failed after panic: {:?}",
                S::NAME,
                cleanup
            );
        }
    }
    panic::resume_unwind(payload)
}

fn panic_message(payload: &(dyn Any + Send)) -> Option<&str> {
    payload
        .downcast_ref::<&'static str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
}
