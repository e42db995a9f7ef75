//! Integration tests for protected blocks over user-defined and std resources.
//!
//! These tests check that the strategy picked for each declared combination of
//! shapes is the one the runner calls, and that real files are flushed or
//! abandoned according to how the body exits.

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::panic::{self, AssertUnwindSafe};

use closewise::testing::{Fault, Journal};
use closewise::{
    managed, using, using_async, Category, Cause, Class, Closeable, Closes, Connection, Disposes,
    Managed, Policy, PooledConnection, Resource, Scope, ScopeError, Shape,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Call {
    Close,
    Rollback,
    Dispose,
    CloseMethod,
    Invalidate,
    Audit,
    AuditAfter,
}

fn ok(calls: &Journal<Call>, call: Call) -> Result<(), Fault> {
    calls.record(call);
    Ok(())
}

// ============================================================================
// Resource types
// ============================================================================

/// Declares every shape, but names its own strategy.
struct Everything(Journal<Call>);

impl Closeable for Everything {
    type Error = Fault;

    fn close(self) -> Result<(), Fault> {
        ok(&self.0, Call::Close)
    }
}

impl Connection for Everything {
    fn rollback(&mut self) -> Result<(), Fault> {
        ok(&self.0, Call::Rollback)
    }
}

impl Disposes for Everything {
    type Error = Fault;

    fn dispose(self) -> Result<(), Fault> {
        ok(&self.0, Call::Dispose)
    }
}

impl Closes for Everything {
    type Error = Fault;

    fn close(self) -> Result<(), Fault> {
        ok(&self.0, Call::CloseMethod)
    }
}

#[derive(Debug, Default)]
struct AuditStrategy;

impl Resource<Everything> for AuditStrategy {
    type Error = Fault;
    const NAME: &'static str = "audit";

    fn close(&self, resource: Everything) -> Result<(), Fault> {
        ok(&resource.0, Call::Audit)
    }

    fn close_after_failure(
        &self,
        resource: Everything,
        _cause: &Cause<'_>,
    ) -> Result<(), Fault> {
        ok(&resource.0, Call::AuditAfter)
    }
}

managed!(Everything => AuditStrategy: Connection, Closeable, Disposes, Closes);

/// A native interface and a structural one.
struct Hybrid(Journal<Call>);

impl Closeable for Hybrid {
    type Error = Fault;

    fn close(self) -> Result<(), Fault> {
        ok(&self.0, Call::Close)
    }
}

impl Disposes for Hybrid {
    type Error = Fault;

    fn dispose(self) -> Result<(), Fault> {
        ok(&self.0, Call::Dispose)
    }
}

managed!(Hybrid: Disposes, Closeable);

struct DisposeOnly(Journal<Call>);

impl Disposes for DisposeOnly {
    type Error = Fault;

    fn dispose(self) -> Result<(), Fault> {
        ok(&self.0, Call::Dispose)
    }
}

managed!(DisposeOnly: Disposes);

struct CloseOnly {
    calls: Journal<Call>,
    fail: bool,
}

impl Closes for CloseOnly {
    type Error = Fault;

    fn close(self) -> Result<(), Fault> {
        self.calls.record(Call::CloseMethod);
        if self.fail {
            Err(Fault::new("close"))
        } else {
            Ok(())
        }
    }
}

impl CloseOnly {
    fn failing(calls: &Journal<Call>) -> Self {
        CloseOnly {
            calls: calls.clone(),
            fail: true,
        }
    }
}

managed!(CloseOnly: Closes);

struct Pooled(Journal<Call>);

impl Closeable for Pooled {
    type Error = Fault;

    fn close(self) -> Result<(), Fault> {
        ok(&self.0, Call::Close)
    }
}

impl PooledConnection for Pooled {
    fn invalidate(self) -> Result<(), Fault> {
        ok(&self.0, Call::Invalidate)
    }
}

managed!(Pooled: PooledConnection, Closeable);

struct Db(Journal<Call>);

impl Closeable for Db {
    type Error = Fault;

    fn close(self) -> Result<(), Fault> {
        ok(&self.0, Call::Close)
    }
}

impl Connection for Db {
    fn rollback(&mut self) -> Result<(), Fault> {
        ok(&self.0, Call::Rollback)
    }
}

managed!(Db: Closeable, Connection);

// ============================================================================
// Resolution
// ============================================================================

#[test]
fn explicit_binding_wins_over_every_other_shape() {
    assert_eq!(<Everything as Managed>::SHAPE, Shape::Explicit);

    let calls = Journal::new();
    using(Everything(calls.clone()), |_| Ok::<_, Fault>(())).unwrap();
    let _ = using(Everything(calls.clone()), |_| Err::<(), _>(Fault::new("body")));

    assert_eq!(calls.events(), vec![Call::Audit, Call::AuditAfter]);
}

#[test]
fn native_interface_beats_structural_shape() {
    assert_eq!(<Hybrid as Managed>::SHAPE, Shape::Closeable);

    let calls = Journal::new();
    using(Hybrid(calls.clone()), |_| Ok::<_, Fault>(())).unwrap();
    assert_eq!(calls.events(), vec![Call::Close]);
}

#[test]
fn dispose_only_type_is_disposed_exactly_once() {
    assert_eq!(<DisposeOnly as Managed>::SHAPE, Shape::Disposes);

    let calls = Journal::new();
    using(DisposeOnly(calls.clone()), |_| Ok::<_, Fault>(())).unwrap();
    assert_eq!(calls.count(&Call::Dispose), 1);

    let _ = using(DisposeOnly(calls.clone()), |_| Err::<(), _>(Fault::new("body")));
    assert_eq!(calls.count(&Call::Dispose), 2);
}

#[test]
fn close_only_type_uses_close_fallback() {
    assert_eq!(<CloseOnly as Managed>::SHAPE, Shape::Closes);

    let calls = Journal::new();
    let err = using(CloseOnly::failing(&calls), |_| Ok::<_, Fault>(())).unwrap_err();

    assert_eq!(err.cleanup_error().map(Fault::label), Some("close"));
    assert_eq!(calls.events(), vec![Call::CloseMethod]);
}

#[test]
fn connection_rolls_back_before_closing_after_failure() {
    assert_eq!(<Db as Managed>::SHAPE, Shape::Connection);

    let calls = Journal::new();
    let _ = using(Db(calls.clone()), |_| Err::<(), _>(Fault::new("insert")));
    assert_eq!(calls.events(), vec![Call::Rollback, Call::Close]);
}

#[test]
fn pooled_connection_returned_on_success_invalidated_on_failure() {
    assert_eq!(<Pooled as Managed>::SHAPE, Shape::PooledConnection);

    let calls = Journal::new();
    using(Pooled(calls.clone()), |_| Ok::<_, Fault>(())).unwrap();
    let _ = using(Pooled(calls.clone()), |_| Err::<(), _>(Fault::new("io")));
    assert_eq!(calls.events(), vec![Call::Close, Call::Invalidate]);
}

#[test]
fn call_site_strategy_for_unbound_type() {
    struct Raw(Journal<Call>);

    #[derive(Debug)]
    struct RawStrategy;

    impl Resource<Raw> for RawStrategy {
        type Error = Fault;
        const NAME: &'static str = "raw";

        fn close(&self, raw: Raw) -> Result<(), Fault> {
            ok(&raw.0, Call::Close)
        }
    }

    let calls = Journal::new();
    let scope = Scope::with_strategy(Raw(calls.clone()), RawStrategy);
    assert!(format!("{:?}", scope).contains("\"raw\""));
    scope.run(|_| Ok::<_, Fault>(())).unwrap();
    assert_eq!(calls.events(), vec![Call::Close]);
}

// ============================================================================
// Failure handling
// ============================================================================

#[test]
fn fatal_failure_is_the_only_result() {
    let calls = Journal::new();
    let err = using(Db(calls.clone()), |_| Err::<(), _>(Fault::fatal("oom"))).unwrap_err();

    assert_eq!(
        err,
        ScopeError::Body {
            error: Fault::fatal("oom"),
            suppressed: None,
            class: Class::Fatal,
        }
    );
    assert!(calls.events().is_empty());
}

#[test]
fn ordinary_failure_and_cleanup_failure_are_both_observable() {
    let calls = Journal::new();
    let err = using(CloseOnly::failing(&calls), |_| Err::<(), _>(Fault::new("body"))).unwrap_err();

    assert_eq!(err.class(), Some(Class::Ordinary));
    assert_eq!(err.body_error().map(Fault::label), Some("body"));
    assert_eq!(err.cleanup_error().map(Fault::label), Some("close"));
    assert!(!err.is_fatal());
}

#[test]
fn rethrown_failure_propagates_after_cleanup() {
    let calls = Journal::new();
    let err = Scope::new(Db(calls.clone()))
        .run_or_recover(|_| Err::<(), _>(Fault::cancelled("stop")), |_| Ok(()))
        .unwrap_err();

    assert_eq!(err.class(), Some(Class::Rethrown));
    assert_eq!(err.body_error().map(Fault::label), Some("stop"));
    assert_eq!(calls.events(), vec![Call::Rollback, Call::Close]);
}

#[test]
fn lenient_policy_cleans_up_after_out_of_memory() {
    let calls = Journal::new();
    let err = Scope::new(Db(calls.clone()))
        .policy(Policy::lenient())
        .run(|_| Err::<(), _>(Fault::fatal("oom")))
        .unwrap_err();

    assert_eq!(err.class(), Some(Class::Ordinary));
    assert_eq!(calls.events(), vec![Call::Rollback, Call::Close]);
}

#[test]
fn panic_in_body_cleans_up_and_resumes() {
    let calls = Journal::new();
    let moved = calls.clone();
    let result = panic::catch_unwind(AssertUnwindSafe(move || {
        let _ = using(Everything(moved), |_| -> Result<(), Fault> {
            panic!("body panicked")
        });
    }));

    assert!(result.is_err());
    assert_eq!(calls.events(), vec![Call::AuditAfter]);
}

// ============================================================================
// File I/O
// ============================================================================

#[test]
fn file_is_synced_and_value_returned() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.txt");

    let written = using(File::create(&path).unwrap(), |file| {
        file.write_all(b"report")?;
        Ok::<_, io::Error>(6)
    })
    .unwrap();

    assert_eq!(written, 6);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "report");
}

#[test]
fn reading_a_file_needs_no_flush() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.txt");
    std::fs::write(&path, "retries = 3").unwrap();

    let contents = using(File::open(&path).unwrap(), |file| {
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        Ok::<_, io::Error>(contents)
    })
    .unwrap();

    assert_eq!(contents, "retries = 3");
}

#[cfg(unix)]
#[test]
fn special_file_body_success_is_not_a_close_failure() {
    let value = using(File::open("/dev/null").unwrap(), |_| Ok::<_, io::Error>(1)).unwrap();
    assert_eq!(value, 1);
}

#[test]
fn buffered_output_is_discarded_when_body_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("partial.txt");

    let err = using(BufWriter::new(File::create(&path).unwrap()), |out| {
        out.write_all(b"half a record")?;
        Err::<(), _>(io::Error::new(io::ErrorKind::InvalidData, "bad record"))
    })
    .unwrap_err();

    assert_eq!(err.class(), Some(Class::Ordinary));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
}

#[test]
fn buffered_output_is_flushed_on_success() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("full.txt");

    using(BufWriter::new(File::create(&path).unwrap()), |out| {
        out.write_all(b"whole record")
    })
    .unwrap();

    let mut contents = String::new();
    let mut file = File::open(&path).unwrap();
    file.read_to_string(&mut contents).unwrap();
    assert_eq!(contents, "whole record");
}

#[test]
fn interrupted_io_is_rethrown() {
    let file = tempfile::tempfile().unwrap();
    let interrupted = io::Error::from(io::ErrorKind::Interrupted);
    let err = using(file, |_| Err::<(), _>(interrupted)).unwrap_err();

    assert_eq!(err.class(), Some(Class::Rethrown));
    assert_eq!(
        err.body_error().map(io::Error::kind),
        Some(io::ErrorKind::Interrupted)
    );
}

#[tokio::test]
async fn async_body_writes_then_file_is_synced() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("async.txt");

    let result = using_async(File::create(&path).unwrap(), async |file: &mut File| {
        tokio::task::yield_now().await;
        file.write_all(b"async")?;
        Ok::<_, io::Error>(())
    })
    .await;

    assert!(result.is_ok());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "async");
}

#[tokio::test]
async fn async_failure_reports_category() {
    let calls = Journal::new();
    let err = Scope::new(Db(calls.clone()))
        .run_async(async |_: &mut Db| {
            Err::<(), _>(Fault::with_category("cf", Category::ControlFlow))
        })
        .await
        .unwrap_err();

    assert_eq!(err.class(), Some(Class::Rethrown));
    assert_eq!(calls.events(), vec![Call::Rollback, Call::Close]);
}
