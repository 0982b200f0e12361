//! Captures `tracing` records of a chosen target for test assertions.
//!
//! An [`Interceptor`] withholds records of its target from the console while
//! remembering them, so a test can assert that (and what) the code under test
//! logged. Records below the configured minimum severity are dropped, and
//! unrelated targets keep logging normally.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;
use tracing::span;
use tracing::subscriber::{DefaultGuard, Interest, Subscriber};
use tracing::{Dispatch, Event, Level, Metadata};

/// One captured log record.
#[derive(Clone, Debug)]
pub struct CapturedRecord {
    level: Level,
    target: String,
    message: String,
}

impl CapturedRecord {
    pub fn level(&self) -> Level {
        self.level
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// The rendered `message` field of the event.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Lifecycle misuse errors of [`Interceptor`].
#[derive(Debug, Error)]
pub enum InterceptError {
    #[error("already intercepting records for `{target}`")]
    AlreadyIntercepting { target: String },
}

type SharedRecords = Arc<Mutex<Vec<CapturedRecord>>>;

/// Captures log records of a target for later assertions.
///
/// While intercepting, records for the target at the minimum severity or
/// above are captured and withheld from the console; less severe ones for the
/// target are dropped. [`Interceptor::release`] returns the pipeline to its
/// previous state, as does dropping the interceptor.
pub struct Interceptor {
    target: String,
    min_level: Level,
    state: Option<Intercepting>,
}

struct Intercepting {
    records: SharedRecords,
    _guard: DefaultGuard,
}

impl Interceptor {
    /// Creates an idle interceptor for `target` at the given minimum severity.
    pub fn new(target: impl Into<String>, min_level: Level) -> Self {
        Self {
            target: target.into(),
            min_level,
            state: None,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// The minimum severity captured while intercepting.
    pub fn level(&self) -> Level {
        self.min_level
    }

    pub fn is_intercepting(&self) -> bool {
        self.state.is_some()
    }

    /// Starts capturing records.
    ///
    /// # Errors
    ///
    /// Fails with [`InterceptError::AlreadyIntercepting`] when already active.
    pub fn intercept(&mut self) -> Result<(), InterceptError> {
        if self.state.is_some() {
            return Err(InterceptError::AlreadyIntercepting {
                target: self.target.clone(),
            });
        }
        let records = SharedRecords::default();
        let console = tracing::dispatcher::get_default(Dispatch::clone);
        let subscriber = InterceptSubscriber {
            target: self.target.clone(),
            min_level: self.min_level,
            records: Arc::clone(&records),
            console,
        };
        let guard = tracing::subscriber::set_default(subscriber);
        self.state = Some(Intercepting {
            records,
            _guard: guard,
        });
        Ok(())
    }

    /// Returns the pipeline to its previous state, discarding captured records.
    ///
    /// A no-op when the interceptor is idle.
    pub fn release(&mut self) {
        self.state = None;
    }

    /// Assertions over the captured records.
    ///
    /// # Panics
    ///
    /// Panics when the interceptor is idle; call [`Interceptor::intercept`] first.
    #[track_caller]
    pub fn assert_log(&self) -> LogAssertions<'_> {
        let state = self
            .state
            .as_ref()
            .expect("no records are captured; call `intercept()` first");
        LogAssertions {
            records: state.records.lock().expect("poisoned"),
        }
    }
}

/// Assertion surface over the records captured so far.
pub struct LogAssertions<'a> {
    records: MutexGuard<'a, Vec<CapturedRecord>>,
}

impl LogAssertions<'_> {
    #[track_caller]
    pub fn is_empty(&self) {
        assert!(
            self.records.is_empty(),
            "expected no captured records, found {}",
            self.records.len()
        );
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn records(&self) -> &[CapturedRecord] {
        &self.records
    }

    /// The first captured record whose message contains `fragment`.
    ///
    /// # Panics
    ///
    /// Panics when no captured record matches.
    #[track_caller]
    pub fn record_with_message_containing(&self, fragment: &str) -> RecordSubject<'_> {
        let record = self
            .records
            .iter()
            .find(|record| record.message.contains(fragment))
            .unwrap_or_else(|| panic!("no captured record contains `{fragment}`"));
        RecordSubject { record }
    }
}

/// Assertions about a single captured record.
pub struct RecordSubject<'a> {
    record: &'a CapturedRecord,
}

impl RecordSubject<'_> {
    pub fn record(&self) -> &CapturedRecord {
        self.record
    }

    #[track_caller]
    pub fn has_level(&self, level: Level) -> &Self {
        assert_eq!(
            self.record.level, level,
            "record `{}` has level {}, expected {level}",
            self.record.message, self.record.level
        );
        self
    }

    #[track_caller]
    pub fn message_contains(&self, fragment: &str) -> &Self {
        assert!(
            self.record.message.contains(fragment),
            "record `{}` does not contain `{fragment}`",
            self.record.message
        );
        self
    }

    /// Asserts the record was logged at the debug level.
    #[track_caller]
    pub fn is_debug(&self) -> &Self {
        self.has_level(Level::DEBUG)
    }

    /// Asserts the record was logged at the error level.
    #[track_caller]
    pub fn is_error(&self) -> &Self {
        self.has_level(Level::ERROR)
    }
}

struct InterceptSubscriber {
    target: String,
    min_level: Level,
    records: SharedRecords,
    console: Dispatch,
}

impl InterceptSubscriber {
    fn matches(&self, metadata: &Metadata<'_>) -> bool {
        prefix_matches(&self.target, metadata.target())
    }
}

impl Subscriber for InterceptSubscriber {
    fn register_callsite(&self, _metadata: &'static Metadata<'static>) -> Interest {
        // Interest is cached per callsite across dispatcher changes; force a
        // per-event `enabled` check so interception stays scoped.
        Interest::sometimes()
    }

    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        if self.matches(metadata) {
            *metadata.level() <= self.min_level
        } else {
            self.console.enabled(metadata)
        }
    }

    fn max_level_hint(&self) -> Option<tracing::level_filters::LevelFilter> {
        None
    }

    fn new_span(&self, span: &span::Attributes<'_>) -> span::Id {
        self.console.new_span(span)
    }

    fn record(&self, span: &span::Id, values: &span::Record<'_>) {
        self.console.record(span, values);
    }

    fn record_follows_from(&self, span: &span::Id, follows: &span::Id) {
        self.console.record_follows_from(span, follows);
    }

    fn event(&self, event: &Event<'_>) {
        let metadata = event.metadata();
        if self.matches(metadata) {
            if *metadata.level() <= self.min_level {
                let mut visitor = MessageVisitor::default();
                event.record(&mut visitor);
                self.records.lock().expect("poisoned").push(CapturedRecord {
                    level: *metadata.level(),
                    target: metadata.target().to_owned(),
                    message: visitor.message,
                });
            }
        } else {
            self.console.event(event);
        }
    }

    fn enter(&self, span: &span::Id) {
        self.console.enter(span);
    }

    fn exit(&self, span: &span::Id) {
        self.console.exit(span);
    }

    fn clone_span(&self, span: &span::Id) -> span::Id {
        self.console.clone_span(span)
    }

    fn try_close(&self, span: span::Id) -> bool {
        self.console.try_close(span)
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_owned();
        }
    }
}

/// `prefix` matches `target` when they are equal, or when `target` is a
/// `::`-separated descendant of `prefix`. The empty prefix matches everything.
fn prefix_matches(prefix: &str, target: &str) -> bool {
    if prefix.is_empty() {
        return true;
    }
    match target.strip_prefix(prefix) {
        Some("") => true,
        Some(rest) => rest.starts_with("::"),
        None => false,
    }
}
