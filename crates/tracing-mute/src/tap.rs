use std::io;

use thiserror::Error;
use tracing::span;
use tracing::subscriber::{DefaultGuard, Interest, Subscriber};
use tracing::{Dispatch, Event, Metadata};

use crate::level_map::prefix_matches;
use crate::stream::{MemoizingStream, buffer_dispatch};

/// Lifecycle misuse errors of [`MutingLoggerTap`].
#[derive(Debug, Error)]
pub enum TapError {
    #[error("a tap is already installed for `{target}`")]
    AlreadyInstalled { target: String },
    #[error("no tap is installed for `{target}`")]
    NotInstalled { target: String },
}

/// Redirects a target's log output into an in-memory buffer.
///
/// While installed, records for the target (and its `::`-descendants) are
/// formatted into a [`MemoizingStream`] instead of reaching the console;
/// records for other targets keep flowing to the dispatcher that was active
/// before installation. The empty target taps everything.
///
/// [`MutingLoggerTap::remove`] restores the previous pipeline and discards
/// the buffer. Dropping an installed tap restores the pipeline as well, so
/// the console is back to its pre-install state even when a test panics.
pub struct MutingLoggerTap {
    target: String,
    stream: MemoizingStream,
    guard: Option<DefaultGuard>,
}

impl MutingLoggerTap {
    /// Creates an idle tap for `target` and its descendants.
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            stream: MemoizingStream::new(),
            guard: None,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn is_installed(&self) -> bool {
        self.guard.is_some()
    }

    /// Starts buffering the target's output.
    ///
    /// # Errors
    ///
    /// Fails with [`TapError::AlreadyInstalled`] when the tap is installed.
    pub fn install(&mut self) -> Result<(), TapError> {
        if self.guard.is_some() {
            return Err(TapError::AlreadyInstalled {
                target: self.target.clone(),
            });
        }
        let console = tracing::dispatcher::get_default(Dispatch::clone);
        let subscriber = TapSubscriber {
            target: self.target.clone(),
            buffer: buffer_dispatch(&self.stream),
            console,
        };
        self.guard = Some(tracing::subscriber::set_default(subscriber));
        Ok(())
    }

    /// Restores the previous pipeline and discards the buffer.
    ///
    /// Safe to call when nothing was logged while installed.
    ///
    /// # Errors
    ///
    /// Fails with [`TapError::NotInstalled`] when the tap is not installed.
    pub fn remove(&mut self) -> Result<(), TapError> {
        match self.guard.take() {
            Some(guard) => {
                drop(guard);
                self.stream.clear();
                Ok(())
            }
            None => Err(TapError::NotInstalled {
                target: self.target.clone(),
            }),
        }
    }

    /// Number of bytes buffered so far.
    pub fn stream_size(&self) -> usize {
        self.stream.size()
    }

    /// Copies the buffered output into `sink` verbatim.
    ///
    /// Neither the buffer nor the installed state is affected.
    ///
    /// # Errors
    ///
    /// Returns the sink's I/O error unchanged when the write is rejected.
    pub fn flush_to<W: io::Write>(&self, sink: &mut W) -> io::Result<()> {
        self.stream.flush_to(sink)
    }
}

struct TapSubscriber {
    target: String,
    buffer: Dispatch,
    console: Dispatch,
}

impl TapSubscriber {
    fn tapped(&self, metadata: &Metadata<'_>) -> bool {
        prefix_matches(&self.target, metadata.target())
    }
}

impl Subscriber for TapSubscriber {
    fn register_callsite(&self, _metadata: &'static Metadata<'static>) -> Interest {
        // Interest is cached per callsite across dispatcher changes; force a
        // per-event `enabled` check so the tap stays scoped.
        Interest::sometimes()
    }

    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        self.tapped(metadata) || self.console.enabled(metadata)
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
        if self.tapped(event.metadata()) {
            self.buffer.event(event);
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
