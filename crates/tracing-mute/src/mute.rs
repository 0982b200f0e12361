use tracing::span;
use tracing::subscriber::{DefaultGuard, Interest, Subscriber};
use tracing::{Dispatch, Event, Metadata};

use crate::level_map::TargetLevelMap;

/// Handle keeping a muted scope alive.
///
/// Dropping the guard restores the dispatcher that was active when the scope
/// was entered, including during panic unwinding. The guard is thread-local
/// and must be dropped on the thread that created it.
#[must_use = "dropping the guard immediately unmutes the targets"]
pub struct MuteGuard {
    _guard: DefaultGuard,
}

/// Applies `map` to this thread's logging for as long as the returned guard lives.
///
/// Events failing their target's filter are dropped; everything else keeps
/// flowing to the previously active dispatcher.
pub fn mute_scope(map: TargetLevelMap) -> MuteGuard {
    let console = tracing::dispatcher::get_default(Dispatch::clone);
    let subscriber = MuteSubscriber { map, console };
    MuteGuard {
        _guard: tracing::subscriber::set_default(subscriber),
    }
}

/// Mutes logging for the given targets while executing `block`.
///
/// The block's value is returned, and its panic (if any) propagates after the
/// previous dispatcher has been restored.
pub fn with_logging_muted_in<I, S, F, R>(targets: I, block: F) -> R
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
    F: FnOnce() -> R,
{
    let _scope = mute_scope(TargetLevelMap::muting(targets));
    block()
}

struct MuteSubscriber {
    map: TargetLevelMap,
    console: Dispatch,
}

impl MuteSubscriber {
    fn passes(&self, metadata: &Metadata<'_>) -> bool {
        match self.map.filter_for(metadata.target()) {
            Some(filter) => *metadata.level() <= filter,
            None => true,
        }
    }
}

impl Subscriber for MuteSubscriber {
    fn register_callsite(&self, _metadata: &'static Metadata<'static>) -> Interest {
        // Interest is cached per callsite across dispatcher changes; force a
        // per-event `enabled` check so muting stays scoped.
        Interest::sometimes()
    }

    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        self.passes(metadata) && self.console.enabled(metadata)
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
        if self.passes(event.metadata()) {
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

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "test code can panic on errors")]

    use std::panic::{self, AssertUnwindSafe};

    use super::*;
    use crate::stream::{MemoizingStream, buffer_dispatch};

    fn console() -> (MemoizingStream, Dispatch) {
        let stream = MemoizingStream::new();
        let dispatch = buffer_dispatch(&stream);
        (stream, dispatch)
    }

    fn text_of(stream: &MemoizingStream) -> String {
        let mut bytes = Vec::new();
        stream.flush_to(&mut bytes).unwrap();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn drops_records_for_muted_targets() {
        let (stream, dispatch) = console();
        tracing::dispatcher::with_default(&dispatch, || {
            tracing::error!(target: "alpha::one", "before the scope");
            with_logging_muted_in(["alpha::one", "alpha::two"], || {
                tracing::error!(target: "alpha::one", "inside the scope");
                tracing::warn!(target: "alpha::two::child", "descendant inside the scope");
                tracing::error!(target: "beta", "unrelated target");
            });
            tracing::error!(target: "alpha::one", "after the scope");
        });

        let output = text_of(&stream);
        assert!(output.contains("before the scope"));
        assert!(!output.contains("inside the scope"));
        assert!(!output.contains("descendant inside the scope"));
        assert!(output.contains("unrelated target"));
        assert!(output.contains("after the scope"));
    }

    #[test]
    fn restores_the_dispatcher_when_the_block_panics() {
        let (stream, dispatch) = console();
        tracing::dispatcher::with_default(&dispatch, || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                with_logging_muted_in(["gamma"], || {
                    tracing::error!(target: "gamma", "swallowed");
                    panic!("boom");
                });
            }));
            assert!(outcome.is_err());
            tracing::error!(target: "gamma", "after the panic");
        });

        let output = text_of(&stream);
        assert!(!output.contains("swallowed"));
        assert!(output.contains("after the panic"));
    }

    #[test]
    fn propagates_the_block_value() {
        let value = with_logging_muted_in(["delta"], || 42);
        assert_eq!(value, 42);
    }

    #[test]
    fn partial_map_keeps_severe_enough_records() {
        let (stream, dispatch) = console();
        let map = TargetLevelMap::new().with("noisy", tracing::level_filters::LevelFilter::WARN);
        tracing::dispatcher::with_default(&dispatch, || {
            let _scope = mute_scope(map);
            tracing::info!(target: "noisy", "too verbose");
            tracing::error!(target: "noisy", "still important");
        });

        let output = text_of(&stream);
        assert!(!output.contains("too verbose"));
        assert!(output.contains("still important"));
    }

    #[test]
    fn nested_scopes_unwind_in_order() {
        let (stream, dispatch) = console();
        tracing::dispatcher::with_default(&dispatch, || {
            with_logging_muted_in(["outer"], || {
                with_logging_muted_in(["inner"], || {
                    tracing::error!(target: "outer", "muted by outer");
                    tracing::error!(target: "inner", "muted by inner");
                });
                tracing::error!(target: "inner", "inner unmuted");
            });
            tracing::error!(target: "outer", "outer unmuted");
        });

        let output = text_of(&stream);
        assert!(!output.contains("muted by outer"));
        assert!(!output.contains("muted by inner"));
        assert!(output.contains("inner unmuted"));
        assert!(output.contains("outer unmuted"));
    }
}
