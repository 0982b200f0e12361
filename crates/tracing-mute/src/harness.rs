use std::io;
use std::panic::{self, AssertUnwindSafe};

use crate::tap::MutingLoggerTap;

/// Buffers all logging for one test invocation, surfacing it only on failure.
///
/// Explicit composition replaces lifecycle-hook discovery: the caller arms the
/// harness before the test, runs the test, and reports the outcome through
/// [`MuteLogging::finish`]. Buffered output is printed to the standard error
/// stream only when the test failed; output of a passing test is discarded on
/// purpose, to keep suite output quiet.
///
/// ```
/// use tracing_mute::MuteLogging;
///
/// let harness = MuteLogging::arm();
/// tracing::error!("noise the suite should not see");
/// harness.finish(false).unwrap();
/// ```
pub struct MuteLogging {
    tap: MutingLoggerTap,
}

impl MuteLogging {
    /// Installs a tap over every target of the current thread.
    pub fn arm() -> Self {
        let mut tap = MutingLoggerTap::new("");
        tap.install().expect("a fresh tap cannot be installed already");
        Self { tap }
    }

    /// Bytes buffered since arming.
    pub fn buffered(&self) -> usize {
        self.tap.stream_size()
    }

    /// Reports the test outcome and disarms.
    ///
    /// A failed test first gets the buffered output flushed to standard error.
    ///
    /// # Errors
    ///
    /// Returns the flush I/O error, if any. The tap is removed either way.
    pub fn finish(self, failed: bool) -> io::Result<()> {
        self.finish_into(failed, &mut io::stderr())
    }

    /// Like [`MuteLogging::finish`], flushing into an explicit sink.
    ///
    /// # Errors
    ///
    /// Returns the flush I/O error, if any. The tap is removed either way.
    pub fn finish_into<W: io::Write>(mut self, failed: bool, sink: &mut W) -> io::Result<()> {
        let flushed = if failed {
            self.tap.flush_to(sink)
        } else {
            Ok(())
        };
        self.tap
            .remove()
            .expect("an armed harness owns an installed tap");
        flushed
    }
}

/// Runs `test` with all logging buffered.
///
/// When `test` panics, the buffered output is flushed to standard error and
/// the panic resumes; when it returns, the buffer is discarded and the value
/// is passed through.
pub fn run_muted<F, R>(test: F) -> R
where
    F: FnOnce() -> R,
{
    let harness = MuteLogging::arm();
    match panic::catch_unwind(AssertUnwindSafe(test)) {
        Ok(value) => {
            let _ = harness.finish(false);
            value
        }
        Err(cause) => {
            let _ = harness.finish(true);
            panic::resume_unwind(cause);
        }
    }
}
