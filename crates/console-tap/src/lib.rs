//! Console tap for tests.
//!
//! [`install`] replaces the process-global default subscriber with one that
//! formats into a shared in-memory buffer, and [`tap_console`] returns exactly
//! the "console" bytes a block produced. Tests can then assert what did (or
//! did not) reach the console without touching real standard streams.
//!
//! The buffer is process-wide; tests inspecting it must run serialized.

use std::io;
use std::io::Write as _;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

/// The process-wide console buffer.
#[derive(Clone, Default)]
struct ConsoleBuffer(Arc<Mutex<Vec<u8>>>);

impl ConsoleBuffer {
    fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        self.0.lock().expect("poisoned")
    }
}

impl io::Write for ConsoleBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.lock().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn buffer() -> &'static ConsoleBuffer {
    static BUFFER: OnceLock<ConsoleBuffer> = OnceLock::new();
    BUFFER.get_or_init(ConsoleBuffer::default)
}

/// Installs the buffered console as the process-global default subscriber.
///
/// Idempotent: later calls (and a pre-existing global default) leave the
/// first installation in place.
pub fn install() {
    let writer = buffer().clone();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .without_time()
        .with_max_level(tracing::Level::TRACE)
        .with_writer(move || writer.clone())
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Runs `block` and returns exactly the console output it produced.
///
/// The buffer is left intact, so nested and outer taps observe the same
/// bytes. Installs the buffered console on first use.
pub fn tap_console(block: impl FnOnce()) -> String {
    install();
    let start = buffer().lock().len();
    block();
    let bytes = buffer().lock();
    String::from_utf8_lossy(&bytes[start..]).into_owned()
}
