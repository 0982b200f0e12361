use std::io;
use std::io::Write as _;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::Dispatch;

/// Shared in-memory sink for formatted log output.
///
/// Clones share the same buffer, so one clone can serve as the writer of a
/// subscriber while another inspects what was written.
#[derive(Clone, Debug, Default)]
pub struct MemoizingStream {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl MemoizingStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bytes accumulated so far.
    pub fn size(&self) -> usize {
        self.lock().len()
    }

    /// Copies the accumulated bytes into `sink` verbatim.
    ///
    /// The buffer is left intact; flushing twice writes the same bytes twice.
    ///
    /// # Errors
    ///
    /// Returns the sink's I/O error unchanged when the write is rejected.
    pub fn flush_to<W: io::Write>(&self, sink: &mut W) -> io::Result<()> {
        let bytes = self.lock();
        sink.write_all(&bytes)
    }

    /// Discards the accumulated bytes.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        self.bytes.lock().expect("poisoned")
    }
}

impl io::Write for MemoizingStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.lock().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Builds a dispatcher formatting events into `stream`.
///
/// ANSI escapes and timestamps are off so the buffered text stays inspectable.
pub(crate) fn buffer_dispatch(stream: &MemoizingStream) -> Dispatch {
    let writer = stream.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .without_time()
        .with_max_level(tracing::Level::TRACE)
        .with_writer(move || writer.clone())
        .finish();
    Dispatch::new(subscriber)
}
