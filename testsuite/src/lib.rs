//! Helpers shared by the integration tests.

use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

/// Serializes tests that inspect the process-global console buffer.
///
/// Scoped mutes and taps are thread-local, but the console buffer they
/// delegate to is shared; concurrent tests would see each other's output.
pub fn console_lock() -> MutexGuard<'static, ()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(Mutex::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Random suffix so interleaved test output stays distinguishable.
pub fn random_string() -> String {
    format!("{:016x}", fastrand::u64(..))
}

/// Random message with the given prefix.
pub fn random_string_with(prefix: &str) -> String {
    format!("{prefix}{}", random_string())
}
