use anyhow::Result;
use console_tap::tap_console;
use rstest::rstest;
use testsuite::{console_lock, random_string, random_string_with};
use tracing::Level;
use tracing_mute::MutingLoggerTap;

const TARGET: &str = "suite::tap";

fn log_at(level: Level, message: &str) {
    match level {
        Level::TRACE => tracing::event!(target: "suite::tap", Level::TRACE, "{message}"),
        Level::DEBUG => tracing::event!(target: "suite::tap", Level::DEBUG, "{message}"),
        Level::INFO => tracing::event!(target: "suite::tap", Level::INFO, "{message}"),
        Level::WARN => tracing::event!(target: "suite::tap", Level::WARN, "{message}"),
        Level::ERROR => tracing::event!(target: "suite::tap", Level::ERROR, "{message}"),
    }
}

#[rstest]
#[case::regular(Level::INFO)]
#[case::error(Level::ERROR)]
fn does_not_intercept_when_not_installed(#[case] level: Level) {
    let _guard = console_lock();

    let expected = random_string_with("Non interception. ");
    let output = tap_console(|| log_at(level, &expected));
    assert!(output.contains(&expected));
}

#[rstest]
#[case::regular(Level::INFO)]
#[case::error(Level::ERROR)]
fn intercepts_when_installed(#[case] level: Level) {
    let _guard = console_lock();

    let mut tap = MutingLoggerTap::new(TARGET);
    let message = random_string_with("Interception. ");
    let output = tap_console(|| {
        tap.install().unwrap();
        log_at(level, &message);
        tap.remove().unwrap();
    });
    assert!(!output.contains(&message));
}

#[test]
fn redirects_into_the_memoizing_stream() {
    let _guard = console_lock();

    let mut tap = MutingLoggerTap::new(TARGET);
    tap.install().unwrap();
    assert_eq!(tap.stream_size(), 0);

    let message = random_string();
    log_at(Level::INFO, &message);
    assert!(tap.stream_size() >= message.len());

    tap.remove().unwrap();
    assert_eq!(tap.stream_size(), 0);
}

#[test]
fn flushes_accumulated_output_of_interleaved_calls() -> Result<()> {
    let _guard = console_lock();

    let mut tap = MutingLoggerTap::new(TARGET);
    tap.install().unwrap();

    let log_message = random_string_with("Log flushing. ");
    log_at(Level::INFO, &log_message);
    let error_message = random_string_with("Error flushing. ");
    log_at(Level::ERROR, &error_message);

    let mut sink = Vec::new();
    tap.flush_to(&mut sink)?;
    let flushed = String::from_utf8(sink)?;

    // Full content, once each, in order.
    assert_eq!(flushed.matches(&log_message).count(), 1);
    assert_eq!(flushed.matches(&error_message).count(), 1);
    let log_at_index = flushed.find(&log_message).unwrap();
    let error_at_index = flushed.find(&error_message).unwrap();
    assert!(log_at_index < error_at_index);

    // Flushing does not clear the buffer or change the installed state.
    let size_before = tap.stream_size();
    let mut sink = Vec::new();
    tap.flush_to(&mut sink)?;
    assert_eq!(tap.stream_size(), size_before);
    assert!(tap.is_installed());

    tap.remove().unwrap();
    Ok(())
}

#[test]
fn logging_reaches_the_console_again_after_removal() {
    let _guard = console_lock();

    let mut tap = MutingLoggerTap::new(TARGET);
    tap.install().unwrap();
    let swallowed = random_string_with("Swallowed. ");
    log_at(Level::INFO, &swallowed);
    tap.remove().unwrap();

    let audible = random_string_with("Audible. ");
    let output = tap_console(|| log_at(Level::INFO, &audible));
    assert!(!output.contains(&swallowed));
    assert!(output.contains(&audible));
}
