#![cfg_attr(doc, doc = include_str!("../README.md"))]

mod harness;
mod level_map;
mod mute;
mod stream;
mod tap;

pub use harness::{MuteLogging, run_muted};
pub use level_map::TargetLevelMap;
pub use mute::{MuteGuard, mute_scope, with_logging_muted_in};
pub use stream::MemoizingStream;
pub use tap::{MutingLoggerTap, TapError};
