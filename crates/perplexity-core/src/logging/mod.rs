//! Logging abstractions for runtime-agnostic logging

mod traits;
mod noop;
mod console;
mod redact;
pub mod file_logger;

pub use traits::{Logger, SharedLogger};
pub use noop::NoOpLogger;
pub use console::ConsoleLogger;
pub use redact::{redact, describe_key};

pub use file_logger::{FileLogger, LogLevel, log_file_path, clear_log};
