//! Logging abstractions
//!
//! Components take a [`SharedLogger`] instead of calling a global logger, so
//! hosts and tests choose where messages go.

mod traits;
mod console;
mod memory;
mod tracing_logger;

use std::sync::Arc;

pub use traits::{Logger, NoOpLogger, SharedLogger};
pub use console::ConsoleLogger;
pub use memory::{LogLevel, MemoryLogger};
pub use tracing_logger::TracingLogger;

/// The logger used when a component is built without one
pub fn default_logger() -> SharedLogger {
    Arc::new(TracingLogger::new())
}
