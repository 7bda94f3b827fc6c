//! Notification sink implementations.

mod log;
mod recording;
mod smtp;

pub use log::LogSink;
pub use recording::RecordingSink;
pub use smtp::{SmtpConfig, SmtpSink};
