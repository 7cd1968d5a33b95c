//! Error capture.
//!
//! Failures that should page someone (fatal consumer errors, undelivered
//! messages) are handed to an [`ErrorReporter`] in addition to being logged.
//! Deployments plug in their crash-reporting service; the default does
//! nothing.

use std::error::Error as StdError;

/// Tags attached to every captured error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorTags {
    /// Version of the reporting crate
    pub version: &'static str,
    /// Which extension captured the error (`kafka-consumer`, `kafka-producer`)
    pub extension: &'static str,
}

/// Destination for captured errors.
pub trait ErrorReporter: Send + Sync {
    fn capture(&self, error: &(dyn StdError + 'static), tags: ErrorTags);
}

/// Reporter that drops every error.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl ErrorReporter for NullReporter {
    fn capture(&self, _error: &(dyn StdError + 'static), _tags: ErrorTags) {}
}

/// Reporter that emits captured errors as `tracing` events on the
/// `error_capture` target, for log pipelines that alert on that target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn capture(&self, error: &(dyn StdError + 'static), tags: ErrorTags) {
        tracing::error!(
            target: "error_capture",
            version = tags.version,
            extension = tags.extension,
            "{error}"
        );
    }
}
