//! Status reporting.
//!
//! Every report is mirrored as a `tracing` event and, when it clears the
//! report threshold, handed to the user callback. Reports at or above the
//! error threshold bump the error counter that gates the validation pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusLevel {
    Info,
    Progress,
    Warning,
    Error,
}

impl fmt::Display for StatusLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StatusLevel::Info => "info",
            StatusLevel::Progress => "progress",
            StatusLevel::Warning => "warning",
            StatusLevel::Error => "error",
        };
        f.write_str(label)
    }
}

pub type StatusCallback = Box<dyn FnMut(StatusLevel, &str, &str)>;

/// One report that cleared the report threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEvent {
    pub level: StatusLevel,
    pub message: String,
    pub path: String,
}

pub struct StatusReporter {
    callback: Option<StatusCallback>,
    pub report_at: StatusLevel,
    pub error_at: StatusLevel,
    error_count: usize,
    events: Vec<StatusEvent>,
}

impl Default for StatusReporter {
    fn default() -> Self {
        Self::new(StatusLevel::Info, StatusLevel::Error)
    }
}

impl fmt::Debug for StatusReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusReporter")
            .field("report_at", &self.report_at)
            .field("error_at", &self.error_at)
            .field("error_count", &self.error_count)
            .field("events", &self.events.len())
            .finish()
    }
}

impl StatusReporter {
    pub fn new(report_at: StatusLevel, error_at: StatusLevel) -> Self {
        Self {
            callback: None,
            report_at,
            error_at,
            error_count: 0,
            events: Vec::new(),
        }
    }

    pub fn set_callback(&mut self, callback: StatusCallback) {
        self.callback = Some(callback);
    }

    pub fn report(&mut self, level: StatusLevel, message: &str, path: &str) {
        match level {
            StatusLevel::Info => tracing::debug!(path = %path, "{message}"),
            StatusLevel::Progress => tracing::info!(path = %path, "{message}"),
            StatusLevel::Warning => tracing::warn!(path = %path, "{message}"),
            StatusLevel::Error => tracing::error!(path = %path, "{message}"),
        }

        if level >= self.error_at {
            self.error_count += 1;
        }
        if level < self.report_at {
            return;
        }
        self.events.push(StatusEvent {
            level,
            message: message.to_string(),
            path: path.to_string(),
        });
        if let Some(callback) = self.callback.as_mut() {
            callback(level, message, path);
        }
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn reset_error_count(&mut self) {
        self.error_count = 0;
    }

    pub fn events(&self) -> &[StatusEvent] {
        &self.events
    }

    pub fn events_at(&self, level: StatusLevel) -> impl Iterator<Item = &StatusEvent> {
        self.events.iter().filter(move |e| e.level == level)
    }

    /// Take the recorded events, leaving the log empty. The error counter is
    /// untouched.
    pub fn drain_events(&mut self) -> Vec<StatusEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn thresholds_gate_callback_and_error_count() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut reporter = StatusReporter::new(StatusLevel::Warning, StatusLevel::Warning);
        reporter.set_callback(Box::new(move |level, msg, _| {
            sink.borrow_mut().push((level, msg.to_string()));
        }));

        reporter.report(StatusLevel::Info, "quiet", "/a");
        reporter.report(StatusLevel::Warning, "loud", "/a");
        reporter.report(StatusLevel::Error, "louder", "/b");

        assert_eq!(reporter.error_count(), 2);
        assert_eq!(seen.borrow().len(), 2);
        assert_eq!(reporter.events().len(), 2);
        assert_eq!(reporter.events_at(StatusLevel::Error).count(), 1);
    }

    #[test]
    fn draining_empties_the_log_but_keeps_the_count() {
        let mut reporter = StatusReporter::default();
        reporter.report(StatusLevel::Error, "first", "/a");
        reporter.report(StatusLevel::Warning, "second", "/a");

        let drained = reporter.drain_events();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].message, "first");
        assert!(reporter.events().is_empty());
        assert_eq!(reporter.error_count(), 1);

        reporter.report(StatusLevel::Info, "third", "/b");
        assert_eq!(reporter.events().len(), 1);
    }
}
