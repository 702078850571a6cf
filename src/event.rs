//! Crash event types delivered by the host runtime.
//!
//! Exception payloads are a closed set of kinds so the capture filter can be
//! audited: see [`ExceptionKindPolicy`] for which kinds reach the log writer.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Prefix written before every stack frame in a log file.
pub const FRAME_PREFIX: &str = "  at ";

/// Severity of a message delivered on the host's log channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSeverity {
    Error,
    Assert,
    Warning,
    Log,
    Exception,
}

impl LogSeverity {
    /// Returns true for the severities that are persisted as crash logs.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LogSeverity::Assert | LogSeverity::Exception)
    }
}

/// Fields carried by an exception object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExceptionInfo {
    /// Name of the component that raised the exception
    pub source: Option<String>,
    /// Raw, newline-separated stack trace
    pub stack_trace: Option<String>,
}

/// What the host actually threw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExceptionPayload {
    /// The generic base exception kind.
    Base(ExceptionInfo),
    /// A subclass of the base exception kind.
    Derived { type_name: String, info: ExceptionInfo },
    /// A thrown value that is not an exception at all.
    Foreign { type_name: String },
}

impl ExceptionPayload {
    /// Name of the payload's kind, for logging.
    pub fn type_name(&self) -> &str {
        match self {
            ExceptionPayload::Base(_) => "Exception",
            ExceptionPayload::Derived { type_name, .. } => type_name,
            ExceptionPayload::Foreign { type_name } => type_name,
        }
    }
}

/// Unhandled-exception notification as delivered by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnhandledException {
    pub payload: Option<ExceptionPayload>,
}

impl UnhandledException {
    pub fn new(payload: ExceptionPayload) -> Self {
        Self {
            payload: Some(payload),
        }
    }
}

/// Which exception kinds the capture component accepts.
///
/// `BaseOnly` keeps the historical behavior of dropping subclassed
/// exceptions. `AnyException` accepts every exception kind.
/// Foreign payloads are dropped under both policies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionKindPolicy {
    #[default]
    BaseOnly,
    AnyException,
}

impl ExceptionKindPolicy {
    /// Returns the exception fields when the payload is accepted.
    pub fn accept<'a>(&self, payload: &'a ExceptionPayload) -> Option<&'a ExceptionInfo> {
        match (self, payload) {
            (_, ExceptionPayload::Base(info)) => Some(info),
            (ExceptionKindPolicy::AnyException, ExceptionPayload::Derived { info, .. }) => {
                Some(info)
            }
            (ExceptionKindPolicy::BaseOnly, ExceptionPayload::Derived { .. }) => None,
            (_, ExceptionPayload::Foreign { .. }) => None,
        }
    }
}

/// A crash ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrashEvent {
    /// Single-line message
    pub message: String,
    /// Non-empty stack frames, in order
    pub stack_trace_lines: Vec<String>,
    /// When the crash was observed
    pub timestamp: DateTime<Local>,
}

impl CrashEvent {
    /// Creates an event, flattening the message onto one line and dropping
    /// empty stack frames.
    pub fn new(message: &str, stack_trace: &str, timestamp: DateTime<Local>) -> Self {
        Self {
            message: message.replace('\n', " "),
            stack_trace_lines: stack_trace
                .split('\n')
                .filter(|line| !line.is_empty())
                .map(String::from)
                .collect(),
            timestamp,
        }
    }

    /// Renders the log body: a blank line, the message, then one line per frame.
    pub fn body(&self) -> String {
        let mut body = format!("\n{}\n", self.message);
        for line in &self.stack_trace_lines {
            body.push_str(FRAME_PREFIX);
            body.push_str(line);
            body.push('\n');
        }
        body
    }
}
