//! Exception capture from host notifications.
//!
//! The host owns two notification channels: unhandled exceptions and log
//! messages. [`ExceptionCapture`] registers a handler on each through
//! [`NotificationHost`], filters for crash-class events and hands them to the
//! [`LogWriter`]. Handlers are removed again on [`disable`](ExceptionCapture::disable)
//! and on drop.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::event::{ExceptionKindPolicy, LogSeverity, UnhandledException};
use crate::writer::{LogWriter, WriteError};

/// What a handler hands back to the host: the log written, if any.
pub type CaptureResult = Result<Option<PathBuf>, WriteError>;

/// Handler for the unhandled-exception channel.
pub type ExceptionHandler = Arc<dyn Fn(Option<&UnhandledException>) -> CaptureResult + Send + Sync>;

/// Handler for the log-message channel: message, stack trace, severity.
pub type LogHandler = Arc<dyn Fn(&str, &str, LogSeverity) -> CaptureResult + Send + Sync>;

/// Subscription surface supplied by the host runtime.
pub trait NotificationHost: Send + Sync {
    fn subscribe_exceptions(&self, handler: ExceptionHandler);
    fn unsubscribe_exceptions(&self);
    fn subscribe_log_messages(&self, handler: LogHandler);
    fn unsubscribe_log_messages(&self);
}

/// Turns host notifications into crash logs.
pub struct ExceptionCapture {
    host: Arc<dyn NotificationHost>,
    filter: Arc<CaptureFilter>,
    enabled: bool,
    registered: AtomicBool,
}

/// The filtering half of capture, shared with the registered handlers.
pub struct CaptureFilter {
    writer: LogWriter,
    kinds: ExceptionKindPolicy,
}

impl CaptureFilter {
    pub fn new(writer: LogWriter, kinds: ExceptionKindPolicy) -> Self {
        Self { writer, kinds }
    }

    /// Persists an unhandled exception if its payload kind is accepted.
    pub fn on_unhandled_exception(&self, exception: Option<&UnhandledException>) -> CaptureResult {
        let Some(payload) = exception.and_then(|e| e.payload.as_ref()) else {
            return Ok(None);
        };

        let Some(info) = self.kinds.accept(payload) else {
            tracing::debug!(
                kind = payload.type_name(),
                policy = ?self.kinds,
                "dropping unhandled exception"
            );
            return Ok(None);
        };

        let message = info.source.as_deref().unwrap_or_default();
        let stack_trace = info.stack_trace.as_deref().unwrap_or_default();
        self.writer.write(message, stack_trace).map(Some)
    }

    /// Persists a log message if it is an assertion failure or an exception.
    pub fn on_log_message(
        &self,
        message: &str,
        stack_trace: &str,
        severity: LogSeverity,
    ) -> CaptureResult {
        if !severity.is_fatal() {
            return Ok(None);
        }
        self.writer.write(message, stack_trace).map(Some)
    }
}

impl ExceptionCapture {
    /// Creates a capture component. Nothing is registered until
    /// [`enable`](Self::enable), and only if `enabled` is set.
    pub fn new(host: Arc<dyn NotificationHost>, filter: CaptureFilter, enabled: bool) -> Self {
        Self {
            host,
            filter: Arc::new(filter),
            enabled,
            registered: AtomicBool::new(false),
        }
    }

    pub fn filter(&self) -> &CaptureFilter {
        &self.filter
    }

    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::SeqCst)
    }

    /// Registers both handlers with the host. Idempotent.
    pub fn enable(&self) {
        if !self.enabled || self.registered.swap(true, Ordering::SeqCst) {
            return;
        }

        let filter = Arc::clone(&self.filter);
        self.host.subscribe_exceptions(Arc::new(move |exception: Option<&UnhandledException>| {
            filter.on_unhandled_exception(exception)
        }));

        let filter = Arc::clone(&self.filter);
        self.host.subscribe_log_messages(Arc::new(
            move |message: &str, stack_trace: &str, severity: LogSeverity| {
                filter.on_log_message(message, stack_trace, severity)
            },
        ));

        tracing::debug!("exception capture registered");
    }

    /// Removes both handlers from the host. Idempotent.
    pub fn disable(&self) {
        if !self.registered.swap(false, Ordering::SeqCst) {
            return;
        }
        self.host.unsubscribe_exceptions();
        self.host.unsubscribe_log_messages();
        tracing::debug!("exception capture unregistered");
    }
}

impl Drop for ExceptionCapture {
    fn drop(&mut self) {
        self.disable();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{ExceptionInfo, ExceptionPayload};
    use crate::platform::StaticPlatform;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Host holding at most one handler per channel, like a callback slot.
    #[derive(Default)]
    struct SlotHost {
        exceptions: Mutex<Option<ExceptionHandler>>,
        logs: Mutex<Option<LogHandler>>,
        subscriptions: Mutex<usize>,
    }

    impl SlotHost {
        fn raise(&self, exception: Option<&UnhandledException>) -> CaptureResult {
            let handler = self.exceptions.lock().unwrap().clone();
            match handler {
                Some(handler) => handler(exception),
                None => Ok(None),
            }
        }

        fn log(&self, message: &str, stack_trace: &str, severity: LogSeverity) -> CaptureResult {
            let handler = self.logs.lock().unwrap().clone();
            match handler {
                Some(handler) => handler(message, stack_trace, severity),
                None => Ok(None),
            }
        }
    }

    impl NotificationHost for SlotHost {
        fn subscribe_exceptions(&self, handler: ExceptionHandler) {
            *self.subscriptions.lock().unwrap() += 1;
            *self.exceptions.lock().unwrap() = Some(handler);
        }

        fn unsubscribe_exceptions(&self) {
            *self.exceptions.lock().unwrap() = None;
        }

        fn subscribe_log_messages(&self, handler: LogHandler) {
            *self.logs.lock().unwrap() = Some(handler);
        }

        fn unsubscribe_log_messages(&self) {
            *self.logs.lock().unwrap() = None;
        }
    }

    fn capture(
        host: Arc<SlotHost>,
        dir: &TempDir,
        kinds: ExceptionKindPolicy,
        enabled: bool,
    ) -> ExceptionCapture {
        let writer = LogWriter::new(dir.path(), "pkg", Arc::new(StaticPlatform::default()));
        ExceptionCapture::new(host, CaptureFilter::new(writer, kinds), enabled)
    }

    fn base(source: &str, stack: &str) -> UnhandledException {
        UnhandledException::new(ExceptionPayload::Base(ExceptionInfo {
            source: Some(source.into()),
            stack_trace: Some(stack.into()),
        }))
    }

    fn derived() -> UnhandledException {
        UnhandledException::new(ExceptionPayload::Derived {
            type_name: "NullReferenceException".into(),
            info: ExceptionInfo {
                source: Some("Assembly-CSharp".into()),
                stack_trace: Some("Player.Update()".into()),
            },
        })
    }

    #[test]
    fn base_exception_is_written() {
        let dir = TempDir::new().unwrap();
        let host = Arc::new(SlotHost::default());
        let capture = capture(host.clone(), &dir, ExceptionKindPolicy::BaseOnly, true);
        capture.enable();

        let path = host
            .raise(Some(&base("NullRef", "Foo.Bar()\n\nBaz.Qux()")))
            .unwrap()
            .unwrap();

        let contents = std::fs::read_to_string(path).unwrap();
        assert!(contents.contains("\nNullRef\n  at Foo.Bar()\n  at Baz.Qux()\n"));
        assert_eq!(contents.matches("  at ").count(), 2);
    }

    #[test]
    fn absent_payloads_are_ignored() {
        let dir = TempDir::new().unwrap();
        let host = Arc::new(SlotHost::default());
        let capture = capture(host.clone(), &dir, ExceptionKindPolicy::AnyException, true);
        capture.enable();

        assert!(host.raise(None).unwrap().is_none());
        assert!(host.raise(Some(&UnhandledException::default())).unwrap().is_none());
        let foreign = UnhandledException::new(ExceptionPayload::Foreign {
            type_name: "String".into(),
        });
        assert!(host.raise(Some(&foreign)).unwrap().is_none());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn derived_kind_follows_policy() {
        let dir = TempDir::new().unwrap();
        let strict =
            capture(Arc::new(SlotHost::default()), &dir, ExceptionKindPolicy::BaseOnly, true);
        assert!(strict.filter().on_unhandled_exception(Some(&derived())).unwrap().is_none());

        let lenient = capture(
            Arc::new(SlotHost::default()),
            &dir,
            ExceptionKindPolicy::AnyException,
            true,
        );
        let path = lenient.filter().on_unhandled_exception(Some(&derived())).unwrap().unwrap();
        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.contains("\nAssembly-CSharp\n  at Player.Update()\n"));
    }

    #[test]
    fn only_fatal_log_messages_are_written() {
        let dir = TempDir::new().unwrap();
        let host = Arc::new(SlotHost::default());
        let capture = capture(host.clone(), &dir, ExceptionKindPolicy::BaseOnly, true);
        capture.enable();

        for severity in [LogSeverity::Log, LogSeverity::Warning, LogSeverity::Error] {
            assert!(host.log("noise", "A()", severity).unwrap().is_none());
        }
        assert!(host.log("assert failed", "A()", LogSeverity::Assert).unwrap().is_some());
    }

    #[test]
    fn disabled_flag_registers_nothing() {
        let dir = TempDir::new().unwrap();
        let host = Arc::new(SlotHost::default());
        let capture = capture(host.clone(), &dir, ExceptionKindPolicy::BaseOnly, false);
        capture.enable();

        assert!(!capture.is_registered());
        assert!(host.exceptions.lock().unwrap().is_none());
        assert!(host.logs.lock().unwrap().is_none());
    }

    #[test]
    fn enable_is_idempotent_and_teardown_unregisters() {
        let dir = TempDir::new().unwrap();
        let host = Arc::new(SlotHost::default());
        let capture = capture(host.clone(), &dir, ExceptionKindPolicy::BaseOnly, true);

        capture.enable();
        capture.enable();
        assert_eq!(*host.subscriptions.lock().unwrap(), 1);

        drop(capture);
        assert!(host.exceptions.lock().unwrap().is_none());
        assert!(host.logs.lock().unwrap().is_none());
        assert!(host.raise(Some(&base("late", "X()"))).unwrap().is_none());
    }

    #[test]
    fn write_failure_reaches_the_host() {
        let dir = TempDir::new().unwrap();
        let writer = LogWriter::new(
            dir.path().join("missing"),
            "pkg",
            Arc::new(StaticPlatform::default()),
        );
        let filter = CaptureFilter::new(writer, ExceptionKindPolicy::BaseOnly);

        let result = filter.on_log_message("boom", "A()", LogSeverity::Exception);

        assert!(matches!(result, Err(WriteError::Io { .. })));
    }
}
