//! User-facing notifications
//!
//! The client layer announces failures (and the occasional success) through
//! a `Notifier`. How a notice is shown is up to the implementation: the CLI
//! prints to stderr, a GUI would raise a toast, tests record them.

/// Notifier trait
pub trait Notifier: Send + Sync {
    /// Show a notice
    fn notify(&self, notice: &Notice);
}

/// Notice severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Error,
}

impl Severity {
    /// Short label used in plain-text output
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Success => "ok",
            Severity::Error => "error",
        }
    }
}

/// A single notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub severity: Severity,
    pub message: String,
}

impl Notice {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Success,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            message: message.into(),
        }
    }
}

/// Notifier that emits tracing events.
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: &Notice) {
        match notice.severity {
            Severity::Error => tracing::warn!(message = %notice.message, "notification"),
            Severity::Info | Severity::Success => {
                tracing::info!(message = %notice.message, "notification")
            }
        }
    }
}

/// A no-op notifier used when notifications are disabled.
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _notice: &Notice) {}
}
