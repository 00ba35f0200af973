//! Message channel for compilation failures and warnings.
//!
//! The determinizer reports through a `Diagnostics` sink rather than
//! printing. `TracingSink` forwards to `tracing`; a `Vec<Diagnostic>`
//! collects messages, which is what tests use.

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
}

pub trait Diagnostics {
    fn error(&mut self, message: String);
    fn warning(&mut self, message: String);
}

/// Forwards diagnostics to `tracing` at error / warn level.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl Diagnostics for TracingSink {
    fn error(&mut self, message: String) {
        tracing::error!("{message}");
    }

    fn warning(&mut self, message: String) {
        tracing::warn!("{message}");
    }
}

impl Diagnostics for Vec<Diagnostic> {
    fn error(&mut self, message: String) {
        self.push(Diagnostic {
            severity: Severity::Error,
            message,
        });
    }

    fn warning(&mut self, message: String) {
        self.push(Diagnostic {
            severity: Severity::Warning,
            message,
        });
    }
}
