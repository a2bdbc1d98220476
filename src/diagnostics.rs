//! Non-fatal findings. Reporting never fails and never changes output.

use std::{
    fmt,
    sync::{Arc, mpsc},
};

use parking_lot::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    SequenceResetUnavailable { reason: String },
    NonAbstractInterfaceMethod { class: String, method: String },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::SequenceResetUnavailable { reason } => write!(
                f,
                "could not reset the lambda name sequence ({reason}); synthesized class names may not start from 1"
            ),
            Diagnostic::NonAbstractInterfaceMethod { class, method } => {
                write!(f, "non-abstract method {method} on interface {class} is not supported")
            }
        }
    }
}

pub trait Diagnostics: Send + Sync {
    fn report(&self, diagnostic: Diagnostic);
}

/// Emits every diagnostic as a `tracing` warning.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn report(&self, diagnostic: Diagnostic) {
        tracing::warn!("{diagnostic}");
    }
}

/// Keeps every diagnostic for later inspection.
#[derive(Debug, Default)]
pub struct CollectedDiagnostics {
    diagnostics: Mutex<Vec<Diagnostic>>,
}

impl CollectedDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<Diagnostic> {
        self.diagnostics.lock().clone()
    }

    pub fn take(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.diagnostics.lock())
    }
}

impl Diagnostics for CollectedDiagnostics {
    fn report(&self, diagnostic: Diagnostic) {
        self.diagnostics.lock().push(diagnostic);
    }
}

impl<D: Diagnostics + ?Sized> Diagnostics for Arc<D> {
    fn report(&self, diagnostic: Diagnostic) {
        (**self).report(diagnostic);
    }
}

impl Diagnostics for mpsc::Sender<Diagnostic> {
    fn report(&self, diagnostic: Diagnostic) {
        // a dropped receiver just means nobody is listening
        let _ = self.send(diagnostic);
    }
}
