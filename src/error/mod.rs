//! Diagnostics for tree building.
//!
//! The builder never panics and never aborts mid-event: every problem it
//! detects is routed through a single structured channel — a
//! [`BuildDiagnostic`] carrying a kind, a human-readable message and up to
//! two contextual string parameters. Diagnostics are collected into a `Vec`
//! owned by the build session; there are no process-wide error hooks.
//!
//! The kinds map onto distinct recovery policies (see `TreeBuilder`):
//! well-formedness errors latch the builder unless recovery is enabled,
//! validity errors clear the valid flag but never stop tree construction,
//! warnings are purely advisory, and resource errors latch the builder
//! unconditionally.

use std::fmt;

/// The category of a build diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// A fatal well-formedness violation (e.g., a declaration issued
    /// outside any DTD subset). Clears the well-formed flag.
    WellFormedness,
    /// A validity constraint violation (e.g., a duplicate ID). Clears the
    /// valid flag; tree construction continues.
    Validity,
    /// A namespace-scope problem (e.g., an undeclared prefix). Advisory.
    Namespace,
    /// A purely advisory report (e.g., a pedantic redefinition notice).
    Warning,
    /// A resource-limit failure (text-size overflow, nesting or fetch
    /// depth exceeded). Permanently disables the builder.
    Resource,
}

impl DiagnosticKind {
    /// Returns `true` for the kinds that halt structural progress when
    /// recovery is not enabled.
    #[must_use]
    pub fn is_fatal(self) -> bool {
        matches!(self, Self::WellFormedness | Self::Resource)
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WellFormedness => write!(f, "error"),
            Self::Validity => write!(f, "validity error"),
            Self::Namespace => write!(f, "namespace warning"),
            Self::Warning => write!(f, "warning"),
            Self::Resource => write!(f, "resource error"),
        }
    }
}

/// A single diagnostic emitted while assembling the tree.
#[derive(Debug, Clone)]
pub struct BuildDiagnostic {
    /// The category of this diagnostic.
    pub kind: DiagnosticKind,
    /// Human-readable message.
    pub message: String,
    /// First contextual parameter (typically a name or prefix), if any.
    pub info1: Option<String>,
    /// Second contextual parameter, if any.
    pub info2: Option<String>,
    /// Source line reported by the tokenizer when position tracking is on.
    pub line: Option<u32>,
}

impl BuildDiagnostic {
    pub(crate) fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            info1: None,
            info2: None,
            line: None,
        }
    }

    pub(crate) fn with_info(mut self, info1: Option<String>, info2: Option<String>) -> Self {
        self.info1 = info1;
        self.info2 = info2;
        self
    }
}

impl fmt::Display for BuildDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}: {} (line {})", self.kind, self.message, line),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for BuildDiagnostic {}
