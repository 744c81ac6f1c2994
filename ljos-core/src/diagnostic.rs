//! Diagnostics reported by every compiler stage.
//!
//! Diagnostics are plain values: stages push them onto a list and keep
//! going. Nothing in the pipeline mutates a diagnostic after creating it.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::span::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: Option<&'static str>,
    pub message: String,
    pub span: Span,
    pub file: Option<PathBuf>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>, span: Span) -> Self {
        Diagnostic {
            severity: Severity::Error,
            code: None,
            message: message.into(),
            span,
            file: None,
        }
    }

    pub fn warning(message: impl Into<String>, span: Span) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            code: None,
            message: message.into(),
            span,
            file: None,
        }
    }

    pub fn with_code(mut self, code: &'static str) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_file(mut self, file: impl AsRef<Path>) -> Self {
        self.file = Some(file.as_ref().to_path_buf());
        self
    }

    /// Same diagnostic, reported as a warning.
    pub fn demoted(mut self) -> Self {
        self.severity = Severity::Warning;
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// 1-based line.
    pub fn line(&self) -> u32 {
        self.span.line
    }

    /// 1-based column.
    pub fn column(&self) -> u32 {
        self.span.column
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(file) = &self.file {
            write!(f, "{}:", file.display())?;
        }
        let label = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}:{}: {label}", self.span.line, self.span.column)?;
        if let Some(code) = self.code {
            write!(f, "[{code}]")?;
        }
        write!(f, ": {}", self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_editor_style_location() {
        let diag = Diagnostic::error("undefined identifier 'x'", Span::new(0, 1, 3, 7))
            .with_code("E0201")
            .with_file("src/main.lj");
        assert_eq!(
            diag.to_string(),
            "src/main.lj:3:7: error[E0201]: undefined identifier 'x'"
        );
    }

    #[test]
    fn demotion_keeps_code_and_message() {
        let diag = Diagnostic::error("bad", Span::default()).with_code("E0203").demoted();
        assert!(!diag.is_error());
        assert_eq!(diag.code, Some("E0203"));
    }
}
