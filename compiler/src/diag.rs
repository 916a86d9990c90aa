// diag.rs — Unified diagnostics model
//
// Shared diagnostic types used to report every failure the crate produces:
// layout syntax errors, program validation errors, device incompatibilities,
// compile errors. Errors in `error.rs` convert into a `Diagnostic` for display.
//
// Preconditions: none (types only).
// Postconditions: none (types only).
// Failure modes: none.
// Side effects: none.

use std::fmt;

use crate::layout::Span;

// ── Diagnostic code ──────────────────────────────────────────────────────

/// A stable diagnostic code (e.g., `E0101`, `E0302`).
///
/// Codes are `&'static str` constants defined in the `codes` module.
/// Once assigned, a code must never be reassigned to a different meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiagCode(pub &'static str);

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable codes, grouped by hundreds:
/// `E00xx` layout, `E01xx` program validation, `E02xx` compile,
/// `E03xx` device incompatibility, `E04xx` backend.
pub mod codes {
    use super::DiagCode;

    pub const LAYOUT_SYNTAX: DiagCode = DiagCode("E0001");
    pub const LAYOUT_RECORD: DiagCode = DiagCode("E0002");
    pub const LAYOUT_HEADER: DiagCode = DiagCode("E0003");
    pub const LAYOUT_UNKNOWN_GATE: DiagCode = DiagCode("E0004");

    pub const PROGRAM_LOCKED: DiagCode = DiagCode("E0101");
    pub const REGISTER_ARITY: DiagCode = DiagCode("E0102");
    pub const REGISTER_INVALID: DiagCode = DiagCode("E0103");
    pub const UNEQUAL_PARAMETER_LENGTHS: DiagCode = DiagCode("E0104");
    pub const NO_MEASUREMENTS: DiagCode = DiagCode("E0105");
    pub const SPATIAL_MODE_MISMATCH: DiagCode = DiagCode("E0106");
    pub const BATCHED_PROGRAMS: DiagCode = DiagCode("E0107");
    pub const UNKNOWN_PLACEHOLDER: DiagCode = DiagCode("E0108");
    pub const INVALID_MODES: DiagCode = DiagCode("E0109");

    pub const NOT_PASSIVE: DiagCode = DiagCode("E0201");
    pub const REGISTER_OUT_OF_RANGE: DiagCode = DiagCode("E0202");
    pub const SYMBOLIC_PARAMETER: DiagCode = DiagCode("E0203");
    pub const UNKNOWN_COMPILER: DiagCode = DiagCode("E0204");
    pub const UNSUPPORTED_OPERATION: DiagCode = DiagCode("E0205");
    pub const OPERATION_ARITY: DiagCode = DiagCode("E0206");
    pub const DUPLICATE_REGISTER: DiagCode = DiagCode("E0207");
    pub const PARAMETER_DOMAIN: DiagCode = DiagCode("E0208");

    pub const UNSUPPORTED_TARGET: DiagCode = DiagCode("E0301");
    pub const GATE_MISMATCH: DiagCode = DiagCode("E0302");
    pub const MODE_ORDERING: DiagCode = DiagCode("E0303");
    pub const PARAMETER_RANGE: DiagCode = DiagCode("E0304");
    pub const TEMPORAL_MODES: DiagCode = DiagCode("E0305");
    pub const CONCURRENT_MODES: DiagCode = DiagCode("E0306");
    pub const SPATIAL_MODES: DiagCode = DiagCode("E0307");

    pub const BACKEND: DiagCode = DiagCode("E0401");
}

// ── Severity level ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagLevel {
    Error,
    Warning,
}

// ── Diagnostic ───────────────────────────────────────────────────────────

/// A diagnostic emitted by any phase.
///
/// `span` is set only for diagnostics that point into layout text.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: Option<DiagCode>,
    pub level: DiagLevel,
    pub span: Option<Span>,
    pub message: String,
    pub hint: Option<String>,
}

impl Diagnostic {
    /// Create a new diagnostic with no code, span or hint.
    pub fn new(level: DiagLevel, message: impl Into<String>) -> Self {
        Self {
            code: None,
            level,
            span: None,
            message: message.into(),
            hint: None,
        }
    }

    /// Shorthand for an error-level diagnostic.
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(DiagLevel::Error, message)
    }

    /// Attach a stable diagnostic code.
    pub fn with_code(mut self, code: DiagCode) -> Self {
        self.code = Some(code);
        self
    }

    /// Attach a source span in the layout text.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Attach a remediation hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            DiagLevel::Error => "error",
            DiagLevel::Warning => "warning",
        };
        if let Some(code) = &self.code {
            write!(f, "{}[{}]: {}", level, code, self.message)?;
        } else {
            write!(f, "{}: {}", level, self.message)?;
        }
        if let Some(span) = &self.span {
            use chumsky::span::Span as _;
            write!(f, "\n  at: {}..{}", span.start(), span.end())?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\n  hint: {}", hint)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_span() -> Span {
        use chumsky::span::Span as _;
        Span::new((), 3..7)
    }

    #[test]
    fn display_without_code() {
        let d = Diagnostic::error("something failed");
        assert_eq!(format!("{d}"), "error: something failed");
    }

    #[test]
    fn display_with_code() {
        let d = Diagnostic::new(DiagLevel::Warning, "unused placeholder")
            .with_code(DiagCode("W0001"));
        assert_eq!(format!("{d}"), "warning[W0001]: unused placeholder");
    }

    #[test]
    fn display_with_span_and_hint() {
        let d = Diagnostic::error("unexpected token")
            .with_code(codes::LAYOUT_SYNTAX)
            .with_span(dummy_span())
            .with_hint("gate lines look like `Rgate(p0) | 0`");
        assert_eq!(
            format!("{d}"),
            "error[E0001]: unexpected token\n  at: 3..7\n  hint: gate lines look like `Rgate(p0) | 0`"
        );
    }

    #[test]
    fn codes_are_unique() {
        let all = [
            codes::LAYOUT_SYNTAX,
            codes::LAYOUT_RECORD,
            codes::LAYOUT_HEADER,
            codes::LAYOUT_UNKNOWN_GATE,
            codes::PROGRAM_LOCKED,
            codes::REGISTER_ARITY,
            codes::REGISTER_INVALID,
            codes::UNEQUAL_PARAMETER_LENGTHS,
            codes::NO_MEASUREMENTS,
            codes::SPATIAL_MODE_MISMATCH,
            codes::BATCHED_PROGRAMS,
            codes::UNKNOWN_PLACEHOLDER,
            codes::INVALID_MODES,
            codes::NOT_PASSIVE,
            codes::REGISTER_OUT_OF_RANGE,
            codes::SYMBOLIC_PARAMETER,
            codes::UNKNOWN_COMPILER,
            codes::UNSUPPORTED_OPERATION,
            codes::OPERATION_ARITY,
            codes::DUPLICATE_REGISTER,
            codes::PARAMETER_DOMAIN,
            codes::UNSUPPORTED_TARGET,
            codes::GATE_MISMATCH,
            codes::MODE_ORDERING,
            codes::PARAMETER_RANGE,
            codes::TEMPORAL_MODES,
            codes::CONCURRENT_MODES,
            codes::SPATIAL_MODES,
            codes::BACKEND,
        ];
        let unique: std::collections::HashSet<_> = all.iter().collect();
        assert_eq!(unique.len(), all.len());
    }
}
