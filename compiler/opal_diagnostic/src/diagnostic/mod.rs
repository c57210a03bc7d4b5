//! Core diagnostic types.
//!
//! Defines [`Diagnostic`], [`Label`] and [`Severity`], plus one constructor
//! function per error the builders report.

use opal_ir::Span;
use std::fmt;

use crate::ErrorCode;

/// Severity level for diagnostics.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Severity {
    Error,
    Warning,
    Note,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Note => write!(f, "note"),
        }
    }
}

/// A labeled span with a message.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct Label {
    pub span: Span,
    pub message: String,
    /// Whether this is the primary error location.
    pub is_primary: bool,
}

impl Label {
    /// Create a primary label (the main error location).
    pub fn primary(span: Span, message: impl Into<String>) -> Self {
        Label {
            span,
            message: message.into(),
            is_primary: true,
        }
    }

    /// Create a secondary label (related context).
    pub fn secondary(span: Span, message: impl Into<String>) -> Self {
        Label {
            span,
            message: message.into(),
            is_primary: false,
        }
    }
}

/// A diagnostic record: code, message and the spans it points at.
///
/// The primary label's span is the diagnostic's location. Builders also use
/// it to decide which operations the error invalidates.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
#[must_use = "diagnostics should be reported or returned, not silently dropped"]
pub struct Diagnostic {
    pub code: ErrorCode,
    pub severity: Severity,
    pub message: String,
    pub labels: Vec<Label>,
    /// Additional notes providing context.
    pub notes: Vec<String>,
    /// Restates an earlier failure: an operand or type involved is already
    /// the error type.
    pub follow_on: bool,
}

impl Diagnostic {
    fn new_with_severity(code: ErrorCode, severity: Severity) -> Self {
        Diagnostic {
            code,
            severity,
            message: String::new(),
            labels: Vec::new(),
            notes: Vec::new(),
            follow_on: false,
        }
    }

    /// Create a new error diagnostic.
    #[cold]
    pub fn error(code: ErrorCode) -> Self {
        Self::new_with_severity(code, Severity::Error)
    }

    /// Create a new warning diagnostic.
    #[cold]
    pub fn warning(code: ErrorCode) -> Self {
        Self::new_with_severity(code, Severity::Warning)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add a primary label at the error location.
    pub fn with_label(mut self, span: Span, message: impl Into<String>) -> Self {
        self.labels.push(Label::primary(span, message));
        self
    }

    /// Add a secondary label for context.
    pub fn with_secondary_label(mut self, span: Span, message: impl Into<String>) -> Self {
        self.labels.push(Label::secondary(span, message));
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Mark this diagnostic as a consequence of an earlier error.
    pub fn as_follow_on(mut self) -> Self {
        self.follow_on = true;
        self
    }

    /// Get the primary span (first primary label's span).
    pub fn primary_span(&self) -> Option<Span> {
        self.labels.iter().find(|l| l.is_primary).map(|l| l.span)
    }

    /// Check if this is an error (vs warning/note).
    pub fn is_error(&self) -> bool {
        matches!(self.severity, Severity::Error)
    }

    /// One-line rendering: `(12,9): error CS0847: message`.
    ///
    /// Line and column are 1-based and computed from `source`.
    pub fn to_line(&self, source: &str) -> String {
        let (line, col) = self
            .primary_span()
            .map_or((1, 1), |span| line_col(source, span.start));
        format!(
            "({line},{col}): {} {}: {}",
            self.severity, self.code, self.message
        )
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.severity, self.code, self.message)?;

        for label in &self.labels {
            let marker = if label.is_primary { "-->" } else { "   " };
            write!(f, "\n  {} {:?}: {}", marker, label.span, label.message)?;
        }

        for note in &self.notes {
            write!(f, "\n  = note: {note}")?;
        }

        Ok(())
    }
}

/// 1-based line and column of a byte offset. Offsets past the end clamp to it.
pub(crate) fn line_col(source: &str, offset: u32) -> (u32, u32) {
    let offset = (offset as usize).min(source.len());
    let before = source.get(..offset).unwrap_or(source);
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    let col = before[line_start..].chars().count() + 1;
    (
        u32::try_from(line).unwrap_or(u32::MAX),
        u32::try_from(col).unwrap_or(u32::MAX),
    )
}

// ── Binding errors ──────────────────────────────────────────────────

/// CS0029: no implicit conversion between the two types.
pub fn cannot_convert(span: Span, from: &str, to: &str) -> Diagnostic {
    Diagnostic::error(ErrorCode::CS0029)
        .with_message(format!("Cannot implicitly convert type '{from}' to '{to}'"))
        .with_label(span, format!("expected '{to}'"))
}

/// CS0121: two applicable overloads, neither better.
pub fn ambiguous_call(span: Span, first: &str, second: &str) -> Diagnostic {
    Diagnostic::error(ErrorCode::CS0121)
        .with_message(format!(
            "The call is ambiguous between the following methods or properties: '{first}' and '{second}'"
        ))
        .with_label(span, "ambiguous call")
}

/// CS0150: a dimension size paired with an initializer must be constant.
pub fn constant_expected(span: Span) -> Diagnostic {
    Diagnostic::error(ErrorCode::CS0150)
        .with_message("A constant value is expected")
        .with_label(span, "not a constant")
}

/// CS0417: `with(...)` arguments on a type-parameter target.
pub fn type_parameter_with_arguments(span: Span, type_param: &str) -> Diagnostic {
    Diagnostic::error(ErrorCode::CS0417)
        .with_message(format!(
            "'{type_param}': cannot provide arguments when creating an instance of a variable type"
        ))
        .with_label(span, "arguments not allowed here")
}

/// CS0623: a brace initializer where no array type gives it a shape.
pub fn misplaced_array_initializer(span: Span) -> Diagnostic {
    Diagnostic::error(ErrorCode::CS0623)
        .with_message(
            "Array initializers can only be used in a variable or field initializer. Try using a new expression instead.",
        )
        .with_label(span, "initializer not allowed here")
}

/// CS0846: a value where a multi-dimensional initializer needs a nested `{ ... }`.
pub fn nested_initializer_expected(span: Span) -> Diagnostic {
    Diagnostic::error(ErrorCode::CS0846)
        .with_message("A nested array initializer is expected")
        .with_label(span, "expected '{ ... }'")
}

/// CS0847: initializer length does not match the declared size.
pub fn array_length_mismatch(span: Span, expected: u64) -> Diagnostic {
    Diagnostic::error(ErrorCode::CS0847)
        .with_message(format!(
            "An array initializer of length '{expected}' is expected"
        ))
        .with_label(span, format!("expected {expected} elements"))
}

/// CS1501: no overload of `method` takes `count` arguments.
pub fn method_arity_mismatch(span: Span, method: &str, count: usize) -> Diagnostic {
    Diagnostic::error(ErrorCode::CS1501)
        .with_message(format!(
            "No overload for method '{method}' takes {count} arguments"
        ))
        .with_label(span, "no matching overload")
}

/// CS1503: argument `index` (1-based) does not convert to its parameter.
pub fn argument_mismatch(span: Span, index: usize, from: &str, to: &str) -> Diagnostic {
    Diagnostic::error(ErrorCode::CS1503)
        .with_message(format!(
            "Argument {index}: cannot convert from '{from}' to '{to}'"
        ))
        .with_label(span, format!("expected '{to}'"))
}

/// CS1586: `new T[]` with neither sizes nor initializer.
pub fn missing_array_size(span: Span) -> Diagnostic {
    Diagnostic::error(ErrorCode::CS1586)
        .with_message("Array creation must have array size or array initializer")
        .with_label(span, "missing size")
}

/// CS1729: no constructor of `ty` takes `count` arguments.
pub fn constructor_arity_mismatch(span: Span, ty: &str, count: usize) -> Diagnostic {
    Diagnostic::error(ErrorCode::CS1729)
        .with_message(format!(
            "'{ty}' does not contain a constructor that takes {count} arguments"
        ))
        .with_label(span, "no matching constructor")
}

/// CS1739: named argument matches no parameter of the best overload.
pub fn unknown_named_argument(span: Span, method: &str, name: &str) -> Diagnostic {
    Diagnostic::error(ErrorCode::CS1739)
        .with_message(format!(
            "The best overload for '{method}' does not have a parameter named '{name}'"
        ))
        .with_label(span, "unknown parameter")
}

/// CS9174: a collection literal converted to a type it cannot construct.
pub fn collection_not_constructible(span: Span, ty: &str) -> Diagnostic {
    Diagnostic::error(ErrorCode::CS9174)
        .with_message(format!(
            "Cannot initialize type '{ty}' with a collection expression because the type is not constructible."
        ))
        .with_label(span, "not a collection type")
}

/// CS9401: `with(...)` on a target that has no call site to bind it to.
pub fn with_not_supported(span: Span, ty: &str) -> Diagnostic {
    Diagnostic::error(ErrorCode::CS9401)
        .with_message(format!(
            "'with(...)' elements are not supported for type '{ty}'"
        ))
        .with_label(span, "not supported here")
}

/// CS9403: non-empty `with(...)` on a read-only interface target.
pub fn read_only_with_arguments(span: Span) -> Diagnostic {
    Diagnostic::error(ErrorCode::CS9403)
        .with_message("'with(...)' element for a read-only interface must be empty if present")
        .with_label(span, "must be empty")
}

/// CS9405: no builder factory overload takes `count` `with(...)` arguments.
pub fn builder_arity_mismatch(span: Span, method: &str, count: usize) -> Diagnostic {
    Diagnostic::error(ErrorCode::CS9405)
        .with_message(format!(
            "No overload for method '{method}' takes {count} 'with(...)' element arguments"
        ))
        .with_label(span, "no matching factory overload")
}

// ── Flow errors ─────────────────────────────────────────────────────

/// CS0139: `break` or `continue` with no enclosing loop.
pub fn break_outside_loop(span: Span) -> Diagnostic {
    Diagnostic::error(ErrorCode::CS0139)
        .with_message("No enclosing loop out of which to break or continue")
        .with_label(span, "no enclosing loop")
}

/// CS0140: a label declared twice in one body.
pub fn duplicate_label(span: Span, label: &str) -> Diagnostic {
    Diagnostic::error(ErrorCode::CS0140)
        .with_message(format!("The label '{label}' is a duplicate"))
        .with_label(span, "duplicate label")
}

/// CS0157: a jump out of a finally clause.
pub fn leave_finally(span: Span) -> Diagnostic {
    Diagnostic::error(ErrorCode::CS0157)
        .with_message("Control cannot leave the body of a finally clause")
        .with_label(span, "leaves the finally clause")
}

/// CS0159: `goto` to a label not in scope.
pub fn undeclared_label(span: Span, label: &str) -> Diagnostic {
    Diagnostic::error(ErrorCode::CS0159)
        .with_message(format!(
            "No such label '{label}' within the scope of the goto statement"
        ))
        .with_label(span, "label not found")
}

// ── Internal errors ─────────────────────────────────────────────────

/// E9001: a builder invariant was violated.
pub fn internal_error(span: Span, detail: &str) -> Diagnostic {
    Diagnostic::error(ErrorCode::E9001)
        .with_message(format!("internal error: {detail}"))
        .with_label(span, "while building this")
        .with_note("this is a bug in the compiler core")
}
