//! Diagnostics reported by the IR and flow-graph builders.
//!
//! Builders never fail on user errors. They recover locally, mark the
//! affected operations invalid and push a [`Diagnostic`] onto a side
//! channel that is returned together with the tree or graph:
//!
//! - [`ErrorCode`]: stable code for each error the core reports
//! - [`Diagnostic`]: code, message and labeled spans
//! - [`DiagnosticQueue`]: sorts, deduplicates and limits diagnostics for presentation
//!
//! The constructor functions (`array_length_mismatch`, `undeclared_label`, ...)
//! are the only place message text is written, so tests and builders agree
//! on wording.

mod diagnostic;
mod error_code;
pub mod queue;

pub use diagnostic::{
    ambiguous_call, argument_mismatch, array_length_mismatch, break_outside_loop,
    builder_arity_mismatch, cannot_convert, collection_not_constructible, constant_expected,
    constructor_arity_mismatch, duplicate_label, internal_error, leave_finally,
    method_arity_mismatch, misplaced_array_initializer, missing_array_size,
    nested_initializer_expected, read_only_with_arguments, type_parameter_with_arguments,
    undeclared_label, unknown_named_argument, with_not_supported, Diagnostic, Label, Severity,
};
pub use error_code::ErrorCode;
pub use queue::{DiagnosticConfig, DiagnosticQueue};
