//! Diagnostic queue for collecting, deduplicating, and sorting diagnostics.
//!
//! Features:
//! - Error limits to prevent overwhelming output
//! - Deduplication of identical code + location pairs
//! - Follow-on error filtering (errors mentioning the error type `?`)
//! - Source-order output

use rustc_hash::FxHashSet;

use opal_ir::Span;

use crate::{Diagnostic, ErrorCode};

/// Configuration for diagnostic processing.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct DiagnosticConfig {
    /// Maximum number of errors before stopping (0 = unlimited).
    pub error_limit: usize,
    /// Filter out follow-on errors that result from previous errors.
    pub filter_follow_on: bool,
    /// Drop diagnostics with the same code at the same location.
    pub deduplicate: bool,
}

impl Default for DiagnosticConfig {
    fn default() -> Self {
        DiagnosticConfig {
            error_limit: 100,
            filter_follow_on: true,
            deduplicate: true,
        }
    }
}

impl DiagnosticConfig {
    /// Create a config with no limits (for testing).
    pub fn unlimited() -> Self {
        DiagnosticConfig {
            error_limit: 0,
            filter_follow_on: false,
            deduplicate: false,
        }
    }
}

/// Queue for collecting, deduplicating, and sorting diagnostics.
///
/// ```text
/// let mut queue = DiagnosticQueue::new();
/// queue.extend(bound.diagnostics);
/// queue.extend(graph.diagnostics);
/// let sorted = queue.flush();
/// ```
#[derive(Clone, Debug, Default)]
pub struct DiagnosticQueue {
    /// Collected diagnostics with their insertion index, for a stable sort.
    diagnostics: Vec<(usize, Diagnostic)>,
    seen: FxHashSet<(ErrorCode, Span)>,
    error_count: usize,
    inserted: usize,
    config: DiagnosticConfig,
}

impl DiagnosticQueue {
    /// Create a new diagnostic queue with default configuration.
    pub fn new() -> Self {
        Self::with_config(DiagnosticConfig::default())
    }

    pub fn with_config(config: DiagnosticConfig) -> Self {
        DiagnosticQueue {
            diagnostics: Vec::new(),
            seen: FxHashSet::default(),
            error_count: 0,
            inserted: 0,
            config,
        }
    }

    /// Add a diagnostic.
    ///
    /// Returns `true` if the diagnostic was added, `false` if it was filtered.
    pub fn add(&mut self, diag: Diagnostic) -> bool {
        if self.limit_reached() {
            return false;
        }

        if self.config.filter_follow_on && Self::is_follow_on(&diag) {
            return false;
        }

        let location = diag.primary_span().unwrap_or_default();
        if self.config.deduplicate && !self.seen.insert((diag.code, location)) {
            return false;
        }

        if diag.is_error() {
            self.error_count += 1;
        }
        self.diagnostics.push((self.inserted, diag));
        self.inserted += 1;
        true
    }

    /// Add every diagnostic from `diags`, applying the same filters as [`add`](Self::add).
    pub fn extend(&mut self, diags: impl IntoIterator<Item = Diagnostic>) {
        for diag in diags {
            self.add(diag);
        }
    }

    /// Check if the error limit has been reached.
    pub fn limit_reached(&self) -> bool {
        self.config.error_limit > 0 && self.error_count >= self.config.error_limit
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    /// Sort diagnostics by source position and return them.
    ///
    /// Diagnostics at the same position keep insertion order. Clears the queue.
    pub fn flush(&mut self) -> Vec<Diagnostic> {
        self.diagnostics.sort_by_key(|(index, diag)| {
            let span = diag.primary_span().unwrap_or_default();
            (span.start, span.end, *index)
        });

        let result = self.diagnostics.drain(..).map(|(_, d)| d).collect();

        self.seen.clear();
        self.error_count = 0;
        self.inserted = 0;

        result
    }

    /// Get diagnostics without clearing the queue, in insertion order.
    pub fn peek(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().map(|(_, d)| d)
    }

    /// A follow-on error is flagged by its producer, or mentions the error
    /// type, which only appears after an earlier error already failed to
    /// resolve something.
    fn is_follow_on(diag: &Diagnostic) -> bool {
        diag.is_error() && (diag.follow_on || diag.message.contains("'?'"))
    }
}

#[cfg(test)]
mod tests;
