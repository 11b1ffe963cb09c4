//! Diagnostic reporting for the debug info reader.
//!
//! The reader never aborts on a recoverable problem and never returns a
//! collected list of errors. Instead, every diagnostic - warnings
//! included, even on a load that ultimately succeeds - is delivered to a
//! caller-supplied [`DiagnosticSink`] the moment it is produced. The
//! caller decides whether to print, collect or ignore them.
//!
//! # Example
//!
//! ```
//! use dbg65_util::{Collector, Reporter, Severity};
//!
//! let mut collector = Collector::new();
//! {
//!     let mut reporter = Reporter::new("a.dbg", &mut collector);
//!     reporter.warning(3, 1, "unknown keyword \"future\" - skipping");
//!     reporter.error(4, 9, "required attributes missing");
//!     assert_eq!(reporter.error_count(), 1);
//! }
//! assert_eq!(collector.diagnostics().len(), 2);
//! assert_eq!(collector.diagnostics()[1].severity, Severity::Error);
//! ```

use std::fmt;

/// Diagnostic severity.
///
/// Warnings are advisory; the load still succeeds. Errors are recoverable
/// within the parse (the reader resynchronises and keeps going) but cause
/// the whole load to fail once the file has been read to the end.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    /// Advisory; the load may still succeed.
    Warning,
    /// The load will fail, but reading continues to find more problems.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A single diagnostic message with its position in the input file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    /// Severity of the problem.
    pub severity: Severity,
    /// Name of the input file as passed to the loader.
    pub file: String,
    /// 1-based line of the offending token. 0 for whole-file problems
    /// found after parsing (e.g. during reference resolution).
    pub line: u32,
    /// 1-based column of the offending token, 0 for whole-file problems.
    pub column: u32,
    /// Human-readable description.
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line == 0 {
            write!(f, "{}: {}: {}", self.file, self.severity, self.message)
        } else {
            write!(
                f,
                "{}:{}:{}: {}: {}",
                self.file, self.line, self.column, self.severity, self.message
            )
        }
    }
}

/// Receiver for diagnostics.
///
/// Implementations get one call per diagnostic, in the order the reader
/// discovers them.
pub trait DiagnosticSink {
    /// Called once for every diagnostic.
    fn report(&mut self, diagnostic: &Diagnostic);
}

/// Adapter turning a closure into a [`DiagnosticSink`].
///
/// # Example
///
/// ```
/// use dbg65_util::{Diagnostic, DiagnosticSink, FnSink, Reporter};
///
/// let mut lines = Vec::new();
/// let mut sink = FnSink(|d: &Diagnostic| lines.push(d.to_string()));
/// let mut reporter = Reporter::new("a.dbg", &mut sink);
/// reporter.error(1, 1, "unexpected input token");
/// drop(reporter);
/// drop(sink);
/// assert_eq!(lines, ["a.dbg:1:1: error: unexpected input token"]);
/// ```
pub struct FnSink<F>(pub F);

impl<F: FnMut(&Diagnostic)> DiagnosticSink for FnSink<F> {
    fn report(&mut self, diagnostic: &Diagnostic) {
        (self.0)(diagnostic)
    }
}

/// A sink that stores every diagnostic it receives.
///
/// Used by the test suite and by consumers that want to inspect the
/// messages after the load has finished.
#[derive(Debug, Default)]
pub struct Collector {
    diagnostics: Vec<Diagnostic>,
}

impl Collector {
    /// Creates an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// All diagnostics received so far, in order.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// True if at least one error was received.
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Number of errors received.
    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    /// Number of warnings received.
    pub fn warning_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count()
    }
}

impl DiagnosticSink for Collector {
    fn report(&mut self, diagnostic: &Diagnostic) {
        self.diagnostics.push(diagnostic.clone());
    }
}

/// Stateful front end to a [`DiagnosticSink`].
///
/// The reporter carries the input file name, forwards each diagnostic to
/// the sink and keeps the severity counts the loader uses to decide
/// whether the database can be kept.
pub struct Reporter<'a> {
    sink: &'a mut dyn DiagnosticSink,
    file: String,
    errors: u32,
    warnings: u32,
}

impl<'a> Reporter<'a> {
    /// Creates a reporter for the given input file name.
    pub fn new(file: impl Into<String>, sink: &'a mut dyn DiagnosticSink) -> Self {
        Self {
            sink,
            file: file.into(),
            errors: 0,
            warnings: 0,
        }
    }

    fn emit(&mut self, severity: Severity, line: u32, column: u32, message: String) {
        match severity {
            Severity::Warning => self.warnings += 1,
            Severity::Error => self.errors += 1,
        }
        let diagnostic = Diagnostic {
            severity,
            file: self.file.clone(),
            line,
            column,
            message,
        };
        self.sink.report(&diagnostic);
    }

    /// Reports an error at the given position.
    pub fn error(&mut self, line: u32, column: u32, message: impl Into<String>) {
        self.emit(Severity::Error, line, column, message.into());
    }

    /// Reports a warning at the given position.
    pub fn warning(&mut self, line: u32, column: u32, message: impl Into<String>) {
        self.emit(Severity::Warning, line, column, message.into());
    }

    /// Name of the input file diagnostics are attributed to.
    pub fn file(&self) -> &str {
        &self.file
    }

    /// Number of errors reported so far.
    pub fn error_count(&self) -> u32 {
        self.errors
    }

    /// Number of warnings reported so far.
    pub fn warning_count(&self) -> u32 {
        self.warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_display() {
        assert_eq!(format!("{}", Severity::Error), "error");
        assert_eq!(format!("{}", Severity::Warning), "warning");
    }

    #[test]
    fn test_diagnostic_display() {
        let d = Diagnostic {
            severity: Severity::Error,
            file: "a.dbg".into(),
            line: 12,
            column: 3,
            message: "unterminated string constant".into(),
        };
        assert_eq!(d.to_string(), "a.dbg:12:3: error: unterminated string constant");
    }

    #[test]
    fn test_diagnostic_display_whole_file() {
        let d = Diagnostic {
            severity: Severity::Error,
            file: "a.dbg".into(),
            line: 0,
            column: 0,
            message: "missing file record with id 2".into(),
        };
        assert_eq!(d.to_string(), "a.dbg: error: missing file record with id 2");
    }

    #[test]
    fn test_collector_counts() {
        let mut collector = Collector::new();
        {
            let mut reporter = Reporter::new("x", &mut collector);
            reporter.warning(1, 1, "w");
            reporter.error(2, 2, "e1");
            reporter.error(3, 3, "e2");
            assert_eq!(reporter.error_count(), 2);
            assert_eq!(reporter.warning_count(), 1);
        }
        assert!(collector.has_errors());
        assert_eq!(collector.error_count(), 2);
        assert_eq!(collector.warning_count(), 1);
        assert_eq!(collector.diagnostics().len(), 3);
    }

    #[test]
    fn test_fn_sink_forwards() {
        let mut seen = 0usize;
        {
            let mut sink = FnSink(|_: &Diagnostic| seen += 1);
            let mut reporter = Reporter::new("x", &mut sink);
            reporter.error(1, 1, "a");
            reporter.warning(1, 2, "b");
        }
        assert_eq!(seen, 2);
    }

    #[test]
    fn test_reporter_file_name() {
        let mut collector = Collector::new();
        let mut reporter = Reporter::new("dir/prog.dbg", &mut collector);
        reporter.error(5, 7, "boom");
        assert_eq!(reporter.file(), "dir/prog.dbg");
        drop(reporter);
        assert_eq!(collector.diagnostics()[0].file, "dir/prog.dbg");
        assert_eq!(collector.diagnostics()[0].line, 5);
        assert_eq!(collector.diagnostics()[0].column, 7);
    }
}
