//! Positioned diagnostics.
//!
//! Every stage of the compiler reports problems as [`PosError`]s: a wrapped
//! error plus (optionally) the file and line/column range it refers to.
//! Positions are stored 0-based and rendered 1-based.
//!
//! Rendering against the original text is a pure function of the errors and
//! the raw file contents, see [`PosErrors::human_string`].

use crate::ast::{Position, Span};
use std::error::Error as StdError;
use std::fmt;

pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

pub const ERROR_SEPARATOR: &str = "-----";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => f.write_str("error"),
            Self::Warning => f.write_str("warning"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ErrorPosition {
    pub filename: String,
    pub start: Position,
    pub end: Position,
}

impl ErrorPosition {
    pub fn new(filename: impl Into<String>, span: Span) -> Self {
        Self {
            filename: filename.into(),
            start: span.start,
            end: span.end,
        }
    }
}

impl fmt::Display for ErrorPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.filename,
            self.start.line + 1,
            self.start.column + 1
        )
    }
}

#[derive(Debug)]
pub struct PosError {
    pub position: Option<ErrorPosition>,
    pub severity: Severity,
    /// Human context, e.g. the element being converted.
    pub context: Option<String>,
    pub err: BoxError,
}

impl PosError {
    pub fn new(err: impl Into<BoxError>) -> Self {
        Self {
            position: None,
            severity: Severity::Error,
            context: None,
            err: err.into(),
        }
    }

    pub fn at(filename: impl Into<String>, span: Span, err: impl Into<BoxError>) -> Self {
        Self {
            position: Some(ErrorPosition::new(filename, span)),
            severity: Severity::Error,
            context: None,
            err: err.into(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn warning(mut self) -> Self {
        self.severity = Severity::Warning;
        self
    }

    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }

    /// Fill in the filename when the error was raised without one.
    pub fn in_file(mut self, filename: &str) -> Self {
        match &mut self.position {
            Some(pos) if pos.filename.is_empty() => pos.filename = filename.to_string(),
            Some(_) => {}
            None => {
                self.position = Some(ErrorPosition {
                    filename: filename.to_string(),
                    start: Position::default(),
                    end: Position::default(),
                })
            }
        }
        self
    }

    fn write_message(&self, f: &mut impl fmt::Write) -> fmt::Result {
        if let Some(pos) = &self.position {
            write!(f, "{pos}: ")?;
        }
        if self.severity == Severity::Warning {
            f.write_str("warning: ")?;
        }
        if let Some(ctx) = &self.context {
            write!(f, "{ctx}: ")?;
        }
        write!(f, "{}", self.err)
    }
}

impl fmt::Display for PosError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_message(f)
    }
}

impl StdError for PosError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.err.as_ref())
    }
}

/// A collected set of diagnostics, in the order they were raised.
#[derive(Debug, Default)]
pub struct PosErrors(pub Vec<PosError>);

impl PosErrors {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, err: PosError) {
        self.0.push(err);
    }

    pub fn extend(&mut self, other: PosErrors) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PosError> {
        self.0.iter()
    }

    pub fn has_errors(&self) -> bool {
        self.0.iter().any(|e| e.severity == Severity::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &PosError> {
        self.0.iter().filter(|e| e.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &PosError> {
        self.0.iter().filter(|e| e.severity == Severity::Warning)
    }

    /// `Ok(())` when nothing at error severity was collected.
    pub fn into_result(self) -> Result<(), PosErrors> {
        if self.has_errors() {
            Err(self)
        } else {
            Ok(())
        }
    }

    /// Render each diagnostic with up to `context_lines` lines of the source
    /// ending at the offending line, and a caret under the column.
    ///
    /// Diagnostics for other files (or without a position) render as their
    /// message only.
    pub fn human_string(&self, filename: &str, source: &str, context_lines: usize) -> String {
        let lines: Vec<&str> = source.lines().collect();
        let rendered: Vec<String> = self
            .0
            .iter()
            .map(|err| render_one(err, filename, &lines, context_lines))
            .collect();
        rendered.join(&format!("\n{ERROR_SEPARATOR}\n"))
    }
}

impl From<PosError> for PosErrors {
    fn from(err: PosError) -> Self {
        Self(vec![err])
    }
}

impl IntoIterator for PosErrors {
    type Item = PosError;
    type IntoIter = std::vec::IntoIter<PosError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl fmt::Display for PosErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "\n{ERROR_SEPARATOR}\n")?;
            }
            err.write_message(f)?;
        }
        Ok(())
    }
}

impl StdError for PosErrors {}

fn render_one(err: &PosError, filename: &str, lines: &[&str], context_lines: usize) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = err.write_message(&mut out);

    let Some(pos) = &err.position else {
        return out;
    };
    if pos.filename != filename || context_lines == 0 {
        return out;
    }
    let line = pos.start.line as usize;
    if line >= lines.len() {
        return out;
    }

    let first = (line + 1).saturating_sub(context_lines);
    let width = (line + 1).to_string().len();
    for (idx, text) in lines.iter().enumerate().take(line + 1).skip(first) {
        out.push('\n');
        out.push_str(&format!("{:>width$} | {}", idx + 1, text));
    }
    out.push('\n');
    out.push_str(&format!(
        "{:>width$} | {}^",
        "",
        " ".repeat(pos.start.column as usize)
    ));
    out
}
