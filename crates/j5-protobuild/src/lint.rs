//! Lint results.

use j5_source::errpos::{PosErrors, ERROR_SEPARATOR};

/// Diagnostics for one source file.
#[derive(Debug)]
pub struct FileDiagnostics {
    pub filename: String,
    /// Raw source text, when the source kept it.
    pub text: Option<String>,
    pub diagnostics: PosErrors,
}

#[derive(Debug, Default)]
pub struct LintReport {
    pub package: String,
    pub files: Vec<FileDiagnostics>,
}

impl LintReport {
    pub fn new(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            files: Vec::new(),
        }
    }

    pub fn error_count(&self) -> usize {
        self.files.iter().map(|f| f.diagnostics.errors().count()).sum()
    }

    pub fn warning_count(&self) -> usize {
        self.files.iter().map(|f| f.diagnostics.warnings().count()).sum()
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    pub fn is_clean(&self) -> bool {
        self.files.iter().all(|f| f.diagnostics.is_empty())
    }

    /// Every diagnostic, rendered against its file's text where available.
    pub fn human_string(&self, context_lines: usize) -> String {
        self.files
            .iter()
            .filter(|f| !f.diagnostics.is_empty())
            .map(|f| match &f.text {
                Some(text) => f.diagnostics.human_string(&f.filename, text, context_lines),
                None => f.diagnostics.to_string(),
            })
            .collect::<Vec<_>>()
            .join(&format!("\n{ERROR_SEPARATOR}\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use j5_source::errpos::PosError;
    use j5_source::Span;

    #[derive(Debug, thiserror::Error)]
    #[error("import \"x.proto\" is not used")]
    struct Unused;

    #[test]
    fn counts_by_severity_and_renders_with_source() {
        let mut diagnostics = PosErrors::new();
        diagnostics.push(PosError::at("foo/v1/foo.j5s", Span::at(1, 0), Unused).warning());
        let report = LintReport {
            package: "foo.v1".into(),
            files: vec![
                FileDiagnostics {
                    filename: "foo/v1/foo.j5s".into(),
                    text: Some("package foo.v1\nimport x.proto\n".into()),
                    diagnostics,
                },
                FileDiagnostics {
                    filename: "foo/v1/clean.j5s".into(),
                    text: None,
                    diagnostics: PosErrors::new(),
                },
            ],
        };
        assert_eq!(report.warning_count(), 1);
        assert_eq!(report.error_count(), 0);
        assert!(!report.has_errors());
        assert!(!report.is_clean());
        assert_eq!(
            report.human_string(1),
            "foo/v1/foo.j5s:2:1: warning: import \"x.proto\" is not used\n2 | import x.proto\n  | ^"
        );
    }
}
