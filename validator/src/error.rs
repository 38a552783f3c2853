use std::fmt;
use std::ops::Range;

use codespan_reporting::diagnostic::{Diagnostic, Label, Severity};
use procsql::Identifier;
use procsql::statement::TransferKind;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("label '{label}' not found for {statement}")]
    UnresolvedLabel {
        statement: TransferKind,
        label: Identifier,
    },
    #[error("end label '{end}' does not match {}", start_label(.start))]
    LabelMismatch {
        start: Option<Identifier>,
        end: Identifier,
    },
    #[error("ITERATE label '{label}' names a {kind}, not an iteration statement")]
    IterateTargetNotIteration {
        label: Identifier,
        kind: &'static str,
    },
    #[error("label '{label}' is not allowed on {kind}")]
    LabelNotAllowed {
        label: Identifier,
        kind: &'static str,
    },
}

fn start_label(start: &Option<Identifier>) -> String {
    match start {
        Some(label) => format!("start label '{}'", label),
        None => "an unlabeled block".to_string(),
    }
}

/// A validation error or warning enriched with source location information.
#[derive(Debug, Clone)]
pub struct DiagnosticError {
    pub error: ValidationError,
    pub span: Option<Range<usize>>,
    pub source_id: usize,
    pub is_warning: bool,
    pub notes: Vec<String>,
    /// Related locations, shown as secondary labels.
    pub secondary: Vec<(Range<usize>, String)>,
}

impl DiagnosticError {
    pub fn error(error: ValidationError, span: Option<Range<usize>>, source_id: usize) -> Self {
        DiagnosticError {
            error,
            span,
            source_id,
            is_warning: false,
            notes: Vec::new(),
            secondary: Vec::new(),
        }
    }

    pub fn warning(error: ValidationError, span: Option<Range<usize>>, source_id: usize) -> Self {
        DiagnosticError {
            is_warning: true,
            ..DiagnosticError::error(error, span, source_id)
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_secondary(mut self, span: Range<usize>, message: impl Into<String>) -> Self {
        self.secondary.push((span, message.into()));
        self
    }

    pub fn severity(&self) -> Severity {
        if self.is_warning {
            Severity::Warning
        } else {
            Severity::Error
        }
    }

    /// Convert to a codespan-reporting Diagnostic for display.
    pub fn to_diagnostic(&self) -> Diagnostic<usize> {
        let mut labels: Vec<_> = self
            .span
            .iter()
            .map(|span| Label::primary(self.source_id, span.clone()))
            .collect();
        labels.extend(self.secondary.iter().map(|(span, message)| {
            Label::secondary(self.source_id, span.clone()).with_message(message.clone())
        }));
        Diagnostic::new(self.severity())
            .with_message(self.error.to_string())
            .with_labels(labels)
            .with_notes(self.notes.clone())
    }
}

impl From<ValidationError> for DiagnosticError {
    fn from(error: ValidationError) -> Self {
        DiagnosticError::error(error, None, 0)
    }
}

impl fmt::Display for DiagnosticError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.error.fmt(f)
    }
}

impl std::error::Error for DiagnosticError {}

#[cfg(test)]
mod tests {
    use codespan_reporting::diagnostic::LabelStyle;

    use super::*;

    #[test]
    fn messages_name_the_label() {
        let err = ValidationError::UnresolvedLabel {
            statement: TransferKind::Leave,
            label: Identifier::regular("label1"),
        };
        assert_eq!(err.to_string(), "label 'label1' not found for LEAVE");

        let err = ValidationError::LabelMismatch {
            start: Some(Identifier::regular("a")),
            end: Identifier::regular("b"),
        };
        assert_eq!(err.to_string(), "end label 'b' does not match start label 'a'");

        let err = ValidationError::LabelMismatch {
            start: None,
            end: Identifier::quoted("b"),
        };
        assert_eq!(err.to_string(), "end label '\"b\"' does not match an unlabeled block");
    }

    #[test]
    fn codespan_diagnostic_carries_span_and_severity() {
        let diag = DiagnosticError::warning(
            ValidationError::UnresolvedLabel {
                statement: TransferKind::Iterate,
                label: Identifier::regular("x"),
            },
            Some(4..15),
            3,
        )
        .with_note("checked every enclosing block");
        let rendered = diag.to_diagnostic();
        assert_eq!(rendered.severity, Severity::Warning);
        assert_eq!(rendered.labels.len(), 1);
        assert_eq!(rendered.labels[0].file_id, 3);
        assert_eq!(rendered.labels[0].range, 4..15);
        assert_eq!(rendered.notes, vec!["checked every enclosing block".to_string()]);
    }

    #[test]
    fn related_location_becomes_secondary_label() {
        let diag = DiagnosticError::error(
            ValidationError::IterateTargetNotIteration {
                label: Identifier::regular("l"),
                kind: "BEGIN ... END block",
            },
            Some(20..30),
            1,
        )
        .with_secondary(0..40, "label declared here");
        let rendered = diag.to_diagnostic();
        assert_eq!(rendered.labels.len(), 2);
        assert_eq!(rendered.labels[0].style, LabelStyle::Primary);
        assert_eq!(rendered.labels[1].style, LabelStyle::Secondary);
        assert_eq!(rendered.labels[1].range, 0..40);
        assert_eq!(rendered.labels[1].file_id, 1);
        assert_eq!(rendered.labels[1].message, "label declared here");
        assert!(rendered.notes.is_empty());
    }

    #[test]
    fn no_span_means_no_label() {
        let diag = DiagnosticError::from(ValidationError::LabelNotAllowed {
            label: Identifier::regular("l"),
            kind: "IF statement",
        });
        assert!(!diag.is_warning);
        assert!(diag.to_diagnostic().labels.is_empty());
    }
}
