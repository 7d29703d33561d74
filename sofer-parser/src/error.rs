use std::fmt;

use serde::Serialize;

use crate::model::{DocumentId, Location, Position, SequenceId};

#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("unhandled element <{name}>, position: {detail}")]
    UnhandledElement { name: String, detail: Detail },

    #[error("XML error: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("USFM grammar error: {0}")]
    LexGrammar(#[from] peg::error::ParseError<peg::str::LineCol>),

    #[error("TSV error: {0}")]
    Tsv(#[from] csv::Error),

    #[error("cannot resolve {field} while opening scope {label}")]
    UnresolvedTrigger { field: &'static str, label: String },

    #[error("unknown scope type: {0}")]
    UnknownScopeType(String),

    #[error("malformed scope label {label}: expected {expected} component(s) after the type")]
    MalformedScopeLabel { label: String, expected: usize },

    #[error("unknown docSet: {0}")]
    UnknownDocSet(String),

    #[error("unknown document: {0}")]
    UnknownDocument(DocumentId),

    #[error("unknown sequence: {0}")]
    UnknownSequence(SequenceId),

    #[error("block position {position} out of range for sequence {sequence} ({len} blocks)")]
    BlockOutOfRange {
        sequence: SequenceId,
        position: usize,
        len: usize,
    },

    #[error("graft target {0} does not exist")]
    UnknownGraftTarget(SequenceId),

    #[error("graft target {0} is the main sequence")]
    MainSequenceGraft(SequenceId),

    #[error("scope {label} is unbalanced in block {position} of sequence {sequence}")]
    UnbalancedScope {
        sequence: SequenceId,
        position: usize,
        label: String,
    },

    #[error("docSet {doc_set} already holds a document for book {book_code}")]
    DuplicateBookCode { doc_set: String, book_code: String },

    #[error("invalid tag: {0}")]
    InvalidTag(String),

    #[error("strict mode: {0}")]
    StrictMode(Warning),

    #[error("invariant violated in sequence {sequence}, block {block}: {detail}")]
    InvariantViolation {
        sequence: SequenceId,
        block: usize,
        detail: String,
    },

    #[error("cannot detect input format of {0}")]
    UnknownFormat(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown encoding: {0}")]
    UnknownEncoding(String),

    #[error("Unrecognized encoding in file: {0}")]
    UnrecognizedEncodingInFile(String),
}

impl Error {
    /// Extract location information from this error if available.
    /// Returns the Location for errors that have position information.
    #[must_use]
    pub fn location(&self) -> Option<&Location> {
        match self {
            Self::UnhandledElement { detail, .. } => Some(&detail.location),
            Self::StrictMode(warning) => warning.location.as_ref(),
            _ => None,
        }
    }

    /// Get advice for this error if available.
    /// Returns helpful information for resolving the error.
    #[must_use]
    pub fn advice(&self) -> Option<&'static str> {
        match self {
            Self::UnhandledElement { .. } => Some(
                "USX elements are limited to: usx, book, chapter, verse, para, char, note, ms, figure, optbreak, table, row, cell, ref, sidebar, periph",
            ),
            Self::UnknownScopeType(..) | Self::MalformedScopeLabel { .. } => Some(
                "Scope labels look like 'chapter/3', 'span/nd' or 'attribute/spanWithAtts/w/lemma/0/value'",
            ),
            Self::UnbalancedScope { .. } => Some(
                "A block may only end scopes that are open at that point and may not start a scope that is already open",
            ),
            Self::StrictMode(..) => Some("Run without --strict to downgrade this to a warning"),
            Self::InvariantViolation { .. } => {
                Some("This is a bug in sofer; please report it with the input document")
            }
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct Detail {
    pub location: Location,
}

impl fmt::Display for Detail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Location {
            start:
                Position {
                    line: start_line,
                    column: start_column,
                },
            end:
                Position {
                    line: end_line,
                    column: end_column,
                },
            ..
        } = self.location;

        write!(
            f,
            "start(line: {start_line}, column: {start_column}), end(line: {end_line}, column: {end_column})",
        )
    }
}

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum WarningKind {
    /// Input the text grammar could not classify; kept as a `bad` token.
    BadFragment,
    /// A known USX element that carries no meaning for the document model.
    NotHandledElement,
    /// An attribute with no span or milestone to attach to.
    OrphanAttribute,
}

/// A non-fatal problem met while lexing or parsing one document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl Warning {
    pub(crate) fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            location: None,
        }
    }

    #[must_use]
    pub(crate) fn at(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{} ({})", self.message, location.start),
            None => f.write_str(&self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location() -> Location {
        Location {
            absolute_start: 2,
            absolute_end: 20,
            start: Position { line: 1, column: 2 },
            end: Position { line: 3, column: 4 },
        }
    }

    #[test]
    fn test_error_detail_display() {
        let detail = Detail {
            location: location(),
        };
        assert_eq!(
            format!("{detail}"),
            "start(line: 1, column: 2), end(line: 3, column: 4)"
        );
    }

    #[test]
    fn test_unhandled_element_display_and_location() {
        let error = Error::UnhandledElement {
            name: "blah".to_string(),
            detail: Detail {
                location: location(),
            },
        };
        assert_eq!(
            format!("{error}"),
            "unhandled element <blah>, position: start(line: 1, column: 2), end(line: 3, column: 4)"
        );
        assert_eq!(error.location().map(|l| l.absolute_start), Some(2));
        assert!(error.advice().is_some());
    }

    #[test]
    fn test_strict_mode_carries_warning_location() {
        let warning = Warning::new(WarningKind::BadFragment, "bad fragment '\\'").at(location());
        let error = Error::StrictMode(warning);
        assert_eq!(
            format!("{error}"),
            "strict mode: bad fragment '\\' (line: 1, column: 2)"
        );
        assert!(error.location().is_some());
    }

    #[test]
    fn test_edit_errors_have_no_location() {
        let error = Error::BlockOutOfRange {
            sequence: SequenceId(3),
            position: 7,
            len: 2,
        };
        assert_eq!(
            format!("{error}"),
            "block position 7 out of range for sequence s3 (2 blocks)"
        );
        assert!(error.location().is_none());
    }
}
