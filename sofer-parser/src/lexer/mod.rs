//! Lexers turning USFM or USX source into an ordered stream of [`PreToken`]s.
use std::cell::{Cell, RefCell};

use crate::{
    Error, PreToken,
    error::{Warning, WarningKind},
    model::Location,
};

mod chars;
mod usfm;
mod usx;

pub(crate) use chars::{is_line_space, is_punctuation, is_word_like};

/// The output of a lexer: pretokens in source order plus every non-fatal warning.
#[derive(Debug, Default)]
pub struct Lexed {
    pub pretokens: Vec<PreToken>,
    pub warnings: Vec<Warning>,
}

/// Lexes USFM. Unrecognised fragments become `Bad` pretokens and warnings.
///
/// # Errors
/// Only if the grammar itself fails to cover the input, which indicates a bug.
#[tracing::instrument(level = "trace", skip_all, fields(len = input.len()))]
pub fn lex_usfm(input: &str) -> Result<Lexed, Error> {
    let state = LexerState::new(input);
    let pretokens = usfm::usfm_lexer::pretokens(input, &state).map_err(|e| {
        tracing::error!(error = %e, "USFM grammar failed to cover input");
        Error::from(e)
    })?;
    Ok(Lexed {
        pretokens,
        warnings: state.into_warnings(),
    })
}

/// Lexes USX. An element with no registered handler fails the whole lex.
///
/// # Errors
/// [`Error::Xml`] for malformed XML and [`Error::UnhandledElement`] for unknown elements.
#[tracing::instrument(level = "trace", skip_all, fields(len = input.len()))]
pub fn lex_usx(input: &str) -> Result<Lexed, Error> {
    usx::lex(input)
}

/// Splits a run of plain text into printable pretokens.
///
/// `offset` is the byte position of `text` inside `state`'s input, used for warnings.
pub(crate) fn lex_text(
    text: &str,
    offset: usize,
    state: &LexerState<'_>,
) -> Result<Vec<PreToken>, Error> {
    state.base.set(offset);
    let pretokens = usfm::usfm_lexer::printables(text, state);
    state.base.set(0);
    Ok(pretokens?)
}

/// Shared state threaded through the grammar actions.
///
/// Uses `RefCell` for the warning list to support interior mutability within PEG
/// action blocks.
#[derive(Debug)]
pub(crate) struct LexerState<'a> {
    input: &'a str,
    /// Offset of the text currently being lexed inside `input`.
    base: Cell<usize>,
    warnings: RefCell<Vec<Warning>>,
}

impl<'a> LexerState<'a> {
    pub(crate) fn new(input: &'a str) -> Self {
        Self {
            input,
            base: Cell::new(0),
            warnings: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn add_warning(&self, kind: WarningKind, message: String, start: usize, end: usize) {
        let base = self.base.get();
        let location = Location::from_offsets(self.input, base + start, base + end);
        tracing::warn!(?kind, %location, "{message}");
        self.warnings
            .borrow_mut()
            .push(Warning::new(kind, message).at(location));
    }

    pub(crate) fn into_warnings(self) -> Vec<Warning> {
        self.warnings.into_inner()
    }
}
