//! `sofer-parser` turns USFM, USX and TSV Scripture sources into a document of
//! sequences, blocks and scopes, and keeps that document consistent under edits.
//!
//! ```
//! use sofer_parser::{Options, parse_usfm};
//!
//! let document = parse_usfm("\\id GEN\n\\c 1\n\\p\n\\v 1 In the beginning", &Options::default())?;
//! assert_eq!(document.book_code(), Some("GEN"));
//! assert_eq!(document.cv_index().verse(1, 1).len(), 1);
//! # Ok::<(), sofer_parser::Error>(())
//! ```
use std::path::Path;

use tracing::instrument;

mod cv_index;
mod docset;
mod edit;
mod error;
mod input;
mod lexer;
mod model;
mod options;
mod parser;
mod pretoken;
mod tsv;

#[cfg(test)]
mod proptests;

pub use cv_index::{ChapterEntry, ChapterVerseIndex, ItemPosition, ItemRange};
pub use docset::{DocSet, Library, Selectors};
pub use edit::ScopeFilter;
pub use error::{Detail as ErrorDetail, Error, Warning, WarningKind};
pub use input::{Format, read_and_decode_file};
pub use lexer::{Lexed, lex_usfm, lex_usx};
pub use model::{
    Block, Document, DocumentId, Graft, Item, Location, Position, SLASH_PLACEHOLDER, ScopeMark,
    ScopePosition, ScopeSet, ScopeType, Sequence, SequenceId, SequenceType, Token, TokenSubtype,
    escape_component,
};
pub use options::{CustomTagKind, CustomTags, Options, OptionsBuilder};
pub use pretoken::{
    BreakKind, PreToken, PreTokenKind, PrintableSubtype, Tag, TagPosition, explode_verses,
    split_tag_level,
};

/// Parses `input` in the given format.
///
/// # Errors
/// Fatal lex errors ([`Error::UnhandledElement`], [`Error::Xml`], [`Error::Tsv`]), parser
/// state errors, or [`Error::StrictMode`] when `options.strict` is set and a warning
/// was raised.
#[instrument(skip(input, options), fields(len = input.len()))]
pub fn parse(input: &str, format: Format, options: &Options) -> Result<Document, Error> {
    match format {
        Format::Usfm => parse_usfm(input, options),
        Format::Usx => parse_usx(input, options),
        Format::Tsv => tsv::parse_tsv(input, options),
    }
}

/// # Errors
/// See [`parse`].
pub fn parse_usfm(input: &str, options: &Options) -> Result<Document, Error> {
    parse_lexed(lex_usfm(input)?, options)
}

/// # Errors
/// See [`parse`].
pub fn parse_usx(input: &str, options: &Options) -> Result<Document, Error> {
    parse_lexed(lex_usx(input)?, options)
}

/// Reads, decodes and parses a file, picking the format from its extension.
///
/// # Errors
/// [`Error::UnknownFormat`], I/O and decoding errors, or anything [`parse`] returns.
#[instrument(skip(file_path, options), fields(path = %file_path.as_ref().display()))]
pub fn parse_file<P: AsRef<Path>>(file_path: P, options: &Options) -> Result<Document, Error> {
    let path = file_path.as_ref();
    let format = Format::from_path(path)?;
    let input = read_and_decode_file(path, None)?;
    parse(&input, format, options)
}

/// Runs the parser over pretokens that did not come from one of the lexers.
///
/// # Errors
/// Parser state errors, or [`Error::StrictMode`] for attributes outside any span or
/// milestone in strict mode.
pub fn parse_pretokens(pretokens: &[PreToken], options: &Options) -> Result<Document, Error> {
    parser::parse_pretokens(pretokens, options, Vec::new())
}

fn parse_lexed(lexed: Lexed, options: &Options) -> Result<Document, Error> {
    if options.strict
        && let Some(warning) = lexed.warnings.first()
    {
        tracing::error!(%warning, "lex warning in strict mode");
        return Err(Error::StrictMode(warning.clone()));
    }
    parser::parse_pretokens(&lexed.pretokens, options, lexed.warnings)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[rstest::rstest]
    #[trace]
    fn for_each_file(
        #[files("fixtures/**/*.usfm")]
        #[files("fixtures/**/*.usx")]
        #[files("fixtures/**/*.tsv")]
        path: std::path::PathBuf,
    ) {
        let result = parse_file(&path, &Options::default());
        let Ok(document) = result else {
            panic!("{} failed to parse: {result:?}", path.display());
        };
        assert!(document.verify_invariants().is_ok());
        assert!(!document.main().blocks().is_empty());
    }

    #[test]
    fn usfm_and_usx_agree() {
        let Ok(usfm) = parse_file("fixtures/jon.usfm", &Options::default()) else {
            panic!("fixtures/jon.usfm failed to parse");
        };
        let Ok(usx) = parse_file("fixtures/jon.usx", &Options::default()) else {
            panic!("fixtures/jon.usx failed to parse");
        };
        assert_eq!(usfm.book_code(), usx.book_code());
        assert_eq!(usfm.main().plain_text(), usx.main().plain_text());
        assert_eq!(
            usfm.cv_index().chapters().count(),
            usx.cv_index().chapters().count()
        );
    }

    #[test]
    #[tracing_test::traced_test]
    fn strict_mode_promotes_lex_warnings() {
        let input = "\\p a \\ b";
        assert!(parse_usfm(input, &Options::default()).is_ok());
        let strict = Options::builder().with_strict().build();
        let Err(Error::StrictMode(warning)) = parse_usfm(input, &strict) else {
            panic!("expected a strict mode error");
        };
        assert_eq!(warning.kind, WarningKind::BadFragment);
        assert!(logs_contain("lex warning in strict mode"));
    }

    #[test]
    fn unhandled_usx_elements_yield_no_document() {
        let result = parse("<usx><para style=\"p\"><bogus/></para></usx>", Format::Usx, &Options::default());
        assert!(matches!(result, Err(Error::UnhandledElement { ref name, .. }) if name == "bogus"));
    }

    #[test]
    fn bad_fragments_keep_the_rest_of_the_document() {
        let Ok(document) = parse_usfm("\\p a\u{0}b\n\\p c", &Options::default()) else {
            panic!("expected a document");
        };
        assert_eq!(document.warnings().len(), 1);
        let first = document.main().blocks().first();
        assert!(first.is_some_and(|b| b.tokens().any(|t| t.subtype == TokenSubtype::Bad)));
        assert_eq!(document.main().plain_text(), "a\u{0}b\nc");
    }
}
