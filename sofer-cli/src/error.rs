use std::path::PathBuf;

use miette::{Diagnostic, NamedSource, SourceSpan};
use sofer_parser::{Error as ParserError, Location};

/// The file a parser error came from, with its decoded text.
pub(crate) type SourceContext = (PathBuf, String);

/// Rich error wrapper for miette display with source code
#[derive(Debug, Diagnostic, thiserror::Error)]
#[error("{message}")]
#[diagnostic()]
pub(crate) struct RichError {
    message: String,

    #[help]
    advice: Option<String>,

    #[source_code]
    src: NamedSource<String>,

    #[label("{position_advice}")]
    span: SourceSpan,
    position_advice: String,
}

/// A parser error together with the source it points into, when there is one.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub(crate) struct CliError {
    #[source]
    error: ParserError,
    context: Option<SourceContext>,
}

fn source_span_from_location(location: &Location) -> SourceSpan {
    let length = location.absolute_end.saturating_sub(location.absolute_start);
    SourceSpan::new(location.absolute_start.into(), length)
}

impl CliError {
    pub(crate) fn parser(error: ParserError, context: Option<SourceContext>) -> Self {
        Self { error, context }
    }

    pub(crate) fn report(self) -> miette::Report {
        let advice = self.error.advice().map(str::to_string);
        match (self.context, self.error.location()) {
            (Some((path, source)), Some(location)) => {
                let line = location.start.line;
                let column = location.start.column;
                miette::Report::new(RichError {
                    message: self.error.to_string(),
                    advice,
                    span: source_span_from_location(location),
                    src: NamedSource::new(path.display().to_string(), source),
                    position_advice: format!("error occurred here (line {line}, column {column})"),
                })
            }
            (context, _) => {
                let prefix = context
                    .map(|(path, _)| format!("{}: ", path.display()))
                    .unwrap_or_default();
                match advice {
                    Some(advice) => miette::miette!(help = advice, "{prefix}{}", self.error),
                    None => miette::miette!("{prefix}{}", self.error),
                }
            }
        }
    }
}
