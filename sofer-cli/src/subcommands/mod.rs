use std::path::{Path, PathBuf};

use sofer_parser::{Document, Format, Options, parse, read_and_decode_file};

use crate::error::{self, SourceContext};

pub mod convert;
pub mod inspect;

/// Reads and parses one file, keeping its source around for error reports.
pub(crate) fn load(
    path: &Path,
    format: Option<Format>,
    options: &Options,
) -> Result<Document, error::CliError> {
    let format = match format {
        Some(format) => format,
        None => Format::from_path(path).map_err(|e| error::CliError::parser(e, None))?,
    };
    let source =
        read_and_decode_file(path, None).map_err(|e| error::CliError::parser(e, None))?;
    tracing::debug!(path = %path.display(), %format, "parsing");
    parse(&source, format, options).map_err(|e| {
        let context: SourceContext = (PathBuf::from(path), source);
        error::CliError::parser(e, Some(context))
    })
}
