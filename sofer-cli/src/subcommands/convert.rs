use std::{
    io::{self, Write},
    path::PathBuf,
};

use anyhow::Context;
use clap::Args as ClapArgs;
use rayon::prelude::*;
use sofer_parser::{Document, Format, Library, Options, ScopeFilter, Selectors};

use crate::{error::CliError, subcommands::load};

/// Convert Scripture documents to JSON
#[derive(ClapArgs, Debug)]
pub struct Args {
    /// List of files to convert
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Input format; detected from each file's extension when omitted
    #[arg(long)]
    pub format: Option<Format>,

    /// Language selector of the docSet the documents join
    #[arg(long, default_value = "und")]
    pub lang: String,

    /// Abbreviation selector of the docSet the documents join
    #[arg(long, default_value = "unknown")]
    pub abbr: String,

    /// Only keep scopes whose labels start with one of these prefixes
    #[arg(long, value_delimiter = ',')]
    pub include_scopes: Option<Vec<String>>,

    /// Drop scopes whose labels start with one of these prefixes
    #[arg(long, value_delimiter = ',')]
    pub exclude_scopes: Vec<String>,

    /// Drop grafts to these sequence types (and the sequences they leave unreachable)
    #[arg(long, value_delimiter = ',')]
    pub exclude_grafts: Vec<String>,

    /// Strict mode
    ///
    /// When enabled, every warning (unrecognised text, attributes outside any span or
    /// milestone, USX elements with no meaning) fails the document instead.
    #[arg(long)]
    pub strict: bool,

    /// Treat the first row of TSV input as a header row
    #[arg(long)]
    pub tsv_header_row: bool,

    /// Pretty-print the JSON output
    #[arg(long)]
    pub pretty: bool,
}

impl Args {
    fn options(&self) -> Options {
        let mut builder = Options::builder();
        if self.strict {
            builder = builder.with_strict();
        }
        if self.tsv_header_row {
            builder = builder.with_tsv_header_row();
        }
        builder.build()
    }

    fn filter(&self) -> Option<ScopeFilter> {
        let mut filter = ScopeFilter::new()
            .exclude_scopes(self.exclude_scopes.iter().cloned())
            .exclude_grafts(self.exclude_grafts.iter().cloned());
        if let Some(include) = &self.include_scopes {
            filter = filter.include_scopes(include.iter().cloned());
        }
        (filter != ScopeFilter::default()).then_some(filter)
    }
}

pub fn run(args: &Args) -> miette::Result<()> {
    let options = args.options();
    let filter = args.filter();

    // Each file parses independently
    let documents = args
        .files
        .par_iter()
        .map(|path| -> Result<Document, CliError> {
            let mut document = load(path, args.format, &options)?;
            if let Some(filter) = &filter {
                document
                    .filter(filter)
                    .map_err(|e| CliError::parser(e, None))?;
            }
            Ok(document)
        })
        .collect::<Result<Vec<Document>, CliError>>()
        .map_err(CliError::report)?;

    let selectors = Selectors::new(&args.lang, &args.abbr);
    let mut library = Library::new(options);
    for document in documents {
        library
            .insert_document(&selectors, document)
            .map_err(|e| CliError::parser(e, None).report())?;
    }

    write_json(&library, args.pretty).map_err(|e| miette::miette!("{e:#}"))
}

fn write_json(library: &Library, pretty: bool) -> anyhow::Result<()> {
    let doc_sets: Vec<_> = library.doc_sets().collect();
    let mut stdout = io::stdout().lock();
    if pretty {
        serde_json::to_writer_pretty(&mut stdout, &doc_sets)
    } else {
        serde_json::to_writer(&mut stdout, &doc_sets)
    }
    .context("failed to write JSON to stdout")?;
    writeln!(stdout).context("failed to write to stdout")?;
    stdout.flush().context("failed to flush stdout")?;
    Ok(())
}
