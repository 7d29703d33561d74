use std::{
    collections::BTreeSet,
    io::{self, Write},
    path::PathBuf,
};

use crossterm::style::Stylize;
use sofer_parser::{Block, Document, Format, Item, Options, Sequence, SequenceId};

use crate::{error::CliError, subcommands::load};

/// Print the sequence and block outline of a document
#[derive(clap::Args, Debug)]
pub struct Args {
    /// Input file
    pub file: PathBuf,

    /// Input format; detected from the file extension when omitted
    #[arg(long)]
    pub format: Option<Format>,

    /// Show the scopes open at the start of each block
    #[arg(long)]
    pub show_open_scopes: bool,

    /// Maximum depth to display (0 = unlimited)
    #[arg(long, default_value = "0")]
    pub max_depth: usize,
}

struct TreeWriter<'d, W: Write> {
    writer: W,
    document: &'d Document,
    depth: usize,
    is_last_stack: Vec<bool>,
    visited: BTreeSet<SequenceId>,
    show_open_scopes: bool,
    max_depth: usize,
}

impl<'d, W: Write> TreeWriter<'d, W> {
    fn new(writer: W, document: &'d Document, args: &Args) -> Self {
        Self {
            writer,
            document,
            depth: 0,
            is_last_stack: Vec::new(),
            visited: BTreeSet::new(),
            show_open_scopes: args.show_open_scopes,
            max_depth: args.max_depth,
        }
    }

    fn should_show(&self) -> bool {
        self.max_depth == 0 || self.depth <= self.max_depth
    }

    fn print_tree_line(&mut self, name: &str, detail: Option<&str>) -> io::Result<()> {
        if !self.should_show() {
            return Ok(());
        }

        for (i, is_last) in self.is_last_stack.iter().enumerate() {
            let connector = match (i + 1 == self.depth, *is_last) {
                (true, true) => "└─ ",
                (true, false) => "├─ ",
                (false, true) => "   ",
                (false, false) => "│  ",
            };
            write!(self.writer, "{connector}")?;
        }

        write!(self.writer, "{}", name.cyan().bold())?;
        if let Some(d) = detail {
            write!(self.writer, ": {}", d.yellow())?;
        }
        writeln!(self.writer)
    }

    fn print_scopes(&mut self, name: &str, labels: Vec<&str>) -> io::Result<()> {
        if !self.should_show() {
            return Ok(());
        }
        let connectors: String = self
            .is_last_stack
            .iter()
            .map(|is_last| if *is_last { "   " } else { "│  " })
            .collect();
        writeln!(
            self.writer,
            "{connectors}{} {}",
            format!("{name}:").dark_grey(),
            labels.join(" ").dark_grey()
        )
    }

    fn with_child<F>(&mut self, is_last: bool, f: F) -> io::Result<()>
    where
        F: FnOnce(&mut Self) -> io::Result<()>,
    {
        self.is_last_stack.push(is_last);
        self.depth += 1;
        let result = f(self);
        self.is_last_stack.pop();
        self.depth -= 1;
        result
    }

    fn write_document(&mut self) -> io::Result<()> {
        let title = match self.document.book_code() {
            Some(book) => format!("Document {book}"),
            None => "Document".to_string(),
        };
        writeln!(self.writer, "{}", title.blue().bold())?;
        let main = self.document.main_id();
        self.with_child(true, |tree| tree.write_sequence(main))
    }

    fn write_sequence(&mut self, id: SequenceId) -> io::Result<()> {
        let document = self.document;
        let Ok(sequence) = document.sequence(id) else {
            return self.print_tree_line("missing sequence", Some(&id.to_string()));
        };
        if !self.visited.insert(id) {
            return self.print_tree_line("already shown", Some(&id.to_string()));
        }
        let detail = format!("{id} {} blocks", sequence.blocks().len());
        self.print_tree_line(sequence.sequence_type().as_str(), Some(&detail))?;
        self.write_blocks(sequence)
    }

    fn write_blocks(&mut self, sequence: &'d Sequence) -> io::Result<()> {
        let count = sequence.blocks().len();
        for (index, block) in sequence.blocks().iter().enumerate() {
            self.with_child(index + 1 == count, |tree| tree.write_block(block))?;
        }
        Ok(())
    }

    fn write_block(&mut self, block: &'d Block) -> io::Result<()> {
        let text = truncate(&block.plain_text(), 50);
        self.print_tree_line(block.block_scope(), Some(&text))?;
        if self.show_open_scopes && !block.open_scopes().is_empty() {
            self.print_scopes("open", block.open_scopes().iter().collect())?;
        }
        if !block.included_scopes().is_empty() {
            self.print_scopes("included", block.included_scopes().iter().collect())?;
        }

        let inline = block.items().iter().filter_map(|item| match item {
            Item::Graft(graft) => Some(graft),
            Item::Token(_) | Item::Scope(_) => None,
        });
        let grafts: Vec<_> = block.grafts().iter().chain(inline).collect();
        let count = grafts.len();
        for (index, graft) in grafts.into_iter().enumerate() {
            self.with_child(index + 1 == count, |tree| tree.write_sequence(graft.target))?;
        }
        Ok(())
    }

    fn write_warnings(&mut self) -> io::Result<()> {
        if self.document.warnings().is_empty() {
            return Ok(());
        }
        writeln!(self.writer)?;
        writeln!(self.writer, "{}", "Warnings".red().bold())?;
        for warning in self.document.warnings() {
            writeln!(self.writer, "  {} {warning}", "!".red())?;
        }
        Ok(())
    }
}

/// Truncate text for display
fn truncate(text: &str, max_chars: usize) -> String {
    let count = text.chars().count();
    if count <= max_chars {
        text.to_string()
    } else {
        let head: String = text.chars().take(max_chars).collect();
        format!("{head}... ({count} chars)")
    }
}

pub fn run(args: &Args) -> miette::Result<()> {
    let document = load(&args.file, args.format, &Options::default()).map_err(CliError::report)?;

    let stdout = io::stdout();
    let mut tree = TreeWriter::new(stdout.lock(), &document, args);
    tree.write_document()
        .and_then(|()| tree.write_warnings())
        .map_err(|e| miette::miette!("failed to write to stdout: {e}"))
}
