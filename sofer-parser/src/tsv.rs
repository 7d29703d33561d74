//! Tab-separated tables, imported as a document whose only main block grafts a
//! `table` sequence.
use crate::{
    Document, Error, Options,
    lexer::{LexerState, lex_text},
    model::{Block, Graft, Item, SequenceType},
};

#[tracing::instrument(level = "trace", skip_all, fields(len = input.len()))]
pub(crate) fn parse_tsv(input: &str, options: &Options) -> Result<Document, Error> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(input.as_bytes());
    let state = LexerState::new(input);
    let mut rows = Vec::new();

    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|e| {
            tracing::error!(error = %e, row = index, "malformed TSV");
            Error::from(e)
        })?;
        let row = if options.tsv_header_row {
            index.checked_sub(1)
        } else {
            Some(index)
        };
        let mut block = Block::new(row.map_or_else(
            || "tableRow/header".to_string(),
            |row| format!("tableRow/{row}"),
        ));
        let mut offset = record
            .position()
            .and_then(|position| usize::try_from(position.byte()).ok())
            .unwrap_or_default();
        for (column, field) in record.iter().enumerate() {
            let cell = format!("tableCell/{column}");
            block.items.push(Item::start(cell.as_str()));
            for pretoken in lex_text(field, offset, &state)? {
                if let Some((subtype, payload)) = pretoken.as_token() {
                    block.items.push(Item::token(subtype, payload));
                }
            }
            block.items.push(Item::end(cell));
            offset += field.len() + 1;
        }
        rows.push(block);
    }

    let warnings = state.into_warnings();
    if options.strict
        && let Some(warning) = warnings.first()
    {
        tracing::error!(%warning, "TSV warning in strict mode");
        return Err(Error::StrictMode(warning.clone()));
    }

    let mut document = Document::new();
    let table = document.add_sequence(SequenceType::Table);
    document.sequence_mut(table)?.blocks = rows;
    let mut graft_block = Block::new("blockTag/tableGraft");
    graft_block.grafts.push(Graft {
        subtype: SequenceType::Table,
        target: table,
    });
    let main = document.main_id();
    document.sequence_mut(main)?.blocks.push(graft_block);
    document.warnings = warnings;
    document.rebuild_scope_caches();
    document.rebuild_cv_index();
    Ok(document)
}
