use std::fs;

use pretty_assertions::assert_eq;
use sofer_parser::{
    Error, Format, Item, Library, Options, ScopeFilter, Selectors, SequenceType, TokenSubtype,
    parse_file,
};

fn fixture(name: &str) -> String {
    fs::read_to_string(format!("fixtures/{name}")).unwrap_or_default()
}

#[test]
fn one_book_per_doc_set() -> Result<(), Error> {
    let mut library = Library::default();
    let web = Selectors::new("eng", "web");
    let usx = Selectors::new("eng", "usx");

    let from_usfm = library.import_document(&web, Format::Usfm, &fixture("jon.usfm"))?;
    let from_usx = library.import_document(&usx, Format::Usx, &fixture("jon.usx"))?;
    assert!(matches!(
        library.import_document(&web, Format::Usx, &fixture("jon.usx")),
        Err(Error::DuplicateBookCode { .. })
    ));

    assert_eq!(library.doc_sets().count(), 2);
    assert_eq!(library.document("eng_web", from_usfm)?.book_code(), Some("JON"));
    assert_eq!(library.document("eng_usx", from_usx)?.book_code(), Some("JON"));
    Ok(())
}

#[test]
fn notes_live_in_their_own_sequences() -> Result<(), Error> {
    let document = parse_file("fixtures/jon.usfm", &Options::default())?;
    let footnotes: Vec<_> = document
        .sequences()
        .filter(|s| s.sequence_type() == SequenceType::Footnote)
        .collect();
    assert_eq!(footnotes.len(), 1);
    let grafted = document.main().blocks().iter().any(|block| {
        block
            .items()
            .iter()
            .any(|item| matches!(item, Item::Graft(g) if footnotes.first().is_some_and(|s| s.id() == g.target)))
    });
    assert!(grafted);
    assert!(!document.main().plain_text().contains("Tartessus"));
    assert!(
        footnotes
            .first()
            .is_some_and(|s| s.plain_text().contains("Tartessus"))
    );
    Ok(())
}

#[test]
fn chapters_and_verses_are_indexed() -> Result<(), Error> {
    let document = parse_file("fixtures/jon.usfm", &Options::default())?;
    let chapters: Vec<u32> = document.cv_index().chapters().map(|(n, _)| n).collect();
    assert_eq!(chapters, vec![1, 2]);
    assert_eq!(document.cv_index().verse(1, 3).len(), 1);
    assert_eq!(document.cv_index().verse(2, 2).len(), 1);
    assert!(document.cv_index().verse(2, 3).is_empty());
    Ok(())
}

#[test]
fn edits_keep_the_document_consistent() -> Result<(), Error> {
    let mut document = parse_file("fixtures/tit.usfm", &Options::default())?;
    let main = document.main_id();
    let blocks = document.main().blocks().len();

    document.insert_block(main, blocks, "blockTag/p", Vec::new())?;
    document.update_items(
        main,
        blocks,
        vec![
            Item::start("chapter/3"),
            Item::start("verse/9"),
            Item::token(TokenSubtype::WordLike, "Amen"),
            Item::end("verse/9"),
            Item::end("chapter/3"),
        ],
    )?;
    document.verify_invariants()?;
    assert_eq!(document.cv_index().verse(3, 9).len(), 1);

    document.delete_block(main, blocks)?;
    document.verify_invariants()?;
    assert!(document.cv_index().verse(3, 9).is_empty());
    Ok(())
}

#[test]
fn filtered_documents_serialize_without_the_dropped_scopes() -> Result<(), Error> {
    let mut document = parse_file("fixtures/tit.usfm", &Options::default())?;
    document.filter(&ScopeFilter::new().exclude_scopes(["attribute", "milestone"]))?;
    document.verify_invariants()?;

    let json = serde_json::to_string(&document).unwrap_or_default();
    assert!(json.contains("\"mainId\""));
    assert!(json.contains("chapter/1"));
    assert!(!json.contains("attribute/"));
    assert!(!json.contains("milestone/"));
    Ok(())
}

#[test]
fn tables_from_tsv() -> Result<(), Error> {
    let options = Options::builder().with_tsv_header_row().build();
    let document = sofer_parser::parse(&fixture("tit_notes.tsv"), Format::Tsv, &options)?;
    let table = document
        .sequences()
        .find(|s| s.sequence_type() == SequenceType::Table);
    let rows: Vec<&str> = table
        .map(|t| t.blocks().iter().map(|b| b.block_scope()).collect())
        .unwrap_or_default();
    assert_eq!(rows, vec!["tableRow/header", "tableRow/0", "tableRow/1"]);
    Ok(())
}

#[test]
fn usfm_tables_read_like_tsv_tables() -> Result<(), Error> {
    fn rows(document: &sofer_parser::Document) -> Vec<(String, Vec<String>)> {
        document
            .sequences()
            .find(|s| s.sequence_type() == SequenceType::Table)
            .map(|table| {
                table
                    .blocks()
                    .iter()
                    .map(|b| {
                        let cells = b.included_scopes().iter().map(str::to_string).collect();
                        (b.block_scope().to_string(), cells)
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    let usfm = sofer_parser::parse_usfm(
        "\\p a\n\\tr \\th1 A \\th2 B\n\\tr \\tc1 x \\tc2 y\n\\p b",
        &Options::default(),
    )?;
    let tsv = sofer_parser::parse("A\tB\nx\ty\n", Format::Tsv, &Options::default())?;
    assert_eq!(rows(&usfm), rows(&tsv));
    assert_eq!(
        rows(&usfm).first().map(|(_, cells)| cells.clone()),
        Some(vec!["tableCell/0".to_string(), "tableCell/1".to_string()])
    );

    let main: Vec<&str> = usfm.main().blocks().iter().map(|b| b.block_scope()).collect();
    assert_eq!(main, vec!["blockTag/p", "blockTag/p"]);
    assert_eq!(usfm.main().blocks().get(1).map(|b| b.grafts().len()), Some(1));
    assert_eq!(usfm.main().plain_text(), "a\nb");
    Ok(())
}

#[test]
fn verses_inside_table_cells_stay_in_the_row() -> Result<(), Error> {
    let document = sofer_parser::parse_usfm(
        "\\c 7\n\\p a\n\\tr \\tc1 \\v 12 Nahshon \\tc2 Judah\n\\p b",
        &Options::default(),
    )?;
    let table = document
        .sequences()
        .find(|s| s.sequence_type() == SequenceType::Table);
    assert!(table.is_some_and(|t| t.plain_text().contains("Nahshon")));
    assert!(!document.main().plain_text().contains("Nahshon"));
    document.verify_invariants()?;
    Ok(())
}
