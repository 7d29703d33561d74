//! Parser and edit invariants checked with property-based testing
//!
//! - P0: the lexers and the parser never panic
//! - P1: every parsed sequence is balanced block to block
//! - P2: edits keep the caches consistent

use proptest::prelude::*;

use crate::{Document, Options, ScopeFilter, ScopeSet, lex_usfm, parse_usfm, parse_usx};

use super::generators::*;

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 500,
        max_shrink_iters: 10000,
        .. ProptestConfig::default()
    })]

    // ====================================================================
    // P0: CRITICAL INVARIANTS
    // ====================================================================

    #[test]
    fn parser_never_panics(input in any_document_string()) {
        let _ = parse_usfm(&input, &Options::default());
    }

    #[test]
    fn usx_lexer_never_panics(input in ascii_document()) {
        let _ = parse_usx(&input, &Options::default());
    }

    /// The USFM grammar covers every input: lexing itself never fails.
    #[test]
    fn usfm_lexing_is_total(input in ascii_document()) {
        prop_assert!(lex_usfm(&input).is_ok());
    }

    #[test]
    fn warning_locations_in_bounds(input in ascii_document()) {
        if let Ok(lexed) = lex_usfm(&input) {
            for warning in &lexed.warnings {
                if let Some(location) = &warning.location {
                    prop_assert!(location.absolute_end <= input.len());
                    prop_assert!(location.absolute_start <= location.absolute_end);
                }
            }
        }
    }

    // ====================================================================
    // P1: STRUCTURAL INVARIANTS
    // ====================================================================

    #[test]
    fn scopes_balance_between_blocks(input in structured_usfm()) {
        if let Ok(document) = parse_usfm(&input, &Options::default()) {
            prop_assert!(document.verify_invariants().is_ok());
            verify_block_chain(&document)?;
        }
    }

    // ====================================================================
    // P2: EDIT INVARIANTS
    // ====================================================================

    #[test]
    fn identity_updates_change_nothing(input in structured_usfm()) {
        if let Ok(mut document) = parse_usfm(&input, &Options::default()) {
            let before = document.clone();
            let main = document.main_id();
            let contents: Vec<_> = document.main().blocks().iter().map(|b| b.items().to_vec()).collect();
            for (position, items) in contents.into_iter().enumerate() {
                prop_assert!(document.update_items(main, position, items).is_ok());
            }
            prop_assert_eq!(document, before);
        }
    }

    #[test]
    fn excluded_scopes_never_stay_open(input in structured_usfm()) {
        if let Ok(mut document) = parse_usfm(&input, &Options::default()) {
            let filter = ScopeFilter::new().exclude_scopes(["chapter", "verse"]);
            prop_assert!(document.filter(&filter).is_ok());
            for sequence in document.sequences() {
                for block in sequence.blocks() {
                    prop_assert!(!block.open_scopes().iter().any(|l| l.starts_with("chapter") || l.starts_with("verse")));
                }
            }
            prop_assert!(document.verify_invariants().is_ok());
        }
    }

    #[test]
    fn deleting_blocks_keeps_caches_consistent(input in structured_usfm(), pick in any::<prop::sample::Index>()) {
        if let Ok(mut document) = parse_usfm(&input, &Options::default()) {
            let len = document.main().blocks().len();
            if len > 0 {
                let main = document.main_id();
                prop_assert!(document.delete_block(main, pick.index(len)).is_ok());
                prop_assert!(document.verify_invariants().is_ok());
            }
        }
    }
}

// ====================================================================
// Helper functions for invariant verification
// ====================================================================

/// `open[i] + started[i] - ended[i] == open[i + 1]` for every adjacent pair.
fn verify_block_chain(document: &Document) -> Result<(), TestCaseError> {
    for sequence in document.sequences() {
        let mut expected = ScopeSet::new();
        for block in sequence.blocks() {
            prop_assert_eq!(block.open_scopes(), &expected);
            expected = block.closing_scopes();
        }
    }
    Ok(())
}
