//! Input generators for property-based testing
#![allow(clippy::expect_used)]
use proptest::prelude::*;

/// Any string at all, control characters included.
pub fn any_document_string() -> impl Strategy<Value = String> {
    prop::string::string_regex(".*").expect("Failed to create any string strategy")
}

/// Printable ASCII plus newlines and tabs, so backslashes and bars show up often.
pub fn ascii_document() -> impl Strategy<Value = String> {
    prop::string::string_regex(r"[\x20-\x7E\n\t]*").expect("Failed to create ASCII string strategy")
}

/// USFM-shaped input: real markers in random order, possibly unbalanced.
pub fn structured_usfm() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            Just("\\id GEN Genesis\n".to_string()),
            Just("\\h Genesis\n".to_string()),
            Just("\\mt1 Title\n".to_string()),
            Just("\\s1 Heading\n".to_string()),
            Just("\\ip Intro \\bk Book\\bk* text\n".to_string()),
            Just("\\p\n".to_string()),
            Just("\\q2 ".to_string()),
            (1u32..5).prop_map(|n| format!("\\c {n}\n")),
            (1u32..30).prop_map(|n| format!("\\v {n} ")),
            (1u32..30, 1u32..4).prop_map(|(n, extra)| format!("\\v {n}-{} ", n + extra)),
            Just("\\f + \\fr 1:1 \\ft note\\f*".to_string()),
            Just("\\x - \\xo 1:1 \\xt Gen 2:1\\x*".to_string()),
            Just("\\nd Lord\\nd*".to_string()),
            Just("\\nd ".to_string()),
            Just("\\w word|lemma=\"lemma\" strong=\"H1\"\\w*".to_string()),
            Just("\\qt-s |who=\"Someone\"\\*".to_string()),
            Just("\\qt-e\\*".to_string()),
            Just("\\ts\\*".to_string()),
            Just("\\tr \\tc1 a \\tc2 b\n".to_string()),
            Just("|orphan=\"x\"".to_string()),
            Just("~".to_string()),
            Just("//".to_string()),
            prop::string::string_regex(r"[a-zA-Z0-9 .,;:!?\n]{1,20}")
                .expect("Failed to create text chunk"),
        ],
        0..40,
    )
    .prop_map(|chunks| chunks.concat())
}
