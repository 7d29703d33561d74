use crate::{
    error::WarningKind,
    lexer::{LexerState, is_line_space, is_punctuation, is_word_like},
    pretoken::{BreakKind, PreToken, PrintableSubtype, TagPosition},
};

peg::parser! {
    pub(crate) grammar usfm_lexer(state: &LexerState) for str {
        pub rule pretokens() -> Vec<PreToken>
            = groups:group()* ![_] { groups.into_iter().flatten().collect() }

        /// Plain text only, no markers. Used for XML text nodes and table cells.
        pub rule printables() -> Vec<PreToken>
            = tokens:text()* ![_] { tokens }

        rule group() -> Vec<PreToken>
            = empty_milestone()
            / pretoken:marker() { vec![pretoken] }
            / pretoken:break_() { vec![pretoken] }
            / pretoken:text() { vec![pretoken] }

        rule marker() -> PreToken
            = chapter()
            / pub_chapter()
            / verses()
            / attribute()
            / default_attribute()
            / milestone()
            / end_milestone_marker()
            / end_tag()
            / start_tag()
            / bare_slash()

        rule chapter() -> PreToken
            = "\\c" ws() number:$(['0'..='9']+) ws()? {
                PreToken::Chapter { number: number.to_string() }
            }

        rule pub_chapter() -> PreToken
            = "\\cp" hspace()+ number:$([^ '\\' | '\r' | '\n']+) ws()? {
                PreToken::PrintChapter { number: number.trim().to_string() }
            }

        rule verses() -> PreToken
            = "\\v" ws() number:$(['0'..='9']+ ['0'..='9' | '-' | ',' | 'a'..='z' | 'A'..='Z']*) ws()? {
                PreToken::verses(number)
            }

        rule attribute() -> PreToken
            = hspace()* "|"? hspace()* key:$(['a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_']+)
              "=\"" value:$([^ '"']*) "\"" hspace()? {
                PreToken::attribute(key, value)
            }

        rule default_attribute() -> PreToken
            = hspace()* "|" value:$([^ '|' | '\\']+) {
                PreToken::attribute("default", value)
            }

        rule empty_milestone() -> Vec<PreToken>
            = "\\" name:marker_name() "\\*" {
                vec![
                    PreToken::Milestone {
                        position: TagPosition::Start,
                        name: name.to_string(),
                        is_empty: true,
                    },
                    PreToken::EndMilestoneMarker,
                ]
            }

        rule milestone() -> PreToken
            = "\\" name:marker_name() "-" side:$(['s' | 'e']) !name_char() hspace()* {
                PreToken::Milestone {
                    position: if side == "s" { TagPosition::Start } else { TagPosition::End },
                    name: name.to_string(),
                    is_empty: false,
                }
            }

        rule end_milestone_marker() -> PreToken
            = "\\*" { PreToken::EndMilestoneMarker }

        rule end_tag() -> PreToken
            = "\\" "+"? name:marker_name() "*" { PreToken::end_tag(name) }

        rule start_tag() -> PreToken
            = "\\" "+"? name:marker_name() hspace()? { PreToken::start_tag(name) }

        rule bare_slash() -> PreToken
            = start:position!() "\\" {
                state.add_warning(WarningKind::BadFragment, "bare backslash".to_string(), start, start + 1);
                PreToken::Bad { raw: "\\".to_string() }
            }

        rule break_() -> PreToken
            = "~" { PreToken::Break(BreakKind::NoBreakSpace) }
            / "//" { PreToken::Break(BreakKind::SoftLineBreak) }

        rule text() -> PreToken
            = eol()
            / word_like()
            / line_space()
            / punctuation()
            / bad()

        rule eol() -> PreToken
            = hspace()* "\r"? "\n" hspace()* { PreToken::printable(PrintableSubtype::Eol, "\n") }

        rule word_like() -> PreToken
            = text:$([c if is_word_like(c)]+) { PreToken::printable(PrintableSubtype::WordLike, text) }

        rule line_space() -> PreToken
            = text:$([c if is_line_space(c)]+) { PreToken::printable(PrintableSubtype::LineSpace, text) }

        rule punctuation() -> PreToken
            = text:$([c if is_punctuation(c)]) { PreToken::printable(PrintableSubtype::Punctuation, text) }

        rule bad() -> PreToken
            = start:position!() raw:$([_]) end:position!() {
                state.add_warning(WarningKind::BadFragment, format!("unrecognised character {raw:?}"), start, end);
                PreToken::Bad { raw: raw.to_string() }
            }

        rule marker_name() -> &'input str
            = $(['a'..='z' | 'A'..='Z'] name_char()*)

        rule name_char() = ['a'..='z' | 'A'..='Z' | '0'..='9' | '_']

        rule hspace() = [' ' | '\t']

        rule ws() = quiet!{[' ' | '\t' | '\r' | '\n']+}
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::lexer::lex_usfm;

    fn lex(input: &str) -> Vec<PreToken> {
        lex_usfm(input).map(|l| l.pretokens).unwrap_or_default()
    }

    fn word(text: &str) -> PreToken {
        PreToken::printable(PrintableSubtype::WordLike, text)
    }

    fn space() -> PreToken {
        PreToken::printable(PrintableSubtype::LineSpace, " ")
    }

    #[test]
    fn test_chapter_verse_and_text() {
        assert_eq!(
            lex("\\c 1\n\\p\n\\v 1 In the"),
            vec![
                PreToken::Chapter {
                    number: "1".to_string()
                },
                PreToken::start_tag("p"),
                PreToken::printable(PrintableSubtype::Eol, "\n"),
                PreToken::verses("1"),
                word("In"),
                space(),
                word("the"),
            ]
        );
    }

    #[test]
    fn test_character_markers_and_attributes() {
        assert_eq!(
            lex("\\w gracious|lemma=\"grace\"\\w* \\+nd Lord\\+nd*"),
            vec![
                PreToken::start_tag("w"),
                word("gracious"),
                PreToken::attribute("lemma", "grace"),
                PreToken::end_tag("w"),
                space(),
                PreToken::start_tag("nd"),
                word("Lord"),
                PreToken::end_tag("nd"),
            ]
        );
    }

    #[test]
    fn test_default_attribute() {
        assert_eq!(
            lex("\\w gracious|grace\\w*"),
            vec![
                PreToken::start_tag("w"),
                word("gracious"),
                PreToken::attribute("default", "grace"),
                PreToken::end_tag("w"),
            ]
        );
    }

    #[test]
    fn test_milestones() {
        assert_eq!(
            lex("\\qt-s |who=\"Pilate\"\\*\\qt-e\\*\\ts\\*"),
            vec![
                PreToken::Milestone {
                    position: TagPosition::Start,
                    name: "qt".to_string(),
                    is_empty: false,
                },
                PreToken::attribute("who", "Pilate"),
                PreToken::EndMilestoneMarker,
                PreToken::Milestone {
                    position: TagPosition::End,
                    name: "qt".to_string(),
                    is_empty: false,
                },
                PreToken::EndMilestoneMarker,
                PreToken::Milestone {
                    position: TagPosition::Start,
                    name: "ts".to_string(),
                    is_empty: true,
                },
                PreToken::EndMilestoneMarker,
            ]
        );
    }

    #[test]
    fn test_breaks_and_punctuation() {
        assert_eq!(
            lex("a~b//c,"),
            vec![
                word("a"),
                PreToken::Break(BreakKind::NoBreakSpace),
                word("b"),
                PreToken::Break(BreakKind::SoftLineBreak),
                word("c"),
                PreToken::printable(PrintableSubtype::Punctuation, ","),
            ]
        );
    }

    #[test]
    fn test_verse_ranges_and_pub_chapter() {
        assert_eq!(
            lex("\\cp A\n\\v 2-3 x"),
            vec![
                PreToken::PrintChapter {
                    number: "A".to_string()
                },
                PreToken::verses("2-3"),
                word("x"),
            ]
        );
    }

    #[test]
    #[tracing_test::traced_test]
    fn test_bad_fragments_warn_and_continue() {
        let lexed = lex_usfm("a \\ b\u{0}c").unwrap_or_default();
        assert_eq!(
            lexed.pretokens,
            vec![
                word("a"),
                space(),
                PreToken::Bad {
                    raw: "\\".to_string()
                },
                space(),
                word("b"),
                PreToken::Bad {
                    raw: "\u{0}".to_string()
                },
                word("c"),
            ]
        );
        assert_eq!(lexed.warnings.len(), 2);
        assert_eq!(
            lexed.warnings.first().and_then(|w| w.location.as_ref()).map(|l| l.absolute_start),
            Some(2)
        );
        assert!(logs_contain("bare backslash"));
    }
}
