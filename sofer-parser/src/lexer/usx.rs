use roxmltree::{Document, Node};

use crate::{
    Error,
    error::{Detail, WarningKind},
    lexer::{LexerState, Lexed, lex_text},
    model::Location,
    pretoken::{BreakKind, PreToken, PrintableSubtype, TagPosition},
};

/// What to do with one USX element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Handler {
    /// No pretoken for the element itself; children are still lexed.
    Ignore,
    /// Like `Ignore`, but recorded as a warning.
    NotHandled,
    Book,
    Chapter,
    Verse,
    Para,
    Char,
    Note,
    Milestone,
    Figure,
    OptBreak,
    Row,
    Cell,
}

const HANDLERS: &[(&str, Handler)] = &[
    ("usx", Handler::Ignore),
    ("table", Handler::Ignore),
    ("book", Handler::Book),
    ("chapter", Handler::Chapter),
    ("verse", Handler::Verse),
    ("para", Handler::Para),
    ("char", Handler::Char),
    ("note", Handler::Note),
    ("ms", Handler::Milestone),
    ("figure", Handler::Figure),
    ("optbreak", Handler::OptBreak),
    ("row", Handler::Row),
    ("cell", Handler::Cell),
    ("ref", Handler::NotHandled),
    ("sidebar", Handler::NotHandled),
    ("periph", Handler::NotHandled),
];

/// Attributes that select the marker rather than carry data.
const STRUCTURAL_ATTRIBUTES: &[&str] = &["style", "closed", "sid", "eid", "vid", "caller"];

pub(super) fn lex(input: &str) -> Result<Lexed, Error> {
    let document = Document::parse(input).map_err(|e| {
        tracing::error!(error = %e, "malformed USX");
        Error::from(e)
    })?;
    let state = LexerState::new(input);
    let mut walker = Walker {
        input,
        state: &state,
        pretokens: Vec::new(),
    };
    walker.element(document.root_element())?;
    let pretokens = walker.pretokens;
    Ok(Lexed {
        pretokens,
        warnings: state.into_warnings(),
    })
}

struct Walker<'a, 's> {
    input: &'a str,
    state: &'s LexerState<'a>,
    pretokens: Vec<PreToken>,
}

impl Walker<'_, '_> {
    fn children(&mut self, node: Node<'_, '_>) -> Result<(), Error> {
        for child in node.children() {
            if child.is_element() {
                self.element(child)?;
            } else if child.is_text()
                && let Some(text) = child.text()
            {
                self.text(text, child.range().start)?;
            }
        }
        Ok(())
    }

    fn text(&mut self, text: &str, offset: usize) -> Result<(), Error> {
        let pretokens = lex_text(text, offset, self.state)?;
        self.pretokens.extend(pretokens);
        Ok(())
    }

    fn data_attributes(&mut self, node: Node<'_, '_>) {
        for attribute in node.attributes() {
            if !STRUCTURAL_ATTRIBUTES.contains(&attribute.name()) {
                self.pretokens
                    .push(PreToken::attribute(attribute.name(), attribute.value()));
            }
        }
    }

    fn element(&mut self, node: Node<'_, '_>) -> Result<(), Error> {
        let name = node.tag_name().name();
        let range = node.range();
        let Some(handler) = HANDLERS
            .iter()
            .find_map(|(element, handler)| (*element == name).then_some(*handler))
        else {
            let location = Location::from_offsets(self.input, range.start, range.end);
            tracing::error!(element = name, %location, "unhandled USX element");
            return Err(Error::UnhandledElement {
                name: name.to_string(),
                detail: Detail { location },
            });
        };
        let style = node.attribute("style").unwrap_or(name);

        match handler {
            Handler::Ignore => self.children(node)?,
            Handler::NotHandled => {
                self.state.add_warning(
                    WarningKind::NotHandledElement,
                    format!("element <{name}> is not handled"),
                    range.start,
                    range.end,
                );
                self.children(node)?;
            }
            Handler::Book => {
                self.pretokens.push(PreToken::start_tag("id"));
                if let Some(code) = node.attribute("code") {
                    self.pretokens
                        .push(PreToken::printable(PrintableSubtype::WordLike, code));
                    self.pretokens
                        .push(PreToken::printable(PrintableSubtype::LineSpace, " "));
                }
                self.children(node)?;
                self.pretokens.push(PreToken::end_tag("id"));
            }
            Handler::Chapter => {
                if node.has_attribute("eid") {
                    return Ok(());
                }
                if let Some(number) = node.attribute("number") {
                    self.pretokens.push(PreToken::Chapter {
                        number: number.to_string(),
                    });
                }
                if let Some(number) = node.attribute("pubnumber") {
                    self.pretokens.push(PreToken::PrintChapter {
                        number: number.to_string(),
                    });
                }
            }
            Handler::Verse => {
                if node.has_attribute("eid") {
                    return Ok(());
                }
                if let Some(number) = node.attribute("number") {
                    self.pretokens.push(PreToken::verses(number));
                }
            }
            Handler::Para | Handler::Row | Handler::Cell => {
                let style = if handler == Handler::Row { "tr" } else { style };
                self.pretokens.push(PreToken::start_tag(style));
                self.children(node)?;
                self.pretokens.push(PreToken::end_tag(style));
            }
            Handler::Char => {
                self.pretokens.push(PreToken::start_tag(style));
                self.children(node)?;
                self.data_attributes(node);
                self.pretokens.push(PreToken::end_tag(style));
            }
            Handler::Note => {
                self.pretokens.push(PreToken::start_tag(style));
                if let Some(caller) = node.attribute_node("caller") {
                    self.text(caller.value(), caller.range_value().start)?;
                    self.pretokens
                        .push(PreToken::printable(PrintableSubtype::LineSpace, " "));
                }
                self.children(node)?;
                self.pretokens.push(PreToken::end_tag(style));
            }
            Handler::Milestone => {
                let (position, milestone, is_empty) = if let Some(base) = style.strip_suffix("-s") {
                    (TagPosition::Start, base, false)
                } else if let Some(base) = style.strip_suffix("-e") {
                    (TagPosition::End, base, false)
                } else {
                    (TagPosition::Start, style, true)
                };
                self.pretokens.push(PreToken::Milestone {
                    position,
                    name: milestone.to_string(),
                    is_empty,
                });
                self.data_attributes(node);
                self.pretokens.push(PreToken::EndMilestoneMarker);
            }
            Handler::Figure => {
                self.pretokens.push(PreToken::start_tag("fig"));
                self.children(node)?;
                self.data_attributes(node);
                self.pretokens.push(PreToken::end_tag("fig"));
            }
            Handler::OptBreak => self.pretokens.push(PreToken::Break(BreakKind::SoftLineBreak)),
        }
        Ok(())
    }
}
