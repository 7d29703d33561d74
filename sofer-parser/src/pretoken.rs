//! Lexical units shared by every input format.
use std::fmt;

use crate::model::{SLASH_PLACEHOLDER, TokenSubtype};

/// Longest verse range a `Verses` marker is exploded into.
const MAX_VERSE_RANGE: u32 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagPosition {
    Start,
    End,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub position: TagPosition,
    pub name: String,
    pub level: String,
}

impl Tag {
    /// Splits a raw marker such as `q2` into its base name and level.
    #[must_use]
    pub fn new(position: TagPosition, raw: &str) -> Self {
        let (name, level) = split_tag_level(raw);
        Self {
            position,
            name: name.to_string(),
            level: level.to_string(),
        }
    }

    /// The name with its level appended, except for level 1 which is implicit.
    #[must_use]
    pub fn full_name(&self) -> String {
        if self.level == "1" {
            self.name.clone()
        } else {
            format!("{}{}", self.name, self.level)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrintableSubtype {
    WordLike,
    LineSpace,
    Punctuation,
    Eol,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BreakKind {
    NoBreakSpace,
    SoftLineBreak,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreToken {
    Tag(Tag),
    Chapter {
        number: String,
    },
    PrintChapter {
        number: String,
    },
    Verses {
        number: String,
        exploded: Vec<u32>,
    },
    Printable {
        subtype: PrintableSubtype,
        text: String,
    },
    Break(BreakKind),
    Milestone {
        position: TagPosition,
        name: String,
        is_empty: bool,
    },
    /// The `\*` closing a milestone's attribute list.
    EndMilestoneMarker,
    Attribute {
        key: String,
        values: Vec<String>,
    },
    Bad {
        raw: String,
    },
}

/// The discriminant of a [`PreToken`], used by the rule table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreTokenKind {
    Tag,
    Chapter,
    PrintChapter,
    Verses,
    Printable,
    Break,
    Milestone,
    EndMilestoneMarker,
    Attribute,
    Bad,
}

impl PreToken {
    pub(crate) fn start_tag(raw: &str) -> Self {
        Self::Tag(Tag::new(TagPosition::Start, raw))
    }

    pub(crate) fn end_tag(raw: &str) -> Self {
        Self::Tag(Tag::new(TagPosition::End, raw))
    }

    pub(crate) fn verses(number: &str) -> Self {
        Self::Verses {
            number: number.to_string(),
            exploded: explode_verses(number),
        }
    }

    pub(crate) fn printable(subtype: PrintableSubtype, text: &str) -> Self {
        Self::Printable {
            subtype,
            text: text.to_string(),
        }
    }

    /// Builds an attribute, splitting the raw value on `,` and escaping `/`.
    pub(crate) fn attribute(key: &str, raw_value: &str) -> Self {
        Self::Attribute {
            key: key.to_string(),
            values: raw_value
                .split(',')
                .map(|v| v.trim().replace('/', &SLASH_PLACEHOLDER.to_string()))
                .collect(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> PreTokenKind {
        match self {
            Self::Tag(_) => PreTokenKind::Tag,
            Self::Chapter { .. } => PreTokenKind::Chapter,
            Self::PrintChapter { .. } => PreTokenKind::PrintChapter,
            Self::Verses { .. } => PreTokenKind::Verses,
            Self::Printable { .. } => PreTokenKind::Printable,
            Self::Break(_) => PreTokenKind::Break,
            Self::Milestone { .. } => PreTokenKind::Milestone,
            Self::EndMilestoneMarker => PreTokenKind::EndMilestoneMarker,
            Self::Attribute { .. } => PreTokenKind::Attribute,
            Self::Bad { .. } => PreTokenKind::Bad,
        }
    }

    /// The trigger strings this pretoken fires against open scopes' end rules.
    #[must_use]
    pub fn trigger_keys(&self) -> Vec<String> {
        match self {
            Self::Tag(tag) => {
                let prefix = match tag.position {
                    TagPosition::Start => "startTag",
                    TagPosition::End => "endTag",
                };
                let full = tag.full_name();
                let mut keys = vec![format!("{prefix}/{full}")];
                if full != tag.name {
                    keys.push(format!("{prefix}/{}", tag.name));
                }
                keys
            }
            Self::Chapter { .. } => vec!["chapter".to_string()],
            Self::PrintChapter { .. } => vec!["pubChapter".to_string()],
            Self::Verses { .. } => vec!["verses".to_string()],
            Self::Milestone { position, name, .. } => match position {
                TagPosition::Start => vec![format!("startMilestone/{name}")],
                TagPosition::End => vec![format!("endMilestone/{name}")],
            },
            Self::EndMilestoneMarker => vec!["endMilestoneMarker".to_string()],
            Self::Printable { .. } | Self::Break(_) | Self::Attribute { .. } | Self::Bad { .. } => {
                Vec::new()
            }
        }
    }

    /// The token this pretoken contributes to block content, if it is content at all.
    #[must_use]
    pub fn as_token(&self) -> Option<(TokenSubtype, &str)> {
        match self {
            Self::Printable { subtype, text } => Some((
                match subtype {
                    PrintableSubtype::WordLike => TokenSubtype::WordLike,
                    PrintableSubtype::LineSpace => TokenSubtype::LineSpace,
                    PrintableSubtype::Punctuation => TokenSubtype::Punctuation,
                    PrintableSubtype::Eol => TokenSubtype::Eol,
                },
                text.as_str(),
            )),
            Self::Break(BreakKind::NoBreakSpace) => Some((TokenSubtype::NoBreakSpace, "\u{a0}")),
            Self::Break(BreakKind::SoftLineBreak) => Some((TokenSubtype::SoftLineBreak, "//")),
            Self::Bad { raw } => Some((TokenSubtype::Bad, raw.as_str())),
            Self::Tag(_)
            | Self::Chapter { .. }
            | Self::PrintChapter { .. }
            | Self::Verses { .. }
            | Self::Milestone { .. }
            | Self::EndMilestoneMarker
            | Self::Attribute { .. } => None,
        }
    }
}

impl fmt::Display for PreToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tag(tag) => match tag.position {
                TagPosition::Start => write!(f, "\\{}", tag.full_name()),
                TagPosition::End => write!(f, "\\{}*", tag.full_name()),
            },
            Self::Chapter { number } => write!(f, "\\c {number}"),
            Self::PrintChapter { number } => write!(f, "\\cp {number}"),
            Self::Verses { number, .. } => write!(f, "\\v {number}"),
            Self::Printable { text, .. } => write!(f, "{text:?}"),
            Self::Break(BreakKind::NoBreakSpace) => f.write_str("~"),
            Self::Break(BreakKind::SoftLineBreak) => f.write_str("//"),
            Self::Milestone {
                position, name, ..
            } => match position {
                TagPosition::Start => write!(f, "\\{name}-s"),
                TagPosition::End => write!(f, "\\{name}-e"),
            },
            Self::EndMilestoneMarker => f.write_str("\\*"),
            Self::Attribute { key, values } => write!(f, "{key}=\"{}\"", values.join(",")),
            Self::Bad { raw } => write!(f, "bad({raw:?})"),
        }
    }
}

/// Splits a trailing run of digits off a marker name. The level defaults to `1`.
#[must_use]
pub fn split_tag_level(raw: &str) -> (&str, &str) {
    let base_len = raw.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    match (raw.get(..base_len), raw.get(base_len..)) {
        (Some(base), Some(level)) if !base.is_empty() && !level.is_empty() => (base, level),
        _ => (raw, "1"),
    }
}

/// Every verse number named by a verse marker such as `2`, `2-3`, `4a` or `1,3`.
#[must_use]
pub fn explode_verses(number: &str) -> Vec<u32> {
    let mut verses = Vec::new();
    for part in number.split(',') {
        let mut bounds = part.splitn(2, '-').map(leading_number);
        let (Some(Some(from)), to) = (bounds.next(), bounds.next()) else {
            continue;
        };
        match to {
            Some(Some(to)) if to > from && to - from <= MAX_VERSE_RANGE => {
                verses.extend(from..=to);
            }
            _ => verses.push(from),
        }
    }
    verses
}

fn leading_number(part: &str) -> Option<u32> {
    let digits = part
        .trim()
        .split(|c: char| !c.is_ascii_digit())
        .next()
        .unwrap_or_default();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[rstest::rstest]
    #[case("q2", ("q", "2"))]
    #[case("q", ("q", "1"))]
    #[case("mt3", ("mt", "3"))]
    #[case("toc1", ("toc", "1"))]
    #[case("42", ("42", "1"))]
    fn tag_level_splitting(#[case] raw: &str, #[case] expected: (&str, &str)) {
        assert_eq!(split_tag_level(raw), expected);
    }

    #[rstest::rstest]
    #[case("2", vec![2])]
    #[case("2-3", vec![2, 3])]
    #[case("4a", vec![4])]
    #[case("4b-6", vec![4, 5, 6])]
    #[case("1,3", vec![1, 3])]
    #[case("7-5", vec![7])]
    #[case("x", vec![])]
    fn verse_explosion(#[case] number: &str, #[case] expected: Vec<u32>) {
        assert_eq!(explode_verses(number), expected);
    }

    #[test]
    fn full_name_hides_level_one() {
        assert_eq!(Tag::new(TagPosition::Start, "q1").full_name(), "q");
        assert_eq!(Tag::new(TagPosition::Start, "q2").full_name(), "q2");
    }

    #[test]
    fn tag_triggers_cover_full_and_base_name() {
        assert_eq!(
            PreToken::end_tag("q2").trigger_keys(),
            vec!["endTag/q2".to_string(), "endTag/q".to_string()]
        );
        assert_eq!(
            PreToken::start_tag("f").trigger_keys(),
            vec!["startTag/f".to_string()]
        );
    }

    #[test]
    fn attribute_values_are_split_and_escaped() {
        assert_eq!(
            PreToken::attribute("lemma", "a/b, c"),
            PreToken::Attribute {
                key: "lemma".to_string(),
                values: vec!["a÷b".to_string(), "c".to_string()],
            }
        );
    }
}
