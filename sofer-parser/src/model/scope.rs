//! Scope labels and the ordered label sets kept as per-block caches.
use std::{fmt, str::FromStr};

use serde::Serialize;

use crate::{Error, model::Item};

/// Character substituted for `/` inside label components (attribute values,
/// printed chapter numbers) so that labels stay splittable on `/`.
pub const SLASH_PLACEHOLDER: char = '÷';

/// The closed vocabulary of scope types, i.e. the first component of every label.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ScopeType {
    BlockTag,
    Inline,
    Span,
    SpanWithAtts,
    Milestone,
    Attribute,
    Chapter,
    PubChapter,
    Verses,
    Verse,
    TableRow,
    TableCell,
}

impl ScopeType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BlockTag => "blockTag",
            Self::Inline => "inline",
            Self::Span => "span",
            Self::SpanWithAtts => "spanWithAtts",
            Self::Milestone => "milestone",
            Self::Attribute => "attribute",
            Self::Chapter => "chapter",
            Self::PubChapter => "pubChapter",
            Self::Verses => "verses",
            Self::Verse => "verse",
            Self::TableRow => "tableRow",
            Self::TableCell => "tableCell",
        }
    }

    /// Number of `/`-separated components after the type prefix.
    ///
    /// `attribute/{context}/{tag}/{key}/{n}/{value}` carries five, everything else one.
    #[must_use]
    pub fn arity(self) -> usize {
        match self {
            Self::Attribute => 5,
            Self::BlockTag
            | Self::Inline
            | Self::Span
            | Self::SpanWithAtts
            | Self::Milestone
            | Self::Chapter
            | Self::PubChapter
            | Self::Verses
            | Self::Verse
            | Self::TableRow
            | Self::TableCell => 1,
        }
    }

    /// Parses and validates a full label such as `chapter/3`.
    ///
    /// # Errors
    /// Returns [`Error::UnknownScopeType`] when the prefix is not part of the vocabulary
    /// and [`Error::MalformedScopeLabel`] when the component count does not match.
    pub fn of_label(label: &str) -> Result<Self, Error> {
        let mut parts = label.split('/');
        let prefix = parts.next().unwrap_or_default();
        let scope_type = prefix.parse::<Self>()?;
        let components = parts.count();
        if components != scope_type.arity() {
            return Err(Error::MalformedScopeLabel {
                label: label.to_string(),
                expected: scope_type.arity(),
            });
        }
        Ok(scope_type)
    }
}

impl FromStr for ScopeType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blockTag" => Ok(Self::BlockTag),
            "inline" => Ok(Self::Inline),
            "span" => Ok(Self::Span),
            "spanWithAtts" => Ok(Self::SpanWithAtts),
            "milestone" => Ok(Self::Milestone),
            "attribute" => Ok(Self::Attribute),
            "chapter" => Ok(Self::Chapter),
            "pubChapter" => Ok(Self::PubChapter),
            "verses" => Ok(Self::Verses),
            "verse" => Ok(Self::Verse),
            "tableRow" => Ok(Self::TableRow),
            "tableCell" => Ok(Self::TableCell),
            unknown => Err(Error::UnknownScopeType(unknown.to_string())),
        }
    }
}

impl fmt::Display for ScopeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Makes a value safe to embed as a single label component.
#[must_use]
pub fn escape_component(value: &str) -> String {
    value.replace('/', &SLASH_PLACEHOLDER.to_string())
}

/// An insertion-ordered set of scope labels.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ScopeSet(Vec<String>);

impl ScopeSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, label: &str) -> bool {
        self.0.iter().any(|l| l == label)
    }

    /// Adds `label` at the end unless already present. Returns whether it was added.
    pub fn insert(&mut self, label: &str) -> bool {
        if self.contains(label) {
            return false;
        }
        self.0.push(label.to_string());
        true
    }

    /// Removes `label`, keeping the order of the rest. Returns whether it was present.
    pub fn remove(&mut self, label: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|l| l != label);
        self.0.len() != before
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Runs this set through a block's content, in order: starts add, ends remove.
    pub(crate) fn apply(&mut self, items: &[Item]) {
        for item in items {
            if let Item::Scope(mark) = item {
                if mark.is_start() {
                    self.insert(&mark.label);
                } else {
                    self.remove(&mark.label);
                }
            }
        }
    }

    /// The labels started anywhere in `items`, in order of first appearance.
    pub(crate) fn started_in(items: &[Item]) -> Self {
        let mut set = Self::new();
        for item in items {
            if let Item::Scope(mark) = item
                && mark.is_start()
            {
                set.insert(&mark.label);
            }
        }
        set
    }
}

impl<S: AsRef<str>> FromIterator<S> for ScopeSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        for label in iter {
            set.insert(label.as_ref());
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[rstest::rstest]
    #[case("chapter/3", ScopeType::Chapter)]
    #[case("verse/14", ScopeType::Verse)]
    #[case("span/nd", ScopeType::Span)]
    #[case("attribute/spanWithAtts/w/lemma/0/foo", ScopeType::Attribute)]
    #[case("blockTag/q2", ScopeType::BlockTag)]
    #[case("tableCell/0", ScopeType::TableCell)]
    fn known_labels_parse(#[case] label: &str, #[case] expected: ScopeType) {
        assert_eq!(ScopeType::of_label(label).ok(), Some(expected));
    }

    #[test]
    fn unknown_prefix_is_rejected() {
        let err = ScopeType::of_label("paragraph/p").unwrap_err();
        assert!(matches!(err, Error::UnknownScopeType(ref p) if p == "paragraph"));
    }

    #[test]
    fn wrong_arity_is_rejected() {
        let err = ScopeType::of_label("attribute/spanWithAtts/w/lemma").unwrap_err();
        assert!(matches!(err, Error::MalformedScopeLabel { expected: 5, .. }));
    }

    #[test]
    fn scope_set_keeps_insertion_order() {
        let mut set = ScopeSet::new();
        assert!(set.insert("chapter/1"));
        assert!(set.insert("verses/1"));
        assert!(!set.insert("chapter/1"));
        assert!(set.insert("verse/1"));
        assert!(set.remove("verses/1"));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["chapter/1", "verse/1"]);
    }

    #[test]
    fn apply_follows_content_order() {
        let mut set: ScopeSet = ["chapter/1", "verse/1"].into_iter().collect();
        set.apply(&[
            Item::end("verse/1"),
            Item::start("verse/2"),
            Item::start("span/nd"),
            Item::end("span/nd"),
        ]);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["chapter/1", "verse/2"]);
    }

    #[test]
    fn slash_is_escaped_in_components() {
        assert_eq!(escape_component("a/b"), "a÷b");
    }
}
