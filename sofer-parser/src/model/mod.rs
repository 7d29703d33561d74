//! The document model: an arena of sequences, each an ordered list of blocks whose
//! content interleaves tokens, scope marks and grafts.
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    str::FromStr,
};

use serde::Serialize;

use crate::{ChapterVerseIndex, Error, Warning};

mod location;
mod scope;

pub use location::{Location, Position};
pub use scope::{SLASH_PLACEHOLDER, ScopeSet, ScopeType, escape_component};

/// Key of a sequence in its document's arena.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct SequenceId(pub(crate) u32);

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// Key of a document inside a [`crate::Library`].
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct DocumentId(pub(crate) u32);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SequenceType {
    Main,
    Header,
    Heading,
    Title,
    EndTitle,
    IntroTitle,
    IntroEndTitle,
    Introduction,
    Remark,
    Footnote,
    Xref,
    Table,
    Tree,
    Kv,
}

impl SequenceType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Header => "header",
            Self::Heading => "heading",
            Self::Title => "title",
            Self::EndTitle => "endTitle",
            Self::IntroTitle => "introTitle",
            Self::IntroEndTitle => "introEndTitle",
            Self::Introduction => "introduction",
            Self::Remark => "remark",
            Self::Footnote => "footnote",
            Self::Xref => "xref",
            Self::Table => "table",
            Self::Tree => "tree",
            Self::Kv => "kv",
        }
    }
}

impl FromStr for SequenceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "main" => Ok(Self::Main),
            "header" => Ok(Self::Header),
            "heading" => Ok(Self::Heading),
            "title" => Ok(Self::Title),
            "endTitle" => Ok(Self::EndTitle),
            "introTitle" => Ok(Self::IntroTitle),
            "introEndTitle" => Ok(Self::IntroEndTitle),
            "introduction" => Ok(Self::Introduction),
            "remark" => Ok(Self::Remark),
            "footnote" => Ok(Self::Footnote),
            "xref" => Ok(Self::Xref),
            "table" => Ok(Self::Table),
            "tree" => Ok(Self::Tree),
            "kv" => Ok(Self::Kv),
            unknown => Err(format!("unknown sequence type: {unknown}")),
        }
    }
}

impl fmt::Display for SequenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TokenSubtype {
    WordLike,
    LineSpace,
    Eol,
    Punctuation,
    NoBreakSpace,
    SoftLineBreak,
    Bad,
}

impl TokenSubtype {
    #[must_use]
    pub fn is_whitespace(self) -> bool {
        matches!(self, Self::LineSpace | Self::Eol)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Token {
    pub subtype: TokenSubtype,
    pub payload: String,
}

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ScopePosition {
    Start,
    End,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ScopeMark {
    pub position: ScopePosition,
    pub label: String,
}

impl ScopeMark {
    #[must_use]
    pub fn is_start(&self) -> bool {
        self.position == ScopePosition::Start
    }
}

/// A pointer from a block to a child sequence. The target is an arena key, not an
/// owning reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Graft {
    pub subtype: SequenceType,
    pub target: SequenceId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Item {
    Token(Token),
    Scope(ScopeMark),
    Graft(Graft),
}

impl Item {
    pub fn token(subtype: TokenSubtype, payload: impl Into<String>) -> Self {
        Self::Token(Token {
            subtype,
            payload: payload.into(),
        })
    }

    pub fn start(label: impl Into<String>) -> Self {
        Self::Scope(ScopeMark {
            position: ScopePosition::Start,
            label: label.into(),
        })
    }

    pub fn end(label: impl Into<String>) -> Self {
        Self::Scope(ScopeMark {
            position: ScopePosition::End,
            label: label.into(),
        })
    }

    #[must_use]
    pub fn graft(subtype: SequenceType, target: SequenceId) -> Self {
        Self::Graft(Graft { subtype, target })
    }

    #[must_use]
    pub fn as_token(&self) -> Option<&Token> {
        match self {
            Self::Token(token) => Some(token),
            Self::Scope(_) | Self::Graft(_) => None,
        }
    }
}

/// The unit of content inside a sequence.
///
/// `open_scopes` and `included_scopes` are caches derived from `items` and the
/// preceding block; they are only written by the parser and the edit operations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub(crate) block_scope: String,
    pub(crate) grafts: Vec<Graft>,
    pub(crate) items: Vec<Item>,
    pub(crate) open_scopes: ScopeSet,
    pub(crate) included_scopes: ScopeSet,
}

impl Block {
    pub(crate) fn new(block_scope: impl Into<String>) -> Self {
        Self {
            block_scope: block_scope.into(),
            grafts: Vec::new(),
            items: Vec::new(),
            open_scopes: ScopeSet::new(),
            included_scopes: ScopeSet::new(),
        }
    }

    #[must_use]
    pub fn block_scope(&self) -> &str {
        &self.block_scope
    }

    #[must_use]
    pub fn grafts(&self) -> &[Graft] {
        &self.grafts
    }

    #[must_use]
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Scopes already open when this block begins.
    #[must_use]
    pub fn open_scopes(&self) -> &ScopeSet {
        &self.open_scopes
    }

    /// Scopes with a start mark somewhere in this block.
    #[must_use]
    pub fn included_scopes(&self) -> &ScopeSet {
        &self.included_scopes
    }

    /// Scopes still open after the last item, i.e. the next block's `open_scopes`.
    #[must_use]
    pub fn closing_scopes(&self) -> ScopeSet {
        let mut set = self.open_scopes.clone();
        set.apply(&self.items);
        set
    }

    pub fn tokens(&self) -> impl Iterator<Item = &Token> {
        self.items.iter().filter_map(Item::as_token)
    }

    /// Concatenated token text, whitespace collapsed to single spaces.
    #[must_use]
    pub fn plain_text(&self) -> String {
        let mut text = String::new();
        for token in self.tokens() {
            if token.subtype.is_whitespace() {
                if !text.ends_with(' ') {
                    text.push(' ');
                }
            } else {
                text.push_str(&token.payload);
            }
        }
        text
    }

    /// Every sequence this block points at, block grafts first.
    pub fn graft_targets(&self) -> impl Iterator<Item = SequenceId> + '_ {
        self.grafts
            .iter()
            .map(|g| g.target)
            .chain(self.items.iter().filter_map(|item| match item {
                Item::Graft(graft) => Some(graft.target),
                Item::Token(_) | Item::Scope(_) => None,
            }))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sequence {
    pub(crate) id: SequenceId,
    #[serde(rename = "type")]
    pub(crate) sequence_type: SequenceType,
    pub(crate) blocks: Vec<Block>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub(crate) tags: BTreeSet<String>,
}

impl Sequence {
    pub(crate) fn new(id: SequenceId, sequence_type: SequenceType) -> Self {
        Self {
            id,
            sequence_type,
            blocks: Vec::new(),
            tags: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> SequenceId {
        self.id
    }

    #[must_use]
    pub fn sequence_type(&self) -> SequenceType {
        self.sequence_type
    }

    #[must_use]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    #[must_use]
    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    /// Block texts joined with newlines.
    #[must_use]
    pub fn plain_text(&self) -> String {
        self.blocks
            .iter()
            .map(Block::plain_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A parsed document: the main sequence plus every sequence reachable from it by grafts.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub(crate) id: DocumentId,
    pub(crate) headers: BTreeMap<String, String>,
    pub(crate) main_id: SequenceId,
    pub(crate) sequences: BTreeMap<SequenceId, Sequence>,
    #[serde(skip)]
    pub(crate) next_sequence_id: u32,
    #[serde(skip)]
    pub(crate) cv_index: ChapterVerseIndex,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(crate) warnings: Vec<Warning>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub(crate) tags: BTreeSet<String>,
}

impl Document {
    /// An empty document holding only its main sequence.
    #[must_use]
    pub fn new() -> Self {
        let main_id = SequenceId(0);
        let mut sequences = BTreeMap::new();
        sequences.insert(main_id, Sequence::new(main_id, SequenceType::Main));
        Self {
            id: DocumentId::default(),
            headers: BTreeMap::new(),
            main_id,
            sequences,
            next_sequence_id: 1,
            cv_index: ChapterVerseIndex::default(),
            warnings: Vec::new(),
            tags: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> DocumentId {
        self.id
    }

    #[must_use]
    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    #[must_use]
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn book_code(&self) -> Option<&str> {
        self.header("bookCode")
    }

    #[must_use]
    pub fn main_id(&self) -> SequenceId {
        self.main_id
    }

    /// The main sequence. Always present.
    #[must_use]
    pub fn main(&self) -> &Sequence {
        self.sequences
            .get(&self.main_id)
            .unwrap_or_else(|| unreachable_main())
    }

    pub fn sequences(&self) -> impl Iterator<Item = &Sequence> {
        self.sequences.values()
    }

    /// # Errors
    /// Returns [`Error::UnknownSequence`] when no sequence has this id.
    pub fn sequence(&self, id: SequenceId) -> Result<&Sequence, Error> {
        self.sequences.get(&id).ok_or(Error::UnknownSequence(id))
    }

    pub(crate) fn sequence_mut(&mut self, id: SequenceId) -> Result<&mut Sequence, Error> {
        self.sequences.get_mut(&id).ok_or(Error::UnknownSequence(id))
    }

    pub(crate) fn add_sequence(&mut self, sequence_type: SequenceType) -> SequenceId {
        let id = SequenceId(self.next_sequence_id);
        self.next_sequence_id += 1;
        self.sequences
            .insert(id, Sequence::new(id, sequence_type));
        id
    }

    #[must_use]
    pub fn cv_index(&self) -> &ChapterVerseIndex {
        &self.cv_index
    }

    /// Lex warnings collected while this document was parsed.
    #[must_use]
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    #[must_use]
    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub(crate) fn rebuild_cv_index(&mut self) {
        self.cv_index = ChapterVerseIndex::build(self.main());
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

// The main sequence is created with the document and never removed: garbage
// collection starts from it and `delete_sequence` refuses it.
#[allow(clippy::panic)]
#[cold]
fn unreachable_main() -> &'static Sequence {
    panic!("document lost its main sequence")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn plain_text_collapses_whitespace() {
        let mut block = Block::new("blockTag/p");
        block.items = vec![
            Item::start("verse/1"),
            Item::token(TokenSubtype::WordLike, "In"),
            Item::token(TokenSubtype::LineSpace, " "),
            Item::token(TokenSubtype::Eol, "\n"),
            Item::token(TokenSubtype::WordLike, "the"),
            Item::token(TokenSubtype::Punctuation, ","),
        ];
        assert_eq!(block.plain_text(), "In the,");
    }

    #[test]
    fn closing_scopes_follow_content() {
        let mut block = Block::new("blockTag/p");
        block.open_scopes = ["chapter/1", "verse/1"].into_iter().collect();
        block.items = vec![Item::end("verse/1"), Item::start("verse/2")];
        assert_eq!(
            block.closing_scopes().iter().collect::<Vec<_>>(),
            vec!["chapter/1", "verse/2"]
        );
    }

    #[test]
    fn graft_targets_include_inline_grafts() {
        let mut block = Block::new("blockTag/p");
        block.grafts.push(Graft {
            subtype: SequenceType::Heading,
            target: SequenceId(2),
        });
        block.items.push(Item::graft(SequenceType::Footnote, SequenceId(5)));
        assert_eq!(
            block.graft_targets().collect::<Vec<_>>(),
            vec![SequenceId(2), SequenceId(5)]
        );
    }

    #[test]
    fn sequence_type_round_trips_through_str() {
        for ty in [SequenceType::Main, SequenceType::EndTitle, SequenceType::Xref] {
            assert_eq!(ty.as_str().parse::<SequenceType>(), Ok(ty));
        }
    }
}
