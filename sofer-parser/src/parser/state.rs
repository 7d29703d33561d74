use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

use crate::{
    Document, Options,
    error::Warning,
    model::{Graft, Item, SequenceId},
    parser::rules::{AttributeTarget, OnEnd},
};

pub(crate) const ORPHAN_TOKENS: &str = "blockTag/orphanTokens";
pub(crate) const HANGING_GRAFT: &str = "blockTag/hangingGraft";

/// A scope the engine is tracking, with its end rule already bound.
#[derive(Debug, Clone)]
pub(crate) struct OpenScope {
    pub(crate) label: String,
    pub(crate) triggers: Vec<String>,
    pub(crate) on_end: Option<OnEnd>,
    /// Block scopes live in `Block::block_scope` and leave no marks in the content.
    pub(crate) marked: bool,
}

/// Per-sequence parse state: each sequence closes its own scopes.
#[derive(Debug, Default)]
pub(crate) struct SequenceBuilder {
    pub(crate) open: Vec<OpenScope>,
    /// Items that arrived before the sequence had a block.
    pub(crate) pending: Vec<Item>,
    /// Scratch sequences are dropped once parsing ends.
    pub(crate) temporary: bool,
}

/// The span or milestone that attributes currently attach to.
#[derive(Debug, Clone)]
pub(crate) struct AttributeContext {
    /// Label of the owning scope.
    pub(crate) owner: String,
    pub(crate) kind: &'static str,
    pub(crate) tag: String,
    pub(crate) ended_by: Vec<String>,
    pub(crate) target: AttributeTarget,
}

#[derive(Debug)]
pub(crate) struct ParserState<'o> {
    pub(crate) options: &'o Options,
    pub(crate) document: Document,
    pub(crate) builders: FxHashMap<SequenceId, SequenceBuilder>,
    pub(crate) base: SequenceId,
    pub(crate) inline_stack: Vec<SequenceId>,
    /// Innermost last. Nested spans with attributes each push their own context.
    pub(crate) attribute_contexts: Vec<AttributeContext>,
    /// Grafts of block-level sequences waiting for the next main block.
    pub(crate) pending_block_grafts: Vec<Graft>,
    pub(crate) headers: BTreeMap<String, String>,
    pub(crate) warnings: Vec<Warning>,
}

impl<'o> ParserState<'o> {
    pub(crate) fn new(options: &'o Options, warnings: Vec<Warning>) -> Self {
        let document = Document::new();
        let base = document.main_id();
        let mut builders = FxHashMap::default();
        builders.insert(base, SequenceBuilder::default());
        Self {
            options,
            document,
            builders,
            base,
            inline_stack: Vec::new(),
            attribute_contexts: Vec::new(),
            pending_block_grafts: Vec::new(),
            headers: BTreeMap::new(),
            warnings,
        }
    }

    /// The sequence content currently flows into: the innermost inline, else the base.
    pub(crate) fn current(&self) -> SequenceId {
        self.inline_stack.last().copied().unwrap_or(self.base)
    }

    pub(crate) fn builder(&mut self, id: SequenceId) -> &mut SequenceBuilder {
        self.builders.entry(id).or_default()
    }

    pub(crate) fn is_open(&self, id: SequenceId, label: &str) -> bool {
        self.builders
            .get(&id)
            .is_some_and(|b| b.open.iter().any(|s| s.label == label))
    }
}
