//! The parser engine: a single pass over the pretokens, driven by the rule table.
use std::mem;

use crate::{
    Document, Error, Options,
    error::{Warning, WarningKind},
    model::{Block, Graft, Item, ScopeType, SequenceId, SequenceType, escape_component},
    pretoken::PreToken,
};

mod rules;
mod state;
mod trigger;

use rules::{Action, AttributeTarget, During, OnEnd, SequenceRoute, VERSE_END, find_rule};
use state::{AttributeContext, HANGING_GRAFT, ORPHAN_TOKENS, OpenScope, SequenceBuilder};
use trigger::{TriggerSpec, resolve_triggers};

pub(crate) use state::ParserState;

const END_BLOCK: &str = "endBlock";
const BASE_SEQUENCE_CHANGE: &str = "baseSequenceChange";
const ATTRIBUTE_END: &[TriggerSpec] = &[TriggerSpec::AttributeContext];

/// Builds a document from pretokens. `warnings` are the lexer's, carried onto the document.
#[tracing::instrument(level = "trace", skip_all, fields(pretokens = pretokens.len()))]
pub(crate) fn parse_pretokens(
    pretokens: &[PreToken],
    options: &Options,
    warnings: Vec<Warning>,
) -> Result<Document, Error> {
    let mut state = ParserState::new(options, warnings);
    for pretoken in pretokens {
        state.handle(pretoken)?;
    }
    state.finish()
}

/// The key `default` in `\w word|lemma\w*` names a different attribute per tag.
fn default_attribute_key(tag: &str) -> &'static str {
    match tag {
        "rb" => "gloss",
        "jmp" => "link-href",
        "fig" => "alt",
        _ => "lemma",
    }
}

fn is_chapter_label(label: &str) -> bool {
    label.starts_with("chapter/") || label.starts_with("pubChapter/")
}

/// Drops whitespace tokens after the last non-whitespace token.
fn trim_trailing_whitespace(items: &mut Vec<Item>) {
    let keep_until = items
        .iter()
        .rposition(|item| item.as_token().is_some_and(|t| !t.subtype.is_whitespace()))
        .map_or(0, |position| position + 1);
    let mut index = 0;
    items.retain(|item| {
        let keep = index < keep_until || item.as_token().is_none_or(|t| !t.subtype.is_whitespace());
        index += 1;
        keep
    });
}

impl ParserState<'_> {
    pub(crate) fn handle(&mut self, pretoken: &PreToken) -> Result<(), Error> {
        let Some(rule) = find_rule(pretoken, &self.options.custom_tags) else {
            tracing::debug!(%pretoken, "no rule matches, dropping pretoken");
            return Ok(());
        };
        let action = rule.action;
        if let Some(route) = action.sequence {
            self.route(route, &action, pretoken)?;
        }
        if action.new_block {
            self.new_block(pretoken)?;
        }
        let current = self.current();
        self.close_matching(current, &pretoken.trigger_keys())?;
        let mut opened = action.new_scopes.is_empty();
        for spec in action.new_scopes {
            let label = spec.label.resolve(pretoken)?;
            opened |= self.open_scope(label, spec.ended_by, spec.on_end, pretoken)?;
        }
        if let Some(during) = action.during {
            self.during(during, opened, pretoken)?;
        }
        self.push_token(pretoken)
    }

    fn route(
        &mut self,
        route: SequenceRoute,
        action: &Action,
        pretoken: &PreToken,
    ) -> Result<(), Error> {
        match route {
            SequenceRoute::Main => self.switch_base(self.document.main_id()),
            SequenceRoute::MainUnlessTable => {
                if self.document.sequence(self.base)?.sequence_type() == SequenceType::Table {
                    self.leave_inlines()
                } else {
                    self.switch_base(self.document.main_id())
                }
            }
            SequenceRoute::Base(sequence_type) => {
                self.leave_inlines()?;
                let reuse = !action.force_new_sequence
                    && !action.use_temp_sequence
                    && self.document.sequence(self.base)?.sequence_type() == sequence_type
                    && !self.builders.get(&self.base).is_some_and(|b| b.temporary);
                let target = if reuse {
                    self.base
                } else {
                    self.create_sequence(sequence_type, action.use_temp_sequence)
                };
                self.switch_base(target)
            }
            SequenceRoute::Note => {
                let PreToken::Tag(tag) = pretoken else {
                    return Err(Error::UnresolvedTrigger {
                        field: "tagName",
                        label: format!("inline from {pretoken}"),
                    });
                };
                let sequence_type = SequenceRoute::note_type(tag);
                let parent = self.current();
                let id = self.document.add_sequence(sequence_type);
                self.builders.insert(id, SequenceBuilder::default());
                self.push_item(parent, Item::graft(sequence_type, id))?;
                tracing::debug!(sequence = %id, %sequence_type, %parent, "entering inline sequence");
                self.inline_stack.push(id);
                Ok(())
            }
        }
    }

    fn create_sequence(&mut self, sequence_type: SequenceType, temporary: bool) -> SequenceId {
        let id = self.document.add_sequence(sequence_type);
        self.builders.insert(
            id,
            SequenceBuilder {
                temporary,
                ..SequenceBuilder::default()
            },
        );
        if !temporary {
            self.pending_block_grafts.push(Graft {
                subtype: sequence_type,
                target: id,
            });
        }
        id
    }

    fn switch_base(&mut self, target: SequenceId) -> Result<(), Error> {
        self.leave_inlines()?;
        if target != self.base {
            let previous = self.base;
            tracing::debug!(from = %previous, to = %target, "switching base sequence");
            self.close_matching(previous, &[BASE_SEQUENCE_CHANGE.to_string()])?;
            self.base = target;
        }
        Ok(())
    }

    /// Ends every inline sequence still open, innermost first.
    fn leave_inlines(&mut self) -> Result<(), Error> {
        while let Some(&id) = self.inline_stack.last() {
            self.close_matching(id, &[END_BLOCK.to_string()])?;
            if self.inline_stack.last() == Some(&id) {
                self.force_close(id)?;
            }
            if self.inline_stack.last() == Some(&id) {
                self.inline_stack.pop();
            }
        }
        Ok(())
    }

    fn new_block(&mut self, pretoken: &PreToken) -> Result<(), Error> {
        let sequence = self.current();
        self.close_matching(sequence, &[END_BLOCK.to_string()])?;
        let block_scope = match pretoken {
            PreToken::Tag(tag) => format!("blockTag/{}", escape_component(&tag.full_name())),
            _ => ORPHAN_TOKENS.to_string(),
        };
        self.append_block(sequence, block_scope)
    }

    fn append_block(&mut self, id: SequenceId, block_scope: String) -> Result<(), Error> {
        let main_id = self.document.main_id();
        let pending = mem::take(&mut self.builder(id).pending);
        let grafts = if id == main_id {
            mem::take(&mut self.pending_block_grafts)
        } else {
            Vec::new()
        };
        let sequence = self.document.sequence_mut(id)?;
        let mut carried = Vec::new();
        if let Some(last) = sequence.blocks.last_mut() {
            trim_trailing_whitespace(&mut last.items);
            // A chapter marker between blocks belongs to the block it introduces.
            while let Some(Item::Scope(mark)) = last.items.last()
                && mark.is_start()
                && is_chapter_label(&mark.label)
            {
                carried.extend(last.items.pop());
            }
        }
        carried.reverse();
        carried.extend(pending);
        let mut block = Block::new(block_scope);
        block.items = carried;
        block.grafts = grafts;
        sequence.blocks.push(block);
        Ok(())
    }

    fn push_item(&mut self, id: SequenceId, item: Item) -> Result<(), Error> {
        let sequence = self.document.sequence_mut(id)?;
        if let Some(block) = sequence.blocks.last_mut() {
            block.items.push(item);
        } else {
            self.builders.entry(id).or_default().pending.push(item);
        }
        Ok(())
    }

    /// Closes every open scope in `id` with a trigger among `keys`.
    fn close_matching(&mut self, id: SequenceId, keys: &[String]) -> Result<(), Error> {
        if keys.is_empty() {
            return Ok(());
        }
        let Some(builder) = self.builders.get_mut(&id) else {
            return Ok(());
        };
        let (closing, open): (Vec<_>, Vec<_>) = mem::take(&mut builder.open)
            .into_iter()
            .partition(|scope| scope.triggers.iter().any(|t| keys.contains(t)));
        builder.open = open;
        if closing.is_empty() {
            return Ok(());
        }
        tracing::debug!(sequence = %id, ?keys, closed = closing.len(), "closing scopes");
        self.close_scopes(id, closing)
    }

    fn force_close(&mut self, id: SequenceId) -> Result<(), Error> {
        let closing = mem::take(&mut self.builder(id).open);
        self.close_scopes(id, closing)
    }

    fn close_scopes(&mut self, id: SequenceId, closing: Vec<OpenScope>) -> Result<(), Error> {
        for scope in closing.iter().rev().filter(|scope| scope.marked) {
            self.push_item(id, Item::end(scope.label.as_str()))?;
        }
        for scope in closing.into_iter().rev() {
            if let Some(on_end) = scope.on_end {
                self.on_end(on_end, id, &scope.label)?;
            }
        }
        Ok(())
    }

    /// Returns `false` when a scope with the same label was already open.
    fn open_scope(
        &mut self,
        label: String,
        ended_by: &[TriggerSpec],
        on_end: Option<OnEnd>,
        pretoken: &PreToken,
    ) -> Result<bool, Error> {
        let scope_type = ScopeType::of_label(&label)?;
        let id = self.current();
        if self.is_open(id, &label) {
            tracing::debug!(sequence = %id, %label, "scope already open");
            return Ok(false);
        }
        let context = self
            .attribute_contexts
            .last()
            .map(|context| context.ended_by.as_slice());
        let triggers = resolve_triggers(ended_by, pretoken, &label, context)?;
        let marked = scope_type != ScopeType::BlockTag;
        if marked {
            self.push_item(id, Item::start(label.as_str()))?;
        } else if let Some(block) = self.document.sequence_mut(id)?.blocks.last_mut() {
            block.block_scope.clone_from(&label);
        }
        self.builder(id).open.push(OpenScope {
            label,
            triggers,
            on_end,
            marked,
        });
        Ok(true)
    }

    fn on_end(&mut self, on_end: OnEnd, id: SequenceId, label: &str) -> Result<(), Error> {
        match on_end {
            OnEnd::CaptureHeader => {
                let key = label.strip_prefix("blockTag/").unwrap_or(label);
                let value = self.document.sequence(id)?.plain_text().trim().to_string();
                if key == "id"
                    && let Some(book_code) = value.split_whitespace().next()
                {
                    self.headers
                        .insert("bookCode".to_string(), book_code.to_string());
                }
                tracing::debug!(key, %value, "captured header");
                self.headers.insert(key.to_string(), value);
            }
            OnEnd::ReturnToBaseSequence => {
                if self.inline_stack.last() == Some(&id) {
                    self.inline_stack.pop();
                    tracing::debug!(sequence = %id, base = %self.current(), "leaving inline sequence");
                }
            }
            OnEnd::ClearAttributeContext => {
                if let Some(index) = self
                    .attribute_contexts
                    .iter()
                    .rposition(|context| context.owner == label)
                {
                    self.attribute_contexts.remove(index);
                }
            }
        }
        Ok(())
    }

    /// `opened` is false when the action's scope was already open; a span opened
    /// that way shares the attribute context of the outer one.
    fn during(&mut self, during: During, opened: bool, pretoken: &PreToken) -> Result<(), Error> {
        match (during, pretoken) {
            (During::ExplodeVerses, PreToken::Verses { exploded, .. }) => {
                for number in exploded {
                    self.open_scope(format!("verse/{number}"), VERSE_END, None, pretoken)?;
                }
            }
            (During::SetAttributeContext(target), _) => {
                // Milestone contexts end at their own `\*`; span contexts end with the span.
                if opened || target != AttributeTarget::Span {
                    self.set_attribute_context(target, pretoken);
                }
            }
            (During::EmptyMilestone, PreToken::Milestone { name, .. }) => {
                let label = format!("milestone/{}", escape_component(name));
                ScopeType::of_label(&label)?;
                let id = self.current();
                if !self.is_open(id, &label) {
                    self.push_item(id, Item::start(label.as_str()))?;
                    self.push_item(id, Item::end(label.as_str()))?;
                }
                self.attribute_contexts.push(AttributeContext {
                    owner: label,
                    kind: "milestone",
                    tag: name.clone(),
                    ended_by: vec!["endMilestoneMarker".to_string()],
                    target: AttributeTarget::MilestoneEnd,
                });
            }
            (During::ClearMilestoneContext, _) => {
                if self.attribute_contexts.last().is_some_and(|context| {
                    matches!(
                        context.target,
                        AttributeTarget::Milestone | AttributeTarget::MilestoneEnd
                    )
                }) {
                    self.attribute_contexts.pop();
                }
            }
            (During::NumberTableRow, _) => self.number_table_row()?,
            (During::OpenAttributeScopes, PreToken::Attribute { key, values }) => {
                self.open_attribute_scopes(key, values, pretoken)?;
            }
            (
                During::ExplodeVerses | During::EmptyMilestone | During::OpenAttributeScopes,
                _,
            ) => {}
        }
        Ok(())
    }

    fn number_table_row(&mut self) -> Result<(), Error> {
        let id = self.current();
        let sequence = self.document.sequence_mut(id)?;
        let label = format!("tableRow/{}", sequence.blocks.len().saturating_sub(1));
        let Some(block) = sequence.blocks.last_mut() else {
            return Ok(());
        };
        let previous = mem::replace(&mut block.block_scope, label.clone());
        if let Some(scope) = self
            .builder(id)
            .open
            .iter_mut()
            .rev()
            .find(|scope| scope.label == previous)
        {
            scope.label = label;
        }
        Ok(())
    }

    fn set_attribute_context(&mut self, target: AttributeTarget, pretoken: &PreToken) {
        let (owner, kind, tag) = match (target, pretoken) {
            (AttributeTarget::Span, PreToken::Tag(tag)) => {
                let full_name = tag.full_name();
                (
                    format!("spanWithAtts/{}", escape_component(&full_name)),
                    "spanWithAtts",
                    full_name,
                )
            }
            (
                AttributeTarget::Milestone | AttributeTarget::MilestoneEnd,
                PreToken::Milestone { name, .. },
            ) => (
                format!("milestone/{}", escape_component(name)),
                "milestone",
                name.clone(),
            ),
            _ => return,
        };
        let ended_by = if target == AttributeTarget::MilestoneEnd {
            vec!["endMilestoneMarker".to_string()]
        } else {
            let id = self.current();
            let Some(triggers) = self.builders.get(&id).and_then(|builder| {
                builder
                    .open
                    .iter()
                    .rev()
                    .find(|scope| scope.label == owner)
                    .map(|scope| scope.triggers.clone())
            }) else {
                return;
            };
            triggers
        };
        self.attribute_contexts.push(AttributeContext {
            owner,
            kind,
            tag,
            ended_by,
            target,
        });
    }

    fn open_attribute_scopes(
        &mut self,
        key: &str,
        values: &[String],
        pretoken: &PreToken,
    ) -> Result<(), Error> {
        let Some(context) = self.attribute_contexts.last() else {
            let warning = Warning::new(
                WarningKind::OrphanAttribute,
                format!("attribute {key:?} outside any span or milestone"),
            );
            if self.options.strict {
                tracing::error!(%warning, "orphan attribute in strict mode");
                return Err(Error::StrictMode(warning));
            }
            tracing::warn!(key, "attribute outside any span or milestone, dropping it");
            self.warnings.push(warning);
            return Ok(());
        };
        let key = if key == "default" {
            default_attribute_key(&context.tag)
        } else {
            key
        };
        let prefix = format!(
            "attribute/{}/{}/{}",
            context.kind,
            escape_component(&context.tag),
            escape_component(key)
        );
        for (index, value) in values.iter().enumerate() {
            self.open_scope(
                format!("{prefix}/{index}/{value}"),
                ATTRIBUTE_END,
                None,
                pretoken,
            )?;
        }
        Ok(())
    }

    fn push_token(&mut self, pretoken: &PreToken) -> Result<(), Error> {
        let Some((subtype, payload)) = pretoken.as_token() else {
            return Ok(());
        };
        let id = self.current();
        let sequence = self.document.sequence(id)?;
        if subtype.is_whitespace() {
            let after_content = sequence
                .blocks
                .last()
                .and_then(|block| block.items.iter().rev().find_map(Item::as_token))
                .is_some_and(|token| !token.subtype.is_whitespace());
            if !after_content {
                return Ok(());
            }
        }
        if sequence.blocks.is_empty() {
            self.append_block(id, ORPHAN_TOKENS.to_string())?;
        }
        self.push_item(id, Item::token(subtype, payload))
    }

    /// Closes whatever is still open and hands over the finished document.
    pub(crate) fn finish(mut self) -> Result<Document, Error> {
        self.leave_inlines()?;
        let ids: Vec<SequenceId> = self.document.sequences.keys().copied().collect();
        for &id in &ids {
            self.force_close(id)?;
        }
        for &id in &ids {
            if self
                .builders
                .get(&id)
                .is_some_and(|builder| !builder.pending.is_empty())
            {
                self.append_block(id, ORPHAN_TOKENS.to_string())?;
            }
            if let Some(last) = self.document.sequence_mut(id)?.blocks.last_mut() {
                trim_trailing_whitespace(&mut last.items);
            }
        }
        if !self.pending_block_grafts.is_empty() {
            let main_id = self.document.main_id();
            self.append_block(main_id, HANGING_GRAFT.to_string())?;
        }
        for (id, builder) in &self.builders {
            if builder.temporary {
                self.document.sequences.remove(id);
            }
        }

        let mut document = self.document;
        document.headers = self.headers;
        document.warnings = self.warnings;
        document.gc_sequences();
        document.rebuild_scope_caches();
        document.rebuild_cv_index();
        tracing::debug!(
            sequences = document.sequences.len(),
            blocks = document.main().blocks().len(),
            "parsed document"
        );
        Ok(document)
    }
}
