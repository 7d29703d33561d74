//! Edit operations on a parsed document. Each one validates before it mutates and
//! then re-derives the `open_scopes`/`included_scopes` caches as far as they change.
use std::collections::{BTreeSet, VecDeque};

use crate::{
    Document, Error,
    model::{Block, Graft, Item, ScopeSet, ScopeType, Sequence, SequenceId, SequenceType},
};

mod filter;

pub use filter::ScopeFilter;

/// Drops marks that contradict `open`: ends of scopes that are not open and starts of
/// scopes that already are. Returns how many were dropped.
pub(crate) fn reconcile(open: &ScopeSet, items: &mut Vec<Item>) -> usize {
    let before = items.len();
    let mut running = open.clone();
    items.retain(|item| match item {
        Item::Scope(mark) if mark.is_start() => running.insert(&mark.label),
        Item::Scope(mark) => running.remove(&mark.label),
        Item::Token(_) | Item::Graft(_) => true,
    });
    before - items.len()
}

/// The first label in `items` that is unbalanced against `open`, if any.
fn first_unbalanced<'a>(open: &ScopeSet, items: &'a [Item]) -> Option<&'a str> {
    let mut running = open.clone();
    items.iter().find_map(|item| match item {
        Item::Scope(mark) if mark.is_start() => {
            (!running.insert(&mark.label)).then_some(mark.label.as_str())
        }
        Item::Scope(mark) => (!running.remove(&mark.label)).then_some(mark.label.as_str()),
        Item::Token(_) | Item::Graft(_) => None,
    })
}

/// Re-derives every cache of `sequence` from its first block.
fn rebuild_sequence(sequence: &mut Sequence) {
    let mut carried = ScopeSet::new();
    for block in &mut sequence.blocks {
        reconcile(&carried, &mut block.items);
        block.open_scopes = carried;
        block.included_scopes = ScopeSet::started_in(&block.items);
        carried = block.closing_scopes();
    }
}

fn validate_tag(tag: &str) -> Result<(), Error> {
    let (name, _value) = tag.split_once(':').unwrap_or((tag, ""));
    let mut chars = name.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !tag.chars().any(char::is_whitespace);
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidTag(tag.to_string()))
    }
}

impl Document {
    fn block(&self, id: SequenceId, position: usize) -> Result<&Block, Error> {
        let sequence = self.sequence(id)?;
        sequence.blocks.get(position).ok_or(Error::BlockOutOfRange {
            sequence: id,
            position,
            len: sequence.blocks.len(),
        })
    }

    fn block_mut(&mut self, id: SequenceId, position: usize) -> Result<&mut Block, Error> {
        let sequence = self.sequence_mut(id)?;
        let len = sequence.blocks.len();
        sequence
            .blocks
            .get_mut(position)
            .ok_or(Error::BlockOutOfRange {
                sequence: id,
                position,
                len,
            })
    }

    fn validate_graft(&self, graft: &Graft) -> Result<(), Error> {
        if graft.target == self.main_id {
            return Err(Error::MainSequenceGraft(graft.target));
        }
        if !self.sequences.contains_key(&graft.target) {
            return Err(Error::UnknownGraftTarget(graft.target));
        }
        Ok(())
    }

    fn validate_items(&self, items: &[Item]) -> Result<(), Error> {
        for item in items {
            match item {
                Item::Scope(mark) => {
                    ScopeType::of_label(&mark.label)?;
                }
                Item::Graft(graft) => self.validate_graft(graft)?,
                Item::Token(_) => {}
            }
        }
        Ok(())
    }

    /// Creates an empty sequence to be grafted by a later edit. Until then it is
    /// unreachable and the next garbage collection removes it.
    pub fn new_sequence(&mut self, sequence_type: SequenceType) -> SequenceId {
        self.add_sequence(sequence_type)
    }

    /// Replaces the content of one block.
    ///
    /// The new content must be balanced against the scopes already open at the
    /// block: no end of a scope that is not open, no start of one that is. Following
    /// blocks are updated for as long as their inherited scopes change.
    ///
    /// # Errors
    /// [`Error::UnknownSequence`], [`Error::BlockOutOfRange`], [`Error::UnknownScopeType`],
    /// [`Error::UnknownGraftTarget`] or [`Error::UnbalancedScope`]. The document is left
    /// untouched on error.
    #[tracing::instrument(level = "debug", skip(self, items), fields(items = items.len()))]
    pub fn update_items(
        &mut self,
        sequence: SequenceId,
        position: usize,
        items: Vec<Item>,
    ) -> Result<(), Error> {
        self.validate_items(&items)?;
        let block = self.block(sequence, position)?;
        if let Some(label) = first_unbalanced(&block.open_scopes, &items) {
            tracing::error!(%sequence, position, label, "unbalanced scope in new content");
            return Err(Error::UnbalancedScope {
                sequence,
                position,
                label: label.to_string(),
            });
        }

        let block = self.block_mut(sequence, position)?;
        let had_grafts = block.graft_targets().next().is_some();
        block.items = items;
        block.included_scopes = ScopeSet::started_in(&block.items);
        self.propagate_from(sequence, position + 1)?;
        if had_grafts {
            self.gc_sequences();
        }
        self.after_structural_edit(sequence);
        Ok(())
    }

    /// Replaces the block-level grafts of one block.
    ///
    /// # Errors
    /// [`Error::UnknownSequence`], [`Error::BlockOutOfRange`] or an invalid graft target.
    #[tracing::instrument(level = "debug", skip(self, grafts))]
    pub fn update_grafts(
        &mut self,
        sequence: SequenceId,
        position: usize,
        grafts: Vec<Graft>,
    ) -> Result<(), Error> {
        for graft in &grafts {
            self.validate_graft(graft)?;
        }
        let block = self.block_mut(sequence, position)?;
        let had_grafts = !block.grafts.is_empty();
        block.grafts = grafts;
        if had_grafts {
            self.gc_sequences();
        }
        Ok(())
    }

    /// Inserts an empty block at `position` (`position == len` appends).
    ///
    /// # Errors
    /// [`Error::UnknownSequence`], [`Error::BlockOutOfRange`], an unknown block scope type
    /// or an invalid graft target.
    #[tracing::instrument(level = "debug", skip(self, grafts))]
    pub fn insert_block(
        &mut self,
        sequence: SequenceId,
        position: usize,
        block_scope: &str,
        grafts: Vec<Graft>,
    ) -> Result<(), Error> {
        ScopeType::of_label(block_scope)?;
        for graft in &grafts {
            self.validate_graft(graft)?;
        }
        let target = self.sequence_mut(sequence)?;
        let len = target.blocks.len();
        if position > len {
            return Err(Error::BlockOutOfRange {
                sequence,
                position,
                len,
            });
        }
        let mut block = Block::new(block_scope);
        block.grafts = grafts;
        if let Some(previous) = position.checked_sub(1).and_then(|p| target.blocks.get(p)) {
            block.open_scopes = previous.closing_scopes();
        }
        target.blocks.insert(position, block);
        self.propagate_from(sequence, position + 1)?;
        self.after_structural_edit(sequence);
        Ok(())
    }

    /// Removes the block at `position`, along with sequences only it grafted.
    ///
    /// # Errors
    /// [`Error::UnknownSequence`] or [`Error::BlockOutOfRange`].
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn delete_block(&mut self, sequence: SequenceId, position: usize) -> Result<(), Error> {
        self.block(sequence, position)?;
        let removed = self.sequence_mut(sequence)?.blocks.remove(position);
        self.propagate_from(sequence, position)?;
        if removed.graft_targets().next().is_some() {
            self.gc_sequences();
        }
        self.after_structural_edit(sequence);
        Ok(())
    }

    /// Recomputes `open_scopes` from block `start` on, stopping at the first block
    /// whose inherited scopes come out unchanged. Returns how many blocks changed.
    pub(crate) fn propagate_from(&mut self, id: SequenceId, start: usize) -> Result<usize, Error> {
        let sequence = self.sequence_mut(id)?;
        let mut carried = start
            .checked_sub(1)
            .and_then(|p| sequence.blocks.get(p))
            .map(Block::closing_scopes)
            .unwrap_or_default();
        let mut changed = 0;
        let mut position = start;
        while let Some(block) = sequence.blocks.get_mut(position) {
            if block.open_scopes == carried {
                break;
            }
            let dropped = reconcile(&carried, &mut block.items);
            if dropped > 0 {
                tracing::debug!(sequence = %id, position, dropped, "dropped scope marks left unbalanced");
            }
            block.open_scopes = carried;
            block.included_scopes = ScopeSet::started_in(&block.items);
            carried = block.closing_scopes();
            changed += 1;
            position += 1;
        }
        tracing::trace!(sequence = %id, start, changed, "propagated open scopes");
        Ok(changed)
    }

    /// Re-derives the caches of every block in the document.
    pub(crate) fn rebuild_scope_caches(&mut self) {
        for sequence in self.sequences.values_mut() {
            rebuild_sequence(sequence);
        }
    }

    fn after_structural_edit(&mut self, sequence: SequenceId) {
        if sequence == self.main_id {
            self.rebuild_cv_index();
        }
    }

    /// Removes every sequence no graft chain from the main sequence reaches.
    /// Returns the removed ids.
    pub fn gc_sequences(&mut self) -> Vec<SequenceId> {
        let mut reachable = BTreeSet::new();
        let mut queue = VecDeque::from([self.main_id]);
        while let Some(id) = queue.pop_front() {
            if !reachable.insert(id) {
                continue;
            }
            if let Some(sequence) = self.sequences.get(&id) {
                for block in &sequence.blocks {
                    queue.extend(block.graft_targets());
                }
            }
        }
        let removed: Vec<SequenceId> = self
            .sequences
            .keys()
            .filter(|id| !reachable.contains(*id))
            .copied()
            .collect();
        for id in &removed {
            self.sequences.remove(id);
        }
        if !removed.is_empty() {
            tracing::debug!(?removed, "collected unreachable sequences");
        }
        removed
    }

    /// Checks every cached scope set against a fresh derivation.
    ///
    /// # Errors
    /// [`Error::InvariantViolation`] naming the first block that disagrees.
    pub fn verify_invariants(&self) -> Result<(), Error> {
        for sequence in self.sequences.values() {
            let mut carried = ScopeSet::new();
            for (index, block) in sequence.blocks.iter().enumerate() {
                let violation = |detail: String| Error::InvariantViolation {
                    sequence: sequence.id,
                    block: index,
                    detail,
                };
                if block.open_scopes != carried {
                    return Err(violation(format!(
                        "open scopes {:?}, expected {:?}",
                        block.open_scopes.iter().collect::<Vec<_>>(),
                        carried.iter().collect::<Vec<_>>()
                    )));
                }
                let included = ScopeSet::started_in(&block.items);
                if block.included_scopes != included {
                    return Err(violation(format!(
                        "included scopes {:?}, expected {:?}",
                        block.included_scopes.iter().collect::<Vec<_>>(),
                        included.iter().collect::<Vec<_>>()
                    )));
                }
                if let Some(label) = first_unbalanced(&block.open_scopes, &block.items) {
                    return Err(violation(format!("unbalanced scope {label}")));
                }
                carried = block.closing_scopes();
            }
        }
        Ok(())
    }

    /// Adds a document tag (`name` or `name:value`). Returns whether it was new.
    ///
    /// # Errors
    /// [`Error::InvalidTag`] when the name is not an identifier.
    pub fn add_tag(&mut self, tag: &str) -> Result<bool, Error> {
        validate_tag(tag)?;
        Ok(self.tags.insert(tag.to_string()))
    }

    pub fn remove_tag(&mut self, tag: &str) -> bool {
        self.tags.remove(tag)
    }

    /// # Errors
    /// [`Error::UnknownSequence`] or [`Error::InvalidTag`].
    pub fn add_sequence_tag(&mut self, sequence: SequenceId, tag: &str) -> Result<bool, Error> {
        validate_tag(tag)?;
        Ok(self.sequence_mut(sequence)?.tags.insert(tag.to_string()))
    }

    /// # Errors
    /// [`Error::UnknownSequence`].
    pub fn remove_sequence_tag(&mut self, sequence: SequenceId, tag: &str) -> Result<bool, Error> {
        Ok(self.sequence_mut(sequence)?.tags.remove(tag))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{Options, TokenSubtype, parse_usfm};

    const SOURCE: &str = "\\id GEN\n\\c 1\n\\p\n\\v 1 In the beginning\n\\p\n\\v 2 And the earth\n\\q1 was without form\n\\c 2\n\\p\n\\v 1 Thus\n";

    fn document() -> Document {
        parse_usfm(SOURCE, &Options::default()).unwrap_or_default()
    }

    fn open_at(document: &Document, position: usize) -> Vec<String> {
        document
            .main()
            .blocks()
            .get(position)
            .map(|b| b.open_scopes().iter().map(str::to_string).collect())
            .unwrap_or_default()
    }

    #[test]
    fn identity_update_changes_nothing() {
        let mut document = document();
        let before = document.clone();
        let main = document.main_id();
        let items = document
            .main()
            .blocks()
            .get(1)
            .map(|b| b.items().to_vec())
            .unwrap_or_default();
        assert!(document.update_items(main, 1, items).is_ok());
        assert_eq!(document, before);
    }

    #[test]
    fn removing_a_chapter_start_cascades() {
        let mut document = document();
        let main = document.main_id();
        assert_eq!(open_at(&document, 1), vec!["chapter/1", "verses/1", "verse/1"]);
        let items: Vec<Item> = document
            .main()
            .blocks()
            .first()
            .map(|b| b.items().to_vec())
            .unwrap_or_default()
            .into_iter()
            .filter(|item| !matches!(item, Item::Scope(mark) if mark.label == "chapter/1"))
            .collect();
        assert!(document.update_items(main, 0, items).is_ok());
        assert_eq!(open_at(&document, 1), vec!["verses/1", "verse/1"]);
        assert!(document.verify_invariants().is_ok());
        assert!(document.cv_index().chapter(1).is_none());
    }

    #[test]
    fn unbalanced_content_is_rejected_untouched() {
        let mut document = document();
        let before = document.clone();
        let main = document.main_id();
        let result = document.update_items(main, 0, vec![Item::end("verse/9")]);
        assert!(matches!(result, Err(Error::UnbalancedScope { position: 0, .. })));
        assert_eq!(document, before);
    }

    #[test]
    fn unknown_scope_types_are_rejected() {
        let mut document = document();
        let main = document.main_id();
        assert!(matches!(
            document.update_items(main, 0, vec![Item::start("colour/red")]),
            Err(Error::UnknownScopeType(_))
        ));
    }

    #[test]
    fn out_of_range_positions_are_reported() {
        let mut document = document();
        let main = document.main_id();
        let len = document.main().blocks().len();
        assert!(matches!(
            document.delete_block(main, len),
            Err(Error::BlockOutOfRange { position, .. }) if position == len
        ));
        assert!(matches!(
            document.insert_block(main, len + 1, "blockTag/p", Vec::new()),
            Err(Error::BlockOutOfRange { .. })
        ));
        assert!(matches!(
            document.update_items(SequenceId(999), 0, Vec::new()),
            Err(Error::UnknownSequence(SequenceId(999)))
        ));
    }

    #[test]
    fn inserted_blocks_inherit_open_scopes() {
        let mut document = document();
        let main = document.main_id();
        assert!(document.insert_block(main, 2, "blockTag/b", Vec::new()).is_ok());
        let inserted = document.main().blocks().get(2);
        assert_eq!(inserted.map(Block::block_scope), Some("blockTag/b"));
        assert_eq!(
            inserted.map(|b| b.open_scopes().iter().collect::<Vec<_>>()),
            Some(vec!["chapter/1", "verses/2", "verse/2"])
        );
        assert!(document.verify_invariants().is_ok());
    }

    #[test]
    fn deleting_a_block_reconciles_the_next_one() {
        let mut document = document();
        let main = document.main_id();
        assert!(document.delete_block(main, 0).is_ok());
        let first = document.main().blocks().first();
        assert_eq!(first.map(|b| b.open_scopes().len()), Some(0));
        assert!(first.is_some_and(|b| !b.items().iter().any(
            |item| matches!(item, Item::Scope(mark) if !mark.is_start() && mark.label == "verse/1")
        )));
        assert!(document.verify_invariants().is_ok());
    }

    #[test]
    fn deleting_the_only_graft_collects_the_sequence() {
        let mut document =
            parse_usfm("\\s Heading\n\\p text", &Options::default()).unwrap_or_default();
        assert_eq!(document.sequences().count(), 2);
        let main = document.main_id();
        assert!(document.update_grafts(main, 0, Vec::new()).is_ok());
        assert_eq!(document.sequences().count(), 1);
    }

    #[test]
    fn grafts_must_target_known_sequences() {
        let mut document = document();
        let main = document.main_id();
        let graft = Graft {
            subtype: SequenceType::Footnote,
            target: main,
        };
        assert!(matches!(
            document.update_grafts(main, 0, vec![graft]),
            Err(Error::MainSequenceGraft(_))
        ));
        let note = document.new_sequence(SequenceType::Footnote);
        let items = vec![
            Item::token(TokenSubtype::WordLike, "x"),
            Item::graft(SequenceType::Footnote, note),
        ];
        let last = document.main().blocks().len() - 1;
        assert!(document.update_items(main, last, items).is_ok());
        assert!(document.sequence(note).is_ok());
    }

    #[test]
    fn tags_are_validated() {
        let mut document = document();
        assert_eq!(document.add_tag("draft").ok(), Some(true));
        assert_eq!(document.add_tag("status:reviewed").ok(), Some(true));
        assert!(matches!(document.add_tag("1bad"), Err(Error::InvalidTag(_))));
        assert!(document.remove_tag("draft"));
        let main = document.main_id();
        assert!(document.add_sequence_tag(main, "spine").is_ok());
        assert!(document.main().tags().contains("spine"));
    }

    #[test]
    fn corrupted_caches_are_detected() {
        let mut document = document();
        if let Some(block) = document.sequences.get_mut(&SequenceId(0)).and_then(|s| s.blocks.get_mut(1)) {
            block.open_scopes = ScopeSet::new();
        }
        assert!(matches!(
            document.verify_invariants(),
            Err(Error::InvariantViolation { block: 1, .. })
        ));
    }
}
