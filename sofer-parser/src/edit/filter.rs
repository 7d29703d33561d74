use crate::{
    Document, Error,
    edit::reconcile,
    model::{Graft, Item, ScopeSet, SequenceId},
};

/// Which scope marks and grafts survive a filter pass. Entries are label (or
/// sequence type) prefixes: `chapter` matches `chapter/3`.
///
/// `None` for an include list keeps everything the exclude list does not drop.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScopeFilter {
    pub include_scopes: Option<Vec<String>>,
    pub exclude_scopes: Vec<String>,
    pub include_grafts: Option<Vec<String>>,
    pub exclude_grafts: Vec<String>,
}

fn matches_any(prefixes: &[String], value: &str) -> bool {
    prefixes.iter().any(|prefix| value.starts_with(prefix.as_str()))
}

fn keeps(include: Option<&[String]>, exclude: &[String], value: &str) -> bool {
    include.is_none_or(|include| matches_any(include, value)) && !matches_any(exclude, value)
}

impl ScopeFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn include_scopes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include_scopes = Some(prefixes.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn exclude_scopes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_scopes.extend(prefixes.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn include_grafts<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include_grafts = Some(prefixes.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn exclude_grafts<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_grafts.extend(prefixes.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn keeps_scope(&self, label: &str) -> bool {
        keeps(self.include_scopes.as_deref(), &self.exclude_scopes, label)
    }

    #[must_use]
    pub fn keeps_graft(&self, graft: &Graft) -> bool {
        keeps(
            self.include_grafts.as_deref(),
            &self.exclude_grafts,
            graft.subtype.as_str(),
        )
    }

    fn keeps_item(&self, item: &Item) -> bool {
        match item {
            Item::Token(_) => true,
            Item::Scope(mark) => self.keeps_scope(&mark.label),
            Item::Graft(graft) => self.keeps_graft(graft),
        }
    }
}

impl Document {
    /// Drops scope marks and grafts `filter` rejects from one sequence.
    ///
    /// Runs front to back: each block's inherited scopes come from the already
    /// filtered block before it, never from the stored caches.
    ///
    /// # Errors
    /// [`Error::UnknownSequence`].
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn filter_sequence(&mut self, id: SequenceId, filter: &ScopeFilter) -> Result<(), Error> {
        let sequence = self.sequence_mut(id)?;
        let mut carried = ScopeSet::new();
        let mut dropped_grafts = false;
        for block in &mut sequence.blocks {
            let grafts = block.grafts.len();
            block.grafts.retain(|graft| filter.keeps_graft(graft));
            let inline_grafts = block.items.iter().filter(|i| matches!(i, Item::Graft(_))).count();
            block.items.retain(|item| filter.keeps_item(item));
            dropped_grafts |= grafts != block.grafts.len()
                || inline_grafts != block.items.iter().filter(|i| matches!(i, Item::Graft(_))).count();
            reconcile(&carried, &mut block.items);
            block.open_scopes = carried;
            block.included_scopes = ScopeSet::started_in(&block.items);
            carried = block.closing_scopes();
        }
        if dropped_grafts {
            self.gc_sequences();
        }
        if id == self.main_id {
            self.rebuild_cv_index();
        }
        Ok(())
    }

    /// [`Document::filter_sequence`] over every sequence.
    ///
    /// # Errors
    /// Never in practice; sequences removed by an earlier pass are skipped.
    pub fn filter(&mut self, filter: &ScopeFilter) -> Result<(), Error> {
        let ids: Vec<SequenceId> = self.sequences.keys().copied().collect();
        for id in ids {
            if self.sequences.contains_key(&id) {
                self.filter_sequence(id, filter)?;
            }
        }
        Ok(())
    }
}
