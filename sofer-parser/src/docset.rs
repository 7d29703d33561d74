//! Documents grouped into docSets by language and abbreviation.
use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::{Document, Error, Format, Options, model::DocumentId, parse};

/// What identifies a docSet: `{lang}_{abbr}`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Selectors {
    pub lang: String,
    pub abbr: String,
}

impl Selectors {
    pub fn new(lang: impl Into<String>, abbr: impl Into<String>) -> Self {
        Self {
            lang: lang.into(),
            abbr: abbr.into(),
        }
    }

    #[must_use]
    pub fn doc_set_id(&self) -> String {
        format!("{}_{}", self.lang, self.abbr)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocSet {
    id: String,
    selectors: Selectors,
    documents: BTreeMap<DocumentId, Document>,
    #[serde(skip)]
    by_book: FxHashMap<String, DocumentId>,
}

impl DocSet {
    fn new(selectors: Selectors) -> Self {
        Self {
            id: selectors.doc_set_id(),
            selectors,
            documents: BTreeMap::new(),
            by_book: FxHashMap::default(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn selectors(&self) -> &Selectors {
        &self.selectors
    }

    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }

    /// # Errors
    /// [`Error::UnknownDocument`].
    pub fn document(&self, id: DocumentId) -> Result<&Document, Error> {
        self.documents.get(&id).ok_or(Error::UnknownDocument(id))
    }

    #[must_use]
    pub fn document_by_book_code(&self, book_code: &str) -> Option<&Document> {
        self.by_book
            .get(book_code)
            .and_then(|id| self.documents.get(id))
    }
}

/// Owns every docSet and hands out document ids.
#[derive(Debug, Default)]
pub struct Library {
    doc_sets: BTreeMap<String, DocSet>,
    next_document_id: u32,
    options: Options,
}

impl Library {
    #[must_use]
    pub fn new(options: Options) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Parses `content` and adds it to the docSet `selectors` names, creating the
    /// docSet if needed. Nothing changes when parsing fails.
    ///
    /// # Errors
    /// Any parse error, or [`Error::DuplicateBookCode`] when the docSet already holds
    /// a document for the same book.
    #[tracing::instrument(skip(self, content), fields(doc_set = %selectors.doc_set_id()))]
    pub fn import_document(
        &mut self,
        selectors: &Selectors,
        format: Format,
        content: &str,
    ) -> Result<DocumentId, Error> {
        let document = parse(content, format, &self.options)?;
        self.insert_document(selectors, document)
    }

    /// Adds an already parsed document, assigning it a fresh id.
    ///
    /// # Errors
    /// [`Error::DuplicateBookCode`] when the docSet already holds a document for the
    /// same book.
    pub fn insert_document(
        &mut self,
        selectors: &Selectors,
        mut document: Document,
    ) -> Result<DocumentId, Error> {
        let doc_set_id = selectors.doc_set_id();
        let book_code = document.book_code().map(str::to_string);
        if let Some(book_code) = &book_code
            && self
                .doc_sets
                .get(&doc_set_id)
                .is_some_and(|doc_set| doc_set.by_book.contains_key(book_code))
        {
            tracing::error!(doc_set = %doc_set_id, book_code, "book already in docSet");
            return Err(Error::DuplicateBookCode {
                doc_set: doc_set_id,
                book_code: book_code.clone(),
            });
        }

        let id = DocumentId(self.next_document_id);
        self.next_document_id += 1;
        document.id = id;
        let doc_set = self
            .doc_sets
            .entry(doc_set_id)
            .or_insert_with(|| DocSet::new(selectors.clone()));
        if let Some(book_code) = book_code {
            doc_set.by_book.insert(book_code, id);
        }
        doc_set.documents.insert(id, document);
        tracing::info!(document = %id, "imported document");
        Ok(id)
    }

    pub fn doc_sets(&self) -> impl Iterator<Item = &DocSet> {
        self.doc_sets.values()
    }

    /// # Errors
    /// [`Error::UnknownDocSet`].
    pub fn doc_set(&self, id: &str) -> Result<&DocSet, Error> {
        self.doc_sets
            .get(id)
            .ok_or_else(|| Error::UnknownDocSet(id.to_string()))
    }

    fn doc_set_mut(&mut self, id: &str) -> Result<&mut DocSet, Error> {
        self.doc_sets
            .get_mut(id)
            .ok_or_else(|| Error::UnknownDocSet(id.to_string()))
    }

    /// # Errors
    /// [`Error::UnknownDocSet`] or [`Error::UnknownDocument`].
    pub fn document(&self, doc_set: &str, id: DocumentId) -> Result<&Document, Error> {
        self.doc_set(doc_set)?.document(id)
    }

    /// Mutable access for the edit operations on [`Document`].
    ///
    /// # Errors
    /// [`Error::UnknownDocSet`] or [`Error::UnknownDocument`].
    pub fn document_mut(&mut self, doc_set: &str, id: DocumentId) -> Result<&mut Document, Error> {
        self.doc_set_mut(doc_set)?
            .documents
            .get_mut(&id)
            .ok_or(Error::UnknownDocument(id))
    }

    /// # Errors
    /// [`Error::UnknownDocSet`] or [`Error::UnknownDocument`].
    pub fn remove_document(&mut self, doc_set: &str, id: DocumentId) -> Result<Document, Error> {
        let set = self.doc_set_mut(doc_set)?;
        let document = set
            .documents
            .remove(&id)
            .ok_or(Error::UnknownDocument(id))?;
        set.by_book.retain(|_, document_id| *document_id != id);
        if set.documents.is_empty() {
            self.doc_sets.remove(doc_set);
        }
        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn selectors() -> Selectors {
        Selectors::new("eng", "web")
    }

    #[test]
    fn documents_are_indexed_by_book_code() {
        let mut library = Library::default();
        let genesis = library.import_document(&selectors(), Format::Usfm, "\\id GEN\n\\p a");
        let exodus = library.import_document(&selectors(), Format::Usfm, "\\id EXO\n\\p b");
        assert!(genesis.is_ok() && exodus.is_ok());
        let doc_set = library.doc_set("eng_web");
        assert_eq!(doc_set.as_ref().map(|d| d.documents().count()).ok(), Some(2));
        assert_eq!(
            doc_set
                .as_ref()
                .ok()
                .and_then(|d| d.document_by_book_code("EXO"))
                .map(Document::id),
            exodus.ok()
        );
    }

    #[test]
    fn duplicate_books_are_refused() {
        let mut library = Library::default();
        assert!(library.import_document(&selectors(), Format::Usfm, "\\id GEN\n").is_ok());
        assert!(matches!(
            library.import_document(&selectors(), Format::Usfm, "\\id GEN\n"),
            Err(Error::DuplicateBookCode { .. })
        ));
        let other = Selectors::new("fra", "lsg");
        assert!(library.import_document(&other, Format::Usfm, "\\id GEN\n").is_ok());
    }

    #[test]
    fn parsed_documents_get_fresh_ids() {
        let mut library = Library::default();
        let parsed = parse("\\id RUT\n", Format::Usfm, &Options::default()).unwrap_or_default();
        let first = library.insert_document(&selectors(), parsed.clone());
        let other = Selectors::new("eng", "kjv");
        let second = library.insert_document(&other, parsed);
        assert_eq!(first.ok(), Some(DocumentId(0)));
        assert_eq!(second.ok(), Some(DocumentId(1)));
        assert_eq!(
            library.document("eng_kjv", DocumentId(1)).map(Document::id).ok(),
            Some(DocumentId(1))
        );
    }

    #[test]
    fn failed_imports_leave_the_library_untouched() {
        let mut library = Library::default();
        assert!(library.import_document(&selectors(), Format::Usx, "<usx><nope/></usx>").is_err());
        assert_eq!(library.doc_sets().count(), 0);
        assert!(matches!(library.doc_set("eng_web"), Err(Error::UnknownDocSet(_))));
    }

    #[test]
    fn edits_go_through_ids() {
        let mut library = Library::default();
        let Ok(id) = library.import_document(&selectors(), Format::Usfm, "\\id GEN\n\\p a") else {
            panic!("import failed");
        };
        let Ok(document) = library.document_mut("eng_web", id) else {
            panic!("document missing");
        };
        let main = document.main_id();
        assert!(document.insert_block(main, 0, "blockTag/b", Vec::new()).is_ok());
        assert_eq!(
            library.document("eng_web", id).map(|d| d.main().blocks().len()).ok(),
            Some(2)
        );
        assert!(matches!(
            library.document("eng_web", DocumentId(42)),
            Err(Error::UnknownDocument(DocumentId(42)))
        ));
        assert!(library.remove_document("eng_web", id).is_ok());
        assert!(library.doc_set("eng_web").is_err());
    }
}
