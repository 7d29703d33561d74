//! Chapter and verse lookup over the main sequence.
use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::{Item, Sequence};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ItemPosition {
    pub block: usize,
    pub item: usize,
}

/// From the start mark to the end mark, both inclusive. A scope never closed runs
/// to the last item of the sequence.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ItemRange {
    pub start: ItemPosition,
    pub end: ItemPosition,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ChapterEntry {
    pub range: ItemRange,
    /// A verse may occur more than once in a chapter.
    pub verses: BTreeMap<u32, Vec<ItemRange>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ChapterVerseIndex {
    chapters: BTreeMap<u32, ChapterEntry>,
}

fn number_of(label: &str, prefix: &str) -> Option<u32> {
    label.strip_prefix(prefix)?.parse().ok()
}

struct OpenVerse {
    chapter: Option<u32>,
    verse: u32,
    start: ItemPosition,
}

impl ChapterVerseIndex {
    pub(crate) fn build(main: &Sequence) -> Self {
        let mut chapters: BTreeMap<u32, ChapterEntry> = BTreeMap::new();
        let mut open_chapter: Option<u32> = None;
        let mut open_verses: Vec<OpenVerse> = Vec::new();
        let mut last = ItemPosition::default();

        for (block_index, block) in main.blocks().iter().enumerate() {
            for (item_index, item) in block.items().iter().enumerate() {
                let here = ItemPosition {
                    block: block_index,
                    item: item_index,
                };
                last = here;
                let Item::Scope(mark) = item else {
                    continue;
                };
                if let Some(chapter) = number_of(&mark.label, "chapter/") {
                    if mark.is_start() {
                        open_chapter = Some(chapter);
                        let entry = chapters.entry(chapter).or_default();
                        entry.range = ItemRange {
                            start: here,
                            end: here,
                        };
                    } else if let Some(entry) = chapters.get_mut(&chapter) {
                        entry.range.end = here;
                        if open_chapter == Some(chapter) {
                            open_chapter = None;
                        }
                    }
                } else if let Some(verse) = number_of(&mark.label, "verse/") {
                    if mark.is_start() {
                        open_verses.push(OpenVerse {
                            chapter: open_chapter,
                            verse,
                            start: here,
                        });
                    } else if let Some(index) = open_verses.iter().position(|v| v.verse == verse)
                    {
                        let open = open_verses.remove(index);
                        record_verse(&mut chapters, &open, here);
                    }
                }
            }
        }

        for open in &open_verses {
            record_verse(&mut chapters, open, last);
        }
        if let Some(entry) = open_chapter.and_then(|chapter| chapters.get_mut(&chapter)) {
            entry.range.end = last;
        }
        tracing::trace!(chapters = chapters.len(), "rebuilt chapter/verse index");
        Self { chapters }
    }

    #[must_use]
    pub fn chapter(&self, chapter: u32) -> Option<&ChapterEntry> {
        self.chapters.get(&chapter)
    }

    /// Every occurrence of `chapter:verse`; empty when there is none.
    #[must_use]
    pub fn verse(&self, chapter: u32, verse: u32) -> &[ItemRange] {
        self.chapters
            .get(&chapter)
            .and_then(|entry| entry.verses.get(&verse))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn chapters(&self) -> impl Iterator<Item = (u32, &ChapterEntry)> {
        self.chapters.iter().map(|(number, entry)| (*number, entry))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }
}

fn record_verse(chapters: &mut BTreeMap<u32, ChapterEntry>, open: &OpenVerse, end: ItemPosition) {
    let Some(entry) = open.chapter.and_then(|chapter| chapters.get_mut(&chapter)) else {
        return;
    };
    entry.verses.entry(open.verse).or_default().push(ItemRange {
        start: open.start,
        end,
    });
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{Options, parse_usfm};

    #[test]
    fn chapters_and_verses_are_located() {
        let document = parse_usfm(
            "\\c 1\n\\p\n\\v 1 a\n\\v 2-3 b\n\\c 2\n\\p\n\\v 1 c",
            &Options::default(),
        )
        .unwrap_or_default();
        let index = document.cv_index();
        assert_eq!(index.chapters().map(|(n, _)| n).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(index.verse(1, 1).len(), 1);
        assert_eq!(index.verse(1, 3).len(), 1);
        assert!(index.verse(1, 4).is_empty());
        assert!(index.verse(3, 1).is_empty());

        let Some(first) = index.verse(1, 1).first() else {
            panic!("expected verse 1:1");
        };
        assert_eq!(first.start, ItemPosition { block: 0, item: 2 });
        let chapter_two = index.chapter(2).map(|entry| entry.range);
        let last_block = document.main().blocks().len() - 1;
        assert_eq!(chapter_two.map(|r| r.end.block), Some(last_block));
    }

    #[test]
    fn empty_sequences_have_no_chapters() {
        let document = parse_usfm("\\p just text", &Options::default()).unwrap_or_default();
        assert!(document.cv_index().is_empty());
    }
}
