//! Reference texts: independently segmented and attributed translations that
//! the vernacular script is aligned against.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::script::TextBlock;

/// A source of reference-text blocks.
///
/// A source may be backed by another source one level further down (e.g. a
/// Spanish reference text backed by English), forming a chain of levels.
pub trait ReferenceTextSource {
    fn language_name(&self) -> &str;

    /// Every block of `book_id` in `chapter` overlapping `start_verse..=end_verse`, in order.
    fn blocks_for_range(
        &self,
        book_id: &str,
        chapter: u32,
        start_verse: u32,
        end_verse: u32,
    ) -> Vec<TextBlock>;

    /// Localized narration filler such as "he said."; empty when there is none.
    fn he_said_text(&self) -> &str;

    fn backing(&self) -> Option<&dyn ReferenceTextSource> {
        None
    }

    /// Whether a matchup window may begin at `chapter:verse`: this source has
    /// nothing there, or one of its blocks starts cleanly at that verse.
    fn is_ok_to_break_at_verse(&self, book_id: &str, chapter: u32, verse: u32) -> bool {
        let blocks = self.blocks_for_range(book_id, chapter, verse, verse);
        blocks.is_empty()
            || blocks
                .iter()
                .any(|b| b.initial_start_verse == verse && b.starts_at_verse_start())
    }
}

/// The source serving reference level `level` (0 is `source` itself).
pub fn source_at_level(
    source: &dyn ReferenceTextSource,
    level: usize,
) -> Option<&dyn ReferenceTextSource> {
    let mut current = source;
    for _ in 0..level {
        current = current.backing()?;
    }
    Some(current)
}

/// An in-memory reference text keyed by book id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceText {
    pub language_name: String,
    #[serde(default)]
    pub he_said_text: String,
    #[serde(default)]
    pub books: BTreeMap<String, Vec<TextBlock>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backing: Option<Box<ReferenceText>>,
}

impl ReferenceText {
    pub fn new(language_name: impl Into<String>, he_said_text: impl Into<String>) -> Self {
        Self {
            language_name: language_name.into(),
            he_said_text: he_said_text.into(),
            ..Default::default()
        }
    }

    pub fn with_book(mut self, book_id: impl Into<String>, blocks: Vec<TextBlock>) -> Self {
        self.books.insert(book_id.into(), blocks);
        self
    }

    pub fn with_backing(mut self, backing: ReferenceText) -> Self {
        self.backing = Some(Box::new(backing));
        self
    }

    pub fn book(&self, book_id: &str) -> Option<&[TextBlock]> {
        self.books.get(book_id).map(Vec::as_slice)
    }
}

impl ReferenceTextSource for ReferenceText {
    fn language_name(&self) -> &str {
        &self.language_name
    }

    fn blocks_for_range(
        &self,
        book_id: &str,
        chapter: u32,
        start_verse: u32,
        end_verse: u32,
    ) -> Vec<TextBlock> {
        self.book(book_id)
            .unwrap_or_default()
            .iter()
            .filter(|b| b.chapter_number == chapter && b.overlaps_verses(start_verse, end_verse))
            .cloned()
            .collect()
    }

    fn he_said_text(&self) -> &str {
        &self.he_said_text
    }

    fn backing(&self) -> Option<&dyn ReferenceTextSource> {
        self.backing
            .as_deref()
            .map(|backing| backing as &dyn ReferenceTextSource)
    }
}
