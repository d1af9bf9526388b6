//! Verse ranges where narration belongs to someone other than the generic
//! narrator (e.g. a book written in the first person).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarratorOverride {
    pub book_id: String,
    pub start_chapter: u32,
    pub start_verse: u32,
    pub end_chapter: u32,
    pub end_verse: u32,
    pub character: String,
}

impl NarratorOverride {
    fn covers(&self, book_id: &str, chapter: u32, verse: u32) -> bool {
        self.book_id == book_id
            && (self.start_chapter, self.start_verse) <= (chapter, verse)
            && (chapter, verse) <= (self.end_chapter, self.end_verse)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarratorOverrides {
    #[serde(default)]
    pub entries: Vec<NarratorOverride>,
}

impl NarratorOverrides {
    pub fn new(entries: Vec<NarratorOverride>) -> Self {
        Self { entries }
    }

    /// The character narrating `book_id` chapter:verse, if overridden.
    pub fn character_for(&self, book_id: &str, chapter: u32, verse: u32) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.covers(book_id, chapter, verse))
            .map(|entry| entry.character.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_ranges_span_chapters() {
        let overrides = NarratorOverrides::new(vec![NarratorOverride {
            book_id: "NEH".into(),
            start_chapter: 1,
            start_verse: 1,
            end_chapter: 7,
            end_verse: 5,
            character: "Nehemiah".into(),
        }]);

        assert_eq!(overrides.character_for("NEH", 3, 40), Some("Nehemiah"));
        assert_eq!(overrides.character_for("NEH", 7, 5), Some("Nehemiah"));
        assert_eq!(overrides.character_for("NEH", 7, 6), None);
        assert_eq!(overrides.character_for("EZR", 3, 1), None);
    }
}
