use serde::{Deserialize, Serialize};

/// Chapter/verse layout of a book: the last verse number of every chapter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Versification {
    pub name: String,
    /// `last_verses[0]` is the last verse of chapter 1.
    pub last_verses: Vec<u32>,
}

impl Versification {
    pub fn new(name: impl Into<String>, last_verses: Vec<u32>) -> Self {
        Self {
            name: name.into(),
            last_verses,
        }
    }

    pub fn last_verse(&self, chapter: u32) -> Option<u32> {
        let index = usize::try_from(chapter).ok()?.checked_sub(1)?;
        self.last_verses.get(index).copied()
    }

    pub fn chapter_count(&self) -> usize {
        self.last_verses.len()
    }

    pub fn is_valid_verse(&self, chapter: u32, verse: u32) -> bool {
        self.last_verse(chapter)
            .is_some_and(|last| (1..=last).contains(&verse))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_verse_lookup() {
        let versification = Versification::new("English", vec![45, 28]);
        assert_eq!(versification.last_verse(1), Some(45));
        assert_eq!(versification.last_verse(2), Some(28));
        assert_eq!(versification.last_verse(0), None);
        assert_eq!(versification.last_verse(3), None);
        assert!(versification.is_valid_verse(2, 28));
        assert!(!versification.is_valid_verse(2, 29));
    }
}
