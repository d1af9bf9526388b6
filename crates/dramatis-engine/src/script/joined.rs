//! The presentation view of a book: adjacent blocks read by the same voice in
//! one paragraph run are merged.

use super::block::{TextBlock, ends_with_sentence_ending_punctuation};
use super::book::BookScript;
use crate::narrator_overrides::NarratorOverrides;

/// Paragraph styles that carry on the paragraph before them even though they
/// start a new paragraph in the source markup.
const FOLLOW_ON_STYLES: &[&str] = &["q2", "q3", "q4", "qm2", "qm3", "pi2", "m"];

impl BookScript {
    /// A new book with joinable neighbouring blocks merged. `self` is not changed.
    ///
    /// With `narrator_overrides`, narrator blocks inside an override range are
    /// first given the override speaker as their script name, and joining then
    /// compares those names.
    pub fn joined_blocks(&self, narrator_overrides: Option<&NarratorOverrides>) -> BookScript {
        let mut joined: Vec<TextBlock> = Vec::with_capacity(self.len());
        for block in self.blocks() {
            let mut block = block.clone();
            if let Some(overrides) = narrator_overrides
                && block.is_narrator()
                && let Some(speaker) =
                    overrides.character_for(self.book_id(), block.chapter_number, block.initial_start_verse)
            {
                block.character_id_override_for_script = Some(speaker.to_string());
            }

            if let Some(previous) = joined.last_mut()
                && can_join(previous, &block)
                && let Ok(combined) = previous.combine_with(&block)
            {
                *previous = combined;
                continue;
            }
            joined.push(block);
        }

        let mut book = self.clone();
        *book.blocks_mut() = joined;
        book
    }
}

fn can_join(previous: &TextBlock, next: &TextBlock) -> bool {
    previous.chapter_number == next.chapter_number
        && previous.character_id_in_script() == next.character_id_in_script()
        && previous.delivery == next.delivery
        && continues_paragraph(next)
        && references_allow_join(previous, next)
}

fn continues_paragraph(next: &TextBlock) -> bool {
    !next.is_paragraph_start || FOLLOW_ON_STYLES.contains(&next.style_tag.as_str())
}

fn references_allow_join(previous: &TextBlock, next: &TextBlock) -> bool {
    if previous.reference_depth() != next.reference_depth() {
        return false;
    }
    let starts_new_verse = next.starts_at_verse_start();
    previous.reference_levels().all(|reference| {
        let text = reference.text(false);
        !ends_with_sentence_ending_punctuation(&text)
            && (!starts_new_verse || reference.is_empty_or_verse_only())
    })
}
