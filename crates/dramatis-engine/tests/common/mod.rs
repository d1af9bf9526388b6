//! Builders shared by the integration tests.
#![allow(dead_code)]

use dramatis_engine::character::StandardCharacter;
use dramatis_engine::{BookScript, ReferenceText, TextBlock, VerseNumber, Versification};

pub const BOOK: &str = "MRK";

pub fn narrator() -> String {
    StandardCharacter::Narrator.id_for(BOOK)
}

pub fn verse_block(chapter: u32, verse: u32, text: &str, character: &str) -> TextBlock {
    TextBlock::new("p", chapter, verse)
        .with_character(character)
        .with_verse(VerseNumber::new(verse))
        .with_text(text)
}

pub fn continuation_block(chapter: u32, verse: u32, text: &str, character: &str) -> TextBlock {
    TextBlock::new("p", chapter, verse)
        .with_character(character)
        .with_paragraph_start(false)
        .with_text(text)
}

pub fn book(blocks: Vec<TextBlock>) -> BookScript {
    BookScript::new(BOOK, Versification::new("English", vec![45, 28, 35]), blocks)
}

/// One narrator block per verse of chapter 1.
pub fn english(verses: &[&str]) -> ReferenceText {
    let blocks = verses
        .iter()
        .zip(1..)
        .map(|(text, verse)| verse_block(1, verse, text, &narrator()))
        .collect();
    ReferenceText::new("English", "he said.").with_book(BOOK, blocks)
}

/// Chain flags must form well-formed runs: every continuation follows a
/// chained block of the same speaker.
pub fn assert_chains_well_formed(book: &BookScript) {
    let blocks = book.blocks();
    for (i, block) in blocks.iter().enumerate() {
        if !block.multi_block_quote.is_continuation() {
            continue;
        }
        let previous = i
            .checked_sub(1)
            .map(|p| &blocks[p])
            .unwrap_or_else(|| panic!("continuation at first block: {block:?}"));
        assert!(
            previous.multi_block_quote.is_chained(),
            "continuation at {i} does not follow a chained block"
        );
        assert_eq!(
            previous.character_id_in_script(),
            block.character_id_in_script(),
            "speaker changes inside quote chain at {i}"
        );
    }
}
