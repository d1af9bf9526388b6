use std::cell::OnceCell;
use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};

use super::block::{BlockElement, MultiBlockQuote, TextBlock};
use super::split::{SplitAt, split_block_in};
use crate::character::{self, AMBIGUOUS, StandardCharacter};
use crate::error::{Result, ScriptError};
use crate::versification::Versification;

/// A split made by the user that could not be carried over onto freshly
/// parsed text, kept so they can redo it by hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnappliedSplit {
    /// The pieces of the split as they were in the old book.
    pub pieces: Vec<TextBlock>,
    /// The block in the new book the pieces were expected to come from, if one was found.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<TextBlock>,
}

/// The full ordered block sequence of one book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookScript {
    book_id: String,
    #[serde(default)]
    versification: Versification,
    blocks: Vec<TextBlock>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    unapplied_splits: Vec<UnappliedSplit>,
    #[serde(default)]
    split_id_counter: u32,
    /// (chapter, verse) -> index of the first block covering it. Rebuilt lazily.
    #[serde(skip)]
    verse_index: OnceCell<BTreeMap<(u32, u32), usize>>,
}

impl PartialEq for BookScript {
    fn eq(&self, other: &Self) -> bool {
        self.book_id == other.book_id
            && self.versification == other.versification
            && self.blocks == other.blocks
            && self.unapplied_splits == other.unapplied_splits
    }
}

impl BookScript {
    pub fn new(book_id: impl Into<String>, versification: Versification, blocks: Vec<TextBlock>) -> Self {
        Self {
            book_id: book_id.into(),
            versification,
            blocks,
            unapplied_splits: Vec::new(),
            split_id_counter: 0,
            verse_index: OnceCell::new(),
        }
    }

    pub fn book_id(&self) -> &str {
        &self.book_id
    }

    pub fn versification(&self) -> &Versification {
        &self.versification
    }

    pub fn narrator_id(&self) -> String {
        StandardCharacter::Narrator.id_for(&self.book_id)
    }

    pub fn blocks(&self) -> &[TextBlock] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TextBlock> {
        self.blocks.get(index)
    }

    /// Mutable access to one block for attribution edits.
    pub fn block_mut(&mut self, index: usize) -> Option<&mut TextBlock> {
        self.invalidate_verse_index();
        self.blocks.get_mut(index)
    }

    pub(crate) fn blocks_mut(&mut self) -> &mut Vec<TextBlock> {
        self.invalidate_verse_index();
        &mut self.blocks
    }

    pub fn last_verse_of_chapter(&self, chapter: u32) -> Option<u32> {
        self.versification.last_verse(chapter)
    }

    pub fn unapplied_splits(&self) -> &[UnappliedSplit] {
        &self.unapplied_splits
    }

    pub fn clear_unapplied_splits(&mut self) {
        self.unapplied_splits.clear();
    }

    pub(crate) fn push_unapplied_split(&mut self, split: UnappliedSplit) {
        self.unapplied_splits.push(split);
    }

    /// The split id the next new split will get: never one already in use.
    pub fn next_split_id(&self) -> u32 {
        let in_use = self
            .blocks
            .iter()
            .filter_map(|b| b.split_id)
            .max()
            .map_or(0, |max| max + 1);
        self.split_id_counter.max(in_use)
    }

    pub(crate) fn reserve_split_ids(&mut self, next: u32) {
        self.split_id_counter = self.split_id_counter.max(next);
    }

    // ============ Verse lookup ============

    fn invalidate_verse_index(&mut self) {
        self.verse_index = OnceCell::new();
    }

    fn verse_index(&self) -> &BTreeMap<(u32, u32), usize> {
        self.verse_index.get_or_init(|| {
            debug!("building verse index for {}", self.book_id);
            let mut index = BTreeMap::new();
            for (i, block) in self.blocks.iter().enumerate() {
                for number in block.verse_numbers() {
                    for verse in number.start..=number.end {
                        index.entry((block.chapter_number, verse)).or_insert(i);
                    }
                }
            }
            index
        })
    }

    /// Index of the first block containing `chapter:verse`.
    pub fn first_block_index_for_verse(&self, chapter: u32, verse: u32) -> Option<usize> {
        self.verse_index().get(&(chapter, verse)).copied()
    }

    /// Every block containing `chapter:verse`, in order.
    pub fn blocks_for_verse(&self, chapter: u32, verse: u32) -> &[TextBlock] {
        let Some(first) = self.first_block_index_for_verse(chapter, verse) else {
            return &[];
        };
        let count = self.blocks[first..]
            .iter()
            .take_while(|b| b.chapter_number == chapter && b.covers_verse(verse))
            .count();
        &self.blocks[first..first + count.max(1)]
    }

    // ============ Splitting ============

    /// Split block `index` inside `verse`, returning the index of the new block.
    pub fn split_block(
        &mut self,
        index: usize,
        verse: &str,
        at: SplitAt,
        character: Option<&str>,
    ) -> Result<usize> {
        let mut next = self.next_split_id();
        let new_index = split_block_in(&mut self.blocks, index, verse, at, character, &mut next)?;
        self.split_id_counter = next;
        self.invalidate_verse_index();
        Ok(new_index)
    }

    /// Make sure a block boundary falls right after `verse`, splitting block
    /// `index` if the verse has content after it inside the block.
    ///
    /// Returns false when the block has no verse markers or does not contain
    /// the verse, or when no later content exists to split off.
    pub fn try_split_block_at_end_of_verse(&mut self, index: usize, verse: u32) -> bool {
        let Some(block) = self.blocks.get(index) else {
            return false;
        };
        if !block.elements.iter().any(BlockElement::is_verse) {
            return false;
        }
        let segments = block.verse_segments();
        let Some(segment) = segments.iter().rev().find(|s| s.number.contains(verse)) else {
            return false;
        };

        if segment.end >= block.elements.len() {
            let next_starts_verse = self
                .blocks
                .get(index + 1)
                .filter(|next| next.multi_block_quote.is_continuation())
                .map(TextBlock::starts_at_verse_start);
            return match next_starts_verse {
                Some(true) => true,
                Some(false) => self.try_split_block_at_end_of_verse(index + 1, verse),
                None => false,
            };
        }

        let token = segment.number.to_string();
        let character = block.character_id.clone();
        let display = block.character_id_override_for_script.clone();
        let delivery = block.delivery.clone();
        let confirmed = block.user_confirmed;

        match self.split_block(index, &token, SplitAt::EndOfVerse, Some(&character)) {
            Ok(new_index) => {
                let later = &mut self.blocks[new_index];
                later.character_id_override_for_script = display;
                later.delivery = delivery;
                later.user_confirmed = confirmed;
                true
            }
            Err(_) => false,
        }
    }

    // ============ Replacing ============

    /// Replace `count` blocks starting at `start` with `new_blocks`.
    ///
    /// Quote chains running on past the replaced span must stay consistent:
    /// if the last new block ends a chain, the following continuation blocks
    /// become a chain of their own; if it feeds one, the followers must be
    /// spoken by the same character or nothing is changed.
    pub fn replace_blocks(&mut self, start: usize, count: usize, new_blocks: Vec<TextBlock>) -> Result<()> {
        let len = self.blocks.len();
        let end = start
            .checked_add(count)
            .filter(|&end| end <= len)
            .ok_or(ScriptError::SpanOutOfRange {
                start,
                end: start.saturating_add(count),
                len,
            })?;
        let Some(last) = new_blocks.last() else {
            return Err(ScriptError::EmptyReplacement);
        };

        let follower_end = self.blocks[end..]
            .iter()
            .position(|b| !b.multi_block_quote.is_continuation())
            .map_or(len, |p| end + p);
        let feeds_followers = last.multi_block_quote.is_chained();

        if feeds_followers
            && let Some(offset) = self.blocks[end..follower_end]
                .iter()
                .position(|b| b.speaker() != last.speaker())
        {
            let block = &self.blocks[end + offset];
            return Err(ScriptError::DanglingContinuation {
                index: end + offset,
                description: describe(block),
            });
        }

        let inserted = new_blocks.len();
        self.blocks.splice(start..end, new_blocks);
        let followers = start + inserted..follower_end - end + start + inserted;
        if !feeds_followers && !followers.is_empty() {
            reroot_chain(&mut self.blocks[followers]);
        }
        self.invalidate_verse_index();
        Ok(())
    }

    /// Make attribution consistent within every quote chain: a chain whose
    /// members all name the same real character is confirmed throughout, and
    /// one whose members disagree becomes ambiguous.
    pub fn clean_up_multi_block_quotes(&mut self) {
        let len = self.blocks.len();
        let mut i = 0;
        while i < len {
            if !self.blocks[i].multi_block_quote.is_chained() {
                i += 1;
                continue;
            }
            let mut end = i + 1;
            while end < len && self.blocks[end].multi_block_quote.is_continuation() {
                end += 1;
            }

            let chain = &mut self.blocks[i..end];
            let first = chain[0].character_id.clone();
            if chain.iter().all(|b| b.character_id == first) {
                if !character::is_unclear(&first) {
                    let display = chain[0].character_id_override_for_script.clone();
                    for block in chain.iter_mut() {
                        block.user_confirmed = true;
                        block.character_id_override_for_script = display.clone();
                    }
                }
            } else {
                debug!("quote chain at block {i} has conflicting speakers; marking ambiguous");
                for block in chain.iter_mut() {
                    block.set_character(AMBIGUOUS);
                    block.user_confirmed = false;
                }
            }
            i = end;
        }
    }
}

/// Turn an orphaned run of continuation blocks into a chain of its own,
/// spoken throughout by whoever speaks its first block.
pub(crate) fn reroot_chain(chain: &mut [TextBlock]) {
    let Some((first, rest)) = chain.split_first_mut() else {
        return;
    };
    first.multi_block_quote = if rest.is_empty() {
        MultiBlockQuote::None
    } else {
        MultiBlockQuote::Start
    };
    for block in rest {
        block.character_id = first.character_id.clone();
        block.character_id_override_for_script = first.character_id_override_for_script.clone();
    }
}

pub(crate) fn describe(block: &TextBlock) -> String {
    let text = block.text(false);
    let snippet: String = text.chars().take(30).collect();
    format!(
        "{}:{} {} \"{}\"",
        block.chapter_number,
        block.initial_verse(),
        block.character_id,
        snippet.trim()
    )
}
