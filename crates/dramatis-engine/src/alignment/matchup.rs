use log::{debug, info};

use super::matching;
use super::window::resolve_window;
use crate::character::{self, StandardCharacter, UNKNOWN};
use crate::error::{Result, ScriptError};
use crate::reference_text::{ReferenceTextSource, source_at_level};
use crate::script::book::describe;
use crate::script::{BookScript, MultiBlockQuote, PortionScript, SplitAt, TextBlock};

/// Edits the cloned window before any alignment happens (e.g. to pre-split rows).
pub type PreEdit<'a> = Box<dyn FnOnce(&mut PortionScript) + 'a>;

/// `(chapter, verse) -> bool`: may a matchup window start at this verse?
pub type VerseBreakPredicate<'a> = Box<dyn Fn(u32, u32) -> bool + 'a>;

/// How to build a [`BlockMatchup`].
#[derive(Default)]
pub struct MatchupOptions<'a> {
    pre_edit: Option<PreEdit<'a>>,
    is_ok_to_break_at_verse: Option<VerseBreakPredicate<'a>>,
    predetermined_block_count: Option<usize>,
}

impl<'a> MatchupOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pre_edit(mut self, pre_edit: impl FnOnce(&mut PortionScript) + 'a) -> Self {
        self.pre_edit = Some(Box::new(pre_edit));
        self
    }

    /// Replace the reference text's own idea of where windows may start.
    pub fn with_verse_break_predicate(mut self, predicate: impl Fn(u32, u32) -> bool + 'a) -> Self {
        self.is_ok_to_break_at_verse = Some(Box::new(predicate));
        self
    }

    /// Take exactly this many blocks from the start of the window.
    pub fn with_block_count(mut self, count: usize) -> Self {
        self.predetermined_block_count = Some(count);
        self
    }
}

/// Which rows [`BlockMatchup::insert_he_said_text`] should fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeSaidRows {
    Row(usize),
    All,
}

/// A working session aligning one window of a book with reference text.
///
/// The matchup owns clones of the window's blocks; the book only changes
/// when [`BlockMatchup::apply`] commits them.
pub struct BlockMatchup<'r> {
    reference_text: &'r dyn ReferenceTextSource,
    book_id: String,
    start_index: usize,
    original_blocks: Vec<TextBlock>,
    portion: PortionScript,
}

impl<'r> BlockMatchup<'r> {
    pub fn new(
        book: &BookScript,
        anchor_index: usize,
        reference_text: &'r dyn ReferenceTextSource,
        options: MatchupOptions<'_>,
    ) -> Result<Self> {
        let len = book.len();
        if anchor_index >= len {
            return Err(ScriptError::BlockNotFound {
                index: anchor_index,
                len,
            });
        }

        let book_id = book.book_id();
        let window = {
            let by_reference_text =
                |chapter: u32, verse: u32| reference_text.is_ok_to_break_at_verse(book_id, chapter, verse);
            let predicate: &dyn Fn(u32, u32) -> bool = match &options.is_ok_to_break_at_verse {
                Some(predicate) => predicate.as_ref(),
                None => &by_reference_text,
            };
            resolve_window(
                book.blocks(),
                anchor_index,
                book.versification(),
                predicate,
                options.predetermined_block_count,
            )
        };

        let original_blocks = book.blocks()[window.clone()].to_vec();
        let mut portion = PortionScript::new(
            book_id,
            original_blocks.clone(),
            anchor_index - window.start,
            book.next_split_id(),
        );
        if let Some(pre_edit) = options.pre_edit {
            pre_edit(&mut portion);
        }

        debug!(
            "matchup for {book_id} blocks {}..{} ({} rows)",
            window.start,
            window.end,
            portion.len()
        );
        Ok(Self {
            reference_text,
            book_id: book_id.to_string(),
            start_index: window.start,
            original_blocks,
            portion,
        })
    }

    pub fn book_id(&self) -> &str {
        &self.book_id
    }

    pub fn reference_text(&self) -> &'r dyn ReferenceTextSource {
        self.reference_text
    }

    pub fn index_of_start_block_in_book(&self) -> usize {
        self.start_index
    }

    pub fn original_blocks(&self) -> &[TextBlock] {
        &self.original_blocks
    }

    pub fn original_block_count(&self) -> usize {
        self.original_blocks.len()
    }

    pub fn correlated_blocks(&self) -> &[TextBlock] {
        self.portion.blocks()
    }

    pub fn correlated_anchor_block(&self) -> Option<&TextBlock> {
        self.portion.blocks().get(self.portion.anchor_row())
    }

    pub fn anchor_row(&self) -> usize {
        self.portion.anchor_row()
    }

    pub fn change_anchor(&mut self, row: usize) -> Result<()> {
        let rows = self.portion.len();
        if row >= rows {
            return Err(ScriptError::RowOutOfRange { row, rows });
        }
        self.portion.set_anchor_row(row);
        Ok(())
    }

    pub fn count_of_blocks_added_by_splitting(&self) -> usize {
        self.portion.len().saturating_sub(self.original_blocks.len())
    }

    pub fn has_outstanding_changes_to_apply(&self) -> bool {
        self.portion.blocks() != self.original_blocks.as_slice()
    }

    /// The block is one of this matchup's originals or correlated rows.
    pub fn includes_block(&self, block: &TextBlock) -> bool {
        self.original_blocks.contains(block) || self.portion.blocks().contains(block)
    }

    /// The original block a correlated row came from.
    pub fn original_block_for_row(&self, row: usize) -> Option<&TextBlock> {
        self.portion
            .origin_of(row)
            .and_then(|origin| self.original_blocks.get(origin))
    }

    /// The original block that `block` (a row, an original, or a copy of
    /// either) corresponds to.
    ///
    /// Rows are traced through their recorded origin. Anything else falls back
    /// to the original of the same chapter containing its text, preferring one
    /// with the same split id and covering its starting verse.
    pub fn corresponding_original_block(&self, block: &TextBlock) -> Option<&TextBlock> {
        if let Some(row) = self.portion.blocks().iter().position(|b| b == block) {
            return self.original_block_for_row(row);
        }
        if let Some(original) = self.original_blocks.iter().find(|b| *b == block) {
            return Some(original);
        }

        let text = block.text(false);
        let text = text.trim();
        let candidates: Vec<&TextBlock> = self
            .original_blocks
            .iter()
            .filter(|o| o.chapter_number == block.chapter_number && o.text(false).contains(text))
            .collect();
        let covers = |o: &&&TextBlock| o.covers_verse(block.initial_start_verse);
        candidates
            .iter()
            .filter(|o| o.split_id == block.split_id)
            .find(covers)
            .or_else(|| candidates.iter().find(covers))
            .or_else(|| candidates.first())
            .copied()
    }

    /// Split a correlated row. Both halves lose their reference-text match.
    pub fn split_correlated_block(
        &mut self,
        row: usize,
        verse: &str,
        at: SplitAt,
        character: Option<&str>,
    ) -> Result<usize> {
        self.portion.split_block(row, verse, at, character)
    }

    /// Scripture rows without a reference-text match.
    pub fn unmatched_rows(&self) -> Vec<usize> {
        self.portion
            .blocks()
            .iter()
            .enumerate()
            .filter(|(_, b)| b.is_scripture() && !b.matches_reference_text())
            .map(|(i, _)| i)
            .collect()
    }

    pub fn all_scripture_blocks_match(&self) -> bool {
        self.unmatched_rows().is_empty()
    }

    /// Correlate every row with the reference text.
    pub fn match_all_blocks(&mut self, dialogue_quote_mark: Option<&str>) {
        matching::match_all_blocks(
            self.portion.blocks_mut(),
            &self.book_id,
            self.reference_text,
            dialogue_quote_mark,
        );
    }

    /// Set the reference text of `row` at `level` from typed text.
    ///
    /// Missing levels above `level` are created empty, deeper levels already
    /// attached are kept. The new block's starting verse is inferred from the
    /// row above, and the row below re-infers its own unless its text starts
    /// with a verse token.
    pub fn set_reference_text(&mut self, row: usize, text: &str, level: usize) -> Result<&TextBlock> {
        let rows = self.portion.len();
        if rows == 0 {
            return Err(ScriptError::NoRows);
        }
        if row >= rows {
            return Err(ScriptError::RowOutOfRange { row, rows });
        }

        let previous_last = row
            .checked_sub(1)
            .and_then(|above| self.portion.blocks()[above].reference_at_level(level))
            .map(TextBlock::last_verse);

        let blocks = self.portion.blocks_mut();
        let last_verse = {
            let container = container_at_level(&mut blocks[row], level);
            let new_block = container.build_reference_block(text, previous_last);
            let deeper = container
                .reference_block
                .as_mut()
                .and_then(|existing| existing.reference_block.take());
            let attached = container.set_matched_reference_block(new_block);
            attached.reference_block = deeper;
            attached.last_verse()
        };

        if let Some(follower) = blocks.get_mut(row + 1).and_then(|b| b.reference_at_level_mut(level))
            && !follower.elements.first().is_some_and(|e| e.is_verse())
        {
            follower.reinfer_initial_verse(Some(last_verse));
        }

        self.portion.blocks()[row]
            .reference_at_level(level)
            .ok_or(ScriptError::RowOutOfRange { row, rows })
    }

    /// Fill empty narrator reference text with each level's "he said" phrase.
    ///
    /// `on_inserted(row, level, text)` is called for every level of every
    /// candidate row, with `None` where the level already had real text or the
    /// source has no phrase. A row of unknown speaker whose reference text is
    /// empty becomes a confirmed narrator row, ending any quote chain it was in.
    pub fn insert_he_said_text<F>(&mut self, rows: HeSaidRows, mut on_inserted: F) -> Result<()>
    where
        F: FnMut(usize, usize, Option<&str>),
    {
        let count = self.portion.len();
        if count == 0 {
            return Err(ScriptError::NoRows);
        }
        let range = match rows {
            HeSaidRows::All => 0..count,
            HeSaidRows::Row(row) if row < count => row..row + 1,
            HeSaidRows::Row(row) => return Err(ScriptError::RowOutOfRange { row, rows: count }),
        };

        let narrator = StandardCharacter::Narrator.id_for(&self.book_id);
        let reference_text = self.reference_text;
        let blocks = self.portion.blocks_mut();
        for row in range {
            let block = &blocks[row];
            let Some(primary) = block.reference_block() else {
                continue;
            };
            let becomes_narrator = block.character_id == UNKNOWN && primary.is_empty_or_verse_only();
            if !block.is_narrator() && !becomes_narrator {
                continue;
            }

            let block = &mut blocks[row];
            for level in 0..block.reference_depth() {
                let he_said = source_at_level(reference_text, level)
                    .map(|source| source.he_said_text())
                    .filter(|text| !text.is_empty());
                let Some(reference) = block.reference_at_level_mut(level) else {
                    break;
                };
                match he_said {
                    Some(text) if reference.is_empty_or_verse_only() => {
                        reference.fill_with_narration(text);
                        reference.set_character(narrator.clone());
                        on_inserted(row, level, Some(text));
                    }
                    _ => on_inserted(row, level, None),
                }
            }

            if becomes_narrator {
                let was_continuation = block.multi_block_quote.is_continuation();
                block.set_character(narrator.clone());
                block.user_confirmed = true;
                block.multi_block_quote = MultiBlockQuote::None;
                if was_continuation
                    && row > 0
                    && let Some(previous) = blocks.get_mut(row - 1)
                    && previous.multi_block_quote == MultiBlockQuote::Start
                {
                    previous.multi_block_quote = MultiBlockQuote::None;
                }
                detach_following_continuation(blocks, row);
            }
        }
        Ok(())
    }

    /// `(row, level)` of every reference block whose text ends right after a
    /// verse marker, which usually means a verse break was typed in the wrong place.
    pub fn invalid_reference_blocks_at_any_level(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.portion
            .blocks()
            .iter()
            .enumerate()
            .flat_map(|(row, block)| {
                block
                    .reference_levels()
                    .enumerate()
                    .filter(|(_, reference)| reference.ends_after_verse_marker())
                    .map(move |(level, _)| (row, level))
            })
    }

    /// Commit the correlated rows into `book`, replacing the original window.
    ///
    /// Every scripture row must be matched, and the book must still hold the
    /// original window unchanged. Quote chains are repaired: a continuation
    /// row whose speaker differs from its chain's breaks the chain (rows of
    /// unclear speaker take the chain's instead), and continuation blocks
    /// after the window take the speaker of the chain feeding them.
    pub fn apply(&mut self, book: &mut BookScript) -> Result<()> {
        let unmatched = self.unmatched_rows();
        if !unmatched.is_empty() {
            return Err(ScriptError::IncompleteAlignment { rows: unmatched });
        }

        let start = self.start_index;
        let end = start + self.original_blocks.len();
        if book.blocks().get(start..end) != Some(self.original_blocks.as_slice()) {
            return Err(ScriptError::StaleMatchup { start, end });
        }
        if !self.has_outstanding_changes_to_apply() {
            debug!("nothing to apply for {} blocks {start}..{end}", self.book_id);
            return Ok(());
        }

        let mut new_blocks = self.portion.blocks().to_vec();
        for block in &mut new_blocks {
            adopt_reference_candidates(block);
        }
        let chain_speaker = repair_chains(&mut new_blocks, start.checked_sub(1).and_then(|i| book.get(i)));

        let window_len = new_blocks.len();
        let mut replaced = self.original_blocks.len();
        if let Some((character_id, display)) = chain_speaker {
            for follower in book.blocks()[end..]
                .iter()
                .take_while(|b| b.multi_block_quote.is_continuation())
            {
                let mut follower = follower.clone();
                follower.character_id = character_id.clone();
                follower.character_id_override_for_script = display.clone();
                new_blocks.push(follower);
                replaced += 1;
            }
        }

        book.replace_blocks(start, replaced, new_blocks.clone())?;
        book.reserve_split_ids(self.portion.next_split_id());

        new_blocks.truncate(window_len);
        let anchor = self.portion.anchor_row().min(window_len.saturating_sub(1));
        self.portion = PortionScript::new(&self.book_id, new_blocks.clone(), anchor, book.next_split_id());
        self.original_blocks = new_blocks;
        info!(
            "applied matchup to {} blocks {start}..{} ({} added by splitting)",
            self.book_id,
            start + window_len,
            window_len.saturating_sub(end - start)
        );
        Ok(())
    }
}

/// The block that receives reference text at `level`: the row itself for
/// level 0, otherwise the reference block one level up (created empty if missing).
fn container_at_level(block: &mut TextBlock, level: usize) -> &mut TextBlock {
    let mut current = block;
    for _ in 0..level {
        let empty = current.build_reference_block("", None);
        current = current.reference_block.get_or_insert_with(|| Box::new(empty)).as_mut();
    }
    current
}

/// Break the chain link from `blocks[row]` to the block after it.
fn detach_following_continuation(blocks: &mut [TextBlock], row: usize) {
    let further_continued = blocks
        .get(row + 2)
        .is_some_and(|b| b.multi_block_quote.is_continuation());
    if let Some(next) = blocks.get_mut(row + 1)
        && next.multi_block_quote.is_continuation()
    {
        next.multi_block_quote = if further_continued {
            MultiBlockQuote::Start
        } else {
            MultiBlockQuote::None
        };
    }
}

/// Take over a multi-candidate speaker (and its chosen name) from the primary
/// reference block when it is compatible with the row's speaker.
fn adopt_reference_candidates(block: &mut TextBlock) {
    let Some(reference) = block.reference_block() else {
        return;
    };
    if !character::is_multi_candidate(&reference.character_id) {
        return;
    }
    let compatible = character::is_unclear(&block.character_id)
        || block.character_id == reference.character_id
        || character::candidates(&reference.character_id).any(|c| c == block.character_id);
    if compatible {
        let character_id = reference.character_id.clone();
        let display = reference.character_id_in_script().to_string();
        block.character_id = character_id;
        block.character_id_override_for_script = Some(display);
    }
}

type Speaker = (String, Option<String>);

fn speaker_of(block: &TextBlock) -> Speaker {
    (
        block.character_id.clone(),
        block.character_id_override_for_script.clone(),
    )
}

/// Make every quote chain in `blocks` consistent, given the block before
/// them. Returns the speaker of the chain still open at the end, if any.
fn repair_chains(blocks: &mut [TextBlock], previous: Option<&TextBlock>) -> Option<Speaker> {
    let mut chain: Option<Speaker> = previous
        .filter(|p| p.multi_block_quote.is_chained())
        .map(speaker_of);

    for i in 0..blocks.len() {
        match blocks[i].multi_block_quote {
            MultiBlockQuote::None => chain = None,
            MultiBlockQuote::Start => chain = Some(speaker_of(&blocks[i])),
            MultiBlockQuote::Continuation | MultiBlockQuote::ChangeOfDelivery => {
                let keeps_chain = match &chain {
                    Some(speaker) if speaker.0 == blocks[i].character_id => {
                        blocks[i].character_id_override_for_script = speaker.1.clone();
                        true
                    }
                    Some(speaker) if character::is_unclear(&blocks[i].character_id) => {
                        blocks[i].character_id = speaker.0.clone();
                        blocks[i].character_id_override_for_script = speaker.1.clone();
                        true
                    }
                    _ => false,
                };
                if !keeps_chain {
                    debug!("breaking quote chain at {}", describe(&blocks[i]));
                    if i > 0 && blocks[i - 1].multi_block_quote == MultiBlockQuote::Start {
                        blocks[i - 1].multi_block_quote = MultiBlockQuote::None;
                    }
                    let further = blocks
                        .get(i + 1)
                        .is_some_and(|b| b.multi_block_quote.is_continuation());
                    if further {
                        blocks[i].multi_block_quote = MultiBlockQuote::Start;
                        chain = Some(speaker_of(&blocks[i]));
                    } else {
                        blocks[i].multi_block_quote = MultiBlockQuote::None;
                        chain = None;
                    }
                }
            }
        }
    }
    chain
}
