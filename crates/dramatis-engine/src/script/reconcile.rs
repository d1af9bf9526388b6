//! Carrying user decisions from an earlier version of a book onto a freshly
//! parsed one.
//!
//! Nothing here fails: a decision that cannot be transplanted is skipped (and
//! logged), and a split that cannot be redone is recorded as an
//! [`UnappliedSplit`] for the user to deal with.

use std::collections::BTreeSet;
use std::ops::Range;

use log::{debug, info, warn};

use super::block::{BlockElement, MultiBlockQuote, TextBlock};
use super::book::{BookScript, UnappliedSplit};
use crate::alignment::window::partition_into_windows;
use crate::reference_text::ReferenceTextSource;
use crate::verse::VerseNumber;

impl BookScript {
    /// Transplant the decisions recorded in `source` (an earlier version of
    /// this book) onto this freshly parsed book.
    ///
    /// Splits are redone first, then attribution, delivery, confirmation and
    /// reference-text alignment are copied onto blocks whose text is unchanged.
    /// Alignment windows are judged as a whole: if any block of a window that
    /// was aligned no longer matches, none of the window's alignment is copied,
    /// and if verse bridging changed inside it, nothing from it is copied at all.
    pub fn apply_user_decisions(
        &mut self,
        source: &BookScript,
        reference_text: Option<&dyn ReferenceTextSource>,
    ) {
        for split in source.unapplied_splits() {
            self.push_unapplied_split(split.clone());
        }
        self.reapply_splits(source);
        self.copy_decisions(source, reference_text);
        info!(
            "applied user decisions to {} ({} unapplied splits)",
            self.book_id(),
            self.unapplied_splits().len()
        );
    }

    fn reapply_splits(&mut self, source: &BookScript) {
        for group in split_groups(source.blocks()) {
            let pieces = &source.blocks()[group];
            let first = &pieces[0];
            let joined_text: String = pieces.iter().map(|p| p.text(true)).collect();

            let candidates: Vec<usize> = self
                .blocks()
                .iter()
                .enumerate()
                .filter(|(_, b)| {
                    b.split_id.is_none()
                        && b.chapter_number == first.chapter_number
                        && b.initial_start_verse == first.initial_start_verse
                        && b.text(true) == joined_text
                })
                .map(|(i, _)| i)
                .collect();

            let rebuilt = match candidates.as_slice() {
                [target] => rebuild_split(&self.blocks()[*target], pieces).map(|p| (*target, p)),
                _ => None,
            };

            match rebuilt {
                Some((target, mut new_pieces)) => {
                    let in_use: BTreeSet<u32> = self.blocks().iter().filter_map(|b| b.split_id).collect();
                    let split_id = match first.split_id {
                        Some(id) if !in_use.contains(&id) => id,
                        _ => self.next_split_id(),
                    };
                    for piece in &mut new_pieces {
                        piece.split_id = Some(split_id);
                    }
                    debug!(
                        "redid split of {}:{} into {} pieces",
                        first.chapter_number,
                        first.initial_verse(),
                        new_pieces.len()
                    );
                    self.blocks_mut().splice(target..=target, new_pieces);
                    self.reserve_split_ids(split_id + 1);
                }
                None => {
                    let target = candidates.first().copied().or_else(|| {
                        self.first_block_index_for_verse(first.chapter_number, first.initial_start_verse)
                    });
                    warn!(
                        "could not redo split at {}:{}; recording it as unapplied",
                        first.chapter_number,
                        first.initial_verse()
                    );
                    let target = target.and_then(|i| self.get(i)).cloned();
                    self.push_unapplied_split(UnappliedSplit {
                        pieces: pieces.to_vec(),
                        target,
                    });
                }
            }
        }
    }

    fn copy_decisions(&mut self, source: &BookScript, reference_text: Option<&dyn ReferenceTextSource>) {
        let book_id = source.book_id();
        let by_reference_text = |chapter: u32, verse: u32| {
            reference_text.is_none_or(|r| r.is_ok_to_break_at_verse(book_id, chapter, verse))
        };
        let regions = partition_into_windows(source.blocks(), source.versification(), &by_reference_text);
        let mut claimed = vec![false; self.len()];
        let mut next_target = 0;

        for region in regions {
            let pieces = &source.blocks()[region.clone()];
            let targets: Vec<Option<usize>> = pieces
                .iter()
                .map(|piece| {
                    let found = find_target(self.blocks(), &claimed, next_target, piece);
                    if let Some(index) = found {
                        next_target = index + 1;
                    }
                    found
                })
                .collect();

            let all_found = targets.iter().all(Option::is_some);
            let aligned = pieces.iter().any(TextBlock::matches_reference_text);
            let mut copy_alignment = aligned;
            if aligned && !all_found {
                warn!(
                    "text changed inside aligned blocks {}; not copying their alignment",
                    describe_region(source, &region)
                );
                copy_alignment = false;
                if bridges_differ(pieces, self.blocks()) {
                    warn!(
                        "verse bridging changed in {}; discarding every decision there",
                        describe_region(source, &region)
                    );
                    continue;
                }
            }

            for (piece, target) in pieces.iter().zip(targets) {
                let Some(target) = target else { continue };
                claimed[target] = true;
                if !carries_decision(piece) {
                    continue;
                }
                let Some(block) = self.block_mut(target) else { continue };
                block.character_id = piece.character_id.clone();
                block.character_id_override_for_script = piece.character_id_override_for_script.clone();
                block.delivery = piece.delivery.clone();
                block.user_confirmed = piece.user_confirmed;
                if copy_alignment {
                    block.reference_block = piece.reference_block.clone();
                }
            }
        }
    }
}

/// Consecutive runs of blocks sharing a split id.
fn split_groups(blocks: &[TextBlock]) -> Vec<Range<usize>> {
    let mut groups = Vec::new();
    let mut index = 0;
    while index < blocks.len() {
        let Some(id) = blocks[index].split_id else {
            index += 1;
            continue;
        };
        let end = blocks[index..]
            .iter()
            .position(|b| b.split_id != Some(id))
            .map_or(blocks.len(), |p| index + p);
        if end - index > 1 {
            groups.push(index..end);
        }
        index = end;
    }
    groups
}

/// Rebuild `pieces` out of `target`, or `None` if their elements do not
/// line up with the target's exactly.
fn rebuild_split(target: &TextBlock, pieces: &[TextBlock]) -> Option<Vec<TextBlock>> {
    let piece_elements: Vec<BlockElement> = pieces.iter().flat_map(|p| p.elements.iter().cloned()).collect();
    if merge_text_runs(&piece_elements) != merge_text_runs(&target.elements) {
        return None;
    }
    if pieces.iter().skip(1).any(|p| p.elements.is_empty()) {
        return None;
    }

    let last = pieces.len() - 1;
    let rebuilt = pieces
        .iter()
        .enumerate()
        .map(|(i, piece)| {
            let initial = if i == 0 {
                target.initial_verse()
            } else {
                piece.initial_verse()
            };
            TextBlock {
                style_tag: target.style_tag.clone(),
                is_paragraph_start: i == 0 && target.is_paragraph_start,
                chapter_number: target.chapter_number,
                initial_start_verse: initial.start,
                initial_end_verse: initial.end_or_zero(),
                character_id: target.character_id.clone(),
                character_id_override_for_script: target.character_id_override_for_script.clone(),
                delivery: target.delivery.clone(),
                elements: piece.elements.clone(),
                multi_block_quote: match target.multi_block_quote {
                    MultiBlockQuote::Start if i == last => MultiBlockQuote::Start,
                    MultiBlockQuote::Start => MultiBlockQuote::None,
                    other => other,
                },
                split_id: None,
                user_confirmed: false,
                reference_block: None,
            }
        })
        .collect();
    Some(rebuilt)
}

fn merge_text_runs(elements: &[BlockElement]) -> Vec<BlockElement> {
    let mut merged: Vec<BlockElement> = Vec::with_capacity(elements.len());
    for element in elements {
        if let (Some(BlockElement::Text { content: tail }), BlockElement::Text { content }) =
            (merged.last_mut(), element)
        {
            tail.push_str(content);
            continue;
        }
        merged.push(element.clone());
    }
    merged.retain(|e| e.as_text().is_none_or(|t| !t.is_empty()));
    merged
}

/// The first unclaimed block at or after `from` with the same location and text.
fn find_target(blocks: &[TextBlock], claimed: &[bool], from: usize, piece: &TextBlock) -> Option<usize> {
    let matches = |(i, b): &(usize, &TextBlock)| {
        !claimed[*i]
            && b.chapter_number == piece.chapter_number
            && b.initial_start_verse == piece.initial_start_verse
            && b.text(true) == piece.text(true)
    };
    blocks
        .iter()
        .enumerate()
        .skip(from)
        .find(matches)
        .or_else(|| blocks.iter().enumerate().take(from).find(matches))
        .map(|(i, _)| i)
}

/// Anything the user (or an alignment session) decided about this block.
fn carries_decision(block: &TextBlock) -> bool {
    block.user_confirmed
        || block.matches_reference_text()
        || block.split_id.is_some()
        || block.character_id_override_for_script.is_some()
        || block.delivery.is_some()
}

/// Whether the verse bridges used in `pieces` differ from those the target
/// book uses for the same verses.
fn bridges_differ(pieces: &[TextBlock], target_blocks: &[TextBlock]) -> bool {
    let Some(first) = pieces.first() else {
        return false;
    };
    let chapter = first.chapter_number;
    let start = first.initial_start_verse;
    let end = pieces.iter().map(|p| p.last_verse().end).max().unwrap_or(start);

    let in_range = |b: &&TextBlock| b.chapter_number == chapter && b.overlaps_verses(start, end);
    bridges_in(pieces.iter(), start, end) != bridges_in(target_blocks.iter().filter(in_range), start, end)
}

fn bridges_in<'a>(blocks: impl Iterator<Item = &'a TextBlock>, start: u32, end: u32) -> BTreeSet<VerseNumber> {
    blocks
        .flat_map(|b| b.verse_numbers())
        .filter(|n| n.is_bridge() && n.start <= end && start <= n.end)
        .collect()
}

fn describe_region(book: &BookScript, region: &Range<usize>) -> String {
    match (book.get(region.start), region.end.checked_sub(1).and_then(|i| book.get(i))) {
        (Some(first), Some(last)) => format!(
            "{} {}:{}-{}",
            book.book_id(),
            first.chapter_number,
            first.initial_verse(),
            last.last_verse()
        ),
        _ => book.book_id().to_string(),
    }
}
