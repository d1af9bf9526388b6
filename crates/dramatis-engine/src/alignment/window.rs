//! Finding the run of blocks that has to be aligned as one unit.

use std::ops::Range;

use log::debug;

use crate::script::TextBlock;
use crate::versification::Versification;

/// `is_ok_to_break_at_verse(chapter, verse)`: may a window start at this verse?
pub type BreakPredicate<'a> = dyn Fn(u32, u32) -> bool + 'a;

/// Whether a window may end right before `blocks[index]`.
///
/// Quote continuations never start a window and chapter changes always do.
/// Section heads and other non-scripture blocks go with the scripture around
/// them when that scripture carries on one verse across them.
pub(crate) fn is_clean_boundary_before(
    blocks: &[TextBlock],
    index: usize,
    versification: &Versification,
    is_ok_to_break_at_verse: &BreakPredicate<'_>,
) -> bool {
    let (Some(previous), Some(next)) = (
        index.checked_sub(1).and_then(|i| blocks.get(i)),
        blocks.get(index),
    ) else {
        return true;
    };

    if next.multi_block_quote.is_continuation() {
        return false;
    }
    if next.chapter_number != previous.chapter_number {
        return true;
    }
    if !next.is_scripture() {
        return !blocks[index..]
            .iter()
            .find(|b| b.is_scripture())
            .is_some_and(|following| continues_verse_of(following, previous));
    }
    if !previous.is_scripture() {
        return !blocks[..index]
            .iter()
            .rev()
            .find(|b| b.is_scripture())
            .is_some_and(|preceding| continues_verse_of(next, preceding));
    }
    if !next.starts_at_verse_start() {
        return false;
    }
    if versification
        .last_verse(previous.chapter_number)
        .is_some_and(|last| previous.last_verse().end >= last)
    {
        return true;
    }
    is_ok_to_break_at_verse(next.chapter_number, next.initial_start_verse)
}

fn continues_verse_of(block: &TextBlock, earlier: &TextBlock) -> bool {
    block.chapter_number == earlier.chapter_number
        && !block.starts_at_verse_start()
        && earlier.last_verse().contains(block.initial_start_verse)
}

/// The window of blocks around `anchor`: back to the nearest clean boundary
/// at or before it and forward to the next one, or exactly
/// `predetermined_count` blocks from the start when given.
pub(crate) fn resolve_window(
    blocks: &[TextBlock],
    anchor: usize,
    versification: &Versification,
    is_ok_to_break_at_verse: &BreakPredicate<'_>,
    predetermined_count: Option<usize>,
) -> Range<usize> {
    let mut start = anchor;
    while start > 0 && !is_clean_boundary_before(blocks, start, versification, is_ok_to_break_at_verse) {
        start -= 1;
    }

    let end = match predetermined_count {
        Some(count) => (start + count.max(1)).clamp(anchor + 1, blocks.len()),
        None => {
            let mut end = anchor + 1;
            while end < blocks.len()
                && !is_clean_boundary_before(blocks, end, versification, is_ok_to_break_at_verse)
            {
                end += 1;
            }
            end
        }
    };

    debug!("window for block {anchor}: {start}..{end}");
    start..end
}

/// Split a whole block sequence into consecutive windows.
pub(crate) fn partition_into_windows(
    blocks: &[TextBlock],
    versification: &Versification,
    is_ok_to_break_at_verse: &BreakPredicate<'_>,
) -> Vec<Range<usize>> {
    let mut windows = Vec::new();
    let mut start = 0;
    for index in 1..=blocks.len() {
        if index == blocks.len()
            || is_clean_boundary_before(blocks, index, versification, is_ok_to_break_at_verse)
        {
            windows.push(start..index);
            start = index;
        }
    }
    windows
}
