use super::block::{BlockElement, MultiBlockQuote, TextBlock, has_word_characters};
use crate::character::UNKNOWN;
use crate::error::{Result, ScriptError};
use crate::verse::VerseNumber;

/// Where within a verse to split a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitAt {
    /// Character offset into the text of the verse (not counting the marker).
    Offset(usize),
    /// After the last text of the verse.
    EndOfVerse,
}

/// An element index, and for text runs a character offset inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SplitPoint {
    element: usize,
    char_offset: usize,
}

impl SplitPoint {
    fn before(element: usize) -> Self {
        Self {
            element,
            char_offset: 0,
        }
    }
}

impl TextBlock {
    /// Find where to cut for a split of `verse` at `at`, returning the point
    /// and the verse the text at that point belongs to.
    fn locate_split_point(&self, verse: &str, at: SplitAt, index: usize) -> Result<(SplitPoint, VerseNumber)> {
        let not_in_block = || ScriptError::VerseNotInBlock {
            verse: verse.to_string(),
            index,
        };
        let wanted: VerseNumber = verse.parse().map_err(|_| not_in_block())?;

        let segments = self.verse_segments();
        let matching: Vec<_> = segments.iter().filter(|s| s.number == wanted).collect();
        let segment = matching
            .iter()
            .find(|s| has_word_characters(&self.segment_text(s)))
            .or(matching.first())
            .copied()
            .ok_or_else(not_in_block)?;

        let text = self.segment_text(segment);
        let len = text.chars().count();
        let out_of_range = |offset| ScriptError::OffsetOutOfRange {
            verse: verse.to_string(),
            offset,
            len,
            index,
        };
        let after_verse = |offset| {
            if segment.end < self.elements.len() {
                Ok((SplitPoint::before(segment.end), segment.number))
            } else {
                Err(out_of_range(offset))
            }
        };

        match at {
            SplitAt::EndOfVerse => after_verse(len),
            SplitAt::Offset(offset) if offset > len => Err(out_of_range(offset)),
            SplitAt::Offset(0) => match segment.marker {
                Some(marker) if marker > 0 => Ok((SplitPoint::before(marker), segment.number)),
                _ => Err(out_of_range(0)),
            },
            SplitAt::Offset(offset) if offset == len => after_verse(offset),
            SplitAt::Offset(offset) => {
                let remainder: String = text.chars().skip(offset).collect();
                if !has_word_characters(&remainder) && segment.end < self.elements.len() {
                    // trailing punctuation stays with the words it closes
                    return after_verse(offset);
                }

                let mut remaining = offset;
                for i in segment.start..segment.end {
                    if let BlockElement::Text { content } = &self.elements[i] {
                        let chars = content.chars().count();
                        if remaining < chars {
                            let point = SplitPoint {
                                element: i,
                                char_offset: remaining,
                            };
                            return Ok((point, segment.number));
                        }
                        remaining -= chars;
                    }
                }
                Err(out_of_range(offset))
            }
        }
    }

    /// Cut the elements at `point`, leaving the earlier part in `self` and
    /// returning the rest.
    fn split_off_at(&mut self, point: SplitPoint) -> Vec<BlockElement> {
        let mut tail = self.elements.split_off(point.element);
        if point.char_offset > 0
            && let Some(BlockElement::Text { content }) = tail.first_mut()
        {
            let byte = content
                .char_indices()
                .nth(point.char_offset)
                .map_or(content.len(), |(b, _)| b);
            let head = content[..byte].to_string();
            content.replace_range(..byte, "");
            self.elements.push(BlockElement::text(head));
        }
        tail
    }
}

/// Split `blocks[index]` in two, inserting the later half right after it.
///
/// Both halves share a split id (the block's existing one, or a fresh one
/// taken from `next_split_id`) and lose any reference-text match. The later
/// half gets `character` (confirmed) or `Unknown`. Returns the index of the
/// later half. Nothing is changed when an error is returned.
pub(crate) fn split_block_in(
    blocks: &mut Vec<TextBlock>,
    index: usize,
    verse: &str,
    at: SplitAt,
    character: Option<&str>,
    next_split_id: &mut u32,
) -> Result<usize> {
    let len = blocks.len();
    let block = blocks
        .get_mut(index)
        .ok_or(ScriptError::BlockNotFound { index, len })?;
    let (point, segment_verse) = block.locate_split_point(verse, at, index)?;

    let split_id = match block.split_id {
        Some(id) => id,
        None => {
            let id = *next_split_id;
            *next_split_id += 1;
            id
        }
    };

    let tail = block.split_off_at(point);
    let initial = tail
        .first()
        .and_then(BlockElement::verse_number)
        .unwrap_or(segment_verse);

    let later_chain = match block.multi_block_quote {
        MultiBlockQuote::Start => {
            block.multi_block_quote = MultiBlockQuote::None;
            MultiBlockQuote::Start
        }
        other => other,
    };
    block.split_id = Some(split_id);
    block.reference_block = None;

    let later = TextBlock {
        style_tag: block.style_tag.clone(),
        is_paragraph_start: false,
        chapter_number: block.chapter_number,
        initial_start_verse: initial.start,
        initial_end_verse: initial.end_or_zero(),
        character_id: character.unwrap_or(UNKNOWN).to_string(),
        character_id_override_for_script: None,
        delivery: None,
        elements: tail,
        multi_block_quote: later_chain,
        split_id: Some(split_id),
        user_confirmed: character.is_some(),
        reference_block: None,
    };
    blocks.insert(index + 1, later);
    Ok(index + 1)
}
