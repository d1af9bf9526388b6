//! Turning typed reference text (with `{n}` verse tokens and `{SFX--name}` /
//! `{Music--name}` cue tokens) into block elements.

use std::sync::LazyLock;

use regex::Regex;

use super::block::{Annotation, AnnotationKind, BlockElement, MultiBlockQuote, TextBlock};
use crate::verse::VerseNumber;

static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{(?:(\d+)(?:-(\d+))?|(SFX|Music)--([^}]*))\}").expect("token pattern is valid")
});

/// Split `text` into verse, annotation and text elements.
///
/// Text directly after a verse token loses its leading whitespace. Two verse
/// tokens separated only by whitespace collapse into the later one. Empty or
/// whitespace-only input yields a single empty text run so the caller still
/// has something to attach.
pub(crate) fn parse_reference_elements(text: &str) -> Vec<BlockElement> {
    if text.trim().is_empty() {
        return vec![BlockElement::text("")];
    }

    let mut elements = Vec::new();
    let mut last_end = 0;
    for caps in TOKEN.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        push_text_segment(&mut elements, &text[last_end..whole.start()], false);
        last_end = whole.end();

        if let Some(start) = caps.get(1) {
            let end = caps.get(2).map(|m| m.as_str().parse::<u32>());
            let number = match (start.as_str().parse::<u32>(), end) {
                (Ok(start), None) => VerseNumber::new(start),
                (Ok(start), Some(Ok(end))) if end >= start => VerseNumber::bridge(start, end),
                _ => {
                    // not a usable verse number; keep the token as typed
                    elements.push(BlockElement::text(whole.as_str()));
                    continue;
                }
            };
            if matches!(elements.last(), Some(BlockElement::Verse { .. })) {
                elements.pop();
            }
            elements.push(BlockElement::verse(number));
        } else if let (Some(kind), Some(name)) = (
            caps.get(3).and_then(|k| AnnotationKind::from_token_name(k.as_str())),
            caps.get(4),
        ) {
            elements.push(BlockElement::Annotation(Annotation {
                kind,
                name: name.as_str().to_string(),
                start_verse: 0,
                end_verse: 0,
                user_positioned: true,
            }));
        }
    }
    push_text_segment(&mut elements, &text[last_end..], true);

    if elements.is_empty() {
        elements.push(BlockElement::text(""));
    }
    elements
}

fn push_text_segment(elements: &mut Vec<BlockElement>, segment: &str, at_end: bool) {
    if matches!(elements.last(), Some(BlockElement::Verse { .. })) {
        let trimmed = segment.trim_start();
        if !trimmed.is_empty() {
            elements.push(BlockElement::text(trimmed));
        } else if at_end && !segment.is_empty() {
            elements.push(BlockElement::text(""));
        }
    } else if !segment.is_empty() {
        elements.push(BlockElement::text(segment));
    }
}

/// Work out which verse parsed reference text starts in.
///
/// A leading verse token decides it. A token further in means the text before
/// it belongs to the preceding verse, which is the previous block's range when
/// that range runs right up to the token. Without any token the text carries
/// on from the previous block, or failing that from `fallback`.
pub(crate) fn infer_initial_verse(
    elements: &[BlockElement],
    previous_last: Option<VerseNumber>,
    fallback: VerseNumber,
) -> VerseNumber {
    let Some(first_marker) = elements.iter().position(BlockElement::is_verse) else {
        return previous_last.unwrap_or(fallback);
    };
    let first = elements[first_marker]
        .verse_number()
        .unwrap_or(fallback);

    let leading = elements[..first_marker].iter().all(|e| match e {
        BlockElement::Text { content } => content.trim().is_empty(),
        BlockElement::Annotation(_) => true,
        BlockElement::Verse { .. } => false,
    });
    if leading {
        return first;
    }

    match previous_last {
        Some(previous) if previous.end + 1 == first.start => previous,
        _ => VerseNumber::new(first.start.saturating_sub(1).max(1)),
    }
}

fn assign_annotation_verses(elements: &mut [BlockElement], initial: VerseNumber) {
    let mut current = initial;
    for element in elements {
        match element {
            BlockElement::Verse { number } => current = *number,
            BlockElement::Annotation(annotation) => {
                annotation.start_verse = current.start;
                annotation.end_verse = current.end_or_zero();
            }
            BlockElement::Text { .. } => {}
        }
    }
}

impl TextBlock {
    /// Build a reference block for this block from typed text.
    ///
    /// Style, chapter, character and delivery are copied from this block; the
    /// initial verse is inferred from the text and `previous_last`, the last
    /// verse of the reference text in the preceding row.
    pub fn build_reference_block(&self, text: &str, previous_last: Option<VerseNumber>) -> TextBlock {
        let mut elements = parse_reference_elements(text);
        let initial = infer_initial_verse(&elements, previous_last, self.initial_verse());
        assign_annotation_verses(&mut elements, initial);

        TextBlock {
            style_tag: self.style_tag.clone(),
            is_paragraph_start: self.is_paragraph_start,
            chapter_number: self.chapter_number,
            initial_start_verse: initial.start,
            initial_end_verse: initial.end_or_zero(),
            character_id: self.character_id.clone(),
            character_id_override_for_script: self.character_id_override_for_script.clone(),
            delivery: self.delivery.clone(),
            elements,
            multi_block_quote: MultiBlockQuote::None,
            split_id: None,
            user_confirmed: false,
            reference_block: None,
        }
    }

    /// Parse `text` into this block's primary reference block, replacing any
    /// existing one (and its deeper levels). `previous` is the preceding row's
    /// reference block, used for verse inference.
    pub fn set_matched_reference_block_text(
        &mut self,
        text: &str,
        previous: Option<&TextBlock>,
    ) -> &mut TextBlock {
        let block = self.build_reference_block(text, previous.map(TextBlock::last_verse));
        self.set_matched_reference_block(block)
    }

    /// Re-infer the initial verse of an already parsed reference block after
    /// the block before it changed. A leading verse token always wins.
    pub(crate) fn reinfer_initial_verse(&mut self, previous_last: Option<VerseNumber>) {
        let initial = infer_initial_verse(&self.elements, previous_last, self.initial_verse());
        self.initial_start_verse = initial.start;
        self.initial_end_verse = initial.end_or_zero();
        assign_annotation_verses(&mut self.elements, initial);
    }
}
