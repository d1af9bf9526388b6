use serde::{Deserialize, Serialize};

use crate::character::{self, StandardCharacter, UNKNOWN};
use crate::error::{Result, ScriptError};
use crate::verse::VerseNumber;

/// Position of a block within a multi-block quotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MultiBlockQuote {
    #[default]
    None,
    Start,
    Continuation,
    ChangeOfDelivery,
}

impl MultiBlockQuote {
    /// Continues the chain started by an earlier block.
    pub fn is_continuation(self) -> bool {
        matches!(
            self,
            MultiBlockQuote::Continuation | MultiBlockQuote::ChangeOfDelivery
        )
    }

    /// Takes part in a chain at all (start or continuation).
    pub fn is_chained(self) -> bool {
        self != MultiBlockQuote::None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnnotationKind {
    Sound,
    Music,
}

impl AnnotationKind {
    fn token_name(self) -> &'static str {
        match self {
            AnnotationKind::Sound => "SFX",
            AnnotationKind::Music => "Music",
        }
    }

    pub(crate) fn from_token_name(name: &str) -> Option<Self> {
        match name {
            "SFX" => Some(AnnotationKind::Sound),
            "Music" => Some(AnnotationKind::Music),
            _ => None,
        }
    }
}

/// A sound-effect or music cue positioned inside a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub kind: AnnotationKind,
    pub name: String,
    pub start_verse: u32,
    #[serde(default)]
    pub end_verse: u32,
    #[serde(default)]
    pub user_positioned: bool,
}

impl Annotation {
    /// The inline token used when rendering or typing this cue (`{SFX--Whistle}`).
    pub fn token(&self) -> String {
        format!("{{{}--{}}}", self.kind.token_name(), self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "element", rename_all = "snake_case")]
pub enum BlockElement {
    Verse { number: VerseNumber },
    Text { content: String },
    Annotation(Annotation),
}

impl BlockElement {
    pub fn verse(number: VerseNumber) -> Self {
        BlockElement::Verse { number }
    }

    pub fn text(content: impl Into<String>) -> Self {
        BlockElement::Text {
            content: content.into(),
        }
    }

    pub fn is_verse(&self) -> bool {
        matches!(self, BlockElement::Verse { .. })
    }

    pub fn verse_number(&self) -> Option<VerseNumber> {
        match self {
            BlockElement::Verse { number } => Some(*number),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            BlockElement::Text { content } => Some(content),
            _ => None,
        }
    }
}

/// The atomic unit of script text.
///
/// A block optionally carries a reference block: its match at the next
/// reference-language level. That block may carry its own, forming a linear
/// chain of levels. Having a reference block (even one with empty text) is
/// what makes a block "matched".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextBlock {
    pub style_tag: String,
    #[serde(default)]
    pub is_paragraph_start: bool,
    pub chapter_number: u32,
    pub initial_start_verse: u32,
    /// `0` when the block does not start in a verse bridge.
    #[serde(default)]
    pub initial_end_verse: u32,
    pub character_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_id_override_for_script: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery: Option<String>,
    pub elements: Vec<BlockElement>,
    #[serde(default)]
    pub multi_block_quote: MultiBlockQuote,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split_id: Option<u32>,
    #[serde(default)]
    pub user_confirmed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_block: Option<Box<TextBlock>>,
}

/// A run of elements belonging to one verse.
///
/// The first segment of every block covers the elements before the first
/// verse marker and carries the block's initial verse; every verse marker
/// starts another segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct VerseSegment {
    pub number: VerseNumber,
    pub marker: Option<usize>,
    pub start: usize,
    pub end: usize,
}

impl TextBlock {
    pub fn new(style_tag: impl Into<String>, chapter_number: u32, initial_start_verse: u32) -> Self {
        Self {
            style_tag: style_tag.into(),
            is_paragraph_start: true,
            chapter_number,
            initial_start_verse,
            initial_end_verse: 0,
            character_id: UNKNOWN.to_string(),
            character_id_override_for_script: None,
            delivery: None,
            elements: Vec::new(),
            multi_block_quote: MultiBlockQuote::None,
            split_id: None,
            user_confirmed: false,
            reference_block: None,
        }
    }

    pub fn with_character(mut self, character_id: impl Into<String>) -> Self {
        self.set_character(character_id);
        self
    }

    pub fn with_delivery(mut self, delivery: impl Into<String>) -> Self {
        self.delivery = Some(delivery.into());
        self
    }

    /// Append a verse marker. A marker at the very start also sets the initial verse.
    pub fn with_verse(mut self, number: VerseNumber) -> Self {
        if self.elements.is_empty() {
            self.initial_start_verse = number.start;
            self.initial_end_verse = number.end_or_zero();
        }
        self.elements.push(BlockElement::verse(number));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.elements.push(BlockElement::text(text));
        self
    }

    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        self.elements.push(BlockElement::Annotation(annotation));
        self
    }

    pub fn with_multi_block_quote(mut self, multi_block_quote: MultiBlockQuote) -> Self {
        self.multi_block_quote = multi_block_quote;
        self
    }

    pub fn with_paragraph_start(mut self, is_paragraph_start: bool) -> Self {
        self.is_paragraph_start = is_paragraph_start;
        self
    }

    pub fn with_reference(mut self, reference: TextBlock) -> Self {
        self.reference_block = Some(Box::new(reference));
        self
    }

    pub fn confirmed(mut self) -> Self {
        self.user_confirmed = true;
        self
    }

    // ============ Character attribution ============

    /// Replace the character, dropping any display override.
    pub fn set_character(&mut self, character_id: impl Into<String>) {
        self.character_id = character_id.into();
        self.character_id_override_for_script = None;
    }

    /// The single name used in the script: the override if there is one,
    /// otherwise the first candidate of the character id.
    pub fn character_id_in_script(&self) -> &str {
        self.character_id_override_for_script
            .as_deref()
            .unwrap_or_else(|| character::first_candidate(&self.character_id))
    }

    pub fn set_character_id_in_script(&mut self, name: impl Into<String>) {
        let name = name.into();
        self.character_id_override_for_script = (name != self.character_id).then_some(name);
    }

    /// Character id and script name together; members of a quote chain must agree on both.
    pub(crate) fn speaker(&self) -> (&str, &str) {
        (&self.character_id, self.character_id_in_script())
    }

    pub fn is_narrator(&self) -> bool {
        character::is_narrator(&self.character_id)
    }

    /// Scripture text as opposed to chapter announcements, section heads and intro material.
    pub fn is_scripture(&self) -> bool {
        !matches!(
            character::standard_character_kind(&self.character_id),
            Some(
                StandardCharacter::BookOrChapter
                    | StandardCharacter::ExtraBiblical
                    | StandardCharacter::Intro
            )
        )
    }

    // ============ Verses ============

    pub fn initial_verse(&self) -> VerseNumber {
        VerseNumber::from_initial(self.initial_start_verse, self.initial_end_verse)
    }

    /// The verse (or bridge) in effect at the end of the block.
    pub fn last_verse(&self) -> VerseNumber {
        self.elements
            .iter()
            .rev()
            .find_map(BlockElement::verse_number)
            .unwrap_or_else(|| self.initial_verse())
    }

    pub fn covers_verse(&self, verse: u32) -> bool {
        self.initial_start_verse <= verse && verse <= self.last_verse().end
    }

    pub fn overlaps_verses(&self, start: u32, end: u32) -> bool {
        self.initial_start_verse <= end && start <= self.last_verse().end
    }

    /// Every verse number this block touches, including its initial one.
    pub fn verse_numbers(&self) -> impl Iterator<Item = VerseNumber> + '_ {
        std::iter::once(self.initial_verse())
            .chain(self.elements.iter().filter_map(BlockElement::verse_number))
    }

    /// The block opens with a verse marker (possibly after leading punctuation)
    /// rather than continuing a verse begun in an earlier block.
    pub fn starts_at_verse_start(&self) -> bool {
        match self.elements.iter().position(BlockElement::is_verse) {
            Some(first_marker) => self.elements[..first_marker]
                .iter()
                .all(|e| e.as_text().is_some_and(|t| !has_word_characters(t))),
            None => false,
        }
    }

    pub(crate) fn verse_segments(&self) -> Vec<VerseSegment> {
        let markers: Vec<usize> = self
            .elements
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_verse())
            .map(|(i, _)| i)
            .collect();

        let mut segments = Vec::with_capacity(markers.len() + 1);
        segments.push(VerseSegment {
            number: self.initial_verse(),
            marker: None,
            start: 0,
            end: markers.first().copied().unwrap_or(self.elements.len()),
        });
        for (n, &marker) in markers.iter().enumerate() {
            let number = self.elements[marker]
                .verse_number()
                .unwrap_or_else(|| self.initial_verse());
            segments.push(VerseSegment {
                number,
                marker: Some(marker),
                start: marker + 1,
                end: markers.get(n + 1).copied().unwrap_or(self.elements.len()),
            });
        }
        segments
    }

    pub(crate) fn segment_text(&self, segment: &VerseSegment) -> String {
        self.elements[segment.start..segment.end]
            .iter()
            .filter_map(BlockElement::as_text)
            .collect()
    }

    // ============ Text ============

    /// Render the block's content. With verse numbers, markers render as `{n} `
    /// and annotations as their inline tokens.
    pub fn text(&self, include_verse_numbers: bool) -> String {
        let mut out = String::new();
        for element in &self.elements {
            match element {
                BlockElement::Verse { number } if include_verse_numbers => {
                    out.push_str(&format!("{{{number}}} "));
                }
                BlockElement::Annotation(annotation) if include_verse_numbers => {
                    out.push_str(&annotation.token());
                }
                BlockElement::Text { content } => out.push_str(content),
                _ => {}
            }
        }
        out
    }

    /// No text beyond verse markers and whitespace.
    pub fn is_empty_or_verse_only(&self) -> bool {
        self.elements.iter().all(|e| match e {
            BlockElement::Verse { .. } => true,
            BlockElement::Text { content } => content.trim().is_empty(),
            BlockElement::Annotation(_) => false,
        })
    }

    /// The content ends with a verse marker that has no text after it.
    pub fn ends_after_verse_marker(&self) -> bool {
        for element in self.elements.iter().rev() {
            match element {
                BlockElement::Text { content } if content.trim().is_empty() => continue,
                BlockElement::Verse { .. } => return true,
                _ => return false,
            }
        }
        false
    }

    // ============ Reference blocks ============

    pub fn matches_reference_text(&self) -> bool {
        self.reference_block.is_some()
    }

    pub fn reference_block(&self) -> Option<&TextBlock> {
        self.reference_block.as_deref()
    }

    /// The chain of reference blocks, primary level first.
    pub fn reference_levels(&self) -> impl Iterator<Item = &TextBlock> {
        std::iter::successors(self.reference_block(), |b| b.reference_block())
    }

    pub fn reference_at_level(&self, level: usize) -> Option<&TextBlock> {
        self.reference_levels().nth(level)
    }

    pub fn reference_at_level_mut(&mut self, level: usize) -> Option<&mut TextBlock> {
        let mut current = self.reference_block.as_deref_mut()?;
        for _ in 0..level {
            current = current.reference_block.as_deref_mut()?;
        }
        Some(current)
    }

    pub fn reference_depth(&self) -> usize {
        self.reference_levels().count()
    }

    /// Attach a ready-made block as this block's match at the next level.
    pub fn set_matched_reference_block(&mut self, block: TextBlock) -> &mut TextBlock {
        self.reference_block.insert(Box::new(block))
    }

    pub fn clear_reference_block(&mut self) {
        self.reference_block = None;
    }

    /// Replace the content with any leading verse markers followed by `text`.
    pub(crate) fn fill_with_narration(&mut self, text: &str) {
        self.elements.retain(BlockElement::is_verse);
        self.elements.push(BlockElement::text(text));
    }

    // ============ Combining ============

    /// Merge `other` onto the end of a copy of this block.
    ///
    /// Both blocks must agree on whether they are matched at every reference
    /// level. Text runs that meet are joined with a single space unless one
    /// side already supplies whitespace.
    pub fn combine_with(&self, other: &TextBlock) -> Result<TextBlock> {
        let mut combined = self.clone();
        combined.absorb(other, 0)?;
        Ok(combined)
    }

    fn absorb(&mut self, other: &TextBlock, level: usize) -> Result<()> {
        match (self.reference_block.as_deref_mut(), other.reference_block()) {
            (Some(mine), Some(theirs)) => mine.absorb(theirs, level + 1)?,
            (None, None) => {}
            _ => return Err(ScriptError::MismatchedReferenceLevels { level }),
        }
        append_elements(&mut self.elements, &other.elements);
        self.user_confirmed &= other.user_confirmed;
        Ok(())
    }

    /// Like [`TextBlock::combine_with`] but for reference-text blocks of uneven depth:
    /// a missing level on either side is taken from whichever side has one.
    pub(crate) fn absorb_reference(&mut self, other: &TextBlock) {
        match (self.reference_block.as_deref_mut(), other.reference_block()) {
            (Some(mine), Some(theirs)) => mine.absorb_reference(theirs),
            (None, Some(theirs)) => self.reference_block = Some(Box::new(theirs.clone())),
            _ => {}
        }
        append_elements(&mut self.elements, &other.elements);
    }
}

fn append_elements(target: &mut Vec<BlockElement>, other: &[BlockElement]) {
    let mut rest = other.iter();
    if let (Some(BlockElement::Text { content: tail }), Some(BlockElement::Text { content: head })) =
        (target.last_mut(), other.first())
    {
        let needs_space = !tail.is_empty()
            && !head.is_empty()
            && !tail.ends_with(char::is_whitespace)
            && !head.starts_with(char::is_whitespace);
        if needs_space {
            tail.push(' ');
        }
        tail.push_str(head);
        rest.next();
    }
    target.extend(rest.cloned());
}

pub(crate) fn has_word_characters(text: &str) -> bool {
    text.chars().any(char::is_alphanumeric)
}

/// Ends a sentence: final `.`, `?`, `!` (or script equivalents), ignoring
/// closing quotes. An ellipsis leaves the sentence open.
pub(crate) fn ends_with_sentence_ending_punctuation(text: &str) -> bool {
    const CLOSERS: &[char] = &['"', '\'', '”', '’', '»', '›', ')', ']', '}'];
    const ENDERS: &[char] = &['.', '?', '!', '։', '。', '؟', '।', '¿', '¡'];

    let trimmed = text.trim_end().trim_end_matches(CLOSERS).trim_end();
    if trimmed.ends_with('…') || trimmed.ends_with("...") {
        return false;
    }
    trimmed.ends_with(ENDERS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{continuation_block, narrator, verse_block};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_text_rendering_with_and_without_verse_numbers() {
        let block = verse_block(1, 2, "Este es versiculo dos, ", "Jesus")
            .with_verse(VerseNumber::bridge(3, 4))
            .with_text("y tres.");

        assert_eq!(block.text(true), "{2} Este es versiculo dos, {3-4} y tres.");
        assert_eq!(block.text(false), "Este es versiculo dos, y tres.");
        assert_eq!(block.last_verse(), VerseNumber::bridge(3, 4));
        assert!(block.covers_verse(4));
        assert!(!block.covers_verse(5));
    }

    #[test]
    fn test_starts_at_verse_start_ignores_leading_punctuation() {
        let block = TextBlock::new("p", 1, 3)
            .with_text("«")
            .with_verse(VerseNumber::new(3))
            .with_text("Go.");
        assert!(block.starts_at_verse_start());

        let mid_verse = continuation_block(1, 3, "and then he left.", "Jesus");
        assert!(!mid_verse.starts_at_verse_start());
    }

    #[test]
    fn test_character_id_in_script_uses_first_candidate() {
        let mut block = verse_block(1, 1, "Hi", "Peter/John");
        assert_eq!(block.character_id_in_script(), "Peter");

        block.set_character_id_in_script("John");
        assert_eq!(block.character_id_in_script(), "John");
        assert_eq!(block.character_id, "Peter/John");
    }

    #[test]
    fn test_combine_inserts_single_space_between_text_runs() {
        let first = verse_block(1, 1, "He said", &narrator()).confirmed();
        let second = continuation_block(1, 1, "to them", &narrator());

        let combined = first.combine_with(&second).unwrap();

        assert_eq!(combined.text(true), "{1} He said to them");
        assert!(!combined.user_confirmed);
        // inputs untouched
        assert_eq!(first.text(true), "{1} He said");
    }

    #[test]
    fn test_combine_keeps_verse_marker_of_second_block() {
        let first = verse_block(1, 1, "One. ", &narrator());
        let second = verse_block(1, 2, "Two.", &narrator());

        let combined = first.combine_with(&second).unwrap();

        assert_eq!(combined.elements.len(), 4);
        assert_eq!(combined.text(true), "{1} One. {2} Two.");
    }

    #[test]
    fn test_combine_rejects_mismatched_reference_levels() {
        let reference = verse_block(1, 1, "One.", &narrator());
        let first = verse_block(1, 1, "Uno", &narrator()).with_reference(reference);
        let second = continuation_block(1, 1, "más", &narrator());

        let err = first.combine_with(&second).unwrap_err();
        assert!(matches!(err, ScriptError::MismatchedReferenceLevels { level: 0 }));
    }

    #[test]
    fn test_combine_merges_reference_text_at_every_level() {
        let english = |t: &str| continuation_block(1, 1, t, &narrator());
        let first = verse_block(1, 1, "Uno", &narrator()).with_reference(
            english("Primary one").with_reference(english("Backing one...")),
        );
        let second = continuation_block(1, 1, "dos", &narrator()).with_reference(
            english("primary two").with_reference(english("backing two")),
        );

        let combined = first.combine_with(&second).unwrap();

        let levels: Vec<String> = combined.reference_levels().map(|b| b.text(false)).collect();
        assert_eq!(
            levels,
            vec!["Primary one primary two", "Backing one... backing two"]
        );
    }

    #[test]
    fn test_ends_after_verse_marker() {
        let dangling = verse_block(1, 1, "One. ", &narrator())
            .with_verse(VerseNumber::new(2))
            .with_text(" ");
        assert!(dangling.ends_after_verse_marker());
        assert!(!verse_block(1, 1, "One.", &narrator()).ends_after_verse_marker());
    }

    #[test]
    fn test_sentence_ending_punctuation() {
        assert!(ends_with_sentence_ending_punctuation("He left."));
        assert!(ends_with_sentence_ending_punctuation("“Go away!”  "));
        assert!(!ends_with_sentence_ending_punctuation("and then..."));
        assert!(!ends_with_sentence_ending_punctuation("and then…"));
        assert!(!ends_with_sentence_ending_punctuation("he said,"));
    }
}
