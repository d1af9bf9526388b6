//! Automatic correlation of vernacular rows with reference-text blocks.

use std::collections::BTreeMap;

use log::debug;

use crate::character::{self, StandardCharacter};
use crate::reference_text::ReferenceTextSource;
use crate::script::TextBlock;

/// Give every row lacking one a reference block at every level the source
/// provides.
///
/// Rows already matched keep their reference blocks and attribution, and the
/// source blocks they account for are not handed out again. Each remaining
/// reference block goes to exactly one row; rows that get none are matched to
/// an empty block. Rows still lacking a clear speaker take one from the
/// reference text.
pub(crate) fn match_all_blocks(
    rows: &mut [TextBlock],
    book_id: &str,
    source: &dyn ReferenceTextSource,
    dialogue_quote_mark: Option<&str>,
) {
    let narrator = StandardCharacter::Narrator.id_for(book_id);
    let mut blocks: Vec<&mut TextBlock> = rows.iter_mut().collect();
    match_level(&mut blocks, book_id, source, &narrator, Some(dialogue_quote_mark));
}

/// Chapter, first verse and scripture flag: where a reference block belongs.
type ReferenceKey = (u32, u32, bool);

fn reference_key(block: &TextBlock) -> ReferenceKey {
    (block.chapter_number, block.initial_start_verse, block.is_scripture())
}

/// Match the unmatched `blocks` (rows, or reference blocks one level up)
/// against `source`. Attribution is only resolved for the vernacular rows
/// (`resolve` is `Some`).
fn match_level(
    blocks: &mut [&mut TextBlock],
    book_id: &str,
    source: &dyn ReferenceTextSource,
    narrator: &str,
    resolve: Option<Option<&str>>,
) {
    let consumed = consumed_reference_keys(blocks);
    {
        let mut targets: Vec<&mut TextBlock> = blocks
            .iter_mut()
            .filter(|b| b.reference_block.is_none())
            .map(|b| &mut **b)
            .collect();
        if !targets.is_empty() {
            let reference_blocks = fetch_reference_blocks(&targets, book_id, source, &consumed);
            let assignment = assign_reference_blocks(&targets, &reference_blocks);

            for (target, indices) in targets.iter_mut().zip(assignment) {
                let assigned: Vec<&TextBlock> = indices.iter().map(|&i| &reference_blocks[i]).collect();
                let reference = combine_reference_blocks(target, &assigned, narrator);
                if let Some(dialogue_quote_mark) = resolve {
                    resolve_character(target, &assigned, narrator);
                    apply_dialogue_dash(target, &assigned, dialogue_quote_mark, narrator);
                }
                target.set_matched_reference_block(reference);
            }
        }
    }

    if let Some(backing) = source.backing() {
        let mut next_level: Vec<&mut TextBlock> = blocks
            .iter_mut()
            .filter_map(|b| b.reference_block.as_deref_mut())
            .filter(|r| r.reference_block.is_none())
            .collect();
        if !next_level.is_empty() {
            match_level(&mut next_level, book_id, backing, narrator, None);
        }
    }
}

/// How many source blocks each already matched block accounts for, by key.
fn consumed_reference_keys(blocks: &[&mut TextBlock]) -> BTreeMap<ReferenceKey, usize> {
    let mut consumed = BTreeMap::new();
    for reference in blocks.iter().filter_map(|b| b.reference_block()) {
        if !reference.is_empty_or_verse_only() {
            *consumed.entry(reference_key(reference)).or_insert(0) += 1;
        }
    }
    consumed
}

fn fetch_reference_blocks(
    targets: &[&mut TextBlock],
    book_id: &str,
    source: &dyn ReferenceTextSource,
    consumed: &BTreeMap<ReferenceKey, usize>,
) -> Vec<TextBlock> {
    let mut ranges: Vec<(u32, u32, u32)> = Vec::new();
    for target in targets {
        let (chapter, start, end) = (
            target.chapter_number,
            target.initial_start_verse,
            target.last_verse().end,
        );
        match ranges.iter_mut().find(|(c, _, _)| *c == chapter) {
            Some(range) => {
                range.1 = range.1.min(start);
                range.2 = range.2.max(end);
            }
            None => ranges.push((chapter, start, end)),
        }
    }

    let mut skipped: BTreeMap<ReferenceKey, usize> = BTreeMap::new();
    ranges
        .into_iter()
        .flat_map(|(chapter, start, end)| source.blocks_for_range(book_id, chapter, start, end))
        .filter(|block| {
            let key = reference_key(block);
            let taken = skipped.entry(key).or_insert(0);
            if *taken < consumed.get(&key).copied().unwrap_or(0) {
                *taken += 1;
                debug!("reference text at {}:{} already matched", key.0, key.1);
                false
            } else {
                true
            }
        })
        .collect()
}

/// For every target, the indices of the reference blocks assigned to it.
///
/// A reference block goes to a target of the same kind (scripture or not)
/// covering its first verse. Among those, targets starting in that verse are
/// preferred; when as many of them start there as reference blocks do, they
/// are paired in order.
fn assign_reference_blocks(targets: &[&mut TextBlock], reference_blocks: &[TextBlock]) -> Vec<Vec<usize>> {
    let mut assignment = vec![Vec::new(); targets.len()];

    let mut index = 0;
    while index < reference_blocks.len() {
        let group_key = reference_key(&reference_blocks[index]);
        let group_end = reference_blocks[index..]
            .iter()
            .position(|b| reference_key(b) != group_key)
            .map_or(reference_blocks.len(), |p| index + p);
        let (chapter, verse, scripture) = group_key;

        let same_kind = |t: &&mut TextBlock| t.chapter_number == chapter && t.is_scripture() == scripture;
        let starting: Vec<usize> = targets
            .iter()
            .enumerate()
            .filter(|(_, t)| same_kind(t) && t.initial_start_verse == verse)
            .map(|(i, _)| i)
            .collect();

        if starting.len() == group_end - index {
            for (offset, &target) in starting.iter().enumerate() {
                assignment[target].push(index + offset);
            }
        } else {
            let chosen = starting
                .iter()
                .copied()
                .find(|&i| targets[i].starts_at_verse_start())
                .or_else(|| starting.first().copied())
                .or_else(|| {
                    targets
                        .iter()
                        .position(|t| same_kind(t) && t.covers_verse(verse))
                });
            match chosen {
                Some(target) => assignment[target].extend(index..group_end),
                None => debug!("no row for reference text at {chapter}:{verse}"),
            }
        }
        index = group_end;
    }
    assignment
}

/// One reference block holding all of `assigned`, or an empty one when
/// nothing was assigned. Narration wins the speaker when mixed.
fn combine_reference_blocks(target: &TextBlock, assigned: &[&TextBlock], narrator: &str) -> TextBlock {
    let Some((first, rest)) = assigned.split_first() else {
        return target.build_reference_block("", None);
    };
    let mut combined = (*first).clone();
    for block in rest {
        combined.absorb_reference(block);
        if block.is_narrator() && !combined.is_narrator() {
            combined.set_character(narrator);
        }
    }
    combined
}

fn resolve_character(row: &mut TextBlock, assigned: &[&TextBlock], narrator: &str) {
    if !character::is_unclear(&row.character_id) {
        return;
    }
    if assigned.iter().any(|r| r.is_narrator()) {
        row.set_character(narrator);
        row.user_confirmed = false;
        return;
    }

    let mut named = assigned.iter().filter(|r| {
        !character::is_standard_character(&r.character_id) && !character::is_unclear(&r.character_id)
    });
    let Some(first) = named.next() else {
        return;
    };
    let only_speaker = named.all(|r| r.character_id == first.character_id);

    row.character_id = first.character_id.clone();
    row.character_id_override_for_script = character::is_multi_candidate(&first.character_id)
        .then(|| first.character_id_in_script().to_string());
    row.user_confirmed = only_speaker;
}

/// In languages marking speech with a leading dash, a dash-led row matched
/// only to narration is the narrator's.
fn apply_dialogue_dash(row: &mut TextBlock, assigned: &[&TextBlock], dialogue_quote_mark: Option<&str>, narrator: &str) {
    let Some(mark) = dialogue_quote_mark.filter(|m| !m.is_empty()) else {
        return;
    };
    if row.user_confirmed || row.is_narrator() {
        return;
    }
    if let [only] = assigned
        && only.is_narrator()
        && row.text(false).trim_start().starts_with(mark)
    {
        row.set_character(narrator);
        row.user_confirmed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::UNKNOWN;
    use crate::reference_text::ReferenceText;
    use crate::tests::{continuation_block, narrator, verse_block};
    use pretty_assertions::assert_eq;

    fn english(blocks: Vec<TextBlock>) -> ReferenceText {
        ReferenceText::new("English", "he said.").with_book("MRK", blocks)
    }

    #[test]
    fn test_unknown_row_matched_to_narration_becomes_narrator_unconfirmed() {
        let reference = english(vec![verse_block(1, 1, "In the beginning.", &narrator())]);
        let mut rows = vec![verse_block(1, 1, "Al principio.", UNKNOWN)];

        match_all_blocks(&mut rows, "MRK", &reference, None);

        assert_eq!(rows[0].character_id, narrator());
        assert!(!rows[0].user_confirmed);
        assert_eq!(
            rows[0].reference_block().map(|r| r.text(true)),
            Some("{1} In the beginning.".to_string())
        );
    }

    #[test]
    fn test_unknown_row_matched_to_single_speaker_is_confirmed() {
        let reference = english(vec![verse_block(1, 2, "Follow me.", "Jesus")]);
        let mut rows = vec![verse_block(1, 2, "Seguidme.", UNKNOWN)];

        match_all_blocks(&mut rows, "MRK", &reference, None);

        assert_eq!(rows[0].character_id, "Jesus");
        assert!(rows[0].user_confirmed);
    }

    #[test]
    fn test_multi_candidate_speaker_keeps_full_id() {
        let reference = english(vec![verse_block(1, 2, "Who is this?", "Peter/John")]);
        let mut rows = vec![verse_block(1, 2, "¿Quién es?", UNKNOWN)];

        match_all_blocks(&mut rows, "MRK", &reference, None);

        assert_eq!(rows[0].character_id, "Peter/John");
        assert_eq!(rows[0].character_id_in_script(), "Peter");
    }

    #[test]
    fn test_clear_speaker_is_left_alone() {
        let reference = english(vec![verse_block(1, 1, "He said.", &narrator())]);
        let mut rows = vec![verse_block(1, 1, "Vamos.", "Jesus")];

        match_all_blocks(&mut rows, "MRK", &reference, None);

        assert_eq!(rows[0].character_id, "Jesus");
        assert!(rows[0].matches_reference_text());
    }

    #[test]
    fn test_rows_split_within_a_verse_pair_with_reference_blocks() {
        let reference = english(vec![
            verse_block(1, 3, "He said,", &narrator()),
            continuation_block(1, 3, "Come here.", "Jesus"),
        ]);
        let mut rows = vec![
            verse_block(1, 3, "Dijo:", &narrator()),
            continuation_block(1, 3, "Venid acá.", "Jesus"),
        ];

        match_all_blocks(&mut rows, "MRK", &reference, None);

        let texts: Vec<String> = rows
            .iter()
            .map(|r| r.reference_block().map(|b| b.text(false)).unwrap_or_default())
            .collect();
        assert_eq!(texts, vec!["He said,", "Come here."]);
    }

    #[test]
    fn test_rows_without_reference_text_get_empty_match() {
        let reference = english(vec![verse_block(1, 1, "One.", &narrator())]);
        let mut rows = vec![
            verse_block(1, 1, "Uno", &narrator()),
            continuation_block(1, 1, "más.", &narrator()),
        ];

        match_all_blocks(&mut rows, "MRK", &reference, None);

        assert_eq!(rows[0].reference_block().unwrap().text(false), "One.");
        let empty = rows[1].reference_block().unwrap();
        assert!(empty.is_empty_or_verse_only());
    }

    #[test]
    fn test_dash_led_row_matched_to_narration() {
        let reference = english(vec![verse_block(1, 4, "And he answered.", &narrator())]);
        let guessed = || vec![verse_block(1, 4, "—Y respondió.", "Jesus")];

        let mut without_mark = guessed();
        match_all_blocks(&mut without_mark, "MRK", &reference, None);
        let mut with_mark = guessed();
        match_all_blocks(&mut with_mark, "MRK", &reference, Some("—"));

        assert_eq!(without_mark[0].character_id, "Jesus");
        assert_eq!(with_mark[0].character_id, narrator());
        assert!(!with_mark[0].user_confirmed);
    }

    #[test]
    fn test_backing_levels_are_matched_too() {
        let primary = ReferenceText::new("Español", "dijo.")
            .with_book("MRK", vec![verse_block(1, 1, "Al principio.", &narrator())])
            .with_backing(english(vec![verse_block(1, 1, "In the beginning.", &narrator())]));
        let mut rows = vec![verse_block(1, 1, "Pa mwanzo.", &narrator())];

        match_all_blocks(&mut rows, "MRK", &primary, None);

        let levels: Vec<String> = rows[0].reference_levels().map(|b| b.text(false)).collect();
        assert_eq!(levels, vec!["Al principio.", "In the beginning."]);
    }

    #[test]
    fn test_narration_wins_when_row_gets_narrator_and_speaker_blocks() {
        let reference = english(vec![
            verse_block(1, 3, "Come,", "Jesus"),
            continuation_block(1, 3, "he said.", &narrator()),
        ]);
        let mut rows = vec![verse_block(1, 3, "Venid, dijo.", UNKNOWN)];

        match_all_blocks(&mut rows, "MRK", &reference, None);

        assert_eq!(rows[0].character_id, narrator());
        assert!(!rows[0].user_confirmed);
        let matched = rows[0].reference_block().unwrap();
        assert_eq!(matched.text(false), "Come, he said.");
        assert_eq!(matched.character_id, narrator());
    }

    #[test]
    fn test_first_of_two_speakers_wins_unconfirmed() {
        let reference = english(vec![
            verse_block(1, 2, "Who are you?", "Peter"),
            continuation_block(1, 2, "Rabbi!", "John"),
        ]);
        let mut rows = vec![verse_block(1, 2, "¿Quién eres? ¡Rabí!", UNKNOWN)];

        match_all_blocks(&mut rows, "MRK", &reference, None);

        assert_eq!(rows[0].character_id, "Peter");
        assert_eq!(rows[0].character_id_override_for_script, None);
        assert!(!rows[0].user_confirmed);
        let matched = rows[0].reference_block().unwrap();
        assert_eq!(matched.text(false), "Who are you? Rabbi!");
        assert_eq!(matched.character_id, "Peter");
    }

    #[test]
    fn test_rows_already_matched_keep_their_reference_and_speaker() {
        let reference = english(vec![verse_block(1, 1, "One from source.", &narrator())]);
        let mut rows = vec![
            verse_block(1, 1, "Uno", UNKNOWN),
            continuation_block(1, 1, "más.", UNKNOWN),
        ];
        rows[0].set_matched_reference_block(verse_block(1, 1, "Typed by user.", &narrator()));

        match_all_blocks(&mut rows, "MRK", &reference, None);

        assert_eq!(
            rows[0].reference_block().map(|r| r.text(true)),
            Some("{1} Typed by user.".to_string())
        );
        assert_eq!(rows[0].character_id, UNKNOWN);
        // the source block for verse 1 is accounted for by the typed one
        assert!(rows[1].reference_block().unwrap().is_empty_or_verse_only());
        assert_eq!(rows[1].character_id, UNKNOWN);
    }

    #[test]
    fn test_matching_twice_changes_nothing() {
        let reference = english(vec![
            verse_block(1, 1, "One.", &narrator()),
            verse_block(1, 2, "Follow me.", "Jesus"),
        ]);
        let mut rows = vec![verse_block(1, 1, "Uno.", UNKNOWN), verse_block(1, 2, "Seguidme.", UNKNOWN)];
        match_all_blocks(&mut rows, "MRK", &reference, None);
        let once = rows.clone();

        match_all_blocks(&mut rows, "MRK", &reference, None);

        assert_eq!(rows, once);
    }
}
