mod common;

use common::*;
use dramatis_engine::{
    BlockMatchup, ErrorCategory, MatchupOptions, MultiBlockQuote, PortionScript, ReferenceText, ScriptError,
    SplitAt,
    character::UNKNOWN,
};
use pretty_assertions::assert_eq;

#[test]
fn test_matchup_window_is_a_deep_copy() {
    // Given three single-verse blocks
    let book = book(vec![
        verse_block(1, 1, "v1", &narrator()),
        verse_block(1, 2, "v2", &narrator()),
        verse_block(1, 3, "v3", &narrator()),
    ]);
    let reference = english(&["One.", "Two.", "Three."]);

    // When a matchup is anchored on verse 2
    let mut matchup = BlockMatchup::new(&book, 1, &reference, MatchupOptions::new()).unwrap();

    // Then it holds one independent copy of that block
    assert_eq!(matchup.correlated_blocks().len(), 1);
    let anchor = matchup.correlated_anchor_block().unwrap();
    assert_eq!(anchor.text(false), "v2");
    assert!(book.blocks().iter().all(|b| !std::ptr::eq(b, anchor)));

    matchup.set_reference_text(0, "{2} Two.", 0).unwrap();
    assert!(!book.blocks()[1].matches_reference_text());
}

#[test]
fn test_split_row_halves_share_new_split_id() {
    let book = book(vec![verse_block(1, 2, "Este es versiculo dos, ", &narrator())]);
    let reference = english(&["One.", "Two."]);
    let options = MatchupOptions::new().with_pre_edit(|portion: &mut PortionScript| {
        portion.split_block(0, "2", SplitAt::Offset(8), None).unwrap();
    });

    let matchup = BlockMatchup::new(&book, 0, &reference, options).unwrap();

    let rows = matchup.correlated_blocks();
    assert_eq!(rows[0].text(true), "{2} Este es ");
    assert_eq!(rows[1].text(true), "versiculo dos, ");
    assert!(rows[0].split_id.is_some());
    assert_eq!(rows[0].split_id, rows[1].split_id);
    assert_eq!(book.blocks()[0].split_id, None);
}

#[test]
fn test_match_all_blocks_resolves_unexpected_speakers() {
    let mut reference = english(&["He went out."]);
    reference
        .books
        .get_mut(BOOK)
        .unwrap()
        .push(verse_block(1, 2, "Follow me.", "Jesus"));
    let book = book(vec![
        verse_block(1, 1, "Salió.", UNKNOWN),
        verse_block(1, 2, "Seguidme.", UNKNOWN),
    ]);

    let mut matchup =
        BlockMatchup::new(&book, 0, &reference, MatchupOptions::new().with_block_count(2)).unwrap();
    matchup.match_all_blocks(None);

    let rows = matchup.correlated_blocks();
    assert_eq!(rows[0].character_id, narrator());
    assert!(!rows[0].user_confirmed);
    assert_eq!(rows[1].character_id, "Jesus");
    assert!(rows[1].user_confirmed);
    assert!(matchup.all_scripture_blocks_match());
}

#[test]
fn test_set_reference_text_leaves_explicit_next_verse_alone() {
    let book = book(vec![
        verse_block(1, 1, "Entonces Jesús les dijo", &narrator()),
        continuation_block(1, 1, "que era solo el versículo dos.", &narrator()),
    ]);
    let reference = english(&["One.", "Two."]);
    let mut matchup =
        BlockMatchup::new(&book, 0, &reference, MatchupOptions::new().with_block_count(2)).unwrap();
    matchup.set_reference_text(1, "{2} It was verse two.", 0).unwrap();
    let before = matchup.correlated_blocks()[1].clone();

    let reference_block = matchup
        .set_reference_text(0, "Then Jesus told them {2} that it was just verse two.", 0)
        .unwrap();

    assert_eq!(reference_block.initial_start_verse, 1);
    assert_eq!(matchup.correlated_blocks()[1], before);
}

#[test]
fn test_apply_refuses_incomplete_alignment() {
    // Given a three-row matchup with only two rows aligned
    let mut book = book(vec![
        verse_block(1, 1, "v1", &narrator()),
        verse_block(1, 2, "v2", &narrator()),
        verse_block(1, 3, "v3", &narrator()),
    ]);
    let original = book.clone();
    let reference = english(&["One.", "Two.", "Three."]);
    let mut matchup =
        BlockMatchup::new(&book, 0, &reference, MatchupOptions::new().with_block_count(3)).unwrap();
    matchup.set_reference_text(0, "{1} One.", 0).unwrap();
    matchup.set_reference_text(1, "{2} Two.", 0).unwrap();

    // When applying
    let err = matchup.apply(&mut book).unwrap_err();

    // Then nothing is committed and the work is kept
    assert!(matches!(err, ScriptError::IncompleteAlignment { ref rows } if rows == &vec![2]));
    assert_eq!(err.category(), ErrorCategory::InvalidOperation);
    assert!(matchup.has_outstanding_changes_to_apply());
    assert_eq!(book, original);
}

#[test]
fn test_apply_commits_split_and_aligned_rows() {
    // Given a matchup that splits verse 1 and is fully aligned
    let mut book = book(vec![
        verse_block(1, 1, "Uno dos tres.", &narrator()),
        verse_block(1, 2, "v2", &narrator()),
    ]);
    let reference = english(&["One two three.", "Two."]);
    let options = MatchupOptions::new().with_pre_edit(|portion: &mut PortionScript| {
        portion.split_block(0, "1", SplitAt::Offset(4), None).unwrap();
    });
    let mut matchup = BlockMatchup::new(&book, 0, &reference, options).unwrap();
    matchup.match_all_blocks(None);

    // When applying it
    matchup.apply(&mut book).unwrap();

    // Then the book holds both halves and the matchup is in sync
    assert_eq!(book.len(), 3);
    let texts: Vec<String> = book.blocks().iter().map(|b| b.text(true)).collect();
    assert_eq!(texts, vec!["{1} Uno ", "dos tres.", "{2} v2"]);
    let split_id = book.blocks()[0].split_id.unwrap();
    assert_eq!(book.blocks()[1].split_id, Some(split_id));
    assert!(book.next_split_id() > split_id);
    assert_eq!(
        book.blocks()[0].reference_block().map(|r| r.text(false)),
        Some("One two three.".to_string())
    );
    assert!(!matchup.has_outstanding_changes_to_apply());
    assert_eq!(matchup.original_blocks(), &book.blocks()[0..2]);
    assert_chains_well_formed(&book);
}

#[test]
fn test_apply_twice_changes_nothing_more() {
    let mut book = book(vec![
        verse_block(1, 1, "v1", &narrator()),
        verse_block(1, 2, "v2", &narrator()),
    ]);
    let reference = english(&["One.", "Two."]);
    let mut matchup = BlockMatchup::new(&book, 1, &reference, MatchupOptions::new()).unwrap();
    matchup.match_all_blocks(None);

    matchup.apply(&mut book).unwrap();
    let after_first = book.clone();
    matchup.apply(&mut book).unwrap();

    assert_eq!(book, after_first);
}

#[test]
fn test_apply_detects_book_changed_underneath() {
    let mut book = book(vec![
        verse_block(1, 1, "v1", &narrator()),
        verse_block(1, 2, "v2", &narrator()),
    ]);
    let reference = english(&["One.", "Two."]);
    let mut matchup = BlockMatchup::new(&book, 1, &reference, MatchupOptions::new()).unwrap();
    matchup.match_all_blocks(None);
    book.block_mut(1).unwrap().set_character("Peter");

    let err = matchup.apply(&mut book).unwrap_err();

    assert!(matches!(err, ScriptError::StaleMatchup { start: 1, end: 2 }));
    assert_eq!(book.blocks()[1].character_id, "Peter");
}

#[test]
fn test_later_edits_to_matchup_do_not_reach_applied_book() {
    let mut book = book(vec![verse_block(1, 1, "v1", &narrator())]);
    let reference = english(&["One."]);
    let mut matchup = BlockMatchup::new(&book, 0, &reference, MatchupOptions::new()).unwrap();
    matchup.match_all_blocks(None);
    matchup.apply(&mut book).unwrap();

    matchup.set_reference_text(0, "{1} Changed.", 0).unwrap();

    assert_eq!(book.blocks()[0].reference_block().unwrap().text(false), "One.");
    assert!(matchup.has_outstanding_changes_to_apply());
}

#[test]
fn test_apply_extends_open_quote_chain_to_following_blocks() {
    // Given a quote chain that runs on past a one-block window
    let mut book = book(vec![
        verse_block(1, 1, "Dijo:", UNKNOWN).with_multi_block_quote(MultiBlockQuote::Start),
        verse_block(1, 2, "Vamos.", UNKNOWN).with_multi_block_quote(MultiBlockQuote::Continuation),
    ]);
    let reference = ReferenceText::new("English", "he said.")
        .with_book(BOOK, vec![verse_block(1, 1, "I say,", "Jesus")]);
    let mut matchup =
        BlockMatchup::new(&book, 0, &reference, MatchupOptions::new().with_block_count(1)).unwrap();
    matchup.match_all_blocks(None);
    assert_eq!(matchup.correlated_blocks()[0].character_id, "Jesus");

    // When the window is committed
    matchup.apply(&mut book).unwrap();

    // Then the continuation outside the window follows the chain's speaker
    assert_eq!(book.len(), 2);
    assert_eq!(book.blocks()[1].character_id, "Jesus");
    assert_eq!(book.blocks()[1].multi_block_quote, MultiBlockQuote::Continuation);
    assert_chains_well_formed(&book);
}

#[test]
fn test_apply_keeps_narration_that_ends_a_quote() {
    // Given a two-block chain whose second block is narration in the reference
    let mut book = book(vec![
        verse_block(1, 1, "Venid,", UNKNOWN).with_multi_block_quote(MultiBlockQuote::Start),
        continuation_block(1, 1, "dijo.", UNKNOWN).with_multi_block_quote(MultiBlockQuote::Continuation),
    ]);
    let reference = ReferenceText::new("English", "he said.").with_book(
        BOOK,
        vec![
            verse_block(1, 1, "Come,", "Jesus"),
            continuation_block(1, 1, "he said.", &narrator()),
        ],
    );
    let mut matchup =
        BlockMatchup::new(&book, 0, &reference, MatchupOptions::new().with_block_count(2)).unwrap();
    matchup.match_all_blocks(None);

    // When the window is committed
    matchup.apply(&mut book).unwrap();

    // Then the narration stays with the narrator and the chain is broken
    let narrator = narrator();
    let committed: Vec<(&str, MultiBlockQuote)> = book
        .blocks()
        .iter()
        .map(|b| (b.character_id.as_str(), b.multi_block_quote))
        .collect();
    assert_eq!(
        committed,
        vec![
            ("Jesus", MultiBlockQuote::None),
            (narrator.as_str(), MultiBlockQuote::None),
        ]
    );
    assert_chains_well_formed(&book);
}

#[test]
fn test_match_all_blocks_keeps_typed_reference_text() {
    let book = book(vec![verse_block(1, 1, "Uno.", &narrator())]);
    let reference = english(&["One from source."]);
    let mut matchup = BlockMatchup::new(&book, 0, &reference, MatchupOptions::new()).unwrap();
    matchup.set_reference_text(0, "{1} Typed by user.", 0).unwrap();

    matchup.match_all_blocks(None);

    assert_eq!(
        matchup.correlated_blocks()[0].reference_block().map(|r| r.text(true)),
        Some("{1} Typed by user.".to_string())
    );
}
