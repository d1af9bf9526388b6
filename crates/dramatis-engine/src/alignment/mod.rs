//! Aligning windows of a book with reference text.
//!
//! A [`BlockMatchup`] takes a window of blocks around an anchor (extended to
//! clean verse boundaries by [`window`]), lets the caller or the automatic
//! matcher attach reference blocks to its rows, and commits the rows back
//! into the book.

pub mod matching;
pub mod matchup;
pub mod window;

pub use matchup::{BlockMatchup, HeSaidRows, MatchupOptions, PreEdit, VerseBreakPredicate};
pub use window::BreakPredicate;
