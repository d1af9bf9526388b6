use super::block::TextBlock;
use super::split::{SplitAt, split_block_in};
use crate::error::Result;

/// The cloned window of a book that a matchup edits.
///
/// Every row remembers which original block it came from, so rows produced
/// by splitting can be traced back and the anchor follows its block.
#[derive(Debug, Clone)]
pub struct PortionScript {
    book_id: String,
    blocks: Vec<TextBlock>,
    origins: Vec<usize>,
    anchor_row: usize,
    next_split_id: u32,
}

impl PortionScript {
    pub(crate) fn new(book_id: &str, blocks: Vec<TextBlock>, anchor_row: usize, next_split_id: u32) -> Self {
        Self {
            book_id: book_id.to_string(),
            origins: (0..blocks.len()).collect(),
            blocks,
            anchor_row,
            next_split_id,
        }
    }

    pub fn book_id(&self) -> &str {
        &self.book_id
    }

    pub fn blocks(&self) -> &[TextBlock] {
        &self.blocks
    }

    pub(crate) fn blocks_mut(&mut self) -> &mut [TextBlock] {
        &mut self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Index (within the original window) of the block `row` came from.
    pub fn origin_of(&self, row: usize) -> Option<usize> {
        self.origins.get(row).copied()
    }

    pub fn anchor_row(&self) -> usize {
        self.anchor_row
    }

    pub(crate) fn set_anchor_row(&mut self, row: usize) {
        self.anchor_row = row;
    }

    pub(crate) fn next_split_id(&self) -> u32 {
        self.next_split_id
    }

    /// Split row `row` inside `verse`, returning the row of the new block.
    pub fn split_block(&mut self, row: usize, verse: &str, at: SplitAt, character: Option<&str>) -> Result<usize> {
        let new_row = split_block_in(&mut self.blocks, row, verse, at, character, &mut self.next_split_id)?;
        let origin = self.origins[row];
        self.origins.insert(new_row, origin);
        if self.anchor_row >= new_row {
            self.anchor_row += 1;
        }
        Ok(new_row)
    }
}
