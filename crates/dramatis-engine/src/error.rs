use thiserror::Error;

/// Broad family of a [`ScriptError`]: a bad argument from the caller, or an
/// operation that is not valid in the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    InvalidArgument,
    InvalidOperation,
}

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("block index {index} is not in the sequence (length {len})")]
    BlockNotFound { index: usize, len: usize },

    #[error("verse {verse} does not occur in block {index}")]
    VerseNotInBlock { verse: String, index: usize },

    #[error("offset {offset} is out of range for verse {verse} in block {index} (verse text length {len})")]
    OffsetOutOfRange {
        verse: String,
        offset: usize,
        len: usize,
        index: usize,
    },

    #[error("span {start}..{end} is outside the book (length {len})")]
    SpanOutOfRange { start: usize, end: usize, len: usize },

    #[error("replacement must contain at least one block")]
    EmptyReplacement,

    #[error("there are no rows to operate on")]
    NoRows,

    #[error("row {row} is out of range (matchup has {rows} rows)")]
    RowOutOfRange { row: usize, rows: usize },

    #[error("blocks differ in whether they are matched to reference text at level {level}")]
    MismatchedReferenceLevels { level: usize },

    #[error("rows {rows:?} are not matched to reference text")]
    IncompleteAlignment { rows: Vec<usize> },

    #[error("block {index} ({description}) would continue a quote chain spoken by a different character")]
    DanglingContinuation { index: usize, description: String },

    #[error("book blocks {start}..{end} changed after the matchup was created")]
    StaleMatchup { start: usize, end: usize },
}

impl ScriptError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ScriptError::MismatchedReferenceLevels { .. }
            | ScriptError::IncompleteAlignment { .. }
            | ScriptError::DanglingContinuation { .. }
            | ScriptError::StaleMatchup { .. } => ErrorCategory::InvalidOperation,
            _ => ErrorCategory::InvalidArgument,
        }
    }
}

pub type Result<T> = std::result::Result<T, ScriptError>;
