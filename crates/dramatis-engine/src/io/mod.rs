use crate::narrator_overrides::NarratorOverrides;
use crate::reference_text::ReferenceText;
use crate::script::BookScript;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum IoError {
    #[error("File not found: {0}")]
    NotFound(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Read a book script saved with [`write_book`]
pub fn read_book(path: &Path) -> Result<BookScript, IoError> {
    read_json(path)
}

/// Write a book script, including its unapplied splits
pub fn write_book(path: &Path, book: &BookScript) -> Result<(), IoError> {
    write_json(path, book)
}

/// Read a reference text (with any backing levels)
pub fn read_reference_text(path: &Path) -> Result<ReferenceText, IoError> {
    read_json(path)
}

pub fn write_reference_text(path: &Path, reference_text: &ReferenceText) -> Result<(), IoError> {
    write_json(path, reference_text)
}

/// Read a table of narrator overrides (a JSON list of entries)
pub fn read_narrator_overrides(path: &Path) -> Result<NarratorOverrides, IoError> {
    read_json(path)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, IoError> {
    if !path.exists() {
        return Err(IoError::NotFound(path.to_path_buf()));
    }
    let content = fs::read_to_string(path).map_err(IoError::Io)?;
    serde_json::from_str(&content).map_err(|source| IoError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), IoError> {
    // Create parent directories if they don't exist
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(IoError::Io)?;
    }

    let content = serde_json::to_string_pretty(value).map_err(|source| IoError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, content).map_err(IoError::Io)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{MultiBlockQuote, SplitAt, TextBlock, UnappliedSplit};
    use crate::tests::{narrator, test_book, verse_block};
    use crate::verse::VerseNumber;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_book_round_trip_keeps_every_field() {
        // Given a book with split, chained and aligned blocks
        let mut book = test_book(vec![
            verse_block(1, 1, "Uno dos. ", &narrator())
                .with_verse(VerseNumber::bridge(2, 3))
                .with_text("Tres.")
                .with_multi_block_quote(MultiBlockQuote::Start)
                .with_delivery("whispering")
                .with_reference(
                    verse_block(1, 1, "One two.", &narrator())
                        .with_reference(verse_block(1, 1, "Un deux.", &narrator())),
                ),
        ]);
        book.split_block(0, "1", SplitAt::Offset(4), Some("Peter/John")).unwrap();
        book.push_unapplied_split(UnappliedSplit {
            pieces: vec![TextBlock::new("p", 2, 1).with_text("piece")],
            target: None,
        });
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("books/MRK.json");

        // When writing and reading it back
        write_book(&path, &book).unwrap();
        let loaded = read_book(&path).unwrap();

        // Then nothing is lost
        assert_eq!(loaded, book);
        assert_eq!(loaded.next_split_id(), book.next_split_id());
        assert_eq!(loaded.first_block_index_for_verse(1, 3), Some(1));
    }

    #[test]
    fn test_handle_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = read_book(&dir.path().join("missing.json"));
        assert!(matches!(result, Err(IoError::NotFound(_))));
    }

    #[test]
    fn test_handle_invalid_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();

        let result = read_reference_text(&path);

        assert!(matches!(result, Err(IoError::Json { .. })));
    }

    #[test]
    fn test_read_narrator_overrides() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("overrides.json");
        fs::write(
            &path,
            r#"{"entries": [{"book_id": "NEH", "start_chapter": 1, "start_verse": 1,
                "end_chapter": 7, "end_verse": 5, "character": "Nehemiah"}]}"#,
        )
        .unwrap();

        let overrides = read_narrator_overrides(&path).unwrap();

        assert_eq!(overrides.character_for("NEH", 3, 10), Some("Nehemiah"));
        assert_eq!(overrides.character_for("NEH", 8, 1), None);
    }

    #[test]
    fn test_reference_text_round_trip() {
        let reference = ReferenceText::new("Español", "dijo.")
            .with_book("MRK", vec![verse_block(1, 1, "Al principio.", &narrator())])
            .with_backing(ReferenceText::new("English", "he said."));
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("reference.json");

        write_reference_text(&path, &reference).unwrap();

        assert_eq!(read_reference_text(&path).unwrap(), reference);
    }
}
