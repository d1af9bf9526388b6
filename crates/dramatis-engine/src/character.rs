//! Character-id conventions shared by the vernacular script and reference texts.
//!
//! Ids are plain strings. Besides ordinary character names there are:
//!
//! - book-specific standard characters (`narrator-MRK`, `BC-MRK`, `extra-MRK`, `intro-MRK`)
//! - the sentinels [`AMBIGUOUS`] and [`UNKNOWN`] used while attribution is unresolved
//! - multi-candidate ids such as `"Peter/John"`, from which one name is chosen for the script

/// More than one character could be speaking and nobody has decided yet.
pub const AMBIGUOUS: &str = "Ambiguous";

/// The parser expected no quotation here; needs review.
pub const UNKNOWN: &str = "Unknown";

pub const CANDIDATE_SEPARATOR: char = '/';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardCharacter {
    Narrator,
    BookOrChapter,
    ExtraBiblical,
    Intro,
}

impl StandardCharacter {
    const ALL: [StandardCharacter; 4] = [
        StandardCharacter::Narrator,
        StandardCharacter::BookOrChapter,
        StandardCharacter::ExtraBiblical,
        StandardCharacter::Intro,
    ];

    fn prefix(self) -> &'static str {
        match self {
            StandardCharacter::Narrator => "narrator-",
            StandardCharacter::BookOrChapter => "BC-",
            StandardCharacter::ExtraBiblical => "extra-",
            StandardCharacter::Intro => "intro-",
        }
    }

    /// The id of this standard character for one book, e.g. `narrator-MRK`.
    pub fn id_for(self, book_id: &str) -> String {
        format!("{}{book_id}", self.prefix())
    }
}

pub fn standard_character_kind(character_id: &str) -> Option<StandardCharacter> {
    StandardCharacter::ALL
        .into_iter()
        .find(|kind| character_id.starts_with(kind.prefix()))
}

pub fn is_standard_character(character_id: &str) -> bool {
    standard_character_kind(character_id).is_some()
}

pub fn is_narrator(character_id: &str) -> bool {
    standard_character_kind(character_id) == Some(StandardCharacter::Narrator)
}

/// Attribution has not been resolved (ambiguous, unknown or missing).
pub fn is_unclear(character_id: &str) -> bool {
    character_id.is_empty() || character_id == AMBIGUOUS || character_id == UNKNOWN
}

pub fn is_multi_candidate(character_id: &str) -> bool {
    character_id.contains(CANDIDATE_SEPARATOR)
}

pub fn candidates(character_id: &str) -> impl Iterator<Item = &str> {
    character_id
        .split(CANDIDATE_SEPARATOR)
        .map(str::trim)
        .filter(|c| !c.is_empty())
}

/// The first listed candidate, which is the default name used in the script.
pub fn first_candidate(character_id: &str) -> &str {
    candidates(character_id).next().unwrap_or(character_id)
}
