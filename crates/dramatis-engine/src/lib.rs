pub mod alignment;
pub mod character;
pub mod error;
pub mod io;
pub mod narrator_overrides;
pub mod reference_text;
pub mod script;
pub mod verse;
pub mod versification;


// Re-export key types for easier usage
pub use alignment::{BlockMatchup, HeSaidRows, MatchupOptions};
pub use error::{ErrorCategory, Result, ScriptError};
pub use io::*;
pub use narrator_overrides::{NarratorOverride, NarratorOverrides};
pub use reference_text::{ReferenceText, ReferenceTextSource};
pub use script::{
    Annotation, AnnotationKind, BlockElement, BookScript, MultiBlockQuote, PortionScript, SplitAt,
    TextBlock, UnappliedSplit,
};
pub use verse::VerseNumber;
pub use versification::Versification;
