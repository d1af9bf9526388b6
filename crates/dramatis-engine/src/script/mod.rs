pub mod block;
pub mod book;
pub mod joined;
pub mod portion;
pub mod reconcile;
pub mod reference_parse;
pub mod split;

pub use block::{Annotation, AnnotationKind, BlockElement, MultiBlockQuote, TextBlock};
pub use book::{BookScript, UnappliedSplit};
pub use portion::PortionScript;
pub use split::SplitAt;
