pub mod category;
pub mod clock;
pub mod daily;
pub mod document;
pub mod extract;
pub mod search;
pub mod section;
pub mod writer;

pub use category::{Category, CategoryStore, NoteInfo, slugify};
pub use clock::{Clock, FixedClock, SystemClock};
pub use daily::{DailyNoteEngine, PriorityItem};
pub use document::VaultError;
pub use extract::deep::{DeepExtraction, DeepExtractor, Extraction};
pub use extract::{ExtractedKnowledge, Role, Turn};
pub use search::{ScanSearch, SearchProvider, SearchResult, search_or_empty};
pub use writer::{KnowledgeWriter, WriteReport};
