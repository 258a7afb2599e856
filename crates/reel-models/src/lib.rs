pub mod movie;
pub mod library;
pub mod acquisition;
pub mod collection;

pub use movie::{strip_parentheticals, MovieReference, ResolvedIdentity};
pub use library::{matches_external_id, IndexHit, LibraryEntry, TitleKind};
pub use acquisition::AcquisitionRecord;
pub use collection::{CollectionRecord, CollectionSource, CollectionStatus, ListedMovie};
