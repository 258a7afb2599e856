pub mod error;
pub mod factory;
pub mod imdb;
pub mod letterboxd;
pub mod plex;
pub mod radarr;
pub mod traits;

pub use error::{Result, SourceError};
pub use factory::SourceSet;
pub use imdb::ImdbSuggestIndex;
pub use letterboxd::LetterboxdLists;
pub use plex::PlexLibrary;
pub use radarr::RadarrClient;
pub use traits::{AcquisitionService, LibraryService, ListProvider, ReferenceIndex};
