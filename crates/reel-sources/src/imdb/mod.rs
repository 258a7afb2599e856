mod suggest;

pub use suggest::ImdbSuggestIndex;
