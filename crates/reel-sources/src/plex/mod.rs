pub mod api;
mod client;

pub use api::{LibraryInfo, PlexHttpClient};
pub use client::PlexLibrary;
