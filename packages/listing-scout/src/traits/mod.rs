//! Trait seams for the collaborators the pipeline drives.

pub mod fetcher;
pub mod model;
pub mod searcher;
pub mod store;
