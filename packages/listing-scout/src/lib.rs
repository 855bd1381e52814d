//! Listing Scout
//!
//! Compares two items and finds local marketplace listings for each. A
//! session runs three dependent stages against one analysis backend and
//! falls back to the next backend, restarting from the first stage, when a
//! backend fails. The deterministic backend at the end of the chain never
//! fails, so every session produces a result.
//!
//! # Usage
//!
//! ```rust,ignore
//! use listing_scout::{Pipeline, ScoutConfig};
//!
//! let pipeline = Pipeline::from_config(ScoutConfig::from_env()?)?;
//! let outcome = pipeline.run("Toyota Aqua", "Honda Fit").await?;
//!
//! println!("{} via {}", outcome.report, outcome.backend);
//! for record in &outcome.subject_a_records {
//!     println!("{} {} {}", record.title, record.price, record.link);
//! }
//! ```
//!
//! # Modules
//!
//! - [`pipeline`] - Session orchestration and fallback
//! - [`selector`] - Backend selection from configuration
//! - [`backends`] - OpenAI, Gemini and deterministic backends
//! - [`discovery`] - Candidate URL discovery through web search
//! - [`sites`] - Supported marketplaces and URL classification
//! - [`extract`] - Field extraction from detail pages
//! - [`normalize`] - Price, mileage and year normalization
//! - [`stores`] - Storage implementations (MemoryStore, SqliteStore)
//! - [`stats`] - Filtering and price statistics
//! - [`testing`] - Mock implementations for testing

pub mod backends;
pub mod config;
pub mod discovery;
pub mod error;
pub mod extract;
pub mod fetchers;
pub mod normalize;
pub mod pipeline;
pub mod report;
pub mod security;
pub mod selector;
pub mod sites;
pub mod stats;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;

pub use config::{PipelineSettings, ScoutConfig, SearchSettings};
pub use error::{BackendError, FetchError, Result, ScoutError, StoreError, ValidationError};
pub use pipeline::{validate_subject, Pipeline};
pub use selector::{select_backend, BackendSelector};

pub use backends::{AnalysisBackend, BackendFactory, DefaultBackendFactory};
pub use discovery::ListingDiscoverer;
pub use extract::DetailExtractor;
pub use sites::{canonicalize, SiteProfile, SiteSet, UrlClass};
pub use stats::{filter_and_summarize, summarize, ListingFilter, ListingStats};

pub use traits::{
    fetcher::{FetchedPage, PageFetcher},
    model::LanguageModel,
    searcher::{MockWebSearcher, SearchResult, SerperWebSearcher, TavilyWebSearcher, WebSearcher},
    store::{ListingStore, ReportStore, ScoutStore, UpsertOutcome},
};
pub use types::{
    listing::{ListingCandidate, ListingFields, ListingRecord},
    report::{AnalysisOutcome, BackendTransition, ComparisonReport},
    session::{AnalysisSession, BackendKind, SessionState},
};

// Re-export stores
pub use stores::MemoryStore;

#[cfg(feature = "sqlite")]
pub use stores::SqliteStore;

// Re-export fetchers
pub use fetchers::{HttpFetcher, RateLimitExt, RateLimitedFetcher};

// Re-export testing utilities
pub use testing::{MockLanguageModel, MockPageFetcher, ScriptedBackendFactory};
