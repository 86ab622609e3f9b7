//! # genbank-dl
//!
//! Resumable fetcher and organism filter for GenBank flat-file releases.
//!
//! ## Design Philosophy
//!
//! genbank-dl is designed to be:
//! - **Resumable** - Archives already on disk are never fetched twice
//! - **Streaming** - Archives are decompressed and filtered record by record
//! - **Library-first** - Every stage is usable on its own; the binary is a thin wrapper
//! - **Injectable** - Listing, fetch tool and record codec sit behind traits
//!
//! ## Pipeline
//!
//! ```text
//! listing text -> ArchivePattern -> Manifest -> FetchStage -> *.seq.gz
//!                                                              |
//!                          *.seq.sel.gz <- FilterStage <-------+
//! ```
//!
//! Both stages run their per-archive work through a [`TaskDispatcher`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use genbank_dl::{Config, Pipeline};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         prefix: "gbbct".to_string(),
//!         exclude_list: vec!["Escherichia coli".to_string()],
//!         ..Default::default()
//!     };
//!
//!     let report = Pipeline::new(config)?.run().await?;
//!     println!("selected {} records", report.filter.total_matched());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Include/exclude record classification
pub mod classify;
/// Flat-file record codec and block-compressed I/O
pub mod codec;
/// Configuration types
pub mod config;
/// Concurrent task dispatch
pub mod dispatch;
/// Error types
pub mod error;
/// Fetch stage and fetch tools
pub mod fetch;
/// Filter stage
pub mod filter;
/// Remote release listing
pub mod listing;
/// Archive names and ordering
pub mod manifest;
/// End-to-end pipeline
pub mod pipeline;

// Re-export commonly used types
pub use classify::{Classification, ClassificationRule};
pub use codec::{FlatFileCodec, Record, RecordCodec};
pub use config::{Config, RemoteConfig};
pub use dispatch::{ExecutionStrategy, ProgressState, TaskDispatcher, spread};
pub use error::{Error, FetchError, FilterError, ListingError, Result};
pub use fetch::{FetchOutcome, FetchReport, FetchStage, FetchTool, TransferStatus, WgetFetchTool};
pub use filter::{FileSelection, FilterJob, FilterReport, FilterStage, SelectionResult};
pub use listing::{HttpListingProvider, ListingProvider, StaticListing};
pub use manifest::{ArchivePattern, FileManifestEntry, Manifest};
pub use pipeline::{Pipeline, PipelineReport};
