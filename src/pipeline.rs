//! End-to-end driver: listing, fetch, filter

use crate::codec::{FlatFileCodec, RecordCodec};
use crate::config::Config;
use crate::dispatch::TaskDispatcher;
use crate::error::{FetchError, Result};
use crate::fetch::{FetchReport, FetchStage, FetchTool, WgetFetchTool};
use crate::filter::{FilterJob, FilterReport, FilterStage};
use crate::listing::{HttpListingProvider, ListingProvider};
use crate::manifest::{ArchivePattern, Manifest};
use serde::Serialize;
use std::sync::Arc;

/// Reports of a full run
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineReport {
    /// Fetch stage totals
    pub fetch: FetchReport,
    /// Filter stage totals
    pub filter: FilterReport,
}

/// Fetches one archive family and filters it, as configured
pub struct Pipeline {
    config: Config,
    pattern: ArchivePattern,
    listing: Arc<dyn ListingProvider>,
    fetch_tool: Option<Arc<dyn FetchTool>>,
    codec: Arc<dyn RecordCodec>,
    show_progress: bool,
}

impl Pipeline {
    /// Build a pipeline using HTTP listing, `wget` and the GenBank codec
    ///
    /// A missing `wget` is only an error once [`Pipeline::fetch`] runs, so
    /// filtering already downloaded archives works without it.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let listing = HttpListingProvider::new(
            config.remote.base_url.clone(),
            config.remote.listing_timeout(),
        )?;
        let fetch_tool = match &config.remote.fetch_tool {
            Some(path) => Some(WgetFetchTool::new(path.clone())),
            None => WgetFetchTool::from_path(),
        };
        if fetch_tool.is_none() {
            tracing::debug!("wget not found in PATH; fetching is unavailable");
        }

        Self::build(
            config,
            Arc::new(listing),
            fetch_tool.map(|tool| Arc::new(tool) as Arc<dyn FetchTool>),
            Arc::new(FlatFileCodec),
        )
    }

    /// Build a pipeline from explicit collaborators
    pub fn with_components(
        config: Config,
        listing: Arc<dyn ListingProvider>,
        fetch_tool: Arc<dyn FetchTool>,
        codec: Arc<dyn RecordCodec>,
    ) -> Result<Self> {
        Self::build(config, listing, Some(fetch_tool), codec)
    }

    fn build(
        config: Config,
        listing: Arc<dyn ListingProvider>,
        fetch_tool: Option<Arc<dyn FetchTool>>,
        codec: Arc<dyn RecordCodec>,
    ) -> Result<Self> {
        config.validate()?;
        let pattern = ArchivePattern::new(&config.remote.archive_suffix)?;
        Ok(Self {
            config,
            pattern,
            listing,
            fetch_tool,
            codec,
            show_progress: true,
        })
    }

    /// Draw progress bars on stderr (default) or keep them hidden
    pub fn with_progress_display(mut self, visible: bool) -> Self {
        self.show_progress = visible;
        self
    }

    /// The active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    fn dispatcher(&self, label: &str) -> Result<TaskDispatcher> {
        Ok(TaskDispatcher::new(self.config.concurrency)?
            .with_label(label)
            .with_progress_display(self.show_progress))
    }

    /// Derive the manifest for the configured prefix from the remote listing
    pub async fn manifest(&self) -> Result<Manifest> {
        let listing = self.listing.fetch_listing().await?;
        let manifest = Manifest::build(
            &self.pattern,
            &self.config.prefix,
            &listing,
            &self.config.release_path(),
        );
        tracing::info!(prefix = %self.config.prefix, files = manifest.len(), "release manifest built");
        Ok(manifest)
    }

    /// Download every archive of the configured prefix that is not present yet
    pub async fn fetch(&self) -> Result<FetchReport> {
        let tool = self
            .fetch_tool
            .clone()
            .ok_or_else(|| FetchError::ToolNotFound("wget".to_string()))?;
        let manifest = self.manifest().await?;
        let stage = FetchStage::new(
            tool,
            self.config.remote.base_url.clone(),
            self.dispatcher("fetch")?,
        );
        stage
            .run(&manifest.identifiers(), &self.config.release_path())
            .await
    }

    /// Filter every local archive of the release directory
    pub async fn filter(&self) -> Result<FilterReport> {
        tracing::info!(include = %self.config.include_list.join(", "), "include");
        tracing::info!(exclude = %self.config.exclude_list.join(", "), "exclude");

        let job = FilterJob::new(
            Arc::clone(&self.codec),
            self.config.classification_rule(),
            self.config.save_path(),
            self.config.dry_run,
        );
        let stage = FilterStage::new(self.pattern.clone(), self.dispatcher("filter")?);
        stage.run_dir(&self.config.release_path(), job).await
    }

    /// Fetch, then filter
    pub async fn run(&self) -> Result<PipelineReport> {
        let fetch = self.fetch().await?;
        let filter = self.filter().await?;
        Ok(PipelineReport { fetch, filter })
    }
}
