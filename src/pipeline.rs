use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info};

use crate::{observability::metrics::Metrics, scheduler::RunContext, store::SongStore};

pub(crate) mod fetch;
pub(crate) mod publish;
pub(crate) mod report;
pub mod select;

use fetch::{FetchStage, FetchSummary};
use publish::{PublishStage, PublishSummary};
use select::{CuratedSelection, SelectStage};

/// Result of one fetch → select → publish run.
#[derive(Debug, Clone)]
pub(crate) struct CurateOutcome {
    pub(crate) fetch: FetchSummary,
    pub(crate) selection: CuratedSelection,
    pub(crate) publish: PublishSummary,
}

pub(crate) struct PipelineOrchestrator {
    stages: PipelineStages,
    store: Arc<dyn SongStore>,
    metrics: Arc<Metrics>,
    dump_path: Option<PathBuf>,
}

struct PipelineStages {
    fetch: Arc<dyn FetchStage>,
    select: Arc<dyn SelectStage>,
    publish: Arc<dyn PublishStage>,
}

pub(crate) struct PipelineBuilder {
    fetch: Option<Arc<dyn FetchStage>>,
    select: Option<Arc<dyn SelectStage>>,
    publish: Option<Arc<dyn PublishStage>>,
    dump_path: Option<PathBuf>,
}

impl PipelineOrchestrator {
    pub(crate) fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Refreshes the song table, picks from everything stored and rewrites
    /// the playlists.
    ///
    /// Partial failures inside a stage land in the run's error log; a stage
    /// error aborts the run.
    pub(crate) async fn execute(&self, run: &mut RunContext) -> Result<CurateOutcome> {
        let started = Instant::now();
        debug!(run_id = %run.run_id, "curate pipeline started");

        let fetch = self.stages.fetch.fetch(run).await.context("fetch stage failed")?;

        let songs = self
            .store
            .scan_songs()
            .await
            .context("failed to load stored songs")?;
        debug!(run_id = %run.run_id, stored = songs.len(), "loaded stored songs");

        let selection = self
            .stages
            .select
            .select(run, songs)
            .await
            .context("select stage failed")?;
        self.metrics.songs_picked.inc_by(selection.total() as f64);

        if let Some(path) = &self.dump_path {
            dump_selection(path, &selection).await?;
            info!(run_id = %run.run_id, path = %path.display(), "wrote picked songs");
        }

        let publish = self
            .stages
            .publish
            .publish(run, &selection)
            .await
            .context("publish stage failed")?;

        self.metrics
            .run_duration
            .observe(started.elapsed().as_secs_f64());
        info!(
            run_id = %run.run_id,
            errors = run.error_log.len(),
            elapsed_ms = started.elapsed().as_millis(),
            "curate pipeline completed"
        );

        Ok(CurateOutcome {
            fetch,
            selection,
            publish,
        })
    }
}

async fn dump_selection(path: &Path, selection: &CuratedSelection) -> Result<()> {
    let body = serde_json::to_vec_pretty(selection).context("failed to serialize picked songs")?;
    tokio::fs::write(path, body)
        .await
        .with_context(|| format!("failed to write picked songs to {}", path.display()))
}

impl PipelineBuilder {
    pub(crate) fn new() -> Self {
        Self {
            fetch: None,
            select: None,
            publish: None,
            dump_path: None,
        }
    }

    pub(crate) fn with_fetch_stage(mut self, stage: Arc<dyn FetchStage>) -> Self {
        self.fetch = Some(stage);
        self
    }

    pub(crate) fn with_select_stage(mut self, stage: Arc<dyn SelectStage>) -> Self {
        self.select = Some(stage);
        self
    }

    pub(crate) fn with_publish_stage(mut self, stage: Arc<dyn PublishStage>) -> Self {
        self.publish = Some(stage);
        self
    }

    pub(crate) fn with_dump_path(mut self, path: Option<PathBuf>) -> Self {
        self.dump_path = path;
        self
    }

    /// # Errors
    /// Fails when a stage was not configured.
    pub(crate) fn build(
        self,
        store: Arc<dyn SongStore>,
        metrics: Arc<Metrics>,
    ) -> Result<PipelineOrchestrator> {
        let stages = PipelineStages {
            fetch: self
                .fetch
                .ok_or_else(|| anyhow!("fetch stage must be configured before build"))?,
            select: self
                .select
                .ok_or_else(|| anyhow!("select stage must be configured before build"))?,
            publish: self
                .publish
                .ok_or_else(|| anyhow!("publish stage must be configured before build"))?,
        };

        Ok(PipelineOrchestrator {
            stages,
            store,
            metrics,
            dump_path: self.dump_path,
        })
    }
}
