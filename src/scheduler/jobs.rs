use std::{fmt, str::FromStr, sync::Arc, time::Instant};

use anyhow::Result;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    clients::discord::{COLOR_FAILURE, Embed, Notifier, WebhookChannel, WebhookMessage},
    oauth::TokenManager,
    observability::metrics::Metrics,
    pipeline::{PipelineOrchestrator, report::ErrorLog},
};

/// Tasks that can be triggered by the daemons or the admin endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    CheckOauthToken,
    FetchAndCurate,
}

impl TaskKind {
    pub const ALL: [Self; 2] = [Self::CheckOauthToken, Self::FetchAndCurate];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CheckOauthToken => "check_oauth_token",
            Self::FetchAndCurate => "fetch_and_curate",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown task: {0}")]
pub struct UnknownTask(pub String);

impl FromStr for TaskKind {
    type Err = UnknownTask;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|task| task.as_str() == raw)
            .ok_or_else(|| UnknownTask(raw.to_string()))
    }
}

/// State of a single task execution.
#[derive(Debug)]
pub(crate) struct RunContext {
    pub(crate) run_id: Uuid,
    pub(crate) task: TaskKind,
    pub(crate) error_log: ErrorLog,
}

impl RunContext {
    pub(crate) fn new(task: TaskKind) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            task,
            error_log: ErrorLog::new(),
        }
    }
}

#[derive(Clone)]
pub struct Scheduler {
    pipeline: Arc<PipelineOrchestrator>,
    tokens: Arc<TokenManager>,
    notifier: Arc<dyn Notifier>,
    metrics: Arc<Metrics>,
}

impl Scheduler {
    pub(crate) fn new(
        pipeline: Arc<PipelineOrchestrator>,
        tokens: Arc<TokenManager>,
        notifier: Arc<dyn Notifier>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            pipeline,
            tokens,
            notifier,
            metrics,
        }
    }

    /// Runs `task` with a fresh [`RunContext`].
    ///
    /// The error summary is flushed to the admin webhook whether or not the
    /// task succeeds; a failure additionally posts a failure embed and is
    /// returned to the caller.
    pub(crate) async fn run_task(&self, task: TaskKind) -> Result<()> {
        let mut run = RunContext::new(task);
        let started = Instant::now();
        info!(run_id = %run.run_id, %task, "running task");

        let result = match task {
            TaskKind::CheckOauthToken => self.tokens.check_token().await.map(|status| {
                info!(run_id = %run.run_id, ?status, "oauth token checked");
            }),
            TaskKind::FetchAndCurate => self.pipeline.execute(&mut run).await.map(|outcome| {
                info!(
                    run_id = %run.run_id,
                    fetched = outcome.fetch.fetched,
                    stored = outcome.fetch.stored,
                    skipped = outcome.fetch.skipped,
                    picked = outcome.selection.total(),
                    inserted = outcome.publish.inserted(),
                    failed_inserts = outcome.publish.failed_inserts,
                    "curate outcome"
                );
            }),
        };

        if let Some(summary) = run.error_log.take_summary() {
            self.notify(WebhookChannel::Admin, summary).await;
        }

        match result {
            Ok(()) => {
                self.metrics.runs_completed.inc();
                info!(
                    run_id = %run.run_id,
                    %task,
                    elapsed_ms = started.elapsed().as_millis(),
                    "task completed"
                );
                Ok(())
            }
            Err(err) => {
                self.metrics.runs_failed.inc();
                error!(run_id = %run.run_id, %task, error = %format!("{err:#}"), "task failed");
                let embed = Embed::new(
                    format!("Task Failed: {}", run.task),
                    format!("{err:#}"),
                    COLOR_FAILURE,
                )
                .field("Run ID", run.run_id.to_string());
                self.notify(WebhookChannel::Admin, embed).await;
                Err(err)
            }
        }
    }

    async fn notify(&self, channel: WebhookChannel, embed: Embed) {
        if let Err(err) = self
            .notifier
            .send(channel, WebhookMessage::embed(embed))
            .await
        {
            warn!(error = %format!("{err:#}"), "failed to send task notification");
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use rstest::rstest;

    use super::*;
    use crate::{
        clients::discord::tests::RecordingNotifier,
        observability::Telemetry,
        pipeline::{
            fetch::{FetchStage, FetchSummary},
            publish::SkipPublishStage,
            select::{SelectionPolicy, WeightedSelectStage},
        },
        store::{MemorySongStore, SongStore},
    };

    #[rstest]
    #[case("check_oauth_token", TaskKind::CheckOauthToken)]
    #[case("fetch_and_curate", TaskKind::FetchAndCurate)]
    fn task_names_round_trip(#[case] raw: &str, #[case] expected: TaskKind) {
        let parsed: TaskKind = raw.parse().expect("known task");
        assert_eq!(parsed, expected);
        assert_eq!(parsed.to_string(), raw);
    }

    #[test]
    fn unknown_task_is_rejected() {
        let err = "reticulate_splines".parse::<TaskKind>().expect_err("unknown");
        assert_eq!(err, UnknownTask("reticulate_splines".to_string()));
    }

    struct FlakyFetch {
        fail: bool,
    }

    #[async_trait]
    impl FetchStage for FlakyFetch {
        async fn fetch(&self, run: &mut RunContext) -> Result<FetchSummary> {
            run.error_log.record("statistics lookup failed for 50 original songs");
            if self.fail {
                anyhow::bail!("holodex unavailable");
            }
            Ok(FetchSummary::default())
        }
    }

    fn scheduler(fail: bool) -> (Scheduler, Arc<RecordingNotifier>, Arc<Metrics>) {
        let store: Arc<dyn SongStore> = Arc::new(MemorySongStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let metrics = Telemetry::without_tracing()
            .expect("metrics register")
            .metrics_arc();
        let pipeline = PipelineOrchestrator::builder()
            .with_fetch_stage(Arc::new(FlakyFetch { fail }))
            .with_select_stage(Arc::new(WeightedSelectStage::new(SelectionPolicy::default())))
            .with_publish_stage(Arc::new(SkipPublishStage))
            .build(Arc::clone(&store), Arc::clone(&metrics))
            .expect("stages configured");
        let tokens = Arc::new(TokenManager::new(
            store,
            None,
            Arc::clone(&notifier) as Arc<dyn Notifier>,
        ));
        let scheduler = Scheduler::new(
            Arc::new(pipeline),
            tokens,
            Arc::clone(&notifier) as Arc<dyn Notifier>,
            Arc::clone(&metrics),
        );
        (scheduler, notifier, metrics)
    }

    #[tokio::test]
    async fn successful_run_flushes_error_summary() {
        let (scheduler, notifier, metrics) = scheduler(false);

        scheduler
            .run_task(TaskKind::FetchAndCurate)
            .await
            .expect("run succeeds");

        assert_eq!(notifier.titles(WebhookChannel::Admin), ["Error Summary"]);
        assert!((metrics.runs_completed.get() - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn failed_run_reports_summary_and_failure() {
        let (scheduler, notifier, metrics) = scheduler(true);

        let err = scheduler
            .run_task(TaskKind::FetchAndCurate)
            .await
            .expect_err("run fails");

        assert!(format!("{err:#}").contains("holodex unavailable"));
        assert_eq!(
            notifier.titles(WebhookChannel::Admin),
            ["Error Summary", "Task Failed: fetch_and_curate"]
        );
        assert!((metrics.runs_failed.get() - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn oauth_check_without_client_fails() {
        let (scheduler, notifier, _) = scheduler(false);

        let result = scheduler.run_task(TaskKind::CheckOauthToken).await;

        assert!(result.is_err());
        assert_eq!(
            notifier.titles(WebhookChannel::Admin),
            ["Task Failed: check_oauth_token"]
        );
    }
}
