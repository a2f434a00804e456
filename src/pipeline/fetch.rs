use std::{collections::HashMap, sync::Arc, time::Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use tracing::{debug, info, warn};

use crate::{
    clients::{
        holodex::{HolodexClient, HolodexVideo, VideoQuery},
        youtube::{VideoStatistics, YouTubeClient},
    },
    config::FetchMode,
    observability::metrics::Metrics,
    pipeline::select::{OAUTH_TOKEN_KEY, Song, SongCategory},
    scheduler::RunContext,
    store::SongStore,
};

/// Upper bound (exclusive) of synthesised view and like counts.
const SYNTHETIC_STATS_CEILING: u64 = 1_000_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct FetchSummary {
    pub(crate) fetched: usize,
    pub(crate) stored: usize,
    pub(crate) skipped: usize,
}

#[async_trait]
pub(crate) trait FetchStage: Send + Sync {
    async fn fetch(&self, run: &mut RunContext) -> Result<FetchSummary>;
}

/// Where view counts come from.
#[derive(Clone)]
pub(crate) enum StatsSource {
    YouTube(Arc<YouTubeClient>),
    /// Random counts for dry runs that must not spend API quota.
    Synthetic,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct FetchSettings {
    pub(crate) mode: FetchMode,
    pub(crate) window_days: u32,
    pub(crate) min_age_days: u32,
    pub(crate) stats_batch_size: usize,
    pub(crate) filter_instrumental: bool,
}

/// Pulls songs from Holodex, enriches them with YouTube statistics and
/// upserts them into the song store.
pub(crate) struct HolodexFetchStage {
    holodex: Arc<HolodexClient>,
    stats: StatsSource,
    store: Arc<dyn SongStore>,
    metrics: Arc<Metrics>,
    settings: FetchSettings,
}

impl HolodexFetchStage {
    pub(crate) fn new(
        holodex: Arc<HolodexClient>,
        stats: StatsSource,
        store: Arc<dyn SongStore>,
        metrics: Arc<Metrics>,
        settings: FetchSettings,
    ) -> Self {
        Self {
            holodex,
            stats,
            store,
            metrics,
            settings,
        }
    }

    fn query(&self, category: SongCategory, now: DateTime<Utc>) -> VideoQuery {
        let from = match self.settings.mode {
            FetchMode::Incremental => {
                Some(now - Duration::days(i64::from(self.settings.window_days)))
            }
            FetchMode::Full => None,
        };
        VideoQuery { category, from }
    }

    async fn lookup_stats(&self, ids: &[String]) -> Result<HashMap<String, VideoStatistics>> {
        match &self.stats {
            StatsSource::YouTube(client) => client.video_statistics(ids).await,
            StatsSource::Synthetic => Ok(synthetic_statistics(ids)),
        }
    }

    /// Enriches and stores one category; failures of single batches are
    /// recorded and skipped.
    async fn process_category(
        &self,
        run: &mut RunContext,
        category: SongCategory,
        videos: Vec<HolodexVideo>,
        now: DateTime<Utc>,
    ) -> FetchSummary {
        let mut summary = FetchSummary {
            fetched: videos.len(),
            ..FetchSummary::default()
        };

        let cutoff = now - Duration::days(i64::from(self.settings.min_age_days));
        let (mature, young): (Vec<_>, Vec<_>) = videos
            .into_iter()
            .partition(|video| is_old_enough(video, cutoff));
        summary.skipped += young.len();

        let batch_size = self.settings.stats_batch_size.max(1);
        let total_batches = mature.len().div_ceil(batch_size);

        for (index, batch) in mature.chunks(batch_size).enumerate() {
            let ids: Vec<String> = batch.iter().map(|video| video.id.clone()).collect();
            let stats = match self.lookup_stats(&ids).await {
                Ok(stats) => stats,
                Err(error) => {
                    self.metrics.stats_batches_failed.inc();
                    summary.skipped += batch.len();
                    run.error_log.record(format!(
                        "statistics lookup failed for {} {} songs: {error:#}",
                        batch.len(),
                        category.as_str()
                    ));
                    continue;
                }
            };

            let mut songs = Vec::with_capacity(batch.len());
            for video in batch {
                match stats.get(&video.id) {
                    Some(video_stats) => {
                        songs.push(song_from_video(video.clone(), category, video_stats, now));
                    }
                    None => {
                        warn!(video_id = %video.id, "no YouTube statistics found for video");
                        summary.skipped += 1;
                    }
                }
            }

            match self.store.put_songs(&songs).await {
                Ok(stored) => summary.stored += stored,
                Err(error) => {
                    summary.skipped += songs.len();
                    run.error_log.record(format!(
                        "failed to store {} {} songs: {error:#}",
                        songs.len(),
                        category.as_str()
                    ));
                }
            }

            debug!(
                run_id = %run.run_id,
                category = category.as_str(),
                batch = index + 1,
                total_batches,
                "processed song batch"
            );
        }

        summary
    }
}

#[async_trait]
impl FetchStage for HolodexFetchStage {
    async fn fetch(&self, run: &mut RunContext) -> Result<FetchSummary> {
        let started = Instant::now();
        let now = Utc::now();

        if self.settings.mode == FetchMode::Full {
            let purged = self
                .store
                .purge(&[OAUTH_TOKEN_KEY])
                .await
                .context("failed to purge song table")?;
            info!(run_id = %run.run_id, purged, "purged stored songs before full fetch");
        }

        let (originals, covers) = tokio::try_join!(
            self.holodex.fetch_all(self.query(SongCategory::Original, now)),
            self.holodex.fetch_all(self.query(SongCategory::Cover, now)),
        )
        .context("failed to fetch songs from holodex")?;

        let mut summary = FetchSummary::default();
        for (category, videos) in [
            (SongCategory::Original, originals),
            (SongCategory::Cover, covers),
        ] {
            let before = videos.len();
            let videos = filter_titles(videos, self.settings.filter_instrumental);
            let filtered = before - videos.len();

            let part = self.process_category(run, category, videos, now).await;
            summary.fetched += before;
            summary.stored += part.stored;
            summary.skipped += part.skipped + filtered;
        }

        self.metrics.songs_fetched.inc_by(summary.fetched as f64);
        self.metrics.songs_stored.inc_by(summary.stored as f64);
        self.metrics.songs_skipped.inc_by(summary.skipped as f64);
        self.metrics
            .fetch_duration
            .observe(started.elapsed().as_secs_f64());

        info!(
            run_id = %run.run_id,
            mode = ?self.settings.mode,
            fetched = summary.fetched,
            stored = summary.stored,
            skipped = summary.skipped,
            "completed song fetch"
        );
        Ok(summary)
    }
}

/// Drops instrumental uploads when `filter_instrumental` is set.
pub(crate) fn filter_titles(videos: Vec<HolodexVideo>, filter_instrumental: bool) -> Vec<HolodexVideo> {
    if !filter_instrumental {
        return videos;
    }
    videos
        .into_iter()
        .filter(|video| !video.title.to_lowercase().contains("instrumental"))
        .collect()
}

fn is_old_enough(video: &HolodexVideo, cutoff: DateTime<Utc>) -> bool {
    video
        .published_at
        .or(video.available_at)
        .is_some_and(|published| published <= cutoff)
}

fn synthetic_statistics(ids: &[String]) -> HashMap<String, VideoStatistics> {
    let mut rng = rand::rng();
    ids.iter()
        .map(|id| {
            let stats = VideoStatistics {
                view_count: rng.random_range(0..SYNTHETIC_STATS_CEILING).to_string(),
                like_count: rng.random_range(0..SYNTHETIC_STATS_CEILING).to_string(),
            };
            (id.clone(), stats)
        })
        .collect()
}

pub(crate) fn song_from_video(
    video: HolodexVideo,
    category: SongCategory,
    stats: &VideoStatistics,
    now: DateTime<Utc>,
) -> Song {
    let thumbnail_url = format!("https://img.youtube.com/vi/{}/0.jpg", video.id);
    Song {
        id: video.id,
        title: video.title,
        channel_id: video.channel_id,
        channel: video.channel.strip_suborg_sort_key(),
        published_at: video.published_at,
        available_at: video.available_at,
        song_type: category,
        duration: video.duration,
        status: video.status,
        youtube_view_count: stats.view_count.clone(),
        youtube_like_count: stats.like_count.clone(),
        processed_at: now,
        mentions: video.mentions.unwrap_or_default(),
        thumbnail_url,
    }
}
