use std::{sync::Arc, time::Duration, time::Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::{
    clients::{
        discord::{COLOR_SUCCESS, Embed, Notifier, WebhookChannel, WebhookMessage},
        youtube::YouTubeClient,
    },
    oauth::TokenManager,
    observability::metrics::Metrics,
    pipeline::select::{Cohort, CuratedSelection, Song, SongCategory},
    scheduler::RunContext,
    util::error::is_fatal,
};

/// Playlists are updated in this order.
pub(crate) const PLAYLIST_ORDER: [(Cohort, SongCategory); 4] = [
    (Cohort::Secondary, SongCategory::Original),
    (Cohort::Secondary, SongCategory::Cover),
    (Cohort::Primary, SongCategory::Original),
    (Cohort::Primary, SongCategory::Cover),
];

pub(crate) fn playlist_title(cohort: Cohort, category: SongCategory) -> String {
    let label = match category {
        SongCategory::Original => "Original",
        SongCategory::Cover => "Cover",
    };
    format!("{} {label} Songs Picks", cohort.display_name())
}

fn playlist_description(cohort: Cohort, category: SongCategory) -> String {
    format!(
        "Automatically picked {} songs from {} members",
        category.as_str(),
        cohort.display_name()
    )
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct PublishSummary {
    /// (playlist title, inserted songs) per updated playlist.
    pub(crate) playlists: Vec<(String, usize)>,
    pub(crate) failed_inserts: usize,
}

impl PublishSummary {
    pub(crate) fn inserted(&self) -> usize {
        self.playlists.iter().map(|(_, count)| count).sum()
    }
}

#[async_trait]
pub(crate) trait PublishStage: Send + Sync {
    async fn publish(
        &self,
        run: &mut RunContext,
        selection: &CuratedSelection,
    ) -> Result<PublishSummary>;
}

/// Used when playlist writes are turned off.
pub(crate) struct SkipPublishStage;

#[async_trait]
impl PublishStage for SkipPublishStage {
    async fn publish(
        &self,
        run: &mut RunContext,
        selection: &CuratedSelection,
    ) -> Result<PublishSummary> {
        debug!(
            run_id = %run.run_id,
            picked = selection.total(),
            "skipping playlist publishing"
        );
        Ok(PublishSummary::default())
    }
}

/// Rewrites the four pick playlists on the authenticated YouTube channel.
pub(crate) struct YouTubePublishStage {
    youtube: Arc<YouTubeClient>,
    tokens: Arc<TokenManager>,
    notifier: Arc<dyn Notifier>,
    metrics: Arc<Metrics>,
    pick_count: usize,
    insert_delay: Duration,
}

impl YouTubePublishStage {
    pub(crate) fn new(
        youtube: Arc<YouTubeClient>,
        tokens: Arc<TokenManager>,
        notifier: Arc<dyn Notifier>,
        metrics: Arc<Metrics>,
        pick_count: usize,
        insert_delay: Duration,
    ) -> Self {
        Self {
            youtube,
            tokens,
            notifier,
            metrics,
            pick_count,
            insert_delay,
        }
    }

    /// Returns the id of an emptied playlist with the given title, creating
    /// it when the channel has none.
    async fn ensure_playlist(&self, token: &str, title: &str, description: &str) -> Result<String> {
        let existing = self
            .youtube
            .list_playlists(token)
            .await?
            .into_iter()
            .find(|playlist| playlist.snippet.title == title);

        if let Some(playlist) = existing {
            let removed = self.youtube.clear_playlist(token, &playlist.id).await?;
            debug!(playlist_id = %playlist.id, title, removed, "reusing existing playlist");
            return Ok(playlist.id);
        }

        let id = self
            .youtube
            .create_playlist(token, title, description)
            .await?;
        info!(playlist_id = %id, title, "created playlist");
        Ok(id)
    }

    /// Inserts candidates in order until `pick_count` succeed. Failed
    /// insertions fall through to the next candidate.
    ///
    /// # Errors
    /// Authentication failures abort the remaining insertions.
    async fn fill_playlist(
        &self,
        run: &mut RunContext,
        token: &str,
        playlist_id: &str,
        candidates: &[Song],
    ) -> Result<(usize, usize)> {
        let mut inserted = 0;
        let mut failed = 0;

        for song in candidates {
            if inserted >= self.pick_count {
                break;
            }
            if inserted + failed > 0 && !self.insert_delay.is_zero() {
                tokio::time::sleep(self.insert_delay).await;
            }

            match self
                .youtube
                .insert_playlist_item(token, playlist_id, &song.id)
                .await
            {
                Ok(()) => {
                    inserted += 1;
                    self.metrics.playlist_inserts_ok.inc();
                }
                Err(error) => {
                    self.metrics.playlist_inserts_failed.inc();
                    if is_fatal(&error) {
                        return Err(error.context(format!(
                            "failed to insert {} into playlist {playlist_id}",
                            song.id
                        )));
                    }
                    failed += 1;
                    warn!(song_id = %song.id, playlist_id, error = %format!("{error:#}"), "playlist insertion failed");
                    run.error_log.record(format!(
                        "failed to insert {} into playlist {playlist_id}: {error:#}",
                        song.id
                    ));
                }
            }
        }

        Ok((inserted, failed))
    }

    async fn notify_complete(&self, title: &str, inserted: usize) {
        let embed = Embed::new(
            "Playlist Update Complete",
            format!("Successfully updated playlist \"{title}\" with {inserted} songs."),
            COLOR_SUCCESS,
        );
        if let Err(error) = self
            .notifier
            .send(WebhookChannel::Notification, WebhookMessage::embed(embed))
            .await
        {
            warn!(title, error = %format!("{error:#}"), "failed to send playlist notification");
        }
    }
}

#[async_trait]
impl PublishStage for YouTubePublishStage {
    async fn publish(
        &self,
        run: &mut RunContext,
        selection: &CuratedSelection,
    ) -> Result<PublishSummary> {
        let started = Instant::now();
        let token = self
            .tokens
            .valid_access_token()
            .await
            .context("no usable YouTube access token")?;

        let mut summary = PublishSummary::default();
        for (cohort, category) in PLAYLIST_ORDER {
            let candidates = selection.cohort(cohort).get(category);
            let title = playlist_title(cohort, category);
            if candidates.is_empty() {
                debug!(run_id = %run.run_id, title, "no picks, skipping playlist");
                continue;
            }

            let description = playlist_description(cohort, category);
            let playlist_id = match self.ensure_playlist(&token, &title, &description).await {
                Ok(id) => id,
                Err(error) if is_fatal(&error) => {
                    return Err(error.context(format!("failed to prepare playlist {title}")));
                }
                Err(error) => {
                    run.error_log
                        .record(format!("failed to prepare playlist {title}: {error:#}"));
                    continue;
                }
            };

            let (inserted, failed) = self
                .fill_playlist(run, &token, &playlist_id, candidates)
                .await?;
            info!(
                run_id = %run.run_id,
                title,
                playlist_id,
                inserted,
                failed,
                "updated playlist"
            );
            self.notify_complete(&title, inserted).await;
            summary.failed_inserts += failed;
            summary.playlists.push((title, inserted));
        }

        self.metrics
            .publish_duration
            .observe(started.elapsed().as_secs_f64());
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::{
        clients::{discord::tests::RecordingNotifier, youtube::YouTubeConfig},
        observability::Telemetry,
        pipeline::select::{
            CategoryBuckets,
            test_support::{girl_song, star_song},
        },
        scheduler::TaskKind,
        store::{MemorySongStore, OAuthTokenRecord, SongStore},
    };

    #[test]
    fn titles_follow_roster_and_category() {
        let titles: Vec<String> = PLAYLIST_ORDER
            .iter()
            .map(|(cohort, category)| playlist_title(*cohort, *category))
            .collect();

        assert_eq!(
            titles,
            [
                "Holostars Original Songs Picks",
                "Holostars Cover Songs Picks",
                "Hololive Original Songs Picks",
                "Hololive Cover Songs Picks",
            ]
        );
        assert_eq!(
            playlist_description(Cohort::Primary, SongCategory::Cover),
            "Automatically picked cover songs from Hololive members"
        );
    }

    async fn stage_for(
        server: &MockServer,
        pick_count: usize,
    ) -> (YouTubePublishStage, Arc<RecordingNotifier>) {
        let store = Arc::new(MemorySongStore::new());
        store
            .put_token(&OAuthTokenRecord {
                access_token: "access".to_string(),
                refresh_token: Some("refresh".to_string()),
                expiry_date: Utc::now().timestamp_millis() + 3_600_000,
                token_type: Some("Bearer".to_string()),
                scope: None,
            })
            .await
            .expect("seed token");
        let notifier = Arc::new(RecordingNotifier::default());
        let tokens = Arc::new(TokenManager::new(
            store as Arc<dyn SongStore>,
            None,
            Arc::clone(&notifier) as Arc<dyn Notifier>,
        ));
        let youtube = YouTubeClient::new(YouTubeConfig {
            base_url: server.uri(),
            api_key: "yt".to_string(),
            connect_timeout: Duration::from_secs(3),
            total_timeout: Duration::from_secs(10),
        })
        .expect("client builds");
        let stage = YouTubePublishStage::new(
            Arc::new(youtube),
            tokens,
            Arc::clone(&notifier) as Arc<dyn Notifier>,
            Telemetry::without_tracing()
                .expect("metrics register")
                .metrics_arc(),
            pick_count,
            Duration::ZERO,
        );
        (stage, notifier)
    }

    #[tokio::test]
    async fn fills_playlists_and_replaces_failed_insertions() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/playlists"))
            .and(header("authorization", "Bearer access"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": [
                {"id": "PL-stars", "snippet": {"title": "Holostars Original Songs Picks"}}
            ]})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/playlistItems"))
            .and(query_param("playlistId", "PL-stars"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": [{"id": "old-item"}]})))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/playlistItems"))
            .and(query_param("id", "old-item"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/playlists"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "PL-new"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/playlistItems"))
            .and(body_string_contains("\"videoId\":\"s-bad\""))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/playlistItems"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "item"})))
            .mount(&server)
            .await;

        let (stage, notifier) = stage_for(&server, 2).await;
        let selection = CuratedSelection {
            stars: CategoryBuckets {
                originals: vec![
                    star_song("s-bad", "30", SongCategory::Original),
                    star_song("s-1", "20", SongCategory::Original),
                    star_song("s-2", "10", SongCategory::Original),
                    star_song("s-3", "5", SongCategory::Original),
                ],
                covers: Vec::new(),
            },
            girls: CategoryBuckets {
                originals: Vec::new(),
                covers: vec![girl_song("g-1", "3", SongCategory::Cover)],
            },
        };
        let mut run = RunContext::new(TaskKind::FetchAndCurate);

        let summary = stage.publish(&mut run, &selection).await.expect("publish");

        assert_eq!(
            summary.playlists,
            [
                ("Holostars Original Songs Picks".to_string(), 2),
                ("Hololive Cover Songs Picks".to_string(), 1),
            ]
        );
        assert_eq!(summary.failed_inserts, 1);
        assert_eq!(summary.inserted(), 3);
        assert_eq!(run.error_log.len(), 1);
        assert_eq!(
            notifier.titles(WebhookChannel::Notification),
            ["Playlist Update Complete", "Playlist Update Complete"]
        );
    }

    fn star_originals(ids: &[&str]) -> CuratedSelection {
        CuratedSelection {
            stars: CategoryBuckets {
                originals: ids
                    .iter()
                    .map(|id| star_song(id, "10", SongCategory::Original))
                    .collect(),
                covers: Vec::new(),
            },
            girls: CategoryBuckets::default(),
        }
    }

    #[tokio::test]
    async fn rejected_credentials_fail_the_stage_while_preparing_playlists() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/playlists"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .expect(0)
            .mount(&server)
            .await;

        let (stage, notifier) = stage_for(&server, 2).await;
        let mut run = RunContext::new(TaskKind::FetchAndCurate);

        let err = stage
            .publish(&mut run, &star_originals(&["s-1", "s-2"]))
            .await
            .expect_err("401 must abort publishing");

        assert!(is_fatal(&err));
        assert_eq!(run.error_log.len(), 0);
        assert!(notifier.titles(WebhookChannel::Notification).is_empty());
    }

    #[tokio::test]
    async fn rejected_credentials_stop_insertions() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/playlists"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/playlists"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "PL-new"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/playlistItems"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;

        let (stage, notifier) = stage_for(&server, 2).await;
        let mut run = RunContext::new(TaskKind::FetchAndCurate);

        let err = stage
            .publish(&mut run, &star_originals(&["s-1", "s-2", "s-3"]))
            .await
            .expect_err("403 must abort publishing");

        assert!(is_fatal(&err));
        assert_eq!(run.error_log.len(), 0);
        assert!(notifier.titles(WebhookChannel::Notification).is_empty());
    }

    #[tokio::test]
    async fn missing_token_fails_the_stage() {
        let server = MockServer::start().await;
        let notifier = Arc::new(RecordingNotifier::default());
        let tokens = Arc::new(TokenManager::new(
            Arc::new(MemorySongStore::new()) as Arc<dyn SongStore>,
            None,
            Arc::clone(&notifier) as Arc<dyn Notifier>,
        ));
        let youtube = YouTubeClient::new(YouTubeConfig {
            base_url: server.uri(),
            api_key: "yt".to_string(),
            connect_timeout: Duration::from_secs(3),
            total_timeout: Duration::from_secs(10),
        })
        .expect("client builds");
        let stage = YouTubePublishStage::new(
            Arc::new(youtube),
            tokens,
            notifier as Arc<dyn Notifier>,
            Telemetry::without_tracing()
                .expect("metrics register")
                .metrics_arc(),
            50,
            Duration::ZERO,
        );
        let mut run = RunContext::new(TaskKind::FetchAndCurate);

        let err = stage
            .publish(&mut run, &CuratedSelection::default())
            .await
            .expect_err("token missing");

        assert!(is_fatal(&err));
    }
}
