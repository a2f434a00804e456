use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::{
    api,
    clients::{
        DiscordClient, GoogleOAuthClient, HolodexClient, Notifier, YouTubeClient,
        discord::DiscordConfig, google_oauth::GoogleOAuthConfig, holodex::HolodexConfig,
        youtube::YouTubeConfig,
    },
    config::Config,
    oauth::TokenManager,
    observability::Telemetry,
    pipeline::{
        PipelineOrchestrator,
        fetch::{FetchSettings, HolodexFetchStage, StatsSource},
        publish::{PublishStage, SkipPublishStage, YouTubePublishStage},
        select::{SelectionPolicy, WeightedSelectStage},
    },
    scheduler::Scheduler,
    store::{PgSongStore, SongStore},
    util::retry::RetryConfig,
};

#[derive(Clone)]
pub(crate) struct AppState {
    registry: Arc<ComponentRegistry>,
}

pub struct ComponentRegistry {
    config: Arc<Config>,
    telemetry: Telemetry,
    scheduler: Scheduler,
    store: Arc<dyn SongStore>,
    pg_store: Arc<PgSongStore>,
    tokens: Arc<TokenManager>,
    youtube: Arc<YouTubeClient>,
}

impl AppState {
    pub(crate) fn new(registry: ComponentRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub(crate) fn telemetry(&self) -> &Telemetry {
        &self.registry.telemetry
    }

    pub(crate) fn scheduler(&self) -> &Scheduler {
        &self.registry.scheduler
    }

    pub(crate) fn store(&self) -> Arc<dyn SongStore> {
        Arc::clone(&self.registry.store)
    }

    pub(crate) fn tokens(&self) -> Arc<TokenManager> {
        Arc::clone(&self.registry.tokens)
    }

    pub(crate) fn youtube(&self) -> &YouTubeClient {
        &self.registry.youtube
    }
}

impl ComponentRegistry {
    /// 構成情報と依存をまとめて初期化し、アプリケーションの共有レジストリを構築する。
    ///
    /// データベースへの接続は遅延され、最初のクエリまで行われない。
    ///
    /// # Errors
    /// Telemetry の初期化や HTTP クライアント構築が失敗した場合はエラーを返す。
    pub fn build(config: Config) -> Result<Self> {
        let telemetry = Telemetry::new()?;
        Self::build_with_telemetry(config, telemetry)
    }

    fn build_with_telemetry(config: Config, telemetry: Telemetry) -> Result<Self> {
        let config = Arc::new(config);
        let metrics = telemetry.metrics_arc();

        let pool = PgPoolOptions::new()
            .max_connections(config.pickup_db_max_connections())
            .test_before_acquire(true)
            .connect_lazy(config.pickup_db_dsn())
            .context("failed to configure pickup_db connection pool")?;
        let pg_store = Arc::new(PgSongStore::new(pool));
        let store: Arc<dyn SongStore> = Arc::clone(&pg_store) as Arc<dyn SongStore>;

        let notifier: Arc<dyn Notifier> = Arc::new(DiscordClient::new(DiscordConfig {
            admin_webhook_url: config.discord_admin_webhook_url().map(ToString::to_string),
            notification_webhook_url: config
                .discord_notification_webhook_url()
                .map(ToString::to_string),
            connect_timeout: config.http_connect_timeout(),
            total_timeout: config.http_total_timeout(),
        })?);

        let oauth_client = match (
            config.google_oauth_client_id(),
            config.google_oauth_client_secret(),
            config.oauth_redirect_uri(),
        ) {
            (Some(client_id), Some(client_secret), Some(redirect_uri)) => {
                Some(GoogleOAuthClient::new(GoogleOAuthConfig {
                    token_url: config.google_oauth_token_url().to_string(),
                    client_id: client_id.to_string(),
                    client_secret: client_secret.to_string(),
                    redirect_uri,
                    connect_timeout: config.http_connect_timeout(),
                    total_timeout: config.http_total_timeout(),
                })?)
            }
            _ => {
                info!("google oauth client not configured, consent flow disabled");
                None
            }
        };
        let tokens = Arc::new(TokenManager::new(
            Arc::clone(&store),
            oauth_client,
            Arc::clone(&notifier),
        ));

        let retry = RetryConfig::new(
            config.http_max_attempts(),
            config.http_backoff_base_ms(),
            config.http_backoff_cap_ms(),
        );
        let holodex = Arc::new(HolodexClient::new(HolodexConfig {
            base_url: config.holodex_base_url().to_string(),
            api_key: config.holodex_api_key().to_string(),
            org: config.holodex_org().to_string(),
            page_size: config.holodex_page_size().get(),
            connect_timeout: config.http_connect_timeout(),
            total_timeout: config.http_total_timeout(),
            retry,
        })?);
        let youtube = Arc::new(YouTubeClient::new(YouTubeConfig {
            base_url: config.youtube_base_url().to_string(),
            api_key: config.youtube_api_key().to_string(),
            connect_timeout: config.http_connect_timeout(),
            total_timeout: config.http_total_timeout(),
        })?);

        let (stats, publish): (StatsSource, Arc<dyn PublishStage>) = if config.call_youtube() {
            (
                StatsSource::YouTube(Arc::clone(&youtube)),
                Arc::new(YouTubePublishStage::new(
                    Arc::clone(&youtube),
                    Arc::clone(&tokens),
                    Arc::clone(&notifier),
                    Arc::clone(&metrics),
                    config.songs_to_pick(),
                    config.playlist_insert_delay(),
                )),
            )
        } else {
            info!("CALL_YOUTUBE is off, using synthetic statistics and skipping playlists");
            (StatsSource::Synthetic, Arc::new(SkipPublishStage))
        };

        let fetch = HolodexFetchStage::new(
            holodex,
            stats,
            Arc::clone(&store),
            Arc::clone(&metrics),
            FetchSettings {
                mode: config.fetch_mode(),
                window_days: config.fetch_window_days(),
                min_age_days: config.min_song_age_days(),
                stats_batch_size: config.stats_batch_size().get(),
                filter_instrumental: config.filter_instrumental(),
            },
        );
        let policy = SelectionPolicy::new(config.songs_to_pick(), config.songs_pick_overage());

        let pipeline = PipelineOrchestrator::builder()
            .with_fetch_stage(Arc::new(fetch))
            .with_select_stage(Arc::new(WeightedSelectStage::new(policy)))
            .with_publish_stage(publish)
            .with_dump_path(config.picked_songs_dump_path().map(PathBuf::from))
            .build(Arc::clone(&store), Arc::clone(&metrics))?;

        let scheduler = Scheduler::new(
            Arc::new(pipeline),
            Arc::clone(&tokens),
            notifier,
            metrics,
        );

        Ok(Self {
            config,
            telemetry,
            scheduler,
            store,
            pg_store,
            tokens,
            youtube,
        })
    }

    /// Creates the song table when it does not exist yet.
    ///
    /// # Errors
    /// Fails when the database is unreachable.
    pub async fn prepare_store(&self) -> Result<()> {
        self.pg_store
            .ensure_schema()
            .await
            .context("failed to prepare song table")
    }

    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    #[must_use]
    pub fn config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }
}

pub fn build_router(registry: ComponentRegistry) -> Router {
    let state = AppState::new(registry);
    api::router(state)
}
