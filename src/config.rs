use std::{env, net::SocketAddr, num::NonZeroUsize, str::FromStr, time::Duration};

use thiserror::Error;

#[cfg(test)]
use once_cell::sync::Lazy;
#[cfg(test)]
pub(crate) static ENV_MUTEX: Lazy<std::sync::Mutex<()>> = Lazy::new(|| std::sync::Mutex::new(()));

/// Catalog refresh strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Upsert songs published inside the fetch window.
    Incremental,
    /// Purge every stored song and fetch the whole catalog again.
    Full,
}

impl FromStr for FetchMode {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_lowercase().as_str() {
            "incremental" => Ok(Self::Incremental),
            "full" => Ok(Self::Full),
            other => Err(anyhow::anyhow!("unknown fetch mode: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    http_bind: SocketAddr,
    pickup_db_dsn: String,
    pickup_db_max_connections: u32,
    holodex_base_url: String,
    holodex_api_key: String,
    holodex_org: String,
    holodex_page_size: NonZeroUsize,
    youtube_base_url: String,
    youtube_api_key: String,
    google_oauth_client_id: Option<String>,
    google_oauth_client_secret: Option<String>,
    google_oauth_token_url: String,
    backend_host: Option<String>,
    discord_admin_webhook_url: Option<String>,
    discord_notification_webhook_url: Option<String>,
    songs_to_pick: usize,
    songs_pick_overage: usize,
    fetch_mode: FetchMode,
    fetch_window_days: u32,
    min_song_age_days: u32,
    stats_batch_size: NonZeroUsize,
    playlist_insert_delay: Duration,
    call_youtube: bool,
    filter_instrumental: bool,
    picked_songs_dump_path: Option<String>,
    schedule_utc_offset_hours: i32,
    curate_hour: u32,
    oauth_check_hour: u32,
    http_connect_timeout: Duration,
    http_total_timeout: Duration,
    http_max_retries: usize,
    http_backoff_base_ms: u64,
    http_backoff_cap_ms: u64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {source}")]
    Invalid {
        name: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl Config {
    /// 環境変数から Pickup Worker の設定値を読み込み、検証する。
    ///
    /// # Errors
    /// 必須の環境変数が未設定、もしくは各種値のパースに失敗した場合は [`ConfigError`] を返す。
    pub fn from_env() -> Result<Self, ConfigError> {
        let pickup_db_dsn = env_var("PICKUP_DB_DSN")?;
        let holodex_api_key = env_var("HOLODEX_API_KEY")?;
        let youtube_api_key = env_var("YOUTUBE_API_KEY")?;
        let http_bind = parse_socket_addr("PICKUP_HTTP_BIND", "0.0.0.0:3000")?;
        let pickup_db_max_connections = parse_u32("PICKUP_DB_MAX_CONNECTIONS", 5)?;

        let holodex_base_url = env::var("HOLODEX_BASE_URL")
            .unwrap_or_else(|_| "https://holodex.net/api/v2/".to_string());
        let holodex_org = env::var("HOLODEX_ORG").unwrap_or_else(|_| "Hololive".to_string());
        let holodex_page_size = parse_non_zero_usize("HOLODEX_PAGE_SIZE", 50)?;
        let youtube_base_url = env::var("YOUTUBE_BASE_URL")
            .unwrap_or_else(|_| "https://www.googleapis.com/youtube/v3/".to_string());

        // OAuth settings (optional until the first playlist write)
        let google_oauth_client_id = env::var("GOOGLE_OAUTH_CLIENT_ID").ok();
        let google_oauth_client_secret = env::var("GOOGLE_OAUTH_CLIENT_SECRET").ok();
        let google_oauth_token_url = env::var("GOOGLE_OAUTH_TOKEN_URL")
            .unwrap_or_else(|_| "https://oauth2.googleapis.com/token".to_string());
        let backend_host = env::var("BACKEND_HOST").ok();

        let discord_admin_webhook_url = env::var("DISCORD_ADMIN_WEBHOOK_URL").ok();
        let discord_notification_webhook_url = env::var("DISCORD_NOTIFICATION_WEBHOOK_URL").ok();

        // Selection and fetch settings
        let songs_to_pick = parse_usize("SONGS_TO_PICK", 50)?;
        let songs_pick_overage = parse_usize("SONGS_PICK_OVERAGE", 10)?;
        let fetch_mode: FetchMode = parse_from_str("FETCH_MODE", "incremental")?;
        let fetch_window_days = parse_u32("FETCH_WINDOW_DAYS", 14)?;
        let min_song_age_days = parse_u32("MIN_SONG_AGE_DAYS", 7)?;
        // an incremental window inside the minimum age never stores anything
        if fetch_mode == FetchMode::Incremental && fetch_window_days <= min_song_age_days {
            return Err(ConfigError::Invalid {
                name: "FETCH_WINDOW_DAYS",
                source: anyhow::anyhow!(
                    "window of {fetch_window_days} days must exceed MIN_SONG_AGE_DAYS ({min_song_age_days})"
                ),
            });
        }
        let stats_batch_size = parse_non_zero_usize("STATS_BATCH_SIZE", 50)?;
        let playlist_insert_delay = parse_duration_ms("PLAYLIST_INSERT_DELAY_MS", 500)?;
        let call_youtube = parse_bool("CALL_YOUTUBE", false)?;
        let filter_instrumental = parse_bool("FILTER_INSTRUMENTAL", true)?;
        let picked_songs_dump_path = env::var("PICKED_SONGS_DUMP_PATH").ok();

        // Schedule settings
        let schedule_utc_offset_hours = parse_i32("SCHEDULE_UTC_OFFSET_HOURS", 9)?;
        if !(-23..=23).contains(&schedule_utc_offset_hours) {
            return Err(ConfigError::Invalid {
                name: "SCHEDULE_UTC_OFFSET_HOURS",
                source: anyhow::anyhow!("offset must be between -23 and 23"),
            });
        }
        let curate_hour = parse_hour("CURATE_HOUR", 4)?;
        let oauth_check_hour = parse_hour("OAUTH_CHECK_HOUR", 3)?;

        // HTTP settings (exponential backoff + jitter)
        let http_connect_timeout = parse_duration_ms("HTTP_CONNECT_TIMEOUT_MS", 3000)?;
        let http_total_timeout = parse_duration_ms("HTTP_TOTAL_TIMEOUT_MS", 30000)?;
        let http_max_retries = parse_usize("HTTP_MAX_RETRIES", 3)?;
        let http_backoff_base_ms = parse_u64("HTTP_BACKOFF_BASE_MS", 250)?;
        let http_backoff_cap_ms = parse_u64("HTTP_BACKOFF_CAP_MS", 10000)?;

        Ok(Self {
            http_bind,
            pickup_db_dsn,
            pickup_db_max_connections,
            holodex_base_url,
            holodex_api_key,
            holodex_org,
            holodex_page_size,
            youtube_base_url,
            youtube_api_key,
            google_oauth_client_id,
            google_oauth_client_secret,
            google_oauth_token_url,
            backend_host,
            discord_admin_webhook_url,
            discord_notification_webhook_url,
            songs_to_pick,
            songs_pick_overage,
            fetch_mode,
            fetch_window_days,
            min_song_age_days,
            stats_batch_size,
            playlist_insert_delay,
            call_youtube,
            filter_instrumental,
            picked_songs_dump_path,
            schedule_utc_offset_hours,
            curate_hour,
            oauth_check_hour,
            http_connect_timeout,
            http_total_timeout,
            http_max_retries,
            http_backoff_base_ms,
            http_backoff_cap_ms,
        })
    }

    #[must_use]
    pub fn http_bind(&self) -> SocketAddr {
        self.http_bind
    }

    #[must_use]
    pub fn pickup_db_dsn(&self) -> &str {
        &self.pickup_db_dsn
    }

    #[must_use]
    pub fn pickup_db_max_connections(&self) -> u32 {
        self.pickup_db_max_connections
    }

    #[must_use]
    pub fn holodex_base_url(&self) -> &str {
        &self.holodex_base_url
    }

    #[must_use]
    pub fn holodex_api_key(&self) -> &str {
        &self.holodex_api_key
    }

    #[must_use]
    pub fn holodex_org(&self) -> &str {
        &self.holodex_org
    }

    #[must_use]
    pub fn holodex_page_size(&self) -> NonZeroUsize {
        self.holodex_page_size
    }

    #[must_use]
    pub fn youtube_base_url(&self) -> &str {
        &self.youtube_base_url
    }

    #[must_use]
    pub fn youtube_api_key(&self) -> &str {
        &self.youtube_api_key
    }

    #[must_use]
    pub fn google_oauth_client_id(&self) -> Option<&str> {
        self.google_oauth_client_id.as_deref()
    }

    #[must_use]
    pub fn google_oauth_client_secret(&self) -> Option<&str> {
        self.google_oauth_client_secret.as_deref()
    }

    #[must_use]
    pub fn google_oauth_token_url(&self) -> &str {
        &self.google_oauth_token_url
    }

    #[must_use]
    pub fn backend_host(&self) -> Option<&str> {
        self.backend_host.as_deref()
    }

    /// OAuth リダイレクト先。`BACKEND_HOST` 未設定時は `None`。
    #[must_use]
    pub fn oauth_redirect_uri(&self) -> Option<String> {
        self.backend_host
            .as_deref()
            .map(|host| format!("{}/auth/oauth/callback", host.trim_end_matches('/')))
    }

    #[must_use]
    pub fn discord_admin_webhook_url(&self) -> Option<&str> {
        self.discord_admin_webhook_url.as_deref()
    }

    #[must_use]
    pub fn discord_notification_webhook_url(&self) -> Option<&str> {
        self.discord_notification_webhook_url.as_deref()
    }

    #[must_use]
    pub fn songs_to_pick(&self) -> usize {
        self.songs_to_pick
    }

    #[must_use]
    pub fn songs_pick_overage(&self) -> usize {
        self.songs_pick_overage
    }

    #[must_use]
    pub fn fetch_mode(&self) -> FetchMode {
        self.fetch_mode
    }

    #[must_use]
    pub fn fetch_window_days(&self) -> u32 {
        self.fetch_window_days
    }

    #[must_use]
    pub fn min_song_age_days(&self) -> u32 {
        self.min_song_age_days
    }

    #[must_use]
    pub fn stats_batch_size(&self) -> NonZeroUsize {
        self.stats_batch_size
    }

    #[must_use]
    pub fn playlist_insert_delay(&self) -> Duration {
        self.playlist_insert_delay
    }

    #[must_use]
    pub fn call_youtube(&self) -> bool {
        self.call_youtube
    }

    #[must_use]
    pub fn filter_instrumental(&self) -> bool {
        self.filter_instrumental
    }

    #[must_use]
    pub fn picked_songs_dump_path(&self) -> Option<&str> {
        self.picked_songs_dump_path.as_deref()
    }

    #[must_use]
    pub fn schedule_utc_offset_hours(&self) -> i32 {
        self.schedule_utc_offset_hours
    }

    #[must_use]
    pub fn curate_hour(&self) -> u32 {
        self.curate_hour
    }

    #[must_use]
    pub fn oauth_check_hour(&self) -> u32 {
        self.oauth_check_hour
    }

    #[must_use]
    pub fn http_connect_timeout(&self) -> Duration {
        self.http_connect_timeout
    }

    #[must_use]
    pub fn http_total_timeout(&self) -> Duration {
        self.http_total_timeout
    }

    #[must_use]
    pub fn http_max_retries(&self) -> usize {
        self.http_max_retries
    }

    /// 初回を含む試行回数（`HTTP_MAX_RETRIES` + 1）。
    #[must_use]
    pub fn http_max_attempts(&self) -> usize {
        self.http_max_retries.saturating_add(1)
    }

    #[must_use]
    pub fn http_backoff_base_ms(&self) -> u64 {
        self.http_backoff_base_ms
    }

    #[must_use]
    pub fn http_backoff_cap_ms(&self) -> u64 {
        self.http_backoff_cap_ms
    }
}

fn env_var(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn invalid(name: &'static str, error: impl std::error::Error + Send + Sync + 'static) -> ConfigError {
    ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    }
}

fn parse_socket_addr(name: &'static str, default: &str) -> Result<SocketAddr, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse().map_err(|error| invalid(name, error))
}

fn parse_non_zero_usize(name: &'static str, default: usize) -> Result<NonZeroUsize, ConfigError> {
    let parsed = parse_usize(name, default)?;
    NonZeroUsize::new(parsed).ok_or_else(|| ConfigError::Invalid {
        name,
        source: anyhow::anyhow!("must be greater than zero"),
    })
}

fn parse_duration_ms(name: &'static str, default_ms: u64) -> Result<Duration, ConfigError> {
    parse_u64(name, default_ms).map(Duration::from_millis)
}

fn parse_usize(name: &'static str, default: usize) -> Result<usize, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse::<usize>().map_err(|error| invalid(name, error))
}

fn parse_u32(name: &'static str, default: u32) -> Result<u32, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse::<u32>().map_err(|error| invalid(name, error))
}

fn parse_i32(name: &'static str, default: i32) -> Result<i32, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse::<i32>().map_err(|error| invalid(name, error))
}

fn parse_u64(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse::<u64>().map_err(|error| invalid(name, error))
}

fn parse_hour(name: &'static str, default: u32) -> Result<u32, ConfigError> {
    let hour = parse_u32(name, default)?;
    if hour > 23 {
        return Err(ConfigError::Invalid {
            name,
            source: anyhow::anyhow!("hour must be between 0 and 23"),
        });
    }
    Ok(hour)
}

fn parse_bool(name: &'static str, default: bool) -> Result<bool, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    match raw.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            source: anyhow::anyhow!("invalid boolean value: {raw}"),
        }),
    }
}

fn parse_from_str<T>(name: &'static str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr<Err = anyhow::Error>,
{
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse::<T>()
        .map_err(|source| ConfigError::Invalid { name, source })
}
