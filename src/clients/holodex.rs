/// Holodex APIからの楽曲動画取得クライアント。
///
/// `paginated=true` のオフセットページングとページ単位の再試行をサポートします。
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::{Client, Url};
use serde::{Deserialize, Deserializer, de};
use tracing::debug;

use crate::{
    pipeline::select::{ChannelRef, SongCategory},
    util::retry::{RetryConfig, with_retry},
};

/// Holodexから取得した動画。
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct HolodexVideo {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) channel_id: String,
    pub(crate) channel: ChannelRef,
    #[serde(default)]
    pub(crate) published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub(crate) available_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub(crate) duration: u64,
    #[serde(default)]
    pub(crate) status: String,
    #[serde(default)]
    pub(crate) mentions: Option<Vec<ChannelRef>>,
}

/// `paginated=true` 時の応答。`total` は数値または文字列で返る。
#[derive(Debug, Deserialize)]
struct VideoPage {
    #[serde(deserialize_with = "number_or_string")]
    total: usize,
    #[serde(default)]
    items: Vec<HolodexVideo>,
}

fn number_or_string<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Total {
        Number(usize),
        Text(String),
    }

    match Total::deserialize(deserializer)? {
        Total::Number(n) => Ok(n),
        Total::Text(s) => s.trim().parse().map_err(de::Error::custom),
    }
}

/// 検索条件。
#[derive(Debug, Clone, Copy)]
pub(crate) struct VideoQuery {
    pub(crate) category: SongCategory,
    /// これ以降に公開された動画のみ（増分取得時）
    pub(crate) from: Option<DateTime<Utc>>,
}

/// Holodexクライアントの設定。
#[derive(Debug, Clone)]
pub(crate) struct HolodexConfig {
    pub(crate) base_url: String,
    pub(crate) api_key: String,
    pub(crate) org: String,
    pub(crate) page_size: usize,
    pub(crate) connect_timeout: Duration,
    pub(crate) total_timeout: Duration,
    pub(crate) retry: RetryConfig,
}

#[derive(Debug, Clone)]
pub(crate) struct HolodexClient {
    client: Client,
    base_url: Url,
    api_key: String,
    org: String,
    page_size: usize,
    retry: RetryConfig,
}

impl HolodexClient {
    /// 新しいHolodexクライアントを作成する。
    ///
    /// # Errors
    /// URLのパースまたはHTTPクライアントの構築に失敗した場合はエラーを返します。
    pub(crate) fn new(config: HolodexConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.total_timeout)
            .build()
            .context("failed to build holodex HTTP client")?;

        let base_url = Url::parse(&with_trailing_slash(&config.base_url))
            .context("invalid holodex base URL")?;

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key,
            org: config.org,
            page_size: config.page_size.max(1),
            retry: config.retry,
        })
    }

    /// 条件に一致する動画を全件取得する。
    ///
    /// 最初のページで `total` を得て、件数に達するか空ページが返るまで
    /// オフセットを進めます。各ページは再試行対象です。
    ///
    /// # Errors
    /// 再試行後もページ取得に失敗した場合はエラーを返します。
    pub(crate) async fn fetch_all(&self, query: VideoQuery) -> Result<Vec<HolodexVideo>> {
        let mut videos = Vec::new();
        let mut offset = 0;

        let first = self.fetch_page_with_retry(query, offset).await?;
        let total = first.total;
        videos.extend(first.items);

        while videos.len() < total {
            offset += self.page_size;
            let page = self.fetch_page_with_retry(query, offset).await?;
            if page.items.is_empty() {
                debug!(
                    topic = query.category.topic(),
                    collected = videos.len(),
                    total,
                    "empty page before reaching total"
                );
                break;
            }
            videos.extend(page.items);
            debug!(
                topic = query.category.topic(),
                collected = videos.len(),
                total,
                "fetched holodex page"
            );
        }

        Ok(videos)
    }

    async fn fetch_page_with_retry(&self, query: VideoQuery, offset: usize) -> Result<VideoPage> {
        with_retry(self.retry, "holodex_videos", move || self.fetch_page(query, offset)).await
    }

    /// 単一ページを取得する。
    async fn fetch_page(&self, query: VideoQuery, offset: usize) -> Result<VideoPage> {
        let mut url = self
            .base_url
            .join("videos")
            .context("failed to build videos URL")?;

        {
            let mut query_pairs = url.query_pairs_mut();
            query_pairs.append_pair("org", &self.org);
            query_pairs.append_pair("type", "stream");
            query_pairs.append_pair("topic", query.category.topic());
            query_pairs.append_pair("status", "past");
            query_pairs.append_pair("include", "mentions");
            query_pairs.append_pair("limit", &self.page_size.to_string());
            query_pairs.append_pair("offset", &offset.to_string());
            query_pairs.append_pair("paginated", "true");

            if let Some(from) = query.from {
                query_pairs.append_pair("from", &from.to_rfc3339());
            }
        }

        let response = self
            .client
            .get(url)
            .header("X-APIKEY", &self.api_key)
            .send()
            .await
            .context("holodex videos request failed")?
            .error_for_status()
            .context("holodex returned error status")?;

        response
            .json::<VideoPage>()
            .await
            .context("failed to deserialize holodex videos response")
    }
}

pub(crate) fn with_trailing_slash(base: &str) -> String {
    if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{base}/")
    }
}
