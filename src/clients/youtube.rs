/// YouTube Data API v3 クライアント。
///
/// 再生数の一括取得（APIキー）と、プレイリスト操作（OAuthアクセストークン）を扱います。
use std::{collections::HashMap, time::Duration};

use anyhow::{Context, Result};
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::holodex::with_trailing_slash;

/// プレイリスト一覧・項目一覧の1ページあたり件数。
const MAX_RESULTS: &str = "50";

/// 動画の統計情報。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VideoStatistics {
    #[serde(default)]
    pub(crate) view_count: String,
    /// 高評価数は非公開の場合がある
    #[serde(default)]
    pub(crate) like_count: String,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    id: String,
    statistics: Option<VideoStatistics>,
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    #[serde(default, rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PlaylistSnippet {
    pub(crate) title: String,
    #[serde(default)]
    pub(crate) description: String,
}

/// 自分のチャンネルのプレイリスト。
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Playlist {
    pub(crate) id: String,
    pub(crate) snippet: PlaylistSnippet,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CreatedResource {
    id: String,
}

/// YouTubeクライアントの設定。
#[derive(Debug, Clone)]
pub(crate) struct YouTubeConfig {
    pub(crate) base_url: String,
    pub(crate) api_key: String,
    pub(crate) connect_timeout: Duration,
    pub(crate) total_timeout: Duration,
}

#[derive(Debug, Clone)]
pub(crate) struct YouTubeClient {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl YouTubeClient {
    /// # Errors
    /// URLのパースまたはHTTPクライアントの構築に失敗した場合はエラーを返します。
    pub(crate) fn new(config: YouTubeConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.total_timeout)
            .build()
            .context("failed to build youtube HTTP client")?;

        let base_url = Url::parse(&with_trailing_slash(&config.base_url))
            .context("invalid youtube base URL")?;

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key,
        })
    }

    fn endpoint(&self, name: &str) -> Result<Url> {
        self.base_url
            .join(name)
            .with_context(|| format!("failed to build {name} URL"))
    }

    /// 動画IDごとの統計情報を取得する。
    ///
    /// 応答に含まれないIDは結果のマップから欠落します。
    ///
    /// # Errors
    /// HTTPリクエストまたはレスポンスのパースに失敗した場合はエラーを返します。
    pub(crate) async fn video_statistics(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, VideoStatistics>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut url = self.endpoint("videos")?;
        url.query_pairs_mut()
            .append_pair("part", "statistics")
            .append_pair("id", &ids.join(","))
            .append_pair("key", &self.api_key);

        let response: ListResponse<VideoItem> = self
            .client
            .get(url)
            .send()
            .await
            .context("youtube videos request failed")?
            .error_for_status()
            .context("youtube videos returned error status")?
            .json()
            .await
            .context("failed to deserialize youtube videos response")?;

        Ok(response
            .items
            .into_iter()
            .filter_map(|item| item.statistics.map(|stats| (item.id, stats)))
            .collect())
    }

    /// 認証ユーザーのプレイリストを取得する（先頭50件）。
    ///
    /// # Errors
    /// HTTPリクエストまたはレスポンスのパースに失敗した場合はエラーを返します。
    pub(crate) async fn list_playlists(&self, token: &str) -> Result<Vec<Playlist>> {
        let mut url = self.endpoint("playlists")?;
        url.query_pairs_mut()
            .append_pair("part", "snippet,status")
            .append_pair("mine", "true")
            .append_pair("maxResults", MAX_RESULTS);

        let response: ListResponse<Playlist> = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .context("youtube playlists request failed")?
            .error_for_status()
            .context("youtube playlists returned error status")?
            .json()
            .await
            .context("failed to deserialize youtube playlists response")?;

        Ok(response.items)
    }

    /// 非公開プレイリストを作成し、そのIDを返す。
    ///
    /// # Errors
    /// HTTPリクエストまたはレスポンスのパースに失敗した場合はエラーを返します。
    pub(crate) async fn create_playlist(
        &self,
        token: &str,
        title: &str,
        description: &str,
    ) -> Result<String> {
        let mut url = self.endpoint("playlists")?;
        url.query_pairs_mut().append_pair("part", "snippet,status");

        let created: CreatedResource = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&json!({
                "snippet": { "title": title, "description": description },
                "status": { "privacyStatus": "private" },
            }))
            .send()
            .await
            .context("youtube playlist create request failed")?
            .error_for_status()
            .context("youtube playlist create returned error status")?
            .json()
            .await
            .context("failed to deserialize created playlist")?;

        Ok(created.id)
    }

    /// プレイリスト内の全項目を削除する。
    ///
    /// # Errors
    /// 一覧取得または削除に失敗した場合はエラーを返します。
    pub(crate) async fn clear_playlist(&self, token: &str, playlist_id: &str) -> Result<usize> {
        let item_ids = self.playlist_item_ids(token, playlist_id).await?;

        for item_id in &item_ids {
            let mut url = self.endpoint("playlistItems")?;
            url.query_pairs_mut().append_pair("id", item_id);

            self.client
                .delete(url)
                .bearer_auth(token)
                .send()
                .await
                .context("youtube playlist item delete request failed")?
                .error_for_status()
                .context("youtube playlist item delete returned error status")?;
        }

        debug!(playlist_id, removed = item_ids.len(), "cleared playlist");
        Ok(item_ids.len())
    }

    async fn playlist_item_ids(&self, token: &str, playlist_id: &str) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = self.endpoint("playlistItems")?;
            {
                let mut query_pairs = url.query_pairs_mut();
                query_pairs.append_pair("part", "id");
                query_pairs.append_pair("playlistId", playlist_id);
                query_pairs.append_pair("maxResults", MAX_RESULTS);
                if let Some(token) = page_token.as_deref() {
                    query_pairs.append_pair("pageToken", token);
                }
            }

            let page: ListResponse<PlaylistItem> = self
                .client
                .get(url)
                .bearer_auth(token)
                .send()
                .await
                .context("youtube playlist items request failed")?
                .error_for_status()
                .context("youtube playlist items returned error status")?
                .json()
                .await
                .context("failed to deserialize youtube playlist items")?;

            ids.extend(page.items.into_iter().map(|item| item.id));

            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }

        Ok(ids)
    }

    /// プレイリスト末尾に動画を追加する。
    ///
    /// # Errors
    /// HTTPリクエストが失敗した場合、またはエラー状態が返った場合はエラーを返します。
    pub(crate) async fn insert_playlist_item(
        &self,
        token: &str,
        playlist_id: &str,
        video_id: &str,
    ) -> Result<()> {
        let mut url = self.endpoint("playlistItems")?;
        url.query_pairs_mut().append_pair("part", "snippet");

        self.client
            .post(url)
            .bearer_auth(token)
            .json(&json!({
                "snippet": {
                    "playlistId": playlist_id,
                    "resourceId": { "kind": "youtube#video", "videoId": video_id },
                },
            }))
            .send()
            .await
            .context("youtube playlist item insert request failed")?
            .error_for_status()
            .context("youtube playlist item insert returned error status")?;

        Ok(())
    }
}
