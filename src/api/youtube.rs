use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::warn;

use crate::{app::AppState, clients::YouTubeClient, oauth::TokenManager, util::error::is_fatal};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct PlaylistSummary {
    id: String,
    title: String,
    description: String,
}

/// 認証済みチャンネルのプレイリスト一覧を返す。
pub(crate) async fn list_playlists(State(state): State<AppState>) -> Response {
    match owned_playlists(&state.tokens(), state.youtube()).await {
        Ok(playlists) => Json(playlists).into_response(),
        Err((status, message)) => (status, message).into_response(),
    }
}

/// 認証エラーは 401、それ以外の YouTube 側の失敗は 502 に対応付ける。
async fn owned_playlists(
    tokens: &TokenManager,
    youtube: &YouTubeClient,
) -> Result<Vec<PlaylistSummary>, (StatusCode, String)> {
    let reject = |error: anyhow::Error| {
        warn!(error = %format!("{error:#}"), "playlist listing failed");
        let status = if is_fatal(&error) {
            StatusCode::UNAUTHORIZED
        } else {
            StatusCode::BAD_GATEWAY
        };
        (status, format!("{error:#}"))
    };

    let token = tokens.valid_access_token().await.map_err(reject)?;
    let playlists = youtube.list_playlists(&token).await.map_err(reject)?;

    Ok(playlists
        .into_iter()
        .map(|playlist| PlaylistSummary {
            id: playlist.id,
            title: playlist.snippet.title,
            description: playlist.snippet.description,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use chrono::Utc;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::{
        clients::{Notifier, discord::tests::RecordingNotifier, youtube::YouTubeConfig},
        store::{MemorySongStore, OAuthTokenRecord, SongStore},
    };

    fn youtube_for(server: &MockServer) -> YouTubeClient {
        YouTubeClient::new(YouTubeConfig {
            base_url: server.uri(),
            api_key: "yt".to_string(),
            connect_timeout: Duration::from_secs(3),
            total_timeout: Duration::from_secs(10),
        })
        .expect("client builds")
    }

    async fn tokens(seeded: bool) -> TokenManager {
        let store = Arc::new(MemorySongStore::new());
        if seeded {
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
        }
        TokenManager::new(
            store as Arc<dyn SongStore>,
            None,
            Arc::new(RecordingNotifier::default()) as Arc<dyn Notifier>,
        )
    }

    #[tokio::test]
    async fn lists_titles_and_descriptions() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/playlists"))
            .and(header("authorization", "Bearer access"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": [
                {"id": "PL1", "snippet": {
                    "title": "Hololive Cover Songs Picks",
                    "description": "Automatically picked cover songs from Hololive members"
                }},
                {"id": "PL2", "snippet": {"title": "untitled"}}
            ]})))
            .mount(&server)
            .await;

        let playlists = owned_playlists(&tokens(true).await, &youtube_for(&server))
            .await
            .expect("listing succeeds");

        assert_eq!(
            playlists,
            [
                PlaylistSummary {
                    id: "PL1".to_string(),
                    title: "Hololive Cover Songs Picks".to_string(),
                    description: "Automatically picked cover songs from Hololive members"
                        .to_string(),
                },
                PlaylistSummary {
                    id: "PL2".to_string(),
                    title: "untitled".to_string(),
                    description: String::new(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn missing_token_is_unauthorized() {
        let server = MockServer::start().await;

        let (status, _) = owned_playlists(&tokens(false).await, &youtube_for(&server))
            .await
            .expect_err("no token stored");

        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn upstream_failures_map_to_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/playlists"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let (status, _) = owned_playlists(&tokens(true).await, &youtube_for(&server))
            .await
            .expect_err("upstream error");

        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }
}
