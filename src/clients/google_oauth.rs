/// Google OAuth 2.0 トークンエンドポイントクライアント。
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, Url};
use serde::Deserialize;

const CONSENT_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/youtube",
    "https://www.googleapis.com/auth/youtube.force-ssl",
];

/// トークンエンドポイントの応答。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct TokenResponse {
    pub(crate) access_token: String,
    /// 有効期間（秒）
    #[serde(default)]
    pub(crate) expires_in: Option<i64>,
    /// リフレッシュ時は省略されることがある
    #[serde(default)]
    pub(crate) refresh_token: Option<String>,
    #[serde(default)]
    pub(crate) token_type: Option<String>,
    #[serde(default)]
    pub(crate) scope: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct GoogleOAuthConfig {
    pub(crate) token_url: String,
    pub(crate) client_id: String,
    pub(crate) client_secret: String,
    pub(crate) redirect_uri: String,
    pub(crate) connect_timeout: Duration,
    pub(crate) total_timeout: Duration,
}

#[derive(Debug, Clone)]
pub(crate) struct GoogleOAuthClient {
    client: Client,
    token_url: Url,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl GoogleOAuthClient {
    /// # Errors
    /// URLのパースまたはHTTPクライアントの構築に失敗した場合はエラーを返します。
    pub(crate) fn new(config: GoogleOAuthConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.total_timeout)
            .build()
            .context("failed to build oauth HTTP client")?;

        let token_url = Url::parse(&config.token_url).context("invalid oauth token URL")?;

        Ok(Self {
            client,
            token_url,
            client_id: config.client_id,
            client_secret: config.client_secret,
            redirect_uri: config.redirect_uri,
        })
    }

    /// オフライン権限付きの同意画面URLを組み立てる。
    ///
    /// # Errors
    /// 同意画面URLのパースに失敗した場合はエラーを返します。
    pub(crate) fn consent_url(&self) -> Result<Url> {
        let mut url = Url::parse(CONSENT_URL).context("invalid consent URL")?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &SCOPES.join(" "))
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent");
        Ok(url)
    }

    /// 認可コードをトークンに交換する。
    ///
    /// # Errors
    /// リクエスト失敗、エラー状態、またはパース失敗時にエラーを返します。
    pub(crate) async fn exchange_code(&self, code: &str) -> Result<TokenResponse> {
        self.request_token(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
        ])
        .await
        .context("authorization code exchange failed")
    }

    /// リフレッシュトークンで新しいアクセストークンを取得する。
    ///
    /// # Errors
    /// リクエスト失敗、エラー状態、またはパース失敗時にエラーを返します。
    pub(crate) async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse> {
        self.request_token(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ])
        .await
        .context("access token refresh failed")
    }

    async fn request_token(&self, form: &[(&str, &str)]) -> Result<TokenResponse> {
        let response = self
            .client
            .post(self.token_url.clone())
            .form(form)
            .send()
            .await
            .context("oauth token request failed")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("oauth token endpoint returned error status {status}: {error_body}");
        }

        response
            .json::<TokenResponse>()
            .await
            .context("failed to deserialize oauth token response")
    }
}
