/// Discord Webhook送信クライアント。
///
/// 管理者向けと通知向けの2つのWebhookを扱います。
/// URLが未設定のWebhookへの送信は警告を出してスキップします。
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Url};
use serde::Serialize;
use tracing::{debug, warn};

/// 成功系Embedの色（緑）。
pub(crate) const COLOR_SUCCESS: u32 = 0x00ff00;
/// 失敗系Embedの色（赤）。
pub(crate) const COLOR_FAILURE: u32 = 0xff0000;

/// 送信先Webhookの種別。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WebhookChannel {
    /// 運用者向け（エラー要約、OAuthリンクなど）
    Admin,
    /// 利用者向け（プレイリスト更新完了など）
    Notification,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct EmbedField {
    pub(crate) name: String,
    pub(crate) value: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub(crate) inline: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct EmbedFooter {
    pub(crate) text: String,
}

/// Discord Embed。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct Embed {
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) color: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(crate) fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) footer: Option<EmbedFooter>,
}

impl Embed {
    /// 現在時刻のタイムスタンプ付きEmbedを作成する。
    pub(crate) fn new(title: impl Into<String>, description: impl Into<String>, color: u32) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            color,
            fields: Vec::new(),
            timestamp: Some(Utc::now().to_rfc3339()),
            footer: None,
        }
    }

    #[must_use]
    pub(crate) fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(EmbedField {
            name: name.into(),
            value: value.into(),
            inline: false,
        });
        self
    }

    #[must_use]
    pub(crate) fn footer(mut self, text: impl Into<String>) -> Self {
        self.footer = Some(EmbedFooter { text: text.into() });
        self
    }
}

/// Webhookに送るメッセージ本体。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct WebhookMessage {
    pub(crate) content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(crate) embeds: Vec<Embed>,
}

impl WebhookMessage {
    /// 全メッセージに `@everyone` メンションを付与する。
    pub(crate) fn new(content: Option<&str>, embeds: Vec<Embed>) -> Self {
        let content = match content {
            Some(text) if !text.is_empty() => format!("@everyone {text}"),
            _ => "@everyone".to_string(),
        };
        Self { content, embeds }
    }

    pub(crate) fn embed(embed: Embed) -> Self {
        Self::new(None, vec![embed])
    }
}

/// 通知送信の抽象。テストでは記録用の実装に差し替える。
#[async_trait]
pub(crate) trait Notifier: Send + Sync {
    async fn send(&self, channel: WebhookChannel, message: WebhookMessage) -> Result<()>;
}

/// Discordクライアントの設定。
#[derive(Debug, Clone)]
pub(crate) struct DiscordConfig {
    pub(crate) admin_webhook_url: Option<String>,
    pub(crate) notification_webhook_url: Option<String>,
    pub(crate) connect_timeout: Duration,
    pub(crate) total_timeout: Duration,
}

#[derive(Debug, Clone)]
pub(crate) struct DiscordClient {
    client: Client,
    admin_url: Option<Url>,
    notification_url: Option<Url>,
}

impl DiscordClient {
    /// # Errors
    /// Webhook URLのパースまたはHTTPクライアントの構築に失敗した場合はエラーを返します。
    pub(crate) fn new(config: DiscordConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.total_timeout)
            .build()
            .context("failed to build discord HTTP client")?;

        let admin_url = config
            .admin_webhook_url
            .as_deref()
            .map(Url::parse)
            .transpose()
            .context("invalid admin webhook URL")?;
        let notification_url = config
            .notification_webhook_url
            .as_deref()
            .map(Url::parse)
            .transpose()
            .context("invalid notification webhook URL")?;

        if admin_url.is_none() {
            warn!("no admin Discord webhook URL configured");
        }
        if notification_url.is_none() {
            warn!("no notification Discord webhook URL configured");
        }

        Ok(Self {
            client,
            admin_url,
            notification_url,
        })
    }

    fn url_for(&self, channel: WebhookChannel) -> Option<&Url> {
        match channel {
            WebhookChannel::Admin => self.admin_url.as_ref(),
            WebhookChannel::Notification => self.notification_url.as_ref(),
        }
    }
}

#[async_trait]
impl Notifier for DiscordClient {
    async fn send(&self, channel: WebhookChannel, message: WebhookMessage) -> Result<()> {
        let Some(url) = self.url_for(channel) else {
            warn!(?channel, "no webhook URL provided, skipping message send");
            return Ok(());
        };

        self.client
            .post(url.clone())
            .json(&message)
            .send()
            .await
            .context("discord webhook request failed")?
            .error_for_status()
            .context("discord webhook returned error status")?;

        debug!(?channel, "sent message to webhook");
        Ok(())
    }
}
