//! YouTube OAuth token lifecycle: consent link, code exchange and refresh.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    clients::{
        discord::{COLOR_FAILURE, COLOR_SUCCESS, Embed, Notifier, WebhookChannel, WebhookMessage},
        google_oauth::GoogleOAuthClient,
    },
    store::{OAuthTokenRecord, SongStore},
};

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("no OAuth token stored, complete the consent flow first")]
    TokenMissing,
    #[error("stored OAuth token has no refresh token")]
    RefreshTokenMissing,
    #[error("OAuth client is not configured: {0}")]
    NotConfigured(&'static str),
}

/// Outcome of [`TokenManager::check_token`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenStatus {
    Present,
    ConsentRequested,
}

pub(crate) struct TokenManager {
    store: Arc<dyn SongStore>,
    client: Option<GoogleOAuthClient>,
    notifier: Arc<dyn Notifier>,
}

impl TokenManager {
    pub(crate) fn new(
        store: Arc<dyn SongStore>,
        client: Option<GoogleOAuthClient>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            client,
            notifier,
        }
    }

    fn client(&self) -> Result<&GoogleOAuthClient, OAuthError> {
        self.client.as_ref().ok_or(OAuthError::NotConfigured(
            "GOOGLE_OAUTH_CLIENT_ID, GOOGLE_OAUTH_CLIENT_SECRET and BACKEND_HOST",
        ))
    }

    /// Returns an access token that stays valid for at least five minutes,
    /// refreshing and persisting it first when needed.
    ///
    /// # Errors
    /// [`OAuthError`] when no usable token exists; transport errors from the
    /// token endpoint or the store otherwise.
    pub(crate) async fn valid_access_token(&self) -> Result<String> {
        let stored = self
            .store
            .get_token()
            .await?
            .ok_or(OAuthError::TokenMissing)?;

        let now = Utc::now();
        if !stored.needs_refresh(now) {
            return Ok(stored.access_token);
        }

        debug!("access token expired or expiring soon, refreshing");
        let refresh_token = stored
            .refresh_token
            .clone()
            .ok_or(OAuthError::RefreshTokenMissing)?;
        let response = self.client()?.refresh(&refresh_token).await?;

        let refreshed = OAuthTokenRecord::from_response(response, Some(refresh_token), now);
        self.store
            .put_token(&refreshed)
            .await
            .context("failed to store refreshed token")?;

        info!("token refresh completed");
        Ok(refreshed.access_token)
    }

    /// Exchanges an authorization code and stores the resulting tokens.
    ///
    /// Posts a success or failure embed either way.
    ///
    /// # Errors
    /// Returns the exchange or storage failure after reporting it.
    pub(crate) async fn handle_callback(&self, code: &str) -> Result<()> {
        match self.exchange_and_store(code).await {
            Ok(()) => {
                let embed = Embed::new(
                    "✅ YouTube Authentication Successful",
                    "The application has been successfully authenticated with YouTube.",
                    COLOR_SUCCESS,
                )
                .field("Status", "OAuth tokens have been stored securely.")
                .field(
                    "Next Steps",
                    "Playlists will now be created and updated automatically.",
                );
                self.notify(WebhookChannel::Notification, embed).await;
                info!("oauth flow completed");
                Ok(())
            }
            Err(error) => {
                warn!(error = %format!("{error:#}"), "oauth callback failed");
                let embed = Embed::new(
                    "❌ YouTube Authentication Failed",
                    "Failed to complete the authentication process.",
                    COLOR_FAILURE,
                )
                .field("Error", format!("{error:#}"));
                self.notify(WebhookChannel::Notification, embed).await;
                Err(error)
            }
        }
    }

    async fn exchange_and_store(&self, code: &str) -> Result<()> {
        let response = self.client()?.exchange_code(code).await?;
        let record = OAuthTokenRecord::from_response(response, None, Utc::now());
        self.store
            .put_token(&record)
            .await
            .context("failed to store oauth token")
    }

    /// Posts the consent link to the admin webhook when no token is stored.
    ///
    /// # Errors
    /// Store failures, or [`OAuthError::NotConfigured`] when a link is needed
    /// but cannot be built.
    pub(crate) async fn check_token(&self) -> Result<TokenStatus> {
        if self.store.get_token().await?.is_some() {
            info!("oauth token exists");
            return Ok(TokenStatus::Present);
        }

        warn!("no oauth token stored, requesting consent");
        let consent_url = self.client()?.consent_url()?;
        let embed = Embed::new(
            "🔑 YouTube OAuth Authentication Required",
            "The application needs YouTube OAuth authentication to function properly.",
            COLOR_FAILURE,
        )
        .field(
            "Action Required",
            "Please click the link below to authenticate with YouTube:",
        )
        .field("Authentication Link", consent_url.as_str())
        .footer("This link grants the permissions needed to manage YouTube playlists");

        self.notifier
            .send(WebhookChannel::Admin, WebhookMessage::embed(embed))
            .await
            .context("failed to send oauth consent link")?;

        info!("sent oauth consent link");
        Ok(TokenStatus::ConsentRequested)
    }

    async fn notify(&self, channel: WebhookChannel, embed: Embed) {
        if let Err(error) = self
            .notifier
            .send(channel, WebhookMessage::embed(embed))
            .await
        {
            warn!(error = %format!("{error:#}"), "failed to send oauth notification");
        }
    }
}
