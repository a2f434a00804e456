use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::clients::google_oauth::TokenResponse;

/// トークンの有効期限が近いとみなす猶予（ミリ秒）。
const REFRESH_MARGIN_MS: i64 = 5 * 60 * 1000;

/// 予約キーに保存するOAuthトークン。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthTokenRecord {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// 失効時刻（UNIXエポックからのミリ秒）
    pub expiry_date: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl OAuthTokenRecord {
    /// トークンエンドポイントの応答から保存用レコードを作る。
    ///
    /// 応答にリフレッシュトークンが無い場合は `previous_refresh` を引き継ぐ。
    pub(crate) fn from_response(
        response: TokenResponse,
        previous_refresh: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let lifetime = Duration::seconds(response.expires_in.unwrap_or(0));
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token.or(previous_refresh),
            expiry_date: (now + lifetime).timestamp_millis(),
            token_type: response.token_type,
            scope: response.scope,
        }
    }

    /// 失効済み、または5分以内に失効する場合に真。
    #[must_use]
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        self.expiry_date - now.timestamp_millis() <= REFRESH_MARGIN_MS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).single().expect("valid millis")
    }

    fn record(expiry_date: i64) -> OAuthTokenRecord {
        OAuthTokenRecord {
            access_token: "a".to_string(),
            refresh_token: Some("r".to_string()),
            expiry_date,
            token_type: None,
            scope: None,
        }
    }

    #[test]
    fn refresh_margin_is_five_minutes() {
        let now = at(1_700_000_000_000);
        assert!(record(now.timestamp_millis() + REFRESH_MARGIN_MS).needs_refresh(now));
        assert!(!record(now.timestamp_millis() + REFRESH_MARGIN_MS + 1).needs_refresh(now));
        assert!(record(now.timestamp_millis() - 1).needs_refresh(now));
    }

    #[test]
    fn previous_refresh_token_is_kept_when_absent() {
        let now = at(1_700_000_000_000);
        let response = TokenResponse {
            access_token: "new".to_string(),
            expires_in: Some(3600),
            refresh_token: None,
            token_type: Some("Bearer".to_string()),
            scope: None,
        };

        let stored = OAuthTokenRecord::from_response(response, Some("old-r".to_string()), now);

        assert_eq!(stored.refresh_token.as_deref(), Some("old-r"));
        assert_eq!(stored.expiry_date, now.timestamp_millis() + 3_600_000);
    }

    #[test]
    fn serialized_form_uses_flat_token_fields() {
        let json = serde_json::to_value(record(42)).expect("serializes");
        assert_eq!(json["expiry_date"], 42);
        assert_eq!(json["access_token"], "a");
        assert!(json.get("scope").is_none());
    }
}
