/// エラー分類とリトライ判定ユーティリティ。
use anyhow::Error;
use reqwest::StatusCode;
use sqlx::Error as SqlxError;

use crate::oauth::OAuthError;

/// エラーの種類。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorKind {
    /// リトライ可能なエラー（一時的なネットワークエラー、タイムアウトなど）
    Retryable,
    /// リトライ不可能なエラー（バリデーションエラーなど）
    NonRetryable,
    /// 致命的なエラー（認証エラー、設定エラーなど）。実行全体を中断する。
    Fatal,
}

/// エラーを分類する。
#[must_use]
pub(crate) fn classify_error(error: &Error) -> ErrorKind {
    if error.downcast_ref::<OAuthError>().is_some() {
        return ErrorKind::Fatal;
    }

    if let Some(reqwest_err) = error.downcast_ref::<reqwest::Error>() {
        if reqwest_err.is_timeout() || reqwest_err.is_connect() {
            return ErrorKind::Retryable;
        }

        if let Some(status) = reqwest_err.status() {
            return classify_status(status);
        }
    }

    if let Some(sqlx_err) = error.downcast_ref::<SqlxError>() {
        match sqlx_err {
            SqlxError::PoolTimedOut | SqlxError::PoolClosed | SqlxError::Io(_) => {
                return ErrorKind::Retryable;
            }
            SqlxError::RowNotFound => return ErrorKind::NonRetryable,
            SqlxError::Configuration(_) => return ErrorKind::Fatal,
            _ => {}
        }
    }

    ErrorKind::NonRetryable
}

/// HTTPステータスコードを分類する。
#[must_use]
pub(crate) fn classify_status(status: StatusCode) -> ErrorKind {
    match status {
        // 5xx と 429 はリトライ可能
        s if s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS => ErrorKind::Retryable,
        // 認証・認可エラーは致命的
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ErrorKind::Fatal,
        _ => ErrorKind::NonRetryable,
    }
}

#[must_use]
pub(crate) fn is_retryable(error: &Error) -> bool {
    matches!(classify_error(error), ErrorKind::Retryable)
}

/// エラーが致命的かどうかを判定する。
#[must_use]
pub(crate) fn is_fatal(error: &Error) -> bool {
    matches!(classify_error(error), ErrorKind::Fatal)
}
