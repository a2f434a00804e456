use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::app::AppState;

#[derive(Debug, Deserialize)]
pub(crate) struct CallbackParams {
    code: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CallbackResponse {
    message: String,
}

impl CallbackResponse {
    fn new(message: impl Into<String>) -> (StatusCode, Json<Self>) {
        (
            StatusCode::OK,
            Json(Self {
                message: message.into(),
            }),
        )
    }

    fn rejected(message: impl Into<String>) -> (StatusCode, Json<Self>) {
        (
            StatusCode::BAD_REQUEST,
            Json(Self {
                message: message.into(),
            }),
        )
    }
}

/// Google の同意画面からのリダイレクト先。認可コードをトークンに交換して保存する。
pub(crate) async fn oauth_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> (StatusCode, Json<CallbackResponse>) {
    state.telemetry().record_oauth_callback();

    let Some(code) = params.code.filter(|code| !code.is_empty()) else {
        return CallbackResponse::rejected("Missing authorization code");
    };

    match state.tokens().handle_callback(&code).await {
        Ok(()) => CallbackResponse::new("Authentication successful! You can close this window."),
        Err(error) => {
            warn!(error = %format!("{error:#}"), "oauth callback rejected");
            CallbackResponse::rejected(format!("Authentication failed: {error:#}"))
        }
    }
}
