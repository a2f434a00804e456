use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::warn;

use crate::{app::AppState, scheduler::TaskKind};

/// Runs a task on demand and reports its outcome.
pub(crate) async fn run_task(
    State(state): State<AppState>,
    Path(task): Path<String>,
) -> impl IntoResponse {
    let task = match task.parse::<TaskKind>() {
        Ok(task) => task,
        Err(error) => {
            warn!(%error, "rejected manual task");
            return (StatusCode::BAD_REQUEST, error.to_string()).into_response();
        }
    };

    state.telemetry().record_manual_task_invocation(task.as_str());
    match state.scheduler().run_task(task).await {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(error) => {
            warn!(%task, error = %format!("{error:#}"), "manual task failed");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("{error:#}")).into_response()
        }
    }
}
