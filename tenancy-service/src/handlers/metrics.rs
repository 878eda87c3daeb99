use axum::extract::State;

use crate::AppState;

/// Prometheus exposition of the recorder installed at startup.
pub async fn metrics(State(state): State<AppState>) -> String {
    state.metrics_handle.render()
}
