//! HTTP surface for the dealroom workflow.

pub mod campaigns;
pub mod conversations;
pub mod deals;
pub mod error;
pub mod middleware;
pub mod notifier;
pub mod router;

use std::sync::Arc;

use dealroom_core::{Workflow, WorkflowResult};
use tracing::error;

use crate::error::ApiError;
use crate::notifier::Notifier;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub workflow: Workflow,
    pub notifier: Notifier,
    pub jwt_secret: String,
}

/// Run a workflow call off the async runtime.
pub(crate) async fn blocking<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Workflow) -> WorkflowResult<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.workflow))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal("worker task failed".into())
        })?
        .map_err(ApiError::from)
}
