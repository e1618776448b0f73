//! Webhook handler for ping and push events

use axum::{
    body::Bytes,
    extract::State as AxumState,
    http::{HeaderMap, Method, StatusCode},
};
use tracing::{debug, error, info, warn};

use crate::SharedState;
use crate::auth::WebhookEvent;
use crate::config::load_config;
use crate::error::WebhookError;
use crate::filter;
use crate::payload::PushEvent;
use crate::rate_limit::WEBHOOK_KEY;
use crate::resolver::resolve_listener;

/// Handles a webhook delivery.
///
/// The response is sent only after the deployment has finished, successfully
/// or not. Its status is all the sender learns.
pub async fn handle_webhook(
    AxumState(state): AxumState<SharedState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, WebhookError> {
    let event = state
        .authenticator
        .authenticate(&method, &headers)
        .map_err(|rejection| {
            warn!("Rejected webhook request: {}", rejection);
            WebhookError::Forbidden
        })?;

    // Only authenticated deliveries count against the shared budget
    {
        let mut rate_limiter = state.rate_limiter.lock().await;
        if rate_limiter.check_rate_limit(WEBHOOK_KEY) {
            warn!(
                "Too many webhook requests - {} requests per {:?}",
                state.settings.rate_limit_max, state.settings.rate_limit_window
            );
            return Err(WebhookError::RateLimited);
        }
    }

    if event == WebhookEvent::Ping {
        info!("Received ping event");
        return Ok(StatusCode::OK);
    }

    let payload: PushEvent = serde_json::from_slice(&body).map_err(|e| {
        info!("Could not parse JSON body: {:?}", e);
        WebhookError::Validation(format!("invalid push payload: {}", e))
    })?;
    debug!("{:#?}", &payload);

    // Reloaded on every delivery so edits apply without a restart
    let config = load_config(&state.settings.config_dir).await.map_err(|e| {
        error!("Failed to load configuration: {}", e);
        WebhookError::from(e)
    })?;

    let listener = resolve_listener(&config, &payload)?;
    let Some(branch) = filter::approved_branch(listener, &payload) else {
        return Err(WebhookError::Forbidden);
    };

    let deployment = state.executor.execute(listener, branch, &config).await?;
    info!(
        "Deployed '{}' branch '{}' ({})",
        deployment.repository, deployment.branch, deployment.id
    );
    Ok(StatusCode::OK)
}
