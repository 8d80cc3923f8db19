use axum::{
    Json, Router, middleware,
    response::IntoResponse,
    routing::{get, patch, post},
};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::middleware::require_auth;
use crate::{AppState, campaigns, conversations, deals};

/// Every route the service exposes, with auth, CORS and tracing applied.
pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new().route("/health", get(health));

    let protected_routes = Router::new()
        .route(
            "/conversations",
            get(conversations::list_conversations).post(conversations::open_conversation),
        )
        .route(
            "/conversations/{conversation_id}/messages",
            get(conversations::get_messages).post(conversations::send_message),
        )
        .route("/conversations/{conversation_id}/read", post(conversations::mark_read))
        .route("/conversations/{conversation_id}/deals", post(conversations::create_deal))
        .route("/deals", get(deals::list_deals))
        .route("/deals/{deal_id}", get(deals::get_deal).patch(deals::update_terms))
        .route("/deals/{deal_id}/status", patch(deals::transition))
        .route(
            "/deals/{deal_id}/deliverables/{deliverable_id}",
            patch(deals::update_deliverable),
        )
        .route(
            "/deals/{deal_id}/reviews",
            get(deals::list_reviews).post(deals::submit_review),
        )
        .route(
            "/campaigns",
            get(campaigns::list_campaigns).post(campaigns::create_campaign),
        )
        .route("/campaigns/{campaign_id}", get(campaigns::get_campaign))
        .route("/campaigns/{campaign_id}/status", patch(campaigns::update_status))
        .route("/campaigns/{campaign_id}/aggregates", get(campaigns::aggregates))
        .route(
            "/campaigns/{campaign_id}/influencers",
            get(campaigns::list_influencers).post(campaigns::attach_influencer),
        )
        .route(
            "/campaigns/{campaign_id}/influencers/{link_id}",
            patch(campaigns::update_influencer).delete(campaigns::remove_influencer),
        )
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}
