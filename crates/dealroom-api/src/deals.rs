use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use dealroom_core::Actor;
use dealroom_types::api::{
    DealQuery, DealResponse, SubmitReviewRequest, TransitionDealRequest, UpdateDealTermsRequest,
    UpdateDeliverableRequest,
};

use crate::error::ApiResult;
use crate::{AppState, blocking};

pub async fn list_deals(
    State(state): State<AppState>,
    Query(query): Query<DealQuery>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<impl IntoResponse> {
    let deals = blocking(&state, move |wf| wf.list_deals(&actor, query.status)).await?;
    Ok(Json(
        deals.into_iter().map(DealResponse::from).collect::<Vec<_>>(),
    ))
}

pub async fn get_deal(
    State(state): State<AppState>,
    Path(deal_id): Path<Uuid>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<impl IntoResponse> {
    let deal = blocking(&state, move |wf| wf.get_deal(&actor, deal_id)).await?;
    Ok(Json(DealResponse::from(deal)))
}

pub async fn update_terms(
    State(state): State<AppState>,
    Path(deal_id): Path<Uuid>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<UpdateDealTermsRequest>,
) -> ApiResult<impl IntoResponse> {
    let outcome = blocking(&state, move |wf| wf.update_deal_terms(&actor, deal_id, req)).await?;
    state.notifier.publish(outcome.notifications);
    Ok(Json(DealResponse::from(outcome.value)))
}

pub async fn transition(
    State(state): State<AppState>,
    Path(deal_id): Path<Uuid>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<TransitionDealRequest>,
) -> ApiResult<impl IntoResponse> {
    let outcome = blocking(&state, move |wf| {
        wf.transition_deal_with_note(
            &actor,
            deal_id,
            req.trigger,
            req.expected_version,
            req.note.as_deref(),
        )
    })
    .await?;

    state.notifier.publish(outcome.notifications);
    Ok(Json(DealResponse::from(outcome.value)))
}

pub async fn update_deliverable(
    State(state): State<AppState>,
    Path((deal_id, deliverable_id)): Path<(Uuid, Uuid)>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<UpdateDeliverableRequest>,
) -> ApiResult<impl IntoResponse> {
    let deal = blocking(&state, move |wf| {
        wf.update_deliverable(
            &actor,
            deal_id,
            deliverable_id,
            req.is_completed,
            req.expected_version,
        )
    })
    .await?;
    Ok(Json(DealResponse::from(deal)))
}

pub async fn submit_review(
    State(state): State<AppState>,
    Path(deal_id): Path<Uuid>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<SubmitReviewRequest>,
) -> ApiResult<impl IntoResponse> {
    let outcome = blocking(&state, move |wf| {
        wf.submit_review(&actor, deal_id, req.rating, &req.comment)
    })
    .await?;

    state.notifier.publish(outcome.notifications);
    Ok((StatusCode::CREATED, Json(outcome.value)))
}

pub async fn list_reviews(
    State(state): State<AppState>,
    Path(deal_id): Path<Uuid>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<impl IntoResponse> {
    let reviews = blocking(&state, move |wf| wf.list_reviews(&actor, deal_id)).await?;
    Ok(Json(reviews))
}
