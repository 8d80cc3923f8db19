use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use dealroom_core::Actor;
use dealroom_types::api::{
    AttachInfluencerRequest, AttachInfluencerResponse, CreateCampaignRequest, DealResponse,
    RemoveInfluencerQuery, UpdateCampaignStatusRequest, UpdateInfluencerRequest,
};

use crate::error::ApiResult;
use crate::{AppState, blocking};

pub async fn create_campaign(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<CreateCampaignRequest>,
) -> ApiResult<impl IntoResponse> {
    let campaign = blocking(&state, move |wf| wf.create_campaign(&actor, req)).await?;
    Ok((StatusCode::CREATED, Json(campaign)))
}

pub async fn list_campaigns(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<impl IntoResponse> {
    let campaigns = blocking(&state, move |wf| wf.list_campaigns(&actor)).await?;
    Ok(Json(campaigns))
}

pub async fn get_campaign(
    State(state): State<AppState>,
    Path(campaign_id): Path<Uuid>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<impl IntoResponse> {
    let campaign = blocking(&state, move |wf| wf.get_campaign(&actor, campaign_id)).await?;
    Ok(Json(campaign))
}

pub async fn update_status(
    State(state): State<AppState>,
    Path(campaign_id): Path<Uuid>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<UpdateCampaignStatusRequest>,
) -> ApiResult<impl IntoResponse> {
    let campaign = blocking(&state, move |wf| {
        wf.update_campaign_status(&actor, campaign_id, req.status, req.expected_version)
    })
    .await?;
    Ok(Json(campaign))
}

pub async fn aggregates(
    State(state): State<AppState>,
    Path(campaign_id): Path<Uuid>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<impl IntoResponse> {
    let aggregates =
        blocking(&state, move |wf| wf.campaign_aggregates(&actor, campaign_id)).await?;
    Ok(Json(aggregates))
}

pub async fn list_influencers(
    State(state): State<AppState>,
    Path(campaign_id): Path<Uuid>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<impl IntoResponse> {
    let links = blocking(&state, move |wf| {
        wf.list_campaign_influencers(&actor, campaign_id)
    })
    .await?;
    Ok(Json(links))
}

pub async fn attach_influencer(
    State(state): State<AppState>,
    Path(campaign_id): Path<Uuid>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<AttachInfluencerRequest>,
) -> ApiResult<impl IntoResponse> {
    let outcome = blocking(&state, move |wf| {
        wf.attach_to_campaign(&actor, campaign_id, req)
    })
    .await?;

    state.notifier.publish(outcome.notifications);

    let shortlisted = outcome.value;
    let status = if shortlisted.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(AttachInfluencerResponse {
            link: shortlisted.link,
            deal: shortlisted.deal.map(DealResponse::from),
            created: shortlisted.created,
        }),
    ))
}

pub async fn update_influencer(
    State(state): State<AppState>,
    Path((campaign_id, link_id)): Path<(Uuid, Uuid)>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<UpdateInfluencerRequest>,
) -> ApiResult<impl IntoResponse> {
    let link = blocking(&state, move |wf| {
        wf.update_campaign_influencer(&actor, campaign_id, link_id, req)
    })
    .await?;
    Ok(Json(link))
}

pub async fn remove_influencer(
    State(state): State<AppState>,
    Path((campaign_id, link_id)): Path<(Uuid, Uuid)>,
    Query(query): Query<RemoveInfluencerQuery>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<impl IntoResponse> {
    blocking(&state, move |wf| {
        wf.remove_campaign_influencer(&actor, campaign_id, link_id, query.expected_version)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}
