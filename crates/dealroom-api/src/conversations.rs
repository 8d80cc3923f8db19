use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use dealroom_core::Actor;
use dealroom_types::api::{
    DealResponse, DealProposal, MarkReadResponse, MessageQuery, OpenConversationRequest,
    SendMessageRequest,
};
use dealroom_types::models::MessageCursor;

use crate::error::{ApiError, ApiResult};
use crate::{AppState, blocking};

pub async fn open_conversation(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<OpenConversationRequest>,
) -> ApiResult<impl IntoResponse> {
    let conversation = blocking(&state, move |wf| {
        wf.open_conversation(&actor, req.creator_id, req.brand_id)
    })
    .await?;
    Ok(Json(conversation))
}

pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<impl IntoResponse> {
    let summaries = blocking(&state, move |wf| wf.list_conversations(&actor)).await?;
    Ok(Json(summaries))
}

pub async fn get_messages(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Query(query): Query<MessageQuery>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<impl IntoResponse> {
    let since = query
        .since
        .as_deref()
        .map(str::parse::<MessageCursor>)
        .transpose()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let messages = blocking(&state, move |wf| {
        wf.list_messages(&actor, conversation_id, since, query.limit)
    })
    .await?;
    Ok(Json(messages))
}

pub async fn send_message(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    let outcome = blocking(&state, move |wf| {
        wf.post_message(&actor, conversation_id, &req.content, req.attachments)
    })
    .await?;

    state.notifier.publish(outcome.notifications);
    Ok((StatusCode::CREATED, Json(outcome.value)))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<impl IntoResponse> {
    let marked = blocking(&state, move |wf| wf.mark_read(&actor, conversation_id)).await?;
    Ok(Json(MarkReadResponse { marked }))
}

pub async fn create_deal(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Extension(actor): Extension<Actor>,
    Json(proposal): Json<DealProposal>,
) -> ApiResult<impl IntoResponse> {
    let outcome = blocking(&state, move |wf| {
        wf.create_deal_from_conversation(&actor, conversation_id, proposal)
    })
    .await?;

    state.notifier.publish(outcome.notifications);
    Ok((StatusCode::CREATED, Json(DealResponse::from(outcome.value))))
}
