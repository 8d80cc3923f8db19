use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    Attachment, CampaignInfluencer, CampaignStatus, CreatorSnapshot, Deal, DealStatus, DealTrigger,
    InfluencerStatus, PaymentStatus, Platform, Role,
};

// -- JWT Claims --

/// Claims issued by the external auth service. Dealroom only verifies them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub exp: usize,
}

// -- Conversations --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpenConversationRequest {
    pub creator_id: Uuid,
    pub brand_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MessageQuery {
    /// Cursor of the last message already seen, `<rfc3339>~<seq>`.
    #[serde(default)]
    pub since: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MarkReadResponse {
    pub marked: usize,
}

// -- Deals --

/// Terms a brand or creator proposes when opening a deal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DealProposal {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub platform: Platform,
    #[serde(default)]
    pub content_type: Option<String>,
    /// Checklist descriptions; every item starts incomplete.
    #[serde(default)]
    pub deliverables: Vec<String>,
    pub amount: i64,
    /// Overrides the configured platform rate when present.
    #[serde(default)]
    pub platform_fee: Option<i64>,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub delivery_days: Option<u32>,
    #[serde(default)]
    pub max_revisions: Option<u32>,
    #[serde(default)]
    pub campaign_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateDealTermsRequest {
    pub expected_version: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub amount: Option<i64>,
    /// Replaces the whole checklist.
    #[serde(default)]
    pub deliverables: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransitionDealRequest {
    pub trigger: DealTrigger,
    pub expected_version: i64,
    /// Delivery message or revision note, posted into the deal's thread.
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateDeliverableRequest {
    pub expected_version: i64,
    pub is_completed: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct DealQuery {
    #[serde(default)]
    pub status: Option<DealStatus>,
}

/// A deal as presented to callers, with its derived fields spelled out.
#[derive(Debug, Serialize, Deserialize)]
pub struct DealResponse {
    #[serde(flatten)]
    pub deal: Deal,
    pub creator_payout: i64,
    pub is_active: bool,
    pub needs_attention: bool,
}

impl From<Deal> for DealResponse {
    fn from(deal: Deal) -> Self {
        Self {
            creator_payout: deal.creator_payout(),
            is_active: deal.status.is_active(),
            needs_attention: deal.status.needs_attention(),
            deal,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubmitReviewRequest {
    pub rating: u8,
    pub comment: String,
}

// -- Campaigns --

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCampaignRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub budget: Option<i64>,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub goal_reach: Option<i64>,
    #[serde(default)]
    pub goal_engagement: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateCampaignStatusRequest {
    pub status: CampaignStatus,
    pub expected_version: i64,
}

/// Shortlist a creator into a campaign, optionally formalising a deal.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttachInfluencerRequest {
    pub creator_id: Uuid,
    pub snapshot: CreatorSnapshot,
    #[serde(default)]
    pub offered_price: Option<i64>,
    #[serde(default)]
    pub agreed_price: Option<i64>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub deal: Option<DealProposal>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateInfluencerRequest {
    pub expected_version: i64,
    #[serde(default)]
    pub status: Option<InfluencerStatus>,
    #[serde(default)]
    pub offered_price: Option<i64>,
    #[serde(default)]
    pub agreed_price: Option<i64>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub post_url: Option<String>,
    #[serde(default)]
    pub payment_status: Option<PaymentStatus>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AttachInfluencerResponse {
    pub link: CampaignInfluencer,
    pub deal: Option<DealResponse>,
    /// False when the creator was already on the campaign and the link was updated.
    pub created: bool,
}

#[derive(Debug, Deserialize)]
pub struct RemoveInfluencerQuery {
    pub expected_version: i64,
}
