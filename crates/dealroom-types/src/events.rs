use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{DealStatus, DealTrigger};

/// Something a participant should hear about. Produced by the workflow,
/// delivered (email, push, ...) by an external collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationIntent {
    pub recipient_id: Uuid,
    pub event: NotificationEvent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum NotificationEvent {
    /// A new deal is waiting for the recipient's answer
    DealProposed {
        deal_id: Uuid,
        title: String,
        amount: i64,
    },

    /// The counterpart moved a deal
    DealStatusChanged {
        deal_id: Uuid,
        trigger: DealTrigger,
        from: DealStatus,
        to: DealStatus,
    },

    /// Creator submitted work; the brand has to review it
    DeliveryReady { deal_id: Uuid },

    /// Brand approved the delivery
    PayoutReleased { deal_id: Uuid, creator_payout: i64 },

    MessagePosted {
        conversation_id: Uuid,
        message_id: Uuid,
        sender_id: Uuid,
        preview: String,
    },

    /// A brand shortlisted the recipient into a campaign
    CampaignInvite { campaign_id: Uuid, link_id: Uuid },

    ReviewReceived {
        deal_id: Uuid,
        review_id: Uuid,
        rating: u8,
    },
}

impl NotificationEvent {
    /// Returns the deal this event concerns, if any.
    pub fn deal_id(&self) -> Option<Uuid> {
        match self {
            Self::DealProposed { deal_id, .. }
            | Self::DealStatusChanged { deal_id, .. }
            | Self::DeliveryReady { deal_id }
            | Self::PayoutReleased { deal_id, .. }
            | Self::ReviewReceived { deal_id, .. } => Some(*deal_id),
            Self::MessagePosted { .. } | Self::CampaignInvite { .. } => None,
        }
    }
}
