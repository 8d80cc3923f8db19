use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::time::{format_timestamp, parse_timestamp};

/// Returned when a stored or submitted string does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Declares a unit enum stored as a lowercase string column.
macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownVariant {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

string_enum! {
    /// Role asserted by the authentication collaborator.
    Role {
        Creator => "creator",
        Brand => "brand",
        System => "system",
    }
}

string_enum! {
    Platform {
        Instagram => "instagram",
        Youtube => "youtube",
        Tiktok => "tiktok",
        Twitter => "twitter",
        Linkedin => "linkedin",
        Newsletter => "newsletter",
        Podcast => "podcast",
        Other => "other",
    }
}

string_enum! {
    DealStatus {
        Pending => "pending",
        Accepted => "accepted",
        Paid => "paid",
        InProgress => "in_progress",
        Delivered => "delivered",
        Revision => "revision",
        Completed => "completed",
        Cancelled => "cancelled",
        Disputed => "disputed",
    }
}

string_enum! {
    /// Events that move a deal through its lifecycle.
    DealTrigger {
        Accept => "accept",
        Withdraw => "withdraw",
        FundsCaptured => "funds_captured",
        StartWork => "start_work",
        Deliver => "deliver",
        RequestRevision => "request_revision",
        Approve => "approve",
        Dispute => "dispute",
        Cancel => "cancel",
    }
}

string_enum! {
    CampaignStatus {
        Draft => "draft",
        Active => "active",
        Paused => "paused",
        Completed => "completed",
    }
}

string_enum! {
    /// Funnel position of a creator inside a campaign.
    InfluencerStatus {
        Shortlisted => "shortlisted",
        Contacted => "contacted",
        Negotiating => "negotiating",
        Agreed => "agreed",
        ContentPosted => "content_posted",
        Completed => "completed",
        Declined => "declined",
    }
}

string_enum! {
    PaymentStatus {
        Pending => "pending",
        Paid => "paid",
        Failed => "failed",
    }
}

string_enum! {
    AttachmentKind {
        Image => "image",
        File => "file",
        Video => "video",
        Link => "link",
    }
}

impl DealStatus {
    /// Completed, cancelled and disputed deals accept no further triggers.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Disputed)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Accepted | Self::Paid | Self::InProgress)
    }

    /// Brand-facing: a delivery is waiting for review.
    pub fn needs_attention(&self) -> bool {
        matches!(self, Self::Delivered)
    }

    /// Funds are committed from `paid` onward.
    pub fn is_payout_eligible(&self) -> bool {
        matches!(
            self,
            Self::Paid | Self::InProgress | Self::Delivered | Self::Revision | Self::Completed
        )
    }
}

/// One item of work the creator has to tick off before delivering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deliverable {
    pub id: Uuid,
    pub description: String,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

/// A single paid engagement between one brand and one creator.
///
/// Money fields are integer minor units. `creator_payout` is always derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub brand_id: Uuid,
    pub campaign_id: Option<Uuid>,
    pub conversation_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub platform: Platform,
    pub content_type: Option<String>,
    #[serde(default)]
    pub deliverables: Vec<Deliverable>,
    pub amount: i64,
    pub platform_fee: i64,
    pub status: DealStatus,
    pub deadline: Option<DateTime<Utc>>,
    pub delivery_days: u32,
    pub max_revisions: u32,
    pub revision_count: u32,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub funded_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub disputed_at: Option<DateTime<Utc>>,
}

impl Deal {
    pub fn creator_payout(&self) -> i64 {
        self.amount - self.platform_fee
    }

    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.creator_id == user_id || self.brand_id == user_id
    }

    /// The other party of the deal, if `user_id` is one of them.
    pub fn counterpart(&self, user_id: Uuid) -> Option<Uuid> {
        if user_id == self.creator_id {
            Some(self.brand_id)
        } else if user_id == self.brand_id {
            Some(self.creator_id)
        } else {
            None
        }
    }

    pub fn deliverables_complete(&self) -> bool {
        self.deliverables.iter().all(|d| d.is_completed)
    }

    /// Terms are renegotiable only until the creator accepts.
    pub fn terms_locked(&self) -> bool {
        self.status != DealStatus::Pending
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub budget: Option<i64>,
    pub status: CampaignStatus,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub goal_reach: Option<i64>,
    pub goal_engagement: Option<f64>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Creator metrics captured when the creator was shortlisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatorSnapshot {
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub total_followers: i64,
    #[serde(default)]
    pub engagement_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignInfluencer {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub creator_id: Uuid,
    pub snapshot: CreatorSnapshot,
    pub status: InfluencerStatus,
    pub offered_price: Option<i64>,
    pub agreed_price: Option<i64>,
    pub notes: Option<String>,
    pub contact_date: Option<DateTime<Utc>>,
    pub agreement_date: Option<DateTime<Utc>>,
    pub post_date: Option<DateTime<Utc>>,
    pub post_url: Option<String>,
    pub payment_status: PaymentStatus,
    pub deal_id: Option<Uuid>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A persistent thread between exactly one brand and one creator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub brand_id: Uuid,
    pub deal_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.creator_id == user_id || self.brand_id == user_id
    }

    pub fn counterpart(&self, user_id: Uuid) -> Option<Uuid> {
        if user_id == self.creator_id {
            Some(self.brand_id)
        } else if user_id == self.brand_id {
            Some(self.creator_id)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub kind: AttachmentKind,
    pub url: String,
    pub name: String,
    #[serde(default)]
    pub size: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub attachments: Vec<Attachment>,
    pub is_read: bool,
    pub is_system: bool,
    pub seq: i64,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn cursor(&self) -> MessageCursor {
        MessageCursor {
            created_at: self.created_at,
            seq: self.seq,
        }
    }
}

/// Inbox row: the conversation plus figures derived from its messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub last_message_at: Option<DateTime<Utc>>,
    pub last_message_preview: Option<String>,
    pub unread_count: i64,
}

/// Position in a conversation's (created_at, seq) order.
///
/// Rendered as `<rfc3339>~<seq>` so it can travel in a query string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MessageCursor {
    pub created_at: DateTime<Utc>,
    pub seq: i64,
}

impl fmt::Display for MessageCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}~{}", format_timestamp(&self.created_at), self.seq)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed message cursor '{0}'")]
pub struct InvalidCursor(pub String);

impl FromStr for MessageCursor {
    type Err = InvalidCursor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (ts, seq) = s.rsplit_once('~').ok_or_else(|| InvalidCursor(s.to_string()))?;
        let created_at = parse_timestamp(ts).map_err(|_| InvalidCursor(s.to_string()))?;
        let seq = seq.parse().map_err(|_| InvalidCursor(s.to_string()))?;
        Ok(Self { created_at, seq })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub deal_id: Uuid,
    pub reviewer_id: Uuid,
    pub reviewee_id: Uuid,
    pub rating: u8,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

/// Rollups computed on read for a campaign. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignAggregates {
    pub campaign_id: Uuid,
    pub influencer_count: usize,
    pub by_status: BTreeMap<InfluencerStatus, usize>,
    /// Links at `agreed` or further along the funnel, excluding declines.
    pub agreed_count: usize,
    pub total_spent: i64,
    pub total_reach: i64,
    pub budget_remaining: Option<i64>,
    pub progress: Option<f64>,
    pub goal_reach_progress: Option<f64>,
}
