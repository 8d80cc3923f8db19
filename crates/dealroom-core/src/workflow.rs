//! The operations the HTTP layer calls. Each one takes the verified
//! [`Actor`], does its reads and writes in one store transaction and returns
//! the notifications the counterpart should receive.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::info;
use uuid::Uuid;

use dealroom_db::Database;
use dealroom_db::queries::{campaigns, conversations, deals, reviews};
use dealroom_types::api::{
    AttachInfluencerRequest, CreateCampaignRequest, DealProposal, UpdateDealTermsRequest,
    UpdateInfluencerRequest,
};
use dealroom_types::events::{NotificationEvent, NotificationIntent};
use dealroom_types::models::{
    Attachment, Campaign, CampaignAggregates, CampaignInfluencer, CampaignStatus, Conversation,
    ConversationSummary, CreatorSnapshot, Deal, DealStatus, DealTrigger, InfluencerStatus,
    Message, MessageCursor, PaymentStatus, Review, Role,
};

use crate::campaign;
use crate::conversation::{self, ConversationService};
use crate::deal::{self, Transition};
use crate::error::{WorkflowError, WorkflowResult, settle};
use crate::{Actor, Clock, WorkflowConfig};

const PREVIEW_CHARS: usize = 100;
const MAX_REVIEW_CHARS: usize = 2_000;
const MAX_NOTE_CHARS: usize = 2_000;

/// A result plus whoever needs to hear about it.
#[derive(Debug, Clone)]
pub struct Outcome<T> {
    pub value: T,
    pub notifications: Vec<NotificationIntent>,
}

impl<T> Outcome<T> {
    fn new(value: T, notifications: Vec<NotificationIntent>) -> Self {
        Self {
            value,
            notifications,
        }
    }
}

/// A creator's place on a campaign after `attach_to_campaign`.
#[derive(Debug, Clone)]
pub struct Shortlisted {
    pub link: CampaignInfluencer,
    pub deal: Option<Deal>,
    pub created: bool,
}

pub struct Workflow {
    db: Arc<Database>,
    clock: Arc<dyn Clock>,
    config: WorkflowConfig,
    conversations: ConversationService,
}

impl Workflow {
    pub fn new(db: Arc<Database>, clock: Arc<dyn Clock>, config: WorkflowConfig) -> Self {
        let conversations = ConversationService::new(db.clone(), clock.clone());
        Self {
            db,
            clock,
            config,
            conversations,
        }
    }

    // -- Conversations --

    pub fn open_conversation(
        &self,
        actor: &Actor,
        creator_id: Uuid,
        brand_id: Uuid,
    ) -> WorkflowResult<Conversation> {
        conversation::ensure_own_side(actor, creator_id, brand_id)?;
        self.conversations.get_or_create_conversation(creator_id, brand_id)
    }

    pub fn list_conversations(&self, actor: &Actor) -> WorkflowResult<Vec<ConversationSummary>> {
        self.conversations.list_conversations(actor.user_id)
    }

    pub fn list_messages(
        &self,
        actor: &Actor,
        conversation_id: Uuid,
        after: Option<MessageCursor>,
        limit: Option<u32>,
    ) -> WorkflowResult<Vec<Message>> {
        self.conversations
            .list_messages(conversation_id, actor.user_id, after, limit)
    }

    pub fn post_message(
        &self,
        actor: &Actor,
        conversation_id: Uuid,
        content: &str,
        attachments: Vec<Attachment>,
    ) -> WorkflowResult<Outcome<Message>> {
        let message =
            self.conversations
                .append_message(conversation_id, actor.user_id, content, attachments)?;

        let conversation = self
            .conversations
            .get_for_participant(conversation_id, actor.user_id)?;
        let notifications = conversation
            .counterpart(actor.user_id)
            .map(|recipient_id| NotificationIntent {
                recipient_id,
                event: NotificationEvent::MessagePosted {
                    conversation_id,
                    message_id: message.id,
                    sender_id: actor.user_id,
                    preview: message.content.chars().take(PREVIEW_CHARS).collect(),
                },
            })
            .into_iter()
            .collect();

        Ok(Outcome::new(message, notifications))
    }

    pub fn mark_read(&self, actor: &Actor, conversation_id: Uuid) -> WorkflowResult<usize> {
        self.conversations.mark_read(conversation_id, actor.user_id)
    }

    // -- Deals --

    /// Propose a deal inside a negotiation thread.
    ///
    /// The thread may carry one open deal at a time. Its deal pointer is
    /// swapped against the value read at the start, so two proposals racing
    /// on the same thread cannot both win.
    pub fn create_deal_from_conversation(
        &self,
        actor: &Actor,
        conversation_id: Uuid,
        proposal: DealProposal,
    ) -> WorkflowResult<Outcome<Deal>> {
        let now = self.clock.now();

        let (deal, invite) = self.db.transaction(|conn| {
            let conversation = conversation::load(conn, conversation_id)?;
            conversation::ensure_participant(&conversation, actor.user_id)?;
            conversation::ensure_own_side(actor, conversation.creator_id, conversation.brand_id)?;

            if let Some(current_id) = conversation.deal_id {
                let current = load_deal(conn, current_id)?;
                if !current.status.is_terminal() {
                    return Err(WorkflowError::invalid(
                        "this conversation already has an open deal",
                    ));
                }
            }

            let mut deal = self.build_deal(
                &proposal,
                conversation.creator_id,
                conversation.brand_id,
                now,
            )?;
            deal.conversation_id = Some(conversation.id);

            let campaign = match proposal.campaign_id {
                Some(campaign_id) => {
                    if actor.user_id != conversation.brand_id {
                        return Err(WorkflowError::forbidden(
                            "only the brand can file a deal under a campaign",
                        ));
                    }
                    Some(load_owned_campaign(conn, campaign_id, actor)?)
                }
                None => None,
            };

            deal.campaign_id = campaign.as_ref().map(|c| c.id);
            deals::insert_deal(conn, &deal)?;

            let mut invite = None;
            if let Some(campaign) = campaign {
                let (link, created) = upsert_link(
                    conn,
                    &campaign,
                    deal.creator_id,
                    LinkTerms::default(),
                    Some(&deal),
                    now,
                )?;
                if created {
                    invite = Some(link.id);
                }
            }

            if !conversations::bind_conversation_deal(
                conn,
                conversation.id,
                conversation.deal_id,
                deal.id,
            )? {
                return Err(WorkflowError::StaleState {
                    entity: "conversation",
                    id: conversation.id,
                    expected: None,
                    actual: None,
                });
            }

            conversation::append_in(
                conn,
                &conversation,
                actor.user_id,
                &format!("Deal proposed: {}", deal.title),
                vec![],
                true,
                now,
            )?;

            Ok((deal, invite))
        })?;

        info!(
            "Deal {} proposed in conversation {} ({} minor units)",
            deal.id, conversation_id, deal.amount
        );

        let mut notifications = Vec::new();
        if let Some(recipient_id) = deal.counterpart(actor.user_id) {
            notifications.push(proposed_notice(recipient_id, &deal));
        }
        if let (Some(link_id), Some(campaign_id)) = (invite, deal.campaign_id) {
            notifications.push(NotificationIntent {
                recipient_id: deal.creator_id,
                event: NotificationEvent::CampaignInvite {
                    campaign_id,
                    link_id,
                },
            });
        }
        Ok(Outcome::new(deal, notifications))
    }

    /// Pull `trigger` on a deal the caller last saw at `expected_version`.
    pub fn transition_deal(
        &self,
        actor: &Actor,
        deal_id: Uuid,
        trigger: DealTrigger,
        expected_version: i64,
    ) -> WorkflowResult<Outcome<Deal>> {
        self.transition_deal_with_note(actor, deal_id, trigger, expected_version, None)
    }

    /// Like [`Workflow::transition_deal`], with a free-text note (a delivery
    /// message or what to revise) appended to the thread's system message.
    pub fn transition_deal_with_note(
        &self,
        actor: &Actor,
        deal_id: Uuid,
        trigger: DealTrigger,
        expected_version: i64,
        note: Option<&str>,
    ) -> WorkflowResult<Outcome<Deal>> {
        let note = note.map(str::trim).filter(|n| !n.is_empty());
        if note.is_some_and(|n| n.chars().count() > MAX_NOTE_CHARS) {
            return Err(WorkflowError::invalid(format!(
                "note exceeds {MAX_NOTE_CHARS} characters"
            )));
        }
        let now = self.clock.now();

        let (deal, transition) = self.db.transaction(|conn| {
            let current = load_deal(conn, deal_id)?;
            ensure_deal_access(&current, actor)?;
            if current.version != expected_version {
                return Err(WorkflowError::stale(
                    "deal",
                    deal_id,
                    expected_version,
                    current.version,
                ));
            }

            let (next, transition) = deal::advance(&current, actor, trigger, now)?;
            let stored = settle(
                deals::update_deal(conn, &next, expected_version)?,
                "deal",
                deal_id,
                expected_version,
            )?;

            if let Some(conversation_id) = stored.conversation_id {
                let conversation = conversation::load(conn, conversation_id)?;
                conversation::append_in(
                    conn,
                    &conversation,
                    actor.user_id,
                    &status_note(&transition, &stored, note),
                    vec![],
                    true,
                    now,
                )?;
            }

            Ok((stored, transition))
        })?;

        info!(
            "Deal {} {} -> {} via {} (v{})",
            deal.id, transition.from, transition.to, trigger, deal.version
        );

        let notifications = transition_notices(actor, &deal, &transition);
        Ok(Outcome::new(deal, notifications))
    }

    /// Rewrite the commercial terms of a deal that has not been accepted yet.
    /// A new amount re-derives the platform fee at the configured rate.
    pub fn update_deal_terms(
        &self,
        actor: &Actor,
        deal_id: Uuid,
        req: UpdateDealTermsRequest,
    ) -> WorkflowResult<Outcome<Deal>> {
        if req.title.is_none()
            && req.description.is_none()
            && req.deadline.is_none()
            && req.amount.is_none()
            && req.deliverables.is_none()
        {
            return Err(WorkflowError::invalid("nothing to update"));
        }
        let now = self.clock.now();
        if req.deadline.is_some_and(|d| d < now) {
            return Err(WorkflowError::invalid("deadline is in the past"));
        }
        let deliverables = req
            .deliverables
            .as_deref()
            .map(deal::new_deliverables)
            .transpose()?;

        let deal = self.db.transaction(|conn| {
            let current = load_deal(conn, deal_id)?;
            if !current.is_participant(actor.user_id) {
                return Err(WorkflowError::forbidden("not a participant in this deal"));
            }
            if current.version != req.expected_version {
                return Err(WorkflowError::stale(
                    "deal",
                    deal_id,
                    req.expected_version,
                    current.version,
                ));
            }
            if current.terms_locked() {
                return Err(WorkflowError::invalid(
                    "terms can only change while the deal is pending",
                ));
            }

            let mut next = current.clone();
            if let Some(title) = &req.title {
                if title.trim().is_empty() {
                    return Err(WorkflowError::invalid("deal title is required"));
                }
                next.title = title.clone();
            }
            if req.description.is_some() {
                next.description = req.description.clone();
            }
            if req.deadline.is_some() {
                next.deadline = req.deadline;
            }
            if let Some(amount) = req.amount {
                if amount < 0 {
                    return Err(WorkflowError::invalid("amount cannot be negative"));
                }
                next.amount = amount;
                next.platform_fee = self.config.fee_for(amount);
            }
            if let Some(deliverables) = deliverables {
                next.deliverables = deliverables;
            }
            next.updated_at = now;

            let stored = settle(
                deals::update_deal(conn, &next, req.expected_version)?,
                "deal",
                deal_id,
                req.expected_version,
            )?;

            if let Some(conversation_id) = stored.conversation_id {
                let conversation = conversation::load(conn, conversation_id)?;
                conversation::append_in(
                    conn,
                    &conversation,
                    actor.user_id,
                    &format!(
                        "Terms updated: {} for {} minor units",
                        stored.title, stored.amount
                    ),
                    vec![],
                    true,
                    now,
                )?;
            }
            Ok(stored)
        })?;

        let notifications = deal
            .counterpart(actor.user_id)
            .map(|recipient_id| proposed_notice(recipient_id, &deal))
            .into_iter()
            .collect();
        Ok(Outcome::new(deal, notifications))
    }

    /// Tick or untick one item of the deal's checklist.
    pub fn update_deliverable(
        &self,
        actor: &Actor,
        deal_id: Uuid,
        deliverable_id: Uuid,
        is_completed: bool,
        expected_version: i64,
    ) -> WorkflowResult<Deal> {
        let now = self.clock.now();
        self.db.transaction(|conn| {
            let current = load_deal(conn, deal_id)?;
            ensure_deal_access(&current, actor)?;
            if current.version != expected_version {
                return Err(WorkflowError::stale(
                    "deal",
                    deal_id,
                    expected_version,
                    current.version,
                ));
            }
            let next = deal::mark_deliverable(&current, actor, deliverable_id, is_completed, now)?;
            settle(
                deals::update_deal(conn, &next, expected_version)?,
                "deal",
                deal_id,
                expected_version,
            )
        })
    }

    pub fn get_deal(&self, actor: &Actor, deal_id: Uuid) -> WorkflowResult<Deal> {
        let deal = self.db.get_deal(deal_id)?.ok_or(WorkflowError::NotFound {
            entity: "deal",
            id: deal_id,
        })?;
        ensure_deal_access(&deal, actor)?;
        Ok(deal)
    }

    pub fn list_deals(
        &self,
        actor: &Actor,
        status: Option<DealStatus>,
    ) -> WorkflowResult<Vec<Deal>> {
        Ok(self.db.list_deals_for_user(actor.user_id, status)?)
    }

    /// Leave a rating for the other party of a completed deal.
    pub fn submit_review(
        &self,
        actor: &Actor,
        deal_id: Uuid,
        rating: u8,
        comment: &str,
    ) -> WorkflowResult<Outcome<Review>> {
        if !(1..=5).contains(&rating) {
            return Err(WorkflowError::invalid("rating must be between 1 and 5"));
        }
        if comment.chars().count() > MAX_REVIEW_CHARS {
            return Err(WorkflowError::invalid(format!(
                "review comment exceeds {MAX_REVIEW_CHARS} characters"
            )));
        }
        let now = self.clock.now();

        let review = self.db.transaction(|conn| {
            let deal = load_deal(conn, deal_id)?;
            let reviewee_id = deal
                .counterpart(actor.user_id)
                .ok_or_else(|| WorkflowError::forbidden("not a participant in this deal"))?;
            if deal.status != DealStatus::Completed {
                return Err(WorkflowError::invalid(
                    "reviews open once the deal is completed",
                ));
            }
            if reviews::find_review(conn, deal_id, actor.user_id)?.is_some() {
                return Err(WorkflowError::invalid("you already reviewed this deal"));
            }

            let review = Review {
                id: Uuid::new_v4(),
                deal_id,
                reviewer_id: actor.user_id,
                reviewee_id,
                rating,
                comment: comment.trim().to_string(),
                created_at: now,
            };
            reviews::insert_review(conn, &review)?;
            Ok(review)
        })?;

        let notifications = vec![NotificationIntent {
            recipient_id: review.reviewee_id,
            event: NotificationEvent::ReviewReceived {
                deal_id,
                review_id: review.id,
                rating,
            },
        }];
        Ok(Outcome::new(review, notifications))
    }

    pub fn list_reviews(&self, actor: &Actor, deal_id: Uuid) -> WorkflowResult<Vec<Review>> {
        self.get_deal(actor, deal_id)?;
        Ok(self.db.list_reviews_for_deal(deal_id)?)
    }

    // -- Campaigns --

    pub fn create_campaign(
        &self,
        actor: &Actor,
        req: CreateCampaignRequest,
    ) -> WorkflowResult<Campaign> {
        if actor.role != Role::Brand {
            return Err(WorkflowError::forbidden("only brands run campaigns"));
        }
        campaign::validate_new_campaign(&req)?;

        let now = self.clock.now();
        let campaign = Campaign {
            id: Uuid::new_v4(),
            owner_id: actor.user_id,
            name: req.name.trim().to_string(),
            description: req.description,
            budget: req.budget,
            status: CampaignStatus::Draft,
            start_date: req.start_date,
            end_date: req.end_date,
            goal_reach: req.goal_reach,
            goal_engagement: req.goal_engagement,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        self.db
            .transaction(|conn| campaigns::insert_campaign(conn, &campaign))?;

        info!("Campaign {} created by {}", campaign.id, actor.user_id);
        Ok(campaign)
    }

    pub fn get_campaign(&self, actor: &Actor, campaign_id: Uuid) -> WorkflowResult<Campaign> {
        let campaign = self
            .db
            .get_campaign(campaign_id)?
            .ok_or(WorkflowError::NotFound {
                entity: "campaign",
                id: campaign_id,
            })?;
        ensure_owner(&campaign, actor)?;
        Ok(campaign)
    }

    pub fn list_campaigns(&self, actor: &Actor) -> WorkflowResult<Vec<Campaign>> {
        Ok(self.db.list_campaigns_for_owner(actor.user_id)?)
    }

    /// Status is set by the owner alone and never cascades to the links.
    pub fn update_campaign_status(
        &self,
        actor: &Actor,
        campaign_id: Uuid,
        status: CampaignStatus,
        expected_version: i64,
    ) -> WorkflowResult<Campaign> {
        let now = self.clock.now();
        self.db.transaction(|conn| {
            load_owned_campaign(conn, campaign_id, actor)?;
            let outcome = campaigns::update_campaign_status(
                conn,
                campaign_id,
                status,
                expected_version,
                now,
            )?;
            settle(outcome, "campaign", campaign_id, expected_version)
        })
    }

    /// Put a creator on a campaign, or refresh their entry, and optionally
    /// open a deal for them under it. All writes land together or not at all.
    pub fn attach_to_campaign(
        &self,
        actor: &Actor,
        campaign_id: Uuid,
        req: AttachInfluencerRequest,
    ) -> WorkflowResult<Outcome<Shortlisted>> {
        if req.creator_id == actor.user_id {
            return Err(WorkflowError::invalid("a brand cannot shortlist itself"));
        }
        campaign::validate_snapshot(&req.snapshot)?;
        campaign::validate_prices(req.offered_price, req.agreed_price)?;
        let now = self.clock.now();

        let shortlisted = self.db.transaction(|conn| {
            let campaign = load_owned_campaign(conn, campaign_id, actor)?;

            let deal = match &req.deal {
                Some(proposal) => {
                    let mut deal = self.build_deal(proposal, req.creator_id, actor.user_id, now)?;
                    deal.campaign_id = Some(campaign_id);
                    deals::insert_deal(conn, &deal)?;
                    Some(deal)
                }
                None => None,
            };

            let terms = LinkTerms {
                snapshot: Some(req.snapshot.clone()),
                offered_price: req.offered_price,
                agreed_price: req.agreed_price,
                notes: req.notes.clone(),
            };
            let (link, created) =
                upsert_link(conn, &campaign, req.creator_id, terms, deal.as_ref(), now)?;

            Ok::<_, WorkflowError>(Shortlisted {
                link,
                deal,
                created,
            })
        })?;

        info!(
            "Creator {} {} campaign {}",
            req.creator_id,
            if shortlisted.created { "shortlisted into" } else { "updated on" },
            campaign_id
        );

        let mut notifications = Vec::new();
        if shortlisted.created {
            notifications.push(NotificationIntent {
                recipient_id: req.creator_id,
                event: NotificationEvent::CampaignInvite {
                    campaign_id,
                    link_id: shortlisted.link.id,
                },
            });
        }
        if let Some(deal) = &shortlisted.deal {
            notifications.push(proposed_notice(deal.creator_id, deal));
        }
        Ok(Outcome::new(shortlisted, notifications))
    }

    pub fn update_campaign_influencer(
        &self,
        actor: &Actor,
        campaign_id: Uuid,
        link_id: Uuid,
        req: UpdateInfluencerRequest,
    ) -> WorkflowResult<CampaignInfluencer> {
        let now = self.clock.now();
        self.db.transaction(|conn| {
            load_owned_campaign(conn, campaign_id, actor)?;
            let link = load_link(conn, campaign_id, link_id)?;
            let next = campaign::apply_link_update(&link, &req, now)?;
            settle(
                campaigns::update_influencer(conn, &next, req.expected_version)?,
                "campaign influencer",
                link_id,
                req.expected_version,
            )
        })
    }

    /// Drop a creator from a campaign. A link whose deal is still running
    /// stays until that deal ends.
    pub fn remove_campaign_influencer(
        &self,
        actor: &Actor,
        campaign_id: Uuid,
        link_id: Uuid,
        expected_version: i64,
    ) -> WorkflowResult<()> {
        self.db.transaction(|conn| {
            load_owned_campaign(conn, campaign_id, actor)?;
            let link = load_link(conn, campaign_id, link_id)?;
            if let Some(deal_id) = link.deal_id {
                if !load_deal(conn, deal_id)?.status.is_terminal() {
                    return Err(WorkflowError::invalid(
                        "the creator's deal is still open",
                    ));
                }
            }
            settle(
                campaigns::delete_influencer(conn, link_id, expected_version)?,
                "campaign influencer",
                link_id,
                expected_version,
            )
        })?;

        info!("Removed link {} from campaign {}", link_id, campaign_id);
        Ok(())
    }

    pub fn list_campaign_influencers(
        &self,
        actor: &Actor,
        campaign_id: Uuid,
    ) -> WorkflowResult<Vec<CampaignInfluencer>> {
        self.get_campaign(actor, campaign_id)?;
        Ok(self.db.list_influencers(campaign_id)?)
    }

    /// Recompute the campaign's spend, reach and progress from current rows.
    pub fn campaign_aggregates(
        &self,
        actor: &Actor,
        campaign_id: Uuid,
    ) -> WorkflowResult<CampaignAggregates> {
        let campaign = self.get_campaign(actor, campaign_id)?;
        let (links, deals) = self.db.with_conn(|conn| {
            Ok((
                campaigns::list_influencers(conn, campaign_id)?,
                deals::list_deals_for_campaign(conn, campaign_id)?,
            ))
        })?;
        Ok(campaign::aggregate(&campaign, &links, &deals, self.clock.now()))
    }

    fn build_deal(
        &self,
        proposal: &DealProposal,
        creator_id: Uuid,
        brand_id: Uuid,
        now: DateTime<Utc>,
    ) -> WorkflowResult<Deal> {
        if proposal.title.trim().is_empty() {
            return Err(WorkflowError::invalid("deal title is required"));
        }
        if proposal.amount < 0 {
            return Err(WorkflowError::invalid("amount cannot be negative"));
        }
        let platform_fee = proposal
            .platform_fee
            .unwrap_or_else(|| self.config.fee_for(proposal.amount));
        if platform_fee < 0 || platform_fee > proposal.amount {
            return Err(WorkflowError::invalid(
                "platform fee must be between 0 and the amount",
            ));
        }
        if proposal.deadline.is_some_and(|d| d < now) {
            return Err(WorkflowError::invalid("deadline is in the past"));
        }

        Ok(Deal {
            id: Uuid::new_v4(),
            creator_id,
            brand_id,
            campaign_id: None,
            conversation_id: None,
            title: proposal.title.trim().to_string(),
            description: proposal.description.clone(),
            platform: proposal.platform,
            content_type: proposal.content_type.clone(),
            deliverables: deal::new_deliverables(&proposal.deliverables)?,
            amount: proposal.amount,
            platform_fee,
            status: DealStatus::Pending,
            deadline: proposal.deadline,
            delivery_days: proposal.delivery_days.unwrap_or(self.config.default_delivery_days),
            max_revisions: proposal.max_revisions.unwrap_or(self.config.default_max_revisions),
            revision_count: 0,
            version: 1,
            created_at: now,
            updated_at: now,
            accepted_at: None,
            funded_at: None,
            delivered_at: None,
            completed_at: None,
            cancelled_at: None,
            disputed_at: None,
        })
    }
}

// -- Transaction helpers --

#[derive(Debug, Default)]
struct LinkTerms {
    snapshot: Option<CreatorSnapshot>,
    offered_price: Option<i64>,
    agreed_price: Option<i64>,
    notes: Option<String>,
}

/// Create or refresh the (campaign, creator) link, binding `deal` to it.
fn upsert_link(
    conn: &Connection,
    campaign: &Campaign,
    creator_id: Uuid,
    terms: LinkTerms,
    deal: Option<&Deal>,
    now: DateTime<Utc>,
) -> WorkflowResult<(CampaignInfluencer, bool)> {
    match campaigns::find_influencer(conn, campaign.id, creator_id)? {
        Some(mut link) => {
            if let (Some(_), Some(bound_id)) = (deal, link.deal_id) {
                if !load_deal(conn, bound_id)?.status.is_terminal() {
                    return Err(WorkflowError::invalid(
                        "this creator already has an open deal in the campaign",
                    ));
                }
            }
            let expected = link.version;
            if let Some(snapshot) = terms.snapshot {
                link.snapshot = snapshot;
            }
            if terms.offered_price.is_some() {
                link.offered_price = terms.offered_price;
            }
            if terms.agreed_price.is_some() {
                link.agreed_price = terms.agreed_price;
            }
            if terms.notes.is_some() {
                link.notes = terms.notes;
            }
            if let Some(deal) = deal {
                link.deal_id = Some(deal.id);
            }
            link.updated_at = now;

            let stored = settle(
                campaigns::update_influencer(conn, &link, expected)?,
                "campaign influencer",
                link.id,
                expected,
            )?;
            Ok((stored, false))
        }
        None => {
            let link = CampaignInfluencer {
                id: Uuid::new_v4(),
                campaign_id: campaign.id,
                creator_id,
                snapshot: terms.snapshot.unwrap_or_else(|| CreatorSnapshot {
                    username: creator_id.to_string(),
                    display_name: None,
                    total_followers: 0,
                    engagement_rate: 0.0,
                }),
                status: InfluencerStatus::Shortlisted,
                offered_price: terms.offered_price,
                agreed_price: terms.agreed_price,
                notes: terms.notes,
                contact_date: None,
                agreement_date: None,
                post_date: None,
                post_url: None,
                payment_status: PaymentStatus::Pending,
                deal_id: deal.map(|d| d.id),
                version: 1,
                created_at: now,
                updated_at: now,
            };
            campaigns::insert_influencer(conn, &link)?;
            Ok((link, true))
        }
    }
}

fn load_deal(conn: &Connection, deal_id: Uuid) -> WorkflowResult<Deal> {
    deals::get_deal(conn, deal_id)?.ok_or(WorkflowError::NotFound {
        entity: "deal",
        id: deal_id,
    })
}

fn load_owned_campaign(
    conn: &Connection,
    campaign_id: Uuid,
    actor: &Actor,
) -> WorkflowResult<Campaign> {
    let campaign = campaigns::get_campaign(conn, campaign_id)?.ok_or(WorkflowError::NotFound {
        entity: "campaign",
        id: campaign_id,
    })?;
    ensure_owner(&campaign, actor)?;
    Ok(campaign)
}

fn load_link(
    conn: &Connection,
    campaign_id: Uuid,
    link_id: Uuid,
) -> WorkflowResult<CampaignInfluencer> {
    campaigns::get_influencer(conn, link_id)?
        .filter(|link| link.campaign_id == campaign_id)
        .ok_or(WorkflowError::NotFound {
            entity: "campaign influencer",
            id: link_id,
        })
}

fn ensure_owner(campaign: &Campaign, actor: &Actor) -> WorkflowResult<()> {
    if campaign.owner_id == actor.user_id {
        Ok(())
    } else {
        Err(WorkflowError::forbidden("only the campaign owner can do that"))
    }
}

/// Participants see their deals; the payment collaborator sees all of them.
fn ensure_deal_access(deal: &Deal, actor: &Actor) -> WorkflowResult<()> {
    if actor.is_system() || deal.is_participant(actor.user_id) {
        Ok(())
    } else {
        Err(WorkflowError::forbidden("not a participant in this deal"))
    }
}

// -- Messages and notices --

fn status_note(t: &Transition, deal: &Deal, note: Option<&str>) -> String {
    let headline = transition_headline(t, deal);
    match note {
        Some(note) => format!("{headline}\n\nNote: {note}"),
        None => headline,
    }
}

fn transition_headline(t: &Transition, deal: &Deal) -> String {
    match t.trigger {
        DealTrigger::Accept => "Deal accepted".into(),
        DealTrigger::Withdraw => "Proposal withdrawn".into(),
        DealTrigger::FundsCaptured => "Payment secured, work can begin".into(),
        DealTrigger::StartWork => "Work started".into(),
        DealTrigger::Deliver if t.from == DealStatus::Revision => {
            "Revised content delivered for review".into()
        }
        DealTrigger::Deliver => "Content delivered for review".into(),
        DealTrigger::RequestRevision => format!(
            "Revision requested ({} of {})",
            deal.revision_count, deal.max_revisions
        ),
        DealTrigger::Approve => "Delivery approved, payout released".into(),
        DealTrigger::Dispute => "Deal disputed".into(),
        DealTrigger::Cancel => "Deal cancelled".into(),
    }
}

fn proposed_notice(recipient_id: Uuid, deal: &Deal) -> NotificationIntent {
    NotificationIntent {
        recipient_id,
        event: NotificationEvent::DealProposed {
            deal_id: deal.id,
            title: deal.title.clone(),
            amount: deal.amount,
        },
    }
}

fn transition_notices(actor: &Actor, deal: &Deal, t: &Transition) -> Vec<NotificationIntent> {
    let recipients: Vec<Uuid> = if actor.is_system() {
        vec![deal.creator_id, deal.brand_id]
    } else {
        deal.counterpart(actor.user_id).into_iter().collect()
    };

    let mut out: Vec<NotificationIntent> = recipients
        .into_iter()
        .map(|recipient_id| NotificationIntent {
            recipient_id,
            event: NotificationEvent::DealStatusChanged {
                deal_id: deal.id,
                trigger: t.trigger,
                from: t.from,
                to: t.to,
            },
        })
        .collect();

    match t.trigger {
        DealTrigger::Deliver => out.push(NotificationIntent {
            recipient_id: deal.brand_id,
            event: NotificationEvent::DeliveryReady { deal_id: deal.id },
        }),
        DealTrigger::Approve => out.push(NotificationIntent {
            recipient_id: deal.creator_id,
            event: NotificationEvent::PayoutReleased {
                deal_id: deal.id,
                creator_payout: deal.creator_payout(),
            },
        }),
        _ => {}
    }
    out
}
