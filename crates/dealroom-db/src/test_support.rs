use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use dealroom_types::models::{
    Campaign, CampaignStatus, Conversation, Deal, DealStatus, Platform,
};

pub(crate) fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
}

pub(crate) fn sample_deal() -> Deal {
    let now = fixed_now();
    Deal {
        id: Uuid::new_v4(),
        creator_id: Uuid::new_v4(),
        brand_id: Uuid::new_v4(),
        campaign_id: None,
        conversation_id: None,
        title: "Launch reel".into(),
        description: Some("30s vertical video".into()),
        platform: Platform::Instagram,
        content_type: Some("reel".into()),
        deliverables: vec![],
        amount: 1000,
        platform_fee: 100,
        status: DealStatus::Pending,
        deadline: None,
        delivery_days: 7,
        max_revisions: 1,
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
    }
}

pub(crate) fn sample_campaign() -> Campaign {
    let now = fixed_now();
    Campaign {
        id: Uuid::new_v4(),
        owner_id: Uuid::new_v4(),
        name: "Spring drop".into(),
        description: None,
        budget: Some(5000),
        status: CampaignStatus::Draft,
        start_date: None,
        end_date: None,
        goal_reach: None,
        goal_engagement: None,
        version: 1,
        created_at: now,
        updated_at: now,
    }
}

pub(crate) fn sample_conversation() -> Conversation {
    Conversation {
        id: Uuid::new_v4(),
        creator_id: Uuid::new_v4(),
        brand_id: Uuid::new_v4(),
        deal_id: None,
        created_at: fixed_now(),
    }
}
