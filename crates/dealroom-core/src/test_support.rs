use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use dealroom_db::Database;
use dealroom_types::models::{Deal, DealStatus, Platform, Role};

use crate::{Actor, ManualClock, Workflow, WorkflowConfig};

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
        description: None,
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

pub(crate) fn creator_actor(deal: &Deal) -> Actor {
    Actor::new(deal.creator_id, Role::Creator)
}

pub(crate) fn brand_actor(deal: &Deal) -> Actor {
    Actor::new(deal.brand_id, Role::Brand)
}

pub(crate) fn system_actor() -> Actor {
    Actor::new(Uuid::nil(), Role::System)
}

pub(crate) fn new_creator() -> Actor {
    Actor::new(Uuid::new_v4(), Role::Creator)
}

pub(crate) fn new_brand() -> Actor {
    Actor::new(Uuid::new_v4(), Role::Brand)
}

/// Workflow over a fresh in-memory store and a clock parked at `fixed_now`.
pub(crate) fn workflow() -> (Workflow, Arc<ManualClock>) {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let clock = Arc::new(ManualClock::new(fixed_now()));
    let workflow = Workflow::new(db, clock.clone(), WorkflowConfig::default());
    (workflow, clock)
}
