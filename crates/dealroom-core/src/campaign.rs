//! Campaign rollups and the rules for editing campaign links.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use dealroom_types::api::{CreateCampaignRequest, UpdateInfluencerRequest};
use dealroom_types::models::{
    Campaign, CampaignAggregates, CampaignInfluencer, CreatorSnapshot, Deal, InfluencerStatus,
};

use crate::error::{WorkflowError, WorkflowResult};

/// Compute a campaign's rollups. Pure: the same inputs always give the same
/// output and nothing is written.
///
/// A link's agreed price counts toward spend when it has no deal yet, or
/// when its deal has reached a payout-eligible status. Links pointing at a
/// deal missing from `deals` are not counted.
pub fn aggregate(
    campaign: &Campaign,
    links: &[CampaignInfluencer],
    deals: &[Deal],
    now: DateTime<Utc>,
) -> CampaignAggregates {
    let deals_by_id: HashMap<Uuid, &Deal> = deals.iter().map(|d| (d.id, d)).collect();

    let mut by_status: BTreeMap<InfluencerStatus, usize> =
        InfluencerStatus::ALL.iter().map(|s| (*s, 0)).collect();
    let mut total_spent = 0i64;
    let mut total_reach = 0i64;
    let mut agreed_count = 0usize;

    for link in links {
        *by_status.entry(link.status).or_insert(0) += 1;
        total_reach = total_reach.saturating_add(link.snapshot.total_followers.max(0));

        if is_committed(link.status) {
            agreed_count += 1;
        }

        let counts = match link.deal_id {
            None => true,
            Some(deal_id) => deals_by_id
                .get(&deal_id)
                .is_some_and(|d| d.status.is_payout_eligible()),
        };
        if counts {
            total_spent = total_spent.saturating_add(link.agreed_price.unwrap_or(0).max(0));
        }
    }

    CampaignAggregates {
        campaign_id: campaign.id,
        influencer_count: links.len(),
        by_status,
        agreed_count,
        total_spent,
        total_reach,
        budget_remaining: campaign.budget.map(|b| b.saturating_sub(total_spent)),
        progress: time_progress(campaign.start_date, campaign.end_date, now),
        goal_reach_progress: campaign
            .goal_reach
            .filter(|goal| *goal > 0)
            .map(|goal| (total_reach as f64 / goal as f64).clamp(0.0, 1.0)),
    }
}

fn is_committed(status: InfluencerStatus) -> bool {
    matches!(
        status,
        InfluencerStatus::Agreed | InfluencerStatus::ContentPosted | InfluencerStatus::Completed
    )
}

/// Share of the campaign window that has elapsed, in [0, 1].
fn time_progress(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<f64> {
    let (start, end) = (start?, end?);
    let span = (end - start).num_milliseconds();
    if span <= 0 {
        return Some(if now >= end { 1.0 } else { 0.0 });
    }
    let elapsed = (now - start).num_milliseconds();
    Some((elapsed as f64 / span as f64).clamp(0.0, 1.0))
}

pub(crate) fn validate_new_campaign(req: &CreateCampaignRequest) -> WorkflowResult<()> {
    if req.name.trim().is_empty() {
        return Err(WorkflowError::invalid("campaign name is required"));
    }
    if req.budget.is_some_and(|b| b < 0) {
        return Err(WorkflowError::invalid("budget cannot be negative"));
    }
    if let (Some(start), Some(end)) = (req.start_date, req.end_date) {
        if end < start {
            return Err(WorkflowError::invalid("end date is before start date"));
        }
    }
    if req.goal_reach.is_some_and(|g| g < 0) {
        return Err(WorkflowError::invalid("reach goal cannot be negative"));
    }
    Ok(())
}

pub(crate) fn validate_snapshot(snapshot: &CreatorSnapshot) -> WorkflowResult<()> {
    if snapshot.username.trim().is_empty() {
        return Err(WorkflowError::invalid("creator username is required"));
    }
    if snapshot.total_followers < 0 {
        return Err(WorkflowError::invalid("follower count cannot be negative"));
    }
    if !snapshot.engagement_rate.is_finite() || snapshot.engagement_rate < 0.0 {
        return Err(WorkflowError::invalid("engagement rate must be a non-negative number"));
    }
    Ok(())
}

pub(crate) fn validate_prices(offered: Option<i64>, agreed: Option<i64>) -> WorkflowResult<()> {
    if offered.is_some_and(|p| p < 0) || agreed.is_some_and(|p| p < 0) {
        return Err(WorkflowError::invalid("prices cannot be negative"));
    }
    Ok(())
}

/// Apply a partial edit to a link. Moving into a funnel stage stamps the
/// matching date the first time it is reached.
pub(crate) fn apply_link_update(
    link: &CampaignInfluencer,
    req: &UpdateInfluencerRequest,
    now: DateTime<Utc>,
) -> WorkflowResult<CampaignInfluencer> {
    validate_prices(req.offered_price, req.agreed_price)?;

    let mut next = link.clone();
    if let Some(status) = req.status {
        next.status = status;
        match status {
            InfluencerStatus::Contacted => {
                next.contact_date.get_or_insert(now);
            }
            InfluencerStatus::Agreed => {
                next.agreement_date.get_or_insert(now);
            }
            InfluencerStatus::ContentPosted => {
                next.post_date.get_or_insert(now);
            }
            _ => {}
        }
    }
    if req.offered_price.is_some() {
        next.offered_price = req.offered_price;
    }
    if req.agreed_price.is_some() {
        next.agreed_price = req.agreed_price;
    }
    if req.notes.is_some() {
        next.notes = req.notes.clone();
    }
    if req.post_url.is_some() {
        next.post_url = req.post_url.clone();
    }
    if let Some(payment_status) = req.payment_status {
        next.payment_status = payment_status;
    }
    next.updated_at = now;
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fixed_now, sample_deal};
    use chrono::Duration;
    use dealroom_types::models::{CampaignStatus, DealStatus, PaymentStatus};

    fn campaign() -> Campaign {
        Campaign {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            name: "Spring drop".into(),
            description: None,
            budget: Some(2000),
            status: CampaignStatus::Active,
            start_date: None,
            end_date: None,
            goal_reach: None,
            goal_engagement: None,
            version: 1,
            created_at: fixed_now(),
            updated_at: fixed_now(),
        }
    }

    fn link(campaign: &Campaign, agreed: Option<i64>, followers: i64) -> CampaignInfluencer {
        CampaignInfluencer {
            id: Uuid::new_v4(),
            campaign_id: campaign.id,
            creator_id: Uuid::new_v4(),
            snapshot: CreatorSnapshot {
                username: "maya.makes".into(),
                display_name: None,
                total_followers: followers,
                engagement_rate: 3.5,
            },
            status: InfluencerStatus::Agreed,
            offered_price: None,
            agreed_price: agreed,
            notes: None,
            contact_date: None,
            agreement_date: None,
            post_date: None,
            post_url: None,
            payment_status: PaymentStatus::Pending,
            deal_id: None,
            version: 1,
            created_at: fixed_now(),
            updated_at: fixed_now(),
        }
    }

    #[test]
    fn spend_sums_agreed_prices_of_dealless_links() {
        let c = campaign();
        let links = vec![link(&c, Some(500), 10_000), link(&c, Some(700), 25_000)];

        let agg = aggregate(&c, &links, &[], fixed_now());
        assert_eq!(agg.total_spent, 1200);
        assert_eq!(agg.influencer_count, 2);
        assert_eq!(agg.total_reach, 35_000);
        assert_eq!(agg.budget_remaining, Some(800));
        assert_eq!(agg.agreed_count, 2);
    }

    #[test]
    fn every_status_is_reported_even_when_empty() {
        let c = campaign();
        let agg = aggregate(&c, &[], &[], fixed_now());
        assert_eq!(agg.by_status.len(), InfluencerStatus::ALL.len());
        assert!(agg.by_status.values().all(|n| *n == 0));
        assert_eq!(agg.total_spent, 0);
        assert_eq!(agg.progress, None);
    }

    #[test]
    fn only_payout_eligible_deals_count_toward_spend() {
        let c = campaign();
        let mut paid = sample_deal();
        paid.status = DealStatus::Paid;
        let mut cancelled = sample_deal();
        cancelled.status = DealStatus::Cancelled;
        let mut disputed = sample_deal();
        disputed.status = DealStatus::Disputed;

        let mut links = vec![
            link(&c, Some(300), 0),
            link(&c, Some(400), 0),
            link(&c, Some(900), 0),
            link(&c, None, 0),
        ];
        links[0].deal_id = Some(paid.id);
        links[1].deal_id = Some(cancelled.id);
        links[2].deal_id = Some(disputed.id);

        let agg = aggregate(&c, &links, &[paid, cancelled, disputed], fixed_now());
        assert_eq!(agg.total_spent, 300);
    }

    #[test]
    fn progress_is_clamped_to_the_campaign_window() {
        let mut c = campaign();
        let start = fixed_now();
        c.start_date = Some(start);
        c.end_date = Some(start + Duration::days(10));

        let before = aggregate(&c, &[], &[], start - Duration::days(3));
        let halfway = aggregate(&c, &[], &[], start + Duration::days(5));
        let after = aggregate(&c, &[], &[], start + Duration::days(30));

        assert_eq!(before.progress, Some(0.0));
        assert_eq!(halfway.progress, Some(0.5));
        assert_eq!(after.progress, Some(1.0));
    }

    #[test]
    fn reach_goal_progress() {
        let mut c = campaign();
        c.goal_reach = Some(40_000);
        let links = vec![link(&c, None, 10_000)];
        let agg = aggregate(&c, &links, &[], fixed_now());
        assert_eq!(agg.goal_reach_progress, Some(0.25));
    }

    #[test]
    fn aggregation_is_repeatable() {
        let c = campaign();
        let links = vec![link(&c, Some(500), 10), link(&c, Some(700), 20)];
        let first = aggregate(&c, &links, &[], fixed_now());
        let second = aggregate(&c, &links, &[], fixed_now());
        assert_eq!(first, second);
    }

    #[test]
    fn first_arrival_at_a_stage_stamps_its_date() {
        let c = campaign();
        let mut l = link(&c, None, 0);
        l.status = InfluencerStatus::Shortlisted;

        let req = UpdateInfluencerRequest {
            expected_version: 1,
            status: Some(InfluencerStatus::Contacted),
            ..Default::default()
        };
        let contacted = apply_link_update(&l, &req, fixed_now()).unwrap();
        assert_eq!(contacted.contact_date, Some(fixed_now()));

        let later = fixed_now() + Duration::days(1);
        let again = apply_link_update(&contacted, &req, later).unwrap();
        assert_eq!(again.contact_date, Some(fixed_now()));
        assert_eq!(again.updated_at, later);
    }

    #[test]
    fn new_campaign_dates_must_be_ordered() {
        let req = CreateCampaignRequest {
            name: "Fall".into(),
            description: None,
            budget: Some(100),
            start_date: Some(fixed_now()),
            end_date: Some(fixed_now() - Duration::days(1)),
            goal_reach: None,
            goal_engagement: None,
        };
        assert!(matches!(
            validate_new_campaign(&req),
            Err(WorkflowError::Validation(_))
        ));
    }

    #[test]
    fn huge_inputs_saturate_instead_of_overflowing() {
        let c = campaign();
        let links = vec![
            link(&c, Some(i64::MAX), i64::MAX),
            link(&c, Some(i64::MAX), i64::MAX),
        ];
        let agg = aggregate(&c, &links, &[], fixed_now());
        assert_eq!(agg.total_spent, i64::MAX);
        assert_eq!(agg.total_reach, i64::MAX);
        assert_eq!(agg.budget_remaining, Some(2000 - i64::MAX));
    }

    #[test]
    fn snapshots_must_be_plausible() {
        let c = campaign();
        let mut snapshot = link(&c, None, 10).snapshot;
        assert!(validate_snapshot(&snapshot).is_ok());

        snapshot.total_followers = -1;
        assert!(validate_snapshot(&snapshot).is_err());

        snapshot.total_followers = 10;
        snapshot.engagement_rate = f64::NAN;
        assert!(validate_snapshot(&snapshot).is_err());
    }
}
