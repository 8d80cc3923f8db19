//! Deal lifecycle.
//!
//! [`transition`] is the whole legal graph and is pure. [`authorize`] decides
//! who may pull each trigger, and [`apply`] turns a transition into the next
//! stored state of a deal.

use chrono::{DateTime, Utc};
use dealroom_types::models::{Deal, DealStatus, DealTrigger, Deliverable};
use uuid::Uuid;

use crate::Actor;
use crate::error::{WorkflowError, WorkflowResult};

/// Bookkeeping a transition asks for on top of the status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    StampAccepted,
    /// Locks amount and fee.
    StampFunded,
    StampDelivered,
    ClearDelivered,
    CountRevision,
    StampCompleted,
    StampCancelled,
    StampDisputed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: DealStatus,
    pub to: DealStatus,
    pub trigger: DealTrigger,
    pub effects: Vec<Effect>,
}

/// Which side of a deal may pull a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    Creator,
    Brand,
    Either,
    /// The payment collaborator, never a participant.
    System,
}

pub fn party_for(trigger: DealTrigger) -> Party {
    match trigger {
        DealTrigger::Accept | DealTrigger::StartWork | DealTrigger::Deliver => Party::Creator,
        DealTrigger::RequestRevision | DealTrigger::Approve => Party::Brand,
        DealTrigger::FundsCaptured => Party::System,
        DealTrigger::Withdraw | DealTrigger::Dispute | DealTrigger::Cancel => Party::Either,
    }
}

/// Look up `(from, trigger)` in the legal graph.
pub fn transition(from: DealStatus, trigger: DealTrigger) -> WorkflowResult<Transition> {
    use DealStatus as S;
    use DealTrigger as T;

    let (to, effects) = match (from, trigger) {
        (S::Pending, T::Accept) => (S::Accepted, vec![Effect::StampAccepted]),
        (S::Pending, T::Withdraw) => (S::Cancelled, vec![Effect::StampCancelled]),
        (S::Accepted, T::FundsCaptured) => (S::Paid, vec![Effect::StampFunded]),
        (S::Paid, T::StartWork) => (S::InProgress, vec![]),
        (S::InProgress | S::Revision, T::Deliver) => (S::Delivered, vec![Effect::StampDelivered]),
        (S::Delivered, T::RequestRevision) => (
            S::Revision,
            vec![Effect::ClearDelivered, Effect::CountRevision],
        ),
        (S::Delivered, T::Approve) => (S::Completed, vec![Effect::StampCompleted]),
        (s, T::Dispute) if !s.is_terminal() => (S::Disputed, vec![Effect::StampDisputed]),
        (s, T::Cancel) if !s.is_terminal() => (S::Cancelled, vec![Effect::StampCancelled]),
        _ => return Err(WorkflowError::InvalidTransition { from, trigger }),
    };

    Ok(Transition {
        from,
        to,
        trigger,
        effects,
    })
}

/// Check that `actor` is allowed to pull `trigger` on `deal`.
pub fn authorize(deal: &Deal, actor: &Actor, trigger: DealTrigger) -> WorkflowResult<()> {
    let allowed = match party_for(trigger) {
        Party::System => actor.is_system(),
        Party::Creator => actor.user_id == deal.creator_id,
        Party::Brand => actor.user_id == deal.brand_id,
        Party::Either => deal.is_participant(actor.user_id),
    };

    if allowed {
        Ok(())
    } else {
        Err(WorkflowError::forbidden(format!(
            "not allowed to {trigger} this deal"
        )))
    }
}

/// Produce the deal as it looks after `t`. Amount, fee and identity are
/// never touched, so the creator payout is the same before and after.
pub fn apply(deal: &Deal, t: &Transition, now: DateTime<Utc>) -> WorkflowResult<Deal> {
    let mut next = deal.clone();

    for effect in &t.effects {
        match effect {
            Effect::StampAccepted => next.accepted_at = Some(now),
            Effect::StampFunded => next.funded_at = Some(now),
            Effect::StampDelivered => next.delivered_at = Some(now),
            Effect::ClearDelivered => next.delivered_at = None,
            Effect::CountRevision => {
                if next.revision_count >= next.max_revisions {
                    return Err(WorkflowError::InvalidTransition {
                        from: t.from,
                        trigger: t.trigger,
                    });
                }
                next.revision_count += 1;
            }
            Effect::StampCompleted => next.completed_at = Some(now),
            Effect::StampCancelled => next.cancelled_at = Some(now),
            Effect::StampDisputed => next.disputed_at = Some(now),
        }
    }

    next.status = t.to;
    next.updated_at = now;
    Ok(next)
}

/// Run the full check for `actor` pulling `trigger` on `deal`.
///
/// Outsiders are rejected before the graph is consulted so they learn
/// nothing about the deal's state.
pub fn advance(
    deal: &Deal,
    actor: &Actor,
    trigger: DealTrigger,
    now: DateTime<Utc>,
) -> WorkflowResult<(Deal, Transition)> {
    if !actor.is_system() && !deal.is_participant(actor.user_id) {
        return Err(WorkflowError::forbidden("not a participant in this deal"));
    }
    let t = transition(deal.status, trigger)?;
    authorize(deal, actor, trigger)?;
    if trigger == DealTrigger::Deliver && !deal.deliverables_complete() {
        return Err(WorkflowError::invalid(
            "every deliverable must be complete before delivery",
        ));
    }
    let next = apply(deal, &t, now)?;
    Ok((next, t))
}

pub const MAX_DELIVERABLES: usize = 50;
const MAX_DELIVERABLE_CHARS: usize = 500;

/// Fresh, unticked checklist items for the given descriptions.
pub fn new_deliverables(descriptions: &[String]) -> WorkflowResult<Vec<Deliverable>> {
    if descriptions.len() > MAX_DELIVERABLES {
        return Err(WorkflowError::invalid(format!(
            "a deal takes at most {MAX_DELIVERABLES} deliverables"
        )));
    }
    descriptions
        .iter()
        .map(|raw| {
            let description = raw.trim();
            if description.is_empty() {
                return Err(WorkflowError::invalid("deliverable description is empty"));
            }
            if description.chars().count() > MAX_DELIVERABLE_CHARS {
                return Err(WorkflowError::invalid(format!(
                    "deliverable description exceeds {MAX_DELIVERABLE_CHARS} characters"
                )));
            }
            Ok(Deliverable {
                id: Uuid::new_v4(),
                description: description.to_string(),
                is_completed: false,
                completed_at: None,
            })
        })
        .collect()
}

/// Tick or untick one checklist item. Only the creator does this, and only
/// while the work is underway.
pub fn mark_deliverable(
    deal: &Deal,
    actor: &Actor,
    deliverable_id: Uuid,
    is_completed: bool,
    now: DateTime<Utc>,
) -> WorkflowResult<Deal> {
    if actor.user_id != deal.creator_id {
        return Err(WorkflowError::forbidden(
            "only the creator can update deliverables",
        ));
    }
    if !matches!(
        deal.status,
        DealStatus::Paid | DealStatus::InProgress | DealStatus::Revision
    ) {
        return Err(WorkflowError::invalid(format!(
            "deliverables cannot be ticked while the deal is {}",
            deal.status
        )));
    }

    let mut next = deal.clone();
    let item = next
        .deliverables
        .iter_mut()
        .find(|d| d.id == deliverable_id)
        .ok_or(WorkflowError::NotFound {
            entity: "deliverable",
            id: deliverable_id,
        })?;
    if item.is_completed != is_completed {
        item.is_completed = is_completed;
        item.completed_at = is_completed.then_some(now);
    }
    next.updated_at = now;
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{brand_actor, creator_actor, fixed_now, sample_deal, system_actor};
    use chrono::Duration;

    fn fire(deal: &Deal, actor: &Actor, trigger: DealTrigger, minutes: i64) -> Deal {
        advance(deal, actor, trigger, fixed_now() + Duration::minutes(minutes))
            .unwrap()
            .0
    }

    #[test]
    fn payout_is_amount_minus_fee_at_every_step() {
        let deal = sample_deal();
        let creator = creator_actor(&deal);
        let brand = brand_actor(&deal);
        assert_eq!(deal.creator_payout(), 900);

        let mut current = deal.clone();
        let steps = [
            (creator, DealTrigger::Accept),
            (system_actor(), DealTrigger::FundsCaptured),
            (creator, DealTrigger::StartWork),
            (creator, DealTrigger::Deliver),
            (brand, DealTrigger::Approve),
        ];
        for (i, (actor, trigger)) in steps.iter().enumerate() {
            current = fire(&current, actor, *trigger, i as i64);
            assert_eq!(current.creator_payout(), 900);
            assert_eq!(current.amount, 1000);
        }
        assert_eq!(current.status, DealStatus::Completed);
        assert!(current.completed_at.is_some());
        assert!(current.delivered_at.is_some());
    }

    #[test]
    fn deliver_while_pending_is_rejected() {
        let deal = sample_deal();
        let err = advance(&deal, &creator_actor(&deal), DealTrigger::Deliver, fixed_now())
            .unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::InvalidTransition {
                from: DealStatus::Pending,
                trigger: DealTrigger::Deliver
            }
        ));
    }

    #[test]
    fn every_pair_outside_the_graph_fails() {
        let legal: &[(DealStatus, DealTrigger)] = &[
            (DealStatus::Pending, DealTrigger::Accept),
            (DealStatus::Pending, DealTrigger::Withdraw),
            (DealStatus::Accepted, DealTrigger::FundsCaptured),
            (DealStatus::Paid, DealTrigger::StartWork),
            (DealStatus::InProgress, DealTrigger::Deliver),
            (DealStatus::Revision, DealTrigger::Deliver),
            (DealStatus::Delivered, DealTrigger::RequestRevision),
            (DealStatus::Delivered, DealTrigger::Approve),
        ];

        for from in DealStatus::ALL {
            for trigger in DealTrigger::ALL {
                let expected_ok = legal.contains(&(*from, *trigger))
                    || (matches!(trigger, DealTrigger::Dispute | DealTrigger::Cancel)
                        && !from.is_terminal());
                assert_eq!(
                    transition(*from, *trigger).is_ok(),
                    expected_ok,
                    "{from} + {trigger}"
                );
            }
        }
    }

    #[test]
    fn terminal_states_absorb() {
        for from in [DealStatus::Completed, DealStatus::Cancelled, DealStatus::Disputed] {
            for trigger in DealTrigger::ALL {
                assert!(transition(from, *trigger).is_err());
            }
        }
    }

    #[test]
    fn resubmission_moves_delivered_at() {
        let deal = sample_deal();
        let creator = creator_actor(&deal);
        let brand = brand_actor(&deal);

        let d = fire(&deal, &creator, DealTrigger::Accept, 1);
        let d = fire(&d, &system_actor(), DealTrigger::FundsCaptured, 2);
        let d = fire(&d, &creator, DealTrigger::StartWork, 3);
        let d = fire(&d, &creator, DealTrigger::Deliver, 4);
        assert_eq!(d.delivered_at, Some(fixed_now() + Duration::minutes(4)));

        let d = fire(&d, &brand, DealTrigger::RequestRevision, 5);
        assert_eq!(d.status, DealStatus::Revision);
        assert_eq!(d.delivered_at, None);
        assert_eq!(d.revision_count, 1);

        let d = fire(&d, &creator, DealTrigger::Deliver, 6);
        assert_eq!(d.status, DealStatus::Delivered);
        assert_eq!(d.delivered_at, Some(fixed_now() + Duration::minutes(6)));
    }

    #[test]
    fn revision_limit_is_enforced() {
        let mut deal = sample_deal();
        deal.status = DealStatus::Delivered;
        deal.revision_count = 1;
        deal.max_revisions = 1;

        let err = advance(&deal, &brand_actor(&deal), DealTrigger::RequestRevision, fixed_now())
            .unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidTransition { .. }));
    }

    #[test]
    fn wrong_side_is_forbidden() {
        let deal = sample_deal();
        let brand = brand_actor(&deal);
        assert!(matches!(
            advance(&deal, &brand, DealTrigger::Accept, fixed_now()),
            Err(WorkflowError::Forbidden(_))
        ));

        let mut accepted = deal.clone();
        accepted.status = DealStatus::Accepted;
        assert!(matches!(
            advance(&accepted, &creator_actor(&deal), DealTrigger::FundsCaptured, fixed_now()),
            Err(WorkflowError::Forbidden(_))
        ));

        let outsider = Actor::new(uuid::Uuid::new_v4(), dealroom_types::models::Role::Creator);
        assert!(matches!(
            advance(&deal, &outsider, DealTrigger::Cancel, fixed_now()),
            Err(WorkflowError::Forbidden(_))
        ));
    }

    #[test]
    fn either_party_may_withdraw_or_dispute() {
        let deal = sample_deal();
        let withdrawn = fire(&deal, &brand_actor(&deal), DealTrigger::Withdraw, 1);
        assert_eq!(withdrawn.status, DealStatus::Cancelled);
        assert!(withdrawn.cancelled_at.is_some());

        let mut in_progress = sample_deal();
        in_progress.status = DealStatus::InProgress;
        let disputed = fire(&in_progress, &creator_actor(&in_progress), DealTrigger::Dispute, 1);
        assert_eq!(disputed.status, DealStatus::Disputed);
        assert!(disputed.disputed_at.is_some());
    }

    #[test]
    fn delivery_waits_for_the_checklist() {
        let mut deal = sample_deal();
        deal.status = DealStatus::InProgress;
        deal.deliverables =
            new_deliverables(&["Draft cut".to_string(), "Final cut".to_string()]).unwrap();
        let creator = creator_actor(&deal);

        let blocked = advance(&deal, &creator, DealTrigger::Deliver, fixed_now());
        assert!(matches!(blocked, Err(WorkflowError::Validation(_))));

        let ids: Vec<_> = deal.deliverables.iter().map(|d| d.id).collect();
        let mut d = deal.clone();
        for id in ids {
            d = mark_deliverable(&d, &creator, id, true, fixed_now()).unwrap();
        }
        assert!(d.deliverables.iter().all(|i| i.completed_at == Some(fixed_now())));

        let (delivered, _) = advance(&d, &creator, DealTrigger::Deliver, fixed_now()).unwrap();
        assert_eq!(delivered.status, DealStatus::Delivered);
    }

    #[test]
    fn checklist_belongs_to_the_creator_during_work() {
        let mut deal = sample_deal();
        deal.deliverables = new_deliverables(&["Story".to_string()]).unwrap();
        let item = deal.deliverables[0].id;

        let pending = mark_deliverable(&deal, &creator_actor(&deal), item, true, fixed_now());
        assert!(matches!(pending, Err(WorkflowError::Validation(_))));

        deal.status = DealStatus::Revision;
        let by_brand = mark_deliverable(&deal, &brand_actor(&deal), item, true, fixed_now());
        assert!(matches!(by_brand, Err(WorkflowError::Forbidden(_))));

        let unknown = mark_deliverable(
            &deal,
            &creator_actor(&deal),
            uuid::Uuid::new_v4(),
            true,
            fixed_now(),
        );
        assert!(matches!(unknown, Err(WorkflowError::NotFound { .. })));

        let ticked =
            mark_deliverable(&deal, &creator_actor(&deal), item, true, fixed_now()).unwrap();
        let unticked = mark_deliverable(&ticked, &creator_actor(&deal), item, false, fixed_now())
            .unwrap();
        assert!(!unticked.deliverables[0].is_completed);
        assert_eq!(unticked.deliverables[0].completed_at, None);
    }

    #[test]
    fn blank_deliverables_are_rejected() {
        assert!(new_deliverables(&["  ".to_string()]).is_err());
        assert!(new_deliverables(&vec!["x".to_string(); MAX_DELIVERABLES + 1]).is_err());
        assert!(new_deliverables(&[]).unwrap().is_empty());
    }
}
