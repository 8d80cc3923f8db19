//! Deal lifecycle, campaign rollups and negotiation threads.
//!
//! Everything here is synchronous; the HTTP layer calls into [`Workflow`]
//! from `spawn_blocking`.

pub mod campaign;
pub mod conversation;
pub mod deal;
pub mod error;
pub mod workflow;

#[cfg(test)]
pub(crate) mod test_support;

use std::sync::Mutex;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use dealroom_types::models::Role;

pub use error::{WorkflowError, WorkflowResult};
pub use workflow::{Outcome, Shortlisted, Workflow};

/// Knobs the workflow reads when filling in defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowConfig {
    /// Platform commission in basis points of the deal amount.
    pub platform_fee_bps: u32,
    pub default_delivery_days: u32,
    pub default_max_revisions: u32,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            platform_fee_bps: 1000,
            default_delivery_days: 7,
            default_max_revisions: 1,
        }
    }
}

impl WorkflowConfig {
    /// Fee owed on `amount` at the configured rate, rounded down.
    pub fn fee_for(&self, amount: i64) -> i64 {
        let fee = i128::from(amount) * i128::from(self.platform_fee_bps) / 10_000;
        fee.clamp(0, i128::from(amount.max(0))) as i64
    }
}

/// The verified caller of every workflow operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn is_system(&self) -> bool {
        self.role == Role::System
    }
}

/// Source of "now". Timestamps are truncated to microseconds, the
/// precision the store keeps.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now().trunc_subsecs(6)
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start.trunc_subsecs(6)),
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}
