use dealroom_db::models::WriteOutcome;
use dealroom_types::models::{DealStatus, DealTrigger};
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("cannot {trigger} a deal that is {from}")]
    InvalidTransition {
        from: DealStatus,
        trigger: DealTrigger,
    },

    /// `expected`/`actual` are row versions; both are `None` for pointer
    /// swaps that carry no version (a conversation's current deal).
    #[error("{entity} {id} was modified concurrently")]
    StaleState {
        entity: &'static str,
        id: Uuid,
        expected: Option<i64>,
        actual: Option<i64>,
    },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

impl WorkflowError {
    pub(crate) fn stale(entity: &'static str, id: Uuid, expected: i64, actual: i64) -> Self {
        warn!("stale write on {entity} {id}: expected v{expected}, found v{actual}");
        Self::StaleState {
            entity,
            id,
            expected: Some(expected),
            actual: Some(actual),
        }
    }

    pub(crate) fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

/// Turn the outcome of a versioned write into the caller-facing result.
pub(crate) fn settle<T>(
    outcome: WriteOutcome<T>,
    entity: &'static str,
    id: Uuid,
    expected: i64,
) -> WorkflowResult<T> {
    match outcome {
        WriteOutcome::Applied(value) => Ok(value),
        WriteOutcome::Stale { current } => Err(WorkflowError::stale(entity, id, expected, current)),
        WriteOutcome::Missing => Err(WorkflowError::NotFound { entity, id }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settle_maps_each_outcome() {
        let id = Uuid::new_v4();
        assert_eq!(settle(WriteOutcome::Applied(7), "deal", id, 1).unwrap(), 7);

        match settle::<()>(WriteOutcome::Stale { current: 6 }, "deal", id, 5) {
            Err(WorkflowError::StaleState { expected, actual, .. }) => {
                assert_eq!(expected, Some(5));
                assert_eq!(actual, Some(6));
            }
            other => panic!("expected StaleState, got {other:?}"),
        }

        assert!(matches!(
            settle::<()>(WriteOutcome::Missing, "deal", id, 5),
            Err(WorkflowError::NotFound { entity: "deal", .. })
        ));
    }

    #[test]
    fn invalid_transition_names_state_and_trigger() {
        let err = WorkflowError::InvalidTransition {
            from: DealStatus::Pending,
            trigger: DealTrigger::Deliver,
        };
        assert_eq!(err.to_string(), "cannot deliver a deal that is pending");
    }
}
