//! Topology mutation policy
//!
//! Structural changes are only safe in some pipeline states. The guard is
//! consulted synchronously right before each mutation, with a freshly
//! queried state; a rejection is final (no retry, no side effects).

use super::error::{PipelineError, PipelineResult};
use crate::graph::State;

/// Structural mutations subject to the policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    /// Link a sink chain into a junction
    AttachSink,
    /// Unlink a sink chain from its junction
    DetachSink,
}

pub struct TopologyGuard;

impl TopologyGuard {
    /// Whether `mutation` is allowed while the pipeline is in `current`
    pub fn can_mutate(mutation: Mutation, current: State) -> bool {
        match mutation {
            Mutation::AttachSink => current != State::Playing,
            Mutation::DetachSink => !matches!(current, State::Paused | State::Playing),
        }
    }

    pub fn check(mutation: Mutation, current: State) -> PipelineResult<()> {
        if Self::can_mutate(mutation, current) {
            Ok(())
        } else {
            tracing::warn!("{:?} rejected, pipeline is {}", mutation, current);
            Err(PipelineError::Precondition(format!(
                "{:?} not allowed in state {}",
                mutation, current
            )))
        }
    }
}
