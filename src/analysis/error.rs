use thiserror::Error;

use crate::domain::{EventRef, FailureModeId, ModelError};

/// Errors raised by fault-tree synthesis and analysis.
///
/// Structural errors abort the run: there is no sound partial tree to analyse.
/// Size and timeout conditions on a single subtree or event are recorded as
/// warnings by the analysis instead; they only surface here when nothing is
/// left to analyse.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AnalysisError {
    /// The top event, or a declared cause, names an entity absent from the
    /// snapshot.
    #[error("{referrer} references unknown {target}")]
    ReferenceNotFound {
        /// What holds the dangling reference.
        referrer: String,
        /// The missing entity.
        target: String,
    },

    /// The causal links reachable from the top event form a cycle.
    #[error("cyclic causality: {}", format_cycle(.cycle))]
    CyclicCausality {
        /// The events on the cycle, starting and ending with the same event.
        cycle: Vec<EventRef>,
    },

    /// The tree contains a gate the qualitative analysis cannot expand.
    #[error("gate `{gate}` is a {kind} gate, which is not supported in coherent analysis")]
    UnsupportedGateType {
        /// Label of the offending gate.
        gate: String,
        /// The gate kind.
        kind: &'static str,
    },

    /// A size guard was exceeded.
    #[error("analysis of {entity} is too large: {reason}")]
    AnalysisTooLarge {
        /// The gate, tree or event that exceeded the bound.
        entity: String,
        /// Which bound was exceeded.
        reason: String,
    },

    /// A probability outside `[0, 1]` reached the quantitative analysis.
    #[error("invalid probability {value} for failure mode `{failure_mode}`")]
    InvalidProbability {
        /// The failure mode.
        failure_mode: FailureModeId,
        /// The rejected value.
        value: f64,
    },

    /// The trigger evaluator failed for a failure mode's trigger expression.
    #[error("trigger of failure mode `{failure_mode}` could not be evaluated: {reason}")]
    TriggerEvaluationError {
        /// The failure mode whose trigger failed.
        failure_mode: FailureModeId,
        /// The evaluator's message.
        reason: String,
    },

    /// The trigger evaluator exceeded its time budget.
    #[error("trigger of failure mode `{failure_mode}` timed out after {timeout_ms} ms")]
    TriggerEvaluationTimeout {
        /// The failure mode whose trigger timed out.
        failure_mode: FailureModeId,
        /// The configured budget.
        timeout_ms: u64,
    },

    /// The run was cancelled through its cancellation token.
    #[error("analysis cancelled")]
    Cancelled,

    /// Every path below the top event was excluded.
    #[error("no failure event can cause {0}")]
    NoContributingEvents(EventRef),

    /// A hand-built fault tree violates the gate arity rules.
    #[error("invalid fault tree: {0}")]
    InvalidTree(String),

    /// The model or profile failed validation.
    #[error(transparent)]
    Model(#[from] ModelError),
}

fn format_cycle(cycle: &[EventRef]) -> String {
    cycle
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

impl AnalysisError {
    /// The identifier of the offending entity, where there is one.
    #[must_use]
    pub fn entity(&self) -> Option<String> {
        match self {
            Self::ReferenceNotFound { target, .. } => Some(target.clone()),
            Self::CyclicCausality { cycle } => cycle.first().map(ToString::to_string),
            Self::UnsupportedGateType { gate, .. } => Some(gate.clone()),
            Self::AnalysisTooLarge { entity, .. } => Some(entity.clone()),
            Self::InvalidProbability { failure_mode, .. }
            | Self::TriggerEvaluationError { failure_mode, .. }
            | Self::TriggerEvaluationTimeout { failure_mode, .. } => {
                Some(failure_mode.to_string())
            }
            Self::NoContributingEvents(event) => Some(event.to_string()),
            Self::Cancelled | Self::InvalidTree(_) | Self::Model(_) => None,
        }
    }
}
