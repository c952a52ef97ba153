use thiserror::Error;

use crate::domain::{EventRef, FailureModeId, InterfaceId, ModuleId, PointId};

/// Errors raised while validating an authored model or task profile.
///
/// Validation runs when a snapshot or profile is constructed, before any
/// analysis starts. Every variant names the offending entity.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    /// Two entities of the same kind share an identifier.
    #[error("duplicate {kind} identifier `{id}`")]
    DuplicateIdentifier {
        /// The kind of entity ("module", "interface", ...).
        kind: &'static str,
        /// The repeated identifier.
        id: String,
    },

    /// An entity references another entity that does not exist.
    #[error("{referrer} references unknown {target}")]
    ReferenceNotFound {
        /// The entity holding the dangling reference.
        referrer: String,
        /// The missing entity.
        target: String,
    },

    /// An interface point is owned by more than one module.
    #[error("interface point `{point}` is owned by both `{first}` and `{second}`")]
    PointClaimed {
        /// The contested point.
        point: PointId,
        /// The module declared first.
        first: ModuleId,
        /// The module declared second.
        second: ModuleId,
    },

    /// An interface endpoint names a point its module does not own.
    #[error("interface `{interface}` uses point `{point}`, which module `{module}` does not own")]
    PointNotOwned {
        /// The interface with the bad endpoint.
        interface: InterfaceId,
        /// The module named by the endpoint.
        module: ModuleId,
        /// The point named by the endpoint.
        point: PointId,
    },

    /// A failure mode's occurrence probability lies outside `[0, 1]`.
    #[error("failure mode `{failure_mode}` has invalid probability {value}")]
    InvalidProbability {
        /// The failure mode.
        failure_mode: FailureModeId,
        /// The rejected value.
        value: f64,
    },

    /// A failure or repair rate is negative or not finite.
    #[error("failure mode `{failure_mode}` has invalid rate {value}")]
    InvalidRate {
        /// The failure mode.
        failure_mode: FailureModeId,
        /// The rejected value.
        value: f64,
    },

    /// More than one cause declaration targets the same effect.
    #[error("{0} has more than one cause declaration")]
    ConflictingDeclaration(EventRef),

    /// A cause declaration's combination policy cannot be satisfied.
    #[error("cause declaration for {effect} is invalid: {reason}")]
    InvalidPolicy {
        /// The effect of the declaration.
        effect: EventRef,
        /// What is wrong with it.
        reason: String,
    },

    /// A task profile phase is malformed.
    #[error("task profile phase `{phase}` is invalid: {reason}")]
    InvalidTaskProfile {
        /// The phase name (empty for profile-level problems).
        phase: String,
        /// What is wrong with it.
        reason: String,
    },
}
