//! Domain models for interface fault-mechanism analysis.
//!
//! This module contains the authored model types: modules and interfaces,
//! per-interface failure modes, declared causal links, task profiles, the
//! immutable snapshot that bundles them, and the analysis configuration.

mod id;
pub use id::{FailureModeId, InterfaceId, InvalidIdError, ModuleId, PointId};

mod error;
pub use error::ModelError;

/// Modules, interfaces and the validated structure graph.
pub mod structure;
pub use structure::{Direction, Endpoint, Interface, InterfaceCategory, Module, Structure};

mod failure_mode;
pub use failure_mode::{FailureMode, Occurrence, TriggerExpression};

pub mod causality;
pub use causality::{CausalGraph, CauseDeclaration, CombinationPolicy, EventRef};

mod profile;
pub use profile::{Phase, TaskProfile};

mod snapshot;
#[cfg(test)]
pub(crate) use snapshot::fixtures;
pub use snapshot::SystemSnapshot;

mod config;
pub use config::AnalysisConfig;
