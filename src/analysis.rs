//! The analysis engine.
//!
//! A run takes an immutable [`SystemSnapshot`](crate::domain::SystemSnapshot)
//! through three stages:
//!
//! 1. synthesis of a [`FaultTree`] for a [`TopEvent`] from the declared causes
//! 2. qualitative analysis: the minimal cut sets of the tree
//! 3. quantitative analysis: top-event probability per phase and over the
//!    mission, and importance of each basic event
//!
//! [`Engine`] runs the whole pipeline and produces an [`AnalysisReport`].

mod cancel;
pub use cancel::CancellationToken;

mod error;
pub use error::AnalysisError;

mod warning;
pub use warning::{Warning, WarningKind};

mod fault_tree;
pub use fault_tree::{
    BasicEvent, EventIndex, FaultTree, FaultTreeBuilder, Gate, GateKind, Node, NodeId,
};

pub mod trigger;
pub use trigger::{
    BoundedEvaluator, DeclarativeEvaluator, EvaluationFailure, Evaluator, TriggerContext,
    TriggerOutcome,
};

mod synthesis;
pub use synthesis::{Synthesis, Synthesizer, TopEvent, TopEventParseError};

mod cut_sets;
pub use cut_sets::{CutSet, Limits, Qualitative, minimal_cut_sets};

pub mod probability;
pub use probability::EventProbabilities;

pub mod quantitative;
pub use quantitative::{EventImportance, Estimate, Method};

mod report;
pub use report::{AnalysisReport, CutSetEntry, Engine, ImportanceEntry, PhaseProbability};
