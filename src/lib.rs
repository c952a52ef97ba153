//! Interface fault-mechanism analysis
//!
//! A system is modelled as modules joined by typed interfaces. Each interface
//! carries failure modes, and declared causal links say which failures lead to
//! which. From that model the engine synthesizes a fault tree for a chosen
//! failure condition, reduces it to its minimal cut sets, and computes the
//! probability of the condition over a phased mission.

pub mod domain;
pub use domain::{AnalysisConfig, EventRef, FailureModeId, SystemSnapshot, TaskProfile};

pub mod analysis;
pub use analysis::{AnalysisError, AnalysisReport, CancellationToken, Engine, FaultTree, TopEvent};

pub mod storage;
pub use storage::{LoadError, ModelDocument};
