use std::fmt;

use serde::Serialize;

/// Why part of the model was left out of an analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// The failure mode is disabled.
    Disabled,
    /// The failure mode's trigger condition does not hold.
    TriggerNotSatisfied,
    /// The trigger evaluator exceeded its time budget.
    TriggerEvaluationTimeout,
    /// An event has no declared causes and no failure modes.
    Undeveloped,
    /// A gate lost too many of its causes to be satisfiable.
    GateExcluded,
    /// A gate's cut-set expansion exceeded the configured bound.
    AnalysisTooLarge,
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disabled => "disabled",
            Self::TriggerNotSatisfied => "trigger not satisfied",
            Self::TriggerEvaluationTimeout => "trigger timeout",
            Self::Undeveloped => "undeveloped",
            Self::GateExcluded => "gate excluded",
            Self::AnalysisTooLarge => "too large",
        };
        f.write_str(s)
    }
}

/// A recoverable problem recorded during an analysis run.
///
/// Each warning names the excluded entity so a consumer can highlight it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    /// Category.
    pub kind: WarningKind,
    /// The affected event, gate or failure mode.
    pub entity: String,
    /// Human-readable detail.
    pub message: String,
}

impl Warning {
    pub(crate) fn new(kind: WarningKind, entity: impl Into<String>, message: impl Into<String>) -> Self {
        let warning = Self {
            kind,
            entity: entity.into(),
            message: message.into(),
        };
        tracing::warn!(kind = %warning.kind, entity = %warning.entity, "{}", warning.message);
        warning
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.entity, self.message)
    }
}
