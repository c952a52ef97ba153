use serde::{Deserialize, Serialize};

use crate::domain::{FailureModeId, InterfaceId, ModelError};

/// A trigger expression, stored verbatim.
///
/// The engine never looks inside; it is handed to an
/// [`Evaluator`](crate::analysis::Evaluator) together with a state context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TriggerExpression(String);

impl TriggerExpression {
    /// Wraps an expression string.
    #[must_use]
    pub fn new(expression: impl Into<String>) -> Self {
        Self(expression.into())
    }

    /// Returns the expression text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// How likely a failure mode is to occur.
///
/// Rates are expressed per unit of the task profile's time unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum Occurrence {
    /// A fixed probability of occurring during the mission.
    Probability {
        /// Probability in `[0, 1]`.
        probability: f64,
    },
    /// A constant failure rate, optionally with a repair rate.
    Rate {
        /// Failure rate λ (≥ 0).
        failure_rate: f64,
        /// Repair rate μ (≥ 0) for repairable components.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        repair_rate: Option<f64>,
    },
}

impl Occurrence {
    /// Returns `true` for rate models with a repair rate.
    #[must_use]
    pub const fn is_repairable(&self) -> bool {
        matches!(
            self,
            Self::Rate {
                repair_rate: Some(_),
                ..
            }
        )
    }

    fn validate(&self, failure_mode: &FailureModeId) -> Result<(), ModelError> {
        match *self {
            Self::Probability { probability } => {
                if !(0.0..=1.0).contains(&probability) {
                    return Err(ModelError::InvalidProbability {
                        failure_mode: failure_mode.clone(),
                        value: probability,
                    });
                }
            }
            Self::Rate {
                failure_rate,
                repair_rate,
            } => {
                for value in std::iter::once(failure_rate).chain(repair_rate) {
                    if !value.is_finite() || value < 0.0 {
                        return Err(ModelError::InvalidRate {
                            failure_mode: failure_mode.clone(),
                            value,
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

const fn enabled() -> bool {
    true
}

/// A way an interface can fail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureMode {
    /// Unique identifier.
    pub id: FailureModeId,
    /// The interface this failure mode is attached to.
    pub interface: InterfaceId,
    /// Human-readable label.
    pub label: String,
    /// Condition under which the failure mode can occur; always eligible when
    /// absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<TriggerExpression>,
    /// Occurrence probability or rate.
    pub occurrence: Occurrence,
    /// Disabled failure modes never enter a fault tree.
    #[serde(default = "enabled")]
    pub enabled: bool,
    /// Severity ranking, 1 (negligible) to 10 (catastrophic).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<u8>,
}

impl FailureMode {
    /// Checks the numeric attributes.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidProbability`] for a probability outside
    /// `[0, 1]` (including NaN) and [`ModelError::InvalidRate`] for a negative
    /// or non-finite rate.
    pub fn validate(&self) -> Result<(), ModelError> {
        self.occurrence.validate(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    fn failure_mode(occurrence: Occurrence) -> FailureMode {
        FailureMode {
            id: FailureModeId::new("fm").unwrap(),
            interface: InterfaceId::new("if").unwrap(),
            label: "open circuit".to_string(),
            trigger: None,
            occurrence,
            enabled: true,
            severity: None,
        }
    }

    #[test_case(0.0; "zero")]
    #[test_case(0.5; "half")]
    #[test_case(1.0; "one")]
    fn accepts_probabilities_in_range(p: f64) {
        assert!(
            failure_mode(Occurrence::Probability { probability: p })
                .validate()
                .is_ok()
        );
    }

    #[test_case(-0.01; "negative")]
    #[test_case(1.5; "above one")]
    #[test_case(f64::NAN; "nan")]
    fn rejects_probabilities_out_of_range(p: f64) {
        let err = failure_mode(Occurrence::Probability { probability: p })
            .validate()
            .unwrap_err();
        assert!(matches!(err, ModelError::InvalidProbability { .. }));
    }

    #[test]
    fn rejects_negative_repair_rate() {
        let err = failure_mode(Occurrence::Rate {
            failure_rate: 1e-4,
            repair_rate: Some(-1.0),
        })
        .validate()
        .unwrap_err();
        assert!(matches!(err, ModelError::InvalidRate { value, .. } if value == -1.0));
    }

    #[test]
    fn deserializes_with_defaults() {
        let yaml = "
id: fm1
interface: bus
label: stuck at zero
occurrence:
  model: rate
  failure_rate: 0.001
";
        let fm: FailureMode = serde_yaml::from_str(yaml).unwrap();
        assert!(fm.enabled);
        assert!(fm.trigger.is_none());
        assert!(!fm.occurrence.is_repairable());
    }
}
