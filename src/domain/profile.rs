//! Time-phased mission (task) profiles.

use std::collections::BTreeSet;

use nonempty::NonEmpty;
use serde::{Deserialize, Serialize};

use crate::domain::{FailureModeId, ModelError};

/// One phase of a mission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    /// Phase name, unique within the profile.
    pub name: String,
    /// Duration, in the profile's time unit.
    pub duration: f64,
    /// Operating-mode tag (e.g. "takeoff", "cruise").
    #[serde(default)]
    pub mode: String,
    /// If present, only these failure modes are active in this phase.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<BTreeSet<FailureModeId>>,
    /// Failure modes that are inactive in this phase.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub inactive: BTreeSet<FailureModeId>,
}

impl Phase {
    /// Whether a failure mode can occur during this phase.
    #[must_use]
    pub fn is_active(&self, failure_mode: &FailureModeId) -> bool {
        self.active
            .as_ref()
            .is_none_or(|active| active.contains(failure_mode))
            && !self.inactive.contains(failure_mode)
    }

    /// All failure modes named by this phase's active or inactive sets.
    pub fn referenced_failure_modes(&self) -> impl Iterator<Item = &FailureModeId> {
        self.active.iter().flatten().chain(&self.inactive)
    }
}

fn default_time_unit() -> String {
    "hours".to_string()
}

/// An ordered, non-empty sequence of mission phases.
///
/// Created per analysis run and immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawProfile", into = "RawProfile")]
pub struct TaskProfile {
    name: String,
    time_unit: String,
    phases: NonEmpty<Phase>,
}

impl TaskProfile {
    /// Builds a profile.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidTaskProfile`] if there are no phases, a
    /// phase name repeats, or a duration is negative or not finite.
    pub fn new(name: impl Into<String>, phases: Vec<Phase>) -> Result<Self, ModelError> {
        Self::with_time_unit(name, default_time_unit(), phases)
    }

    /// Builds a profile with an explicit time unit label.
    ///
    /// # Errors
    ///
    /// See [`TaskProfile::new`].
    pub fn with_time_unit(
        name: impl Into<String>,
        time_unit: impl Into<String>,
        phases: Vec<Phase>,
    ) -> Result<Self, ModelError> {
        let mut seen = BTreeSet::new();
        for phase in &phases {
            if !phase.duration.is_finite() || phase.duration < 0.0 {
                return Err(ModelError::InvalidTaskProfile {
                    phase: phase.name.clone(),
                    reason: format!("duration {} is not a non-negative number", phase.duration),
                });
            }
            if !seen.insert(phase.name.as_str()) {
                return Err(ModelError::InvalidTaskProfile {
                    phase: phase.name.clone(),
                    reason: "phase name is not unique".to_string(),
                });
            }
        }

        let phases =
            NonEmpty::from_vec(phases).ok_or_else(|| ModelError::InvalidTaskProfile {
                phase: String::new(),
                reason: "a task profile needs at least one phase".to_string(),
            })?;

        Ok(Self {
            name: name.into(),
            time_unit: time_unit.into(),
            phases,
        })
    }

    /// A single-phase profile with every failure mode active.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidTaskProfile`] if the duration is negative
    /// or not finite.
    pub fn single_phase(duration: f64) -> Result<Self, ModelError> {
        Self::new(
            "mission",
            vec![Phase {
                name: "mission".to_string(),
                duration,
                mode: String::new(),
                active: None,
                inactive: BTreeSet::new(),
            }],
        )
    }

    /// Profile name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Label of the time unit shared with failure rates.
    #[must_use]
    pub fn time_unit(&self) -> &str {
        &self.time_unit
    }

    /// The phases, in mission order.
    #[must_use]
    pub const fn phases(&self) -> &NonEmpty<Phase> {
        &self.phases
    }

    /// Total mission duration.
    #[must_use]
    pub fn total_duration(&self) -> f64 {
        self.phases.iter().map(|phase| phase.duration).sum()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct RawProfile {
    name: String,
    #[serde(default = "default_time_unit")]
    time_unit: String,
    phases: Vec<Phase>,
}

impl TryFrom<RawProfile> for TaskProfile {
    type Error = ModelError;

    fn try_from(raw: RawProfile) -> Result<Self, Self::Error> {
        Self::with_time_unit(raw.name, raw.time_unit, raw.phases)
    }
}

impl From<TaskProfile> for RawProfile {
    fn from(profile: TaskProfile) -> Self {
        Self {
            name: profile.name,
            time_unit: profile.time_unit,
            phases: profile.phases.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phase(name: &str, duration: f64) -> Phase {
        Phase {
            name: name.to_string(),
            duration,
            mode: String::new(),
            active: None,
            inactive: BTreeSet::new(),
        }
    }

    #[test]
    fn empty_profile_is_rejected() {
        let err = TaskProfile::new("empty", vec![]).unwrap_err();
        assert!(matches!(err, ModelError::InvalidTaskProfile { .. }));
    }

    #[test]
    fn negative_duration_is_rejected() {
        let err = TaskProfile::new("p", vec![phase("climb", -1.0)]).unwrap_err();
        assert!(matches!(err, ModelError::InvalidTaskProfile { phase, .. } if phase == "climb"));
    }

    #[test]
    fn repeated_phase_name_is_rejected() {
        let err = TaskProfile::new("p", vec![phase("a", 1.0), phase("a", 2.0)]).unwrap_err();
        assert!(matches!(err, ModelError::InvalidTaskProfile { .. }));
    }

    #[test]
    fn active_and_inactive_sets_combine() {
        let fm_a = FailureModeId::new("a").unwrap();
        let fm_b = FailureModeId::new("b").unwrap();
        let fm_c = FailureModeId::new("c").unwrap();

        let mut p = phase("cruise", 1.0);
        assert!(p.is_active(&fm_a));

        p.active = Some([fm_a.clone(), fm_b.clone()].into());
        p.inactive = [fm_b.clone()].into();
        assert!(p.is_active(&fm_a));
        assert!(!p.is_active(&fm_b));
        assert!(!p.is_active(&fm_c));
    }

    #[test]
    fn deserializes_and_sums_durations() {
        let yaml = "
name: sortie
phases:
  - name: takeoff
    duration: 0.5
  - name: cruise
    duration: 9.5
    inactive: [gear_jam]
";
        let profile: TaskProfile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(profile.time_unit(), "hours");
        assert_eq!(profile.phases().len(), 2);
        assert!((profile.total_duration() - 10.0).abs() < 1e-12);
    }
}
