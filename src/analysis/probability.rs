//! Basic-event probabilities over a task profile.

use crate::{
    analysis::{AnalysisError, EventIndex, FaultTree},
    domain::{Occurrence, SystemSnapshot, TaskProfile},
};

/// Probability of each basic event, per phase and over the whole mission.
#[derive(Debug, Clone, PartialEq)]
pub struct EventProbabilities {
    per_phase: Vec<Vec<f64>>,
    mission: Vec<f64>,
}

impl EventProbabilities {
    /// Probabilities at the end of phase `phase`, indexed by event.
    #[must_use]
    pub fn phase(&self, phase: usize) -> &[f64] {
        &self.per_phase[phase]
    }

    /// Number of phases.
    #[must_use]
    pub fn phase_count(&self) -> usize {
        self.per_phase.len()
    }

    /// Mission probabilities, indexed by event.
    #[must_use]
    pub fn mission(&self) -> &[f64] {
        &self.mission
    }

    /// Mission probability of one event.
    #[must_use]
    pub fn mission_of(&self, event: EventIndex) -> f64 {
        self.mission[event.index()]
    }
}

/// One phase as seen by a single failure mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Exposure {
    /// Phase duration.
    pub duration: f64,
    /// Whether the failure mode can occur during the phase.
    pub active: bool,
}

/// `1 - exp(-λ t)`, accurate for small `λ t`.
fn cumulative(rate: f64, time: f64) -> f64 {
    0.0 - (-rate * time).exp_m1()
}

/// Resolves one occurrence model over a sequence of phases.
///
/// Returns the per-phase values and the mission value:
///
/// - fixed probability `p`: `p` while active and `0` while inactive; over
///   the mission, `p` if active in any phase
/// - non-repairable rate `λ`: `1 - exp(-λ t)` with `t` the cumulative active
///   time so far, so the value is frozen through inactive phases; over the
///   mission, the value at the end
/// - repairable `(λ, μ)`: steady-state unavailability `λ / (λ + μ)` while
///   active (`0` when both rates are zero) and `0` while inactive; over the
///   mission, the duration-weighted mean
#[must_use]
pub fn resolve(occurrence: &Occurrence, phases: &[Exposure]) -> (Vec<f64>, f64) {
    match *occurrence {
        Occurrence::Probability { probability } => {
            let per_phase: Vec<f64> = phases
                .iter()
                .map(|p| if p.active { probability } else { 0.0 })
                .collect();
            let mission = if phases.iter().any(|p| p.active) {
                probability
            } else {
                0.0
            };
            (per_phase, mission)
        }
        Occurrence::Rate {
            failure_rate,
            repair_rate: None,
        } => {
            let mut elapsed = 0.0;
            let per_phase: Vec<f64> = phases
                .iter()
                .map(|p| {
                    if p.active {
                        elapsed += p.duration;
                    }
                    cumulative(failure_rate, elapsed)
                })
                .collect();
            let mission = cumulative(failure_rate, elapsed);
            (per_phase, mission)
        }
        Occurrence::Rate {
            failure_rate,
            repair_rate: Some(repair_rate),
        } => {
            let total = failure_rate + repair_rate;
            let unavailability = if total > 0.0 {
                failure_rate / total
            } else {
                0.0
            };
            let per_phase: Vec<f64> = phases
                .iter()
                .map(|p| if p.active { unavailability } else { 0.0 })
                .collect();

            let duration: f64 = phases.iter().map(|p| p.duration).sum();
            let mission = if duration > 0.0 {
                phases
                    .iter()
                    .zip(&per_phase)
                    .map(|(p, q)| p.duration * q)
                    .sum::<f64>()
                    / duration
            } else {
                0.0
            };
            (per_phase, mission)
        }
    }
}

/// Resolves the probability of every basic event in `tree`.
///
/// # Errors
///
/// Returns [`AnalysisError::ReferenceNotFound`] if the tree names a failure
/// mode missing from `snapshot`, or [`AnalysisError::InvalidProbability`] if a
/// resolved value falls outside `[0, 1]`.
pub fn event_probabilities(
    tree: &FaultTree,
    snapshot: &SystemSnapshot,
    profile: &TaskProfile,
) -> Result<EventProbabilities, AnalysisError> {
    let phase_count = profile.phases().len();
    let mut per_phase = vec![Vec::with_capacity(tree.events().len()); phase_count];
    let mut mission = Vec::with_capacity(tree.events().len());

    for event in tree.events() {
        let failure_mode = snapshot.failure_mode(&event.failure_mode).ok_or_else(|| {
            AnalysisError::ReferenceNotFound {
                referrer: format!("fault tree `{}`", tree.top_event()),
                target: format!("failure mode `{}`", event.failure_mode),
            }
        })?;

        let exposures: Vec<Exposure> = profile
            .phases()
            .iter()
            .map(|phase| Exposure {
                duration: phase.duration,
                active: phase.is_active(&failure_mode.id),
            })
            .collect();
        let (phases, total) = resolve(&failure_mode.occurrence, &exposures);

        for &value in phases.iter().chain(std::iter::once(&total)) {
            if !(0.0..=1.0).contains(&value) {
                return Err(AnalysisError::InvalidProbability {
                    failure_mode: failure_mode.id.clone(),
                    value,
                });
            }
        }

        for (column, value) in per_phase.iter_mut().zip(phases) {
            column.push(value);
        }
        mission.push(total);
    }

    Ok(EventProbabilities { per_phase, mission })
}

#[cfg(test)]
mod tests {
    use super::*;

    const fn active(duration: f64) -> Exposure {
        Exposure {
            duration,
            active: true,
        }
    }

    const fn inactive(duration: f64) -> Exposure {
        Exposure {
            duration,
            active: false,
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn fixed_probability_is_zero_while_inactive() {
        let (phases, mission) = resolve(
            &Occurrence::Probability { probability: 0.1 },
            &[active(1.0), inactive(1.0)],
        );
        assert_eq!(phases, [0.1, 0.0]);
        assert!(close(mission, 0.1));

        let (_, mission) = resolve(
            &Occurrence::Probability { probability: 0.1 },
            &[inactive(1.0)],
        );
        assert!(close(mission, 0.0));
    }

    #[test]
    fn non_repairable_rate_accumulates_and_freezes() {
        let rate = Occurrence::Rate {
            failure_rate: 0.01,
            repair_rate: None,
        };
        let (phases, mission) = resolve(&rate, &[active(10.0), inactive(50.0), active(10.0)]);

        let after_10 = 1.0 - (-0.1_f64).exp();
        let after_20 = 1.0 - (-0.2_f64).exp();
        assert!(close(phases[0], after_10));
        assert!(close(phases[1], after_10));
        assert!(close(phases[2], after_20));
        assert!(close(mission, after_20));
        assert!(phases.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn repairable_uses_steady_state_unavailability() {
        let rate = Occurrence::Rate {
            failure_rate: 1.0,
            repair_rate: Some(3.0),
        };
        let (phases, mission) = resolve(&rate, &[active(1.0), inactive(3.0)]);
        assert_eq!(phases, [0.25, 0.0]);
        assert!(close(mission, 0.25 / 4.0));
    }

    #[test]
    fn zero_rates_resolve_to_zero() {
        let rate = Occurrence::Rate {
            failure_rate: 0.0,
            repair_rate: Some(0.0),
        };
        let (phases, mission) = resolve(&rate, &[active(1.0)]);
        assert_eq!(phases, [0.0]);
        assert!(close(mission, 0.0));

        let (_, mission) = resolve(&rate, &[active(0.0)]);
        assert!(close(mission, 0.0));
    }
}
