//! The analysis pipeline and its structured result.

use std::{collections::BTreeMap, sync::Arc};

use chrono::{DateTime, Utc};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    analysis::{
        AnalysisError, BoundedEvaluator, CancellationToken, DeclarativeEvaluator, Evaluator,
        Limits, Method, Synthesis, Synthesizer, TopEvent, TriggerContext, Warning, cut_sets,
        probability, quantitative,
    },
    domain::{AnalysisConfig, FailureModeId, SystemSnapshot, TaskProfile},
};

/// Top-event probability at the end of one phase.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseProbability {
    /// Phase name.
    pub phase: String,
    /// Phase duration.
    pub duration: f64,
    /// Top-event probability.
    pub probability: f64,
    /// How the probability was computed.
    pub method: Method,
}

/// One minimal cut set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CutSetEntry {
    /// Member failure modes, sorted.
    pub failure_modes: Vec<FailureModeId>,
    /// Number of members.
    pub order: usize,
    /// Mission probability of all members occurring.
    pub probability: f64,
}

/// Importance of one failure mode to the top event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportanceEntry {
    /// The failure mode.
    pub failure_mode: FailureModeId,
    /// Readable name.
    pub label: String,
    /// Mission probability of the failure mode.
    pub probability: f64,
    /// Drop in top-event probability if the failure mode never occurs.
    pub risk_reduction: f64,
    /// Birnbaum importance.
    pub birnbaum: f64,
    /// Fraction of minimal cut sets containing the failure mode.
    pub structural: f64,
}

/// The result of analysing one top event.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    /// Unique identifier of this run.
    pub run_id: Uuid,
    /// When the run finished.
    pub generated_at: DateTime<Utc>,
    /// Fingerprint of the analysed snapshot.
    pub snapshot_fingerprint: String,
    /// The analysed failure condition.
    pub top_event: TopEvent,
    /// `approximate` if any figure in this report was approximated.
    pub method: Method,
    /// Top-event probability per phase, in profile order.
    pub per_phase_probability: Vec<PhaseProbability>,
    /// Top-event probability over the mission.
    pub mission_probability: f64,
    /// Minimal cut sets, by ascending order.
    pub minimal_cut_sets: Vec<CutSetEntry>,
    /// Number of cut sets of each order.
    pub cut_sets_by_order: BTreeMap<usize, usize>,
    /// Failure modes that cause the top event on their own.
    pub single_point_failures: Vec<FailureModeId>,
    /// Failure modes ranked by risk reduction.
    pub importance_ranking: Vec<ImportanceEntry>,
    /// Elements excluded from the analysis.
    pub warnings: Vec<Warning>,
}

/// Runs analyses over immutable snapshots.
///
/// An engine holds no per-run state, so one engine can serve any number of
/// runs, including concurrent ones via [`Engine::analyze_batch`].
#[derive(Debug, Clone)]
pub struct Engine {
    config: AnalysisConfig,
    evaluator: BoundedEvaluator,
    context: Arc<TriggerContext>,
    cancel: CancellationToken,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(AnalysisConfig::default())
    }
}

impl Engine {
    /// An engine using the declarative trigger evaluator and an empty context.
    #[must_use]
    pub fn new(config: AnalysisConfig) -> Self {
        let evaluator = BoundedEvaluator::new(Arc::new(DeclarativeEvaluator), config.trigger_timeout());
        Self {
            config,
            evaluator,
            context: Arc::new(TriggerContext::new()),
            cancel: CancellationToken::new(),
        }
    }

    /// Replaces the trigger evaluator.
    #[must_use]
    pub fn with_evaluator(mut self, evaluator: Arc<dyn Evaluator>) -> Self {
        self.evaluator = BoundedEvaluator::new(evaluator, self.config.trigger_timeout());
        self
    }

    /// Sets the context triggers are evaluated against.
    #[must_use]
    pub fn with_context(mut self, context: TriggerContext) -> Self {
        self.context = Arc::new(context);
        self
    }

    /// Shares a cancellation token with the caller.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// The token that cancels this engine's runs.
    #[must_use]
    pub const fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Bounds for qualitative analysis.
    #[must_use]
    pub const fn limits(&self) -> Limits {
        Limits {
            max_cut_sets: self.config.max_cut_sets(),
            max_tree_depth: self.config.max_tree_depth(),
        }
    }

    /// Synthesizes the fault tree for `top`.
    ///
    /// # Errors
    ///
    /// See [`Synthesizer::synthesize`].
    pub fn synthesize(
        &self,
        snapshot: &SystemSnapshot,
        top: &TopEvent,
    ) -> Result<Synthesis, AnalysisError> {
        Synthesizer::new(
            snapshot,
            &self.config,
            &self.evaluator,
            &self.context,
            &self.cancel,
        )
        .synthesize(top)
    }

    /// Synthesizes, reduces and quantifies the fault tree for `top`.
    ///
    /// # Errors
    ///
    /// Returns the first error of any stage: profile validation (wrapped
    /// [`ModelError`](crate::domain::ModelError)), synthesis, qualitative
    /// analysis, or probability resolution. Recoverable conditions are
    /// reported as warnings instead.
    #[instrument(skip_all, fields(top_event = %top, profile = profile.name()))]
    pub fn analyze(
        &self,
        snapshot: &SystemSnapshot,
        top: &TopEvent,
        profile: &TaskProfile,
    ) -> Result<AnalysisReport, AnalysisError> {
        snapshot.validate_profile(profile)?;

        let Synthesis { tree, warnings, .. } = self.synthesize(snapshot, top)?;
        let qualitative = cut_sets::minimal_cut_sets(&tree, self.limits(), &self.cancel)?;
        let probabilities = probability::event_probabilities(&tree, snapshot, profile)?;
        let exact_limit = self.config.exact_combination_limit();

        let mut method = Method::Exact;
        let mut per_phase_probability = Vec::with_capacity(probabilities.phase_count());
        for (index, phase) in profile.phases().iter().enumerate() {
            let estimate = quantitative::top_event_probability(
                &qualitative.cut_sets,
                probabilities.phase(index),
                exact_limit,
                &self.cancel,
            )?;
            method = method.combine(estimate.method);
            per_phase_probability.push(PhaseProbability {
                phase: phase.name.clone(),
                duration: phase.duration,
                probability: estimate.probability,
                method: estimate.method,
            });
        }

        let mission = quantitative::top_event_probability(
            &qualitative.cut_sets,
            probabilities.mission(),
            exact_limit,
            &self.cancel,
        )?;
        method = method.combine(mission.method);

        let (ranking, importance_method) = quantitative::importance(
            &qualitative.cut_sets,
            probabilities.mission(),
            mission.probability,
            exact_limit,
            &self.cancel,
        )?;
        method = method.combine(importance_method);

        let minimal_cut_sets = qualitative
            .cut_sets
            .iter()
            .map(|cut_set| CutSetEntry {
                failure_modes: cut_set
                    .events()
                    .iter()
                    .map(|&e| tree.event(e).failure_mode.clone())
                    .collect(),
                order: cut_set.order(),
                probability: quantitative::cut_set_probability(cut_set, probabilities.mission()),
            })
            .collect();

        let importance_ranking = ranking
            .into_iter()
            .map(|entry| {
                let event = tree.event(entry.event);
                ImportanceEntry {
                    failure_mode: event.failure_mode.clone(),
                    label: event.label.clone(),
                    probability: probabilities.mission_of(entry.event),
                    risk_reduction: entry.risk_reduction,
                    birnbaum: entry.birnbaum,
                    structural: entry.structural,
                }
            })
            .collect();

        let report = AnalysisReport {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            snapshot_fingerprint: snapshot.fingerprint(),
            top_event: top.clone(),
            method,
            per_phase_probability,
            mission_probability: mission.probability,
            cut_sets_by_order: qualitative.by_order(),
            single_point_failures: qualitative
                .single_point_failures()
                .map(|e| tree.event(e).failure_mode.clone())
                .collect(),
            minimal_cut_sets,
            importance_ranking,
            warnings: warnings.into_iter().chain(qualitative.warnings).collect(),
        };

        tracing::info!(
            cut_sets = report.minimal_cut_sets.len(),
            mission_probability = report.mission_probability,
            method = %report.method,
            warnings = report.warnings.len(),
            "analysis complete"
        );

        Ok(report)
    }

    /// Analyses several top events in parallel.
    ///
    /// Each run is independent; results are returned in input order.
    pub fn analyze_batch(
        &self,
        snapshot: &SystemSnapshot,
        tops: &[TopEvent],
        profile: &TaskProfile,
    ) -> Vec<Result<AnalysisReport, AnalysisError>> {
        self.analyze_batch_with(snapshot, tops, profile, |_| {})
    }

    /// Like [`Engine::analyze_batch`], calling `on_done` as each run finishes.
    pub fn analyze_batch_with<F>(
        &self,
        snapshot: &SystemSnapshot,
        tops: &[TopEvent],
        profile: &TaskProfile,
        on_done: F,
    ) -> Vec<Result<AnalysisReport, AnalysisError>>
    where
        F: Fn(&TopEvent) + Sync,
    {
        tops.par_iter()
            .map(|top| {
                let result = self.analyze(snapshot, top, profile);
                on_done(top);
                result
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::{
        analysis::WarningKind,
        domain::{
            Occurrence, Phase,
            fixtures::{failure_mode, modules_and_interfaces, snapshot},
        },
    };

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    fn top(s: &str) -> TopEvent {
        s.parse().unwrap()
    }

    #[test]
    fn analyses_the_chain_model() {
        let snapshot = snapshot();
        let profile = TaskProfile::single_phase(1.0).unwrap();

        let report = Engine::default()
            .analyze(&snapshot, &top("interface:cmd"), &profile)
            .unwrap();

        // 1 - (1 - 0.001)(1 - 0.01)(1 - 0.02 * 0.03)
        let expected = 1.0 - 0.999 * 0.99 * (1.0 - 0.0006);
        assert!(close(report.mission_probability, expected));
        assert_eq!(report.method, Method::Exact);
        assert_eq!(report.per_phase_probability.len(), 1);
        assert!(close(report.per_phase_probability[0].probability, expected));

        assert_eq!(report.minimal_cut_sets.len(), 3);
        assert_eq!(report.cut_sets_by_order, BTreeMap::from([(1, 2), (2, 1)]));
        let single: Vec<&str> = report
            .single_point_failures
            .iter()
            .map(FailureModeId::as_str)
            .collect();
        assert_eq!(single, ["cmd_lost", "sig_lost"]);

        assert_eq!(report.importance_ranking[0].failure_mode.as_str(), "sig_lost");
        assert_eq!(report.snapshot_fingerprint, snapshot.fingerprint());
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn phases_scale_rate_based_events() {
        let (modules, interfaces) = modules_and_interfaces();
        let mut sig = failure_mode("sig_lost", "sig", 0.0);
        sig.occurrence = Occurrence::Rate {
            failure_rate: 1e-3,
            repair_rate: None,
        };
        let snapshot = SystemSnapshot::new(modules, interfaces, vec![sig], vec![]).unwrap();
        let phase = |name: &str, duration| Phase {
            name: name.to_string(),
            duration,
            mode: "operate".to_string(),
            active: None,
            inactive: Default::default(),
        };
        let profile =
            TaskProfile::new("mission", vec![phase("climb", 10.0), phase("cruise", 90.0)])
                .unwrap();

        let report = Engine::default()
            .analyze(&snapshot, &top("interface:sig"), &profile)
            .unwrap();

        let climb = report.per_phase_probability[0].probability;
        let cruise = report.per_phase_probability[1].probability;
        assert!(close(climb, 1.0 - (-0.01_f64).exp()));
        assert!(close(cruise, 1.0 - (-0.1_f64).exp()));
        assert!(close(report.mission_probability, cruise));
    }

    #[test]
    fn approximation_is_reported() {
        let snapshot = snapshot();
        let profile = TaskProfile::single_phase(1.0).unwrap();
        let engine = Engine::new(AnalysisConfig::default().with_exact_combination_limit(1));

        let report = engine
            .analyze(&snapshot, &top("interface:cmd"), &profile)
            .unwrap();

        assert_eq!(report.method, Method::Approximate);
        assert!(close(report.mission_probability, 0.001 + 0.01 + 0.0006));
    }

    #[test]
    fn unknown_profile_reference_fails_fast() {
        let snapshot = snapshot();
        let profile = TaskProfile::new(
            "mission",
            vec![Phase {
                name: "only".to_string(),
                duration: 1.0,
                mode: "operate".to_string(),
                active: None,
                inactive: [FailureModeId::new("ghost").unwrap()].into(),
            }],
        )
        .unwrap();

        let err = Engine::default()
            .analyze(&snapshot, &top("interface:cmd"), &profile)
            .unwrap_err();

        assert!(matches!(err, AnalysisError::Model(_)));
    }

    #[test]
    fn warnings_reach_the_report() {
        let mut snapshot_modes = vec![
            failure_mode("sig_lost", "sig", 0.1),
            failure_mode("cmd_lost", "cmd", 0.1),
        ];
        snapshot_modes[1].enabled = false;
        let (modules, interfaces) = modules_and_interfaces();
        let snapshot = SystemSnapshot::new(modules, interfaces, snapshot_modes, vec![]).unwrap();
        let mut config = AnalysisConfig::default();
        config.set_infer_module_causes(true);

        let report = Engine::new(config)
            .analyze(
                &snapshot,
                &top("module:ecu"),
                &TaskProfile::single_phase(1.0).unwrap(),
            )
            .unwrap();

        assert!(close(report.mission_probability, 0.1));
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].kind, WarningKind::Disabled);
    }

    #[test]
    fn batch_runs_each_top_event() {
        let snapshot = snapshot();
        let profile = TaskProfile::single_phase(1.0).unwrap();
        let tops = [top("interface:cmd"), top("module:ghost"), top("module:ecu")];
        let done = AtomicUsize::new(0);

        let results = Engine::default().analyze_batch_with(&snapshot, &tops, &profile, |_| {
            done.fetch_add(1, Ordering::Relaxed);
        });

        assert_eq!(done.load(Ordering::Relaxed), 3);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(AnalysisError::ReferenceNotFound { .. })
        ));
        let ecu = results[2].as_ref().unwrap();
        assert!(close(ecu.mission_probability, 0.02 * 0.03));
        assert_ne!(results[0].as_ref().unwrap().run_id, ecu.run_id);
    }

    #[test]
    fn cancelled_engine_stops() {
        let cancel = CancellationToken::new();
        let engine = Engine::default().with_cancellation(cancel.clone());
        cancel.cancel();

        let err = engine
            .analyze(
                &snapshot(),
                &top("interface:cmd"),
                &TaskProfile::single_phase(1.0).unwrap(),
            )
            .unwrap_err();

        assert_eq!(err, AnalysisError::Cancelled);
    }
}
