//! Fault-tree synthesis from declared causal links.
//!
//! Synthesis starts at the top event and follows declared causes backwards.
//! Each declaration becomes a gate whose logic follows its combination policy;
//! failure modes without declared causes become basic events. Elements that
//! cannot contribute (disabled failure modes, unsatisfied or timed-out
//! triggers, undeveloped events) are excluded with a warning and the
//! surrounding logic adjusts: an OR drops them, an AND is excluded with them,
//! and a k-out-of-n gate keeps its remaining causes while at least `k` remain.

use std::{collections::BTreeMap, fmt, str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::{
    analysis::{
        AnalysisError, BoundedEvaluator, CancellationToken, FaultTree, FaultTreeBuilder, GateKind,
        NodeId, TriggerContext, TriggerOutcome, Warning, WarningKind,
    },
    domain::{
        AnalysisConfig, CauseDeclaration, CombinationPolicy, EventRef, FailureMode, FailureModeId,
        InterfaceId, InvalidIdError, ModuleId, SystemSnapshot,
    },
};

/// The failure condition a fault tree is synthesized for.
///
/// Written on the command line as `kind:ID[/condition]`, for example
/// `interface:IF1/short`, `module:M1/loss of output` or `failure-mode:FM3`.
/// For an interface the condition names one of its failure modes by
/// identifier or label; without one (or with `any`) any of its failure modes
/// counts. For modules and failure modes the condition is descriptive only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TopEvent {
    /// The module, interface or failure mode.
    pub target: EventRef,
    /// The named failure condition.
    pub condition: Option<String>,
}

impl TopEvent {
    /// A top event with no named condition.
    #[must_use]
    pub const fn new(target: EventRef) -> Self {
        Self {
            target,
            condition: None,
        }
    }

    /// Names the failure condition.
    #[must_use]
    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }
}

/// Error returned when a top-event string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopEventParseError {
    /// The string has no `kind:` prefix.
    #[error("top event '{0}' must look like 'kind:ID' or 'kind:ID/condition'")]
    Syntax(String),
    /// The kind is not one of `module`, `interface` or `failure-mode`.
    #[error("unknown top event kind '{0}' (expected module, interface or failure-mode)")]
    Kind(String),
    /// The identifier is malformed.
    #[error(transparent)]
    Id(#[from] InvalidIdError),
}

impl FromStr for TopEvent {
    type Err = TopEventParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, rest) = s
            .split_once(':')
            .ok_or_else(|| TopEventParseError::Syntax(s.to_string()))?;
        let (id, condition) = match rest.split_once('/') {
            Some((id, condition)) => (id.trim(), Some(condition.trim())),
            None => (rest.trim(), None),
        };

        let target = match kind.trim() {
            "module" => EventRef::Module(ModuleId::new(id)?),
            "interface" => EventRef::Interface(InterfaceId::new(id)?),
            "failure-mode" | "failure_mode" => EventRef::FailureMode(FailureModeId::new(id)?),
            other => return Err(TopEventParseError::Kind(other.to_string())),
        };

        Ok(Self {
            target,
            condition: condition.filter(|c| !c.is_empty()).map(str::to_string),
        })
    }
}

impl TryFrom<String> for TopEvent {
    type Error = TopEventParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TopEvent> for String {
    fn from(top: TopEvent) -> Self {
        top.to_string()
    }
}

impl fmt::Display for TopEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            EventRef::Module(id) => write!(f, "module:{id}")?,
            EventRef::Interface(id) => write!(f, "interface:{id}")?,
            EventRef::FailureMode(id) => write!(f, "failure-mode:{id}")?,
        }
        if let Some(condition) = &self.condition {
            write!(f, "/{condition}")?;
        }
        Ok(())
    }
}

/// A synthesized tree with the warnings raised while building it.
#[derive(Debug, Clone)]
pub struct Synthesis {
    /// The fault tree.
    pub tree: FaultTree,
    /// The event the tree's root stands for, after resolving the condition.
    pub root_event: EventRef,
    /// Excluded elements.
    pub warnings: Vec<Warning>,
}

/// Builds one fault tree from a snapshot.
///
/// A synthesizer is single use: [`synthesize`](Self::synthesize) consumes it.
#[derive(Debug)]
pub struct Synthesizer<'a> {
    snapshot: &'a SystemSnapshot,
    config: &'a AnalysisConfig,
    evaluator: &'a BoundedEvaluator,
    context: &'a Arc<TriggerContext>,
    cancel: &'a CancellationToken,
    builder: FaultTreeBuilder,
    warnings: Vec<Warning>,
    eligibility: BTreeMap<FailureModeId, bool>,
    expanded: BTreeMap<EventRef, Option<NodeId>>,
    path: Vec<EventRef>,
}

impl<'a> Synthesizer<'a> {
    /// Prepares a synthesis run.
    #[must_use]
    pub fn new(
        snapshot: &'a SystemSnapshot,
        config: &'a AnalysisConfig,
        evaluator: &'a BoundedEvaluator,
        context: &'a Arc<TriggerContext>,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            snapshot,
            config,
            evaluator,
            context,
            cancel,
            builder: FaultTreeBuilder::new(),
            warnings: Vec::new(),
            eligibility: BTreeMap::new(),
            expanded: BTreeMap::new(),
            path: Vec::new(),
        }
    }

    /// Synthesizes the fault tree for `top`.
    ///
    /// # Errors
    ///
    /// - [`AnalysisError::ReferenceNotFound`] if the top event names an unknown
    ///   entity or failure condition
    /// - [`AnalysisError::CyclicCausality`] if the causes reachable from the
    ///   top event form a cycle; no tree node is emitted in that case
    /// - [`AnalysisError::AnalysisTooLarge`] if the causal chain is deeper than
    ///   the configured maximum, or the tree needs more nodes than allowed
    /// - [`AnalysisError::TriggerEvaluationError`] if a trigger cannot be
    ///   evaluated
    /// - [`AnalysisError::NoContributingEvents`] if everything below the top
    ///   event was excluded
    /// - [`AnalysisError::Cancelled`] if cancellation is requested
    #[instrument(skip_all, fields(top_event = %top))]
    pub fn synthesize(mut self, top: &TopEvent) -> Result<Synthesis, AnalysisError> {
        let root_event = self.resolve(top)?;

        if let Some(cycle) = self.snapshot.causal().find_cycle_from(&root_event) {
            return Err(AnalysisError::CyclicCausality { cycle });
        }

        let root = self
            .expand(&root_event)?
            .ok_or_else(|| AnalysisError::NoContributingEvents(root_event.clone()))?;
        let tree = self
            .builder
            .build(root, self.snapshot.describe(&root_event))?;

        tracing::debug!(
            gates = tree.gate_count(),
            basic_events = tree.events().len(),
            depth = tree.depth(),
            "synthesized fault tree"
        );

        Ok(Synthesis {
            tree,
            root_event,
            warnings: self.warnings,
        })
    }

    fn resolve(&self, top: &TopEvent) -> Result<EventRef, AnalysisError> {
        if !self.snapshot.contains(&top.target) {
            return Err(AnalysisError::ReferenceNotFound {
                referrer: format!("top event `{top}`"),
                target: top.target.to_string(),
            });
        }

        match (&top.target, top.condition.as_deref()) {
            (EventRef::Interface(id), Some(condition)) if !condition.eq_ignore_ascii_case("any") => {
                self.snapshot
                    .failure_modes_of(id)
                    .find(|fm| fm.id.as_str() == condition || fm.label == condition)
                    .map(|fm| EventRef::FailureMode(fm.id.clone()))
                    .ok_or_else(|| AnalysisError::ReferenceNotFound {
                        referrer: format!("top event `{top}`"),
                        target: format!("failure condition `{condition}` on interface `{id}`"),
                    })
            }
            _ => Ok(top.target.clone()),
        }
    }

    /// Expands an event, returning `None` if it was excluded.
    ///
    /// An event reached from several effects is expanded once and its node
    /// shared between their gates.
    fn expand(&mut self, event: &EventRef) -> Result<Option<NodeId>, AnalysisError> {
        self.cancel.check()?;

        if let Some(&node) = self.expanded.get(event) {
            return Ok(node);
        }

        if let Some(position) = self.path.iter().position(|e| e == event) {
            let mut cycle = self.path[position..].to_vec();
            cycle.push(event.clone());
            return Err(AnalysisError::CyclicCausality { cycle });
        }
        if self.path.len() >= self.config.max_tree_depth() {
            return Err(AnalysisError::AnalysisTooLarge {
                entity: event.to_string(),
                reason: format!(
                    "causal chain deeper than {} events",
                    self.config.max_tree_depth()
                ),
            });
        }

        self.path.push(event.clone());
        let expanded = self.expand_event(event);
        self.path.pop();

        let node = expanded?;
        self.check_size(event)?;
        self.expanded.insert(event.clone(), node);
        Ok(node)
    }

    fn check_size(&self, event: &EventRef) -> Result<(), AnalysisError> {
        let limit = self.config.max_tree_nodes();
        if self.builder.len() > limit {
            return Err(AnalysisError::AnalysisTooLarge {
                entity: event.to_string(),
                reason: format!("fault tree needs more than {limit} nodes"),
            });
        }
        Ok(())
    }

    fn expand_event(&mut self, event: &EventRef) -> Result<Option<NodeId>, AnalysisError> {
        let snapshot = self.snapshot;
        let declaration = snapshot.causal().declaration(event);

        match event {
            EventRef::FailureMode(id) => {
                let failure_mode =
                    snapshot
                        .failure_mode(id)
                        .ok_or_else(|| AnalysisError::ReferenceNotFound {
                            referrer: self.referrer(),
                            target: event.to_string(),
                        })?;
                if !self.eligible(failure_mode)? {
                    return Ok(None);
                }
                match declaration {
                    None => Ok(Some(self.leaf(failure_mode))),
                    Some(declaration) if declaration.intrinsic => {
                        let label = snapshot.describe(event);
                        let leaf = self.leaf(failure_mode);
                        let caused = self.declared(declaration, format!("{label} (caused)"))?;
                        Ok(Some(match caused {
                            Some(caused) => self.builder.gate(GateKind::Or, label, vec![leaf, caused])?,
                            None => leaf,
                        }))
                    }
                    Some(declaration) => self.declared(declaration, snapshot.describe(event)),
                }
            }
            EventRef::Interface(id) => match declaration {
                Some(declaration) => self.declared(declaration, snapshot.describe(event)),
                None => {
                    let modes = failure_modes_of([id], snapshot);
                    self.developed(event, &modes, "interface has no failure modes")
                }
            },
            EventRef::Module(id) => match declaration {
                Some(declaration) => self.declared(declaration, snapshot.describe(event)),
                None if self.config.infer_module_causes => {
                    let interfaces = snapshot.structure().interfaces_of(id).map(|i| &i.id);
                    let modes = failure_modes_of(interfaces, snapshot);
                    self.developed(event, &modes, "no connected interface has failure modes")
                }
                None => {
                    self.warnings.push(Warning::new(
                        WarningKind::Undeveloped,
                        event.to_string(),
                        "module has no declared causes",
                    ));
                    Ok(None)
                }
            },
        }
    }

    /// OR over `causes`, or an undeveloped-event warning if there are none.
    fn developed(
        &mut self,
        event: &EventRef,
        causes: &[EventRef],
        reason: &str,
    ) -> Result<Option<NodeId>, AnalysisError> {
        if causes.is_empty() {
            self.warnings.push(Warning::new(
                WarningKind::Undeveloped,
                event.to_string(),
                reason,
            ));
            return Ok(None);
        }
        let label = self.snapshot.describe(event);
        self.combine(event, CombinationPolicy::Any, causes, label)
    }

    fn declared(
        &mut self,
        declaration: &CauseDeclaration,
        label: String,
    ) -> Result<Option<NodeId>, AnalysisError> {
        self.combine(
            &declaration.effect,
            declaration.policy,
            &declaration.causes,
            label,
        )
    }

    fn combine(
        &mut self,
        effect: &EventRef,
        policy: CombinationPolicy,
        causes: &[EventRef],
        label: String,
    ) -> Result<Option<NodeId>, AnalysisError> {
        let mut children = Vec::with_capacity(causes.len());
        let mut excluded = Vec::new();
        for cause in causes {
            match self.expand(cause)? {
                Some(node) => children.push(node),
                None => excluded.push(cause.to_string()),
            }
        }

        let required = match policy {
            CombinationPolicy::Any => 1,
            CombinationPolicy::All => causes.len(),
            CombinationPolicy::AtLeast(k) => k.get(),
        };

        if children.len() < required {
            if !children.is_empty() || policy != CombinationPolicy::Any {
                self.warnings.push(Warning::new(
                    WarningKind::GateExcluded,
                    effect.to_string(),
                    format!(
                        "needs {required} of {} causes but {} cannot occur",
                        causes.len(),
                        excluded.join(", ")
                    ),
                ));
            }
            return Ok(None);
        }

        let kind = if children.len() == 1 {
            return Ok(children.pop());
        } else if required == 1 {
            GateKind::Or
        } else if required == children.len() {
            GateKind::And
        } else {
            GateKind::AtLeast { k: required }
        };

        tracing::debug!(gate = %label, kind = kind.name(), children = children.len());
        Ok(Some(self.builder.gate(kind, label, children)?))
    }

    fn leaf(&mut self, failure_mode: &FailureMode) -> NodeId {
        let label = self
            .snapshot
            .describe(&EventRef::FailureMode(failure_mode.id.clone()));
        self.builder.basic_event(&failure_mode.id, label)
    }

    /// Whether a failure mode can occur, evaluating its trigger at most once.
    fn eligible(&mut self, failure_mode: &FailureMode) -> Result<bool, AnalysisError> {
        if let Some(&eligible) = self.eligibility.get(&failure_mode.id) {
            return Ok(eligible);
        }

        let entity = failure_mode.id.to_string();
        let eligible = if !failure_mode.enabled {
            self.warnings.push(Warning::new(
                WarningKind::Disabled,
                entity,
                "failure mode is disabled",
            ));
            false
        } else if let Some(trigger) = &failure_mode.trigger {
            match self.evaluator.evaluate(trigger, self.context) {
                Ok(TriggerOutcome::Decided(true)) => true,
                Ok(TriggerOutcome::Decided(false)) => {
                    self.warnings.push(Warning::new(
                        WarningKind::TriggerNotSatisfied,
                        entity,
                        format!("trigger `{}` does not hold", trigger.as_str()),
                    ));
                    false
                }
                Ok(TriggerOutcome::TimedOut) => {
                    let timeout = AnalysisError::TriggerEvaluationTimeout {
                        failure_mode: failure_mode.id.clone(),
                        timeout_ms: u64::try_from(self.evaluator.timeout().as_millis())
                            .unwrap_or(u64::MAX),
                    };
                    self.warnings.push(Warning::new(
                        WarningKind::TriggerEvaluationTimeout,
                        entity,
                        format!("{timeout}; basic event excluded"),
                    ));
                    false
                }
                Err(failure) => {
                    return Err(AnalysisError::TriggerEvaluationError {
                        failure_mode: failure_mode.id.clone(),
                        reason: failure.0,
                    });
                }
            }
        } else {
            true
        };

        self.eligibility.insert(failure_mode.id.clone(), eligible);
        Ok(eligible)
    }

    fn referrer(&self) -> String {
        self.path
            .iter()
            .rev()
            .nth(1)
            .map_or_else(|| "top event".to_string(), ToString::to_string)
    }
}

/// Failure-mode events of the given interfaces, in declaration order.
fn failure_modes_of<'a>(
    interfaces: impl IntoIterator<Item = &'a InterfaceId>,
    snapshot: &SystemSnapshot,
) -> Vec<EventRef> {
    interfaces
        .into_iter()
        .flat_map(|interface| snapshot.failure_modes_of(interface))
        .map(|fm| EventRef::FailureMode(fm.id.clone()))
        .collect()
}
