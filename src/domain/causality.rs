//! Declared causal links between failure events.
//!
//! The [`CausalGraph`] knows nothing about probabilities or fault trees. It
//! stores which events can cause which, as authored alongside the structure,
//! and answers reachability and cycle questions. Causality is never inferred
//! from connectivity here.

use std::{collections::BTreeMap, fmt, num::NonZeroUsize};

use petgraph::{
    algo::tarjan_scc,
    graph::{DiGraph, NodeIndex},
};
use serde::{Deserialize, Serialize};

use crate::domain::{FailureModeId, InterfaceId, ModelError, ModuleId};

/// A failure event that can take part in a causal chain.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventRef {
    /// The module fails.
    Module(ModuleId),
    /// The interface fails in any of its failure modes.
    Interface(InterfaceId),
    /// The specific failure mode occurs.
    FailureMode(FailureModeId),
}

impl fmt::Display for EventRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Module(id) => write!(f, "module `{id}`"),
            Self::Interface(id) => write!(f, "interface `{id}`"),
            Self::FailureMode(id) => write!(f, "failure mode `{id}`"),
        }
    }
}

/// How the causes of an effect combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombinationPolicy {
    /// Any single cause suffices.
    #[default]
    Any,
    /// All causes are required simultaneously.
    All,
    /// At least `k` of the causes are required (redundancy).
    AtLeast(NonZeroUsize),
}

/// The causes of one effect, as declared by the author.
///
/// Events and policies are written as single-key maps (`{ module: ecu }`,
/// `{ at_least: 2 }`) in both YAML and JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CauseDeclaration {
    /// The event being explained.
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub effect: EventRef,
    /// How the causes combine.
    #[serde(default, with = "serde_yaml::with::singleton_map")]
    pub policy: CombinationPolicy,
    /// The causes, in authored order.
    #[serde(with = "serde_yaml::with::singleton_map_recursive")]
    pub causes: Vec<EventRef>,
    /// For failure-mode effects: the failure mode may also occur on its own.
    #[serde(default)]
    pub intrinsic: bool,
}

impl CauseDeclaration {
    fn validate(&self) -> Result<(), ModelError> {
        let invalid = |reason: String| ModelError::InvalidPolicy {
            effect: self.effect.clone(),
            reason,
        };

        if self.causes.is_empty() {
            return Err(invalid("no causes declared".to_string()));
        }
        if let CombinationPolicy::AtLeast(k) = self.policy {
            if k.get() > self.causes.len() {
                return Err(invalid(format!(
                    "requires {k} causes but only {} are declared",
                    self.causes.len()
                )));
            }
        }
        if self.intrinsic && !matches!(self.effect, EventRef::FailureMode(_)) {
            return Err(invalid(
                "only failure modes can occur intrinsically".to_string(),
            ));
        }
        Ok(())
    }
}

/// Directed graph of declared causes.
///
/// Nodes are events; an edge points from an effect to one of its causes, so
/// fault-tree synthesis walks edges in their natural direction.
#[derive(Debug, Clone, Default)]
pub struct CausalGraph {
    graph: DiGraph<EventRef, ()>,
    nodes: BTreeMap<EventRef, NodeIndex>,
    declarations: BTreeMap<EventRef, CauseDeclaration>,
}

impl CausalGraph {
    /// Builds the graph from declarations.
    ///
    /// Referential integrity is checked by the owning
    /// [`SystemSnapshot`](crate::domain::SystemSnapshot); cycles are allowed
    /// here and rejected at synthesis time.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::ConflictingDeclaration`] if an effect is declared
    /// twice, or [`ModelError::InvalidPolicy`] for a declaration with no causes,
    /// an unsatisfiable `at_least`, or `intrinsic` on a non-failure-mode effect.
    pub fn new(declarations: Vec<CauseDeclaration>) -> Result<Self, ModelError> {
        let mut causal = Self::default();

        for declaration in declarations {
            declaration.validate()?;
            if causal.declarations.contains_key(&declaration.effect) {
                return Err(ModelError::ConflictingDeclaration(declaration.effect));
            }

            let effect = causal.node(&declaration.effect);
            for cause in &declaration.causes {
                let cause = causal.node(cause);
                causal.graph.update_edge(effect, cause, ());
            }
            causal
                .declarations
                .insert(declaration.effect.clone(), declaration);
        }

        Ok(causal)
    }

    fn node(&mut self, event: &EventRef) -> NodeIndex {
        if let Some(&index) = self.nodes.get(event) {
            return index;
        }
        let index = self.graph.add_node(event.clone());
        self.nodes.insert(event.clone(), index);
        index
    }

    /// The declaration explaining `effect`, if any.
    #[must_use]
    pub fn declaration(&self, effect: &EventRef) -> Option<&CauseDeclaration> {
        self.declarations.get(effect)
    }

    /// All declarations, ordered by effect.
    pub fn declarations(&self) -> impl Iterator<Item = &CauseDeclaration> {
        self.declarations.values()
    }

    /// Every event mentioned by a declaration, as effect or cause.
    pub fn events(&self) -> impl Iterator<Item = &EventRef> {
        self.nodes.keys()
    }

    /// Searches for a causal cycle reachable from `start`.
    ///
    /// Depth-first traversal keeping the current recursion stack; reaching a
    /// node that is already on the stack closes a cycle. Returns the cycle as
    /// the sequence of events from the repeated event back to itself.
    #[must_use]
    pub fn find_cycle_from(&self, start: &EventRef) -> Option<Vec<EventRef>> {
        let &root = self.nodes.get(start)?;

        let mut on_stack = vec![false; self.graph.node_count()];
        let mut done = vec![false; self.graph.node_count()];
        let mut path: Vec<NodeIndex> = Vec::new();
        // Explicit stack of (node, index of next cause to visit).
        let mut stack: Vec<(NodeIndex, usize)> = vec![(root, 0)];
        on_stack[root.index()] = true;
        path.push(root);

        while let Some((node, next)) = stack.last_mut() {
            let node = *node;
            let causes = self.ordered_causes(node);
            if let Some(&cause) = causes.get(*next) {
                *next += 1;
                if on_stack[cause.index()] {
                    let from = path.iter().position(|&n| n == cause).unwrap_or(0);
                    let mut cycle: Vec<EventRef> =
                        path[from..].iter().map(|&n| self.graph[n].clone()).collect();
                    cycle.push(self.graph[cause].clone());
                    return Some(cycle);
                }
                if !done[cause.index()] {
                    on_stack[cause.index()] = true;
                    path.push(cause);
                    stack.push((cause, 0));
                }
            } else {
                on_stack[node.index()] = false;
                done[node.index()] = true;
                path.pop();
                stack.pop();
            }
        }

        None
    }

    /// Causes of a node in declaration order.
    fn ordered_causes(&self, node: NodeIndex) -> Vec<NodeIndex> {
        self.declarations
            .get(&self.graph[node])
            .map(|declaration| {
                declaration
                    .causes
                    .iter()
                    .filter_map(|cause| self.nodes.get(cause).copied())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns all cycles in the graph as sorted sets of events.
    ///
    /// Used for whole-model validation; synthesis only checks the part of the
    /// graph reachable from its top event.
    #[must_use]
    pub fn cycles(&self) -> Vec<Vec<EventRef>> {
        let mut cycles = Vec::new();

        for component in tarjan_scc(&self.graph) {
            let is_cycle = component.len() > 1
                || component
                    .first()
                    .is_some_and(|&node| self.graph.contains_edge(node, node));
            if is_cycle {
                let mut events: Vec<_> = component
                    .iter()
                    .map(|&node| self.graph[node].clone())
                    .collect();
                events.sort();
                cycles.push(events);
            }
        }

        cycles.sort();
        cycles
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    fn module(id: &str) -> EventRef {
        EventRef::Module(ModuleId::new(id).unwrap())
    }

    fn declare(effect: EventRef, causes: Vec<EventRef>) -> CauseDeclaration {
        CauseDeclaration {
            effect,
            policy: CombinationPolicy::Any,
            causes,
            intrinsic: false,
        }
    }

    #[test]
    fn acyclic_chain_has_no_cycle() {
        let graph = CausalGraph::new(vec![
            declare(module("a"), vec![module("b")]),
            declare(module("b"), vec![module("c")]),
        ])
        .unwrap();

        assert!(graph.find_cycle_from(&module("a")).is_none());
        assert!(graph.cycles().is_empty());
    }

    #[test]
    fn finds_cycle_with_path() {
        let graph = CausalGraph::new(vec![
            declare(module("top"), vec![module("a")]),
            declare(module("a"), vec![module("b")]),
            declare(module("b"), vec![module("a")]),
        ])
        .unwrap();

        let cycle = graph.find_cycle_from(&module("top")).unwrap();
        assert_eq!(cycle, vec![module("a"), module("b"), module("a")]);
        assert_eq!(graph.cycles(), vec![vec![module("a"), module("b")]]);
    }

    #[test]
    fn diamond_is_not_a_cycle() {
        let graph = CausalGraph::new(vec![
            declare(module("top"), vec![module("left"), module("right")]),
            declare(module("left"), vec![module("shared")]),
            declare(module("right"), vec![module("shared")]),
        ])
        .unwrap();

        assert!(graph.find_cycle_from(&module("top")).is_none());
    }

    #[test]
    fn self_cause_is_a_cycle() {
        let graph = CausalGraph::new(vec![declare(module("a"), vec![module("a")])]).unwrap();
        assert_eq!(
            graph.find_cycle_from(&module("a")).unwrap(),
            vec![module("a"), module("a")]
        );
        assert_eq!(graph.cycles(), vec![vec![module("a")]]);
    }

    #[test]
    fn duplicate_effect_is_rejected() {
        let err = CausalGraph::new(vec![
            declare(module("a"), vec![module("b")]),
            declare(module("a"), vec![module("c")]),
        ])
        .unwrap_err();
        assert_eq!(err, ModelError::ConflictingDeclaration(module("a")));
    }

    #[test]
    fn unsatisfiable_at_least_is_rejected() {
        let mut declaration = declare(module("a"), vec![module("b")]);
        declaration.policy = CombinationPolicy::AtLeast(NonZeroUsize::new(2).unwrap());
        let err = CausalGraph::new(vec![declaration]).unwrap_err();
        assert!(matches!(err, ModelError::InvalidPolicy { .. }));
    }

    #[test]
    fn policy_deserializes_from_yaml() {
        let declaration: CauseDeclaration = serde_yaml::from_str(
            "effect: { module: ecu }\npolicy: { at_least: 2 }\ncauses: [{ interface: a }, { interface: b }]",
        )
        .unwrap();
        assert_eq!(
            declaration.policy,
            CombinationPolicy::AtLeast(NonZeroUsize::new(2).unwrap())
        );

        let declaration: CauseDeclaration =
            serde_yaml::from_str("effect: { module: ecu }\npolicy: all\ncauses: [{ interface: a }]")
                .unwrap();
        assert_eq!(declaration.policy, CombinationPolicy::All);

        let declaration: CauseDeclaration =
            serde_yaml::from_str("effect: { module: ecu }\ncauses: [{ interface: a }]").unwrap();
        assert_eq!(declaration.policy, CombinationPolicy::Any);
    }

    #[test_case("{ module: ecu }", EventRef::Module(ModuleId::new("ecu").unwrap()) ; "module")]
    #[test_case("{ interface: sig }", EventRef::Interface(InterfaceId::new("sig").unwrap()) ; "interface")]
    #[test_case("{ failure_mode: sig_lost }", EventRef::FailureMode(FailureModeId::new("sig_lost").unwrap()) ; "failure mode")]
    fn events_are_written_as_single_key_maps(yaml: &str, expected: EventRef) {
        let declaration: CauseDeclaration =
            serde_yaml::from_str(&format!("effect: {yaml}\ncauses: [{yaml}]")).unwrap();
        assert_eq!(declaration.effect, expected);
        assert_eq!(declaration.causes, vec![expected.clone()]);

        let written = serde_yaml::to_string(&declaration).unwrap();
        assert_eq!(
            serde_yaml::from_str::<CauseDeclaration>(&written).unwrap(),
            declaration
        );

        let json = serde_json::to_value(&declaration).unwrap();
        assert_eq!(json["effect"], serde_json::to_value(&expected).unwrap());
        assert_eq!(
            serde_json::from_value::<CauseDeclaration>(json).unwrap(),
            declaration
        );
    }
}
