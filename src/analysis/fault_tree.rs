//! Fault trees as an index-based arena.
//!
//! Nodes live in one vector and refer to their children by [`NodeId`]. Basic
//! events refer to a shared event table by [`EventIndex`], so the same failure
//! mode appearing under several gates is recognised by identity during cut-set
//! reduction.

use std::{collections::BTreeMap, fmt};

use nonempty::NonEmpty;

use crate::{analysis::AnalysisError, domain::FailureModeId};

/// Position of a node in a [`FaultTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    /// The arena position.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Position of a basic event in a [`FaultTree`]'s event table.
///
/// The table is sorted by failure-mode identifier, so comparing indices
/// compares identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventIndex(pub(crate) usize);

impl EventIndex {
    /// The table position.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Gate logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateKind {
    /// All children must occur.
    And,
    /// Any child suffices.
    Or,
    /// The single child must not occur.
    Not,
    /// At least `k` of the children must occur.
    AtLeast {
        /// Required number of children.
        k: usize,
    },
}

impl GateKind {
    /// Short name used in messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
            Self::Not => "NOT",
            Self::AtLeast { .. } => "k-out-of-n",
        }
    }
}

/// A logic gate and its ordered children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gate {
    /// Logic type.
    pub kind: GateKind,
    /// Description of the event this gate represents.
    pub label: String,
    /// Children, in synthesis order.
    pub children: NonEmpty<NodeId>,
}

/// A fault tree node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// An intermediate event with its logic.
    Gate(Gate),
    /// Occurrence of a failure mode.
    BasicEvent(EventIndex),
}

/// An entry of the basic-event table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicEvent {
    /// The failure mode this event stands for.
    pub failure_mode: FailureModeId,
    /// Display label.
    pub label: String,
}

/// An immutable, validated fault tree.
///
/// Every node is reachable from the root and every child precedes its parent
/// in the arena, so a forward pass visits children first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultTree {
    top_event: String,
    nodes: Vec<Node>,
    events: Vec<BasicEvent>,
    root: NodeId,
}

impl FaultTree {
    /// Description of the top event.
    #[must_use]
    pub fn top_event(&self) -> &str {
        &self.top_event
    }

    /// The root node.
    #[must_use]
    pub const fn root(&self) -> NodeId {
        self.root
    }

    /// Looks up a node.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// All nodes with their ids, children before parents.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    /// The basic-event table, sorted by failure-mode identifier.
    #[must_use]
    pub fn events(&self) -> &[BasicEvent] {
        &self.events
    }

    /// Looks up a basic event.
    #[must_use]
    pub fn event(&self, index: EventIndex) -> &BasicEvent {
        &self.events[index.0]
    }

    /// Finds the event for a failure mode.
    #[must_use]
    pub fn event_index(&self, failure_mode: &FailureModeId) -> Option<EventIndex> {
        self.events
            .binary_search_by(|e| e.failure_mode.cmp(failure_mode))
            .ok()
            .map(EventIndex)
    }

    /// Number of gates.
    #[must_use]
    pub fn gate_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Gate(_)))
            .count()
    }

    /// Number of basic-event leaves, counting repeats.
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        self.nodes.len() - self.gate_count()
    }

    /// Length of the longest root-to-leaf path, in nodes.
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut depth = vec![1_usize; self.nodes.len()];
        for (i, node) in self.nodes.iter().enumerate() {
            if let Node::Gate(gate) = node {
                depth[i] = 1 + gate.children.iter().map(|c| depth[c.0]).max().unwrap_or(0);
            }
        }
        depth[self.root.0]
    }

    /// Writes the outline below `id`. A gate shared by several parents is
    /// written out in full once; later occurrences are marked `(see above)`.
    fn fmt_node(
        &self,
        f: &mut fmt::Formatter<'_>,
        id: NodeId,
        indent: usize,
        shown: &mut [bool],
    ) -> fmt::Result {
        let pad = indent * 2;
        match self.node(id) {
            Node::BasicEvent(event) => {
                let event = self.event(*event);
                writeln!(f, "{:pad$}- {} ({})", "", event.label, event.failure_mode)
            }
            Node::Gate(gate) => {
                match gate.kind {
                    GateKind::AtLeast { k } => write!(
                        f,
                        "{:pad$}{k}/{} {}",
                        "",
                        gate.children.len(),
                        gate.label
                    )?,
                    kind => write!(f, "{:pad$}{} {}", "", kind.name(), gate.label)?,
                }
                if shown[id.0] {
                    return writeln!(f, " (see above)");
                }
                shown[id.0] = true;
                writeln!(f)?;
                for &child in gate.children.iter() {
                    self.fmt_node(f, child, indent + 1, shown)?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for FaultTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "TOP {}", self.top_event)?;
        let mut shown = vec![false; self.nodes.len()];
        self.fmt_node(f, self.root, 1, &mut shown)
    }
}

/// Incrementally assembles a [`FaultTree`].
///
/// Children must be added before their parents, which makes cycles
/// unrepresentable. Nodes that end up unreachable from the root are dropped by
/// [`build`](Self::build).
#[derive(Debug, Default)]
pub struct FaultTreeBuilder {
    nodes: Vec<Node>,
    events: Vec<BasicEvent>,
    event_index: BTreeMap<FailureModeId, EventIndex>,
}

impl FaultTreeBuilder {
    /// An empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a leaf for `failure_mode`.
    ///
    /// Every call adds a new leaf; leaves for the same failure mode share one
    /// event table entry. The label of the first call wins.
    pub fn basic_event(&mut self, failure_mode: &FailureModeId, label: impl Into<String>) -> NodeId {
        let index = match self.event_index.get(failure_mode) {
            Some(&index) => index,
            None => {
                let index = EventIndex(self.events.len());
                self.events.push(BasicEvent {
                    failure_mode: failure_mode.clone(),
                    label: label.into(),
                });
                self.event_index.insert(failure_mode.clone(), index);
                index
            }
        };
        self.push(Node::BasicEvent(index))
    }

    /// Adds a gate over existing nodes.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::InvalidTree`] if a child does not exist yet or
    /// the number of children does not suit the gate: at least one for AND and
    /// OR, exactly one for NOT, and `1 <= k <= n` for k-out-of-n.
    pub fn gate(
        &mut self,
        kind: GateKind,
        label: impl Into<String>,
        children: Vec<NodeId>,
    ) -> Result<NodeId, AnalysisError> {
        let label = label.into();
        if let Some(child) = children.iter().find(|c| c.0 >= self.nodes.len()) {
            return Err(AnalysisError::InvalidTree(format!(
                "gate `{label}` references node {} which does not exist yet",
                child.0
            )));
        }
        let n = children.len();
        let arity_ok = match kind {
            GateKind::And | GateKind::Or => n >= 1,
            GateKind::Not => n == 1,
            GateKind::AtLeast { k } => (1..=n).contains(&k),
        };
        let children = NonEmpty::from_vec(children).filter(|_| arity_ok).ok_or_else(|| {
            AnalysisError::InvalidTree(format!(
                "{} gate `{label}` cannot have {n} children",
                kind.name()
            ))
        })?;

        Ok(self.push(Node::Gate(Gate {
            kind,
            label,
            children,
        })))
    }

    /// Number of nodes added so far, reachable or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether no node has been added yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    /// Finishes the tree.
    ///
    /// Unreachable nodes are dropped and the event table is sorted by
    /// failure-mode identifier.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::InvalidTree`] if `root` does not exist.
    pub fn build(self, root: NodeId, top_event: impl Into<String>) -> Result<FaultTree, AnalysisError> {
        if root.0 >= self.nodes.len() {
            return Err(AnalysisError::InvalidTree(format!(
                "root node {} does not exist",
                root.0
            )));
        }

        let mut reachable = vec![false; self.nodes.len()];
        reachable[root.0] = true;
        for i in (0..=root.0).rev() {
            if reachable[i] {
                if let Node::Gate(gate) = &self.nodes[i] {
                    for child in &gate.children {
                        reachable[child.0] = true;
                    }
                }
            }
        }

        let mut used_events = vec![false; self.events.len()];
        for (node, _) in self.nodes.iter().zip(&reachable).filter(|(_, r)| **r) {
            if let Node::BasicEvent(e) = node {
                used_events[e.0] = true;
            }
        }

        let mut order: Vec<usize> = (0..self.events.len()).filter(|&e| used_events[e]).collect();
        order.sort_by(|&a, &b| self.events[a].failure_mode.cmp(&self.events[b].failure_mode));
        let mut event_map = vec![EventIndex(usize::MAX); self.events.len()];
        for (new, &old) in order.iter().enumerate() {
            event_map[old] = EventIndex(new);
        }
        let mut old_events: Vec<Option<BasicEvent>> = self.events.into_iter().map(Some).collect();
        let events = order
            .iter()
            .filter_map(|&old| old_events[old].take())
            .collect();

        let mut node_map = vec![NodeId(usize::MAX); self.nodes.len()];
        let mut nodes = Vec::new();
        for (old, node) in self.nodes.into_iter().enumerate() {
            if !reachable[old] {
                continue;
            }
            node_map[old] = NodeId(nodes.len());
            nodes.push(match node {
                Node::BasicEvent(e) => Node::BasicEvent(event_map[e.0]),
                Node::Gate(gate) => Node::Gate(Gate {
                    children: gate.children.map(|c| node_map[c.0]),
                    ..gate
                }),
            });
        }

        Ok(FaultTree {
            top_event: top_event.into(),
            nodes,
            events,
            root: node_map[root.0],
        })
    }
}
