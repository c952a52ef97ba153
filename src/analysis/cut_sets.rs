//! Minimal cut sets by top-down Boolean expansion.
//!
//! Each gate's cut-set family is computed from its children's families in a
//! single forward pass over the tree arena (children precede parents):
//!
//! - OR: union of the children's families
//! - AND: pairwise unions across the children's families
//! - k-out-of-n: every combination of exactly `k` children, AND-ed
//!
//! Every intermediate family is minimised by absorption before it is used, so
//! the candidate collection stays bounded by the configured limit.

use std::{cmp::Ordering, collections::BTreeMap};

use tracing::instrument;

use crate::analysis::{
    AnalysisError, CancellationToken, EventIndex, FaultTree, GateKind, Node, Warning, WarningKind,
};

/// A set of basic events, stored sorted and without duplicates.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CutSet(Vec<EventIndex>);

impl CutSet {
    /// Builds a cut set from events in any order.
    #[must_use]
    pub fn new(mut events: Vec<EventIndex>) -> Self {
        events.sort_unstable();
        events.dedup();
        Self(events)
    }

    fn singleton(event: EventIndex) -> Self {
        Self(vec![event])
    }

    /// The members, in ascending order.
    #[must_use]
    pub fn events(&self) -> &[EventIndex] {
        &self.0
    }

    /// Number of members (the cut set's order).
    #[must_use]
    pub fn order(&self) -> usize {
        self.0.len()
    }

    /// Whether `event` is a member.
    #[must_use]
    pub fn contains(&self, event: EventIndex) -> bool {
        self.0.binary_search(&event).is_ok()
    }

    /// Whether every member of `self` is a member of `other`.
    #[must_use]
    pub fn is_subset(&self, other: &Self) -> bool {
        if self.0.len() > other.0.len() {
            return false;
        }
        let mut theirs = other.0.iter();
        self.0.iter().all(|e| theirs.any(|o| o == e))
    }

    fn union(&self, other: &Self) -> Self {
        let mut merged = Vec::with_capacity(self.0.len() + other.0.len());
        let (mut a, mut b) = (self.0.iter().peekable(), other.0.iter().peekable());
        loop {
            let next = match (a.peek(), b.peek()) {
                (Some(x), Some(y)) => match x.cmp(y) {
                    Ordering::Less => a.next(),
                    Ordering::Greater => b.next(),
                    Ordering::Equal => {
                        b.next();
                        a.next()
                    }
                },
                (Some(_), None) => a.next(),
                (None, Some(_)) => b.next(),
                (None, None) => break,
            };
            merged.extend(next.copied());
        }
        Self(merged)
    }
}

/// Orders cut sets by size, then by their sorted members.
///
/// Because the event table is sorted by failure-mode identifier, this is the
/// lexicographic order of the members' identifiers.
fn report_order(a: &CutSet, b: &CutSet) -> Ordering {
    a.order().cmp(&b.order()).then_with(|| a.0.cmp(&b.0))
}

/// Removes duplicates and every set that is a superset of another.
fn minimise(family: &mut Vec<CutSet>) {
    family.sort_unstable_by(report_order);
    family.dedup();

    let mut kept: Vec<CutSet> = Vec::with_capacity(family.len());
    for candidate in family.drain(..) {
        if !kept.iter().any(|k| k.is_subset(&candidate)) {
            kept.push(candidate);
        }
    }
    *family = kept;
}

/// Outcome of qualitative analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Qualitative {
    /// The minimal cut sets, ordered by size then members.
    pub cut_sets: Vec<CutSet>,
    /// Gates excluded because their expansion was too large.
    pub warnings: Vec<Warning>,
}

impl Qualitative {
    /// Number of cut sets of each order.
    #[must_use]
    pub fn by_order(&self) -> BTreeMap<usize, usize> {
        let mut counts = BTreeMap::new();
        for cut_set in &self.cut_sets {
            *counts.entry(cut_set.order()).or_insert(0) += 1;
        }
        counts
    }

    /// Events that cause the top event on their own.
    pub fn single_point_failures(&self) -> impl Iterator<Item = EventIndex> + '_ {
        self.cut_sets
            .iter()
            .filter(|c| c.order() == 1)
            .map(|c| c.0[0])
    }
}

/// Size bounds for qualitative analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Largest family kept at any gate.
    pub max_cut_sets: usize,
    /// Largest tree depth accepted.
    pub max_tree_depth: usize,
}

/// Computes the minimal cut sets of a coherent fault tree.
///
/// A gate whose minimised family exceeds `limits.max_cut_sets` is excluded
/// (as if it could not occur) and a warning is recorded.
///
/// # Errors
///
/// - [`AnalysisError::UnsupportedGateType`] if the tree contains a NOT gate
/// - [`AnalysisError::AnalysisTooLarge`] if the tree is deeper than allowed,
///   or the top event itself exceeds the cut-set bound
/// - [`AnalysisError::Cancelled`] if cancellation is requested
#[instrument(skip_all, fields(top_event = tree.top_event()))]
pub fn minimal_cut_sets(
    tree: &FaultTree,
    limits: Limits,
    cancel: &CancellationToken,
) -> Result<Qualitative, AnalysisError> {
    let depth = tree.depth();
    if depth > limits.max_tree_depth {
        return Err(AnalysisError::AnalysisTooLarge {
            entity: tree.top_event().to_string(),
            reason: format!(
                "tree depth {depth} exceeds the limit of {}",
                limits.max_tree_depth
            ),
        });
    }

    let bound = limits.max_cut_sets.max(1);
    let mut families: Vec<Option<Vec<CutSet>>> = Vec::new();
    let mut warnings = Vec::new();

    for (id, node) in tree.nodes() {
        let family = match node {
            Node::BasicEvent(event) => Some(vec![CutSet::singleton(*event)]),
            Node::Gate(gate) => {
                cancel.check()?;
                let children: Vec<&[CutSet]> = gate
                    .children
                    .iter()
                    .filter_map(|c| families[c.index()].as_deref())
                    .collect();
                let excluded = gate.children.len() - children.len();

                let expanded = match gate.kind {
                    GateKind::Or => or(&children, bound),
                    GateKind::And if excluded > 0 => Expansion::Empty,
                    GateKind::And => and(&children, bound),
                    GateKind::AtLeast { k } => at_least(k, &children, bound),
                    GateKind::Not => {
                        return Err(AnalysisError::UnsupportedGateType {
                            gate: gate.label.clone(),
                            kind: gate.kind.name(),
                        });
                    }
                };

                match expanded {
                    Expansion::Family(family) => {
                        tracing::debug!(gate = %gate.label, cut_sets = family.len());
                        Some(family)
                    }
                    Expansion::Empty => None,
                    Expansion::TooLarge if id == tree.root() => {
                        return Err(AnalysisError::AnalysisTooLarge {
                            entity: gate.label.clone(),
                            reason: format!("more than {bound} minimal cut sets"),
                        });
                    }
                    Expansion::TooLarge => {
                        warnings.push(Warning::new(
                            WarningKind::AnalysisTooLarge,
                            gate.label.clone(),
                            format!("gate excluded: more than {bound} minimal cut sets"),
                        ));
                        None
                    }
                }
            }
        };
        families.push(family);
    }

    let cut_sets = families
        .get_mut(tree.root().index())
        .and_then(Option::take)
        .ok_or_else(|| AnalysisError::AnalysisTooLarge {
            entity: tree.top_event().to_string(),
            reason: "every cause of the top event was excluded".to_string(),
        })?;

    Ok(Qualitative { cut_sets, warnings })
}

enum Expansion {
    Family(Vec<CutSet>),
    Empty,
    TooLarge,
}

fn finish(mut family: Vec<CutSet>, bound: usize) -> Expansion {
    minimise(&mut family);
    if family.is_empty() {
        Expansion::Empty
    } else if family.len() > bound {
        Expansion::TooLarge
    } else {
        Expansion::Family(family)
    }
}

fn or(children: &[&[CutSet]], bound: usize) -> Expansion {
    finish(children.concat(), bound)
}

fn and(children: &[&[CutSet]], bound: usize) -> Expansion {
    let mut acc = vec![CutSet(Vec::new())];
    for child in children {
        match product(&acc, child, bound) {
            Some(next) => acc = next,
            None => return Expansion::TooLarge,
        }
    }
    finish(acc, bound)
}

/// Pairwise unions, minimised whenever the candidates exceed twice the bound.
///
/// Returns `None` once a minimised intermediate exceeds the bound.
fn product(left: &[CutSet], right: &[CutSet], bound: usize) -> Option<Vec<CutSet>> {
    let mut out = Vec::new();
    for a in left {
        for b in right {
            out.push(a.union(b));
            if out.len() > bound.saturating_mul(2) {
                minimise(&mut out);
                if out.len() > bound {
                    return None;
                }
            }
        }
    }
    minimise(&mut out);
    (out.len() <= bound).then_some(out)
}

/// `layers[j]` holds the family for "exactly `j` of the children seen so far
/// occurred" (up to absorption), for `j` in `0..=k`.
fn at_least(k: usize, children: &[&[CutSet]], bound: usize) -> Expansion {
    if children.len() < k {
        return Expansion::Empty;
    }

    let mut layers: Vec<Vec<CutSet>> = vec![Vec::new(); k + 1];
    layers[0].push(CutSet(Vec::new()));

    for (seen, child) in children.iter().enumerate() {
        for j in (1..=k.min(seen + 1)).rev() {
            if layers[j - 1].is_empty() {
                continue;
            }
            let Some(mut extended) = product(&layers[j - 1], child, bound) else {
                return Expansion::TooLarge;
            };
            layers[j].append(&mut extended);
            minimise(&mut layers[j]);
            if layers[j].len() > bound {
                return Expansion::TooLarge;
            }
        }
    }

    finish(layers.swap_remove(k), bound)
}
