//! Top-event probability and importance from minimal cut sets.
//!
//! Basic events are assumed statistically independent. The probability of a
//! union of cut sets is computed exactly by inclusion–exclusion while the
//! number of terms stays within the configured limit, otherwise by the
//! rare-event approximation (sum of cut-set probabilities, capped at 1).

use std::fmt;

use serde::Serialize;
use tracing::instrument;

use crate::analysis::{AnalysisError, CancellationToken, CutSet, EventIndex};

/// How a probability was computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    /// Full inclusion–exclusion.
    Exact,
    /// First-order union bound.
    Approximate,
}

impl Method {
    /// The less precise of two methods.
    #[must_use]
    pub const fn combine(self, other: Self) -> Self {
        match (self, other) {
            (Self::Exact, Self::Exact) => Self::Exact,
            _ => Self::Approximate,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact => f.write_str("exact"),
            Self::Approximate => f.write_str("approximate"),
        }
    }
}

/// A probability with its precision class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Estimate {
    /// The probability.
    pub probability: f64,
    /// How it was computed.
    pub method: Method,
}

/// Cancellation is polled once per this many inclusion–exclusion terms.
const CANCEL_INTERVAL: u64 = 4096;

/// Probability of a cut set: the product of its members' probabilities.
#[must_use]
pub fn cut_set_probability(cut_set: &CutSet, probabilities: &[f64]) -> f64 {
    cut_set
        .events()
        .iter()
        .map(|e| probabilities[e.index()])
        .product()
}

/// Rare-event approximation: the sum of cut-set probabilities, capped at 1.
#[must_use]
pub fn rare_event(cut_sets: &[CutSet], probabilities: &[f64]) -> f64 {
    cut_sets
        .iter()
        .map(|c| cut_set_probability(c, probabilities))
        .sum::<f64>()
        .min(1.0)
}

/// Number of inclusion–exclusion terms for `n` cut sets, saturating.
#[must_use]
pub fn term_count(n: usize) -> u64 {
    u32::try_from(n)
        .ok()
        .and_then(|n| 1_u64.checked_shl(n))
        .map_or(u64::MAX, |terms| terms - 1)
}

/// Exact probability of the union of `cut_sets` by inclusion–exclusion.
///
/// Terms whose product is already zero are pruned together with all of
/// their extensions, since those contribute nothing.
///
/// # Errors
///
/// Returns [`AnalysisError::Cancelled`] if cancellation is requested.
pub fn inclusion_exclusion(
    cut_sets: &[CutSet],
    probabilities: &[f64],
    cancel: &CancellationToken,
) -> Result<f64, AnalysisError> {
    let mut walk = Walk {
        cut_sets,
        probabilities,
        multiplicity: vec![0; probabilities.len()],
        cancel,
        terms: 0,
        total: 0.0,
    };
    walk.visit(0, 0, 1.0)?;
    Ok(walk.total.clamp(0.0, 1.0))
}

struct Walk<'a> {
    cut_sets: &'a [CutSet],
    probabilities: &'a [f64],
    /// How many cut sets in the current term contain each event.
    multiplicity: Vec<u32>,
    cancel: &'a CancellationToken,
    terms: u64,
    total: f64,
}

impl Walk<'_> {
    fn visit(&mut self, start: usize, size: usize, product: f64) -> Result<(), AnalysisError> {
        let cut_sets = self.cut_sets;
        for (i, cut_set) in cut_sets.iter().enumerate().skip(start) {
            let members = cut_set.events();
            let mut term = product;
            for e in members {
                if self.multiplicity[e.index()] == 0 {
                    term *= self.probabilities[e.index()];
                }
                self.multiplicity[e.index()] += 1;
            }

            self.terms += 1;
            if self.terms % CANCEL_INTERVAL == 0 {
                self.cancel.check()?;
            }

            if size % 2 == 0 {
                self.total += term;
            } else {
                self.total -= term;
            }
            if term > 0.0 {
                self.visit(i + 1, size + 1, term)?;
            }

            for e in members {
                self.multiplicity[e.index()] -= 1;
            }
        }
        Ok(())
    }
}

/// Top-event probability, exact when `2^n - 1 <= exact_limit`.
///
/// # Errors
///
/// Returns [`AnalysisError::Cancelled`] if cancellation is requested.
pub fn top_event_probability(
    cut_sets: &[CutSet],
    probabilities: &[f64],
    exact_limit: u64,
    cancel: &CancellationToken,
) -> Result<Estimate, AnalysisError> {
    if term_count(cut_sets.len()) <= exact_limit {
        Ok(Estimate {
            probability: inclusion_exclusion(cut_sets, probabilities, cancel)?,
            method: Method::Exact,
        })
    } else {
        Ok(Estimate {
            probability: rare_event(cut_sets, probabilities),
            method: Method::Approximate,
        })
    }
}

/// Importance of one basic event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EventImportance {
    /// The event.
    #[serde(skip)]
    pub event: EventIndex,
    /// `Q - Q(q_i = 0)`: how much the top-event probability drops if the
    /// event never occurs.
    pub risk_reduction: f64,
    /// `Q(q_i = 1) - Q(q_i = 0)`.
    pub birnbaum: f64,
    /// Fraction of minimal cut sets containing the event.
    pub structural: f64,
}

/// Importance of every event, ranked by risk reduction (descending).
///
/// Ties keep event-table order, which is failure-mode identifier order.
/// Returns the ranking and the least precise method used.
///
/// # Errors
///
/// Returns [`AnalysisError::Cancelled`] if cancellation is requested.
#[instrument(skip_all, fields(cut_sets = cut_sets.len()))]
pub fn importance(
    cut_sets: &[CutSet],
    probabilities: &[f64],
    nominal: f64,
    exact_limit: u64,
    cancel: &CancellationToken,
) -> Result<(Vec<EventImportance>, Method), AnalysisError> {
    let mut method = Method::Exact;
    let mut ranking = Vec::with_capacity(probabilities.len());
    let mut forced = probabilities.to_vec();

    #[allow(clippy::cast_precision_loss)]
    let total = cut_sets.len().max(1) as f64;

    for index in 0..probabilities.len() {
        cancel.check()?;
        let event = EventIndex(index);

        let (containing, rest): (Vec<CutSet>, Vec<CutSet>) =
            cut_sets.iter().cloned().partition(|c| c.contains(event));

        // With q_i = 0 every cut set containing the event vanishes.
        let without = top_event_probability(&rest, probabilities, exact_limit, cancel)?;

        forced[index] = 1.0;
        let with = top_event_probability(cut_sets, &forced, exact_limit, cancel)?;
        forced[index] = probabilities[index];

        method = method.combine(without.method).combine(with.method);

        #[allow(clippy::cast_precision_loss)]
        let structural = containing.len() as f64 / total;

        ranking.push(EventImportance {
            event,
            risk_reduction: (nominal - without.probability).max(0.0),
            birnbaum: (with.probability - without.probability).max(0.0),
            structural,
        });
    }

    ranking.sort_by(|a, b| b.risk_reduction.total_cmp(&a.risk_reduction));
    Ok((ranking, method))
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    fn set(events: &[usize]) -> CutSet {
        CutSet::new(events.iter().map(|&i| EventIndex(i)).collect())
    }

    fn exact(cut_sets: &[CutSet], p: &[f64]) -> f64 {
        inclusion_exclusion(cut_sets, p, &CancellationToken::new()).unwrap()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn or_of_two_events() {
        let p = exact(&[set(&[0]), set(&[1])], &[0.01, 0.02]);
        assert!(close(p, 0.0298));
    }

    #[test]
    fn and_of_two_events() {
        let p = exact(&[set(&[0, 1])], &[0.01, 0.02]);
        assert!(close(p, 0.0002));
    }

    #[test]
    fn shared_events_are_counted_once() {
        // {a,b} ∪ {a,c}: P = pa*pb + pa*pc - pa*pb*pc
        let p = exact(&[set(&[0, 1]), set(&[0, 2])], &[0.5, 0.5, 0.5]);
        assert!(close(p, 0.25 + 0.25 - 0.125));
    }

    #[test]
    fn certain_singleton_forces_one() {
        let cut_sets = [set(&[0]), set(&[1, 2])];
        let p = [1.0, 0.3, 0.4];
        assert!(close(exact(&cut_sets, &p), 1.0));
        assert!(close(rare_event(&cut_sets, &p), 1.0));
    }

    #[test]
    fn impossible_event_zeroes_its_cut_sets() {
        let cut_sets = [set(&[0, 1]), set(&[2])];
        let p = [0.0, 0.9, 0.1];
        assert!(close(exact(&cut_sets, &p), 0.1));
    }

    #[test]
    fn no_cut_sets_means_no_failure() {
        assert!(close(exact(&[], &[]), 0.0));
    }

    #[test_case(&[0.01, 0.02, 0.03]; "small")]
    #[test_case(&[0.4, 0.5, 0.6]; "large")]
    #[test_case(&[0.0, 1.0, 0.5]; "boundary")]
    fn rare_event_bounds_exact(p: &[f64]) {
        let cut_sets = [set(&[0]), set(&[1, 2]), set(&[0, 2])];
        assert!(rare_event(&cut_sets, p) >= exact(&cut_sets, p) - 1e-15);
    }

    #[test]
    fn exact_is_monotone() {
        let cut_sets = [set(&[0, 1]), set(&[1, 2]), set(&[3])];
        let mut p = vec![0.1, 0.2, 0.3, 0.05];
        let mut last = exact(&cut_sets, &p);
        for step in 0..10 {
            p[step % 4] = (p[step % 4] + 0.07).min(1.0);
            let next = exact(&cut_sets, &p);
            assert!(next >= last - 1e-15);
            last = next;
        }
    }

    #[test]
    fn method_follows_the_term_limit() {
        let cut_sets = [set(&[0]), set(&[1])];
        let p = [0.01, 0.02];
        let cancel = CancellationToken::new();

        let estimate = top_event_probability(&cut_sets, &p, 3, &cancel).unwrap();
        assert_eq!(estimate.method, Method::Exact);

        let estimate = top_event_probability(&cut_sets, &p, 2, &cancel).unwrap();
        assert_eq!(estimate.method, Method::Approximate);
        assert!(close(estimate.probability, 0.03));
    }

    #[test]
    fn term_count_saturates() {
        assert_eq!(term_count(0), 0);
        assert_eq!(term_count(3), 7);
        assert_eq!(term_count(64), u64::MAX);
        assert_eq!(term_count(1000), u64::MAX);
    }

    #[test]
    fn cancellation_interrupts_long_sums() {
        let cut_sets: Vec<_> = (0..16).map(|i| set(&[i])).collect();
        let p = vec![0.5; 16];
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert_eq!(
            inclusion_exclusion(&cut_sets, &p, &cancel),
            Err(AnalysisError::Cancelled)
        );
    }

    #[test]
    fn importance_ranks_single_point_first() {
        // top = a | (b & c)
        let cut_sets = [set(&[0]), set(&[1, 2])];
        let p = [0.05, 0.1, 0.1];
        let cancel = CancellationToken::new();
        let nominal = exact(&cut_sets, &p);

        let (ranking, method) = importance(&cut_sets, &p, nominal, 1 << 10, &cancel).unwrap();

        assert_eq!(method, Method::Exact);
        let order: Vec<_> = ranking.iter().map(|r| r.event.index()).collect();
        assert_eq!(order, [0, 1, 2]);
        // Q(a=0) = P(b&c) = 0.01
        assert!(close(ranking[0].risk_reduction, nominal - 0.01));
        // Birnbaum of a: 1 - P(b&c) = 0.99
        assert!(close(ranking[0].birnbaum, 0.99));
        assert!(close(ranking[0].structural, 0.5));
        // b and c tie and keep identifier order.
        assert!(close(ranking[1].risk_reduction, ranking[2].risk_reduction));
    }
}
