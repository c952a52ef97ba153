//! Trigger predicate evaluation.
//!
//! The engine treats trigger expressions as opaque: it hands each one, with a
//! state context, to an [`Evaluator`]. Evaluation is bounded in time by
//! [`BoundedEvaluator`], which runs the evaluator on a worker thread and stops
//! waiting once the budget is spent.

use std::{
    fmt,
    sync::{
        Arc, LazyLock,
        atomic::{AtomicUsize, Ordering},
        mpsc,
    },
    thread,
    time::Duration,
};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::TriggerExpression;

/// Why an evaluator could not produce a boolean.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct EvaluationFailure(pub String);

/// Capability for evaluating trigger expressions.
///
/// Implementations must be side-effect free. They may be slow or even hang;
/// callers bound them with [`BoundedEvaluator`].
pub trait Evaluator: fmt::Debug + Send + Sync {
    /// Decides whether the trigger condition holds in `context`.
    ///
    /// # Errors
    ///
    /// Returns [`EvaluationFailure`] if the expression cannot be evaluated.
    fn evaluate(
        &self,
        expression: &TriggerExpression,
        context: &TriggerContext,
    ) -> Result<bool, EvaluationFailure>;
}

/// System and environment state against which triggers are evaluated.
///
/// A JSON object. By convention it holds `inputs`, `state_variables` and
/// `environment` sections, an `events` array and a `time` value, but
/// evaluators may read any key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TriggerContext(Map<String, Value>);

/// Sections searched, in order, for a variable before the top level.
const SECTIONS: [&str; 3] = ["inputs", "state_variables", "environment"];

impl TriggerContext {
    /// An empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a top-level key.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// The raw top-level value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Resolves a (possibly dotted) variable name.
    ///
    /// The first path segment is looked up in each conventional section in
    /// turn, then at the top level.
    #[must_use]
    pub fn lookup(&self, variable: &str) -> Option<&Value> {
        let mut segments = variable.split('.');
        let head = segments.next()?;
        let rest: Vec<&str> = segments.collect();

        let sections = SECTIONS
            .iter()
            .filter_map(|section| self.0.get(*section).and_then(Value::as_object));

        sections
            .chain(std::iter::once(&self.0))
            .filter_map(|scope| scope.get(head))
            .find(|v| !v.is_null())
            .and_then(|value| {
                rest.iter()
                    .try_fold(value, |value, segment| value.get(*segment))
            })
    }

    /// Whether `name` is among the context's `events`.
    #[must_use]
    pub fn has_event(&self, name: &str) -> bool {
        self.0
            .get("events")
            .and_then(Value::as_array)
            .is_some_and(|events| events.iter().any(|e| e.as_str() == Some(name)))
    }
}

static COMPARISON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_.]*)\s*(>=|<=|==|!=|>|<)\s*(\S.*?)\s*$")
        .expect("hard-coded regex is valid")
});

/// A small declarative trigger language.
///
/// Supported forms:
///
/// - `always` and `never`
/// - `event:<name>`, true if `name` is in the context's `events`
/// - `<variable> <op> <literal>` with `op` one of `>= > <= < == !=` and the
///   literal a number, `true`/`false`, or a (quoted or bare) string
///
/// A variable absent from the context makes the condition false. Comparing
/// values of different types is also false.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclarativeEvaluator;

impl Evaluator for DeclarativeEvaluator {
    fn evaluate(
        &self,
        expression: &TriggerExpression,
        context: &TriggerContext,
    ) -> Result<bool, EvaluationFailure> {
        let text = expression.as_str().trim();

        match text {
            "always" => return Ok(true),
            "never" => return Ok(false),
            _ => {}
        }

        if let Some(event) = text.strip_prefix("event:") {
            let event = event.trim();
            if event.is_empty() {
                return Err(EvaluationFailure("event trigger names no event".to_string()));
            }
            return Ok(context.has_event(event));
        }

        let captures = COMPARISON.captures(text).ok_or_else(|| {
            EvaluationFailure(format!("unrecognised trigger expression `{text}`"))
        })?;
        let operator = Operator::parse(&captures[2]);
        let expected = parse_literal(&captures[3]);

        Ok(context
            .lookup(&captures[1])
            .is_some_and(|actual| operator.compare(actual, &expected)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Ge,
    Gt,
    Le,
    Lt,
    Eq,
    Ne,
}

impl Operator {
    fn parse(s: &str) -> Self {
        match s {
            ">=" => Self::Ge,
            ">" => Self::Gt,
            "<=" => Self::Le,
            "<" => Self::Lt,
            "==" => Self::Eq,
            _ => Self::Ne,
        }
    }

    #[allow(clippy::float_cmp)]
    fn compare(self, actual: &Value, expected: &Value) -> bool {
        match (actual, expected) {
            (Value::Number(a), Value::Number(b)) => {
                let (Some(a), Some(b)) = (a.as_f64(), b.as_f64()) else {
                    return false;
                };
                match self {
                    Self::Ge => a >= b,
                    Self::Gt => a > b,
                    Self::Le => a <= b,
                    Self::Lt => a < b,
                    Self::Eq => a == b,
                    Self::Ne => a != b,
                }
            }
            (Value::Bool(_), Value::Bool(_)) | (Value::String(_), Value::String(_)) => {
                match self {
                    Self::Eq => actual == expected,
                    Self::Ne => actual != expected,
                    _ => false,
                }
            }
            _ => false,
        }
    }
}

fn parse_literal(raw: &str) -> Value {
    let quoted = |q: char| {
        raw.strip_prefix(q)
            .and_then(|s| s.strip_suffix(q))
            .filter(|_| raw.len() >= 2)
    };
    if let Some(inner) = quoted('"').or_else(|| quoted('\'')) {
        return Value::String(inner.to_string());
    }
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    raw.parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map_or_else(|| Value::String(raw.to_string()), Value::Number)
}

/// What a time-bounded evaluation produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// The evaluator answered in time.
    Decided(bool),
    /// The evaluator did not answer within the budget.
    TimedOut,
}

/// Default number of evaluator threads that may be running at once.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 16;

/// Runs an [`Evaluator`] with a wall-clock budget per expression.
///
/// Each evaluation runs on its own worker thread. When the budget expires the
/// caller stops waiting; the worker is detached and its eventual answer is
/// discarded. A thread cannot be killed, so a predicate that never returns
/// keeps its worker alive for the life of the process.
///
/// Workers are counted across clones. Once `max_in_flight` are still running,
/// further expressions are reported as timed out without starting a thread,
/// which caps the threads a hanging evaluator can hold.
#[derive(Debug, Clone)]
pub struct BoundedEvaluator {
    evaluator: Arc<dyn Evaluator>,
    timeout: Duration,
    max_in_flight: usize,
    in_flight: Arc<AtomicUsize>,
}

/// Decrements the in-flight count when a worker finishes or panics.
struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl BoundedEvaluator {
    /// Wraps an evaluator with a time budget.
    #[must_use]
    pub fn new(evaluator: Arc<dyn Evaluator>, timeout: Duration) -> Self {
        Self {
            evaluator,
            timeout,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Sets how many evaluator threads may be running at once. Values below
    /// one are raised to one.
    #[must_use]
    pub fn with_max_in_flight(mut self, value: usize) -> Self {
        self.max_in_flight = value.max(1);
        self
    }

    /// Number of evaluator threads still running, including abandoned ones.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// The time budget per expression.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Evaluates `expression`, waiting at most the configured budget.
    ///
    /// # Errors
    ///
    /// Returns the evaluator's [`EvaluationFailure`], or a failure if the
    /// worker thread could not be started or panicked.
    pub fn evaluate(
        &self,
        expression: &TriggerExpression,
        context: &Arc<TriggerContext>,
    ) -> Result<TriggerOutcome, EvaluationFailure> {
        let reserved = self
            .in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.max_in_flight).then_some(n + 1)
            });
        if reserved.is_err() {
            tracing::warn!(
                expression = expression.as_str(),
                in_flight = self.max_in_flight,
                "too many evaluator threads still running; not evaluating"
            );
            return Ok(TriggerOutcome::TimedOut);
        }
        let guard = InFlight(Arc::clone(&self.in_flight));

        let (sender, receiver) = mpsc::channel();
        let evaluator = Arc::clone(&self.evaluator);
        let expression = expression.clone();
        let context = Arc::clone(context);

        thread::Builder::new()
            .name("trigger-eval".to_string())
            .spawn(move || {
                let result = evaluator.evaluate(&expression, &context);
                drop(guard);
                // The receiver may have given up already.
                let _ = sender.send(result);
            })
            .map_err(|e| EvaluationFailure(format!("failed to start evaluator: {e}")))?;

        match receiver.recv_timeout(self.timeout) {
            Ok(result) => result.map(TriggerOutcome::Decided),
            Err(mpsc::RecvTimeoutError::Timeout) => Ok(TriggerOutcome::TimedOut),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(EvaluationFailure("evaluator panicked".to_string()))
            }
        }
    }
}
