//! Contract cases for guarded operations.
//!
//! A [`ContractCase`] drives one guarded function through an adapter with a
//! fresh guard whose handler is an injected [`RecordingHandler`], then judges
//! the call only by what is observable from outside: the outcome, the number
//! of handler invocations, and the bytes left in the scratch buffer. Every
//! case runs twice to confirm identical calls give identical outcomes.

use std::fmt;
use std::sync::Arc;

use boundlibc_membrane::{
    ConstraintGuard, Guarded, HandlerFamily, RecordingHandler, SafetyLevel, ViolationKind,
};
use serde::{Deserialize, Serialize};

/// Contract property a case exercises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractClause {
    NullArgument,
    BoundOverflow,
    DirectiveInjection,
    Nominal,
}

impl ContractClause {
    pub const ALL: [Self; 4] = [
        Self::NullArgument,
        Self::BoundOverflow,
        Self::DirectiveInjection,
        Self::Nominal,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NullArgument => "null_argument",
            Self::BoundOverflow => "bound_overflow",
            Self::DirectiveInjection => "directive_injection",
            Self::Nominal => "nominal",
        }
    }
}

/// Outcome a case expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedOutcome {
    /// The call succeeds with this value.
    Returns(i64),
    /// The call reports a violation of this kind.
    Violation(ViolationKind),
}

impl ExpectedOutcome {
    #[must_use]
    pub const fn is_violation(self) -> bool {
        matches!(self, Self::Violation(_))
    }

    fn matches(self, observed: &Observed) -> bool {
        match (self, observed) {
            (Self::Returns(want), Ok(got)) => want == *got,
            (Self::Violation(want), Err(got)) => want == *got,
            _ => false,
        }
    }
}

impl fmt::Display for ExpectedOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Returns(v) => write!(f, "ok({v})"),
            Self::Violation(kind) => write!(f, "{}({})", kind.name(), kind.code()),
        }
    }
}

type Observed = Result<i64, ViolationKind>;

fn describe(observed: &Observed) -> String {
    match observed {
        Ok(v) => ExpectedOutcome::Returns(*v).to_string(),
        Err(kind) => ExpectedOutcome::Violation(*kind).to_string(),
    }
}

/// What the scratch buffer must hold after the call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostCondition {
    Unchanged,
    Equals(Vec<u8>),
    Any,
}

/// Drives one guarded call. The scratch buffer is the case's destination or
/// input, whichever the function needs.
pub type Adapter = fn(&ConstraintGuard, &mut [u8]) -> Guarded<i64>;

/// One black-box check of one guarded function.
#[derive(Clone)]
pub struct ContractCase {
    pub id: String,
    pub function: &'static str,
    pub family: HandlerFamily,
    pub clause: ContractClause,
    pub expected: ExpectedOutcome,
    pub handler_calls: usize,
    pub scratch: Vec<u8>,
    pub post: PostCondition,
    pub ceiling: usize,
    adapter: Adapter,
}

impl ContractCase {
    /// Nominal case expecting `Ok(0)`, no handler call, any buffer state.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        function: &'static str,
        clause: ContractClause,
        adapter: Adapter,
    ) -> Self {
        Self {
            id: id.into(),
            function,
            family: HandlerFamily::Mem,
            clause,
            expected: ExpectedOutcome::Returns(0),
            handler_calls: 0,
            scratch: Vec::new(),
            post: PostCondition::Any,
            ceiling: 1024,
            adapter,
        }
    }

    #[must_use]
    pub fn family(mut self, family: HandlerFamily) -> Self {
        self.family = family;
        self
    }

    /// Expect a successful value.
    #[must_use]
    pub fn returns(mut self, value: i64) -> Self {
        self.expected = ExpectedOutcome::Returns(value);
        self.handler_calls = 0;
        self
    }

    /// Expect a violation: one handler call, scratch untouched.
    #[must_use]
    pub fn violates(mut self, kind: ViolationKind) -> Self {
        self.expected = ExpectedOutcome::Violation(kind);
        self.handler_calls = 1;
        self.post = PostCondition::Unchanged;
        self
    }

    #[must_use]
    pub fn scratch(mut self, bytes: &[u8]) -> Self {
        self.scratch = bytes.to_vec();
        self
    }

    /// Require the scratch buffer to hold exactly `bytes` afterwards.
    #[must_use]
    pub fn leaves(mut self, bytes: &[u8]) -> Self {
        self.post = PostCondition::Equals(bytes.to_vec());
        self
    }

    #[must_use]
    pub fn ceiling(mut self, ceiling: usize) -> Self {
        self.ceiling = ceiling;
        self
    }

    fn execute(&self, level: SafetyLevel) -> Execution {
        let recorder = Arc::new(RecordingHandler::new());
        let guard = ConstraintGuard::with_handler(self.family, recorder.clone())
            .ceiling_of(self.ceiling)
            .level_of(level);
        let mut scratch = self.scratch.clone();
        let outcome = (self.adapter)(&guard, &mut scratch).map_err(|v| v.kind);
        Execution {
            outcome,
            handler_calls: recorder.count(),
            bytes_compared: guard.metrics().snapshot().bytes_compared,
            scratch,
        }
    }

    /// Run the case twice under `level` and judge it.
    #[must_use]
    pub fn run(&self, level: SafetyLevel) -> CaseResult {
        let first = self.execute(level);
        let second = self.execute(level);
        let mut failures = Vec::new();

        if !self.expected.matches(&first.outcome) {
            failures.push(format!(
                "outcome: expected {}, observed {}",
                self.expected,
                describe(&first.outcome)
            ));
        }
        if first.handler_calls != self.handler_calls {
            failures.push(format!(
                "handler calls: expected {}, observed {}",
                self.handler_calls, first.handler_calls
            ));
        }
        match &self.post {
            PostCondition::Unchanged if first.scratch != self.scratch => {
                failures.push("scratch buffer modified".to_string());
            }
            PostCondition::Equals(want) if &first.scratch != want => {
                failures.push(format!(
                    "scratch: expected {:?}, observed {:?}",
                    String::from_utf8_lossy(want),
                    String::from_utf8_lossy(&first.scratch)
                ));
            }
            _ => {}
        }
        if first != second {
            failures.push(format!(
                "repeat call diverged: {} then {}",
                describe(&first.outcome),
                describe(&second.outcome)
            ));
        }

        CaseResult {
            id: self.id.clone(),
            function: self.function.to_string(),
            clause: self.clause,
            mode: level.as_str().to_string(),
            passed: failures.is_empty(),
            expected: self.expected.to_string(),
            observed: describe(&first.outcome),
            errno: first.outcome.err().map(ViolationKind::code),
            handler_calls: first.handler_calls,
            bytes_compared: first.bytes_compared,
            failures,
        }
    }
}

impl fmt::Debug for ContractCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractCase")
            .field("id", &self.id)
            .field("function", &self.function)
            .field("clause", &self.clause)
            .field("expected", &self.expected)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, PartialEq, Eq)]
struct Execution {
    outcome: Observed,
    handler_calls: usize,
    bytes_compared: u64,
    scratch: Vec<u8>,
}

/// Verdict for one case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseResult {
    pub id: String,
    pub function: String,
    pub clause: ContractClause,
    pub mode: String,
    pub passed: bool,
    pub expected: String,
    pub observed: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errno: Option<i32>,
    pub handler_calls: usize,
    pub bytes_compared: u64,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub failures: Vec<String>,
}

/// Cases grouped per guarded function, in insertion order.
#[derive(Debug, Default, Clone)]
pub struct ContractSuite {
    cases: Vec<ContractCase>,
}

impl ContractSuite {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, case: ContractCase) -> &mut Self {
        self.cases.push(case);
        self
    }

    #[must_use]
    pub fn cases(&self) -> &[ContractCase] {
        &self.cases
    }

    /// Distinct function names, in first-seen order.
    #[must_use]
    pub fn functions(&self) -> Vec<&'static str> {
        let mut seen = Vec::new();
        for case in &self.cases {
            if !seen.contains(&case.function) {
                seen.push(case.function);
            }
        }
        seen
    }

    /// Keep only the cases for `function`.
    #[must_use]
    pub fn only(mut self, function: &str) -> Self {
        self.cases.retain(|case| case.function == function);
        self
    }

    #[must_use]
    pub fn run(&self, level: SafetyLevel) -> Vec<CaseResult> {
        self.cases.iter().map(|case| case.run(level)).collect()
    }
}
