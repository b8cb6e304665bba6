//! Test registration and the runner.
//!
//! Mods group tests into named test classes. A test has one or more cases;
//! a parameterized test gets one case per [`Cases::case`] call. Tests are
//! validated when added, and run on demand in registration order.

use core::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;
use weft_log::{Fault, LogChannel, Logs, isolate};
use weft_system::identity::ModIdentity;
use weft_system::service::{Service, Services};

use crate::assert::AssertionError;

/// Channel each mod's test results are written to.
pub const TESTS_CHANNEL: &str = "Tests";

type CaseBody = Box<dyn Fn() -> Result<(), Fault> + Send + Sync>;

struct TestCase {
    args: String,
    run: CaseBody,
}

/// A registrable test.
pub struct Test {
    name: String,
    expected_failure: bool,
    cases: Vec<TestCase>,
}

impl fmt::Debug for Test {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Test")
            .field("name", &self.name)
            .field("expected_failure", &self.expected_failure)
            .field(
                "cases",
                &self.cases.iter().map(|case| &case.args).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Test {
    /// A test with a single case and no parameters.
    pub fn simple(
        name: impl Into<String>,
        body: impl Fn() -> Result<(), Fault> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            expected_failure: false,
            cases: vec![TestCase {
                args: String::new(),
                run: Box::new(body),
            }],
        }
    }

    /// A parameterized test. Add parameter sets with [`Cases::case`].
    #[expect(clippy::new_ret_no_self, reason = "cases are added before the test is complete")]
    pub fn new<P, F>(name: impl Into<String>, body: F) -> Cases<P>
    where
        P: Clone + fmt::Debug + Send + Sync + 'static,
        F: Fn(P) -> Result<(), Fault> + Send + Sync + 'static,
    {
        Cases {
            test: Test {
                name: name.into(),
                expected_failure: false,
                cases: Vec::new(),
            },
            body: Arc::new(body),
        }
    }

    /// Marks the test as expected to fail.
    #[must_use]
    pub fn expected_failure(mut self) -> Self {
        self.expected_failure = true;
        self
    }

    /// Test name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of cases.
    #[must_use]
    pub fn case_count(&self) -> usize {
        self.cases.len()
    }
}

/// A parameterized test under construction.
pub struct Cases<P> {
    test: Test,
    body: Arc<dyn Fn(P) -> Result<(), Fault> + Send + Sync>,
}

impl<P> Cases<P>
where
    P: Clone + fmt::Debug + Send + Sync + 'static,
{
    /// Adds a case run with `params`.
    #[must_use]
    pub fn case(mut self, params: P) -> Self {
        let body = Arc::clone(&self.body);
        self.test.cases.push(TestCase {
            args: format!("{params:?}"),
            run: Box::new(move || body(params.clone())),
        });
        self
    }

    /// Marks the test as expected to fail.
    #[must_use]
    pub fn expected_failure(mut self) -> Self {
        self.test.expected_failure = true;
        self
    }
}

impl<P> From<Cases<P>> for Test {
    fn from(cases: Cases<P>) -> Self {
        cases.test
    }
}

/// A test was rejected at registration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TestRegistrationError {
    /// The test has an empty name.
    #[error("test in class '{class}' has an empty name")]
    EmptyName {
        /// Test class.
        class: String,
    },
    /// The test has no cases to run.
    #[error("test '{class}.{test}' has no cases")]
    NoCases {
        /// Test class.
        class: String,
        /// Test name.
        test: String,
    },
    /// The class already has a test of that name.
    #[error("test '{class}.{test}' is already registered")]
    Duplicate {
        /// Test class.
        class: String,
        /// Test name.
        test: String,
    },
}

/// A named group of tests owned by one mod.
pub struct TestClass {
    owner: Arc<ModIdentity>,
    name: String,
    tests: RwLock<Vec<Arc<Test>>>,
    logs: Arc<Logs>,
}

impl fmt::Debug for TestClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestClass")
            .field("owner", &self.owner.name())
            .field("name", &self.name)
            .field("tests", &self.test_names())
            .finish()
    }
}

impl TestClass {
    /// Class name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The owning mod.
    #[must_use]
    pub fn owner(&self) -> &Arc<ModIdentity> {
        &self.owner
    }

    /// Names of registered tests in registration order.
    #[must_use]
    pub fn test_names(&self) -> Vec<String> {
        self.tests
            .read()
            .iter()
            .map(|test| test.name.clone())
            .collect()
    }

    /// Validates and registers `test`.
    ///
    /// A rejected test is also recorded in the owner's exceptions file.
    pub fn add(&self, test: impl Into<Test>) -> Result<&Self, TestRegistrationError> {
        let test = test.into();
        if let Err(error) = self.validate(&test) {
            self.logs.error(
                &self.owner,
                "Failed to register test",
                &[("class", self.name.clone()), ("reason", error.to_string())],
            );
            return Err(error);
        }
        tracing::debug!(
            mod_name = self.owner.name(),
            class = %self.name,
            test = %test.name,
            cases = test.cases.len(),
            "test registered"
        );
        self.tests.write().push(Arc::new(test));
        Ok(self)
    }

    fn validate(&self, test: &Test) -> Result<(), TestRegistrationError> {
        if test.name.trim().is_empty() {
            return Err(TestRegistrationError::EmptyName {
                class: self.name.clone(),
            });
        }
        if test.cases.is_empty() {
            return Err(TestRegistrationError::NoCases {
                class: self.name.clone(),
                test: test.name.clone(),
            });
        }
        if self.tests.read().iter().any(|other| other.name == test.name) {
            return Err(TestRegistrationError::Duplicate {
                class: self.name.clone(),
                test: test.name.clone(),
            });
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Results
// ─────────────────────────────────────────────────────────────────────────────

/// Why a case failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    /// An assertion did not hold.
    Assertion,
    /// The case raised some other fault or panicked.
    Unexpected,
}

/// Result of one case.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Succeeded as expected.
    Pass,
    /// Failed, and was marked as expected to fail.
    ExpectedFail,
    /// Failed unexpectedly.
    Fail {
        /// Assertion or unexpected fault.
        kind: FailureKind,
        /// The fault, rendered.
        message: String,
    },
    /// Succeeded although marked as expected to fail.
    UnexpectedPass,
}

impl Outcome {
    /// Returns true for outcomes that count as success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Pass | Self::ExpectedFail)
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::ExpectedFail => "EXPECTED FAIL",
            Self::Fail {
                kind: FailureKind::Assertion,
                ..
            } => "FAIL",
            Self::Fail {
                kind: FailureKind::Unexpected,
                ..
            } => "ERROR",
            Self::UnexpectedPass => "UNEXPECTED PASS",
        }
    }
}

/// Result of one case, with where it came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaseResult {
    /// Owning mod.
    pub mod_name: String,
    /// Test class.
    pub class: String,
    /// Test name.
    pub test: String,
    /// `Debug` rendering of the case parameters; empty for simple tests.
    pub args: String,
    /// What happened.
    pub outcome: Outcome,
}

/// Every case result of a run, in execution order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TestReport {
    /// Case results.
    pub results: Vec<CaseResult>,
}

impl TestReport {
    /// Number of cases run.
    #[must_use]
    pub fn total(&self) -> usize {
        self.results.len()
    }

    /// Number of cases with a successful outcome.
    #[must_use]
    pub fn passed(&self) -> usize {
        self.results
            .iter()
            .filter(|result| result.outcome.is_success())
            .count()
    }

    /// Number of cases with an unsuccessful outcome.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.total() - self.passed()
    }

    /// Returns true if every case succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    /// One-line summary.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} cases: {} passed, {} failed",
            self.total(),
            self.passed(),
            self.failed()
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Harness
// ─────────────────────────────────────────────────────────────────────────────

/// Registry and runner of every mod's tests.
pub struct TestHarness {
    classes: RwLock<Vec<Arc<TestClass>>>,
    logs: Arc<Logs>,
}

impl Service for TestHarness {
    fn create(services: &Services) -> Self {
        Self::new(services.get::<Logs>())
    }
}

impl fmt::Debug for TestHarness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.classes.read().iter()).finish()
    }
}

impl TestHarness {
    /// Creates a harness reporting through `logs`.
    #[must_use]
    pub fn new(logs: Arc<Logs>) -> Self {
        Self {
            classes: RwLock::new(Vec::new()),
            logs,
        }
    }

    /// Returns the test class `name` of `owner`, creating it on first use.
    pub fn test_class(&self, owner: &Arc<ModIdentity>, name: &str) -> Arc<TestClass> {
        let mut classes = self.classes.write();
        if let Some(class) = classes
            .iter()
            .find(|class| class.owner.name() == owner.name() && class.name == name)
        {
            return Arc::clone(class);
        }
        let class = Arc::new(TestClass {
            owner: Arc::clone(owner),
            name: name.to_string(),
            tests: RwLock::new(Vec::new()),
            logs: Arc::clone(&self.logs),
        });
        classes.push(Arc::clone(&class));
        class
    }

    /// Every test class in registration order.
    #[must_use]
    pub fn classes(&self) -> Vec<Arc<TestClass>> {
        self.classes.read().clone()
    }

    /// Runs every registered test.
    pub fn run_all(&self) -> TestReport {
        self.run(|_| true)
    }

    /// Runs the tests owned by `mod_name`.
    pub fn run_mod(&self, mod_name: &str) -> TestReport {
        self.run(|class| class.owner.name() == mod_name)
    }

    fn run(&self, include: impl Fn(&TestClass) -> bool) -> TestReport {
        let classes: Vec<Arc<TestClass>> = self
            .classes
            .read()
            .iter()
            .filter(|class| include(class))
            .cloned()
            .collect();

        let mut report = TestReport::default();
        for class in classes {
            let channel = self.logs.channel(&class.owner, TESTS_CHANNEL);
            let was_enabled = channel.is_enabled();
            channel.enable();

            let tests = class.tests.read().clone();
            for test in tests {
                for case in &test.cases {
                    let result = run_case(&class, &test, case, &channel);
                    report.results.push(result);
                }
            }

            channel.set_enabled(was_enabled);
        }

        tracing::info!(
            total = report.total(),
            passed = report.passed(),
            failed = report.failed(),
            "test run finished"
        );
        report
    }
}

fn run_case(class: &TestClass, test: &Test, case: &TestCase, channel: &LogChannel) -> CaseResult {
    let label = if case.args.is_empty() {
        format!("{}.{}", class.name, test.name)
    } else {
        format!("{}.{}[{}]", class.name, test.name, case.args)
    };
    let outcome = match (isolate(|| (case.run)()), test.expected_failure) {
        (Ok(()), false) => {
            channel.info(format!("PASS {label}"));
            Outcome::Pass
        }
        (Ok(()), true) => {
            channel.error(format!("UNEXPECTED PASS {label}"));
            Outcome::UnexpectedPass
        }
        (Err(fault), true) => {
            channel.info(format!("EXPECTED FAIL {label}: {fault}"));
            Outcome::ExpectedFail
        }
        (Err(fault), false) => {
            let kind = if fault.is::<AssertionError>() {
                FailureKind::Assertion
            } else {
                FailureKind::Unexpected
            };
            let outcome = Outcome::Fail {
                kind,
                message: fault.to_string(),
            };
            channel.error(format!(
                "{} {label}: {fault}\n  raised at {}\n{}",
                outcome.label(),
                fault.location().unwrap_or("<unknown>"),
                fault.trace()
            ));
            outcome
        }
    };
    CaseResult {
        mod_name: class.owner.name().to_string(),
        class: class.name.clone(),
        test: test.name.clone(),
        args: case.args.clone(),
        outcome,
    }
}
