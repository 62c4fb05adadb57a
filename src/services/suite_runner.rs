//! Suite scheduling: sequential or in bounded parallel batches, with summary aggregation.

use chrono::Utc;
use futures::future::join_all;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

use crate::domain::errors::FailureKind;
use crate::domain::models::{SuiteReport, TestCase, TestResult, TestSuite, TestSummary};
use crate::services::test_harness::{panic_message, AgentTestHarness};

/// Runs whole suites through one harness.
pub struct TestSuiteRunner {
    harness: Arc<AgentTestHarness>,
}

impl TestSuiteRunner {
    pub fn new(harness: Arc<AgentTestHarness>) -> Self {
        Self { harness }
    }

    pub fn harness(&self) -> &AgentTestHarness {
        &self.harness
    }

    /// Execute every case of `suite` and aggregate the outcome.
    ///
    /// In parallel mode each batch of `max_concurrency` cases settles before the next one
    /// starts. With `stop_on_first_failure`, no case after the batch holding the first
    /// failure runs; skipped cases are absent from `results`.
    pub async fn run_suite(&self, suite: &TestSuite) -> SuiteReport {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("suite", %run_id, suite = %suite.id, agent = %suite.agent);
        self.run(run_id, suite).instrument(span).await
    }

    async fn run(&self, run_id: Uuid, suite: &TestSuite) -> SuiteReport {
        let config = &suite.configuration;
        if suite.agent != self.harness.agent() {
            tracing::warn!(
                harness_agent = %self.harness.agent(),
                "Suite targets a different agent than the harness"
            );
        }
        tracing::info!(
            cases = suite.test_cases.len(),
            parallel = config.parallel,
            max_concurrency = config.max_concurrency,
            "Running test suite"
        );

        let mut results = Vec::with_capacity(suite.test_cases.len());
        let batch_size = if config.parallel {
            config.max_concurrency.max(1)
        } else {
            1
        };

        for batch in suite.test_cases.chunks(batch_size) {
            let batch_results = join_all(batch.iter().map(|case| self.run_guarded(case))).await;
            let failed = batch_results.iter().any(|r| !r.passed);
            results.extend(batch_results);

            if failed && config.stop_on_first_failure {
                tracing::warn!(
                    executed = results.len(),
                    remaining = suite.test_cases.len() - results.len(),
                    "Stopping suite after first failure"
                );
                break;
            }
        }

        let summary = summarize(suite.test_cases.len(), &results);
        tracing::info!(
            passed = summary.passed,
            failed = summary.failed,
            skipped = summary.skipped,
            pass_rate = summary.pass_rate,
            "Test suite finished"
        );

        SuiteReport {
            run_id,
            suite_id: suite.id.clone(),
            agent: suite.agent,
            results,
            summary,
        }
    }

    /// A panicking case (say, from a custom validator) becomes a failed result.
    async fn run_guarded(&self, case: &TestCase) -> TestResult {
        let started_at = Utc::now();
        match AssertUnwindSafe(self.harness.run_test(case))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(test_case = %case.id, %message, "Test case panicked");
                TestResult::failure(
                    case.id.clone(),
                    FailureKind::Panic,
                    format!("Test case panicked: {message}"),
                    1,
                    started_at,
                    0.0,
                )
            }
        }
    }
}

/// Aggregate executed results; `total` is the suite size.
pub fn summarize(total: usize, results: &[TestResult]) -> TestSummary {
    let executed = results.len();
    let passed = results.iter().filter(|r| r.passed).count();
    let latency: f64 = results.iter().map(|r| r.performance.latency_ms).sum();
    let total_cost = results.iter().map(|r| r.performance.cost).sum();

    #[allow(clippy::cast_precision_loss)]
    let (pass_rate, avg_latency_ms) = if executed == 0 {
        (0.0, 0.0)
    } else {
        (passed as f64 / executed as f64, latency / executed as f64)
    };

    TestSummary {
        total,
        executed,
        skipped: total.saturating_sub(executed),
        passed,
        failed: executed - passed,
        pass_rate,
        avg_latency_ms,
        total_cost,
    }
}
