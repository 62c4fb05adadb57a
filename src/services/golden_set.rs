//! In-memory golden set of reference test cases.

use chrono::Utc;
use serde_json::json;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::models::{
    AgentName, ComplexityLevel, TestCase, TestCategory, TestMetadata, TestPriority,
};

type GoldenKey = (AgentName, ComplexityLevel);

/// Reference cases keyed by (agent, complexity).
///
/// A key read for the first time is seeded with one sample case so every pair has at
/// least a smoke test.
#[derive(Debug, Default)]
pub struct GoldenSetRepository {
    cases: RwLock<HashMap<GoldenKey, Vec<TestCase>>>,
}

impl GoldenSetRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cases for `agent` at `complexity`, seeding the pair on first access.
    pub async fn load_golden_set(
        &self,
        agent: AgentName,
        complexity: ComplexityLevel,
    ) -> Vec<TestCase> {
        if let Some(cases) = self.cases.read().await.get(&(agent, complexity)) {
            return cases.clone();
        }
        self.cases
            .write()
            .await
            .entry((agent, complexity))
            .or_insert_with(|| vec![sample_case(agent, complexity)])
            .clone()
    }

    /// Add or replace (by id) a case under `agent` and the case's own complexity.
    pub async fn save_test_case(&self, agent: AgentName, case: TestCase) {
        tracing::info!(%agent, test_case = %case.id, "Saving test case");
        let mut cases = self.cases.write().await;
        let entry = cases.entry((agent, case.complexity)).or_default();
        match entry.iter_mut().find(|existing| existing.id == case.id) {
            Some(existing) => *existing = case,
            None => entry.push(case),
        }
    }

    /// Every loaded case in `category`, across all keys.
    pub async fn cases_by_category(&self, category: TestCategory) -> Vec<TestCase> {
        let cases = self.cases.read().await;
        let mut matching: Vec<TestCase> = cases
            .values()
            .flatten()
            .filter(|case| case.category == category)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.id.cmp(&b.id));
        matching
    }
}

fn sample_case(agent: AgentName, complexity: ComplexityLevel) -> TestCase {
    let mut case = TestCase::new(format!("{agent}-{complexity}-001"), json!({ "test": "data" }))
        .expecting(json!({ "result": "expected" }))
        .with_complexity(complexity)
        .with_category(TestCategory::Unit)
        .with_timeout_ms(30_000);
    case.name = format!("Sample {complexity} test for {agent}");
    case.description = format!("Test case for {agent} agent with {complexity} complexity");
    case.metadata = TestMetadata {
        created_at: Utc::now(),
        created_by: "system".to_string(),
        tags: vec!["sample".to_string(), agent.to_string()],
        priority: TestPriority::Medium,
    };
    case
}
