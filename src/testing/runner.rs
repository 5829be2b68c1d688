//! Assertion runner
//!
//! Runs registered cases strictly in order. A failing case never stops the
//! ones after it; later cases may still depend on state earlier ones left
//! behind in the host.

use colored::Colorize;
use serde::Serialize;

use crate::common::Error;

use super::case::{CaseState, TestCase};

/// Ordered collection of cases sharing one context
pub struct Runner<C: Send> {
    title: String,
    description: Option<String>,
    cases: Vec<Box<dyn TestCase<C>>>,
}

impl<C: Send> Runner<C> {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            cases: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    pub fn register(&mut self, case: impl TestCase<C> + 'static) -> &mut Self {
        self.cases.push(Box::new(case));
        self
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Run every case and print the summary
    pub async fn run(&self, ctx: &mut C) -> Report {
        println!("{} {} {}", "🚀 ===".bold(), self.title.white().bold(), "===".bold());
        if let Some(desc) = &self.description {
            println!("  {}", desc.dimmed());
        }

        let mut report = Report::new(&self.title);
        for case in &self.cases {
            report.cases.push(CaseOutcome {
                name: case.name().to_string(),
                state: CaseState::Pending,
                message: None,
            });
        }

        for (index, case) in self.cases.iter().enumerate() {
            let name = case.name();
            println!("\n{} {}", "🔍 Running test:".blue(), name.bold());
            report.cases[index].state = CaseState::Running;
            tracing::debug!(case = name, "Case started");

            let result = case.run(ctx).await;
            let state = CaseState::from_result(&result);
            let message = match result {
                Ok(()) => None,
                Err(Error::TestAssertion(msg)) => {
                    println!("  {} {}", "❌ FAIL:".red(), msg);
                    Some(msg)
                }
                Err(e) => {
                    println!("  {} {} - {}", "💥 ERROR:".red().bold(), name, e);
                    Some(e.to_string())
                }
            };
            tracing::debug!(case = name, ?state, "Case finished");

            let outcome = &mut report.cases[index];
            outcome.state = state;
            outcome.message = message;
        }

        report.print_summary();
        report
    }
}

/// Outcome of one case
#[derive(Debug, Clone, Serialize)]
pub struct CaseOutcome {
    pub name: String,
    pub state: CaseState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Aggregate result of a run
#[derive(Debug, Clone, Default)]
pub struct Report {
    pub name: String,
    pub cases: Vec<CaseOutcome>,
}

impl Report {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            cases: Vec::new(),
        }
    }

    pub fn passed(&self) -> usize {
        self.cases
            .iter()
            .filter(|c| c.state == CaseState::Passed)
            .count()
    }

    pub fn total(&self) -> usize {
        self.cases.len()
    }

    pub fn success(&self) -> bool {
        self.passed() == self.total()
    }

    /// Machine-readable form of the report
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "passed": self.passed(),
            "total": self.total(),
            "success": self.success(),
            "cases": self.cases,
        })
    }

    pub fn print_summary(&self) {
        println!("\n{}", "📊 === Test Results ===".bold());
        println!("Passed: {}/{}", self.passed(), self.total());

        if self.success() {
            println!("{}", "🎉 All tests passed!".green().bold());
        } else {
            println!("{}", "💥 Some tests failed!".red().bold());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Result;
    use async_trait::async_trait;

    /// Records the order cases ran in
    #[derive(Default)]
    struct Trace {
        seen: Vec<String>,
    }

    struct Step {
        name: &'static str,
        outcome: fn() -> Result<()>,
    }

    #[async_trait]
    impl TestCase<Trace> for Step {
        fn name(&self) -> &str {
            self.name
        }

        async fn run(&self, ctx: &mut Trace) -> Result<()> {
            ctx.seen.push(self.name.to_string());
            (self.outcome)()
        }
    }

    fn runner(steps: Vec<Step>) -> Runner<Trace> {
        let mut runner = Runner::new("unit");
        for step in steps {
            runner.register(step);
        }
        runner
    }

    #[tokio::test]
    async fn test_all_passing() {
        let runner = runner(vec![
            Step { name: "a", outcome: || Ok(()) },
            Step { name: "b", outcome: || Ok(()) },
        ]);
        let mut trace = Trace::default();
        let report = runner.run(&mut trace).await;

        assert_eq!(report.passed(), 2);
        assert_eq!(report.total(), 2);
        assert!(report.success());
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_later_cases() {
        let runner = runner(vec![
            Step { name: "repo", outcome: || Err(Error::assertion("not a repo")) },
            Step { name: "rpc", outcome: || Err(Error::Rpc("E492: Not an editor command".into())) },
            Step { name: "last", outcome: || Ok(()) },
        ]);
        let mut trace = Trace::default();
        let report = runner.run(&mut trace).await;

        assert_eq!(trace.seen, vec!["repo", "rpc", "last"]);
        assert_eq!(report.cases[0].state, CaseState::Failed);
        assert_eq!(report.cases[1].state, CaseState::Errored);
        assert_eq!(report.cases[2].state, CaseState::Passed);
        assert_eq!(report.cases[0].message.as_deref(), Some("not a repo"));
        assert_eq!(report.passed(), 1);
        assert!(!report.success());
    }

    #[tokio::test]
    async fn test_passed_never_exceeds_total() {
        let runner = runner(vec![
            Step { name: "x", outcome: || Ok(()) },
            Step { name: "y", outcome: || Err(Error::assertion("y")) },
        ]);
        let report = runner.run(&mut Trace::default()).await;
        assert!(report.passed() <= report.total());
        assert!(report.cases.iter().all(|c| c.state.is_finished()));
    }

    #[tokio::test]
    async fn test_empty_runner_succeeds() {
        let runner: Runner<Trace> = Runner::new("empty");
        assert!(runner.is_empty());
        let report = runner.run(&mut Trace::default()).await;
        assert!(report.success());
    }

    #[tokio::test]
    async fn test_json_report_shape() {
        let runner = runner(vec![Step { name: "only", outcome: || Err(Error::assertion("bad")) }]);
        let json = runner.run(&mut Trace::default()).await.to_json();
        assert_eq!(json["passed"], 0);
        assert_eq!(json["total"], 1);
        assert_eq!(json["success"], false);
        assert_eq!(json["cases"][0]["state"], "failed");
        assert_eq!(json["cases"][0]["message"], "bad");
    }
}
