//! Test scenario configuration types
//!
//! Defines the data structures for deserializing YAML test scenarios. The
//! built-in suites are expressed with the same types.

use serde::Deserialize;
use std::path::Path;

use crate::common::{Error, Result};
use crate::rpc::OptionValue;

/// A complete test scenario loaded from a YAML file
#[derive(Deserialize, Debug, Clone)]
pub struct TestScenario {
    /// Name of the test scenario
    pub name: String,
    /// Optional description of what the test verifies
    pub description: Option<String>,
    /// The cases to execute, in order
    pub steps: Vec<NamedStep>,
}

/// A step with the name it is reported under
#[derive(Deserialize, Debug, Clone)]
pub struct NamedStep {
    pub name: String,
    #[serde(flatten)]
    pub step: TestStep,
}

impl NamedStep {
    pub fn new(name: impl Into<String>, step: TestStep) -> Self {
        Self {
            name: name.into(),
            step,
        }
    }
}

/// A single check in the execution flow
#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TestStep {
    /// Run `<vcs> status` in the working directory
    VcsStatus,
    /// Every listed user command must be defined
    CommandsExist { commands: Vec<String> },
    /// Run an Ex command
    Command {
        command: String,
        /// Whether the command should succeed (default: true)
        expect_success: Option<bool>,
    },
    /// Evaluate a Vimscript expression
    Eval {
        expression: String,
        /// Expected result, compared as text
        equals: Option<Scalar>,
        /// Expected truthiness
        truthy: Option<bool>,
    },
    /// A buffer whose name contains `marker` must exist
    FindBuffer {
        marker: String,
        /// Command to run first, e.g. "JStatus"
        trigger: Option<String>,
    },
    /// The marker buffer must show every pattern (case-insensitive)
    BufferContains {
        marker: String,
        trigger: Option<String>,
        patterns: Vec<String>,
    },
    /// The marker buffer's options must have these values
    BufferOptions {
        marker: String,
        trigger: Option<String>,
        options: Vec<OptionExpectation>,
    },
    /// Feed keys to the marker buffer and check it still renders
    Reload {
        marker: String,
        keys: String,
        #[serde(default = "default_mode")]
        mode: String,
        #[serde(default = "default_escape")]
        escape: bool,
        /// Text the first lines must contain afterwards (case-sensitive)
        header: String,
        #[serde(default = "default_head_lines")]
        head_lines: usize,
    },
}

/// A YAML scalar written with or without quotes
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(x) => write!(f, "{}", x),
            Scalar::Str(s) => f.write_str(s),
        }
    }
}

/// Expected value of one buffer option
#[derive(Deserialize, Debug, Clone)]
pub struct OptionExpectation {
    pub name: String,
    pub value: OptionValue,
}

impl OptionExpectation {
    pub fn new(name: &str, value: OptionValue) -> Self {
        Self {
            name: name.to_string(),
            value,
        }
    }
}

fn default_mode() -> String {
    "n".to_string()
}
fn default_escape() -> bool {
    true
}
fn default_head_lines() -> usize {
    10
}

impl TestScenario {
    /// Load and parse a YAML scenario
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read test scenario '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let scenario: Self = serde_yaml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse test scenario: {}", e)))?;
        if scenario.steps.is_empty() {
            return Err(Error::Config(format!(
                "Scenario '{}' has no steps",
                scenario.name
            )));
        }
        Ok(scenario)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = r#"
name: status smoke
description: JStatus opens and reloads
steps:
  - name: repository
    action: vcs_status
  - name: commands
    action: commands_exist
    commands: [JStatus, JLog]
  - name: status content
    action: buffer_contains
    marker: jj-status
    trigger: JStatus
    patterns: ["Working copy"]
  - name: options
    action: buffer_options
    marker: jj-status
    options:
      - { name: buftype, value: nofile }
      - { name: modifiable, value: false }
  - name: reload
    action: reload
    marker: jj-status
    keys: r
    header: jj-fugitive Status
"#;

    #[test]
    fn test_parse_scenario() {
        let scenario = TestScenario::parse(SCENARIO).unwrap();
        assert_eq!(scenario.name, "status smoke");
        assert_eq!(scenario.steps.len(), 5);
        assert!(matches!(scenario.steps[0].step, TestStep::VcsStatus));

        match &scenario.steps[2].step {
            TestStep::BufferContains { trigger, patterns, .. } => {
                assert_eq!(trigger.as_deref(), Some("JStatus"));
                assert_eq!(patterns, &vec!["Working copy".to_string()]);
            }
            other => panic!("Expected BufferContains, got {:?}", other),
        }

        match &scenario.steps[3].step {
            TestStep::BufferOptions { trigger, options, .. } => {
                assert!(trigger.is_none());
                assert_eq!(options[1].value, OptionValue::Bool(false));
            }
            other => panic!("Expected BufferOptions, got {:?}", other),
        }
    }

    #[test]
    fn test_reload_defaults() {
        let scenario = TestScenario::parse(SCENARIO).unwrap();
        match &scenario.steps[4].step {
            TestStep::Reload { mode, escape, head_lines, .. } => {
                assert_eq!(mode, "n");
                assert!(*escape);
                assert_eq!(*head_lines, 10);
            }
            other => panic!("Expected Reload, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_action_is_config_error() {
        let err = TestScenario::parse(
            "name: x\nsteps:\n  - name: y\n    action: launch_missiles\n",
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_eval_equals_accepts_unquoted_scalars() {
        let scenario = TestScenario::parse(
            r#"
name: eval
steps:
  - name: number
    action: eval
    expression: "exists(':JStatus')"
    equals: 2
  - name: text
    action: eval
    expression: "&filetype"
    equals: "jj-status"
"#,
        )
        .unwrap();

        let equals: Vec<String> = scenario
            .steps
            .iter()
            .map(|step| match &step.step {
                TestStep::Eval { equals: Some(expected), .. } => expected.to_string(),
                other => panic!("Expected Eval, got {:?}", other),
            })
            .collect();
        assert_eq!(equals, ["2", "jj-status"]);
        assert!(matches!(
            scenario.steps[0].step,
            TestStep::Eval { equals: Some(Scalar::Int(2)), .. }
        ));
    }

    #[test]
    fn test_empty_scenario_rejected() {
        let err = TestScenario::parse("name: nothing\nsteps: []\n").unwrap_err();
        assert!(err.to_string().contains("no steps"));
    }
}
