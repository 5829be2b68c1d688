//! Built-in suites
//!
//! Both are ordinary scenarios; later steps rely on buffers created by
//! earlier ones.

use crate::common::config::StatusConfig;
use crate::rpc::OptionValue;
use crate::session::Session;

use super::config::{NamedStep, OptionExpectation, TestScenario, TestStep};
use super::runner::Runner;

/// Repository, command registration, status content and status options
pub fn remote_api(status: &StatusConfig) -> TestScenario {
    TestScenario {
        name: "jj-fugitive Remote API Tests".to_string(),
        description: None,
        steps: vec![
            NamedStep::new("jj repository", TestStep::VcsStatus),
            NamedStep::new(
                "plugin loading",
                TestStep::CommandsExist {
                    commands: status.commands.clone(),
                },
            ),
            NamedStep::new(
                format!(":{} command", status.command),
                TestStep::BufferContains {
                    marker: status.marker.clone(),
                    trigger: Some(status.command.clone()),
                    patterns: status.patterns.clone(),
                },
            ),
            NamedStep::new(
                "status buffer options",
                TestStep::BufferOptions {
                    marker: status.marker.clone(),
                    trigger: Some(status.command.clone()),
                    options: vec![
                        OptionExpectation::new("buftype", OptionValue::Str("nofile".into())),
                        OptionExpectation::new("swapfile", OptionValue::Bool(false)),
                        OptionExpectation::new("modifiable", OptionValue::Bool(false)),
                    ],
                },
            ),
        ],
    }
}

/// Open the status buffer, then reload it in place
pub fn status_reload(status: &StatusConfig) -> TestScenario {
    TestScenario {
        name: format!("Testing :{} reload functionality", status.command),
        description: None,
        steps: vec![
            NamedStep::new(
                "status buffer",
                TestStep::FindBuffer {
                    marker: status.marker.clone(),
                    trigger: Some(status.command.clone()),
                },
            ),
            NamedStep::new(
                "status buffer reload",
                TestStep::Reload {
                    marker: status.marker.clone(),
                    keys: status.reload_keys.clone(),
                    mode: "n".to_string(),
                    escape: true,
                    header: status.header.clone(),
                    head_lines: 10,
                },
            ),
        ],
    }
}

impl TestScenario {
    /// Register every step with a runner, preserving order
    pub fn into_runner(self) -> Runner<Session> {
        let mut runner = Runner::new(self.name).with_description(self.description);
        for step in self.steps {
            runner.register(step);
        }
        runner
    }
}
