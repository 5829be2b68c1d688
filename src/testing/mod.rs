//! Assertion runner
//!
//! Scenarios are ordered lists of named steps, either built in (`suites`)
//! or read from YAML. Each step runs against a live [`Session`] and reports
//! through the shared [`Runner`].
//!
//! [`Session`]: crate::session::Session

mod case;
mod checks;
mod config;
mod runner;
mod steps;
pub mod suites;

pub use case::{fail, pass, CaseState, TestCase};
pub use checks::{require_fragments, require_option};
pub use config::*;
pub use runner::{CaseOutcome, Report, Runner};
