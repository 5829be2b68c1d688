//! Content and option assertions

use crate::common::Result;
use crate::rpc::OptionValue;

use super::case::{fail, pass};

/// Every fragment must appear in `content`, ignoring case
///
/// Fragments are checked in order and the first missing one fails the check.
pub fn require_fragments(content: &str, fragments: &[String]) -> Result<()> {
    let haystack = content.to_lowercase();
    for fragment in fragments {
        if haystack.contains(&fragment.to_lowercase()) {
            pass(format!("Found expected pattern: {}", fragment));
        } else {
            return fail(format!("Missing expected pattern: {}", fragment));
        }
    }
    Ok(())
}

/// An observed option must equal the expected value
pub fn require_option(name: &str, expected: &OptionValue, observed: &OptionValue) -> Result<()> {
    if expected.matches(observed) {
        pass(format!("{} = {}", name, observed));
        Ok(())
    } else {
        fail(format!("{} = {}, expected {}", name, observed, expected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragments(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    const STATUS: &str = "# JJ-FUGITIVE STATUS\n\nWorking copy : qpvuntsm 1234abcd\n\nCommands:\n  r = reload";

    #[test]
    fn test_fragments_match_case_insensitively() {
        let wanted = fragments(&["jj-fugitive Status", "Working copy", "Commands:"]);
        assert!(require_fragments(STATUS, &wanted).is_ok());
    }

    #[test]
    fn test_first_missing_fragment_fails() {
        let wanted = fragments(&["Working copy", "Conflicts", "Parent commit"]);
        let err = require_fragments(STATUS, &wanted).unwrap_err();
        assert!(err.is_assertion());
        assert!(err.to_string().contains("Conflicts"));
        assert!(!err.to_string().contains("Parent commit"));
    }

    #[test]
    fn test_no_fragments_passes() {
        assert!(require_fragments("", &[]).is_ok());
    }

    #[test]
    fn test_option_mismatch_fails() {
        let err = require_option(
            "buftype",
            &OptionValue::Str("nofile".into()),
            &OptionValue::Str("".into()),
        )
        .unwrap_err();
        assert!(err.is_assertion());
        assert!(err.to_string().contains("expected nofile"));

        assert!(require_option("swapfile", &OptionValue::Bool(false), &OptionValue::Int(0)).is_ok());
    }
}
