//! Oracle comparison
//!
//! Exact string equality against the expected output. No normalisation beyond
//! trimming the observed text; the sentinel is compared like any other value.

use std::time::Duration;

use crate::error::{E2eError, E2eResult};

/// Assert the observed output equals the oracle exactly
pub fn assert_exact(actual: &str, expected: &str) -> E2eResult<()> {
    let actual = actual.trim();
    if actual == expected {
        Ok(())
    } else {
        Err(E2eError::AssertionMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        })
    }
}

/// Assert some output exists, whatever its value
pub fn assert_live(observed: &str, partial_input: &str, waited: Duration) -> E2eResult<()> {
    if observed.trim().is_empty() {
        Err(E2eError::LivenessViolation {
            partial_input: partial_input.to_string(),
            waited,
        })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cases::NO_TRANSLATION_SENTINEL;
    use test_case::test_case;

    #[test_case("අපි දැන් වැඩ කරනවා.", "අපි දැන් වැඩ කරනවා." ; "identical")]
    #[test_case("  මම ගෙදර යනවා.\n", "මම ගෙදර යනවා." ; "observed whitespace trimmed")]
    #[test_case(NO_TRANSLATION_SENTINEL, NO_TRANSLATION_SENTINEL ; "sentinel is a normal value")]
    fn test_exact_match_passes(actual: &str, expected: &str) {
        assert!(assert_exact(actual, expected).is_ok());
    }

    #[test_case("මම ගෙදර යනවා", "මම ගෙදර යනවා." ; "missing trailing punctuation")]
    #[test_case("", NO_TRANSLATION_SENTINEL ; "empty is not the sentinel")]
    #[test_case("මම  ගෙදර යනවා.", "මම ගෙදර යනවා." ; "inner whitespace matters")]
    fn test_mismatch_carries_both_strings(actual: &str, expected: &str) {
        match assert_exact(actual, expected) {
            Err(E2eError::AssertionMismatch {
                expected: e,
                actual: a,
            }) => {
                assert_eq!(e, expected);
                assert_eq!(a, actual.trim());
            }
            other => panic!("expected mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_liveness() {
        let waited = Duration::from_millis(1500);
        assert!(assert_live("mama gedhara", "mama gedhara ", waited).is_ok());
        assert!(matches!(
            assert_live(" \n", "mama gedhara ", waited),
            Err(E2eError::LivenessViolation { .. })
        ));
    }
}
