//! Output comparison and test result construction
//!
//! Every backend judges a test case the same way: normalize both sides,
//! compare, and record errors as failed results instead of aborting the run.

use std::fmt::Display;

use crate::types::{TestCase, TestResult};

/// Separator placed between per-test outputs in the combined output
pub const OUTPUT_SEPARATOR: &str = "\n---\n";

/// Expected text recorded when a test case's files could not be loaded
pub const LOAD_ERROR_EXPECTED: &str = "Error loading test case";

/// Normalize program output for comparison
///
/// Line endings are converted to `\n` (a run of carriage returns before a
/// newline collapses entirely) and surrounding whitespace is trimmed. The
/// result is a fixed point: normalizing it again changes nothing.
pub fn normalize_output(output: &str) -> String {
    let mut normalized = String::with_capacity(output.len());
    let mut pending_cr = 0;

    for c in output.chars() {
        match c {
            '\r' => pending_cr += 1,
            '\n' => {
                pending_cr = 0;
                normalized.push('\n');
            }
            other => {
                normalized.extend(std::iter::repeat_n('\r', pending_cr));
                pending_cr = 0;
                normalized.push(other);
            }
        }
    }
    normalized.extend(std::iter::repeat_n('\r', pending_cr));

    normalized.trim().to_string()
}

/// Compare actual and expected output after normalization
pub fn outputs_match(actual: &str, expected: &str) -> bool {
    normalize_output(actual) == normalize_output(expected)
}

/// Format an error the way it appears in `TestResult::actual`
pub fn error_text(message: impl Display) -> String {
    format!("Error: {message}")
}

/// Join per-test outputs into the combined output
pub fn join_outputs(outputs: &[String]) -> String {
    outputs.join(OUTPUT_SEPARATOR)
}

impl TestResult {
    /// Result for a case that ran to completion
    pub fn evaluated(test_case: &TestCase, input: String, expected: String, actual: String) -> Self {
        let passed = outputs_match(&actual, &expected);
        Self {
            test_case: test_case.description.clone(),
            expected,
            actual,
            passed,
            input,
        }
    }

    /// Result for a case that ran but failed with an error
    pub fn errored(
        test_case: &TestCase,
        input: String,
        expected: String,
        message: impl Display,
    ) -> Self {
        Self {
            test_case: test_case.description.clone(),
            expected,
            actual: error_text(message),
            passed: false,
            input,
        }
    }

    /// Result for a case whose input or expected output could not be fetched
    pub fn load_failed(test_case: &TestCase, message: impl Display) -> Self {
        Self::errored(
            test_case,
            String::new(),
            LOAD_ERROR_EXPECTED.to_string(),
            message,
        )
    }
}
