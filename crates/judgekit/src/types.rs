use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A single test case, referencing its input and expected output by path or URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    /// Human-readable label shown in reports
    pub description: String,

    /// Reference to the text fed to the program on stdin
    pub input_file: String,

    /// Reference to the text the program is expected to print
    pub expected_file: String,
}

impl TestCase {
    pub fn new(
        description: impl Into<String>,
        input_file: impl Into<String>,
        expected_file: impl Into<String>,
    ) -> Self {
        Self {
            description: description.into(),
            input_file: input_file.into(),
            expected_file: expected_file.into(),
        }
    }
}

/// Verdict for one test case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    /// Description of the test case this result belongs to
    pub test_case: String,

    /// Expected output as fetched (or an error placeholder)
    pub expected: String,

    /// Program output, or `Error: <message>` when the case could not be run
    pub actual: String,

    /// Whether the normalized outputs match and no error occurred
    pub passed: bool,

    /// Input that was fed to the program
    pub input: String,
}

/// Outcome of executing code against a list of test cases
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeExecutionResult {
    /// Combined program output
    pub output: String,

    /// One result per evaluated test case, in test case order
    pub test_results: Vec<TestResult>,

    /// Wall clock time of the whole call in milliseconds
    #[serde(default)]
    pub execution_time: Option<u64>,

    /// Name of the backend that produced the result
    #[serde(default)]
    pub backend: Option<String>,
}

impl CodeExecutionResult {
    /// Number of passed test cases
    pub fn passed_count(&self) -> usize {
        self.test_results.iter().filter(|r| r.passed).count()
    }

    /// Number of evaluated test cases
    pub fn total_count(&self) -> usize {
        self.test_results.len()
    }

    /// Check if every evaluated test case passed
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.test_results.iter().all(|r| r.passed)
    }
}

/// How much of the test suite an execution covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum ExecutionMode {
    /// Quick feedback on the first `test_case_limit` cases
    Run {
        #[serde(default)]
        test_case_limit: Option<usize>,
        #[serde(default)]
        create_snapshot: bool,
    },

    /// Full evaluation over every test case
    Submit {
        #[serde(default)]
        create_snapshot: bool,
    },
}

impl ExecutionMode {
    /// Default number of cases evaluated by a run
    pub const DEFAULT_TEST_CASE_LIMIT: usize = 2;

    /// A run limited to the first `limit` test cases
    pub fn run(limit: usize) -> Self {
        Self::Run {
            test_case_limit: Some(limit),
            create_snapshot: false,
        }
    }

    /// A run over every test case
    pub fn run_all() -> Self {
        Self::Run {
            test_case_limit: None,
            create_snapshot: false,
        }
    }

    /// A full submission
    pub fn submit() -> Self {
        Self::Submit {
            create_snapshot: true,
        }
    }

    pub fn is_submit(&self) -> bool {
        matches!(self, Self::Submit { .. })
    }

    pub fn create_snapshot(&self) -> bool {
        match self {
            Self::Run {
                create_snapshot, ..
            }
            | Self::Submit { create_snapshot } => *create_snapshot,
        }
    }

    /// Number of leading test cases to evaluate, `None` meaning all of them
    ///
    /// Only runs are limited, and a zero limit counts as no limit.
    pub fn test_case_limit(&self) -> Option<usize> {
        match self {
            Self::Run {
                test_case_limit: Some(limit),
                ..
            } if *limit > 0 => Some(*limit),
            _ => None,
        }
    }
}

impl Default for ExecutionMode {
    fn default() -> Self {
        Self::run(Self::DEFAULT_TEST_CASE_LIMIT)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Wall clock time limit per test case in seconds
    #[serde(default)]
    pub wall_time_limit: Option<f64>,

    /// Maximum size of each captured output stream in kilobytes
    #[serde(default)]
    pub max_output: Option<u64>,
}

impl ResourceLimits {
    /// 1 kilobyte in bytes
    pub const KB: u64 = 1024;

    /// Create new resource limits with all fields set to None
    pub fn new() -> Self {
        Self {
            wall_time_limit: None,
            max_output: None,
        }
    }

    /// Set the wall clock time limit in seconds
    pub fn with_wall_time_limit(mut self, seconds: f64) -> Self {
        self.wall_time_limit = Some(seconds);
        self
    }

    /// Set the maximum output size in kilobytes
    pub fn with_max_output(mut self, kb: u64) -> Self {
        self.max_output = Some(kb);
        self
    }

    /// Apply overrides from another ResourceLimits, preferring values from `overrides`
    pub fn with_overrides(&self, overrides: &ResourceLimits) -> ResourceLimits {
        ResourceLimits {
            wall_time_limit: overrides.wall_time_limit.or(self.wall_time_limit),
            max_output: overrides.max_output.or(self.max_output),
        }
    }

    /// Wall time limit as a duration, falling back to the default
    pub fn wall_time(&self) -> Duration {
        let seconds = self
            .wall_time_limit
            .filter(|s| s.is_finite() && *s > 0.0)
            .unwrap_or(DEFAULT_WALL_TIME_LIMIT);
        Duration::from_secs_f64(seconds)
    }

    /// Output cap in bytes, falling back to the default
    pub fn max_output_bytes(&self) -> usize {
        let kb = self.max_output.unwrap_or(DEFAULT_MAX_OUTPUT);
        kb.saturating_mul(Self::KB) as usize
    }
}

const DEFAULT_WALL_TIME_LIMIT: f64 = 10.0;
const DEFAULT_MAX_OUTPUT: u64 = 1024;

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            wall_time_limit: Some(DEFAULT_WALL_TIME_LIMIT),
            max_output: Some(DEFAULT_MAX_OUTPUT),
        }
    }
}
