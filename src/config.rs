//! Session configuration.
//!
//! A [`SessionConfig`] fully describes one solver invocation: the executable,
//! the already-composed argument vector, the output protocol the solver was
//! asked to speak, and the solve-method context needed to interpret the
//! legacy end-of-search banners. Flag composition from high-level solve
//! options is the caller's concern; the session consumes the finished argv.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Objective method of the model being solved.
///
/// Needed to distinguish `ALL_SOLUTIONS` from `OPTIMAL_SOLUTION` when the
/// legacy search-complete banner (`==========`) is seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
    /// Satisfaction problem.
    Satisfy,
    /// Minimization problem.
    Minimize,
    /// Maximization problem.
    Maximize,
}

impl Method {
    /// Parses the method string reported by the solver's model interface.
    pub fn from_interface(s: &str) -> Option<Method> {
        match s {
            "sat" | "satisfy" => Some(Method::Satisfy),
            "min" | "minimize" => Some(Method::Minimize),
            "max" | "maximize" => Some(Method::Maximize),
            _ => None,
        }
    }

    /// Returns true for minimization and maximization problems.
    pub fn is_optimization(self) -> bool {
        !matches!(self, Method::Satisfy)
    }
}

/// Output protocol spoken by the solver process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Protocol {
    /// Pre-2.6 separator-delimited text output.
    Legacy,
    /// Newline-delimited JSON objects (`--json-stream`).
    JsonStream,
}

/// How many solutions the caller asked the solver for.
///
/// Determines whether the aggregate outcome keeps one solution or a list.
/// When both an all-solutions and an n-solutions request are present in the
/// caller's options, all-solutions takes precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolutionMultiplicity {
    /// Keep only the last (best) solution.
    Single,
    /// All solutions of a satisfaction problem.
    AllSolutions,
    /// A fixed number of solutions of a satisfaction problem.
    NSolutions(u32),
    /// Every intermediate solution of an optimization run.
    Intermediate,
}

impl SolutionMultiplicity {
    /// Whether the aggregate outcome collects a list of solutions.
    pub fn collects_all(self) -> bool {
        !matches!(self, SolutionMultiplicity::Single)
    }
}

/// Configuration for one solver session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Path to the solver executable.
    pub executable: PathBuf,
    /// Complete argument vector, including model and data files.
    pub args: Vec<String>,
    /// Output protocol negotiated for this solver version.
    pub protocol: Protocol,
    /// Objective method of the model instance.
    pub method: Method,
    /// Requested solution multiplicity.
    pub multiplicity: SolutionMultiplicity,
    /// Wall-clock deadline for the whole session. The solver is expected to
    /// enforce its own time limit; the session only steps in after this
    /// deadline plus a fixed grace period.
    pub deadline: Option<Duration>,
    /// Extra environment variables for the solver process.
    pub env_vars: Vec<(String, String)>,
    /// Field renames applied to every solution of the session, built from
    /// the solver-reported output-variable names.
    pub field_renames: Vec<(String, String)>,
    /// Internal read-buffer chunk size for the stdout feeder.
    pub read_buffer_limit: usize,
}

impl SessionConfig {
    /// Creates a configuration with defaults for the given executable.
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            args: Vec::new(),
            protocol: Protocol::JsonStream,
            method: Method::Satisfy,
            multiplicity: SolutionMultiplicity::Single,
            deadline: None,
            env_vars: Vec::new(),
            field_renames: Vec::new(),
            read_buffer_limit: 64 * 1024,
        }
    }

    /// Sets the argument vector.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the output protocol.
    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Sets the objective method.
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Sets the solution multiplicity.
    pub fn with_multiplicity(mut self, multiplicity: SolutionMultiplicity) -> Self {
        self.multiplicity = multiplicity;
        self
    }

    /// Sets the session deadline.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Adds an environment variable for the solver process.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    /// Builds the keyword-rename table from the solver-reported
    /// output-variable names.
    pub fn with_output_names<'a, I>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.field_renames = crate::solution::keyword_renames(names);
        self
    }
}
