//! Solve status and its resolution over the lifetime of a session.
//!
//! The solver reports its outcome in two ways: explicit status objects in the
//! JSON stream, and textual end-of-search banners in the legacy protocol.
//! [`StatusResolver`] folds those observations, together with the process
//! exit code, into one final [`Status`].

use serde::{Deserialize, Serialize};

use crate::config::Method;

/// Outcome classification of a solve attempt.
///
/// Variants are declared in order of informativeness, so `Ord` compares how
/// much a status tells us about the search space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Status {
    /// An error occurred during the solving process.
    Error,
    /// Search terminated without exploring the whole search space and no
    /// solution was found.
    Unknown,
    /// The objective of the optimization problem is unbounded.
    Unbounded,
    /// The whole search space was explored and contains no solution.
    Unsatisfiable,
    /// A solution was found, but the search space may not be exhausted.
    Satisfied,
    /// All solutions in the search space have been found.
    AllSolutions,
    /// A solution optimal with respect to the objective has been found.
    OptimalSolution,
}

impl Status {
    /// Determines the status implied by a block of legacy solver output.
    ///
    /// Scans for the standard MiniZinc end-of-search banners in a defined
    /// order. The search-complete marker (`==========`) and the solution
    /// separator (`----------`) are interpreted relative to the objective
    /// method. Returns `None` when the block carries no status information.
    pub fn from_legacy_output(output: &[u8], method: Method) -> Option<Status> {
        fn contains(haystack: &[u8], needle: &[u8]) -> bool {
            haystack.windows(needle.len()).any(|w| w == needle)
        }

        if contains(output, b"=====ERROR=====") {
            Some(Status::Error)
        } else if contains(output, b"=====UNKNOWN=====") {
            Some(Status::Unknown)
        } else if contains(output, b"=====UNSATISFIABLE=====") {
            Some(Status::Unsatisfiable)
        } else if contains(output, b"=====UNSATorUNBOUNDED=====")
            || contains(output, b"=====UNBOUNDED=====")
        {
            Some(Status::Unbounded)
        } else if contains(output, b"==========") {
            match method {
                Method::Satisfy => Some(Status::AllSolutions),
                _ => Some(Status::OptimalSolution),
            }
        } else if contains(output, b"----------") {
            Some(Status::Satisfied)
        } else {
            None
        }
    }

    /// Parses a status string from the JSON stream protocol.
    pub fn from_stream_str(status: &str) -> Option<Status> {
        match status {
            "ERROR" => Some(Status::Error),
            "UNKNOWN" => Some(Status::Unknown),
            "UNBOUNDED" | "UNSAT_OR_UNBOUNDED" => Some(Status::Unbounded),
            "UNSATISFIABLE" => Some(Status::Unsatisfiable),
            "SATISFIED" => Some(Status::Satisfied),
            "ALL_SOLUTIONS" => Some(Status::AllSolutions),
            "OPTIMAL_SOLUTION" => Some(Status::OptimalSolution),
            _ => None,
        }
    }

    /// Returns true if the status implies that a solution has been found.
    pub fn has_solution(self) -> bool {
        matches!(
            self,
            Status::Satisfied | Status::AllSolutions | Status::OptimalSolution
        )
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Status::Error => "ERROR",
            Status::Unknown => "UNKNOWN",
            Status::Unbounded => "UNBOUNDED",
            Status::Unsatisfiable => "UNSATISFIABLE",
            Status::Satisfied => "SATISFIED",
            Status::AllSolutions => "ALL_SOLUTIONS",
            Status::OptimalSolution => "OPTIMAL_SOLUTION",
        };
        f.write_str(name)
    }
}

/// Folds status observations from one session into a final [`Status`].
///
/// One resolver exists per session. Markers replace earlier markers, with
/// one exception: once a status more specific than `Unknown` has been
/// observed, a bare `Unknown` marker does not regress it. A non-zero exit
/// code forces `Error` unconditionally.
#[derive(Debug)]
pub struct StatusResolver {
    current: Status,
}

impl StatusResolver {
    /// Creates a resolver in the initial `Unknown` state.
    pub fn new() -> Self {
        Self {
            current: Status::Unknown,
        }
    }

    /// Applies an explicit status marker from the decoded stream.
    pub fn observe_marker(&mut self, status: Status) {
        if status == Status::Unknown && self.current > Status::Unknown {
            return;
        }
        self.current = status;
    }

    /// Records that a solution has been decoded.
    pub fn observe_solution(&mut self) {
        if self.current == Status::Unknown {
            self.current = Status::Satisfied;
        }
    }

    /// Current resolved status.
    pub fn current(&self) -> Status {
        self.current
    }

    /// Resolves the final status given the process exit code.
    pub fn finalize(&mut self, exit_code: i32) -> Status {
        if exit_code != 0 {
            self.current = Status::Error;
        }
        self.current
    }
}

impl Default for StatusResolver {
    fn default() -> Self {
        Self::new()
    }
}
