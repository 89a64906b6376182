//! mzn-session: solving-session protocol engine for MiniZinc solvers.
//!
//! This library drives an external constraint-solver process and turns its
//! line-oriented output into structured, incrementally-available results.
//! It speaks both historical output protocols (the legacy
//! separator-delimited text format and the newline-delimited JSON stream)
//! and enforces the session's timeout and cancellation semantics while the
//! subprocess may still be writing.
//!
//! The entry point is [`SolverSession`]: configure it with a
//! [`SessionConfig`] carrying the solver executable, the composed argument
//! vector, the negotiated protocol, and the model's objective method, then
//! pull [`SolveResult`]s with [`SolverSession::next`] or fold the whole
//! session with [`SolverSession::collect`].

// Core modules
pub mod config;
pub mod error;
pub mod feed;
pub mod protocol;
pub mod session;
pub mod solution;
pub mod stats;
pub mod status;

// Re-export the session-facing types
pub use config::{Method, Protocol, SessionConfig, SolutionMultiplicity};
pub use error::{Location, SolveError};
pub use session::{SolveOutcome, SolveResult, SolutionSet, SolverSession};
pub use solution::{EnumValue, Solution, Value};
pub use stats::{StatValue, Statistics};
pub use status::Status;
