//! Stream decoding: raw solver output to typed messages.
//!
//! Two protocols coexist historically. Solvers before the structured output
//! mode write separator-delimited text blocks ([`legacy`]); newer solvers
//! write newline-delimited JSON objects ([`json`]). Both decoders produce
//! the same [`Message`] sequence regardless of where the byte stream is
//! split, so the session can feed them partial output after an abnormal
//! termination and still recover everything that was decodable.

pub mod json;
pub mod legacy;

use serde_json::Map;

use crate::error::SolveError;
use crate::status::Status;

/// One decoded protocol message.
#[derive(Debug)]
pub enum Message {
    /// One assignment to the model's output variables, as a raw field map.
    Solution { fields: Map<String, serde_json::Value> },
    /// Raw statistic key/value pairs, in output order.
    StatisticsDelta { entries: Vec<(String, String)> },
    /// Elapsed-time report.
    TimeMarker { milliseconds: i64 },
    /// Explicit solve-status report.
    StatusMarker { status: Status },
    /// Checker-model output for the next solution.
    Checker { text: String },
    /// Fatal solver-reported error; decoding stops after this message.
    Error(SolveError),
    /// Non-fatal solver warning.
    Warning { message: String },
}
