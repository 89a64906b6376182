//! Decoder for the newline-delimited JSON object protocol.
//!
//! Every line is one JSON object carrying a `type` discriminator. Warnings
//! (and errors flagged as warnings) are non-fatal; any other error object
//! terminates decoding for the session, though the stream itself is still
//! drained by the caller.

use tracing::debug;

use crate::error::{classify_stream_error, SolveError};
use crate::status::Status;

use super::Message;

/// Decoder for one structured-protocol session.
#[derive(Debug, Default)]
pub struct JsonDecoder;

impl JsonDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Decodes one line of output into zero or more messages.
    ///
    /// Blank lines yield nothing. A malformed JSON line is a protocol fault
    /// and surfaces as an error.
    pub fn decode_line(&self, line: &[u8]) -> Result<Vec<Message>, SolveError> {
        let text = String::from_utf8_lossy(line);
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let obj: serde_json::Value = serde_json::from_str(text)?;
        let msg_type = obj.get("type").and_then(|t| t.as_str()).unwrap_or("");

        let mut messages = Vec::new();
        match msg_type {
            "solution" => {
                // The elapsed time piggybacks on the solution object.
                if let Some(ms) = obj.get("time").and_then(|t| t.as_i64()) {
                    messages.push(Message::TimeMarker { milliseconds: ms });
                }
                let fields = obj
                    .get("output")
                    .and_then(|o| o.get("json"))
                    .and_then(|j| j.as_object())
                    .cloned()
                    .unwrap_or_default();
                let mut fields = fields;
                if let Some(objective) = fields.shift_remove("_objective") {
                    fields.insert("objective".to_string(), objective);
                }
                if let Some(output) = fields.shift_remove("_output") {
                    fields.insert("_output_item".to_string(), output);
                }
                messages.push(Message::Solution { fields });
            }
            "statistics" => {
                let entries = obj
                    .get("statistics")
                    .and_then(|s| s.as_object())
                    .map(|stats| {
                        stats
                            .iter()
                            .map(|(name, value)| (name.clone(), render_scalar(value)))
                            .collect()
                    })
                    .unwrap_or_default();
                messages.push(Message::StatisticsDelta { entries });
            }
            "time" => {
                if let Some(ms) = obj.get("time").and_then(|t| t.as_i64()) {
                    messages.push(Message::TimeMarker { milliseconds: ms });
                }
            }
            "status" => {
                let raw = obj.get("status").and_then(|s| s.as_str()).unwrap_or("");
                match Status::from_stream_str(raw) {
                    Some(status) => messages.push(Message::StatusMarker { status }),
                    None => debug!(status = raw, "unrecognized solver status"),
                }
            }
            "checker" => {
                let text = obj
                    .get("output")
                    .and_then(|o| o.get("raw").or_else(|| o.get("dzn")))
                    .and_then(|t| t.as_str())
                    .unwrap_or("")
                    .to_string();
                messages.push(Message::Checker { text });
            }
            "error" => {
                if obj.get("what").and_then(|w| w.as_str()) == Some("warning") {
                    messages.push(Message::Warning {
                        message: stream_message(&obj),
                    });
                } else {
                    messages.push(Message::Error(classify_stream_error(&obj)));
                }
            }
            "warning" => {
                messages.push(Message::Warning {
                    message: stream_message(&obj),
                });
            }
            other => {
                debug!(message_type = other, "skipping unknown stream object");
            }
        }
        Ok(messages)
    }
}

fn stream_message(obj: &serde_json::Value) -> String {
    obj.get("message")
        .and_then(|m| m.as_str())
        .unwrap_or("solver reported a warning without a message")
        .to_string()
}

/// Renders a JSON scalar the way the legacy statistic lines print it, so
/// both protocols feed identical raw values into the accumulator.
fn render_scalar(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(line: &str) -> Vec<Message> {
        JsonDecoder::new().decode_line(line.as_bytes()).unwrap()
    }

    #[test]
    fn test_blank_line_yields_nothing() {
        assert!(decode("").is_empty());
        assert!(decode("   ").is_empty());
    }

    #[test]
    fn test_solution_with_objective_rename() {
        let messages = decode(r#"{"type":"solution","output":{"json":{"_objective":5,"x":1}}}"#);
        assert_eq!(messages.len(), 1);
        match &messages[0] {
            Message::Solution { fields } => {
                assert_eq!(fields.get("objective"), Some(&serde_json::json!(5)));
                assert_eq!(fields.get("x"), Some(&serde_json::json!(1)));
                assert!(!fields.contains_key("_objective"));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_solution_with_time_emits_marker_first() {
        let messages =
            decode(r#"{"type":"solution","time":1500,"output":{"json":{"x":1}}}"#);
        assert_eq!(messages.len(), 2);
        assert!(matches!(
            messages[0],
            Message::TimeMarker { milliseconds: 1500 }
        ));
        assert!(matches!(messages[1], Message::Solution { .. }));
    }

    #[test]
    fn test_statistics_object() {
        let messages =
            decode(r#"{"type":"statistics","statistics":{"nodes":42,"solveTime":0.5}}"#);
        match &messages[0] {
            Message::StatisticsDelta { entries } => {
                assert!(entries.contains(&("nodes".to_string(), "42".to_string())));
                assert!(entries.contains(&("solveTime".to_string(), "0.5".to_string())));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_status_object() {
        let messages = decode(r#"{"type":"status","status":"OPTIMAL_SOLUTION"}"#);
        assert!(matches!(
            messages[0],
            Message::StatusMarker {
                status: Status::OptimalSolution
            }
        ));
    }

    #[test]
    fn test_unknown_status_is_skipped() {
        assert!(decode(r#"{"type":"status","status":"MYSTERIOUS"}"#).is_empty());
    }

    #[test]
    fn test_time_object() {
        let messages = decode(r#"{"type":"time","time":2500}"#);
        assert!(matches!(
            messages[0],
            Message::TimeMarker { milliseconds: 2500 }
        ));
    }

    #[test]
    fn test_checker_object() {
        let messages = decode(r#"{"type":"checker","output":{"raw":"CHECK OK"}}"#);
        match &messages[0] {
            Message::Checker { text } => assert_eq!(text, "CHECK OK"),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_warning_object_is_non_fatal() {
        let messages = decode(r#"{"type":"warning","message":"model inconsistency detected"}"#);
        match &messages[0] {
            Message::Warning { message } => {
                assert_eq!(message, "model inconsistency detected");
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_error_flagged_as_warning_is_warning() {
        let messages =
            decode(r#"{"type":"error","what":"warning","message":"deprecated annotation"}"#);
        assert!(matches!(messages[0], Message::Warning { .. }));
    }

    #[test]
    fn test_error_object_is_fatal() {
        let messages = decode(
            r#"{"type":"error","what":"type error","message":"no matching overload"}"#,
        );
        match &messages[0] {
            Message::Error(err) => {
                assert!(matches!(err, SolveError::Type { .. }));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_type_is_skipped() {
        assert!(decode(r#"{"type":"trace","section":"default"}"#).is_empty());
    }

    #[test]
    fn test_malformed_line_is_error() {
        let result = JsonDecoder::new().decode_line(b"{not json");
        assert!(matches!(result, Err(SolveError::Json(_))));
    }
}
