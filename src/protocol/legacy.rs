//! Decoder for the legacy separator-delimited text protocol.
//!
//! Output is a sequence of blocks ending in the solution separator
//! (`----------`), followed by at most one end-of-search banner. Inside a
//! block, statistic lines (`%%%mzn-stat`), the elapsed-time comment, and
//! solver comment lines coexist with the JSON body of the solution.

use regex::Regex;

use crate::config::Method;
use crate::error::SolveError;
use crate::status::Status;

use super::Message;

/// Per-solution delimiter, newline included.
pub const SEPARATOR: &[u8] = b"----------\n";

/// Decoder for one legacy-protocol session.
#[derive(Debug)]
pub struct LegacyDecoder {
    method: Method,
    stat_re: Regex,
    time_re: Regex,
}

impl LegacyDecoder {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            stat_re: Regex::new(r"%%%mzn-stat:? (\w+)=([^\r\n]*)").expect("statistic pattern"),
            time_re: Regex::new(r"% time elapsed: (\d+\.\d+) s").expect("time pattern"),
        }
    }

    /// Decodes one block of output.
    ///
    /// `terminated` distinguishes a complete solution block (separator seen)
    /// from the final remainder of a closed stream. Only the remainder is
    /// scanned for end-of-search banners; a terminated block implies a
    /// solution was printed, which the separator itself reports as
    /// `Satisfied`.
    pub fn decode_block(&self, raw: &[u8], terminated: bool) -> Result<Vec<Message>, SolveError> {
        let text = String::from_utf8_lossy(raw);
        let mut messages = Vec::new();

        let entries: Vec<(String, String)> = self
            .stat_re
            .captures_iter(&text)
            .map(|caps| (caps[1].to_string(), caps[2].to_string()))
            .collect();
        if !entries.is_empty() {
            messages.push(Message::StatisticsDelta { entries });
        }

        if let Some(caps) = self.time_re.captures(&text) {
            if let Ok(secs) = caps[1].parse::<f64>() {
                messages.push(Message::TimeMarker {
                    milliseconds: (secs * 1000.0).round() as i64,
                });
            }
        }

        if let Some(fields) = self.parse_solution_body(&text)? {
            messages.push(Message::Solution { fields });
        }

        if terminated {
            messages.push(Message::StatusMarker {
                status: Status::Satisfied,
            });
        } else if let Some(status) = Status::from_legacy_output(raw, self.method) {
            messages.push(Message::StatusMarker { status });
        }

        Ok(messages)
    }

    /// Strips separators, banners, and comment lines, then parses whatever
    /// JSON body remains.
    fn parse_solution_body(
        &self,
        text: &str,
    ) -> Result<Option<serde_json::Map<String, serde_json::Value>>, SolveError> {
        let body: String = text
            .lines()
            .filter(|line| {
                let trimmed = line.trim_start();
                !trimmed.starts_with('%')
                    && !trimmed.starts_with("----------")
                    && !trimmed.starts_with("=====")
            })
            .collect::<Vec<_>>()
            .join("\n");

        if !body.contains('{') {
            return Ok(None);
        }

        let parsed: serde_json::Value = serde_json::from_str(body.trim())?;
        match parsed {
            serde_json::Value::Object(mut fields) => {
                if let Some(objective) = fields.shift_remove("_objective") {
                    fields.insert("objective".to_string(), objective);
                }
                if let Some(output) = fields.shift_remove("_output") {
                    fields.insert("_output_item".to_string(), output);
                }
                Ok(Some(fields))
            }
            other => Err(SolveError::Driver {
                location: None,
                message: format!("expected a JSON object in solver output, got: {other}"),
            }),
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoder() -> LegacyDecoder {
        LegacyDecoder::new(Method::Satisfy)
    }

    #[test]
    fn test_solution_block() {
        let messages = decoder()
            .decode_block(b"{\"x\": 3}\n----------\n", true)
            .unwrap();
        assert_eq!(messages.len(), 2);
        match &messages[0] {
            Message::Solution { fields } => {
                assert_eq!(fields.get("x"), Some(&serde_json::json!(3)));
            }
            other => panic!("unexpected message: {other:?}"),
        }
        assert!(matches!(
            messages[1],
            Message::StatusMarker {
                status: Status::Satisfied
            }
        ));
    }

    #[test]
    fn test_comment_lines_are_stripped() {
        let block = b"% solver chatter\n{\"x\": 1}\n% more chatter\n----------\n";
        let messages = decoder().decode_block(block, true).unwrap();
        assert!(matches!(messages[0], Message::Solution { .. }));
    }

    #[test]
    fn test_statistics_and_time_lines() {
        let block =
            b"%%%mzn-stat: nodes=42\n%%%mzn-stat solveTime=0.5\n% time elapsed: 1.25 s\n{\"x\": 1}\n----------\n";
        let messages = decoder().decode_block(block, true).unwrap();

        match &messages[0] {
            Message::StatisticsDelta { entries } => {
                assert_eq!(
                    entries,
                    &vec![
                        ("nodes".to_string(), "42".to_string()),
                        ("solveTime".to_string(), "0.5".to_string()),
                    ]
                );
            }
            other => panic!("unexpected message: {other:?}"),
        }
        assert!(matches!(
            messages[1],
            Message::TimeMarker { milliseconds: 1250 }
        ));
        assert!(matches!(messages[2], Message::Solution { .. }));
    }

    #[test]
    fn test_objective_key_renamed() {
        let block = b"{\"_objective\": 25, \"_output\": \"obj = 25\"}\n----------\n";
        let messages = decoder().decode_block(block, true).unwrap();
        match &messages[0] {
            Message::Solution { fields } => {
                assert_eq!(fields.get("objective"), Some(&serde_json::json!(25)));
                assert_eq!(
                    fields.get("_output_item"),
                    Some(&serde_json::json!("obj = 25"))
                );
                assert!(!fields.contains_key("_objective"));
                assert!(!fields.contains_key("_output"));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_end_banner_in_remainder() {
        let messages = decoder()
            .decode_block(b"==========\n", false)
            .unwrap();
        assert_eq!(messages.len(), 1);
        assert!(matches!(
            messages[0],
            Message::StatusMarker {
                status: Status::AllSolutions
            }
        ));
    }

    #[test]
    fn test_banner_depends_on_method() {
        let decoder = LegacyDecoder::new(Method::Maximize);
        let messages = decoder.decode_block(b"==========\n", false).unwrap();
        assert!(matches!(
            messages[0],
            Message::StatusMarker {
                status: Status::OptimalSolution
            }
        ));
    }

    #[test]
    fn test_unsatisfiable_banner() {
        let messages = decoder()
            .decode_block(b"=====UNSATISFIABLE=====\n", false)
            .unwrap();
        assert!(matches!(
            messages[0],
            Message::StatusMarker {
                status: Status::Unsatisfiable
            }
        ));
    }

    #[test]
    fn test_empty_block_yields_no_solution() {
        let messages = decoder().decode_block(b"% only chatter\n", false).unwrap();
        assert!(messages.is_empty());
    }
}
