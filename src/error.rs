//! Error taxonomy and classification for solver sessions.
//!
//! Failures reach the caller as one [`SolveError`]. Two classifiers feed it:
//! [`classify_stderr`] scans the raw error stream of a legacy-protocol
//! solver, and [`classify_stream_error`] converts a structured `error`
//! object from the JSON stream. Both are pure, synchronous transforms; no
//! retries happen anywhere in this crate.

use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Source location attached to a solver error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Path to the offending file, when known.
    pub file: Option<PathBuf>,
    /// First and last line, inclusive.
    pub lines: (u32, u32),
    /// Column range on the first line, `(0, 0)` when unknown.
    pub columns: (u32, u32),
}

impl Location {
    pub fn new(file: Option<PathBuf>, lines: (u32, u32), columns: (u32, u32)) -> Self {
        Self {
            file,
            lines,
            columns,
        }
    }
}

/// Error raised by a solver session.
#[derive(Debug, Error)]
pub enum SolveError {
    #[error("syntax error: {message}")]
    Syntax {
        location: Option<Location>,
        message: String,
    },

    #[error("type error: {message}")]
    Type {
        location: Option<Location>,
        message: String,
    },

    #[error("include error: {message}")]
    Include {
        location: Option<Location>,
        message: String,
    },

    #[error("cyclic include error: {message}")]
    CyclicInclude {
        location: Option<Location>,
        message: String,
    },

    #[error("evaluation error: {message}")]
    Evaluation {
        location: Option<Location>,
        message: String,
    },

    #[error("assertion failed: {message}")]
    Assertion {
        location: Option<Location>,
        message: String,
    },

    #[error("solver error: {message}")]
    Driver {
        location: Option<Location>,
        message: String,
    },

    #[error("solver did not finish before the session deadline")]
    Timeout,

    #[error("session configuration error: {0}")]
    Configuration(String),

    #[error("malformed solver output: {0}")]
    Json(#[from] serde_json::Error),

    #[error("i/o error communicating with the solver: {0}")]
    Io(#[from] std::io::Error),
}

impl SolveError {
    /// Source location of the error, when one could be determined.
    pub fn location(&self) -> Option<&Location> {
        match self {
            SolveError::Syntax { location, .. }
            | SolveError::Type { location, .. }
            | SolveError::Include { location, .. }
            | SolveError::CyclicInclude { location, .. }
            | SolveError::Evaluation { location, .. }
            | SolveError::Assertion { location, .. }
            | SolveError::Driver { location, .. } => location.as_ref(),
            _ => None,
        }
    }
}

/// Discriminant used while classifying, before the error is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ErrorKind {
    Syntax,
    Type,
    Include,
    CyclicInclude,
    Evaluation,
    Assertion,
    Driver,
}

fn build(kind: ErrorKind, location: Option<Location>, message: String) -> SolveError {
    match kind {
        ErrorKind::Syntax => SolveError::Syntax { location, message },
        ErrorKind::Type => SolveError::Type { location, message },
        ErrorKind::Include => SolveError::Include { location, message },
        ErrorKind::CyclicInclude => SolveError::CyclicInclude { location, message },
        ErrorKind::Evaluation => SolveError::Evaluation { location, message },
        ErrorKind::Assertion => SolveError::Assertion { location, message },
        ErrorKind::Driver => SolveError::Driver { location, message },
    }
}

/// Classifies the error stream of a solver that exited abnormally.
///
/// Scans stderr for the known MiniZinc error phrases, extracts a
/// `path:line(.col-col)?:` location prefix when present, and, if the
/// referenced file is readable, appends a source-context fragment with a
/// column caret for human display.
pub fn classify_stderr(stderr: &[u8]) -> SolveError {
    let text = String::from_utf8_lossy(stderr);

    let kind = if text.contains("MiniZinc: evaluation error:") {
        if text.contains("Assertion failed:") {
            ErrorKind::Assertion
        } else {
            ErrorKind::Evaluation
        }
    } else if text.contains("MiniZinc: type error:") {
        ErrorKind::Type
    } else if text.contains("Error: syntax error") {
        ErrorKind::Syntax
    } else {
        ErrorKind::Driver
    };

    let location = scan_location(&text);

    let mut message = text.trim().to_string();
    if message.is_empty() {
        message = "solver stopped with a non-zero exit code but did not output an error message"
            .to_string();
    } else if let Some(loc) = &location {
        if let Some(fragment) = render_fragment(loc) {
            message.push_str("\nFile fragment:\n");
            message.push_str(&fragment);
        }
    }

    build(kind, location, message)
}

/// Converts a structured `error` object from the JSON stream.
///
/// Location fields are taken verbatim from the payload; no file access is
/// performed for structured errors.
pub fn classify_stream_error(obj: &serde_json::Value) -> SolveError {
    let kind = match obj.get("what").and_then(|w| w.as_str()) {
        Some("syntax error") => ErrorKind::Syntax,
        Some("type error") => ErrorKind::Type,
        Some("include error") => ErrorKind::Include,
        Some("cyclic include error") => ErrorKind::CyclicInclude,
        Some("evaluation error") => ErrorKind::Evaluation,
        Some("assertion failed") => ErrorKind::Assertion,
        _ => ErrorKind::Driver,
    };

    let location = obj.get("location").map(|loc| {
        let file = loc
            .get("filename")
            .and_then(|f| f.as_str())
            .filter(|f| !f.is_empty())
            .map(PathBuf::from);
        let num = |key: &str| loc.get(key).and_then(|v| v.as_u64()).unwrap_or(0) as u32;
        Location::new(
            file,
            (num("firstLine"), num("lastLine")),
            (num("firstColumn"), num("lastColumn")),
        )
    });

    let message = obj
        .get("message")
        .and_then(|m| m.as_str())
        .unwrap_or("")
        .to_string();

    build(kind, location, message)
}

fn scan_location(text: &str) -> Option<Location> {
    // "path:12.3-7: ..." or "path:12: ..."
    let re = Regex::new(r"(\S+):(\d+)(?:\.(\d+)-(\d+))?:\s").ok()?;
    let caps = re.captures(text)?;
    let line: u32 = caps[2].parse().ok()?;
    let columns = match (caps.get(3), caps.get(4)) {
        (Some(lo), Some(hi)) => (
            lo.as_str().parse().unwrap_or(0),
            hi.as_str().parse().unwrap_or(0),
        ),
        _ => (0, 0),
    };
    Some(Location::new(
        Some(PathBuf::from(&caps[1])),
        (line, line),
        columns,
    ))
}

/// Renders the source lines around the error with a caret marking the
/// column range. Returns `None` when the file cannot be read or the line
/// is out of range.
fn render_fragment(location: &Location) -> Option<String> {
    let path = location.file.as_ref()?;
    let content = fs::read_to_string(path).ok()?;
    let err_line = location.lines.0 as usize;
    if err_line == 0 {
        return None;
    }

    let mut fragment = String::new();
    let first = err_line.saturating_sub(1).max(1);
    for (nr, line) in content
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l))
        .skip(first - 1)
        .take(err_line + 2 - first)
    {
        let _ = writeln!(fragment, "{}: {}", nr, line.trim_end());
        let (col_lo, col_hi) = location.columns;
        if nr == err_line && col_hi > col_lo {
            let pad = nr.to_string().len() + 2 + col_lo.saturating_sub(1) as usize;
            let width = (col_hi - col_lo + 1) as usize;
            let _ = writeln!(fragment, "{}{}", " ".repeat(pad), "^".repeat(width));
        }
    }
    if fragment.is_empty() {
        None
    } else {
        Some(fragment)
    }
}
