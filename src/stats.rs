//! Solver statistics: typed values, name-directed coercion, and the
//! per-result accumulator.
//!
//! Statistic values arrive as raw strings (legacy `%%%mzn-stat` lines) or
//! JSON scalars. A fixed dictionary maps the well-known statistic names
//! defined by the MiniZinc documentation to their declared types; anything
//! else is coerced speculatively: int first, then float, then raw string.

use std::time::Duration;

use serde::Serialize;

/// A single typed statistic value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StatValue {
    Int(i64),
    Float(f64),
    Str(String),
    /// Timing statistic, microsecond precision.
    Duration(Duration),
}

impl StatValue {
    /// Renders the value the way the solver would print it.
    pub fn render(&self) -> String {
        match self {
            StatValue::Int(v) => v.to_string(),
            StatValue::Float(v) => v.to_string(),
            StatValue::Str(v) => v.clone(),
            StatValue::Duration(v) => format!("{}", v.as_secs_f64()),
        }
    }

    /// Returns the integer value, if this statistic is an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            StatValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the float value, if this statistic is a float.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            StatValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the duration, if this statistic is a timing value.
    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            StatValue::Duration(v) => Some(*v),
            _ => None,
        }
    }
}

/// Declared type of a well-known statistic name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatType {
    Int,
    Float,
    Str,
    Duration,
}

/// Type dictionary for the statistic names standardized by MiniZinc.
fn well_known_type(name: &str) -> Option<StatType> {
    let tt = match name {
        // Search statistics
        "nodes" | "failures" | "restarts" | "variables" | "intVariables"
        | "boolVariables" | "floatVariables" | "setVariables" | "propagators"
        | "propagations" | "peakDepth" | "nogoods" | "backjumps" => StatType::Int,
        // Peak memory (in Mbytes)
        "peakMem" => StatType::Float,
        // Timing statistics
        "initTime" | "solveTime" | "flatTime" => StatType::Duration,
        // Flattening statistics
        "paths" | "flatBoolVars" | "flatFloatVars" | "flatIntVars" | "flatSetVars"
        | "flatBoolConstraints" | "flatFloatConstraints" | "flatIntConstraints"
        | "flatSetConstraints" | "evaluatedReifiedConstraints"
        | "evaluatedHalfReifiedConstraints" | "eliminatedImplications"
        | "eliminatedLinearConstraints" => StatType::Int,
        // Optimisation method in the flat model
        "method" => StatType::Str,
        _ => return None,
    };
    Some(tt)
}

fn parse_duration_secs(value: &str) -> Option<Duration> {
    let secs: f64 = value.parse().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Some(Duration::from_micros((secs * 1_000_000.0).round() as u64))
}

/// Insertion-ordered mapping from statistic name to typed value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Statistics {
    entries: Vec<(String, StatValue)>,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a statistic by name.
    pub fn get(&self, name: &str) -> Option<&StatValue> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    /// Inserts or replaces a typed value, keeping first-insertion order.
    pub fn insert(&mut self, name: impl Into<String>, value: StatValue) {
        let name = name.into();
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == name) {
            slot.1 = value;
        } else {
            self.entries.push((name, value));
        }
    }

    /// Sets a statistic from its raw textual value, coercing by name.
    ///
    /// Values from the well-known dictionary get their declared type. Names
    /// containing `time` with no declared type are treated as durations in
    /// fractional seconds. Unknown names try int, then float, then keep the
    /// raw string.
    pub fn set_raw(&mut self, name: &str, value: &str) {
        let value = value.trim().trim_matches('"');
        let tt = well_known_type(name);
        let looks_like_time = tt.is_none() && (name.contains("time") || name.contains("Time"));

        let parsed = match tt {
            Some(StatType::Duration) => parse_duration_secs(value)
                .map(StatValue::Duration)
                .unwrap_or_else(|| StatValue::Str(value.to_string())),
            _ if looks_like_time => parse_duration_secs(value)
                .map(StatValue::Duration)
                .unwrap_or_else(|| StatValue::Str(value.to_string())),
            Some(StatType::Int) => value
                .parse::<i64>()
                .map(StatValue::Int)
                .unwrap_or_else(|_| StatValue::Str(value.to_string())),
            Some(StatType::Float) => value
                .parse::<f64>()
                .map(StatValue::Float)
                .unwrap_or_else(|_| StatValue::Str(value.to_string())),
            Some(StatType::Str) => StatValue::Str(value.to_string()),
            None => {
                if let Ok(i) = value.parse::<i64>() {
                    StatValue::Int(i)
                } else if let Ok(f) = value.parse::<f64>() {
                    StatValue::Float(f)
                } else {
                    StatValue::Str(value.to_string())
                }
            }
        };
        self.insert(name, parsed);
    }

    /// Merges `other` into `self`, later values replacing earlier ones.
    pub fn extend(&mut self, other: &Statistics) {
        for (name, value) in &other.entries {
            self.insert(name.clone(), value.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StatValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Collects statistic messages between yielded results.
///
/// Deltas and time markers merge into a pending map; [`take`] hands the
/// pending map to exactly one result and clears the buffer, so a statistic
/// is never attributed to two results.
///
/// [`take`]: StatisticsAccumulator::take
#[derive(Debug, Default)]
pub struct StatisticsAccumulator {
    pending: Statistics,
}

impl StatisticsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges one raw key/value delta.
    pub fn observe(&mut self, name: &str, value: &str) {
        self.pending.set_raw(name, value);
    }

    /// Records a time marker, stored under the `time` key.
    pub fn observe_time(&mut self, milliseconds: i64) {
        self.pending.insert(
            "time",
            StatValue::Duration(Duration::from_millis(milliseconds.max(0) as u64)),
        );
    }

    /// Whether any statistics are waiting to be flushed.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Takes the pending statistics, leaving the buffer empty.
    pub fn take(&mut self) -> Statistics {
        std::mem::take(&mut self.pending)
    }
}
