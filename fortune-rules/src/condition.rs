use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::context::UserContext;

/// Comparison applied by a [`RuleCondition`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum ConditionOperator {
    Equals,
    Contains,
    Between,
    GreaterThan,
    LessThan,
    /// Any operator this engine does not know. Never matches.
    #[default]
    #[serde(other)]
    Unsupported,
}

impl ConditionOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionOperator::Equals => "equals",
            ConditionOperator::Contains => "contains",
            ConditionOperator::Between => "between",
            ConditionOperator::GreaterThan => "greaterThan",
            ConditionOperator::LessThan => "lessThan",
            ConditionOperator::Unsupported => "unsupported",
        }
    }
}

impl fmt::Display for ConditionOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operand of a condition. The accepted shape depends on the operator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ConditionValue {
    Number(f64),
    Text(String),
    Range(Vec<String>),
    /// Anything else. Kept so that a malformed rule still loads and fails closed.
    Other(Value),
}

impl Default for ConditionValue {
    fn default() -> Self {
        ConditionValue::Other(Value::Null)
    }
}

impl ConditionValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ConditionValue::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Numeric view of the operand. Numeric strings are accepted.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ConditionValue::Number(number) => Some(*number),
            ConditionValue::Text(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    /// `[start, end]` bounds, only when exactly two entries are present.
    pub fn as_range(&self) -> Option<(&str, &str)> {
        match self {
            ConditionValue::Range(bounds) if bounds.len() == 2 => {
                Some((bounds[0].as_str(), bounds[1].as_str()))
            }
            _ => None,
        }
    }
}

impl From<&str> for ConditionValue {
    fn from(value: &str) -> Self {
        ConditionValue::Text(value.to_string())
    }
}

impl From<f64> for ConditionValue {
    fn from(value: f64) -> Self {
        ConditionValue::Number(value)
    }
}

impl From<u32> for ConditionValue {
    fn from(value: u32) -> Self {
        ConditionValue::Number(f64::from(value))
    }
}

impl From<[&str; 2]> for ConditionValue {
    fn from([start, end]: [&str; 2]) -> Self {
        ConditionValue::Range(vec![start.to_string(), end.to_string()])
    }
}

/// A single predicate over one attribute of the [`UserContext`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RuleCondition {
    /// Compares the `HH:MM` clock of the request.
    Time {
        #[serde(default)]
        operator: ConditionOperator,
        #[serde(default)]
        value: ConditionValue,
    },
    /// Case-insensitive comparison against the weather label.
    Weather {
        #[serde(default)]
        operator: ConditionOperator,
        #[serde(default)]
        value: ConditionValue,
    },
    /// Case-insensitive comparison against the place name.
    Location {
        #[serde(default)]
        operator: ConditionOperator,
        #[serde(default)]
        value: ConditionValue,
    },
    /// Numeric comparison against the prior scan count.
    ScanCount {
        #[serde(default)]
        operator: ConditionOperator,
        #[serde(default)]
        value: ConditionValue,
    },
    /// Always matches; lets evaluation proceed past the rule once it fires.
    Continue,
    /// Unrecognised condition type. Matches, so newer rule documents keep working
    /// on older engines; rejecting them is the admin layer's job.
    #[serde(other)]
    Unknown,
}

impl RuleCondition {
    pub fn time(operator: ConditionOperator, value: impl Into<ConditionValue>) -> Self {
        RuleCondition::Time {
            operator,
            value: value.into(),
        }
    }

    pub fn weather(operator: ConditionOperator, value: impl Into<ConditionValue>) -> Self {
        RuleCondition::Weather {
            operator,
            value: value.into(),
        }
    }

    pub fn location(operator: ConditionOperator, value: impl Into<ConditionValue>) -> Self {
        RuleCondition::Location {
            operator,
            value: value.into(),
        }
    }

    pub fn scan_count(operator: ConditionOperator, value: impl Into<ConditionValue>) -> Self {
        RuleCondition::ScanCount {
            operator,
            value: value.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RuleCondition::Time { .. } => "time",
            RuleCondition::Weather { .. } => "weather",
            RuleCondition::Location { .. } => "location",
            RuleCondition::ScanCount { .. } => "scanCount",
            RuleCondition::Continue => "continue",
            RuleCondition::Unknown => "unknown",
        }
    }

    pub fn is_continue(&self) -> bool {
        matches!(self, RuleCondition::Continue)
    }

    /// Whether the condition holds for `ctx`. Malformed operands never match.
    pub fn matches(&self, ctx: &UserContext) -> bool {
        match self {
            RuleCondition::Time { operator, value } => match_clock(*operator, value, &ctx.clock()),
            RuleCondition::Weather { operator, value } => {
                match_text(*operator, value, &ctx.weather)
            }
            RuleCondition::Location { operator, value } => {
                match_text(*operator, value, &ctx.location)
            }
            RuleCondition::ScanCount { operator, value } => {
                match_count(*operator, value, ctx.scan_count())
            }
            RuleCondition::Continue => true,
            RuleCondition::Unknown => true,
        }
    }

    /// Checks operator legality and operand shape for the condition type.
    pub fn validate(&self) -> Result<(), ConditionIssue> {
        let kind = self.kind();
        match self {
            RuleCondition::Time { operator, value } => match operator {
                ConditionOperator::Equals => value
                    .as_text()
                    .filter(|text| is_clock(text))
                    .map(|_| ())
                    .ok_or(ConditionIssue::MalformedValue {
                        kind,
                        expected: "an HH:MM string",
                    }),
                ConditionOperator::Between => value
                    .as_range()
                    .filter(|(start, end)| is_clock(start) && is_clock(end))
                    .map(|_| ())
                    .ok_or(ConditionIssue::MalformedValue {
                        kind,
                        expected: "a pair of HH:MM strings",
                    }),
                other => Err(ConditionIssue::UnsupportedOperator {
                    kind,
                    operator: *other,
                }),
            },
            RuleCondition::Weather { operator, value }
            | RuleCondition::Location { operator, value } => match operator {
                ConditionOperator::Equals | ConditionOperator::Contains => value
                    .as_text()
                    .map(|_| ())
                    .ok_or(ConditionIssue::MalformedValue {
                        kind,
                        expected: "a string",
                    }),
                other => Err(ConditionIssue::UnsupportedOperator {
                    kind,
                    operator: *other,
                }),
            },
            RuleCondition::ScanCount { operator, value } => match operator {
                ConditionOperator::Equals
                | ConditionOperator::GreaterThan
                | ConditionOperator::LessThan => value
                    .as_number()
                    .filter(|number| number.is_finite())
                    .map(|_| ())
                    .ok_or(ConditionIssue::MalformedValue {
                        kind,
                        expected: "a number",
                    }),
                other => Err(ConditionIssue::UnsupportedOperator {
                    kind,
                    operator: *other,
                }),
            },
            RuleCondition::Continue => Ok(()),
            RuleCondition::Unknown => Err(ConditionIssue::UnknownType),
        }
    }
}

/// Configuration problem found while validating a condition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConditionIssue {
    #[error("operator `{operator}` is not supported for `{kind}` conditions")]
    UnsupportedOperator {
        kind: &'static str,
        operator: ConditionOperator,
    },
    #[error("`{kind}` condition expects {expected}")]
    MalformedValue {
        kind: &'static str,
        expected: &'static str,
    },
    #[error("unrecognised condition type; it will always match")]
    UnknownType,
}

// Lexicographic comparison is sound because both sides are fixed-width HH:MM.
fn match_clock(operator: ConditionOperator, value: &ConditionValue, clock: &str) -> bool {
    match operator {
        ConditionOperator::Equals => value.as_text().map(|text| text == clock).unwrap_or(false),
        ConditionOperator::Between => value
            .as_range()
            .map(|(start, end)| start <= clock && clock <= end)
            .unwrap_or(false),
        _ => false,
    }
}

fn match_text(operator: ConditionOperator, value: &ConditionValue, actual: &str) -> bool {
    let Some(expected) = value.as_text() else {
        return false;
    };
    let expected = expected.to_lowercase();
    let actual = actual.to_lowercase();
    match operator {
        ConditionOperator::Equals => actual == expected,
        ConditionOperator::Contains => actual.contains(&expected),
        _ => false,
    }
}

fn match_count(operator: ConditionOperator, value: &ConditionValue, count: u32) -> bool {
    let Some(expected) = value.as_number() else {
        return false;
    };
    let count = f64::from(count);
    match operator {
        ConditionOperator::Equals => (count - expected).abs() < f64::EPSILON,
        ConditionOperator::GreaterThan => count > expected,
        ConditionOperator::LessThan => count < expected,
        _ => false,
    }
}

fn is_clock(text: &str) -> bool {
    let bytes = text.as_bytes();
    if bytes.len() != 5 || bytes[2] != b':' {
        return false;
    }
    let digits = |range: std::ops::Range<usize>| bytes[range].iter().all(u8::is_ascii_digit);
    if !digits(0..2) || !digits(3..5) {
        return false;
    }
    &text[0..2] <= "23" && &text[3..5] <= "59"
}
