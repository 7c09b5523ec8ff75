//! Reference range grammar and evaluation
//!
//! Recognized shapes, tried in this order (first match wins):
//!   1. `<min> - <max>`
//!   2. `>= <n>`
//!   3. `<= <n>`
//!   4. `> <n>`
//!   5. `< <n>`
//!
//! Anything else fails open: the value is reported in range together with a
//! `MalformedReferenceExpression` diagnostic. A trailing unit such as
//! `"4 - 10 g/dL"` is ignored.

use crate::diagnostic::Diagnostic;
use crate::field::ValueType;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "camelCase")]
pub enum ReferenceRange {
    Between { min: f64, max: f64 },
    AtLeast { bound: f64 },
    AtMost { bound: f64 },
    Above { bound: f64 },
    Below { bound: f64 },
}

type ShapeParser = fn(&str) -> Option<ReferenceRange>;

const SHAPES: [ShapeParser; 5] = [
    parse_between,
    parse_at_least,
    parse_at_most,
    parse_above,
    parse_below,
];

impl ReferenceRange {
    /// Parse a reference expression. `None` for empty or unrecognized text.
    pub fn parse(expression: &str) -> Option<Self> {
        let expression = expression.trim();
        if expression.is_empty() {
            return None;
        }
        SHAPES.iter().find_map(|parse| parse(expression))
    }

    pub fn contains(&self, value: f64) -> bool {
        match *self {
            ReferenceRange::Between { min, max } => min <= value && value <= max,
            ReferenceRange::AtLeast { bound } => value >= bound,
            ReferenceRange::AtMost { bound } => value <= bound,
            ReferenceRange::Above { bound } => value > bound,
            ReferenceRange::Below { bound } => value < bound,
        }
    }
}

/// Outcome of checking one value against a reference expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeCheck {
    pub in_range: bool,
    pub range: Option<ReferenceRange>,
    pub diagnostic: Option<Diagnostic>,
}

impl RangeCheck {
    fn pass() -> Self {
        Self {
            in_range: true,
            range: None,
            diagnostic: None,
        }
    }

    pub fn out_of_range(&self) -> bool {
        !self.in_range
    }
}

/// Evaluate `value` of a field typed `value_type` against `expression`.
///
/// Non-numeric field types and empty values are always in range. A numeric
/// field whose value is not a number is out of range.
pub fn evaluate(expression: &str, value_type: ValueType, value: &str) -> RangeCheck {
    if !value_type.is_numeric() {
        return RangeCheck::pass();
    }

    let value = value.trim();
    if value.is_empty() {
        return RangeCheck::pass();
    }

    let Some(number) = parse_numeric(value) else {
        return RangeCheck {
            in_range: false,
            range: None,
            diagnostic: Some(Diagnostic::unparseable_value(value)),
        };
    };

    if expression.trim().is_empty() {
        return RangeCheck::pass();
    }

    match ReferenceRange::parse(expression) {
        Some(range) => RangeCheck {
            in_range: range.contains(number),
            range: Some(range),
            diagnostic: None,
        },
        None => RangeCheck {
            diagnostic: Some(Diagnostic::malformed_reference(expression)),
            ..RangeCheck::pass()
        },
    }
}

/// Parse a complete numeric value (optionally signed decimal, nothing else)
pub fn parse_numeric(text: &str) -> Option<f64> {
    match scan_number(text.trim()) {
        Some((number, rest)) if rest.is_empty() => Some(number),
        _ => None,
    }
}

fn parse_between(expression: &str) -> Option<ReferenceRange> {
    let (min, rest) = scan_number(expression)?;
    let rest = rest.trim_start().strip_prefix('-')?;
    let (max, tail) = scan_number(rest.trim_start())?;
    is_unit_suffix(tail).then_some(ReferenceRange::Between { min, max })
}

fn parse_at_least(expression: &str) -> Option<ReferenceRange> {
    parse_comparison(expression, ">=").map(|bound| ReferenceRange::AtLeast { bound })
}

fn parse_at_most(expression: &str) -> Option<ReferenceRange> {
    parse_comparison(expression, "<=").map(|bound| ReferenceRange::AtMost { bound })
}

fn parse_above(expression: &str) -> Option<ReferenceRange> {
    parse_comparison(expression, ">").map(|bound| ReferenceRange::Above { bound })
}

fn parse_below(expression: &str) -> Option<ReferenceRange> {
    parse_comparison(expression, "<").map(|bound| ReferenceRange::Below { bound })
}

fn parse_comparison(expression: &str, operator: &str) -> Option<f64> {
    let rest = expression.strip_prefix(operator)?;
    let (bound, tail) = scan_number(rest.trim_start())?;
    is_unit_suffix(tail).then_some(bound)
}

/// Scan a leading `[+-]?digits[.digits]` number, returning it with the rest
fn scan_number(text: &str) -> Option<(f64, &str)> {
    let bytes = text.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        if frac_end > frac_start {
            digits += frac_end - frac_start;
            end = frac_end;
        }
    }

    if digits == 0 {
        return None;
    }
    let number = text[..end].parse::<f64>().ok()?;
    Some((number, &text[end..]))
}

/// Trailing text after the last number: nothing, or a unit label
fn is_unit_suffix(tail: &str) -> bool {
    match tail.trim_start().chars().next() {
        None => true,
        Some(c) => !(c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | '<' | '>' | '=')),
    }
}
