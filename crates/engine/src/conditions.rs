//! Condition evaluator: declarative fact-conditions, AND-combined.
//!
//! Evaluation never fails.  Unknown operators, missing facts and type
//! mismatches make the condition false; the reason is logged at `debug`.

use std::cmp::Ordering;
use std::str::FromStr;

use actions::template::lookup;
use db::models::FactCondition;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equal,
    NotEqual,
    GreaterThan,
    LessThan,
    GreaterThanInclusive,
    LessThanInclusive,
    In,
    NotIn,
    Contains,
    DoesNotContain,
}

impl FromStr for Operator {
    type Err = ConditionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "equal" => Ok(Self::Equal),
            "notEqual" => Ok(Self::NotEqual),
            "greaterThan" => Ok(Self::GreaterThan),
            "lessThan" => Ok(Self::LessThan),
            "greaterThanInclusive" => Ok(Self::GreaterThanInclusive),
            "lessThanInclusive" => Ok(Self::LessThanInclusive),
            "in" => Ok(Self::In),
            "notIn" => Ok(Self::NotIn),
            "contains" => Ok(Self::Contains),
            "doesNotContain" => Ok(Self::DoesNotContain),
            other => Err(ConditionError::UnknownOperator(other.to_owned())),
        }
    }
}

/// Why a single condition could not be evaluated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConditionError {
    #[error("unknown operator '{0}'")]
    UnknownOperator(String),

    #[error("fact '{0}' not present in event data")]
    MissingFact(String),

    #[error("operator {operator:?} cannot compare {fact} with {value}")]
    TypeMismatch {
        operator: Operator,
        fact: Value,
        value: Value,
    },
}

/// `true` iff every condition holds.  An empty list holds trivially.
pub fn evaluate(conditions: &[FactCondition], data: &Value) -> bool {
    conditions.iter().all(|condition| match evaluate_one(condition, data) {
        Ok(result) => result,
        Err(e) => {
            debug!(fact = %condition.fact, operator = %condition.operator, "condition is false: {e}");
            false
        }
    })
}

/// Evaluate a single condition, reporting why it could not be decided.
pub fn evaluate_one(condition: &FactCondition, data: &Value) -> Result<bool, ConditionError> {
    let operator: Operator = condition.operator.parse()?;
    let fact = lookup(data, &condition.fact)
        .ok_or_else(|| ConditionError::MissingFact(condition.fact.clone()))?;
    let expected = &condition.value;

    let mismatch = || ConditionError::TypeMismatch {
        operator,
        fact: fact.clone(),
        value: expected.clone(),
    };

    match operator {
        Operator::Equal => Ok(loosely_equal(fact, expected)),
        Operator::NotEqual => Ok(!loosely_equal(fact, expected)),
        Operator::GreaterThan => compare(fact, expected).map(Ordering::is_gt).ok_or_else(mismatch),
        Operator::LessThan => compare(fact, expected).map(Ordering::is_lt).ok_or_else(mismatch),
        Operator::GreaterThanInclusive => compare(fact, expected).map(Ordering::is_ge).ok_or_else(mismatch),
        Operator::LessThanInclusive => compare(fact, expected).map(Ordering::is_le).ok_or_else(mismatch),
        Operator::In => member_of(fact, expected).ok_or_else(mismatch),
        Operator::NotIn => member_of(fact, expected).map(|m| !m).ok_or_else(mismatch),
        Operator::Contains => contains(fact, expected).ok_or_else(mismatch),
        Operator::DoesNotContain => contains(fact, expected).map(|c| !c).ok_or_else(mismatch),
    }
}

/// JSON equality, except that numbers compare by value (`1 == 1.0`).
fn loosely_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Numeric ordering.  Numeric strings (`"1500"`) are accepted on either side.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    as_number(a)?.partial_cmp(&as_number(b)?)
}

fn as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

fn member_of(fact: &Value, candidates: &Value) -> Option<bool> {
    let items = candidates.as_array()?;
    Some(items.iter().any(|item| loosely_equal(fact, item)))
}

fn contains(fact: &Value, needle: &Value) -> Option<bool> {
    match (fact, needle) {
        (Value::Array(items), _) => Some(items.iter().any(|item| loosely_equal(item, needle))),
        (Value::String(haystack), Value::String(needle)) => Some(haystack.contains(needle.as_str())),
        _ => None,
    }
}
