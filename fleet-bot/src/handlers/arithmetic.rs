//! Built-in arithmetic operations
//!
//! Both expect a payload of the form `{"a": <number>, "b": <number>}`.
//! Integers stay integers (overflow is an error); any float operand makes
//! the result a float.

use async_trait::async_trait;
use serde_json::{Number, Value, json};

use super::{JobError, JobHandler};

/// `sum`: a + b
pub struct SumHandler;

/// `subtract`: a - b
pub struct SubtractHandler;

#[async_trait]
impl JobHandler for SumHandler {
    async fn execute(&self, payload: &Value) -> Result<Value, JobError> {
        let (a, b) = operands(payload)?;
        combine(&a, &b, i64::checked_add, |x, y| x + y, "sum")
    }
}

#[async_trait]
impl JobHandler for SubtractHandler {
    async fn execute(&self, payload: &Value) -> Result<Value, JobError> {
        let (a, b) = operands(payload)?;
        combine(&a, &b, i64::checked_sub, |x, y| x - y, "subtract")
    }
}

fn operands(payload: &Value) -> Result<(Number, Number), JobError> {
    Ok((operand(payload, "a")?, operand(payload, "b")?))
}

fn operand(payload: &Value, key: &str) -> Result<Number, JobError> {
    match payload.get(key) {
        Some(Value::Number(n)) => Ok(n.clone()),
        Some(other) => Err(JobError::InvalidPayload(format!(
            "'{}' must be a number, got {}",
            key, other
        ))),
        None => Err(JobError::InvalidPayload(format!("missing '{}'", key))),
    }
}

fn combine(
    a: &Number,
    b: &Number,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
    name: &str,
) -> Result<Value, JobError> {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return int_op(x, y)
            .map(|r| json!(r))
            .ok_or_else(|| JobError::InvalidPayload(format!("{} overflows i64", name)));
    }

    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => Number::from_f64(float_op(x, y))
            .map(Value::Number)
            .ok_or_else(|| JobError::InvalidPayload(format!("{} is not finite", name))),
        _ => Err(JobError::InvalidPayload(format!(
            "{} operands are not representable",
            name
        ))),
    }
}
