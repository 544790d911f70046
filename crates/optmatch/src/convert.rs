//! Conversion of raw tokens into typed values, and value validators.
//!
//! Everything here is pure: no matcher state is involved, so conversions and
//! validators can be exercised on their own.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// A converted argument value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Floats, and integers widened to `f64`.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

/// The declared type of a key or positional value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValueKind {
    #[default]
    String,
    Integer,
    Float,
    Boolean,
    /// A string restricted to an enumerated set.
    OneOf(Vec<String>),
}

impl ValueKind {
    fn describe(&self) -> String {
        match self {
            Self::String => "a string".to_string(),
            Self::Integer => "an integer".to_string(),
            Self::Float => "a number".to_string(),
            Self::Boolean => "a boolean".to_string(),
            Self::OneOf(allowed) => format!("one of: {}", allowed.join(", ")),
        }
    }

    /// Convert a raw token into a value of this kind.
    pub fn convert(&self, raw: &str) -> Result<Value, ConversionError> {
        let fail = || ConversionError {
            expected: self.describe(),
            value: raw.to_string(),
        };
        match self {
            Self::String => Ok(Value::Str(raw.to_string())),
            Self::Integer => raw.parse::<i64>().map(Value::Int).map_err(|_| fail()),
            Self::Float => raw.parse::<f64>().map(Value::Float).map_err(|_| fail()),
            Self::Boolean => match raw.to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Ok(Value::Bool(true)),
                "false" | "no" | "0" => Ok(Value::Bool(false)),
                _ => Err(fail()),
            },
            Self::OneOf(allowed) => {
                if allowed.iter().any(|a| a == raw) {
                    Ok(Value::Str(raw.to_string()))
                } else {
                    Err(fail())
                }
            }
        }
    }
}

/// A raw token could not be converted to the declared kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected {expected}, got '{value}'")]
pub struct ConversionError {
    pub expected: String,
    pub value: String,
}

/// A converted value was rejected by a validator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
}

impl ValidationError {
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Why a raw value was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error(transparent)]
    Conversion(#[from] ConversionError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

type Check = dyn Fn(&Value) -> bool + Send + Sync;

/// A predicate over a converted value plus the message reported on failure.
#[derive(Clone)]
pub struct Validator {
    message: String,
    check: Arc<Check>,
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator")
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

impl Validator {
    pub fn new<F>(message: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Self {
            message: message.into(),
            check: Arc::new(check),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn check(&self, value: &Value) -> Result<(), ValidationError> {
        if (self.check)(value) {
            Ok(())
        } else {
            Err(ValidationError {
                message: self.message.clone(),
            })
        }
    }

    /// Numeric values strictly greater than `bound`.
    pub fn greater_than(bound: i64) -> Self {
        Self::new(format!("must be greater than {bound}"), move |v| {
            v.as_float().is_some_and(|x| x > bound as f64)
        })
    }

    /// Numeric values strictly less than `bound`.
    pub fn less_than(bound: i64) -> Self {
        Self::new(format!("must be less than {bound}"), move |v| {
            v.as_float().is_some_and(|x| x < bound as f64)
        })
    }

    pub fn one_of<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let allowed: Vec<String> = allowed.into_iter().map(Into::into).collect();
        let message = format!("must be one of: {}", allowed.join(", "));
        Self::new(message, move |v| {
            let v = v.to_string();
            allowed.iter().any(|a| *a == v)
        })
    }

    pub fn not_one_of<I, S>(denied: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let denied: Vec<String> = denied.into_iter().map(Into::into).collect();
        let message = format!("must not be: {}", denied.join(", "));
        Self::new(message, move |v| {
            let v = v.to_string();
            !denied.iter().any(|d| *d == v)
        })
    }
}

/// Run `validators` in order, stopping at the first failure.
pub fn validate_all(validators: &[Validator], value: &Value) -> Result<(), ValidationError> {
    validators.iter().try_for_each(|v| v.check(value))
}

/// Value kind plus validators: the full conversion pipeline for one declaration.
#[derive(Debug, Clone, Default)]
pub struct ValueSpec {
    kind: ValueKind,
    validators: Vec<Validator>,
}

impl ValueSpec {
    pub fn new(kind: ValueKind) -> Self {
        Self {
            kind,
            validators: Vec::new(),
        }
    }

    pub fn validator(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn kind(&self) -> &ValueKind {
        &self.kind
    }

    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    /// Convert `raw`, then validate the result.
    pub fn parse(&self, raw: &str) -> Result<Value, ValueError> {
        let value = self.kind.convert(raw)?;
        validate_all(&self.validators, &value)?;
        Ok(value)
    }
}

impl From<ValueKind> for ValueSpec {
    fn from(kind: ValueKind) -> Self {
        Self::new(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_declared_kinds() {
        assert_eq!(ValueKind::Integer.convert("7"), Ok(Value::Int(7)));
        assert_eq!(ValueKind::Float.convert("2.5"), Ok(Value::Float(2.5)));
        assert_eq!(ValueKind::Boolean.convert("Yes"), Ok(Value::Bool(true)));
        assert_eq!(ValueKind::Boolean.convert("0"), Ok(Value::Bool(false)));
        assert_eq!(
            ValueKind::String.convert("-"),
            Ok(Value::Str("-".to_string()))
        );
    }

    #[test]
    fn conversion_failure_names_the_expected_kind() {
        let err = ValueKind::Integer.convert("val").unwrap_err();
        assert_eq!(err.value, "val");
        assert_eq!(err.to_string(), "expected an integer, got 'val'");

        let kind = ValueKind::OneOf(vec!["json".to_string(), "plain".to_string()]);
        assert!(kind.convert("json").is_ok());
        let err = kind.convert("xml").unwrap_err();
        assert!(err.to_string().contains("one of: json, plain"));
    }

    #[test]
    fn stock_validator_messages() {
        assert_eq!(Validator::greater_than(18).message(), "must be greater than 18");
        assert_eq!(Validator::less_than(3).message(), "must be less than 3");
        assert_eq!(
            Validator::one_of(["Thanksgiving", "Halloween"]).message(),
            "must be one of: Thanksgiving, Halloween"
        );
        assert_eq!(
            Validator::not_one_of(["Chicago", "Boston"]).message(),
            "must not be: Chicago, Boston"
        );
    }

    #[test]
    fn greater_than_checks_numbers() {
        let v = Validator::greater_than(18);
        assert!(v.check(&Value::Int(19)).is_ok());
        assert!(v.check(&Value::Int(18)).is_err());
        assert!(v.check(&Value::Float(18.5)).is_ok());
        assert!(v.check(&Value::Str("19".to_string())).is_err());
    }

    #[test]
    fn first_failing_validator_wins() {
        let validators = [
            Validator::greater_than(0),
            Validator::less_than(10),
            Validator::new("never reached", |_| false),
        ];
        let err = validate_all(&validators, &Value::Int(12)).unwrap_err();
        assert_eq!(err.message(), "must be less than 10");
        let err = validate_all(&validators, &Value::Int(5)).unwrap_err();
        assert_eq!(err.message(), "never reached");
    }

    #[test]
    fn spec_runs_conversion_before_validation() {
        let spec = ValueSpec::new(ValueKind::Integer).validator(Validator::greater_than(18));
        assert!(matches!(spec.parse("x"), Err(ValueError::Conversion(_))));
        assert!(matches!(spec.parse("15"), Err(ValueError::Validation(_))));
        assert_eq!(spec.parse("19"), Ok(Value::Int(19)));
    }

    #[test]
    fn values_serialize_untagged() {
        let json = serde_json::to_string(&[
            Value::Bool(true),
            Value::Int(3),
            Value::Str("x".to_string()),
        ])
        .unwrap();
        assert_eq!(json, r#"[true,3,"x"]"#);
    }
}
