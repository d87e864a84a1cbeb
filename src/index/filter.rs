//! Metadata scalar values and post-retrieval candidate filters.

use serde::{Deserialize, Serialize};

use crate::error::{LexikaError, Result};

/// Scalar metadata attached to indexed items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl MetadataValue {
    /// Numeric view for range comparisons. Strings and bools have none.
    fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Bool(_) | Self::Str(_) => None,
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Comparison operator for a metadata filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Contains,
}

/// A single metadata predicate: `field <op> value`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: FilterValue,
}

/// Filter operand: a scalar, or a list for `in`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Scalar(MetadataValue),
    List(Vec<MetadataValue>),
}

impl Filter {
    #[must_use]
    pub fn new(field: impl Into<String>, op: FilterOp, value: FilterValue) -> Self {
        Self {
            field: field.into(),
            op,
            value,
        }
    }

    #[must_use]
    pub fn eq(field: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        Self::new(field, FilterOp::Eq, FilterValue::Scalar(value.into()))
    }

    /// Reject operator/operand combinations that can never evaluate.
    pub fn validate(&self) -> Result<()> {
        match (self.op, &self.value) {
            (FilterOp::In, FilterValue::List(_)) => Ok(()),
            (FilterOp::In, FilterValue::Scalar(_)) => Err(LexikaError::InvalidQuery(format!(
                "filter on {}: 'in' requires a list operand",
                self.field
            ))),
            (_, FilterValue::List(_)) => Err(LexikaError::InvalidQuery(format!(
                "filter on {}: list operand only valid with 'in'",
                self.field
            ))),
            (_, FilterValue::Scalar(_)) => Ok(()),
        }
    }

    /// Evaluate against one item's metadata. A missing field never matches.
    #[must_use]
    pub fn matches(&self, metadata: &std::collections::HashMap<String, MetadataValue>) -> bool {
        let Some(actual) = metadata.get(&self.field) else {
            return false;
        };

        match (&self.value, self.op) {
            (FilterValue::Scalar(expected), FilterOp::Eq) => actual == expected,
            (FilterValue::Scalar(expected), FilterOp::Ne) => actual != expected,
            (FilterValue::Scalar(expected), FilterOp::Gt) => {
                compare(actual, expected).is_some_and(|ord| ord == std::cmp::Ordering::Greater)
            }
            (FilterValue::Scalar(expected), FilterOp::Gte) => {
                compare(actual, expected).is_some_and(std::cmp::Ordering::is_ge)
            }
            (FilterValue::Scalar(expected), FilterOp::Lt) => {
                compare(actual, expected).is_some_and(|ord| ord == std::cmp::Ordering::Less)
            }
            (FilterValue::Scalar(expected), FilterOp::Lte) => {
                compare(actual, expected).is_some_and(std::cmp::Ordering::is_le)
            }
            (FilterValue::Scalar(expected), FilterOp::Contains) => {
                match (actual, expected) {
                    (MetadataValue::Str(haystack), MetadataValue::Str(needle)) => {
                        haystack.contains(needle.as_str())
                    }
                    _ => false,
                }
            }
            (FilterValue::List(options), FilterOp::In) => options.contains(actual),
            // validate() rejects the remaining combinations up front.
            _ => false,
        }
    }
}

fn compare(actual: &MetadataValue, expected: &MetadataValue) -> Option<std::cmp::Ordering> {
    match (actual, expected) {
        (MetadataValue::Str(a), MetadataValue::Str(b)) => Some(a.cmp(b)),
        _ => actual.as_f64()?.partial_cmp(&expected.as_f64()?),
    }
}
