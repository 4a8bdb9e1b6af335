//! Metric Record - one line of the append-only metric ledger

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Named metric values of a single record.
pub type Fields = BTreeMap<String, Value>;

const NAN: &str = "NaN";
const POS_INF: &str = "inf";
const NEG_INF: &str = "-inf";

/// A value that can be logged as a metric field.
///
/// JSON has no encoding for non-finite floats, so `NaN`, `inf` and `-inf`
/// are stored as the strings `"NaN"`, `"inf"` and `"-inf"`.
/// [`MetricRecord::scalar`] decodes them back.
pub trait MetricValue {
    /// Convert into the ledger representation.
    fn into_value(self) -> Value;
}

impl MetricValue for f64 {
    fn into_value(self) -> Value {
        if self.is_nan() {
            Value::from(NAN)
        } else if self.is_infinite() {
            Value::from(if self.is_sign_positive() { POS_INF } else { NEG_INF })
        } else {
            Value::from(self)
        }
    }
}

impl MetricValue for f32 {
    fn into_value(self) -> Value {
        f64::from(self).into_value()
    }
}

macro_rules! metric_value_via_into {
    ($($ty:ty),* $(,)?) => {
        $(
            impl MetricValue for $ty {
                fn into_value(self) -> Value {
                    Value::from(self)
                }
            }
        )*
    };
}

metric_value_via_into!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, bool, String, &str, Value);

fn decode_scalar(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => match s.as_str() {
            NAN => Some(f64::NAN),
            POS_INF => Some(f64::INFINITY),
            NEG_INF => Some(f64::NEG_INFINITY),
            _ => None,
        },
        other => other.as_f64(),
    }
}

/// Metric Record represents the metrics logged at one iteration.
///
/// A record carries any number of named fields. Values are JSON, so
/// scalars (`loss`, `accuracy`) and structured values (a confusion
/// matrix, a histogram) share one ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricRecord {
    iteration: u64,
    fields: Fields,
    timestamp: DateTime<Utc>,
}

impl MetricRecord {
    /// Create a new metric record stamped with the current time.
    ///
    /// # Arguments
    ///
    /// * `iteration` - Training step or epoch number
    /// * `fields` - Metric name → value pairs
    #[must_use]
    pub fn new(iteration: u64, fields: Fields) -> Self {
        Self {
            iteration,
            fields,
            timestamp: Utc::now(),
        }
    }

    /// Create a builder for constructing a metric record field by field.
    #[must_use]
    pub fn builder(iteration: u64) -> MetricRecordBuilder {
        MetricRecordBuilder::new(iteration)
    }

    /// Get the iteration number.
    #[must_use]
    pub const fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Get all fields.
    #[must_use]
    pub const fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Get a single field value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Get a field as `f64`, if present and numeric.
    ///
    /// The strings `"NaN"`, `"inf"` and `"-inf"` decode to the matching
    /// non-finite value.
    #[must_use]
    pub fn scalar(&self, name: &str) -> Option<f64> {
        self.fields.get(name).and_then(decode_scalar)
    }

    /// Get the timestamp when the metric was recorded.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Builder for `MetricRecord`.
#[derive(Debug)]
pub struct MetricRecordBuilder {
    iteration: u64,
    fields: Fields,
    timestamp: DateTime<Utc>,
}

impl MetricRecordBuilder {
    /// Create a new builder with no fields.
    #[must_use]
    pub fn new(iteration: u64) -> Self {
        Self {
            iteration,
            fields: Fields::new(),
            timestamp: Utc::now(),
        }
    }

    /// Add a field.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: impl MetricValue) -> Self {
        self.fields.insert(name.into(), value.into_value());
        self
    }

    /// Set a custom timestamp.
    #[must_use]
    pub const fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Build the `MetricRecord`.
    #[must_use]
    pub fn build(self) -> MetricRecord {
        MetricRecord {
            iteration: self.iteration,
            fields: self.fields,
            timestamp: self.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_record_builder() {
        let metric = MetricRecord::builder(3)
            .field("loss", 0.5)
            .field("phase", "train")
            .build();
        assert_eq!(metric.iteration(), 3);
        assert!((metric.scalar("loss").unwrap() - 0.5).abs() < f64::EPSILON);
        assert_eq!(metric.get("phase"), Some(&Value::from("train")));
        assert!(metric.scalar("phase").is_none());
    }

    #[test]
    fn test_metric_record_json_line() {
        let metric = MetricRecord::builder(1).field("acc", 0.9).build();
        let line = serde_json::to_string(&metric).unwrap();
        assert!(!line.contains('\n'));
        let back: MetricRecord = serde_json::from_str(&line).unwrap();
        assert_eq!(back, metric);
    }

    #[test]
    fn test_non_finite_values_survive_json() {
        let metric = MetricRecord::builder(0)
            .field("loss", f64::NAN)
            .field("grad_norm", f64::INFINITY)
            .field("log_prob", f32::NEG_INFINITY)
            .build();
        let line = serde_json::to_string(&metric).unwrap();
        let back: MetricRecord = serde_json::from_str(&line).unwrap();

        assert!(back.scalar("loss").unwrap().is_nan());
        assert_eq!(back.scalar("grad_norm"), Some(f64::INFINITY));
        assert_eq!(back.scalar("log_prob"), Some(f64::NEG_INFINITY));
        assert!(!back.fields().values().any(Value::is_null));
    }
}
