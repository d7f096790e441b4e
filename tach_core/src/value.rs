use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Free-form `key = value` options carried by bindings and notifiers.
pub type Params = BTreeMap<String, String>;

/// Discriminator used by notifiers to pick a formatter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    ExecTime,
    Increment,
    Custom(String),
}

impl ValueKind {
    pub fn as_str(&self) -> &str {
        match self {
            ValueKind::ExecTime => "exec_time",
            ValueKind::Increment => "increment",
            ValueKind::Custom(name) => name,
        }
    }
}

impl From<&str> for ValueKind {
    fn from(name: &str) -> Self {
        match name {
            "exec_time" => ValueKind::ExecTime,
            "increment" => ValueKind::Increment,
            other => ValueKind::Custom(other.to_string()),
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl MetricValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Integer(v) => Some(*v as f64),
            MetricValue::Float(v) => Some(*v),
            MetricValue::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Integer(v) => write!(f, "{}", v),
            MetricValue::Float(v) => f.write_str(&format_float(*v)),
            MetricValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for MetricValue {
    fn from(value: i64) -> Self {
        MetricValue::Integer(value)
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        MetricValue::Float(value)
    }
}

impl From<&str> for MetricValue {
    fn from(value: &str) -> Self {
        MetricValue::Text(value.to_string())
    }
}

impl From<String> for MetricValue {
    fn from(value: String) -> Self {
        MetricValue::Text(value)
    }
}

const SIGNIFICANT_DIGITS: i32 = 12;

/// Twelve significant digits with trailing zeros trimmed, so binary noise
/// such as `12345.678899999999` goes over the wire as `12345.6789`.
fn format_float(value: f64) -> String {
    if value == 0.0 || !value.is_finite() {
        return value.to_string();
    }

    let magnitude = value.abs().log10().floor() as i32;
    let decimals = (SIGNIFICANT_DIGITS - 1 - magnitude).max(0) as usize;
    let fixed = format!("{:.*}", decimals, value);
    if fixed.contains('.') {
        fixed.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        fixed
    }
}

/// A finished statistic, consumed by exactly one notifier call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub kind: ValueKind,
    pub value: MetricValue,
}

impl Measurement {
    pub fn new(kind: ValueKind, value: impl Into<MetricValue>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    pub fn exec_time(seconds: f64) -> Self {
        Self::new(ValueKind::ExecTime, seconds)
    }

    pub fn increment(delta: i64) -> Self {
        Self::new(ValueKind::Increment, delta)
    }
}
