use super::{DynNotifier, Notifier, NotifierRegistry};
use crate::error::{Result, TachError};
use crate::value::{Measurement, Params};
use tracing::debug;

/// Logs every message and its raw value before handing it to the driver
/// named by the `real_driver` option.
pub struct DebugNotifier {
    name: String,
    inner: DynNotifier,
}

impl DebugNotifier {
    pub fn new(name: impl Into<String>, inner: DynNotifier) -> Self {
        Self {
            name: name.into(),
            inner,
        }
    }

    pub fn from_params(registry: &NotifierRegistry, params: &Params) -> Result<Self> {
        let name = params.get("real_driver").ok_or_else(|| TachError::Driver {
            name: "debug".to_string(),
            reason: "missing 'real_driver' option".to_string(),
        })?;

        let mut inner_params = params.clone();
        inner_params.remove("real_driver");
        let inner = registry.build(name, &inner_params)?;

        Ok(Self::new(name.clone(), inner))
    }

    pub fn driver_name(&self) -> &str {
        &self.name
    }
}

impl Notifier for DebugNotifier {
    fn format(&self, measurement: &Measurement, label: &str) -> Option<String> {
        self.inner.format(measurement, label)
    }

    fn send(&self, body: &str) {
        self.inner.send(body);
    }

    fn deliver(&self, measurement: &Measurement, label: &str) {
        let body = self.inner.format(measurement, label);

        debug!(driver = %self.name, body = ?body, "DebugNotifier: Notifying driver of message");
        debug!(
            kind = %measurement.kind,
            value = %measurement.value,
            "DebugNotifier: Raw value"
        );
        debug!(label, "DebugNotifier: Statistic label");

        if let Some(body) = body {
            self.inner.send(&body);
        }
    }

    fn reset(&self) {
        self.inner.reset();
    }
}
