pub mod capture;
pub mod debug;
pub mod graphite;
pub mod print;
pub mod socket;
pub mod statsd;

use crate::error::{Result, TachError};
use crate::value::{Measurement, MetricValue, Params, ValueKind};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

pub use capture::CaptureNotifier;
pub use debug::DebugNotifier;
pub use print::PrintNotifier;
pub use socket::{Connection, Connector, Endpoint, NetConnector, SocketNotifier, Transport};

/// Renders one value + label into a message body. `None` means the value
/// cannot be expressed by this destination.
pub type Formatter = fn(&MetricValue, &str) -> Option<String>;

/// Kind-to-formatter lookup with an optional fallback.
#[derive(Debug, Clone, Default)]
pub struct FormatTable {
    by_kind: HashMap<String, Formatter>,
    fallback: Option<Formatter>,
}

impl FormatTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, kind: ValueKind, formatter: Formatter) -> Self {
        self.by_kind.insert(kind.as_str().to_string(), formatter);
        self
    }

    pub fn fallback(mut self, formatter: Formatter) -> Self {
        self.fallback = Some(formatter);
        self
    }

    pub fn supports(&self, kind: &ValueKind) -> bool {
        self.fallback.is_some() || self.by_kind.contains_key(kind.as_str())
    }

    pub fn format(&self, measurement: &Measurement, label: &str) -> Option<String> {
        let formatter = self
            .by_kind
            .get(measurement.kind.as_str())
            .or(self.fallback.as_ref())?;

        formatter(&measurement.value, label)
    }
}

/// Formats measured values and delivers them somewhere.
///
/// Delivery is best-effort: nothing here returns an error to the
/// instrumented caller.
#[cfg_attr(test, mockall::automock)]
pub trait Notifier: Send + Sync {
    /// Produce the destination-specific body, if this kind is supported
    fn format(&self, measurement: &Measurement, label: &str) -> Option<String>;

    /// Ship an already formatted body
    fn send(&self, body: &str);

    /// Format and send; kinds without a formatter are silently skipped
    fn deliver(&self, measurement: &Measurement, label: &str) {
        match self.format(measurement, label) {
            Some(body) => self.send(&body),
            None => trace!(kind = %measurement.kind, label, "No formatter for value kind"),
        }
    }

    /// Drop any cached connection so the next send reconnects
    fn reset(&self) {}
}

pub type DynNotifier = Arc<dyn Notifier>;

/// Resolves a notifier by name at call time, falling back to the default.
pub trait NotifierSource: Send + Sync {
    fn notifier(&self, name: Option<&str>) -> DynNotifier;
}

pub type DriverFactory =
    Arc<dyn Fn(&NotifierRegistry, &Params) -> Result<DynNotifier> + Send + Sync>;

#[derive(Default, Clone)]
pub struct NotifierRegistry {
    drivers: HashMap<String, DriverFactory>,
}

impl NotifierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&NotifierRegistry, &Params) -> Result<DynNotifier> + Send + Sync + 'static,
    {
        self.drivers.insert(name.into(), Arc::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.drivers.contains_key(name)
    }

    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.drivers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn build(&self, name: &str, params: &Params) -> Result<DynNotifier> {
        let factory = self.drivers.get(name).ok_or_else(|| TachError::Driver {
            name: name.to_string(),
            reason: "unknown notifier driver".to_string(),
        })?;

        factory(self, params)
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        for name in ["print", "tach.notifiers.PrintNotifier"] {
            registry.register(name, |_, _| Ok(Arc::new(PrintNotifier::new()) as DynNotifier));
        }
        for name in ["graphite", "tach.notifiers.GraphiteNotifier"] {
            registry.register(name, |_, params| {
                Ok(Arc::new(graphite::from_params(params)?) as DynNotifier)
            });
        }
        for name in ["statsd", "tach.notifiers.StatsDNotifier"] {
            registry.register(name, |_, params| {
                Ok(Arc::new(statsd::from_params(params)?) as DynNotifier)
            });
        }
        for name in ["debug", "tach.notifiers.DebugNotifier"] {
            registry.register(name, |registry, params| {
                Ok(Arc::new(DebugNotifier::from_params(registry, params)?) as DynNotifier)
            });
        }

        registry
    }
}
