pub mod debug;
pub mod exec_time;
pub mod increment;

use crate::error::{Result, TachError};
use crate::value::{Measurement, Params, ValueKind};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

pub use debug::DebugStatistic;
pub use exec_time::ExecTime;
pub use increment::Increment;

/// Opaque value handed from `start()` to `finish()`.
#[derive(Debug, Clone, PartialEq)]
pub enum Baton {
    Empty,
    Started(Instant),
    Value(serde_json::Value),
}

/// Core trait for everything that measures one call
pub trait Statistic: Send + Sync {
    /// Discriminator notifiers use to format the finished value
    fn kind(&self) -> ValueKind;

    /// Begin measuring; the returned baton is passed back to `finish`
    fn start(&self) -> Baton {
        Baton::Empty
    }

    /// Stop measuring and produce the tagged value
    fn finish(&self, baton: Baton) -> Measurement;
}

pub type DynStatistic = Arc<dyn Statistic>;

pub type StatisticFactory =
    Arc<dyn Fn(&StatisticRegistry, &Params) -> Result<DynStatistic> + Send + Sync>;

#[derive(Default, Clone)]
pub struct StatisticRegistry {
    factories: HashMap<String, StatisticFactory>,
}

impl StatisticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&StatisticRegistry, &Params) -> Result<DynStatistic> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Construct the statistic registered under `name`.
    pub fn build(&self, name: &str, params: &Params) -> Result<DynStatistic> {
        let factory = self.factories.get(name).ok_or_else(|| TachError::Statistic {
            name: name.to_string(),
            reason: "unknown statistic".to_string(),
        })?;

        factory(self, params)
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        // Execution time, under every name older configurations used
        for name in ["exec_time", "timer", "graphite", "statsd_timer", "tach.metrics.ExecTime"] {
            registry.register(name, |_, _| Ok(Arc::new(ExecTime) as DynStatistic));
        }

        for name in ["increment", "tach.metrics.Increment"] {
            registry.register(name, |_, params| {
                Ok(Arc::new(Increment::from_params(params)?) as DynStatistic)
            });
        }
        registry.register("statsd_incr", |_, _| {
            Ok(Arc::new(Increment::new(1)) as DynStatistic)
        });
        registry.register("statsd_decr", |_, _| {
            Ok(Arc::new(Increment::new(-1)) as DynStatistic)
        });

        for name in ["debug", "tach.metrics.DebugMetric"] {
            registry.register(name, |registry, params| {
                Ok(Arc::new(DebugStatistic::from_params(registry, params)?) as DynStatistic)
            });
        }

        registry
    }
}
