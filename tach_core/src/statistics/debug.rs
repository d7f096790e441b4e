use super::{Baton, DynStatistic, Statistic, StatisticRegistry};
use crate::error::{Result, TachError};
use crate::value::{Measurement, Params, ValueKind};
use tracing::debug;

/// Wraps the statistic named by the `real_metric` option and logs both ends
/// of every measurement.
pub struct DebugStatistic {
    name: String,
    inner: DynStatistic,
}

impl DebugStatistic {
    pub fn new(name: impl Into<String>, inner: DynStatistic) -> Self {
        Self {
            name: name.into(),
            inner,
        }
    }

    pub fn from_params(registry: &StatisticRegistry, params: &Params) -> Result<Self> {
        let name = params.get("real_metric").ok_or_else(|| TachError::Statistic {
            name: "debug".to_string(),
            reason: "missing 'real_metric' option".to_string(),
        })?;

        // The wrapped statistic never sees real_metric, so debug cannot nest itself
        let mut inner_params = params.clone();
        inner_params.remove("real_metric");
        let inner = registry.build(name, &inner_params)?;

        Ok(Self::new(name.clone(), inner))
    }

    pub fn real_metric(&self) -> &str {
        &self.name
    }
}

impl Statistic for DebugStatistic {
    fn kind(&self) -> ValueKind {
        self.inner.kind()
    }

    fn start(&self) -> Baton {
        let baton = self.inner.start();
        debug!(metric = %self.name, baton = ?baton, "DebugMetric: Starting metric");
        baton
    }

    fn finish(&self, baton: Baton) -> Measurement {
        let started = baton.clone();
        let measurement = self.inner.finish(baton);
        debug!(
            metric = %self.name,
            baton = ?started,
            value = %measurement.value,
            "DebugMetric: Ending metric"
        );
        measurement
    }
}
