use crate::{
    binding::{BindingSpec, MethodBinding},
    error::Result,
    notifiers::{DynNotifier, NotifierRegistry, NotifierSource},
    statistics::StatisticRegistry,
    target::TargetRegistry,
    value::Params,
};
use std::sync::{Arc, Weak};
use tracing::debug;

/// Everything a configuration resolves names against: the live targets,
/// the statistic ids and the notifier drivers.
#[derive(Clone)]
pub struct Catalog {
    targets: Arc<TargetRegistry>,
    statistics: StatisticRegistry,
    drivers: NotifierRegistry,
}

impl Catalog {
    pub fn new(
        targets: Arc<TargetRegistry>,
        statistics: StatisticRegistry,
        drivers: NotifierRegistry,
    ) -> Self {
        Self {
            targets,
            statistics,
            drivers,
        }
    }

    pub fn with_defaults(targets: Arc<TargetRegistry>) -> Self {
        Self::new(
            targets,
            StatisticRegistry::with_defaults(),
            NotifierRegistry::with_defaults(),
        )
    }

    pub fn targets(&self) -> &Arc<TargetRegistry> {
        &self.targets
    }

    pub fn statistics(&self) -> &StatisticRegistry {
        &self.statistics
    }

    pub fn statistics_mut(&mut self) -> &mut StatisticRegistry {
        &mut self.statistics
    }

    pub fn drivers(&self) -> &NotifierRegistry {
        &self.drivers
    }

    pub fn drivers_mut(&mut self) -> &mut NotifierRegistry {
        &mut self.drivers
    }

    pub fn list_statistics(&self) -> Vec<String> {
        self.statistics.list()
    }

    pub fn list_drivers(&self) -> Vec<String> {
        self.drivers.list()
    }

    pub fn bind(
        &self,
        spec: BindingSpec,
        notifiers: Weak<dyn NotifierSource>,
    ) -> Result<MethodBinding> {
        MethodBinding::new(spec, self.targets.clone(), &self.statistics, notifiers)
    }

    pub fn build_notifier(&self, driver: &str, params: &Params) -> Result<DynNotifier> {
        debug!(driver, "Building notifier");
        self.drivers.build(driver, params)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::with_defaults(Arc::new(TargetRegistry::new()))
    }
}
