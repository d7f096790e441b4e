use crate::error::{Result, TachError};
use crate::notifiers::NotifierSource;
use crate::statistics::{DynStatistic, StatisticRegistry};
use crate::target::{
    Call, CallResult, Callable, Displaced, LabelTransform, Member, MemberKind, TargetRegistry,
};
use crate::value::{Measurement, Params};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// Declarative description of one instrumented member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingSpec {
    pub label: String,
    pub module: String,
    pub method: String,
    pub metric: String,
    pub notifier: Option<String>,
    pub app: Option<String>,
    pub app_path: Option<String>,
    pub additional: Params,
}

impl BindingSpec {
    /// Build a spec from a section's `key = value` items. Every missing
    /// required key is reported at once.
    pub fn from_items<I, K, V>(label: &str, items: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut module = None;
        let mut method = None;
        let mut metric = None;
        let mut notifier = None;
        let mut app = None;
        let mut app_path = None;
        let mut additional = Params::new();

        for (key, value) in items {
            let key = key.into();
            let value = value.into();
            match key.as_str() {
                "module" => module = Some(value),
                "method" => method = Some(value),
                "metric" => metric = Some(value),
                "notifier" => notifier = Some(value),
                "app" => app = Some(value),
                "app_path" => app_path = Some(value),
                _ => {
                    additional.insert(key, value);
                }
            }
        }

        let mut missing = Vec::new();
        for (key, present) in [
            ("module", module.is_some()),
            ("method", method.is_some()),
            ("metric", metric.is_some()),
            ("app", app.is_some() || app_path.is_none()),
            ("app_path", app_path.is_some() || app.is_none()),
        ] {
            if !present {
                missing.push(key.to_string());
            }
        }

        match (module, method, metric) {
            (Some(module), Some(method), Some(metric)) if missing.is_empty() => Ok(Self {
                label: label.to_string(),
                module,
                method,
                metric,
                notifier,
                app,
                app_path,
                additional,
            }),
            _ => Err(TachError::MissingOptions {
                label: label.to_string(),
                missing,
            }),
        }
    }

    pub fn target(&self) -> String {
        format!("{}.{}", self.module, self.method)
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.additional.get(key).map(String::as_str)
    }
}

/// The part of a binding shared with its installed wrapper.
struct Meter {
    label: String,
    notifier: Option<String>,
    statistic: DynStatistic,
    transform: Option<LabelTransform>,
    notifiers: Weak<dyn NotifierSource>,
}

impl Meter {
    /// Run `original`, bracketing it with the statistic. A call that returns
    /// an error is passed straight back and nothing is reported.
    fn observe(&self, original: &Callable, mut call: Call) -> CallResult {
        let mut label = None;
        if let Some(transform) = &self.transform {
            let relabel = transform(std::mem::take(&mut call.args));
            call.args = relabel.args;
            label = relabel.label.filter(|l| !l.is_empty());
        }

        let baton = self.statistic.start();
        let result = original(call);
        if result.is_ok() {
            let measurement = self.statistic.finish(baton);
            self.notify(&measurement, label.as_deref().unwrap_or(&self.label));
        }

        result
    }

    fn notify(&self, measurement: &Measurement, label: &str) {
        match self.notifiers.upgrade() {
            Some(source) => source
                .notifier(self.notifier.as_deref())
                .deliver(measurement, label),
            None => warn!(label, "Configuration dropped; discarding measurement"),
        }
    }
}

enum State {
    Detached,
    Attached(Displaced),
}

/// A configured label bound to a live member of the [`TargetRegistry`].
///
/// `install` swaps the member for a measuring wrapper of the same kind;
/// `uninstall` puts back exactly what was found.
pub struct MethodBinding {
    spec: BindingSpec,
    kind: MemberKind,
    owner: String,
    targets: Arc<TargetRegistry>,
    meter: Arc<Meter>,
    state: Mutex<State>,
}

impl MethodBinding {
    pub fn new(
        spec: BindingSpec,
        targets: Arc<TargetRegistry>,
        statistics: &StatisticRegistry,
        notifiers: Weak<dyn NotifierSource>,
    ) -> Result<Self> {
        targets.resolve(&spec.module)?;
        let classified = targets.classify(&spec.module, &spec.method)?;
        if !classified.kind.is_callable() {
            return Err(TachError::resolution(
                spec.target(),
                format!("'{}' is data, not a callable", spec.method),
            ));
        }

        let statistic = statistics.build(&spec.metric, &spec.additional)?;

        let transform = match (&spec.app_path, &spec.app) {
            (Some(path), Some(app)) => Some(targets.transform(path, app)?),
            _ => None,
        };

        debug!(
            label = %spec.label,
            target = %spec.target(),
            kind = %classified.kind,
            owner = %classified.owner,
            "Resolved binding"
        );

        let meter = Arc::new(Meter {
            label: spec.label.clone(),
            notifier: spec.notifier.clone(),
            statistic,
            transform,
            notifiers,
        });

        Ok(Self {
            spec,
            kind: classified.kind,
            owner: classified.owner,
            targets,
            meter,
            state: Mutex::new(State::Detached),
        })
    }

    pub fn label(&self) -> &str {
        &self.spec.label
    }

    pub fn spec(&self) -> &BindingSpec {
        &self.spec
    }

    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    /// Container the member was found on when the binding was created.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.spec.param(key)
    }

    pub fn is_installed(&self) -> bool {
        matches!(*self.state.lock(), State::Attached(_))
    }

    /// Install the metric collector. Installing twice keeps the first
    /// captured original.
    pub fn install(&self) -> Result<()> {
        let mut state = self.state.lock();
        if matches!(*state, State::Attached(_)) {
            debug!(label = %self.spec.label, "Already installed");
            return Ok(());
        }

        let meter = self.meter.clone();
        let target = self.spec.target();
        let displaced = self
            .targets
            .substitute(&self.spec.module, &self.spec.method, move |current| {
                let original = current.as_callable().cloned().ok_or_else(|| {
                    TachError::resolution(target, "member is no longer callable")
                })?;
                let wrapper: Callable = Arc::new(move |call: Call| meter.observe(&original, call));
                Ok(Member::from_callable(current.kind(), wrapper))
            })?;

        *state = State::Attached(displaced);
        info!(
            label = %self.spec.label,
            target = %self.spec.target(),
            kind = %self.kind,
            "Installed metric collector"
        );
        Ok(())
    }

    /// Uninstall the metric collector; a no-op when not installed.
    pub fn uninstall(&self) {
        let mut state = self.state.lock();
        if let State::Attached(displaced) = std::mem::replace(&mut *state, State::Detached) {
            self.targets
                .restore(&self.spec.module, &self.spec.method, displaced);
            info!(
                label = %self.spec.label,
                target = %self.spec.target(),
                "Uninstalled metric collector"
            );
        }
    }
}
