use crate::parser::{self, Section};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Weak};
use tach_core::notifiers::PrintNotifier;
use tach_core::{
    BindingSpec, Catalog, DynNotifier, MethodBinding, NotifierRegistry, NotifierSource, Params,
    Result, TachError,
};
use tracing::{debug, info};

pub const GRAPHITE_SECTION: &str = "graphite.config";
pub const STATSD_SECTION: &str = "statsd.config";
pub const NOTIFIER_SECTION: &str = "notifier";
pub const NOTIFIER_PREFIX: &str = "notifier:";

const DEFAULT_DRIVER: &str = "print";

pub fn is_notifier_section(name: &str) -> bool {
    name == GRAPHITE_SECTION
        || name == STATSD_SECTION
        || name == NOTIFIER_SECTION
        || name.starts_with(NOTIFIER_PREFIX)
}

/// A declared notifier. An empty label marks the default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotifierSpec {
    pub label: String,
    pub driver: String,
    pub params: Params,
}

impl NotifierSpec {
    pub fn from_section(section: &Section) -> Result<Self> {
        match section.name.as_str() {
            GRAPHITE_SECTION => Self::legacy(section, "graphite", "carbon_host", "carbon_port"),
            STATSD_SECTION => Self::legacy(section, "statsd", "statsd_host", "statsd_port"),
            name => {
                let label = match name.strip_prefix(NOTIFIER_PREFIX) {
                    Some(label) => label.trim(),
                    None if name == NOTIFIER_SECTION => "",
                    None => {
                        return Err(TachError::invalid(name, "not a notifier section"));
                    }
                };

                let mut driver = None;
                let mut params = Params::new();
                for (key, value) in &section.items {
                    if key == "driver" {
                        driver = Some(value.clone());
                    } else {
                        params.insert(key.clone(), value.clone());
                    }
                }

                Ok(Self {
                    label: label.to_string(),
                    driver: driver.unwrap_or_else(|| DEFAULT_DRIVER.to_string()),
                    params,
                })
            }
        }
    }

    /// `graphite.config` / `statsd.config` carry their endpoint under
    /// driver-specific option names.
    fn legacy(section: &Section, driver: &str, host_key: &str, port_key: &str) -> Result<Self> {
        let missing: Vec<String> = [host_key, port_key]
            .iter()
            .filter(|key| section.get(key).is_none())
            .map(|key| key.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(TachError::MissingOptions {
                label: section.name.clone(),
                missing,
            });
        }

        let mut params = Params::new();
        for (key, value) in &section.items {
            let key = match key.as_str() {
                k if k == host_key => "host",
                k if k == port_key => "port",
                "driver" => continue,
                other => other,
            };
            params.insert(key.to_string(), value.clone());
        }

        Ok(Self {
            label: driver.to_string(),
            driver: driver.to_string(),
            params,
        })
    }

    /// Spec recorded for a driver installed with `set_notifier`.
    pub fn custom(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            driver: "custom".to_string(),
            params: Params::new(),
        }
    }

    pub fn is_default(&self) -> bool {
        self.label.is_empty()
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    fn key(&self) -> Option<String> {
        if self.is_default() {
            None
        } else {
            Some(self.label.clone())
        }
    }
}

struct Entry {
    spec: NotifierSpec,
    driver: DynNotifier,
}

/// Notifiers by label.
///
/// An unlabelled notifier lives under the `None` key. Without one, the
/// default refers to the first declared label, so rebinding that label
/// also rebinds the default.
pub struct NotifierDirectory {
    entries: RwLock<HashMap<Option<String>, Entry>>,
    default: Option<String>,
}

impl NotifierDirectory {
    /// Build every notifier section in `sections`, ignoring the rest.
    ///
    /// The default is the section with an empty label if there is one,
    /// otherwise the first declared notifier, otherwise a print notifier.
    pub fn from_sections(sections: &[Section], drivers: &NotifierRegistry) -> Result<Self> {
        let mut entries = HashMap::new();
        let mut first = None;

        for section in sections.iter().filter(|s| is_notifier_section(&s.name)) {
            let spec = NotifierSpec::from_section(section)?;
            let key = spec.key();
            if entries.contains_key(&key) {
                debug!(section = %section.name, "Duplicate notifier label ignored");
                continue;
            }

            let driver = drivers.build(&spec.driver, &spec.params)?;
            debug!(label = %spec.label, driver = %spec.driver, "Configured notifier");
            if first.is_none() {
                first = key.clone();
            }
            entries.insert(key, Entry { spec, driver });
        }

        let default = if entries.contains_key(&None) {
            None
        } else if first.is_some() {
            first
        } else {
            let spec = NotifierSpec {
                label: String::new(),
                driver: DEFAULT_DRIVER.to_string(),
                params: Params::new(),
            };
            let driver: DynNotifier = Arc::new(PrintNotifier::new());
            entries.insert(None, Entry { spec, driver });
            None
        };

        Ok(Self {
            entries: RwLock::new(entries),
            default,
        })
    }

    fn lookup<'a>(
        &self,
        entries: &'a HashMap<Option<String>, Entry>,
        name: Option<&str>,
    ) -> Option<&'a Entry> {
        name.and_then(|name| entries.get(&Some(name.to_string())))
            .or_else(|| entries.get(&None))
            .or_else(|| entries.get(&self.default))
    }

    pub fn spec(&self, name: Option<&str>) -> Option<NotifierSpec> {
        let entries = self.entries.read();
        self.lookup(&entries, name).map(|entry| entry.spec.clone())
    }

    /// Every spec, the unlabelled one first, then by label.
    pub fn specs(&self) -> Vec<NotifierSpec> {
        let entries = self.entries.read();
        let mut keys: Vec<&Option<String>> = entries.keys().collect();
        keys.sort();
        keys.into_iter()
            .filter_map(|key| entries.get(key))
            .map(|entry| entry.spec.clone())
            .collect()
    }

    /// Replace the driver under `name`. Setting `None` while the default
    /// refers to a label installs an unlabelled notifier in its place.
    pub fn set(&self, name: Option<&str>, driver: DynNotifier) {
        let key = name.map(str::to_string);
        let mut entries = self.entries.write();
        match entries.get_mut(&key) {
            Some(entry) => entry.driver = driver,
            None => {
                let spec = NotifierSpec::custom(name.unwrap_or_default());
                entries.insert(key, Entry { spec, driver });
            }
        }
    }
}

impl NotifierSource for NotifierDirectory {
    fn notifier(&self, name: Option<&str>) -> DynNotifier {
        let entries = self.entries.read();
        match self.lookup(&entries, name) {
            Some(entry) => entry.driver.clone(),
            None => Arc::new(PrintNotifier::new()),
        }
    }
}

/// A loaded set of bindings and the notifiers they report to.
///
/// Install and uninstall mutate the shared [`tach_core::TargetRegistry`];
/// callers serialize configuration changes themselves. Dropping a
/// `Configuration` uninstalls everything it installed.
pub struct Configuration {
    catalog: Catalog,
    notifiers: Arc<NotifierDirectory>,
    bindings: Vec<MethodBinding>,
}

impl Configuration {
    /// Resolution is fail-fast: the first binding whose target, statistic or
    /// transform cannot be resolved aborts the whole load.
    pub fn from_sections(sections: &[Section], catalog: Catalog) -> Result<Self> {
        let notifiers = Arc::new(NotifierDirectory::from_sections(sections, catalog.drivers())?);

        let mut specs: Vec<BindingSpec> = Vec::new();
        for section in sections.iter().filter(|s| !is_notifier_section(&s.name)) {
            let spec = BindingSpec::from_items(&section.name, section.items.iter().cloned())?;
            if specs.iter().any(|s| s.label == spec.label) {
                debug!(label = %spec.label, "Duplicate binding label ignored");
                continue;
            }
            specs.push(spec);
        }

        let source = Arc::downgrade(&notifiers) as Weak<dyn NotifierSource>;
        let bindings = specs
            .into_iter()
            .map(|spec| catalog.bind(spec, source.clone()))
            .collect::<Result<Vec<_>>>()?;

        info!(
            bindings = bindings.len(),
            notifiers = notifiers.specs().len(),
            "Configuration loaded"
        );

        Ok(Self {
            catalog,
            notifiers,
            bindings,
        })
    }

    pub fn load(path: impl AsRef<Path>, catalog: Catalog) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");
        let sections = parser::read_sections(path)?;
        Self::from_sections(&sections, catalog)
    }

    pub fn parse(content: &str, format: &str, catalog: Catalog) -> Result<Self> {
        let sections = parser::parse_sections(content, format)?;
        Self::from_sections(&sections, catalog)
    }

    fn select(&self, labels: &[&str]) -> Vec<&MethodBinding> {
        self.bindings
            .iter()
            .filter(|b| labels.is_empty() || labels.iter().any(|l| *l == b.label()))
            .collect()
    }

    /// Install the named bindings, or all of them when `labels` is empty.
    /// Unknown labels are ignored.
    pub fn install(&self, labels: &[&str]) -> Result<()> {
        for binding in self.select(labels) {
            binding.install()?;
        }
        Ok(())
    }

    /// Uninstall the named bindings, or all of them when `labels` is empty.
    /// Runs in reverse declaration order so stacked bindings on one member
    /// unwind to the original.
    pub fn uninstall(&self, labels: &[&str]) {
        for binding in self.select(labels).into_iter().rev() {
            binding.uninstall();
        }
    }

    /// Driver for `name`, falling back to the default.
    pub fn notifier(&self, name: Option<&str>) -> DynNotifier {
        self.notifiers.notifier(name)
    }

    pub fn notifier_spec(&self, name: Option<&str>) -> Option<NotifierSpec> {
        self.notifiers.spec(name)
    }

    /// Rebind a notifier; installed bindings pick it up on their next call.
    pub fn set_notifier(&self, name: Option<&str>, driver: DynNotifier) {
        debug!(name = ?name, "Rebinding notifier");
        self.notifiers.set(name, driver);
    }

    pub fn notifiers(&self) -> &Arc<NotifierDirectory> {
        &self.notifiers
    }

    pub fn binding(&self, label: &str) -> Option<&MethodBinding> {
        self.bindings.iter().find(|b| b.label() == label)
    }

    pub fn bindings(&self) -> impl Iterator<Item = &MethodBinding> {
        self.bindings.iter()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.bindings.iter().map(|b| b.label()).collect()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }
}

impl Drop for Configuration {
    fn drop(&mut self) {
        self.uninstall(&[]);
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BindingSummary {
    pub label: String,
    pub target: String,
    pub metric: String,
    pub notifier: Option<String>,
    pub transform: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Inspection {
    pub bindings: Vec<BindingSummary>,
    pub notifiers: Vec<NotifierSpec>,
    /// Label of the notifier unnamed bindings report to
    pub default_notifier: String,
}

/// Validate a source without touching any target: required keys, statistic
/// ids and their options, and notifier drivers.
pub fn inspect_sections(sections: &[Section], catalog: &Catalog) -> Result<Inspection> {
    let notifiers = NotifierDirectory::from_sections(sections, catalog.drivers())?;

    let mut bindings = Vec::new();
    for section in sections.iter().filter(|s| !is_notifier_section(&s.name)) {
        let spec = BindingSpec::from_items(&section.name, section.items.iter().cloned())?;
        catalog.statistics().build(&spec.metric, &spec.additional)?;

        bindings.push(BindingSummary {
            target: spec.target(),
            transform: match (&spec.app_path, &spec.app) {
                (Some(path), Some(app)) => Some(format!("{}.{}", path, app)),
                _ => None,
            },
            label: spec.label,
            metric: spec.metric,
            notifier: spec.notifier,
        });
    }

    Ok(Inspection {
        bindings,
        notifiers: notifiers.specs(),
        default_notifier: notifiers
            .spec(None)
            .map(|spec| spec.label)
            .unwrap_or_default(),
    })
}
