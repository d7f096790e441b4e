pub mod config;
pub mod parser;

pub use config::{
    inspect_sections, is_notifier_section, BindingSummary, Configuration, Inspection,
    NotifierDirectory, NotifierSpec,
};
pub use parser::{parse_sections, read_sections, Section};

use std::path::Path;
use tach_core::{Catalog, Result};

/// Load a configuration file without installing anything.
pub fn load(path: impl AsRef<Path>, catalog: Catalog) -> Result<Configuration> {
    Configuration::load(path, catalog)
}

/// Load a configuration file and install every binding it declares.
pub fn patch(path: impl AsRef<Path>, catalog: Catalog) -> Result<Configuration> {
    let config = load(path, catalog)?;
    config.install(&[])?;
    Ok(config)
}
