use crate::ui;
use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tach_config::Configuration;
use tach_core::{Catalog, TargetRegistry};
use tach_targets::{exercise, register_demo};

pub fn execute(config: PathBuf, iterations: usize) -> Result<()> {
    ui::print_header("Demo");
    ui::print_field("File", config.display());

    let targets = Arc::new(TargetRegistry::new());
    register_demo(&targets);

    let configuration = Configuration::load(&config, Catalog::with_defaults(targets.clone()))?;
    configuration.install(&[])?;

    let labels = configuration.labels();
    ui::print_field("Installed", labels.join(", "));
    println!();

    let outcomes = exercise(&targets, iterations);
    let failures = outcomes.iter().filter(|o| o.result.is_err()).count();
    for outcome in &outcomes {
        match &outcome.result {
            Ok(value) => println!("  {} {} -> {}", "•".green(), outcome.target, value),
            Err(e) => println!("  {} {} -> {}", "•".red(), outcome.target, e),
        }
    }

    configuration.uninstall(&[]);

    println!();
    ui::print_success(&format!(
        "{} calls made, {} failed (failed calls are not measured)",
        outcomes.len(),
        failures
    ));

    Ok(())
}
