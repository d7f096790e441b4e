use crate::ui;
use anyhow::Result;
use std::path::PathBuf;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use tach_config::{inspect_sections, read_sections, Inspection};
use tach_core::Catalog;

#[derive(Tabled)]
struct BindingRow {
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "Target")]
    target: String,
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Notifier")]
    notifier: String,
    #[tabled(rename = "Transform")]
    transform: String,
}

#[derive(Tabled)]
struct NotifierRow {
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "Driver")]
    driver: String,
    #[tabled(rename = "Options")]
    options: String,
}

pub fn execute(config: PathBuf, json: bool) -> Result<()> {
    let catalog = Catalog::default();
    let result = read_sections(&config).and_then(|sections| inspect_sections(&sections, &catalog));

    if json {
        let inspection = result?;
        println!("{}", serde_json::to_string_pretty(&inspection)?);
        return Ok(());
    }

    ui::print_header("Checking Configuration");
    ui::print_field("File", config.display());

    match result {
        Ok(inspection) => {
            println!();
            ui::print_success("Configuration is valid!");
            print_summary(&inspection);
            Ok(())
        }
        Err(e) => {
            println!();
            ui::print_error("Configuration is invalid!");
            println!("\nError: {}", e);
            Err(e.into())
        }
    }
}

fn print_summary(inspection: &Inspection) {
    let default = if inspection.default_notifier.is_empty() {
        "(unlabelled)"
    } else {
        inspection.default_notifier.as_str()
    };

    println!("\nBindings: {}", inspection.bindings.len());
    if !inspection.bindings.is_empty() {
        let rows = inspection.bindings.iter().map(|b| BindingRow {
            label: b.label.clone(),
            target: b.target.clone(),
            metric: b.metric.clone(),
            notifier: ui::or_dash(b.notifier.as_deref()),
            transform: ui::or_dash(b.transform.as_deref()),
        });
        println!("{}", Table::new(rows).with(Style::rounded()));
    } else {
        ui::print_hint("⚠ Warning: Configuration declares no bindings");
    }

    println!("\nNotifiers: {}", inspection.notifiers.len());
    let rows = inspection.notifiers.iter().map(|n| NotifierRow {
        label: if n.is_default() {
            "(default)".to_string()
        } else {
            n.label.clone()
        },
        driver: n.driver.clone(),
        options: n
            .params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(", "),
    });
    println!("{}", Table::new(rows).with(Style::rounded()));
    ui::print_field("Default notifier", default);
}
