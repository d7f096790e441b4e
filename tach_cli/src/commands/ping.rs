use crate::ui;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::thread;
use tach_config::{read_sections, NotifierDirectory};
use tach_core::{Measurement, MetricValue, NotifierRegistry, NotifierSource, ValueKind};
use tracing::info;

pub fn execute(
    config: PathBuf,
    notifier: Option<String>,
    label: String,
    value: String,
    kind: String,
    count: u32,
    interval: String,
) -> Result<()> {
    let interval = humantime::parse_duration(&interval)
        .with_context(|| format!("Invalid interval '{}'", interval))?;

    let sections = read_sections(&config)?;
    let directory =
        NotifierDirectory::from_sections(&sections, &NotifierRegistry::with_defaults())?;

    let spec = directory
        .spec(notifier.as_deref())
        .context("Configuration has no notifier")?;
    let driver = directory.notifier(notifier.as_deref());
    let measurement = Measurement::new(ValueKind::from(kind.as_str()), parse_value(&value));

    ui::print_header("Ping");
    let shown = if spec.is_default() {
        "(default)"
    } else {
        spec.label.as_str()
    };
    ui::print_field("Notifier", shown);
    ui::print_field("Driver", &spec.driver);
    ui::print_field(
        "Measurement",
        format!("{} {} = {}", measurement.kind, label, measurement.value),
    );
    println!();

    for sent in 1..=count {
        driver.deliver(&measurement, &label);
        info!(sent, count, "Delivered test measurement");

        if sent < count {
            thread::sleep(interval);
        }
    }

    ui::print_success(&format!("Sent {} measurement(s)", count));
    Ok(())
}

/// Integers stay integers so counters render without a decimal point.
fn parse_value(raw: &str) -> MetricValue {
    if let Ok(v) = raw.parse::<i64>() {
        MetricValue::Integer(v)
    } else if let Ok(v) = raw.parse::<f64>() {
        MetricValue::Float(v)
    } else {
        MetricValue::from(raw)
    }
}
