use crate::ui;
use anyhow::Result;
use colored::Colorize;
use tach_core::Catalog;

pub fn execute() -> Result<()> {
    let catalog = Catalog::default();

    ui::print_header("Available Statistics");
    let statistics = catalog.list_statistics();
    println!("\nTotal statistics: {}\n", statistics.len());
    for statistic in statistics {
        println!("  {} {}", "•".green(), statistic);
    }

    println!();
    ui::print_header("Available Notifier Drivers");
    let drivers = catalog.list_drivers();
    println!("\nTotal drivers: {}\n", drivers.len());
    for driver in drivers {
        println!("  {} {}", "•".green(), driver);
    }

    println!();
    ui::print_hint("Use 'tach check <config>' to validate a configuration");

    Ok(())
}
