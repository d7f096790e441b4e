// Terminal output helpers shared by the commands
use colored::Colorize;

pub fn print_header(text: &str) {
    println!("{}", format!("=== {} ===", text).bold().cyan());
}

pub fn print_success(text: &str) {
    println!("{} {}", "✓".green().bold(), text.green());
}

pub fn print_error(text: &str) {
    println!("{} {}", "✗".red().bold(), text.red());
}

pub fn print_hint(text: &str) {
    println!("{}", text.yellow());
}

pub fn print_field(name: &str, value: impl std::fmt::Display) {
    println!("{}: {}", name.bold(), value);
}

/// `-` for absent optional values in tables.
pub fn or_dash(value: Option<&str>) -> String {
    value.unwrap_or("-").to_string()
}
