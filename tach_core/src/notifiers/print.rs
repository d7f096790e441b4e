use super::{FormatTable, Notifier};
use crate::value::{Measurement, MetricValue, ValueKind};
use std::io::{self, Write};
use tracing::warn;

fn exec_time(value: &MetricValue, label: &str) -> Option<String> {
    Some(format!("Execution time {}: {}", label, value))
}

fn increment(value: &MetricValue, label: &str) -> Option<String> {
    Some(format!("Increment {}: {}", label, value))
}

fn default(value: &MetricValue, label: &str) -> Option<String> {
    Some(format!("Metric {}: {}", label, value))
}

/// Human-readable formatters shared by print-style destinations.
pub fn formats() -> FormatTable {
    FormatTable::new()
        .on(ValueKind::ExecTime, exec_time)
        .on(ValueKind::Increment, increment)
        .fallback(default)
}

/// Writes one line per measurement to standard output.
#[derive(Debug, Clone)]
pub struct PrintNotifier {
    formats: FormatTable,
}

impl Default for PrintNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl PrintNotifier {
    pub fn new() -> Self {
        Self { formats: formats() }
    }

    fn write_line<W: Write>(out: &mut W, body: &str) {
        if let Err(e) = writeln!(out, "---- {}", body).and_then(|_| out.flush()) {
            warn!(error = %e, "Failed to print measurement");
        }
    }
}

impl Notifier for PrintNotifier {
    fn format(&self, measurement: &Measurement, label: &str) -> Option<String> {
        self.formats.format(measurement, label)
    }

    fn send(&self, body: &str) {
        Self::write_line(&mut io::stdout().lock(), body);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formats() {
        let notifier = PrintNotifier::new();

        assert_eq!(
            notifier.format(&Measurement::exec_time(0.5), "label").as_deref(),
            Some("Execution time label: 0.5")
        );
        assert_eq!(
            notifier.format(&Measurement::increment(-1), "label").as_deref(),
            Some("Increment label: -1")
        );
        assert_eq!(
            notifier
                .format(&Measurement::new(ValueKind::from("gauge"), "7"), "label")
                .as_deref(),
            Some("Metric label: 7")
        );
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }
    }

    #[test]
    fn test_write_line() {
        let mut out = Vec::new();
        PrintNotifier::write_line(&mut out, "Increment label: 1");
        assert_eq!(String::from_utf8(out).unwrap(), "---- Increment label: 1\n");
    }

    #[test]
    fn test_failed_write_does_not_panic() {
        PrintNotifier::write_line(&mut BrokenPipe, "Increment label: 1");
        PrintNotifier::new().deliver(&Measurement::increment(1), "label");
    }
}
