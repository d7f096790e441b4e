use super::{print, FormatTable, Notifier};
use crate::value::Measurement;
use parking_lot::Mutex;

/// In-memory delivery target that keeps every formatted body.
#[derive(Debug)]
pub struct CaptureNotifier {
    formats: FormatTable,
    sent: Mutex<Vec<String>>,
}

impl Default for CaptureNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureNotifier {
    /// Captures bodies rendered with the print formatters.
    pub fn new() -> Self {
        Self::with_formats(print::formats())
    }

    pub fn with_formats(formats: FormatTable) -> Self {
        Self {
            formats,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.sent.lock())
    }
}

impl Notifier for CaptureNotifier {
    fn format(&self, measurement: &Measurement, label: &str) -> Option<String> {
        self.formats.format(measurement, label)
    }

    fn send(&self, body: &str) {
        self.sent.lock().push(body.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_messages() {
        let notifier = CaptureNotifier::new();
        notifier.deliver(&Measurement::increment(2), "label");

        assert_eq!(notifier.messages(), vec!["Increment label: 2".to_string()]);
        assert_eq!(notifier.take().len(), 1);
        assert!(notifier.messages().is_empty());
    }
}
