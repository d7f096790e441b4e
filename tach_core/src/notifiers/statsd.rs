use super::{Endpoint, FormatTable, SocketNotifier, Transport};
use crate::error::Result;
use crate::value::{MetricValue, Params, ValueKind};

/// Timer in milliseconds: `<label>:<ms>|ms`.
pub fn exec_time(value: &MetricValue, label: &str) -> Option<String> {
    let millis = MetricValue::Float(value.as_f64()? * 1000.0);
    Some(format!("{}:{}|ms", label, millis))
}

/// Counter: `<label>:<delta>|c`.
pub fn increment(value: &MetricValue, label: &str) -> Option<String> {
    Some(format!("{}:{}|c", label, value))
}

pub fn formats() -> FormatTable {
    FormatTable::new()
        .on(ValueKind::ExecTime, exec_time)
        .on(ValueKind::Increment, increment)
}

/// StatsD over UDP. Kinds other than timers and counters are not sent.
pub fn notifier(endpoint: Endpoint) -> SocketNotifier {
    SocketNotifier::new("statsd", endpoint, Transport::Udp, formats())
}

pub fn from_params(params: &Params) -> Result<SocketNotifier> {
    Ok(notifier(Endpoint::from_params("statsd", params)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifiers::Notifier;
    use crate::value::Measurement;
    use proptest::prelude::*;

    #[test]
    fn test_exec_time() {
        assert_eq!(
            exec_time(&MetricValue::Float(12.3456789), "label").as_deref(),
            Some("label:12345.6789|ms")
        );
    }

    #[test]
    fn test_increment() {
        assert_eq!(
            increment(&MetricValue::Integer(2), "label").as_deref(),
            Some("label:2|c")
        );
    }

    #[test]
    fn test_unsupported_kind_is_not_sent() {
        let notifier = notifier(Endpoint::new("localhost", 8125));
        let gauge = Measurement::new(ValueKind::from("gauge"), 3i64);

        assert_eq!(notifier.format(&gauge, "label"), None);
        assert_eq!(notifier.transport(), Transport::Udp);
    }

    #[test]
    fn test_non_numeric_timer_is_not_sent() {
        assert_eq!(exec_time(&MetricValue::from("slow"), "label"), None);
    }

    proptest! {
        #[test]
        fn prop_counter_format(delta in any::<i64>(), label in "[a-z][a-z0-9_.]{0,30}") {
            let body = increment(&MetricValue::Integer(delta), &label).unwrap();
            prop_assert_eq!(body, format!("{}:{}|c", label, delta));
        }

        #[test]
        fn prop_timer_is_milliseconds(seconds in 0.0f64..10_000.0) {
            let body = exec_time(&MetricValue::Float(seconds), "t").unwrap();
            let millis: f64 = body
                .trim_start_matches("t:")
                .trim_end_matches("|ms")
                .parse()
                .unwrap();
            let expected = seconds * 1000.0;
            prop_assert!((millis - expected).abs() <= expected.abs() * 1e-9 + 1e-9);
        }
    }
}
