use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatsdKind {
    Timer,
    Counter,
    Gauge,
    Set,
}

impl StatsdKind {
    fn parse(code: &str) -> Option<Self> {
        match code {
            "ms" => Some(StatsdKind::Timer),
            "c" => Some(StatsdKind::Counter),
            "g" => Some(StatsdKind::Gauge),
            "s" => Some(StatsdKind::Set),
            _ => None,
        }
    }
}

/// A metric line as received by the sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "protocol", rename_all = "lowercase")]
pub enum SinkMetric {
    Graphite {
        path: String,
        value: f64,
        timestamp: DateTime<Utc>,
    },
    Statsd {
        name: String,
        value: f64,
        kind: StatsdKind,
        sample_rate: Option<f64>,
    },
}

/// Recognise a Graphite plaintext line (`path value timestamp`) or a StatsD
/// line (`name:value|type[|@rate]`).
pub fn parse_line(line: &str) -> Option<SinkMetric> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    parse_graphite(line).or_else(|| parse_statsd(line))
}

fn parse_graphite(line: &str) -> Option<SinkMetric> {
    let mut fields = line.split_whitespace();
    let path = fields.next()?;
    let value = fields.next()?.parse().ok()?;
    let seconds: i64 = fields.next()?.parse().ok()?;
    if fields.next().is_some() {
        return None;
    }

    Some(SinkMetric::Graphite {
        path: path.to_string(),
        value,
        timestamp: DateTime::from_timestamp(seconds, 0)?,
    })
}

fn parse_statsd(line: &str) -> Option<SinkMetric> {
    let (name, rest) = line.split_once(':')?;
    let mut fields = rest.split('|');
    let value = fields.next()?.parse().ok()?;
    let kind = StatsdKind::parse(fields.next()?)?;
    let sample_rate = match fields.next() {
        Some(rate) => Some(rate.strip_prefix('@')?.parse().ok()?),
        None => None,
    };

    if name.is_empty() || name.contains(char::is_whitespace) {
        return None;
    }

    Some(SinkMetric::Statsd {
        name: name.to_string(),
        value,
        kind,
        sample_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graphite_line() {
        let metric = parse_line("demo.checkout 0.021 1700000000\n").unwrap();
        match metric {
            SinkMetric::Graphite {
                path,
                value,
                timestamp,
            } => {
                assert_eq!(path, "demo.checkout");
                assert_eq!(value, 0.021);
                assert_eq!(timestamp.timestamp(), 1_700_000_000);
            }
            other => panic!("unexpected metric: {:?}", other),
        }
    }

    #[test]
    fn test_statsd_lines() {
        assert_eq!(
            parse_line("label:12345.6789|ms"),
            Some(SinkMetric::Statsd {
                name: "label".to_string(),
                value: 12345.6789,
                kind: StatsdKind::Timer,
                sample_rate: None,
            })
        );
        assert_eq!(
            parse_line("hits:-1|c|@0.5"),
            Some(SinkMetric::Statsd {
                name: "hits".to_string(),
                value: -1.0,
                kind: StatsdKind::Counter,
                sample_rate: Some(0.5),
            })
        );
    }

    #[test]
    fn test_rejects_garbage() {
        for line in ["", "   ", "hello world", "a:b|c", "a:1|zz", "a b c", "a:1|c|0.5"] {
            assert_eq!(parse_line(line), None, "{:?}", line);
        }
    }

    #[test]
    fn test_serializes_with_protocol_tag() {
        let metric = parse_line("hits:2|c").unwrap();
        let json = serde_json::to_value(&metric).unwrap();
        assert_eq!(json["protocol"], "statsd");
        assert_eq!(json["kind"], "counter");
    }
}
