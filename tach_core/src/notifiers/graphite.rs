use super::{Endpoint, FormatTable, SocketNotifier, Transport};
use crate::error::Result;
use crate::value::{MetricValue, Params};

/// `<label> <value> <unix timestamp>\n`, used for every value kind.
pub fn format_metric(value: &MetricValue, label: &str) -> Option<String> {
    Some(format!(
        "{} {} {}\n",
        label,
        value,
        chrono::Utc::now().timestamp()
    ))
}

pub fn formats() -> FormatTable {
    FormatTable::new().fallback(format_metric)
}

/// Carbon plaintext protocol over a persistent TCP connection.
pub fn notifier(endpoint: Endpoint) -> SocketNotifier {
    SocketNotifier::new("graphite", endpoint, Transport::Tcp, formats())
}

pub fn from_params(params: &Params) -> Result<SocketNotifier> {
    Ok(notifier(Endpoint::from_params("graphite", params)?))
}
