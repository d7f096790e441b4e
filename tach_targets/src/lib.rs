//! Sample application for exercising instrumentation, plus the parser
//! behind the `metric_sink` binary.

pub mod demo;
pub mod sink;

pub use demo::{exercise, register_demo, Exercise};
pub use sink::{parse_line, SinkMetric, StatsdKind};
