use super::{Baton, Statistic};
use crate::value::{Measurement, ValueKind};
use std::time::Instant;

/// Wall-clock duration of the wrapped call, in seconds.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExecTime;

impl Statistic for ExecTime {
    fn kind(&self) -> ValueKind {
        ValueKind::ExecTime
    }

    fn start(&self) -> Baton {
        Baton::Started(Instant::now())
    }

    fn finish(&self, baton: Baton) -> Measurement {
        let elapsed = match baton {
            Baton::Started(started) => Instant::now()
                .saturating_duration_since(started)
                .as_secs_f64(),
            _ => 0.0,
        };

        Measurement::exec_time(elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_measures_elapsed_seconds() {
        let statistic = ExecTime;
        let baton = statistic.start();
        std::thread::sleep(Duration::from_millis(500));
        let measurement = statistic.finish(baton);

        assert_eq!(measurement.kind, ValueKind::ExecTime);
        let seconds = measurement.value.as_f64().unwrap();
        assert!((seconds - 0.5).abs() < 0.1, "elapsed {}", seconds);
    }

    #[test]
    fn test_foreign_baton_does_not_fail() {
        let measurement = ExecTime.finish(Baton::Empty);
        assert_eq!(measurement.value.as_f64(), Some(0.0));
    }
}
