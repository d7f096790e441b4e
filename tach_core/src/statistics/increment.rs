use super::{Baton, Statistic};
use crate::error::{Result, TachError};
use crate::value::{Measurement, Params, ValueKind};

/// Counter delta reported once per call. Configure with the `increment`
/// option; defaults to `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Increment {
    delta: i64,
}

impl Default for Increment {
    fn default() -> Self {
        Self { delta: 1 }
    }
}

impl Increment {
    pub fn new(delta: i64) -> Self {
        Self { delta }
    }

    pub fn from_params(params: &Params) -> Result<Self> {
        match params.get("increment") {
            None => Ok(Self::default()),
            Some(raw) => raw
                .trim()
                .parse()
                .map(Self::new)
                .map_err(|e| TachError::Statistic {
                    name: "increment".to_string(),
                    reason: format!("invalid increment '{}': {}", raw, e),
                }),
        }
    }

    pub fn delta(&self) -> i64 {
        self.delta
    }
}

impl Statistic for Increment {
    fn kind(&self) -> ValueKind {
        ValueKind::Increment
    }

    fn finish(&self, _baton: Baton) -> Measurement {
        Measurement::increment(self.delta)
    }
}
