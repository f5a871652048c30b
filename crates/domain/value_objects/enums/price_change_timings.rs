use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// When the payment provider should switch a subscription to a new price.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PriceChangeTiming {
    Immediate,
    /// Takes effect at the next renewal.
    Scheduled,
}

impl PriceChangeTiming {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceChangeTiming::Immediate => "immediate",
            PriceChangeTiming::Scheduled => "scheduled",
        }
    }
}

impl Display for PriceChangeTiming {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
