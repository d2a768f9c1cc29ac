//! Directional strategy buckets used by downstream booking.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::SecurityType;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Strategy {
    #[serde(rename = "FULO")]
    Fulo,
    #[serde(rename = "FUSH")]
    Fush,
}

impl Strategy {
    /// Bucket for a holding of `lots` in `security_type`.
    ///
    /// Futures and calls are long-oriented when long. A long put is short exposure,
    /// so puts are inverted.
    pub fn classify(security_type: SecurityType, lots: f64) -> Self {
        let long = lots > 0.0;
        match security_type {
            SecurityType::Futures | SecurityType::Call => {
                if long {
                    Strategy::Fulo
                } else {
                    Strategy::Fush
                }
            }
            SecurityType::Put => {
                if long {
                    Strategy::Fush
                } else {
                    Strategy::Fulo
                }
            }
        }
    }

    /// Bucket of the trade that unwinds a holding of `lots`.
    pub fn closing(security_type: SecurityType, lots: f64) -> Self {
        Self::classify(security_type, -lots)
    }

    pub fn code(self) -> &'static str {
        match self {
            Strategy::Fulo => "FULO",
            Strategy::Fush => "FUSH",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
