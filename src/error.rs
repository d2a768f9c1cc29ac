use thiserror::Error;

/// Rejections at the position store boundary. Each one aborts a single record only.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PositionError {
    #[error("invalid seed for {instrument_id}: {reason}")]
    InvalidSeed {
        instrument_id: String,
        reason: String,
    },

    #[error("invalid trade for {instrument_id}: {reason}")]
    InvalidTrade {
        instrument_id: String,
        reason: String,
    },

    #[error("trade opens {instrument_id} without position data")]
    MissingTradeContext { instrument_id: String },
}

impl PositionError {
    pub fn instrument_id(&self) -> &str {
        match self {
            PositionError::InvalidSeed { instrument_id, .. }
            | PositionError::InvalidTrade { instrument_id, .. }
            | PositionError::MissingTradeContext { instrument_id } => instrument_id,
        }
    }

    pub(crate) fn seed(instrument_id: &str, reason: impl Into<String>) -> Self {
        PositionError::InvalidSeed {
            instrument_id: instrument_id.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn trade(instrument_id: &str, reason: impl Into<String>) -> Self {
        PositionError::InvalidTrade {
            instrument_id: instrument_id.to_string(),
            reason: reason.into(),
        }
    }
}
