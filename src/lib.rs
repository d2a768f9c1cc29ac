//! Position tracking and expiry delivery for a listed derivatives book.
//!
//! Replays a signed trade stream over an opening snapshot, then derives the
//! physical-delivery legs, transaction taxes and per-underlying net settlement
//! due at each expiry.

pub mod book;
pub mod config;
pub mod deliverables;
pub mod error;
pub mod instrument;
pub mod positions;
pub mod settlement;
pub mod strategy;
pub mod summary;
pub mod types;
pub mod utils;

pub use error::PositionError;
pub use instrument::IndexUniverse;
pub use positions::{PositionStore, TradeOutcome};
pub use settlement::{ExpiryDeliveryEngine, ExpiryResult, TaxSchedule};
pub use strategy::Strategy;
pub use summary::{aggregate, CashSummary};
pub use types::{NewPositionData, Position, PositionSeed, PositionStage, PriceMap, SecurityType, Side, Trade};
