//! Core domain types for seeds, trades, open positions and settlement sides.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::strategy::Strategy;
use crate::utils::LOT_EPSILON;

/// Last traded / closing prices keyed by symbol. A missing key means "no price".
pub type PriceMap = HashMap<String, f64>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SecurityType {
    Futures,
    Call,
    Put,
}

impl SecurityType {
    pub fn is_option(self) -> bool {
        matches!(self, SecurityType::Call | SecurityType::Put)
    }
}

impl fmt::Display for SecurityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SecurityType::Futures => "Futures",
            SecurityType::Call => "Call",
            SecurityType::Put => "Put",
        };
        f.write_str(s)
    }
}

impl FromStr for SecurityType {
    type Err = String;

    /// Accepts the booking names plus the usual exchange shorthands (FUT, CE, PE, C, P).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FUTURES" | "FUTURE" | "FUT" => Ok(SecurityType::Futures),
            "CALL" | "CE" | "C" => Ok(SecurityType::Call),
            "PUT" | "PE" | "P" => Ok(SecurityType::Put),
            other => Err(format!("unknown security type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Direction {
    Long,
    Short,
    Flat,
}

impl Direction {
    pub fn from_lots(lots: f64) -> Self {
        if lots > 0.0 {
            Direction::Long
        } else if lots < 0.0 {
            Direction::Short
        } else {
            Direction::Flat
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// The trade that flattens a position holding `lots`.
    pub fn closing(lots: f64) -> Self {
        if lots > 0.0 {
            Side::Sell
        } else {
            Side::Buy
        }
    }
}

/// Exercise/assignment annotation carried on expiry legs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TradeNote {
    #[serde(rename = "A")]
    Assignment,
    #[serde(rename = "E")]
    Exercise,
}

impl TradeNote {
    pub fn opposite(self) -> Self {
        match self {
            TradeNote::Assignment => TradeNote::Exercise,
            TradeNote::Exercise => TradeNote::Assignment,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            TradeNote::Assignment => "A",
            TradeNote::Exercise => "E",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum PositionStage {
    PreTrade,
    #[default]
    PostTrade,
}

/// Normalized position record handed over by the upstream file parsers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionSeed {
    pub ticker: String,
    pub symbol: String,
    pub security_type: SecurityType,
    #[serde(deserialize_with = "de_expiry")]
    pub expiry: NaiveDate,
    #[serde(default)]
    pub strike: f64,
    pub lots: f64,
    pub lot_size: i64,
    #[serde(default)]
    pub underlying: Option<String>,
}

/// Everything needed to open a position that the store does not hold yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPositionData {
    pub symbol: String,
    #[serde(deserialize_with = "de_expiry")]
    pub expiry: NaiveDate,
    #[serde(default)]
    pub strike: f64,
    pub lot_size: i64,
    #[serde(default)]
    pub underlying: Option<String>,
}

/// A signed lot delta against one instrument (positive = buy, negative = sell).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub instrument_id: String,
    pub lots: f64,
    pub security_type: SecurityType,
    #[serde(default)]
    pub context: Option<NewPositionData>,
}

/// One open line in the position store.
///
/// `quantity`, `direction` and `strategy` are derived from `lots`, `lot_size` and
/// `security_type`; those inputs are only written through [`Position::set_lots`]
/// so the derived fields can never go stale.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Position {
    pub instrument_id: String,
    pub symbol: String,
    security_type: SecurityType,
    pub expiry: NaiveDate,
    strike: f64,
    lots: f64,
    lot_size: u32,
    quantity: f64,
    strategy: Strategy,
    direction: Direction,
    pub underlying: Option<String>,
    pub last_price: Option<f64>,
}

impl Position {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        instrument_id: String,
        symbol: String,
        security_type: SecurityType,
        expiry: NaiveDate,
        strike: f64,
        lots: f64,
        lot_size: u32,
        underlying: Option<String>,
    ) -> Self {
        let strike = match security_type {
            SecurityType::Futures => 0.0,
            SecurityType::Call | SecurityType::Put => strike,
        };
        let underlying = underlying.filter(|u| !u.trim().is_empty());
        let mut p = Self {
            instrument_id,
            symbol,
            security_type,
            expiry,
            strike,
            lots: 0.0,
            lot_size,
            quantity: 0.0,
            strategy: Strategy::classify(security_type, lots),
            direction: Direction::Flat,
            underlying,
            last_price: None,
        };
        p.set_lots(lots);
        p
    }

    pub fn security_type(&self) -> SecurityType {
        self.security_type
    }

    /// Always 0 for futures.
    pub fn strike(&self) -> f64 {
        self.strike
    }

    pub fn lots(&self) -> f64 {
        self.lots
    }

    pub fn lot_size(&self) -> u32 {
        self.lot_size
    }

    pub fn quantity(&self) -> f64 {
        self.quantity
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn is_long(&self) -> bool {
        self.lots > 0.0
    }

    pub fn is_flat(&self) -> bool {
        self.lots.abs() < LOT_EPSILON
    }

    pub fn market_value(&self) -> Option<f64> {
        self.last_price.map(|p| p * self.quantity)
    }

    /// Replace the signed lot count and recompute every derived field.
    pub(crate) fn set_lots(&mut self, lots: f64) {
        self.lots = lots;
        self.quantity = lots * self.lot_size as f64;
        self.direction = Direction::from_lots(lots);
        self.strategy = Strategy::classify(self.security_type, lots);
    }
}

/// Expiry columns arrive either as plain dates or as timestamps; only the date is kept.
pub(crate) fn de_expiry<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_expiry(&raw).map_err(serde::de::Error::custom)
}

pub fn parse_expiry(raw: &str) -> Result<NaiveDate, String> {
    let t = raw.trim();
    if let Ok(d) = NaiveDate::parse_from_str(t, "%Y-%m-%d") {
        return Ok(d);
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(t, fmt) {
            return Ok(dt.date());
        }
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(t) {
        return Ok(dt.date_naive());
    }
    Err(format!("unrecognized expiry date: {t}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    // ---------- Security type ----------

    #[test]
    fn security_type_shorthands() {
        assert_eq!("FUT".parse::<SecurityType>().unwrap(), SecurityType::Futures);
        assert_eq!("ce".parse::<SecurityType>().unwrap(), SecurityType::Call);
        assert_eq!(" Put ".parse::<SecurityType>().unwrap(), SecurityType::Put);
        assert!("Swap".parse::<SecurityType>().is_err());
    }

    // ---------- Position derived fields ----------

    #[test]
    fn derived_fields_follow_lots() {
        let mut p = Position::new(
            "RELIANCE IS 12/26/24 C2500 Equity".into(),
            "RELIANCE".into(),
            SecurityType::Call,
            d(2024, 12, 26),
            2500.0,
            4.0,
            250,
            None,
        );
        assert_eq!(p.quantity(), 1000.0);
        assert_eq!(p.direction(), Direction::Long);
        assert_eq!(p.strategy(), Strategy::Fulo);

        p.set_lots(-2.0);
        assert_eq!(p.quantity(), -500.0);
        assert_eq!(p.direction(), Direction::Short);
        assert_eq!(p.strategy(), Strategy::Fush);
    }

    #[test]
    fn futures_strike_is_zeroed_and_blank_underlying_dropped() {
        let p = Position::new(
            "TCS=Z4 IS Equity".into(),
            "TCS".into(),
            SecurityType::Futures,
            d(2024, 12, 26),
            3900.0,
            1.0,
            175,
            Some("  ".into()),
        );
        assert_eq!(p.strike(), 0.0);
        assert!(p.underlying.is_none());
        assert_eq!(p.market_value(), None);
    }

    #[test]
    fn derivation_inputs_are_read_only_on_clones() {
        let held = Position::new(
            "SBIN IS 12/26/24 P800 Equity".into(),
            "SBIN".into(),
            SecurityType::Put,
            d(2024, 12, 26),
            800.0,
            3.0,
            750,
            None,
        );
        let mut copy = held.clone();
        copy.last_price = Some(790.0);
        copy.expiry = d(2025, 1, 30);
        assert_eq!(copy.security_type(), SecurityType::Put);
        assert_eq!(copy.lot_size(), 750);
        assert_eq!(copy.strike(), 800.0);
        assert_eq!(copy.quantity(), 2250.0);
        assert_eq!(copy.strategy(), Strategy::classify(copy.security_type(), copy.lots()));
        assert!(copy.is_long());
        assert_eq!(copy.market_value(), Some(790.0 * 2250.0));
    }

    // ---------- Sides and notes ----------

    #[test]
    fn closing_side_and_note_flip() {
        assert_eq!(Side::closing(3.0), Side::Sell);
        assert_eq!(Side::closing(-3.0), Side::Buy);
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!(TradeNote::Exercise.opposite(), TradeNote::Assignment);
        assert_eq!(TradeNote::Assignment.code(), "A");
    }

    // ---------- Expiry parsing ----------

    #[test]
    fn expiry_drops_time_of_day() {
        assert_eq!(parse_expiry("2024-12-26").unwrap(), d(2024, 12, 26));
        assert_eq!(parse_expiry("2024-12-26T15:30:00").unwrap(), d(2024, 12, 26));
        assert_eq!(parse_expiry("2024-12-26 09:15:00").unwrap(), d(2024, 12, 26));
        assert_eq!(parse_expiry("2024-12-26T15:30:00+05:30").unwrap(), d(2024, 12, 26));
        assert!(parse_expiry("26/12/2024").is_err());
    }

    #[test]
    fn seed_deserializes_from_json() {
        let s: PositionSeed = serde_json::from_str(
            r#"{"ticker":"NZ1 Index","symbol":"NIFTY","security_type":"Futures",
                "expiry":"2024-12-26T00:00:00","lots":-3,"lot_size":25}"#,
        )
        .unwrap();
        assert_eq!(s.expiry, d(2024, 12, 26));
        assert_eq!(s.lots, -3.0);
        assert_eq!(s.strike, 0.0);
        assert!(s.underlying.is_none());
    }
}
