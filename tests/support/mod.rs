#![allow(dead_code)]

use chrono::NaiveDate;

use expiry_delivery::{NewPositionData, PositionSeed, PriceMap, SecurityType, Trade};

pub fn dec26() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 12, 26).unwrap()
}

pub fn jan30() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 30).unwrap()
}

pub fn seed(ticker: &str, symbol: &str, st: SecurityType, strike: f64, lots: f64, lot_size: i64) -> PositionSeed {
    PositionSeed {
        ticker: ticker.into(),
        symbol: symbol.into(),
        security_type: st,
        expiry: dec26(),
        strike,
        lots,
        lot_size,
        underlying: None,
    }
}

pub fn trade(id: &str, st: SecurityType, lots: f64) -> Trade {
    Trade {
        instrument_id: id.into(),
        lots,
        security_type: st,
        context: None,
    }
}

pub fn opening_trade(id: &str, symbol: &str, st: SecurityType, strike: f64, lots: f64, lot_size: i64) -> Trade {
    Trade {
        instrument_id: id.into(),
        lots,
        security_type: st,
        context: Some(NewPositionData {
            symbol: symbol.into(),
            expiry: dec26(),
            strike,
            lot_size,
            underlying: None,
        }),
    }
}

pub fn prices(pairs: &[(&str, f64)]) -> PriceMap {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

pub fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

/// Small deterministic generator so invariant sweeps are reproducible.
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    pub fn next_u32(&mut self) -> u32 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (self.0 >> 33) as u32
    }

    /// Non-zero integer lot delta in [-range, range].
    pub fn lots(&mut self, range: i32) -> f64 {
        loop {
            let v = (self.next_u32() % (2 * range as u32 + 1)) as i32 - range;
            if v != 0 {
                return v as f64;
            }
        }
    }
}
