//! Expiry delivery: turns expiring positions into closing derivative legs and,
//! for delivered single-stock contracts, cash equity legs with transaction taxes.
//!
//! The engine only reads positions. Running it twice over the same snapshot and
//! prices yields identical results.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::instrument::{underlying_of, IndexUniverse};
use crate::strategy::Strategy;
use crate::summary::{aggregate, CashSummary};
use crate::types::{Position, PositionStage, PriceMap, SecurityType, Side, TradeNote};
use crate::utils::{base_symbol, valid_price};

/// Booking tag for equity delivered at expiry.
pub const CASH_STRATEGY: &str = "EQLO2";

/// Transaction-tax rates applied to cash delivery legs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TaxSchedule {
    /// STT on stock-future delivery, on quantity × settlement price.
    pub futures_stt_rate: f64,
    /// Stamp duty on stock-future delivery, on quantity × settlement price.
    pub futures_stamp_rate: f64,
    /// STT on exercised options, on quantity × intrinsic value.
    pub option_stt_rate: f64,
    /// Stamp duty on exercised options, on quantity × strike.
    pub option_stamp_rate: f64,
}

impl Default for TaxSchedule {
    fn default() -> Self {
        Self {
            futures_stt_rate: 0.001,
            futures_stamp_rate: 0.00002,
            option_stt_rate: 0.00125,
            option_stamp_rate: 0.00003,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DerivativeLeg {
    pub underlying: String,
    pub instrument_id: String,
    pub expiry: NaiveDate,
    pub side: Side,
    pub strategy: Strategy,
    pub lots: f64,
    pub price: f64,
    pub security_type: SecurityType,
    /// `None` for futures.
    pub strike: Option<f64>,
    pub lot_size: u32,
    pub note: Option<TradeNote>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CashLeg {
    pub underlying: String,
    pub side: Side,
    pub quantity: f64,
    pub price: f64,
    pub instrument_type: &'static str,
    pub strategy: &'static str,
    pub stt: f64,
    pub stamp_duty: f64,
    pub note: Option<TradeNote>,
}

impl CashLeg {
    pub fn taxes(&self) -> f64 {
        self.stt + self.stamp_duty
    }

    /// +qty × price for buys, −qty × price for sells.
    pub fn signed_consideration(&self) -> f64 {
        let c = self.quantity * self.price;
        match self.side {
            Side::Buy => c,
            Side::Sell => -c,
        }
    }
}

/// A position that could not be settled. Never aborts its expiry group.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SettlementError {
    pub instrument_id: String,
    pub symbol: String,
    pub reason: String,
    pub expiry: NaiveDate,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ExpiryResult {
    pub stage: PositionStage,
    pub expiry: NaiveDate,
    pub derivatives: Vec<DerivativeLeg>,
    pub cash_trades: Vec<CashLeg>,
    pub cash_summary: CashSummary,
    pub errors: Vec<SettlementError>,
    pub position_count: usize,
}

/// Pre-trade vs post-trade leg counts for one expiry.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct ExpiryComparison {
    pub pre_derivatives: usize,
    pub post_derivatives: usize,
    pub derivative_change: i64,
    pub pre_cash_trades: usize,
    pub post_cash_trades: usize,
    pub cash_trade_change: i64,
}

impl ExpiryComparison {
    pub fn between(pre: Option<&ExpiryResult>, post: Option<&ExpiryResult>) -> Self {
        let count = |r: Option<&ExpiryResult>| r.map_or((0, 0), |r| (r.derivatives.len(), r.cash_trades.len()));
        let (pre_d, pre_c) = count(pre);
        let (post_d, post_c) = count(post);
        Self {
            pre_derivatives: pre_d,
            post_derivatives: post_d,
            derivative_change: post_d as i64 - pre_d as i64,
            pre_cash_trades: pre_c,
            post_cash_trades: post_c,
            cash_trade_change: post_c as i64 - pre_c as i64,
        }
    }
}

/// Compare two staged runs expiry by expiry, over the union of their dates.
pub fn compare_stages(
    pre: &BTreeMap<NaiveDate, ExpiryResult>,
    post: &BTreeMap<NaiveDate, ExpiryResult>,
) -> BTreeMap<NaiveDate, ExpiryComparison> {
    pre.keys()
        .chain(post.keys())
        .map(|d| (*d, ExpiryComparison::between(pre.get(d), post.get(d))))
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct ExpiryDeliveryEngine {
    index: IndexUniverse,
    taxes: TaxSchedule,
}

impl ExpiryDeliveryEngine {
    pub fn new(index: IndexUniverse, taxes: TaxSchedule) -> Self {
        Self { index, taxes }
    }

    pub fn index_universe(&self) -> &IndexUniverse {
        &self.index
    }

    pub fn taxes(&self) -> &TaxSchedule {
        &self.taxes
    }

    /// Group `positions` by expiry date and settle each group independently.
    pub fn process_by_expiry(
        &self,
        positions: &[Position],
        prices: &PriceMap,
        stage: PositionStage,
    ) -> BTreeMap<NaiveDate, ExpiryResult> {
        let mut groups: BTreeMap<NaiveDate, Vec<&Position>> = BTreeMap::new();
        for p in positions {
            groups.entry(p.expiry).or_default().push(p);
        }

        groups
            .into_iter()
            .map(|(expiry, group)| {
                info!("Processing {} positions for expiry {}", group.len(), expiry);
                (expiry, self.process_group(expiry, &group, prices, stage))
            })
            .collect()
    }

    fn process_group(
        &self,
        expiry: NaiveDate,
        group: &[&Position],
        prices: &PriceMap,
        stage: PositionStage,
    ) -> ExpiryResult {
        let mut derivatives = Vec::new();
        let mut cash_trades = Vec::new();
        let mut errors = Vec::new();

        for p in group {
            match self.settle(p, prices) {
                Ok((deriv, cash)) => {
                    derivatives.push(deriv);
                    cash_trades.extend(cash);
                }
                Err(reason) => {
                    warn!("Cannot settle {} at {}: {}", p.instrument_id, expiry, reason);
                    errors.push(SettlementError {
                        instrument_id: p.instrument_id.clone(),
                        symbol: p.symbol.clone(),
                        reason,
                        expiry,
                    });
                }
            }
        }

        let cash_summary = aggregate(&cash_trades);
        ExpiryResult {
            stage,
            expiry,
            derivatives,
            cash_trades,
            cash_summary,
            errors,
            position_count: group.len(),
        }
    }

    /// Settle one position into its derivative leg and optional cash leg.
    pub fn settle(&self, p: &Position, prices: &PriceMap) -> Result<(DerivativeLeg, Option<CashLeg>), String> {
        let price = resolve_price(p, prices).ok_or_else(|| "No price available".to_string())?;
        if !p.lots().is_finite() {
            return Err(format!("Invalid lots: {}", p.lots()));
        }
        match p.security_type() {
            SecurityType::Futures => Ok(self.settle_future(p, price)),
            SecurityType::Call | SecurityType::Put => {
                if !valid_price(p.strike()) {
                    return Err(format!("Invalid strike: {}", p.strike()));
                }
                Ok(self.settle_option(p, price))
            }
        }
    }

    fn settle_future(&self, p: &Position, price: f64) -> (DerivativeLeg, Option<CashLeg>) {
        let lots = p.lots();
        let underlying = underlying_of(p);
        let side = Side::closing(lots);

        let derivative = DerivativeLeg {
            underlying: underlying.clone(),
            instrument_id: p.instrument_id.clone(),
            expiry: p.expiry,
            side,
            strategy: Strategy::closing(p.security_type(), lots),
            lots: lots.abs(),
            price,
            security_type: p.security_type(),
            strike: None,
            lot_size: p.lot_size(),
            note: None,
        };

        if self.index.is_index(&p.instrument_id) {
            return (derivative, None);
        }

        let quantity = lots.abs() * p.lot_size() as f64;
        let value = quantity * price;
        let cash = CashLeg {
            underlying,
            side: side.opposite(),
            quantity,
            price,
            instrument_type: "CASH",
            strategy: CASH_STRATEGY,
            stt: value * self.taxes.futures_stt_rate,
            stamp_duty: value * self.taxes.futures_stamp_rate,
            note: None,
        };
        (derivative, Some(cash))
    }

    fn settle_option(&self, p: &Position, price: f64) -> (DerivativeLeg, Option<CashLeg>) {
        let lots = p.lots();
        let strike = p.strike();
        let underlying = underlying_of(p);
        let is_index = self.index.is_index(&p.instrument_id);
        let intrinsic = intrinsic_value(p.security_type(), price, strike);
        let itm = is_itm(p.security_type(), price, strike);
        let side = Side::closing(lots);
        let long = p.is_long();

        let deriv_price = if is_index && itm { intrinsic.max(0.0) } else { 0.0 };

        let delivered = itm && !is_index;
        let note = delivered.then(|| match side {
            Side::Buy => TradeNote::Assignment,
            Side::Sell => TradeNote::Exercise,
        });

        let derivative = DerivativeLeg {
            underlying: underlying.clone(),
            instrument_id: p.instrument_id.clone(),
            expiry: p.expiry,
            side,
            strategy: Strategy::closing(p.security_type(), lots),
            lots: lots.abs(),
            price: deriv_price,
            security_type: p.security_type(),
            strike: Some(strike),
            lot_size: p.lot_size(),
            note,
        };

        if !delivered {
            return (derivative, None);
        }

        let quantity = lots.abs() * p.lot_size() as f64;
        // Long call / short put take delivery; long put / short call deliver.
        let cash_side = match (p.security_type(), long) {
            (SecurityType::Call, true) | (SecurityType::Put, false) => Side::Buy,
            _ => Side::Sell,
        };
        // Only the exercising (long) holder pays tax.
        let (stt, stamp_duty) = if long {
            (
                quantity * intrinsic.max(0.0) * self.taxes.option_stt_rate,
                quantity * strike * self.taxes.option_stamp_rate,
            )
        } else {
            (0.0, 0.0)
        };

        let cash = CashLeg {
            underlying,
            side: cash_side,
            quantity,
            price: strike,
            instrument_type: "CASH",
            strategy: CASH_STRATEGY,
            stt,
            stamp_duty,
            note: note.map(TradeNote::opposite),
        };
        (derivative, Some(cash))
    }
}

pub fn is_itm(security_type: SecurityType, price: f64, strike: f64) -> bool {
    match security_type {
        SecurityType::Call => price > strike,
        SecurityType::Put => price < strike,
        SecurityType::Futures => false,
    }
}

/// Signed intrinsic value per unit; zero for futures.
pub fn intrinsic_value(security_type: SecurityType, price: f64, strike: f64) -> f64 {
    match security_type {
        SecurityType::Call => price - strike,
        SecurityType::Put => strike - price,
        SecurityType::Futures => 0.0,
    }
}

/// Attached price first, then symbol, base symbol, underlying, base underlying.
pub fn resolve_price(p: &Position, prices: &PriceMap) -> Option<f64> {
    if let Some(px) = p.last_price.filter(|v| valid_price(*v)) {
        return Some(px);
    }
    let underlying = p.underlying.as_deref();
    [
        Some(p.symbol.as_str()),
        base_symbol(&p.symbol),
        underlying,
        underlying.and_then(base_symbol),
    ]
    .into_iter()
    .flatten()
    .find_map(|k| prices.get(k).copied().filter(|v| valid_price(*v)))
}
