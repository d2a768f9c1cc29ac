//! Open-position store. Seeds from a snapshot, then replays a signed trade stream.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

use crate::error::PositionError;
use crate::types::{NewPositionData, Position, PositionSeed, PriceMap, SecurityType, Trade};
use crate::utils::{base_symbol, valid_price, LOT_EPSILON};

/// What a single trade did to the store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TradeOutcome {
    Opened { lots: f64 },
    Updated { old_lots: f64, new_lots: f64 },
    Closed { old_lots: f64 },
}

/// Result of seeding the store from a snapshot.
#[derive(Debug, Clone, Default)]
pub struct Initialized {
    pub positions: Vec<Position>,
    pub rejected: Vec<PositionError>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct PositionSummary {
    pub total_positions: usize,
    pub long_positions: usize,
    pub short_positions: usize,
    pub by_security_type: BTreeMap<String, usize>,
    pub by_strategy: BTreeMap<String, usize>,
}

/// Owns every open position, keyed by instrument id.
#[derive(Debug, Default, Clone)]
pub struct PositionStore {
    positions: BTreeMap<String, Position>,
}

impl PositionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the store contents with `seeds`. Bad records are rejected one by one.
    pub fn initialize<I>(&mut self, seeds: I) -> Initialized
    where
        I: IntoIterator<Item = PositionSeed>,
    {
        self.positions.clear();
        let mut rejected = Vec::new();
        for seed in seeds {
            match self.seed(seed) {
                Ok(()) => {}
                Err(e) => {
                    warn!("Rejected seed: {}", e);
                    rejected.push(e);
                }
            }
        }
        info!(
            "Initialized {} positions ({} rejected)",
            self.positions.len(),
            rejected.len()
        );
        Initialized {
            positions: self.snapshot(),
            rejected,
        }
    }

    fn seed(&mut self, seed: PositionSeed) -> Result<(), PositionError> {
        let id = seed.ticker.trim().to_string();
        if id.is_empty() {
            return Err(PositionError::seed(&seed.ticker, "empty ticker"));
        }
        let lot_size = checked_lot_size(seed.lot_size)
            .ok_or_else(|| PositionError::seed(&id, format!("lot size must be positive, got {}", seed.lot_size)))?;
        if !seed.lots.is_finite() {
            return Err(PositionError::seed(&id, format!("lots not finite: {}", seed.lots)));
        }
        if seed.lots.abs() < LOT_EPSILON {
            return Err(PositionError::seed(&id, "zero lots"));
        }
        if seed.security_type.is_option() && !valid_price(seed.strike) {
            return Err(PositionError::seed(&id, format!("invalid strike {}", seed.strike)));
        }
        if self.positions.contains_key(&id) {
            return Err(PositionError::seed(&id, "duplicate ticker in snapshot"));
        }

        let position = Position::new(
            id.clone(),
            seed.symbol,
            seed.security_type,
            seed.expiry,
            seed.strike,
            seed.lots,
            lot_size,
            seed.underlying,
        );
        info!(
            "Initialized position: {} with {} lots @ {} per lot, strategy={}",
            id,
            position.lots(),
            lot_size,
            position.strategy()
        );
        self.positions.insert(id, position);
        Ok(())
    }

    /// Apply a signed lot delta. Opens, merges into, or closes a position.
    pub fn apply_trade(&mut self, trade: &Trade) -> Result<TradeOutcome, PositionError> {
        let id = trade.instrument_id.trim();
        if id.is_empty() {
            return Err(PositionError::trade(&trade.instrument_id, "empty instrument id"));
        }
        let delta = trade.lots;
        if !delta.is_finite() {
            return Err(PositionError::trade(id, format!("lot delta not finite: {delta}")));
        }
        if delta.abs() < LOT_EPSILON {
            return Err(PositionError::trade(id, "zero lot delta"));
        }

        let Some(existing) = self.positions.get_mut(id) else {
            let ctx = trade
                .context
                .as_ref()
                .ok_or_else(|| PositionError::MissingTradeContext {
                    instrument_id: id.to_string(),
                })?;
            let position = open_position(id, trade.security_type, delta, ctx)?;
            info!(
                "Created new position: {} {} lots @ {} per lot, strategy={}",
                id,
                delta,
                position.lot_size(),
                position.strategy()
            );
            self.positions.insert(id.to_string(), position);
            return Ok(TradeOutcome::Opened { lots: delta });
        };

        if existing.security_type() != trade.security_type {
            return Err(PositionError::trade(
                id,
                format!(
                    "security type {} does not match held {}",
                    trade.security_type, existing.security_type()
                ),
            ));
        }

        let old_lots = existing.lots();
        let new_lots = old_lots + delta;
        if new_lots.abs() < LOT_EPSILON {
            self.positions.remove(id);
            info!("Closed position for {}", id);
            return Ok(TradeOutcome::Closed { old_lots });
        }

        existing.set_lots(new_lots);
        info!(
            "Updated {}: {} -> {} lots, strategy={}",
            id,
            old_lots,
            new_lots,
            existing.strategy()
        );
        Ok(TradeOutcome::Updated { old_lots, new_lots })
    }

    /// Apply trades in order. Rejected trades are skipped and returned.
    pub fn replay<'a, I>(&mut self, trades: I) -> Vec<PositionError>
    where
        I: IntoIterator<Item = &'a Trade>,
    {
        let mut errors = Vec::new();
        let mut applied = 0usize;
        for trade in trades {
            match self.apply_trade(trade) {
                Ok(outcome) => {
                    applied += 1;
                    debug!("{} -> {:?}", trade.instrument_id, outcome);
                }
                Err(e) => {
                    warn!("Rejected trade: {}", e);
                    errors.push(e);
                }
            }
        }
        info!("Replayed {} trades ({} rejected)", applied, errors.len());
        errors
    }

    pub fn get(&self, instrument_id: &str) -> Option<&Position> {
        self.positions.get(instrument_id)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// True when the held position and `trade_lots` point in different directions.
    pub fn is_opposing(&self, instrument_id: &str, trade_lots: f64) -> bool {
        match self.get(instrument_id) {
            Some(p) => (p.lots() > 0.0 && trade_lots < 0.0) || (p.lots() < 0.0 && trade_lots > 0.0),
            None => false,
        }
    }

    /// Open positions ordered by instrument id.
    pub fn snapshot(&self) -> Vec<Position> {
        self.positions.values().cloned().collect()
    }

    /// Attach last prices to held positions, looked up by symbol then underlying.
    /// Returns how many positions received a price.
    pub fn mark_prices(&mut self, prices: &PriceMap) -> usize {
        let mut marked = 0;
        for p in self.positions.values_mut() {
            let keys = [Some(p.symbol.as_str()), base_symbol(&p.symbol), p.underlying.as_deref()];
            let price = keys
                .into_iter()
                .flatten()
                .find_map(|k| prices.get(k).copied().filter(|v| valid_price(*v)));
            match price {
                Some(px) => {
                    p.last_price = Some(px);
                    marked += 1;
                }
                None => {
                    warn!("Could not find price for {}", p.symbol);
                    p.last_price = None;
                }
            }
        }
        marked
    }

    pub fn summary(&self) -> PositionSummary {
        let mut s = PositionSummary {
            total_positions: self.positions.len(),
            ..Default::default()
        };
        let mut by_type: HashMap<SecurityType, usize> = HashMap::new();
        for p in self.positions.values() {
            if p.lots() > 0.0 {
                s.long_positions += 1;
            } else if p.lots() < 0.0 {
                s.short_positions += 1;
            }
            *by_type.entry(p.security_type()).or_default() += 1;
            *s.by_strategy.entry(p.strategy().to_string()).or_default() += 1;
        }
        s.by_security_type = by_type.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        s
    }

    pub fn clear(&mut self) {
        self.positions.clear();
        info!("Cleared all positions");
    }
}

fn checked_lot_size(raw: i64) -> Option<u32> {
    u32::try_from(raw).ok().filter(|v| *v > 0)
}

fn open_position(
    id: &str,
    security_type: SecurityType,
    lots: f64,
    ctx: &NewPositionData,
) -> Result<Position, PositionError> {
    let lot_size = checked_lot_size(ctx.lot_size)
        .ok_or_else(|| PositionError::trade(id, format!("lot size must be positive, got {}", ctx.lot_size)))?;
    if security_type.is_option() && !valid_price(ctx.strike) {
        return Err(PositionError::trade(id, format!("invalid strike {}", ctx.strike)));
    }
    if ctx.symbol.trim().is_empty() {
        return Err(PositionError::trade(id, "empty symbol"));
    }
    Ok(Position::new(
        id.to_string(),
        ctx.symbol.clone(),
        security_type,
        ctx.expiry,
        ctx.strike,
        lots,
        lot_size,
        ctx.underlying.clone(),
    ))
}
