//! Physical deliverables and intrinsic value per position, independent of expiry grouping.

use serde::Serialize;

use crate::settlement::{intrinsic_value, is_itm, resolve_price};
use crate::types::{Position, PriceMap, SecurityType};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Deliverable {
    pub instrument_id: String,
    pub symbol: String,
    pub security_type: SecurityType,
    pub strike: f64,
    pub lots: f64,
    pub lot_size: u32,
    /// 0 when no price resolved.
    pub spot_price: f64,
    pub deliverable_lots: f64,
    pub deliverable_qty: f64,
    pub intrinsic_value_inr: f64,
    pub intrinsic_value_usd: f64,
}

/// Futures always deliver; options deliver only in the money. Puts deliver the
/// opposite way round, so their deliverable lots are negated.
pub fn calculate(positions: &[Position], prices: &PriceMap, usdinr_rate: f64) -> Vec<Deliverable> {
    positions
        .iter()
        .map(|p| {
            let spot = resolve_price(p, prices).unwrap_or(0.0);
            let lots = p.lots();
            let has_spot = spot > 0.0;
            let deliverable_lots = match p.security_type() {
                SecurityType::Futures => lots,
                SecurityType::Call if has_spot && is_itm(SecurityType::Call, spot, p.strike()) => lots,
                SecurityType::Put if has_spot && is_itm(SecurityType::Put, spot, p.strike()) => -lots,
                SecurityType::Call | SecurityType::Put => 0.0,
            };
            let iv = if has_spot && is_itm(p.security_type(), spot, p.strike()) {
                lots * p.lot_size() as f64 * intrinsic_value(p.security_type(), spot, p.strike())
            } else {
                0.0
            };
            let usd = if usdinr_rate > 0.0 { iv / usdinr_rate } else { 0.0 };
            Deliverable {
                instrument_id: p.instrument_id.clone(),
                symbol: p.symbol.clone(),
                security_type: p.security_type(),
                strike: p.strike(),
                lots,
                lot_size: p.lot_size(),
                spot_price: spot,
                deliverable_lots,
                deliverable_qty: deliverable_lots * p.lot_size() as f64,
                intrinsic_value_inr: iv,
                intrinsic_value_usd: usd,
            }
        })
        .collect()
}
