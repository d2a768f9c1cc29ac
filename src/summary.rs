//! Net settlement per underlying: trade rows, a NET DELIVERABLE row per underlying,
//! and a GRAND TOTAL across all of them.

use serde::Serialize;

use crate::settlement::CashLeg;
use crate::types::{Side, TradeNote};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TradeRow {
    pub side: Side,
    pub quantity: f64,
    pub price: f64,
    /// Signed: positive for buys, negative for sells.
    pub consideration: f64,
    pub stt: f64,
    pub stamp_duty: f64,
    pub taxes: f64,
    pub note: Option<TradeNote>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct NetDeliverable {
    pub buy_quantity: f64,
    pub sell_quantity: f64,
    pub net_quantity: f64,
    pub buy_consideration: f64,
    pub sell_consideration: f64,
    pub net_consideration: f64,
    pub stt: f64,
    pub stamp_duty: f64,
    pub taxes: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UnderlyingSummary {
    pub underlying: String,
    pub trades: Vec<TradeRow>,
    pub net: NetDeliverable,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct GrandTotal {
    pub net_consideration: f64,
    pub stt: f64,
    pub stamp_duty: f64,
    pub taxes: f64,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct CashSummary {
    /// One entry per underlying, in order of first appearance.
    pub underlyings: Vec<UnderlyingSummary>,
    pub grand_total: GrandTotal,
}

/// Flat view of the summary table, as a report writer would lay it out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SummaryRow<'a> {
    Trade {
        underlying: &'a str,
        row: &'a TradeRow,
    },
    NetDeliverable {
        underlying: &'a str,
        net: &'a NetDeliverable,
    },
    GrandTotal(&'a GrandTotal),
}

impl CashSummary {
    pub fn is_empty(&self) -> bool {
        self.underlyings.is_empty()
    }

    pub fn get(&self, underlying: &str) -> Option<&UnderlyingSummary> {
        self.underlyings.iter().find(|u| u.underlying == underlying)
    }

    pub fn rows(&self) -> Vec<SummaryRow<'_>> {
        let mut out = Vec::new();
        for u in &self.underlyings {
            out.extend(u.trades.iter().map(|row| SummaryRow::Trade {
                underlying: &u.underlying,
                row,
            }));
            out.push(SummaryRow::NetDeliverable {
                underlying: &u.underlying,
                net: &u.net,
            });
        }
        out.push(SummaryRow::GrandTotal(&self.grand_total));
        out
    }
}

/// Consolidate cash legs per underlying.
pub fn aggregate(cash_trades: &[CashLeg]) -> CashSummary {
    let mut underlyings: Vec<UnderlyingSummary> = Vec::new();

    for leg in cash_trades {
        let idx = match underlyings.iter().position(|u| u.underlying == leg.underlying) {
            Some(i) => i,
            None => {
                underlyings.push(UnderlyingSummary {
                    underlying: leg.underlying.clone(),
                    trades: Vec::new(),
                    net: NetDeliverable::default(),
                });
                underlyings.len() - 1
            }
        };
        let u = &mut underlyings[idx];
        let value = leg.quantity * leg.price;
        match leg.side {
            Side::Buy => {
                u.net.buy_quantity += leg.quantity;
                u.net.buy_consideration += value;
            }
            Side::Sell => {
                u.net.sell_quantity += leg.quantity;
                u.net.sell_consideration += value;
            }
        }
        u.net.stt += leg.stt;
        u.net.stamp_duty += leg.stamp_duty;
        u.trades.push(TradeRow {
            side: leg.side,
            quantity: leg.quantity,
            price: leg.price,
            consideration: leg.signed_consideration(),
            stt: leg.stt,
            stamp_duty: leg.stamp_duty,
            taxes: leg.taxes(),
            note: leg.note,
        });
    }

    let mut grand_total = GrandTotal::default();
    for u in &mut underlyings {
        let n = &mut u.net;
        n.net_quantity = n.buy_quantity - n.sell_quantity;
        n.net_consideration = n.buy_consideration - n.sell_consideration;
        n.taxes = n.stt + n.stamp_duty;

        grand_total.net_consideration += n.net_consideration;
        grand_total.stt += n.stt;
        grand_total.stamp_duty += n.stamp_duty;
        grand_total.taxes += n.taxes;
    }

    CashSummary {
        underlyings,
        grand_total,
    }
}
