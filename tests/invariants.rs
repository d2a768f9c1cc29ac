//! Invariant sweeps over deterministic trade streams and position sets.

mod support;

use expiry_delivery::summary::SummaryRow;
use expiry_delivery::{
    aggregate, ExpiryDeliveryEngine, Position, PositionStage, PositionStore, SecurityType, Strategy,
};
use support::{approx, jan30, opening_trade, prices, seed, trade, Lcg};

const TYPES: [SecurityType; 3] = [SecurityType::Futures, SecurityType::Call, SecurityType::Put];

fn mixed_book(rng: &mut Lcg) -> Vec<Position> {
    let mut store = PositionStore::new();
    let names = ["ACC", "ITC", "LT", "TCS", "NIFTY"];
    let mut seeds = Vec::new();
    for (i, name) in names.iter().enumerate() {
        for (j, st) in TYPES.iter().enumerate() {
            let ticker = if *name == "NIFTY" {
                format!("NIFTY {i}{j} Index")
            } else {
                format!("{name} IS {i}{j} Equity")
            };
            let strike = if st.is_option() { 90.0 + (rng.next_u32() % 20) as f64 } else { 0.0 };
            let mut s = seed(&ticker, name, *st, strike, rng.lots(6), 25 + (j as i64) * 25);
            if j == 2 {
                s.expiry = jan30();
            }
            seeds.push(s);
        }
    }
    assert!(store.initialize(seeds).rejected.is_empty());
    store.snapshot()
}

fn book_prices() -> expiry_delivery::PriceMap {
    prices(&[("ACC", 95.0), ("ITC", 104.0), ("LT", 100.0), ("NIFTY", 101.0)])
}

#[test]
fn position_closes_whenever_cumulative_lots_return_to_zero() {
    let mut rng = Lcg::new(7);
    for round in 0..50 {
        let id = format!("ACC=Z{round} IS Equity");
        let mut store = PositionStore::new();
        let mut deltas: Vec<f64> = (0..(2 + round % 6)).map(|_| rng.lots(9)).collect();
        let sum: f64 = deltas.iter().sum();
        if sum != 0.0 {
            deltas.push(-sum);
        }

        let mut running = 0.0;
        for (k, d) in deltas.iter().enumerate() {
            let t = if store.get(&id).is_none() {
                opening_trade(&id, "ACC", SecurityType::Futures, 0.0, *d, 25)
            } else {
                trade(&id, SecurityType::Futures, *d)
            };
            store.apply_trade(&t).unwrap();
            running += d;
            if running == 0.0 {
                assert!(store.get(&id).is_none(), "round {round} step {k}");
            } else {
                let p = store.get(&id).unwrap();
                assert_eq!(p.lots(), running);
            }
        }
        assert!(store.is_empty(), "round {round}");
    }
}

#[test]
fn strategy_and_derived_fields_never_go_stale() {
    let mut rng = Lcg::new(11);
    for st in TYPES {
        let id = format!("ITC {st} Equity");
        let mut store = PositionStore::new();
        for _ in 0..200 {
            let d = rng.lots(5);
            let t = if store.get(&id).is_none() {
                opening_trade(&id, "ITC", st, 100.0, d, 40)
            } else {
                trade(&id, st, d)
            };
            store.apply_trade(&t).unwrap();
            for p in store.snapshot() {
                assert_eq!(p.strategy(), Strategy::classify(p.security_type(), p.lots()));
                assert_eq!(p.quantity(), p.lots() * p.lot_size() as f64);
                assert!(!p.is_flat());
            }
        }
    }
}

#[test]
fn settlement_is_idempotent() {
    let positions = mixed_book(&mut Lcg::new(3));
    let engine = ExpiryDeliveryEngine::default();
    let px = book_prices();
    let first = engine.process_by_expiry(&positions, &px, PositionStage::PostTrade);
    let second = engine.process_by_expiry(&positions, &px, PositionStage::PostTrade);
    assert_eq!(first, second);
    for r in first.values() {
        assert_eq!(aggregate(&r.cash_trades), aggregate(&r.cash_trades));
    }
}

#[test]
fn taxes_are_non_negative_and_zero_for_assignments() {
    for seed_value in 1..20 {
        let positions = mixed_book(&mut Lcg::new(seed_value));
        let out = ExpiryDeliveryEngine::default().process_by_expiry(&positions, &book_prices(), PositionStage::PostTrade);
        for r in out.values() {
            for c in &r.cash_trades {
                assert!(c.stt >= 0.0 && c.stamp_duty >= 0.0);
            }
            for (d, c) in r
                .derivatives
                .iter()
                .filter(|d| d.security_type.is_option() && d.note.is_some())
                .zip(r.cash_trades.iter().filter(|c| c.note.is_some()))
            {
                // Short holders buy back the option and are assigned.
                if d.side == expiry_delivery::Side::Buy {
                    assert_eq!(c.stt, 0.0);
                    assert_eq!(c.stamp_duty, 0.0);
                }
            }
        }
    }
}

#[test]
fn grand_total_matches_sum_of_net_deliverables() {
    for seed_value in 1..20 {
        let positions = mixed_book(&mut Lcg::new(seed_value));
        let out = ExpiryDeliveryEngine::default().process_by_expiry(&positions, &book_prices(), PositionStage::PostTrade);
        for r in out.values() {
            let s = &r.cash_summary;
            let nets: Vec<_> = s
                .rows()
                .into_iter()
                .filter_map(|row| match row {
                    SummaryRow::NetDeliverable { net, .. } => Some(net),
                    _ => None,
                })
                .collect();
            let sum_consideration: f64 = nets.iter().map(|n| n.net_consideration).sum();
            let sum_taxes: f64 = nets.iter().map(|n| n.taxes).sum();
            assert!(approx(s.grand_total.net_consideration, sum_consideration));
            assert!(approx(s.grand_total.taxes, sum_taxes));
            assert!(matches!(s.rows().last(), Some(SummaryRow::GrandTotal(_))));
        }
    }
}

#[test]
fn missing_price_only_drops_that_position() {
    let positions = mixed_book(&mut Lcg::new(5));
    let out = ExpiryDeliveryEngine::default().process_by_expiry(&positions, &book_prices(), PositionStage::PostTrade);
    for r in out.values() {
        assert_eq!(r.derivatives.len() + r.errors.len(), r.position_count);
        assert!(r.errors.iter().all(|e| e.symbol == "TCS" && e.reason == "No price available"));
    }
}
