//! Entry point. Wires book -> position replay -> expiry delivery -> JSON report.

use anyhow::Context;
use chrono::NaiveDate;
use dotenvy::dotenv;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

use expiry_delivery::book::Book;
use expiry_delivery::config::AppConfig;
use expiry_delivery::deliverables::{self, Deliverable};
use expiry_delivery::positions::PositionSummary;
use expiry_delivery::settlement::{compare_stages, ExpiryComparison};
use expiry_delivery::{ExpiryResult, Position, PositionStage, PositionStore};

#[derive(Serialize)]
struct StageReport {
    positions: Vec<Position>,
    summary: PositionSummary,
    deliverables: Vec<Deliverable>,
    expiries: BTreeMap<NaiveDate, ExpiryResult>,
}

#[derive(Serialize)]
struct RunReport {
    rejected_positions: Vec<String>,
    rejected_trades: Vec<String>,
    pre_trade: StageReport,
    post_trade: StageReport,
    comparison: BTreeMap<NaiveDate, ExpiryComparison>,
}

fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with_writer(std::io::stderr)
        .init();

    let cfg_path = std::env::var("EXPIRY_DELIVERY_CONFIG").unwrap_or_else(|_| "config.yaml".to_string());
    let cfg = if std::path::Path::new(&cfg_path).exists() {
        AppConfig::load(&cfg_path)?
    } else {
        warn!("{} not found, using default configuration", cfg_path);
        AppConfig::default()
    };
    let engine = cfg.engine()?;

    let book_path = std::env::args().nth(1).unwrap_or_else(|| cfg.input.book_path.clone());
    let book = Book::load(&book_path)?;
    info!(
        "Loaded book {}: {} positions, {} trades, {} prices",
        book_path,
        book.positions.len(),
        book.trades.len(),
        book.prices.len()
    );

    let mut store = PositionStore::new();
    let init = store.initialize(book.positions);
    store.mark_prices(&book.prices);
    let pre_positions = store.snapshot();
    let pre_trade = StageReport {
        summary: store.summary(),
        deliverables: deliverables::calculate(&pre_positions, &book.prices, cfg.fx.usdinr_rate),
        expiries: engine.process_by_expiry(&pre_positions, &book.prices, PositionStage::PreTrade),
        positions: pre_positions,
    };

    let rejected_trades = store.replay(&book.trades);
    store.mark_prices(&book.prices);
    let post_positions = store.snapshot();
    let post_trade = StageReport {
        summary: store.summary(),
        deliverables: deliverables::calculate(&post_positions, &book.prices, cfg.fx.usdinr_rate),
        expiries: engine.process_by_expiry(&post_positions, &book.prices, PositionStage::PostTrade),
        positions: post_positions,
    };

    for (expiry, result) in &post_trade.expiries {
        info!(
            "Expiry {}: {} derivative legs, {} cash legs, {} errors, net consideration {:.2}",
            expiry,
            result.derivatives.len(),
            result.cash_trades.len(),
            result.errors.len(),
            result.cash_summary.grand_total.net_consideration
        );
    }

    let report = RunReport {
        rejected_positions: init.rejected.iter().map(|e| e.to_string()).collect(),
        rejected_trades: rejected_trades.iter().map(|e| e.to_string()).collect(),
        comparison: compare_stages(&pre_trade.expiries, &post_trade.expiries),
        pre_trade,
        post_trade,
    };
    let out = serde_json::to_string_pretty(&report).context("serialize report")?;
    println!("{out}");
    Ok(())
}
