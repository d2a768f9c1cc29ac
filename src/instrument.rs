//! Instrument classification: index products and underlying tickers.

use regex::Regex;
use std::sync::OnceLock;

use crate::types::Position;
use crate::utils::base_symbol;

/// Default index root symbols for the NSE derivatives book.
pub const DEFAULT_INDEX_ROOTS: &[&str] = &["NIFTY", "NZ", "AF1", "NSEBANK"];

/// Decides whether a ticker is an index product (cash-settled, never delivered).
///
/// A ticker is an index product when it contains the token `INDEX` or any of the
/// configured root symbols, compared case-insensitively as substrings.
#[derive(Debug, Clone)]
pub struct IndexUniverse {
    roots: Vec<String>,
    pattern: Regex,
}

impl IndexUniverse {
    pub fn new<I, S>(roots: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let roots: Vec<String> = roots
            .into_iter()
            .map(|r| r.as_ref().trim().to_ascii_uppercase())
            .filter(|r| !r.is_empty())
            .collect();
        let alternatives = std::iter::once("INDEX".to_string())
            .chain(roots.iter().map(|r| regex::escape(r)))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = Regex::new(&format!("(?i)(?:{alternatives})"))?;
        Ok(Self { roots, pattern })
    }

    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    pub fn is_index(&self, ticker: &str) -> bool {
        self.pattern.is_match(ticker)
    }
}

impl Default for IndexUniverse {
    fn default() -> Self {
        Self::new(DEFAULT_INDEX_ROOTS.iter().copied()).expect("default index roots are literals")
    }
}

fn equity_ticker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // "RELIANCE=Z4 IS Equity", "RELIANCE IS 12/26/24 C2500 Equity"
    RE.get_or_init(|| Regex::new(r"^([^\s=]+)(?:=\S*)?\s+IS\s").unwrap())
}

fn index_ticker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // "NZ1 Index", "NIFTY 12/26/24 C24000 Index"
    RE.get_or_init(|| Regex::new(r"(?i)^(\S+)\s.*\bIndex$").unwrap())
}

/// Underlying ticker for settlement legs.
///
/// Uses the position's own underlying when present; otherwise derives it from the
/// Bloomberg-style instrument ticker, falling back to the symbol.
pub fn underlying_of(position: &Position) -> String {
    if let Some(u) = &position.underlying {
        return u.clone();
    }
    derive_underlying(&position.instrument_id)
        .unwrap_or_else(|| base_symbol(&position.symbol).unwrap_or(&position.symbol).to_string())
}

pub fn derive_underlying(ticker: &str) -> Option<String> {
    let t = ticker.trim();
    if let Some(c) = equity_ticker_re().captures(t) {
        return Some(format!("{} IS Equity", &c[1]));
    }
    if let Some(c) = index_ticker_re().captures(t) {
        return Some(format!("{} Index", &c[1]));
    }
    None
}
