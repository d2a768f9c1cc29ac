//! Normalized input bundle for one run: opening positions, the trade stream and prices.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::types::{PositionSeed, PriceMap, Trade};

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Book {
    #[serde(default)]
    pub positions: Vec<PositionSeed>,
    #[serde(default)]
    pub trades: Vec<Trade>,
    #[serde(default)]
    pub prices: PriceMap,
}

impl Book {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let s = fs::read_to_string(path).with_context(|| format!("read book {}", path.display()))?;
        let book: Self = serde_json::from_str(&s).with_context(|| format!("parse book {}", path.display()))?;
        Ok(book)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let s = serde_json::to_string_pretty(self)?;
        fs::write(path, s)?;
        Ok(())
    }
}
