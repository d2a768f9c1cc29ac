//! Load and validate runtime configuration.

use anyhow::{bail, Context};
use serde::Deserialize;
use std::{fs, path::Path};

use crate::instrument::{IndexUniverse, DEFAULT_INDEX_ROOTS};
use crate::settlement::{ExpiryDeliveryEngine, TaxSchedule};

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SettlementCfg {
    /// Root symbols treated as index products (substring, case-insensitive).
    pub index_roots: Vec<String>,
    pub taxes: TaxSchedule,
}

impl Default for SettlementCfg {
    fn default() -> Self {
        Self {
            index_roots: DEFAULT_INDEX_ROOTS.iter().map(|s| s.to_string()).collect(),
            taxes: TaxSchedule::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FxCfg {
    pub usdinr_rate: f64,
}

impl Default for FxCfg {
    fn default() -> Self {
        Self { usdinr_rate: 88.0 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct InputCfg {
    pub book_path: String,
}

impl Default for InputCfg {
    fn default() -> Self {
        Self {
            book_path: "book.json".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub settlement: SettlementCfg,
    pub fx: FxCfg,
    pub input: InputCfg,
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let s = fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
        Self::from_yaml(&s)
    }

    pub fn from_yaml(s: &str) -> anyhow::Result<Self> {
        let cfg: Self = serde_yaml::from_str(s).context("parse config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> anyhow::Result<()> {
        let t = &self.settlement.taxes;
        for (name, rate) in [
            ("futures_stt_rate", t.futures_stt_rate),
            ("futures_stamp_rate", t.futures_stamp_rate),
            ("option_stt_rate", t.option_stt_rate),
            ("option_stamp_rate", t.option_stamp_rate),
        ] {
            if !rate.is_finite() || rate < 0.0 {
                bail!("settlement.taxes.{} must be a non-negative number, got {}", name, rate);
            }
        }
        if !self.fx.usdinr_rate.is_finite() || self.fx.usdinr_rate <= 0.0 {
            bail!("fx.usdinr_rate must be positive, got {}", self.fx.usdinr_rate);
        }
        Ok(())
    }

    pub fn engine(&self) -> anyhow::Result<ExpiryDeliveryEngine> {
        let index = IndexUniverse::new(&self.settlement.index_roots).context("compile index roots")?;
        Ok(ExpiryDeliveryEngine::new(index, self.settlement.taxes))
    }
}
