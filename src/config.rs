// src/config.rs
use serde::Deserialize;
use std::{fs, path::Path};

use crate::feed::FeedConfig;
use crate::sim::SimConfig;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub general: General,
    pub feed: FeedConfig,
    pub sim: SimConfig,
    /// Symbols subscribed at startup.
    pub symbols: Vec<String>,
    pub metrics: Option<Metrics>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct General {
    /// Structured JSON logs to stdout.
    pub json_logs: bool,
    /// Cadence of the statistics dump.
    pub stats_interval_ms: u64,
}

impl Default for General {
    fn default() -> Self {
        Self {
            json_logs: false,
            stats_interval_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Metrics {
    /// Bind address for the Prometheus exporter (e.g. "0.0.0.0:9100")
    pub bind: String,
}

fn default_symbols() -> Vec<String> {
    ["AAPL", "MSFT", "GOOGL", "TSLA", "META", "AMZN", "NVDA", "NFLX"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            general: General::default(),
            feed: FeedConfig::default(),
            sim: SimConfig::default(),
            symbols: default_symbols(),
            metrics: None,
        }
    }
}

impl AppConfig {
    pub fn from_file(p: &Path) -> anyhow::Result<Self> {
        let s = fs::read_to_string(p)?;
        let cfg: AppConfig = toml::from_str(&s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Falls back to defaults when the file does not exist, so the binary
    /// also runs flagless.
    pub fn load_or_default(p: &Path) -> anyhow::Result<Self> {
        if p.exists() {
            Self::from_file(p)
        } else {
            let cfg = AppConfig::default();
            cfg.validate()?;
            Ok(cfg)
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.general.stats_interval_ms == 0 {
            anyhow::bail!("general.stats_interval_ms must be > 0");
        }
        if self.sim.update_interval_us == 0 {
            anyhow::bail!("sim.update_interval_us must be > 0");
        }
        if self.sim.min_quantity >= self.sim.max_quantity {
            anyhow::bail!("sim.min_quantity must be < sim.max_quantity");
        }
        if self.sim.spike_probability > 100 {
            anyhow::bail!("sim.spike_probability must be in [0, 100]");
        }
        if self.symbols.is_empty() {
            anyhow::bail!("symbols must not be empty");
        }
        for symbol in &self.symbols {
            if symbol.is_empty() || symbol.len() > 8 || !symbol.is_ascii() {
                anyhow::bail!("symbol '{symbol}' must be 1..=8 ASCII bytes");
            }
        }
        Ok(())
    }
}
