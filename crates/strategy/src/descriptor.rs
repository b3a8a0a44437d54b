use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{MaCrossoverStrategy, MacdStrategy, RsiStrategy, Strategy};

/// Runtime-selectable strategy descriptor: a tagged variant with a typed
/// parameter set per kind.
///
/// Example `config/strategy.toml`:
/// ```toml
/// [strategy]
/// type = "rsi"
/// period = 14
/// oversold = 30.0
/// overbought = 70.0
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategySpec {
    MaCrossover {
        #[serde(default = "default_ma_fast")]
        fast_period: usize,
        #[serde(default = "default_ma_slow")]
        slow_period: usize,
    },
    Rsi {
        #[serde(default = "default_rsi_period")]
        period: usize,
        #[serde(default = "default_oversold")]
        oversold: f64,
        #[serde(default = "default_overbought")]
        overbought: f64,
    },
    Macd {
        #[serde(default = "default_macd_fast")]
        fast_period: usize,
        #[serde(default = "default_macd_slow")]
        slow_period: usize,
        #[serde(default = "default_macd_signal")]
        signal_period: usize,
    },
}

fn default_ma_fast() -> usize {
    9
}
fn default_ma_slow() -> usize {
    20
}
fn default_rsi_period() -> usize {
    14
}
fn default_oversold() -> f64 {
    30.0
}
fn default_overbought() -> f64 {
    70.0
}
fn default_macd_fast() -> usize {
    12
}
fn default_macd_slow() -> usize {
    26
}
fn default_macd_signal() -> usize {
    9
}

impl StrategySpec {
    /// Construct the strategy this descriptor names.
    pub fn build(&self) -> Box<dyn Strategy> {
        match *self {
            StrategySpec::MaCrossover {
                fast_period,
                slow_period,
            } => Box::new(MaCrossoverStrategy::new(fast_period, slow_period)),
            StrategySpec::Rsi {
                period,
                oversold,
                overbought,
            } => Box::new(RsiStrategy::new(period, oversold, overbought)),
            StrategySpec::Macd {
                fast_period,
                slow_period,
                signal_period,
            } => Box::new(MacdStrategy::new(fast_period, slow_period, signal_period)),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            StrategySpec::MaCrossover { .. } => "ma_crossover",
            StrategySpec::Rsi { .. } => "rsi",
            StrategySpec::Macd { .. } => "macd",
        }
    }
}

/// Top-level strategy descriptor file (TOML).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrategyFileConfig {
    pub strategy: StrategySpec,
}

impl StrategyFileConfig {
    /// Load from a TOML file. Exits process on error.
    pub fn load(path: &str) -> Self {
        let content = std::fs::read_to_string(path)
            .unwrap_or_else(|e| panic!("Failed to read strategy config at '{path}': {e}"));
        let cfg: Self = toml::from_str(&content)
            .unwrap_or_else(|e| panic!("Failed to parse strategy config at '{path}': {e}"));
        info!(kind = cfg.strategy.kind(), "Loaded strategy descriptor");
        cfg
    }
}
