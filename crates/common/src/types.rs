use serde::{Deserialize, Serialize};

/// One OHLC candlestick from the exchange stream or a historical query.
/// Strategies only process candles where `is_closed == true`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    /// Open time, epoch milliseconds.
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// Close time, epoch milliseconds.
    pub close_time: i64,
    /// True once the candle is finalized.
    pub is_closed: bool,
}

/// A single executed trade from the exchange's trade stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tick {
    /// Trade time, epoch milliseconds.
    pub timestamp: i64,
    pub price: f64,
    pub quantity: f64,
    pub is_buyer_maker: bool,
}

/// One side of the order book at a given price.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: f64,
    pub quantity: f64,
}

/// Order book snapshot. Bids are ordered best-first, asks likewise.
/// Accepted by every strategy; the three reference strategies ignore it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepthSnapshot {
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
}

/// Direction of a trade decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Buy,
    Sell,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Buy => write!(f, "BUY"),
            Direction::Sell => write!(f, "SELL"),
        }
    }
}

/// A trade decision emitted by a strategy. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub direction: Direction,
    /// Price the decision was made at. Always > 0.
    pub price: f64,
    /// Decision time, epoch seconds.
    pub timestamp: i64,
    /// Strength of the decision in [0, 1].
    pub confidence: f64,
}

impl Signal {
    /// Build a signal with full confidence.
    pub fn new(direction: Direction, price: f64, timestamp: i64) -> Self {
        Self::with_confidence(direction, price, timestamp, 1.0)
    }

    /// Build a signal with an explicit confidence, clamped to [0, 1].
    pub fn with_confidence(direction: Direction, price: f64, timestamp: i64, confidence: f64) -> Self {
        Self {
            direction,
            price,
            timestamp,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// One executed trade in the session ledger. Never mutated after append.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub side: Direction,
    pub price: f64,
    /// Execution time, epoch seconds.
    pub timestamp: i64,
    pub quantity: f64,
    /// Realized profit; only present on sells.
    pub profit: Option<f64>,
    /// True when the trade came from a manual override rather than a signal.
    pub manual: bool,
}

/// Session performance, derived on demand from the ledger and balances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub start_balance: f64,
    pub current_balance: f64,
    pub profit: f64,
    pub profit_percent: f64,
    pub num_trades: usize,
    pub num_buy_trades: usize,
    pub num_sell_trades: usize,
    /// Percentage of sell trades with positive profit; 0 when there are none.
    pub win_rate: f64,
}

/// Whether the bot trades against the real exchange or simulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    Live,
    Paper,
}

impl std::fmt::Display for TradingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradingMode::Live => write!(f, "live"),
            TradingMode::Paper => write!(f, "paper"),
        }
    }
}

/// Lifecycle state of the trading orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BotState {
    #[default]
    Stopped,
    Running,
}

impl std::fmt::Display for BotState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BotState::Stopped => write!(f, "stopped"),
            BotState::Running => write!(f, "running"),
        }
    }
}
