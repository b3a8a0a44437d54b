use crate::TradingMode;

/// All configuration loaded from environment variables at startup.
/// Missing required variables cause an immediate panic with a clear message.
#[derive(Debug, Clone)]
pub struct Config {
    /// Trading pair, e.g. "BTCUSDT".
    pub symbol: String,

    pub trading_mode: TradingMode,

    // Exchange credentials (required for live mode only)
    pub binance_api_key: String,
    pub binance_secret: String,
    /// Use the Binance spot testnet endpoints.
    pub binance_testnet: bool,

    // Simulated account
    pub initial_balance: f64,
    pub commission_rate: f64,
    pub max_position_size: f64,

    /// Closed candles fetched on start to warm indicators up. 0 disables.
    pub backfill_candles: usize,

    /// Strategy descriptor file path.
    pub strategy_config_path: String,
}

impl Config {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present. Panics on any missing required variable.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        let trading_mode = match required_env("TRADING_MODE").to_lowercase().as_str() {
            "paper" => TradingMode::Paper,
            "live" => TradingMode::Live,
            other => panic!("ERROR: TRADING_MODE must be 'paper' or 'live', got: '{other}'"),
        };

        // Credentials are only required when they will actually be used.
        let (binance_api_key, binance_secret) = match trading_mode {
            TradingMode::Live => (required_env("BINANCE_API_KEY"), required_env("BINANCE_SECRET")),
            TradingMode::Paper => (
                optional_env("BINANCE_API_KEY").unwrap_or_default(),
                optional_env("BINANCE_SECRET").unwrap_or_default(),
            ),
        };

        Config {
            symbol: optional_env("SYMBOL").unwrap_or_else(|| "BTCUSDT".to_string()),
            trading_mode,
            binance_api_key,
            binance_secret,
            binance_testnet: optional_env("BINANCE_TESTNET")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(true),
            initial_balance: optional_env("INITIAL_BALANCE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(1000.0),
            commission_rate: optional_env("COMMISSION_RATE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.001),
            max_position_size: optional_env("MAX_POSITION_SIZE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.95),
            backfill_candles: optional_env("BACKFILL_CANDLES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(100),
            strategy_config_path: optional_env("STRATEGY_CONFIG_PATH")
                .unwrap_or_else(|| "config/strategy.toml".to_string()),
        }
    }
}

fn required_env(key: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| {
        panic!("Required environment variable '{key}' is not set. Check your .env file.")
    })
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}
