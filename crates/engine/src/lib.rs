pub mod binance;
pub mod bot;

pub use binance::{BinanceAccount, BinanceFeed};
pub use bot::TradingBot;
