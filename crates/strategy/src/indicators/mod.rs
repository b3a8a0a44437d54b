pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;

pub use ema::ema;
pub use macd::{macd, MacdSeries};
pub use rsi::rsi_series;
pub use sma::sma;
