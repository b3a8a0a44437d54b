mod account;
mod feed;

pub use account::BinanceAccount;
pub use feed::BinanceFeed;
