pub mod account;
pub mod config;
pub mod error;
pub mod feed;
pub mod types;

pub use account::{Account, Execution};
pub use config::Config;
pub use error::{Error, Result};
pub use feed::{MarketDataFeed, MarketEvent, Subscription};
pub use types::*;
