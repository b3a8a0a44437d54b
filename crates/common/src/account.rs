use async_trait::async_trait;

use crate::Result;

/// Confirmation of an executed buy or sell.
#[derive(Debug, Clone)]
pub struct Execution {
    pub order_id: String,
    /// Base-asset quantity filled.
    pub quantity: f64,
    /// Realized profit in quote currency; only present on sells.
    pub profit: Option<f64>,
}

/// Abstraction over the account / order-execution backend.
///
/// `SimulatedAccount` in `crates/paper` implements this for simulation.
/// `BinanceAccount` in `crates/engine` implements this for live trading.
#[async_trait]
pub trait Account: Send + Sync {
    /// Free quote-currency balance.
    async fn balance(&self) -> Result<f64>;

    /// Whether a position is currently open for the symbol.
    async fn has_position(&self, symbol: &str) -> Result<bool>;

    /// Open a position at roughly the given price. Fails if a position is
    /// already open or the balance cannot cover an order.
    async fn buy(&self, symbol: &str, price: f64) -> Result<Execution>;

    /// Close the open position at roughly the given price, reporting the
    /// realized profit. Fails if no position is open.
    async fn sell(&self, symbol: &str, price: f64) -> Result<Execution>;
}
