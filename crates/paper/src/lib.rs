use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use common::{Account, Error, Execution, Result};

/// One open simulated position.
#[derive(Debug, Clone)]
struct OpenPosition {
    symbol: String,
    quantity: f64,
    /// Quote currency spent to open, commission included.
    cost: f64,
}

/// In-memory account for paper trading.
///
/// Tracks a quote-currency balance and at most one open position. Buys spend
/// a fixed fraction of the balance; sells close the whole position and report
/// the realized profit net of commissions on both legs. No real orders are
/// ever sent to an exchange.
pub struct SimulatedAccount {
    state: RwLock<AccountState>,
    /// Commission charged on each fill, e.g. 0.001 = 0.1%.
    commission_rate: f64,
    /// Fraction of the balance committed per buy, e.g. 0.95.
    max_position_size: f64,
}

#[derive(Debug)]
struct AccountState {
    balance: f64,
    position: Option<OpenPosition>,
}

impl SimulatedAccount {
    pub fn new(initial_balance: f64, commission_rate: f64, max_position_size: f64) -> Self {
        info!(
            balance = initial_balance,
            commission_rate, max_position_size, "SimulatedAccount initialized"
        );
        Self {
            state: RwLock::new(AccountState {
                balance: initial_balance,
                position: None,
            }),
            commission_rate,
            max_position_size,
        }
    }

    /// Defaults matching a small test account: 1000 quote units, 0.1%
    /// commission, 95% position sizing.
    pub fn with_balance(initial_balance: f64) -> Self {
        Self::new(initial_balance, 0.001, 0.95)
    }
}

#[async_trait]
impl Account for SimulatedAccount {
    async fn balance(&self) -> Result<f64> {
        Ok(self.state.read().await.balance)
    }

    async fn has_position(&self, symbol: &str) -> Result<bool> {
        let state = self.state.read().await;
        Ok(state
            .position
            .as_ref()
            .is_some_and(|p| p.symbol == symbol))
    }

    async fn buy(&self, symbol: &str, price: f64) -> Result<Execution> {
        if price <= 0.0 {
            return Err(Error::Order(format!("invalid buy price {price}")));
        }

        let mut state = self.state.write().await;
        if state.position.is_some() {
            return Err(Error::Order("position already open".to_string()));
        }

        let spend = state.balance * self.max_position_size;
        if spend <= 0.0 {
            return Err(Error::Order(format!(
                "insufficient balance {} for buy",
                state.balance
            )));
        }

        let quantity = spend * (1.0 - self.commission_rate) / price;
        state.balance -= spend;
        state.position = Some(OpenPosition {
            symbol: symbol.to_string(),
            quantity,
            cost: spend,
        });

        debug!(symbol, price, quantity, "Simulated buy filled");
        Ok(Execution {
            order_id: uuid::Uuid::new_v4().to_string(),
            quantity,
            profit: None,
        })
    }

    async fn sell(&self, symbol: &str, price: f64) -> Result<Execution> {
        if price <= 0.0 {
            return Err(Error::Order(format!("invalid sell price {price}")));
        }

        let mut state = self.state.write().await;
        let position = match state.position.take() {
            Some(p) if p.symbol == symbol => p,
            Some(p) => {
                // Not ours to close — put it back
                let held = p.symbol.clone();
                state.position = Some(p);
                return Err(Error::Order(format!(
                    "no open position for {symbol} (holding {held})"
                )));
            }
            None => return Err(Error::Order(format!("no open position for {symbol}"))),
        };

        let proceeds = position.quantity * price * (1.0 - self.commission_rate);
        let profit = proceeds - position.cost;
        state.balance += proceeds;

        debug!(symbol, price, quantity = position.quantity, profit, "Simulated sell filled");
        Ok(Execution {
            order_id: uuid::Uuid::new_v4().to_string(),
            quantity: position.quantity,
            profit: Some(profit),
        })
    }
}
