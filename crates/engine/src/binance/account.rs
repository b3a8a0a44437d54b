use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use sha2::Sha256;
use tokio::sync::RwLock;
use tracing::{debug, info};

use common::{Account, Error, Execution, Result};

const BASE_URL: &str = "https://api.binance.com";
const BASE_URL_TESTNET: &str = "https://testnet.binance.vision";

/// Balances below this are considered dust, not a position.
const POSITION_EPSILON: f64 = 1e-8;

/// Live spot account backed by Binance's signed REST API.
///
/// Market orders only. Buys commit a fixed fraction of the free quote
/// balance via `quoteOrderQty`; sells close the full base-asset balance.
/// The cost basis of a buy placed through this client is remembered so the
/// matching sell can report realized profit.
pub struct BinanceAccount {
    api_key: String,
    secret: String,
    http: Client,
    base_url: &'static str,
    quote_asset: String,
    /// Fraction of the free quote balance committed per buy.
    position_size: f64,
    /// Quote spent on the open position, if we opened it this session.
    open_cost: RwLock<Option<f64>>,
}

impl BinanceAccount {
    pub fn new(
        api_key: impl Into<String>,
        secret: impl Into<String>,
        testnet: bool,
        position_size: f64,
    ) -> Self {
        info!(testnet, "Initialized Binance account client");
        Self {
            api_key: api_key.into(),
            secret: secret.into(),
            http: Client::builder()
                .use_rustls_tls()
                .build()
                .expect("Failed to build HTTP client"),
            base_url: if testnet { BASE_URL_TESTNET } else { BASE_URL },
            quote_asset: "USDT".to_string(),
            position_size,
            open_cost: RwLock::new(None),
        }
    }

    fn timestamp_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    fn sign(&self, query: &str) -> String {
        type HmacSha256 = Hmac<Sha256>;
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(query.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    async fn signed_get(&self, path: &str, params: &str) -> Result<String> {
        let ts = Self::timestamp_ms();
        let query = if params.is_empty() {
            format!("timestamp={ts}")
        } else {
            format!("{params}&timestamp={ts}")
        };
        let signature = self.sign(&query);
        let url = format!("{}{path}?{query}&signature={signature}", self.base_url);

        let resp = self
            .http
            .get(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;
        if !status.is_success() {
            return Err(Error::Account(format!("HTTP {status}: {body}")));
        }
        Ok(body)
    }

    async fn signed_post(&self, path: &str, params: &str) -> Result<String> {
        let ts = Self::timestamp_ms();
        let query = format!("{params}&timestamp={ts}");
        let signature = self.sign(&query);
        let body = format!("{query}&signature={signature}");
        let url = format!("{}{path}", self.base_url);

        let resp = self
            .http
            .post(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;
        if !status.is_success() {
            return Err(Error::Account(format!("HTTP {status}: {text}")));
        }
        Ok(text)
    }

    async fn asset_balance(&self, asset: &str) -> Result<f64> {
        let body = self.signed_get("/api/v3/account", "").await?;
        let account: AccountResponse = serde_json::from_str(&body)?;

        Ok(account
            .balances
            .iter()
            .find(|b| b.asset == asset)
            .map(|b| {
                b.free.parse::<f64>().unwrap_or(0.0) + b.locked.parse::<f64>().unwrap_or(0.0)
            })
            .unwrap_or(0.0))
    }

    fn base_asset<'a>(&self, symbol: &'a str) -> &'a str {
        symbol
            .strip_suffix(self.quote_asset.as_str())
            .unwrap_or(symbol)
    }
}

#[async_trait]
impl Account for BinanceAccount {
    async fn balance(&self) -> Result<f64> {
        self.asset_balance(&self.quote_asset).await
    }

    async fn has_position(&self, symbol: &str) -> Result<bool> {
        let base = self.base_asset(symbol);
        Ok(self.asset_balance(base).await? > POSITION_EPSILON)
    }

    async fn buy(&self, symbol: &str, price: f64) -> Result<Execution> {
        if price <= 0.0 {
            return Err(Error::Order(format!("invalid buy price {price}")));
        }

        let quote_free = self.balance().await?;
        let spend = quote_free * self.position_size;
        if spend <= 0.0 {
            return Err(Error::Order(format!(
                "insufficient {} balance for buy",
                self.quote_asset
            )));
        }

        let params = format!("symbol={symbol}&side=BUY&type=MARKET&quoteOrderQty={spend:.2}");
        debug!(symbol, spend, "Submitting market buy");
        let body = self.signed_post("/api/v3/order", &params).await?;
        let resp: OrderResponse = serde_json::from_str(&body)?;

        let spent = resp.cummulative_quote_qty.parse::<f64>().unwrap_or(spend);
        *self.open_cost.write().await = Some(spent);

        Ok(Execution {
            order_id: resp.client_order_id,
            quantity: resp.executed_qty.parse().unwrap_or(0.0),
            profit: None,
        })
    }

    async fn sell(&self, symbol: &str, price: f64) -> Result<Execution> {
        if price <= 0.0 {
            return Err(Error::Order(format!("invalid sell price {price}")));
        }

        let base = self.base_asset(symbol);
        let quantity = self.asset_balance(base).await?;
        if quantity <= POSITION_EPSILON {
            return Err(Error::Order(format!("no open position for {symbol}")));
        }

        let params = format!("symbol={symbol}&side=SELL&type=MARKET&quantity={quantity}");
        debug!(symbol, quantity, "Submitting market sell");
        let body = self.signed_post("/api/v3/order", &params).await?;
        let resp: OrderResponse = serde_json::from_str(&body)?;

        let proceeds = resp.cummulative_quote_qty.parse::<f64>().unwrap_or(0.0);
        let profit = self
            .open_cost
            .write()
            .await
            .take()
            .map(|cost| proceeds - cost);

        Ok(Execution {
            order_id: resp.client_order_id,
            quantity: resp.executed_qty.parse().unwrap_or(quantity),
            profit,
        })
    }
}

// ─── Response types ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    client_order_id: String,
    #[serde(default)]
    executed_qty: String,
    #[serde(default)]
    cummulative_quote_qty: String,
}

#[derive(Deserialize)]
struct AccountResponse {
    balances: Vec<Balance>,
}

#[derive(Deserialize)]
struct Balance {
    asset: String,
    free: String,
    locked: String,
}
