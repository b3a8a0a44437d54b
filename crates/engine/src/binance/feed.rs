use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tracing::{info, warn};
use url::Url;

use common::{
    Candle, DepthSnapshot, Error, MarketDataFeed, MarketEvent, PriceLevel, Result, Subscription,
    Tick,
};

const BASE_URL: &str = "https://api.binance.com";
const BASE_URL_TESTNET: &str = "https://testnet.binance.vision";
const WS_URL: &str = "wss://stream.binance.com:9443";
const WS_URL_TESTNET: &str = "wss://testnet.binance.vision";

/// Binance market data feed: REST for synchronous queries, a combined
/// WebSocket stream (1-minute klines, trades, top-20 depth) for the push
/// side. Reconnects automatically with exponential backoff.
pub struct BinanceFeed {
    http: Client,
    rest_base: &'static str,
    ws_base: &'static str,
}

impl BinanceFeed {
    pub fn new(testnet: bool) -> Self {
        info!(testnet, "Initialized Binance market data feed");
        Self {
            http: Client::builder()
                .use_rustls_tls()
                .build()
                .expect("Failed to build HTTP client"),
            rest_base: if testnet { BASE_URL_TESTNET } else { BASE_URL },
            ws_base: if testnet { WS_URL_TESTNET } else { WS_URL },
        }
    }
}

#[async_trait]
impl MarketDataFeed for BinanceFeed {
    async fn current_price(&self, symbol: &str) -> Result<f64> {
        let url = format!("{}/api/v3/ticker/price?symbol={symbol}", self.rest_base);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let ticker: PriceTicker = resp.json().await.map_err(|e| Error::Http(e.to_string()))?;
        ticker
            .price
            .parse::<f64>()
            .map_err(|e| Error::Feed(e.to_string()))
    }

    async fn historical_candles(&self, symbol: &str, limit: usize) -> Result<Vec<Candle>> {
        let url = format!(
            "{}/api/v3/klines?symbol={symbol}&interval=1m&limit={limit}",
            self.rest_base
        );
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;
        if !status.is_success() {
            return Err(Error::Feed(format!("HTTP {status}: {body}")));
        }

        let rows: Vec<Vec<serde_json::Value>> = serde_json::from_str(&body)?;
        Ok(rows.iter().filter_map(|row| parse_kline_row(row)).collect())
    }

    async fn subscribe(
        &self,
        symbol: &str,
        events: mpsc::Sender<MarketEvent>,
    ) -> Result<Subscription> {
        let lower = symbol.to_lowercase();
        let url = format!(
            "{}/stream?streams={lower}@kline_1m/{lower}@trade/{lower}@depth20@100ms",
            self.ws_base
        );
        // Reject a malformed URL here rather than inside the stream task
        Url::parse(&url).map_err(|e| Error::WebSocket(e.to_string()))?;

        let handle = tokio::spawn(run_stream(url, symbol.to_string(), events));
        Ok(Subscription::new(handle))
    }
}

enum StreamEnd {
    /// Server closed the connection cleanly.
    Closed,
    /// Nobody is listening anymore — stop for good.
    ReceiverDropped,
}

/// Stream loop: connect, forward events, reconnect on failure.
async fn run_stream(url: String, symbol: String, events: mpsc::Sender<MarketEvent>) {
    let mut backoff = Duration::from_secs(1);
    const MAX_BACKOFF: Duration = Duration::from_secs(60);

    loop {
        info!(symbol = %symbol, "Connecting to Binance WebSocket stream");
        match stream_once(&url, &events).await {
            Ok(StreamEnd::ReceiverDropped) => {
                info!(symbol = %symbol, "Event receiver dropped — stream ending");
                return;
            }
            Ok(StreamEnd::Closed) => {
                info!(symbol = %symbol, "WebSocket stream closed cleanly");
                tokio::time::sleep(Duration::from_secs(1)).await;
                backoff = Duration::from_secs(1);
            }
            Err(e) => {
                warn!(symbol = %symbol, error = %e, backoff = ?backoff, "WebSocket error, reconnecting");
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
        }
    }
}

async fn stream_once(url: &str, events: &mpsc::Sender<MarketEvent>) -> Result<StreamEnd> {
    let url = Url::parse(url).map_err(|e| Error::WebSocket(e.to_string()))?;
    let (ws_stream, _) = connect_async(url)
        .await
        .map_err(|e| Error::WebSocket(e.to_string()))?;

    let (_, mut read) = ws_stream.split();

    while let Some(msg) = read.next().await {
        let msg = msg.map_err(|e| Error::WebSocket(e.to_string()))?;

        if let tokio_tungstenite::tungstenite::Message::Text(text) = msg {
            match parse_stream_message(&text) {
                Ok(Some(event)) => {
                    if events.send(event).await.is_err() {
                        return Ok(StreamEnd::ReceiverDropped);
                    }
                }
                Ok(None) => {} // unrecognized stream, skip
                Err(e) => warn!(error = %e, "Failed to parse stream message"),
            }
        }
    }

    Ok(StreamEnd::Closed)
}

// ─── Binance combined-stream JSON parsing ────────────────────────────────────

#[derive(Deserialize)]
struct CombinedMessage {
    stream: String,
    data: serde_json::Value,
}

#[derive(Deserialize)]
struct KlineWrapper {
    k: KlineData,
}

#[derive(Deserialize)]
struct KlineData {
    #[serde(rename = "t")]
    open_time_ms: i64,
    #[serde(rename = "o")]
    open: String,
    #[serde(rename = "h")]
    high: String,
    #[serde(rename = "l")]
    low: String,
    #[serde(rename = "c")]
    close: String,
    #[serde(rename = "v")]
    volume: String,
    #[serde(rename = "T")]
    close_time_ms: i64,
    #[serde(rename = "x")]
    is_closed: bool,
}

#[derive(Deserialize)]
struct TradeData {
    #[serde(rename = "T")]
    trade_time_ms: i64,
    #[serde(rename = "p")]
    price: String,
    #[serde(rename = "q")]
    quantity: String,
    #[serde(rename = "m")]
    is_buyer_maker: bool,
}

#[derive(Deserialize)]
struct DepthData {
    bids: Vec<[String; 2]>,
    asks: Vec<[String; 2]>,
}

fn parse_stream_message(text: &str) -> Result<Option<MarketEvent>> {
    let msg: CombinedMessage = serde_json::from_str(text)?;

    if msg.stream.contains("@kline") {
        let wrapper: KlineWrapper = serde_json::from_value(msg.data)?;
        let k = wrapper.k;
        Ok(Some(MarketEvent::Candle(Candle {
            timestamp: k.open_time_ms,
            open: k.open.parse().unwrap_or(0.0),
            high: k.high.parse().unwrap_or(0.0),
            low: k.low.parse().unwrap_or(0.0),
            close: k.close.parse().unwrap_or(0.0),
            volume: k.volume.parse().unwrap_or(0.0),
            close_time: k.close_time_ms,
            is_closed: k.is_closed,
        })))
    } else if msg.stream.contains("@trade") {
        let t: TradeData = serde_json::from_value(msg.data)?;
        Ok(Some(MarketEvent::Tick(Tick {
            timestamp: t.trade_time_ms,
            price: t.price.parse().unwrap_or(0.0),
            quantity: t.quantity.parse().unwrap_or(0.0),
            is_buyer_maker: t.is_buyer_maker,
        })))
    } else if msg.stream.contains("@depth") {
        let d: DepthData = serde_json::from_value(msg.data)?;
        Ok(Some(MarketEvent::Depth(DepthSnapshot {
            bids: parse_levels(&d.bids),
            asks: parse_levels(&d.asks),
        })))
    } else {
        Ok(None)
    }
}

fn parse_levels(levels: &[[String; 2]]) -> Vec<PriceLevel> {
    levels
        .iter()
        .map(|[price, quantity]| PriceLevel {
            price: price.parse().unwrap_or(0.0),
            quantity: quantity.parse().unwrap_or(0.0),
        })
        .collect()
}

/// One row of the REST klines response:
/// `[openTime, open, high, low, close, volume, closeTime, ...]`.
fn parse_kline_row(row: &[serde_json::Value]) -> Option<Candle> {
    let field = |i: usize| row.get(i)?.as_str()?.parse::<f64>().ok();
    Some(Candle {
        timestamp: row.first()?.as_i64()?,
        open: field(1)?,
        high: field(2)?,
        low: field(3)?,
        close: field(4)?,
        volume: field(5)?,
        close_time: row.get(6)?.as_i64()?,
        is_closed: true,
    })
}

#[derive(Deserialize)]
struct PriceTicker {
    price: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_kline_stream_message() {
        let text = r#"{"stream":"btcusdt@kline_1m","data":{"e":"kline","E":1700000000500,"s":"BTCUSDT","k":{"t":1700000000000,"T":1700000059999,"s":"BTCUSDT","i":"1m","o":"100.0","c":"101.5","h":"102.0","l":"99.5","v":"12.5","x":true}}}"#;
        let event = parse_stream_message(text).unwrap().unwrap();
        match event {
            MarketEvent::Candle(c) => {
                assert_eq!(c.close, 101.5);
                assert_eq!(c.close_time, 1_700_000_059_999);
                assert!(c.is_closed);
            }
            other => panic!("expected candle, got {other:?}"),
        }
    }

    #[test]
    fn parses_trade_stream_message() {
        let text = r#"{"stream":"btcusdt@trade","data":{"e":"trade","E":1700000000500,"s":"BTCUSDT","t":12345,"p":"100.25","q":"0.5","T":1700000000400,"m":false}}"#;
        let event = parse_stream_message(text).unwrap().unwrap();
        match event {
            MarketEvent::Tick(t) => {
                assert_eq!(t.price, 100.25);
                assert_eq!(t.quantity, 0.5);
                assert!(!t.is_buyer_maker);
            }
            other => panic!("expected tick, got {other:?}"),
        }
    }

    #[test]
    fn parses_depth_stream_message() {
        let text = r#"{"stream":"btcusdt@depth20@100ms","data":{"lastUpdateId":160,"bids":[["99.9","1.0"],["99.8","2.0"]],"asks":[["100.1","0.7"]]}}"#;
        let event = parse_stream_message(text).unwrap().unwrap();
        match event {
            MarketEvent::Depth(d) => {
                assert_eq!(d.bids.len(), 2);
                assert_eq!(d.asks.len(), 1);
                assert_eq!(d.bids[0].price, 99.9);
            }
            other => panic!("expected depth, got {other:?}"),
        }
    }

    #[test]
    fn unknown_stream_is_skipped() {
        let text = r#"{"stream":"btcusdt@bookTicker","data":{}}"#;
        assert!(parse_stream_message(text).unwrap().is_none());
    }

    #[test]
    fn parses_rest_kline_row() {
        let row: Vec<serde_json::Value> = serde_json::from_str(
            r#"[1700000000000,"100.0","102.0","99.5","101.5","12.5",1700000059999,"1268.7",100,"6.2","630.1","0"]"#,
        )
        .unwrap();
        let candle = parse_kline_row(&row).unwrap();
        assert_eq!(candle.timestamp, 1_700_000_000_000);
        assert_eq!(candle.close, 101.5);
        assert!(candle.is_closed);
    }
}
