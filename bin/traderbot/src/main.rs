use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use common::{Config, TradingMode};
use engine::{BinanceAccount, BinanceFeed, TradingBot};
use paper::SimulatedAccount;
use strategy::StrategyFileConfig;

#[tokio::main]
async fn main() {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env();
    info!(symbol = %cfg.symbol, mode = %cfg.trading_mode, "TraderBot starting");

    let strategy_file = StrategyFileConfig::load(&cfg.strategy_config_path);

    // ── Collaborators (injected based on TRADING_MODE) ────────────────────────
    let feed = Arc::new(BinanceFeed::new(cfg.binance_testnet));

    let account: Arc<dyn common::Account> = match cfg.trading_mode {
        TradingMode::Live => {
            info!("Live trading mode — using BinanceAccount");
            Arc::new(BinanceAccount::new(
                &cfg.binance_api_key,
                &cfg.binance_secret,
                cfg.binance_testnet,
                cfg.max_position_size,
            ))
        }
        TradingMode::Paper => {
            info!(balance = cfg.initial_balance, "Paper trading mode — using SimulatedAccount");
            Arc::new(SimulatedAccount::new(
                cfg.initial_balance,
                cfg.commission_rate,
                cfg.max_position_size,
            ))
        }
    };

    // ── Orchestrator ──────────────────────────────────────────────────────────
    let bot = match TradingBot::new(&cfg.symbol, feed, account, cfg.backfill_candles).await {
        Ok(bot) => bot,
        Err(e) => {
            error!(error = %e, "Failed to initialize trading bot");
            return;
        }
    };

    if let Err(e) = bot.set_strategy(strategy_file.strategy.build()).await {
        error!(error = %e, "Failed to set strategy");
        return;
    }
    if let Err(e) = bot.start().await {
        error!(error = %e, "Failed to start trading bot");
        return;
    }

    // ── Run until shutdown ────────────────────────────────────────────────────
    info!("Trading bot running. Press Ctrl-C to stop.");
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }

    info!("Shutdown signal received");
    bot.stop().await;
}
