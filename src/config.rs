//! Configuration management
//!
//! Loads the JSON configuration of the order manager and of the replay engine
//! that hosts it. Every section has defaults, so `{}` is a valid file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::oms::{CancelMode, SymbolPriceDetails};
use crate::time::TimeInterval;
use crate::{Money, Symbol};

/// Environment variable overriding `order_manager.max_time_to_keep_order_open`
pub const MAX_OPEN_ENV: &str = "ORDER_MAX_OPEN";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub order_manager: OrderManagerConfig,
    #[serde(default)]
    pub account: AccountConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub symbols: Vec<SymbolConfig>,
}

impl Config {
    /// Load configuration from JSON file, then apply environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).context("Failed to read config file")?;
        let mut config: Config =
            serde_json::from_str(&contents).context("Failed to parse config JSON")?;

        if let Ok(max_open) = std::env::var(MAX_OPEN_ENV) {
            config.order_manager.max_time_to_keep_order_open = max_open
                .parse()
                .with_context(|| format!("Invalid {} value '{}'", MAX_OPEN_ENV, max_open))?;
        }

        Ok(config)
    }

    pub fn symbol(&self, symbol: &str) -> Option<&SymbolConfig> {
        self.symbols.iter().find(|s| s.symbol == symbol)
    }
}

/// Lifecycle policy configuration
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct OrderManagerConfig {
    /// Resting orders older than this are cancelled; past half of it they may
    /// be cancelled to fund another instrument
    #[serde(default)]
    pub max_time_to_keep_order_open: TimeInterval,
}

/// Starting balances of the replay account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Quote currency available for BUY orders
    pub initial_cash: Money,
    /// Asset quantities available for SELL orders, by symbol
    #[serde(default)]
    pub holdings: BTreeMap<String, Money>,
}

impl Default for AccountConfig {
    fn default() -> Self {
        AccountConfig {
            initial_cash: Money::from_i64(10_000),
            holdings: BTreeMap::new(),
        }
    }
}

impl AccountConfig {
    pub fn holdings(&self) -> BTreeMap<Symbol, Money> {
        self.holdings
            .iter()
            .map(|(symbol, qty)| (Symbol::new(symbol), *qty))
            .collect()
    }
}

/// Simulated venue behaviour
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Share of each candle's volume a resting order can take
    pub participation_rate: f64,
    #[serde(default)]
    pub cancel_mode: CancelMode,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            participation_rate: 1.0,
            cancel_mode: CancelMode::Immediate,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub data_dir: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        DataConfig {
            data_dir: "data".to_string(),
        }
    }
}

/// Instrument definition; candles are read from `{data_dir}/{symbol}_{timeframe}.csv`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolConfig {
    pub symbol: String,
    #[serde(default = "default_timeframe")]
    pub timeframe: TimeInterval,
    #[serde(default = "default_price_decimals")]
    pub price_decimal_places: u32,
    #[serde(default = "default_quantity_decimals")]
    pub quantity_decimal_places: u32,
}

fn default_timeframe() -> TimeInterval {
    TimeInterval::minutes(1).unwrap_or_default()
}

fn default_price_decimals() -> u32 {
    2
}

fn default_quantity_decimals() -> u32 {
    8
}

impl SymbolConfig {
    pub fn symbol(&self) -> Symbol {
        Symbol::new(&self.symbol)
    }

    pub fn price_details(&self) -> SymbolPriceDetails {
        SymbolPriceDetails::new(self.price_decimal_places, self.quantity_decimal_places)
    }

    pub fn candle_file(&self) -> String {
        format!("{}_{}.csv", self.symbol, self.timeframe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(
            config.order_manager.max_time_to_keep_order_open,
            TimeInterval::minutes(10).unwrap()
        );
        assert_eq!(config.account.initial_cash, Money::from_i64(10_000));
        assert_eq!(config.execution.cancel_mode, CancelMode::Immediate);
        assert_eq!(config.data.data_dir, "data");
        assert!(config.symbols.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let json = r#"{
            "order_manager": { "max_time_to_keep_order_open": "15m" },
            "account": { "initial_cash": "2500.50", "holdings": { "ETHUSDT": "3" } },
            "execution": { "participation_rate": 0.25, "cancel_mode": "next_candle" },
            "symbols": [ { "symbol": "BTCUSDT", "timeframe": "5m", "price_decimal_places": 1 } ]
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(
            config.order_manager.max_time_to_keep_order_open,
            TimeInterval::minutes(15).unwrap()
        );
        assert_eq!(config.account.initial_cash, "2500.50".parse().unwrap());
        assert_eq!(
            config.account.holdings().get(&Symbol::new("ETHUSDT")),
            Some(&Money::from_i64(3))
        );
        assert_eq!(config.execution.cancel_mode, CancelMode::NextCandle);

        let btc = config.symbol("BTCUSDT").unwrap();
        assert_eq!(btc.candle_file(), "BTCUSDT_5m.csv");
        assert_eq!(btc.price_details(), SymbolPriceDetails::new(1, 8));
    }

    #[test]
    fn test_rejects_zero_max_open() {
        let json = r#"{ "order_manager": { "max_time_to_keep_order_open": "0m" } }"#;
        assert!(serde_json::from_str::<Config>(json).is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "symbols": [ {{ "symbol": "SOLUSDT" }} ] }}"#).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.symbols.len(), 1);
        assert_eq!(config.symbols[0].timeframe, TimeInterval::minutes(1).unwrap());
    }
}
