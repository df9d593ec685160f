//! Data loading
//!
//! Reads OHLCV candles from CSV files and order scenarios from JSON.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::config::Config;
use crate::replay::OrderIntent;
use crate::time::TimeInterval;
use crate::{Candle, Symbol};

// =============================================================================
// CSV Data Loading
// =============================================================================

fn parse_datetime(value: &str) -> Result<DateTime<Utc>> {
    value
        .parse::<DateTime<Utc>>()
        .or_else(|_| {
            // No timezone, assume UTC
            chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
                .map(|ndt| DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc))
        })
        .with_context(|| format!("Failed to parse datetime: {}", value))
}

fn parse_field(record: &csv::StringRecord, index: usize, name: &str) -> Result<f64> {
    record
        .get(index)
        .with_context(|| format!("Missing {} column", name))?
        .trim()
        .parse()
        .with_context(|| format!("Failed to parse {}", name))
}

/// Load OHLCV data from a CSV file with columns
/// `datetime,open,high,low,close,volume`. Each candle closes one `timeframe`
/// after it opens.
pub fn load_csv(path: impl AsRef<Path>, timeframe: TimeInterval) -> Result<Vec<Candle>> {
    let mut reader = csv::Reader::from_path(path.as_ref()).context("Failed to open CSV file")?;

    let mut candles = Vec::new();

    for (row_idx, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read row {}", row_idx + 1))?;

        let datetime = parse_datetime(record.get(0).context("Missing datetime column")?)?;
        let candle = Candle::new(
            datetime,
            datetime + timeframe.duration(),
            parse_field(&record, 1, "open")?,
            parse_field(&record, 2, "high")?,
            parse_field(&record, 3, "low")?,
            parse_field(&record, 4, "close")?,
            parse_field(&record, 5, "volume")?,
        )
        .with_context(|| format!("Invalid candle at row {}", row_idx + 1))?;

        candles.push(candle);
    }

    Ok(candles)
}

/// Load candles for every configured symbol. Missing files are skipped with a
/// warning; an error is returned only when nothing could be loaded.
pub fn load_symbols(config: &Config) -> Result<BTreeMap<Symbol, Vec<Candle>>> {
    let mut data = BTreeMap::new();

    for symbol_config in &config.symbols {
        let path = Path::new(&config.data.data_dir).join(symbol_config.candle_file());

        if !path.exists() {
            warn!("Data file not found: {}", path.display());
            continue;
        }

        let candles = load_csv(&path, symbol_config.timeframe)
            .with_context(|| format!("Failed to load data for {}", symbol_config.symbol))?;

        info!("Loaded {} candles for {}", candles.len(), symbol_config.symbol);
        data.insert(symbol_config.symbol(), candles);
    }

    if data.is_empty() {
        anyhow::bail!("No data loaded for any symbol");
    }

    Ok(data)
}

// =============================================================================
// Scenarios
// =============================================================================

/// Order intents to replay, in JSON
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub orders: Vec<OrderIntent>,
}

pub fn load_scenario(path: impl AsRef<Path>) -> Result<Scenario> {
    let contents = fs::read_to_string(path.as_ref()).context("Failed to read scenario file")?;
    let scenario: Scenario =
        serde_json::from_str(&contents).context("Failed to parse scenario JSON")?;
    info!("Loaded scenario with {} orders", scenario.orders.len());
    Ok(scenario)
}
