//! Replay command implementation

use anyhow::{Context, Result};
use order_lifecycle::replay::Replayer;
use order_lifecycle::{data, Config, DefaultOrderManager, TimeInterval};
use tracing::{debug, info, warn};

pub fn run(
    config_path: String,
    scenario_path: String,
    max_open_override: Option<String>,
    output: Option<String>,
) -> Result<()> {
    info!("Starting replay");

    let mut config = Config::from_file(&config_path)?;
    info!("Loaded configuration from: {}", config_path);

    if let Some(max_open) = max_open_override {
        let interval: TimeInterval = max_open
            .parse()
            .with_context(|| format!("Invalid --max-open value '{}'", max_open))?;
        info!("Overriding max time to keep order open to: {}", interval);
        config.order_manager.max_time_to_keep_order_open = interval;
    }

    let manager = DefaultOrderManager::new(config.order_manager.max_time_to_keep_order_open);
    debug!("Order manager: {:?}", manager);

    info!("Loading data from: {}", config.data.data_dir);
    let data = data::load_symbols(&config)?;
    let scenario = data::load_scenario(&scenario_path)?;

    let mut replayer = Replayer::new(&config, Box::new(manager));
    for (symbol, candles) in data {
        let price_details = config
            .symbol(symbol.as_str())
            .map(|s| s.price_details())
            .unwrap_or_default();
        replayer.add_symbol(symbol, price_details, candles)?;
    }
    for intent in scenario.orders {
        if let Err(e) = replayer.schedule(intent) {
            warn!("Skipping order intent: {}", e);
        }
    }

    info!("Running replay...");
    let report = replayer.run();
    let summary = report.summary();

    println!("\n{}", "=".repeat(60));
    println!("REPLAY RESULTS");
    println!("{}", "=".repeat(60));
    println!("Orders Submitted:        {}", summary.submitted);
    println!("Orders Filled:           {}", summary.filled);
    println!("Partial Fills:           {}", summary.partial_fills);
    println!("Cancelled (timeout):     {}", summary.cancelled_lifecycle);
    println!("Cancelled (funds):       {}", summary.cancelled_fund_release);
    println!("Rejected:                {}", summary.rejected);
    println!("Never Submitted:         {}", summary.unsubmitted);
    println!("Final Cash:              {}", report.final_cash);
    for (symbol, quantity) in &report.holdings {
        println!("Holding {:<16} {}", symbol, quantity);
    }
    println!("{}", "=".repeat(60));

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        std::fs::write(&path, json).with_context(|| format!("Failed to write report to {}", path))?;
        info!("Report written to: {}", path);
    }

    info!("Replay completed successfully");

    Ok(())
}
