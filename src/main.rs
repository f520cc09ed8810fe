//! prime_inventory - Real-time inventory aggregation and distribution core
//!
//! This is the batch-mode entry point: load configuration, replay a
//! newline-delimited JSON event file through the partitioned dispatcher,
//! and report the resulting aggregate state.
//!
//! ```text
//! ┌──────────┐    ┌───────────┐    ┌──────────────┐    ┌──────────┐
//! │  Config  │───▶│ Dispatch  │───▶│ C2..C8 engines│───▶│  Summary │
//! │  (TOML)  │    │(partition)│    │              │    │  (stdout)│
//! └──────────┘    └───────────┘    └──────────────┘    └──────────┘
//! ```

use clap::Parser;
use prime_inventory::config::{LoggingConfig, SystemConfig};
use prime_inventory::core_types::SecurityId;
use prime_inventory::dispatch::{DedupWindow, DispatchOutcome, PartitionDispatcher, PoisonOutcome, PoisonTracker};
use prime_inventory::event_log::{EventLogWriter, StreamId};
use prime_inventory::inventory_engine::InventoryEngine;
use prime_inventory::limit_engine::LimitEngine;
use prime_inventory::locate_workflow::LocateWorkflow;
use prime_inventory::messages::{IngressEvent, IngressPayload};
use prime_inventory::position::Side;
use prime_inventory::position_engine::PositionEngine;
use prime_inventory::reference_store::{ReferenceStore, SourcePriority};
use prime_inventory::rule_engine::RuleEngine;
use prime_inventory::short_sell_validator::{BookMap, ShortSellValidator};
use std::io::BufRead;

/// No market-routing metadata travels on the locate-request and rule-change
/// ingress variants yet, so the demo binary scopes both to this market.
/// A real deployment carries market on the envelope or resolves it from the
/// security's reference record.
const DEFAULT_MARKET: &str = "US";

#[derive(Parser, Debug)]
#[command(name = "prime_inventory", version, about = "Prime broker inventory engine")]
struct Cli {
    /// Path to a TOML system configuration file. Defaults are used if absent.
    #[arg(long)]
    config: Option<String>,

    /// Path to a newline-delimited JSON file of ingress events to replay.
    #[arg(long)]
    events: Option<String>,

    /// Number of partitions in the dispatch worker pool.
    #[arg(long, default_value_t = 8)]
    partitions: usize,

    /// Path to append the durable event log to. Every accepted, deduped
    /// event is framed and written here before dispatch, so a crash
    /// between write and apply can be recovered by replay.
    #[arg(long)]
    event_log: Option<String>,
}

fn stream_for(payload: &IngressPayload) -> StreamId {
    match payload {
        IngressPayload::Reference(_) => StreamId::Reference,
        IngressPayload::MarketData(_) => StreamId::MarketData,
        IngressPayload::SodPosition(_) | IngressPayload::Execution(_) => StreamId::Position,
        IngressPayload::DepotPosition(_) => StreamId::Position,
        IngressPayload::Contract(_) => StreamId::Contract,
        IngressPayload::OrderRequest(_) => StreamId::ShortSell,
        IngressPayload::ExternalAvailability(_) => StreamId::Inventory,
        IngressPayload::LocateRequested { .. } => StreamId::Locate,
        IngressPayload::RuleChanged { .. } => StreamId::Rule,
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let logging_config = LoggingConfig::default();
    let _guard = prime_inventory::logging::init_logging(&logging_config);

    println!("=== prime_inventory: replay ===");

    let config = match &cli.config {
        Some(path) => SystemConfig::load_from_path(path)?,
        None => SystemConfig::default(),
    };
    tracing::info!(ladder_days = config.ladder_days, "loaded configuration");

    let reference_store = ReferenceStore::new(SourcePriority::new(vec![
        "Bloomberg".to_string(),
        "Reuters".to_string(),
    ]));
    let position_engine = PositionEngine::new(config.ladder_days);
    let inventory_engine = InventoryEngine::new();
    let limit_engine = LimitEngine::new();
    let rule_engine = RuleEngine::new();
    let locate_workflow = LocateWorkflow::new(config.locate_rule_deadline());

    // Book-to-(client, aggregation unit) mapping is reference data the OMS
    // owns; seeded here the way the teacher's load_trading_config seeded
    // demo accounts, since there's no ingress variant that carries it.
    let book_map = BookMap::new();
    book_map.register(
        prime_inventory::core_types::BookId(1),
        prime_inventory::core_types::ClientId(1),
        prime_inventory::core_types::AuId(1),
    );
    let short_sell_validator =
        ShortSellValidator::new(&limit_engine, &book_map, config.short_sell_deadline());

    let dedup = DedupWindow::new(config.dedup_window());
    let poison = PoisonTracker::new(config.dlq_max_retries);
    let dispatcher = PartitionDispatcher::new(cli.partitions, 4096);

    let mut ingested = 0u64;
    let mut deduped = 0u64;
    let mut overloaded = 0u64;

    let mut event_log_writer = match &cli.event_log {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            Some(EventLogWriter::new(std::io::BufWriter::new(file), 1))
        }
        None => None,
    };

    if let Some(path) = &cli.events {
        println!("[1] Replaying events from {path}");
        let file = std::fs::File::open(path)?;
        for line in std::io::BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let event: IngressEvent = serde_json::from_str(&line)?;

            if !dedup.check_and_record(event.fingerprint()) {
                deduped += 1;
                continue;
            }

            if let Some(writer) = event_log_writer.as_mut() {
                writer.append(stream_for(&event.payload), event.partition_key, &event.payload)?;
            }

            match dispatcher.dispatch(event) {
                DispatchOutcome::Accepted => ingested += 1,
                DispatchOutcome::Overloaded => overloaded += 1,
            }
        }
        if let Some(writer) = event_log_writer.as_mut() {
            writer.flush()?;
        }

        for partition in 0..dispatcher.partition_count() {
            while let Some(event) = dispatcher.try_pop(partition) {
                let partition_key = event.partition_key;
                if let Err(e) = apply_ingress(
                    &event.payload,
                    &reference_store,
                    &position_engine,
                    &inventory_engine,
                    &rule_engine,
                    &locate_workflow,
                    &short_sell_validator,
                ) {
                    tracing::warn!(error = %e, partition_key, "ingress application failed");
                    match poison.record_failure(partition_key) {
                        PoisonOutcome::Retry(n) => {
                            tracing::warn!(attempt = n, "retrying after failure")
                        }
                        PoisonOutcome::DeadLetter => {
                            tracing::error!(partition_key, "diverted to dead-letter stream")
                        }
                    }
                } else {
                    poison.record_success(partition_key);
                }
            }
        }
    } else {
        println!("[1] No --events file given, starting with an empty book");
    }

    println!("\n=== Summary ===");
    println!("Events ingested:  {ingested}");
    println!("Duplicates dropped: {deduped}");
    println!("Overloaded drops: {overloaded}");
    println!("Positions tracked: {}", position_engine.len());
    println!("Dedup window size: {}", dedup.len());
    println!("Rule snapshot version: {}", rule_engine.snapshot().snapshot_version);
    println!(
        "AU(1) client available: {}",
        limit_engine.au_available(
            prime_inventory::core_types::AuId(1),
            SecurityId(1),
            prime_inventory::limit::LimitSide::ShortSell
        )
    );

    Ok(())
}

fn apply_ingress(
    payload: &IngressPayload,
    reference_store: &ReferenceStore,
    position_engine: &PositionEngine,
    inventory_engine: &InventoryEngine,
    rule_engine: &RuleEngine,
    locate_workflow: &LocateWorkflow,
    short_sell_validator: &ShortSellValidator<'_>,
) -> anyhow::Result<()> {
    match payload {
        IngressPayload::Reference(upsert) => {
            if let Some(security) = &upsert.security {
                reference_store.upsert(security.clone())?;
            }
        }
        IngressPayload::SodPosition(sod) => {
            position_engine.load_sod(sod.book, sod.security, sod.business_date, sod.td, sod.sd)?;
        }
        IngressPayload::Execution(exec) => {
            position_engine.apply_execution(exec)?;
        }
        IngressPayload::Contract(contract_event) => {
            inventory_engine.incorporate_contract(&contract_event.contract);
        }
        IngressPayload::OrderRequest(order) => {
            if matches!(order.side, Side::Sell | Side::ShortSell) {
                short_sell_validator.validate(order.book, order.security, order.side, order.qty)?;
            }
        }
        IngressPayload::LocateRequested {
            client,
            security,
            qty,
        } => {
            let market: prime_inventory::core_types::MarketId = DEFAULT_MARKET.into();
            let id = locate_workflow.submit(*client, *security, *qty, chrono::Utc::now(), None);
            locate_workflow.evaluate_auto_rules(id, &market, &rule_engine.snapshot(), inventory_engine)?;
        }
        IngressPayload::RuleChanged { rule } => {
            let mut rules = rule_engine.snapshot().rules.clone();
            rules.retain(|r| r.id != rule.id);
            rules.push(rule.clone());
            rule_engine.publish(rules);
        }
        IngressPayload::MarketData(_)
        | IngressPayload::DepotPosition(_)
        | IngressPayload::ExternalAvailability(_) => {}
    }
    Ok(())
}
