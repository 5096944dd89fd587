//! Pricing Quote
//!
//! Loads a catalog snapshot (JSON) and prints quotes as JSON. Range quotes list
//! every candidate with the cheapest flagged; method quotes include the full
//! modifier breakdown.

use clap::{Parser, Subcommand};
use core_config::tracing::{init_tracing, install_color_eyre};
use core_config::{env_or_default, Environment, FromEnv};
use domain_pricing::{
    CallerContext, CatalogSnapshot, InMemoryCatalog, InMemoryQuoteCache, LevelRangeRequest,
    MethodQuoteRequest, PricingConfig, PricingService,
};
use eyre::{Result, WrapErr};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

const CATALOG_VAR: &str = "PRICING_CATALOG";
const DEFAULT_CATALOG: &str = "catalog.json";

#[derive(Parser)]
#[command(name = "pricing-quote")]
#[command(about = "Quote services from a pricing catalog snapshot")]
struct Cli {
    /// Catalog snapshot file [default: $PRICING_CATALOG or catalog.json]
    #[arg(short = 'C', long)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Quote a level range for a service
    Range {
        #[arg(short, long)]
        service: Uuid,

        #[arg(long)]
        start: u32,

        #[arg(long)]
        end: u32,

        /// Only consider methods of this group (case-insensitive)
        #[arg(short, long)]
        group: Option<String>,

        /// Skip service and method modifiers
        #[arg(long)]
        no_modifiers: bool,

        /// Caller context entry, repeatable (key=value; value may be JSON)
        #[arg(short, long = "context", value_parser = parse_context_entry)]
        context: Vec<(String, Value)>,
    },

    /// Quote one pricing method for a quantity
    Method {
        #[arg(short, long)]
        method: Uuid,

        #[arg(short, long)]
        payment: Option<Uuid>,

        #[arg(short, long, default_value_t = 1)]
        quantity: u32,

        /// Service modifiers to opt into
        #[arg(long = "modifier", value_delimiter = ',')]
        modifiers: Vec<Uuid>,

        /// Caller context entry, repeatable (key=value; value may be JSON)
        #[arg(short, long = "context", value_parser = parse_context_entry)]
        context: Vec<(String, Value)>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    install_color_eyre();

    let config = PricingConfig::from_env()?;
    let environment = Environment::from_env();
    init_tracing(&environment);

    let cli = Cli::parse();

    let catalog = load_catalog(&catalog_path(cli.catalog)).await?;
    let mut service = PricingService::new(catalog).with_config(config.clone());
    if config.cache_enabled {
        service = service.with_cache(
            InMemoryQuoteCache::new(config.cache_ttl).with_max_entries(config.cache_max_entries),
        );
    }

    let output = match cli.command {
        Commands::Range {
            service: service_id,
            start,
            end,
            group,
            no_modifiers,
            context,
        } => {
            let quote = service
                .quote_level_range(LevelRangeRequest {
                    service_id,
                    start,
                    end,
                    group,
                    apply_modifiers: !no_modifiers,
                    context: context.into_iter().collect(),
                })
                .await?;
            serde_json::to_string_pretty(&quote)?
        }

        Commands::Method {
            method,
            payment,
            quantity,
            modifiers,
            context,
        } => {
            let quote = service
                .quote_method(MethodQuoteRequest {
                    method_id: method,
                    payment_method_id: payment,
                    quantity,
                    service_modifier_ids: modifiers,
                    context: context.into_iter().collect::<CallerContext>(),
                })
                .await?;
            serde_json::to_string_pretty(&quote)?
        }
    };

    println!("{output}");
    Ok(())
}

/// Explicit flag first, then `PRICING_CATALOG`, then `catalog.json`
fn catalog_path(flag: Option<PathBuf>) -> PathBuf {
    flag.unwrap_or_else(|| PathBuf::from(env_or_default(CATALOG_VAR, DEFAULT_CATALOG)))
}

async fn load_catalog(path: &Path) -> Result<InMemoryCatalog> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .wrap_err_with(|| format!("Failed to read catalog {}", path.display()))?;
    let snapshot: CatalogSnapshot = serde_json::from_str(&raw)
        .wrap_err_with(|| format!("Failed to parse catalog {}", path.display()))?;

    info!(
        services = snapshot.services.len(),
        payment_methods = snapshot.payment_methods.len(),
        "Loaded catalog snapshot"
    );
    Ok(InMemoryCatalog::from_snapshot(snapshot).await)
}

/// `key=value`; the value is read as JSON when it parses, else as a string
fn parse_context_entry(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in `{raw}`"));
    }

    let value = serde_json::from_str(value.trim()).unwrap_or_else(|_| Value::from(value.trim()));
    Ok((key.to_string(), value))
}
