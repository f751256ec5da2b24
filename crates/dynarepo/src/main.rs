use std::io;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::Value;
use tokio_stream::StreamExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dynarepo::attribute::{item_to_json, json_to_attribute};
use dynarepo::config::Config;
use dynarepo::storage::dynamodb::DynamoDbStore;
use dynarepo::telemetry::{TracingLogger, TracingMetrics};
use dynarepo::{
    AttributeMap, AttributeValue, Condition, Key, Query, RangeOperator, Repository,
    UpdateExpressions, UpdateKind,
};

/// dynarepo - Read and write DynamoDB items through a typed repository
#[derive(Parser, Debug)]
#[command(name = "dynarepo")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Custom DynamoDB endpoint, e.g. http://localhost:8000
    #[arg(long, global = true, env = "AWS_ENDPOINT_URL")]
    endpoint_url: Option<String>,

    /// AWS region
    #[arg(long, global = true, env = "AWS_REGION")]
    region: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Get one item by primary key, or the first match on an index
    Get(KeyArgs),
    /// Write one item given as a JSON object
    Put {
        #[command(flatten)]
        key: KeyArgs,
        /// The item, as a JSON object
        #[arg(long)]
        item: String,
    },
    /// Apply field-level updates to one item
    Update {
        #[command(flatten)]
        key: KeyArgs,
        /// Kind of update applied to every field
        #[arg(long, value_enum, default_value_t = Kind::Set)]
        kind: Kind,
        /// `Field=<json>` pairs
        #[arg(long = "value", required = true)]
        values: Vec<String>,
    },
    /// Delete one item by primary key
    Delete(KeyArgs),
    /// Query the items sharing a hash key
    Query {
        #[command(flatten)]
        key: KeyArgs,
        /// Range key comparison: EQ, NE, LT, LE, GT, GE, BEGINS_WITH, BETWEEN
        #[arg(long, default_value = "EQ")]
        op: RangeOperator,
        /// Maximum number of items to return
        #[arg(long)]
        limit: Option<usize>,
        /// Return items in descending range key order
        #[arg(long)]
        descending: bool,
    },
    /// Scan a whole table
    Scan {
        /// Table name
        #[arg(long, short)]
        table: String,
        /// Items per page requested from the store
        #[arg(long, default_value_t = 100)]
        page_size: usize,
        /// Filter expression with `?` placeholders
        #[arg(long)]
        filter: Option<String>,
        /// Filter arguments as JSON, in placeholder order
        #[arg(long = "arg")]
        args: Vec<String>,
    },
    /// Print the effective configuration
    Config,
}

#[derive(Args, Debug)]
struct KeyArgs {
    /// Table name
    #[arg(long, short)]
    table: String,
    /// Hash key attribute name
    #[arg(long)]
    hash_key_name: Option<String>,
    /// Hash key value (JSON, or a plain string)
    #[arg(long)]
    hash_key: Option<String>,
    /// Range key attribute name
    #[arg(long)]
    range_key_name: Option<String>,
    /// Range key value (JSON, or a plain string)
    #[arg(long)]
    range_key: Option<String>,
    /// Secondary index to read through
    #[arg(long)]
    index: Option<String>,
}

impl KeyArgs {
    fn key(&self) -> Key {
        let mut key = Key::new().with_table_name(&self.table);
        if let Some(name) = &self.hash_key_name {
            key = key.with_hash_key_name(name);
        }
        if let Some(value) = &self.hash_key {
            key = key.with_hash_key(parse_value(value));
        }
        if let Some(name) = &self.range_key_name {
            key = key.with_range_key_name(name);
        }
        if let Some(value) = &self.range_key {
            key = key.with_range_key(parse_value(value));
        }
        if let Some(index) = &self.index {
            key = key.with_index_name(index);
        }
        key
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Kind {
    Set,
    SetIfNotExists,
    SetSet,
    Add,
}

impl From<Kind> for UpdateKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Set => UpdateKind::Set,
            Kind::SetIfNotExists => UpdateKind::SetIfNotExists,
            Kind::SetSet => UpdateKind::SetSet,
            Kind::Add => UpdateKind::Add,
        }
    }
}

/// Parse a CLI value as JSON, falling back to a plain string.
fn parse_value(raw: &str) -> AttributeValue {
    serde_json::from_str::<Value>(raw)
        .map(|value| json_to_attribute(&value))
        .unwrap_or_else(|_| AttributeValue::S(raw.to_string()))
}

fn parse_assignment(raw: &str) -> Result<(String, AttributeValue)> {
    let (field, value) = raw
        .split_once('=')
        .with_context(|| format!("expected Field=<json>, got '{raw}'"))?;
    Ok((field.trim().to_string(), parse_value(value.trim())))
}

fn print(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dynarepo=info,dynarepo_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let mut config = Config::from_env();
    if let Some(endpoint_url) = cli.endpoint_url {
        config.endpoint_url = Some(endpoint_url);
    }
    if let Some(region) = cli.region {
        config.region = region;
    }

    if let Command::Config = cli.command {
        return print(&serde_json::to_value(&config)?);
    }

    tracing::info!(store = %config.target_display(), "Connecting");

    let store = DynamoDbStore::from_config(&config).await;
    let repository = Repository::new(Arc::new(store))
        .with_logger(Arc::new(TracingLogger))
        .with_metrics(Arc::new(TracingMetrics))
        .with_batch_config(config.batch_config());
    let ctx = config.context(uuid::Uuid::new_v4().to_string());

    match cli.command {
        Command::Get(args) => {
            let item: Option<AttributeMap> = repository.get_item(&ctx, &args.key()).await?;
            print(&item.as_ref().map_or(Value::Null, item_to_json))?;
        }
        Command::Put { key, item } => {
            let value: Value = serde_json::from_str(&item).context("item must be JSON")?;
            let AttributeValue::M(item) = json_to_attribute(&value) else {
                anyhow::bail!("item must be a JSON object");
            };
            repository.save_item(&ctx, &key.key(), &item).await?;
            tracing::info!(table = %key.table, "Item saved");
        }
        Command::Update { key, kind, values } => {
            let values = values
                .iter()
                .map(|raw| parse_assignment(raw))
                .collect::<Result<Vec<_>>>()?;
            let updates = UpdateExpressions::from_values(kind.into(), values);
            let item: AttributeMap = repository
                .update_with_expressions_and_return_value(&ctx, &key.key(), &updates)
                .await?;
            print(&item_to_json(&item))?;
        }
        Command::Delete(args) => {
            repository.delete_item(&ctx, &args.key()).await?;
            tracing::info!(table = %args.table, "Item deleted");
        }
        Command::Query {
            key,
            op,
            limit,
            descending,
        } => {
            let mut query = Query::from(key.key())
                .with_range_op(op)
                .with_descending(descending);
            if let Some(limit) = limit {
                query = query.with_limit(limit);
            }
            let items: Vec<AttributeMap> = repository.query(&ctx, &query).await?;
            print(&Value::Array(items.iter().map(item_to_json).collect()))?;
        }
        Command::Scan {
            table,
            page_size,
            filter,
            args,
        } => {
            let key = Key::new().with_table_name(&table);
            let mut iterator = repository.scan_iterator::<AttributeMap>(&ctx, &key, page_size)?;
            if let Some(filter) = filter {
                let args = args.iter().map(|raw| parse_value(raw)).collect();
                iterator = iterator.with_filter(Condition::new(&filter, args)?);
            }

            let mut stream = Box::pin(iterator.into_stream());
            let mut count = 0usize;
            while let Some(item) = stream.next().await {
                println!("{}", serde_json::to_string(&item_to_json(&item?))?);
                count += 1;
            }
            tracing::info!(table = %table, count, "Scan complete");
        }
        Command::Config => {}
    }

    Ok(())
}
