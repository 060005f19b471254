//! Quarry
//!
//! Renders the query a collection request would run: SQL for the relational
//! backend, aggregation stages for the document backend.
//!
//! Usage:
//!   quarry explain --schema schema.yaml --operation books.yaml --backend relational \
//!       --param 'title=dune' --param 'order[price]=desc' --param page=2

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use quarry_kernel::manager::{DocumentConnection, Manager, RelationalConnection, StaticManagerRegistry};
use quarry_kernel::pagination::Pagination;
use quarry_kernel::relational::query_checker;
use quarry_kernel::{Config, Operation, QueryContext, Schema, document, relational};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Backend {
    Relational,
    Document,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the query a collection request would run, without running it.
    Explain(ExplainArgs),
}

#[derive(clap::Args, Debug)]
struct ExplainArgs {
    /// YAML file with entity metadata and filter declarations.
    #[arg(long)]
    schema: PathBuf,

    /// YAML file with the collection operation.
    #[arg(long)]
    operation: PathBuf,

    #[arg(long, value_enum, default_value = "relational")]
    backend: Backend,

    /// Request parameter as `key=value`; bracketed keys nest.
    #[arg(long = "param", value_name = "KEY=VALUE")]
    params: Vec<String>,

    /// Treat the request as a graph query collection field.
    #[arg(long)]
    graphql: bool,
}

/// Connection that answers every query with nothing.
struct DryRun;

impl RelationalConnection for DryRun {
    fn fetch_rows(&self, sql: &str) -> Result<Vec<Value>> {
        debug!(sql, "dry run");
        Ok(Vec::new())
    }

    fn fetch_count(&self, sql: &str) -> Result<u64> {
        debug!(sql, "dry run");
        Ok(0)
    }
}

impl DocumentConnection for DryRun {
    fn aggregate(&self, collection: &str, pipeline: &[Value]) -> Result<Vec<Value>> {
        debug!(collection, stages = pipeline.len(), "dry run");
        Ok(Vec::new())
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env().context("failed to load configuration")?;

    match cli.command {
        Command::Explain(args) => explain(&args, &config),
    }
}

fn explain(args: &ExplainArgs, config: &Config) -> Result<()> {
    let schema = Schema::from_file(&args.schema)
        .with_context(|| format!("failed to read schema {}", args.schema.display()))?;
    let raw = std::fs::read_to_string(&args.operation)
        .with_context(|| format!("failed to read operation {}", args.operation.display()))?;
    let operation: Operation = serde_yml::from_str(&raw).context("invalid operation file")?;
    info!(
        resource = %operation.resource,
        entities = schema.entities.len(),
        filters = schema.filters.len(),
        "schema loaded"
    );

    let pairs = args
        .params
        .iter()
        .map(|param| {
            param
                .split_once('=')
                .with_context(|| format!("parameter '{param}' is not KEY=VALUE"))
        })
        .collect::<Result<Vec<_>>>()?;
    let mut ctx = QueryContext::from_query_pairs(pairs);
    if args.graphql {
        ctx = ctx.for_graphql(&operation.name);
    }

    let metadata = Arc::new(schema.registry());
    let pagination = Pagination::new(config.pagination.clone(), config.graphql_pagination.clone());

    match args.backend {
        Backend::Relational => {
            let managers = Arc::new(StaticManagerRegistry::new().with_default(Manager::Relational(Arc::new(DryRun))));
            let filters = Arc::new(relational::filter_registry(&schema, &config.order));
            let chain = relational::default_chain(filters, config.order.clone(), managers.clone(), pagination);
            let provider = relational::CollectionProvider::new(metadata, managers, chain);

            let builder = provider.explain(&operation, &mut ctx)?;
            let plan = query_checker::plan_for(&builder, &operation);
            println!("{};", builder.to_page_sql(plan)?);
            println!("{};", builder.to_count_sql(plan.distinct)?);
        }
        Backend::Document => {
            let managers = Arc::new(StaticManagerRegistry::new().with_default(Manager::Document(Arc::new(DryRun))));
            let filters = Arc::new(document::filter_registry(&schema, &config.order));
            let chain = document::default_chain(filters, config.order.clone(), managers.clone(), pagination);
            let provider = document::CollectionProvider::new(metadata, managers, chain);

            let pipeline = provider.explain(&operation, &mut ctx)?;
            println!("db.{}.aggregate(", pipeline.collection());
            println!("{}", serde_json::to_string_pretty(&pipeline.to_documents())?);
            println!(")");
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("quarry=info,quarry_kernel=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
