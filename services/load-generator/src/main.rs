//! Load generator CLI.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use clap::{Parser, ValueEnum};
use load_generator::{run_load_test, LoadSettings, LoadTestError, ResultsReport};
use serde_json::Value;
use store_client::{MongoConnectionFactory, OperationKind};
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Only the summary log line
    None,
    /// A results table on stdout
    Table,
    /// The full report as JSON on stdout
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "load-generator")]
#[command(about = "Drive a rate-controlled read/write mix against MongoDB", long_about = None)]
struct Args {
    /// Scenario YAML file; flags below override its values
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// MongoDB URI. Default mongodb://127.0.0.1:27017/admin
    #[arg(long, env = "LOADGEN_URI")]
    uri: Option<String>,

    /// Number of workers to run. Default 2
    #[arg(short, long, visible_alias = "workers")]
    processes: Option<u32>,

    /// Number of seconds to run. Default 300
    #[arg(short, long)]
    seconds: Option<u64>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,

    /// Log file to write to instead of stderr
    #[arg(long)]
    logfile: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// RNG seed; worker i uses seed + i
    #[arg(long)]
    seed: Option<u64>,

    /// Database for every operation kind. Default test
    #[arg(long)]
    database: Option<String>,

    /// Collection for every operation kind. Default onemill
    #[arg(long)]
    collection: Option<String>,

    /// Queries to execute per second per worker
    #[arg(long)]
    queries: Option<u32>,

    /// Updates to execute per second per worker
    #[arg(long)]
    updates: Option<u32>,

    /// Inserts to execute per second per worker
    #[arg(long)]
    inserts: Option<u32>,

    /// Aggregations to execute per second per worker
    #[arg(long)]
    aggregations: Option<u32>,

    /// Deletes to execute per second per worker
    #[arg(long)]
    deletes: Option<u32>,

    /// Query filter (JSON)
    #[arg(long)]
    query_filter: Option<String>,

    /// Update filter (JSON)
    #[arg(long)]
    update_filter: Option<String>,

    /// Update document (JSON)
    #[arg(long)]
    update_doc: Option<String>,

    /// Document to insert (JSON)
    #[arg(long)]
    insert_doc: Option<String>,

    /// Delete filter (JSON)
    #[arg(long)]
    delete_filter: Option<String>,

    /// Aggregation pipeline (JSON array)
    #[arg(long)]
    aggregate_pipeline: Option<String>,

    /// Extra report written to stdout
    #[arg(short, long, value_enum, default_value_t = OutputFormat::None)]
    output: OutputFormat,
}

impl Args {
    /// Scenario file (or defaults) with command-line overrides applied.
    fn settings(&self) -> Result<LoadSettings, LoadTestError> {
        let mut settings = match &self.scenario {
            Some(path) => LoadSettings::from_file(path)?,
            None => LoadSettings::default(),
        };

        if let Some(uri) = &self.uri {
            settings.uri = uri.clone();
        }
        if let Some(p) = self.processes {
            settings.workers = p;
        }
        if let Some(s) = self.seconds {
            settings.duration_secs = s;
        }
        if self.seed.is_some() {
            settings.seed = self.seed;
        }
        if let Some(db) = &self.database {
            settings.database = db.clone();
        }
        if let Some(coll) = &self.collection {
            settings.collection = coll.clone();
        }

        let quotas = [
            (OperationKind::Query, self.queries),
            (OperationKind::Update, self.updates),
            (OperationKind::Insert, self.inserts),
            (OperationKind::Aggregate, self.aggregations),
            (OperationKind::Delete, self.deletes),
        ];
        for (kind, quota) in quotas {
            if let Some(q) = quota {
                settings.set_quota(kind, q);
            }
        }

        let json = |text: &Option<String>| text.clone().map(Value::String);
        if let Some(v) = json(&self.query_filter) {
            settings.operation_mut(OperationKind::Query).filter = Some(v);
        }
        if let Some(v) = json(&self.update_filter) {
            settings.operation_mut(OperationKind::Update).filter = Some(v);
        }
        if let Some(v) = json(&self.update_doc) {
            settings.operation_mut(OperationKind::Update).update = Some(v);
        }
        if let Some(v) = json(&self.insert_doc) {
            settings.operation_mut(OperationKind::Insert).document = Some(v);
        }
        if let Some(v) = json(&self.delete_filter) {
            settings.operation_mut(OperationKind::Delete).filter = Some(v);
        }
        if let Some(v) = json(&self.aggregate_pipeline) {
            settings.operation_mut(OperationKind::Aggregate).pipeline = Some(v);
        }

        Ok(settings)
    }
}

fn init_tracing(args: &Args) -> anyhow::Result<()> {
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(true);

    let subscriber: Box<dyn tracing::Subscriber + Send + Sync> = match &args.logfile {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            let builder = builder.with_ansi(false).with_writer(Mutex::new(file));
            if args.json_logs {
                Box::new(builder.json().finish())
            } else {
                Box::new(builder.finish())
            }
        }
        None => {
            let builder = builder.with_writer(std::io::stderr);
            if args.json_logs {
                Box::new(builder.json().finish())
            } else {
                Box::new(builder.finish())
            }
        }
    };

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args)?;

    let settings = args.settings().map_err(|e| {
        error!(error = %e, "Invalid configuration; no workers started");
        e
    })?;

    let factory = Arc::new(MongoConnectionFactory::new(settings.uri.clone()));
    let report = run_load_test(&settings, factory).await.map_err(|e| {
        error!(error = %e, "Invalid configuration; no workers started");
        e
    })?;

    match args.output {
        OutputFormat::Table => println!("{}", ResultsReport::format_table(&report)),
        OutputFormat::Json => println!("{}", ResultsReport::format_json(&report)?),
        OutputFormat::None => {}
    }

    if !report.has_results() {
        anyhow::bail!("no worker completed its run");
    }
    Ok(())
}
