//! landing-loader CLI: process the landing zone once and manage the local warehouse tables.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use landing_loader::catalog::{TableRegistry, Warehouse};
use landing_loader::config::{load_config, validate_identifier, ConfigOverrides};
use landing_loader::pipeline::{CompositeObserver, FileObserver, LoadObserver, TracingObserver};
use landing_loader::{Loader, LoaderConfig};

/// Route files from a landing zone into registered tables, then archive them.
#[derive(Parser, Debug)]
#[command(name = "landing-loader", version, about, long_about = None)]
struct Cli {
    /// Configuration file path (defaults to ./landing-loader.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Process every file currently in the landing zone
    Run(RunArgs),
    /// Inspect or create tables in the local warehouse
    Tables {
        #[command(subcommand)]
        action: TablesAction,
    },
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    zone: ZoneArgs,

    /// Landing zone directory
    #[arg(long)]
    landing: Option<PathBuf>,

    /// Archive zone directory
    #[arg(long)]
    archive: Option<PathBuf>,

    /// Per-table schema tracking root
    #[arg(long)]
    checkpoint_root: Option<PathBuf>,

    /// List the landing zone recursively
    #[arg(long)]
    recursive: bool,

    /// Resolve and route files without reading, writing or moving them
    #[arg(long)]
    dry_run: bool,

    /// Print the processing summary as JSON on stdout
    #[arg(long)]
    summary_json: bool,

    /// Also append loader events to this file
    #[arg(long)]
    event_log: Option<PathBuf>,
}

/// Settings shared by every subcommand that touches the warehouse.
#[derive(clap::Args, Debug)]
struct ZoneArgs {
    /// Catalog (first namespace level)
    #[arg(long)]
    catalog: Option<String>,

    /// Schema (second namespace level)
    #[arg(long)]
    schema: Option<String>,

    /// Local warehouse root
    #[arg(long)]
    warehouse: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum TablesAction {
    /// List the tables registered in the namespace
    List {
        #[command(flatten)]
        zone: ZoneArgs,
    },
    /// Register empty tables; their schema is set by the first load
    Create {
        #[command(flatten)]
        zone: ZoneArgs,
        /// Table names
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Show a table's version, schema and leading rows
    Show {
        #[command(flatten)]
        zone: ZoneArgs,
        /// Table name
        name: String,
        /// Number of rows to print
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

impl ZoneArgs {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            catalog: self.catalog.clone(),
            schema: self.schema.clone(),
            warehouse: self.warehouse.clone(),
            ..Default::default()
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet, cli.log_format);

    match cli.command {
        Commands::Run(args) => run(cli.config, args),
        Commands::Tables { action } => tables(cli.config, action),
    }
}

fn init_tracing(verbose: u8, quiet: bool, format: LogFormat) {
    let default_level = match verbose {
        0 if quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    };

    let text_layer = (format == LogFormat::Text).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_filter(filter())
    });
    let json_layer = (format == LogFormat::Json).then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(filter())
    });

    tracing_subscriber::registry()
        .with(text_layer)
        .with(json_layer)
        .init();
}

fn load(config: Option<PathBuf>, overrides: &ConfigOverrides) -> anyhow::Result<LoaderConfig> {
    load_config(config.as_deref(), overrides).context("failed to load configuration")
}

fn run(config: Option<PathBuf>, args: RunArgs) -> anyhow::Result<()> {
    let overrides = ConfigOverrides {
        landing_zone: args.landing,
        archive_zone: args.archive,
        checkpoint_root: args.checkpoint_root,
        recursive: args.recursive.then_some(true),
        ..args.zone.overrides()
    };
    let config = load(config, &overrides)?;
    tracing::debug!(?config, "configuration loaded");

    let mut loader = Loader::local(config);
    if let Some(path) = args.event_log {
        let observers: Vec<Arc<dyn LoadObserver>> =
            vec![Arc::new(TracingObserver), Arc::new(FileObserver::new(path))];
        loader = loader.with_observer(Arc::new(CompositeObserver::new(observers)));
    }

    let summary = if args.dry_run {
        loader.plan()
    } else {
        loader.run()
    }
    .context("load aborted")?;

    if args.summary_json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{summary}");
    }
    Ok(())
}

fn tables(config: Option<PathBuf>, action: TablesAction) -> anyhow::Result<()> {
    match action {
        TablesAction::List { zone } => {
            let config = load(config, &zone.overrides())?;
            let warehouse = Warehouse::new(&config.warehouse);
            let namespace = config.namespace();
            for name in warehouse.list_tables(&namespace)? {
                println!("{namespace}.{name}");
            }
        }
        TablesAction::Create { zone, names } => {
            let config = load(config, &zone.overrides())?;
            let warehouse = Warehouse::new(&config.warehouse);
            let namespace = config.namespace();
            for name in &names {
                validate_identifier("table", name)?;
            }
            warehouse.create_namespace(&namespace)?;
            for name in names {
                let ident = namespace.table(name);
                warehouse
                    .create_table(&ident)
                    .with_context(|| format!("failed to create {ident}"))?;
                println!("created {ident}");
            }
        }
        TablesAction::Show { zone, name, limit } => {
            let config = load(config, &zone.overrides())?;
            let warehouse = Warehouse::new(&config.warehouse);
            let ident = config.namespace().table(name);
            let manifest = warehouse.manifest(&ident)?;
            println!(
                "{ident} version={} files={} rows={}",
                manifest.version,
                manifest.files.len(),
                manifest.row_count()
            );
            for field in &manifest.schema.fields {
                println!("  {}: {}", field.name, field.data_type);
            }

            let data = warehouse.scan(&ident)?;
            let header: Vec<&str> = data.schema.field_names().collect();
            println!("{}", header.join("\t"));
            for row in data.rows.iter().take(limit) {
                let cells: Vec<String> = row.iter().map(ToString::to_string).collect();
                println!("{}", cells.join("\t"));
            }
        }
    }
    Ok(())
}
