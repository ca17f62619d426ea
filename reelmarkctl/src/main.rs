use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use reelmark_core::{
    InMemoryProgressStore, PostgresProgressStore, ProgressEngine,
    ProgressStore,
};
use reelmark_model::{ProgressRecord, UnitId, ViewerId};
use reelmarkctl::loader::{self, ConfigLoader};
use reelmarkctl::models::Config;
use reelmarkctl::replay::{parse_samples, replay};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "reelmarkctl", version)]
#[command(about = "Operate the Reelmark watch-progress engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Feed a JSON-lines sample file through the engine and print the
    /// resulting records
    Replay(ReplayArgs),
    /// Print the aggregated progress of one series for a viewer
    Summary(SummaryArgs),
    /// Apply the embedded viewer_progress migrations
    Migrate,
    /// Print the effective configuration and any warnings
    Config,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum StoreKind {
    /// Process-local store; nothing survives the command
    Memory,
    /// Postgres at DATABASE_URL / database_url
    Postgres,
}

#[derive(Args, Debug)]
struct ReplayArgs {
    /// Viewer the samples belong to
    #[arg(long)]
    viewer: String,
    /// JSON-lines file of playback samples
    samples: PathBuf,
    #[arg(long, value_enum, default_value_t = StoreKind::Memory)]
    store: StoreKind,
}

#[derive(Args, Debug)]
struct SummaryArgs {
    #[arg(long)]
    viewer: String,
    /// Series unit id, e.g. `series:12`
    #[arg(long)]
    series: String,
    /// Episode count from the catalog, when known
    #[arg(long)]
    episodes: Option<u32>,
    /// Samples to apply before summarizing
    #[arg(long)]
    samples: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = StoreKind::Postgres)]
    store: StoreKind,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let env_file = loader::load_dotenv()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,reelmarkctl=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Some(path) = env_file {
        info!(path = %path.display(), "loaded .env file");
    }

    let loaded = ConfigLoader::from_process_env()
        .load()
        .context("failed to load configuration")?;
    for warning in &loaded.warnings.items {
        warn!(hint = ?warning.hint, "{}", warning.message);
    }
    info!(source = %loaded.source, "configuration resolved");

    match cli.command {
        Command::Replay(args) => run_replay(&loaded.config, args).await,
        Command::Summary(args) => run_summary(&loaded.config, args).await,
        Command::Migrate => run_migrate(&loaded.config).await,
        Command::Config => print_config(&loaded),
    }
}

async fn open_store(
    kind: StoreKind,
    config: &Config,
) -> anyhow::Result<Arc<dyn ProgressStore>> {
    match kind {
        StoreKind::Memory => Ok(Arc::new(InMemoryProgressStore::new())),
        StoreKind::Postgres => Ok(Arc::new(connect_postgres(config).await?)),
    }
}

async fn connect_postgres(
    config: &Config,
) -> anyhow::Result<PostgresProgressStore> {
    let Some(url) = config.database_url.as_deref() else {
        bail!("DATABASE_URL is not set and no database_url is configured");
    };
    PostgresProgressStore::connect(url)
        .await
        .context("failed to connect to Postgres")
}

async fn start_engine(
    store: Arc<dyn ProgressStore>,
    viewer: &str,
    config: &Config,
) -> (ProgressEngine, watch::Sender<Option<ViewerId>>) {
    let (identity_tx, identity_rx) =
        watch::channel(Some(ViewerId::new(viewer)));
    let engine =
        ProgressEngine::start(store, identity_rx, config.engine.clone()).await;
    (engine, identity_tx)
}

fn read_samples(
    path: &Path,
) -> anyhow::Result<Vec<reelmarkctl::replay::Sample>> {
    let file = File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    parse_samples(BufReader::new(file))
        .with_context(|| format!("failed to parse {}", path.display()))
}

async fn run_replay(config: &Config, args: ReplayArgs) -> anyhow::Result<()> {
    let samples = read_samples(&args.samples)?;
    let store = open_store(args.store, config).await?;
    let (engine, _identity) = start_engine(store, &args.viewer, config).await;

    let stats = replay(&engine, &samples).await;
    let flushed = engine.dispose().await;
    info!(
        samples = stats.samples,
        toggles = stats.toggles,
        "replay finished"
    );

    let mut records: Vec<ProgressRecord> = engine.snapshot();
    records.sort_by(|a, b| a.unit_id.cmp(&b.unit_id));
    println!("{}", serde_json::to_string_pretty(&records)?);

    flushed.context("final flush failed; some progress was not stored")?;
    Ok(())
}

async fn run_summary(
    config: &Config,
    args: SummaryArgs,
) -> anyhow::Result<()> {
    let series = UnitId::parse(&args.series)
        .with_context(|| format!("invalid series id '{}'", args.series))?;
    let samples = match &args.samples {
        Some(path) => read_samples(path)?,
        None => Vec::new(),
    };

    let store = open_store(args.store, config).await?;
    let (engine, _identity) = start_engine(store, &args.viewer, config).await;
    replay(&engine, &samples).await;

    let summary = engine.series_summary(&series, args.episodes);
    engine
        .dispose()
        .await
        .context("final flush failed; some progress was not stored")?;

    match summary {
        Some(summary) => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        None => bail!("no progress recorded for {series}"),
    }
}

async fn run_migrate(config: &Config) -> anyhow::Result<()> {
    let store = connect_postgres(config).await?;
    store.migrate().await.context("migration failed")?;
    println!("viewer_progress migrations applied");
    Ok(())
}

fn print_config(loaded: &reelmarkctl::LoadedConfig) -> anyhow::Result<()> {
    let mut shown = loaded.config.clone();
    shown.database_url = loaded.config.redacted_database_url();

    println!("# source: {}", loaded.source);
    print!("{}", toml::to_string_pretty(&shown)?);
    for warning in &loaded.warnings.items {
        match &warning.hint {
            Some(hint) => println!("# warning: {} ({hint})", warning.message),
            None => println!("# warning: {}", warning.message),
        }
    }
    Ok(())
}
