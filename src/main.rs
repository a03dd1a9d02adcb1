use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand, ValueEnum};
use recordform::{
    FileHistoryStorage, HistoryEntryStorage, QueryHistoryStore, RankingCriterion, StorageConf,
    TypeDescriptor, TypeSet, ValidationOutcome, compute_fingerprint_set, select_all_query,
};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "recordform")]
#[command(about = "Schema checksum and query history tooling for record types")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the checksum of every record type in a manifest
    Checksum {
        #[arg(long)]
        manifest: PathBuf,
    },
    /// Check a manifest against its schema snapshot, writing it on first run
    Validate {
        #[arg(long)]
        manifest: PathBuf,
        /// Defaults to RECORDFORM_SNAPSHOT
        #[arg(long)]
        snapshot: Option<PathBuf>,
        /// Defaults to RECORDFORM_DATABASE
        #[arg(long)]
        database: Option<String>,
    },
    /// Print the select-all query of a record type
    SeedQuery {
        #[arg(long)]
        manifest: PathBuf,
        /// Type id or simple name
        #[arg(long = "type")]
        record_type: String,
    },
    /// List the stored query history of a record type
    History {
        #[arg(long)]
        file: PathBuf,
        #[arg(long = "type")]
        type_id: String,
        #[arg(long, value_enum, default_value_t = Ranking::Usage)]
        by: Ranking,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Ranking {
    Usage,
    Recency,
}

impl From<Ranking> for RankingCriterion {
    fn from(ranking: Ranking) -> Self {
        match ranking {
            Ranking::Usage => RankingCriterion::ByUsage,
            Ranking::Recency => RankingCriterion::ByRecency,
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Checksum { manifest } => print_checksums(&manifest),
        Command::Validate {
            manifest,
            snapshot,
            database,
        } => validate(&manifest, snapshot, database),
        Command::SeedQuery {
            manifest,
            record_type,
        } => {
            let types = load_manifest(&manifest)?;
            let descriptor = find_type(&types, &record_type)?;
            println!("{}", select_all_query(descriptor));
            Ok(())
        }
        Command::History { file, type_id, by } => print_history(&file, &type_id, by.into()),
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("recordform=info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_manifest(path: &Path) -> Result<TypeSet> {
    TypeSet::from_manifest(path)
        .with_context(|| format!("failed to load record types from {}", path.display()))
}

fn find_type<'a>(types: &'a TypeSet, name: &str) -> Result<&'a TypeDescriptor> {
    types
        .get(name)
        .or_else(|| types.by_simple_name(name))
        .ok_or_else(|| anyhow!("record type '{name}' is not in the manifest"))
}

fn print_checksums(manifest: &Path) -> Result<()> {
    let types = load_manifest(manifest)?;
    for (type_id, checksum) in compute_fingerprint_set(&types) {
        println!("{type_id}\t{checksum}");
    }
    Ok(())
}

fn validate(manifest: &Path, snapshot: Option<PathBuf>, database: Option<String>) -> Result<()> {
    let mut conf = StorageConf::from_env(load_manifest(manifest)?)?;
    if let Some(snapshot) = snapshot {
        conf = conf.snapshot_path(snapshot);
    }
    if let Some(database) = database {
        conf = conf.database(&database);
    }

    let outcome = conf.validate().context("schema validation failed")?;
    info!(url = %conf.connection_url(), ?outcome, "schema validated");
    let message = match outcome {
        ValidationOutcome::Created => "snapshot created",
        ValidationOutcome::Skipped => "snapshot empty, check skipped",
        ValidationOutcome::Matched => "schema matches snapshot",
    };
    println!("{message}");
    Ok(())
}

fn print_history(file: &Path, type_id: &str, criterion: RankingCriterion) -> Result<()> {
    let entries = FileHistoryStorage::new(file)
        .retrieve(type_id)
        .with_context(|| format!("failed to read query history from {}", file.display()))?;
    let history = QueryHistoryStore::with_entries(entries, criterion);
    for entry in history.entries() {
        println!(
            "{}\t{}\t{}",
            entry.usage_count(),
            entry.last_used_at().to_rfc3339(),
            entry.query_text()
        );
    }
    Ok(())
}
