/// CLI пайплайна: derive → train → compare

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use tracing_subscriber::EnvFilter;

use popularity_ml::{
    train_version, ArtifactStore, DerivedDataset, FeatureEngineer, PipelineConfig, SongRecord,
    VersionComparator, VersionRegistry,
};

#[derive(Parser, Debug)]
#[command(name = "popularity-ml", version, about = "Song popularity model pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Derive model features from cleaned song records
    Derive {
        /// JSON array of cleaned records
        #[arg(short, long)]
        input: PathBuf,
        /// Where to write the derived rows together with the tempo range
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Train, evaluate and register one model version
    Train {
        /// Derived dataset written by `derive`
        #[arg(short, long)]
        input: PathBuf,
        /// Built-in version (v1, v2) or the id from --config
        #[arg(short, long, default_value = "v1")]
        version: String,
        /// TOML pipeline configuration overriding the built-in versions
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long, default_value = "models")]
        models_dir: PathBuf,
    },
    /// Compare registered versions against the first one
    Compare {
        #[arg(long, default_value = "models")]
        models_dir: PathBuf,
        #[arg(num_args = 2.., required = true)]
        versions: Vec<String>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Derive { input, output } => derive(&input, &output),
        Command::Train {
            input,
            version,
            config,
            models_dir,
        } => train(&input, &version, config.as_deref(), &models_dir),
        Command::Compare {
            models_dir,
            versions,
        } => compare(&models_dir, &versions),
    }
}

fn derive(input: &Path, output: &Path) -> anyhow::Result<()> {
    let records: Vec<SongRecord> = read_json(input)?;
    tracing::info!("Loaded {} records from {}", records.len(), input.display());

    let dataset = FeatureEngineer::derive(&records)?;

    let file = File::create(output).with_context(|| format!("creating {}", output.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &dataset)?;
    tracing::info!("Featured data saved to {}", output.display());

    Ok(())
}

fn train(
    input: &Path,
    version: &str,
    config: Option<&Path>,
    models_dir: &Path,
) -> anyhow::Result<()> {
    let config = match config {
        Some(path) => {
            let config = PipelineConfig::load(path)
                .with_context(|| format!("loading pipeline config {}", path.display()))?;
            if config.version != version {
                bail!(
                    "config {} describes version {}, not {}",
                    path.display(),
                    config.version,
                    version
                );
            }
            config
        }
        None => match PipelineConfig::builtin(version) {
            Some(config) => config,
            None => bail!("unknown version {}; pass --config for custom versions", version),
        },
    };

    let dataset: DerivedDataset = read_json(input)?;
    let trained = train_version(&dataset, &config)?;

    let registry = VersionRegistry::open(models_dir)?;
    let artifacts = ArtifactStore::open(models_dir)?;
    let record = trained.register(&registry, &artifacts)?;

    let top: Vec<_> = trained.feature_importances().into_iter().take(5).collect();
    let summary = serde_json::json!({
        "record": record,
        "top_features": top,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}

fn compare(models_dir: &Path, versions: &[String]) -> anyhow::Result<()> {
    let registry = VersionRegistry::open(models_dir)?;
    let comparison = VersionComparator::compare_versions(&registry, versions)?;
    println!("{}", serde_json::to_string_pretty(&comparison)?);
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing {}", path.display()))
}
