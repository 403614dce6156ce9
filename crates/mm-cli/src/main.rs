//! MM CLI - Command-line interface
//!
//! Usage:
//!   mm search <description>
//!   mm search              (interactive, one description per line)
//!   mm index [csv]
//!   mm stats
//!
//! Author: hephaex@gmail.com

mod session;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use mm_catalog::MovieCatalog;
use mm_core::{
    AppConfig, EnvSecrets, LoggingConfig, SecretStore, SecretsFile, DEFAULT_INDEX_NAME,
};
use mm_indexer::BatchIndexer;
use mm_vector::{
    CachedIndex, ConnectOptions, ConnectionManager, DescribeStatsRequest, OpenAiEmbedding,
    OperationCache, PineconeConnector, VectorIndex,
};
use session::{SearchSession, SearchSettings};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mm")]
#[command(about = "Find movies by describing their plot")]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Secrets file holding the `[connections.<name>]` table
    #[arg(long, global = true)]
    secrets: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search movies by plot description
    ///
    /// Without a description, reads one per line from stdin until `quit`.
    Search {
        /// Free-text description of the plot
        description: Option<String>,

        /// Number of matches to return
        #[arg(long, default_value_t = 10)]
        top_k: usize,

        /// Seconds to cache the query result
        #[arg(long, default_value_t = 3600)]
        ttl: u64,

        /// Index namespace
        #[arg(long)]
        namespace: Option<String>,

        /// Truncate synopses to this many characters
        #[arg(long)]
        synopsis_width: Option<usize>,

        /// Print rows as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Embed the dataset and upsert it into the index
    Index {
        /// Movie CSV (defaults to the configured dataset)
        csv: Option<PathBuf>,

        /// Records per upsert
        #[arg(long)]
        batch_size: Option<usize>,

        /// Seconds between upsert retries
        #[arg(long)]
        retry_delay_secs: Option<u64>,

        /// Index namespace
        #[arg(long)]
        namespace: Option<String>,
    },
    /// Show index statistics
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;
    init_tracing(&config.logging);

    if let Commands::Search {
        description: Some(description),
        ..
    } = &cli.command
    {
        if description.trim().is_empty() {
            bail!("Please enter a movie description");
        }
    }

    let secrets = secret_store(&config, cli.secrets.clone())?;
    let connector = PineconeConnector::from_config(&config.pinecone)?;
    let manager = ConnectionManager::new(Arc::new(connector), secrets.clone());
    let index = manager
        .connect(&connect_options(&config, secrets.as_ref()))
        .await?;

    match cli.command {
        Commands::Search {
            description,
            top_k,
            ttl,
            namespace,
            synopsis_width,
            json,
        } => {
            let session = SearchSession::new(
                Arc::new(OpenAiEmbedding::from_config(&config.embedding)?),
                cached_index(index, &config),
                MovieCatalog::load(&config.dataset.path)?,
                SearchSettings {
                    top_k,
                    ttl: Duration::from_secs(ttl),
                    namespace,
                    synopsis_width,
                    json,
                },
            );

            match description {
                Some(description) => {
                    let rows = session.search(&description).await?;
                    session.render(&rows, &mut std::io::stdout().lock())?;
                }
                None => {
                    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
                    let report = session
                        .run_interactive(stdin, &mut std::io::stdout())
                        .await?;
                    println!(
                        "Cache: {} hits, {} misses ({:.0}% hit rate)",
                        report.hits,
                        report.misses,
                        report.hit_rate * 100.0
                    );
                }
            }
        }
        Commands::Index {
            csv,
            batch_size,
            retry_delay_secs,
            namespace,
        } => {
            let path = csv.unwrap_or_else(|| config.dataset.path.clone());
            let catalog = MovieCatalog::load(&path)?;
            let embedder = Arc::new(OpenAiEmbedding::from_config(&config.embedding)?);

            let mut indexer = BatchIndexer::from_config(index, embedder, &config.indexer);
            if let Some(size) = batch_size {
                indexer = indexer.with_batch_size(size);
            }
            if let Some(secs) = retry_delay_secs {
                indexer = indexer.with_retry_delay(Duration::from_secs(secs));
            }
            if let Some(ns) = namespace {
                indexer = indexer.with_namespace(ns);
            }

            let report = indexer.run(catalog.plots()).await;
            println!(
                "Indexed {} movies in {} batches ({} skipped, {} retries)",
                report.indexed, report.batches, report.skipped, report.retries
            );
        }
        Commands::Stats => {
            let cached = cached_index(index, &config);
            let stats = cached
                .describe_index_stats(DescribeStatsRequest::default(), None)
                .await?;

            println!("Dimension:      {}", stats.dimension);
            println!("Total vectors:  {}", stats.total_vector_count);
            println!("Index fullness: {:.2}", stats.index_fullness);
            for (name, ns) in &stats.namespaces {
                let name = if name.is_empty() { "(default)" } else { name };
                println!("  {name}: {} vectors", ns.vector_count);
            }
        }
    }

    Ok(())
}

/// Config file (if given) overlaid with the environment
fn load_config(path: Option<&PathBuf>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => AppConfig::default(),
    };
    Ok(config.with_env_override()?)
}

fn init_tracing(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    if config.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Secrets file from the flag or config, else `PINECONE_*` variables
fn secret_store(
    config: &AppConfig,
    secrets_path: Option<PathBuf>,
) -> anyhow::Result<Arc<dyn SecretStore>> {
    let secrets_path = secrets_path.or_else(|| config.pinecone.secrets_file.clone());
    Ok(match secrets_path {
        Some(path) => Arc::new(SecretsFile::load(path, &config.pinecone.connection_name)?),
        None => Arc::new(EnvSecrets::new("PINECONE")),
    })
}

/// Explicit connection parameters from config; unset ones fall back to secrets
///
/// The index name is pinned to [`DEFAULT_INDEX_NAME`] only when neither
/// config nor secrets name one.
fn connect_options(config: &AppConfig, secrets: &dyn SecretStore) -> ConnectOptions {
    let index_name = config.pinecone.index_name.clone().or_else(|| {
        secrets
            .get("index_name")
            .is_none()
            .then(|| DEFAULT_INDEX_NAME.to_string())
    });

    ConnectOptions {
        api_key: config.pinecone.api_key.clone(),
        environment: config.pinecone.environment.clone(),
        index_name,
        index_host: config.pinecone.index_host.clone(),
    }
}

fn cached_index(index: Arc<dyn VectorIndex>, config: &AppConfig) -> CachedIndex {
    CachedIndex::new(index, OperationCache::with_config(&config.cache))
        .with_default_ttl(Duration::from_secs(config.cache.default_ttl_secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_search_defaults() {
        let cli = Cli::try_parse_from(["mm", "search", "a heist on a train"]).unwrap();
        match cli.command {
            Commands::Search {
                description,
                top_k,
                ttl,
                json,
                ..
            } => {
                assert_eq!(description.as_deref(), Some("a heist on a train"));
                assert_eq!(top_k, 10);
                assert_eq!(ttl, 3600);
                assert!(!json);
            }
            _ => panic!("expected search"),
        }
    }

    #[test]
    fn test_index_overrides() {
        let cli = Cli::try_parse_from([
            "mm",
            "--config",
            "mm.toml",
            "index",
            "movies.csv",
            "--batch-size",
            "50",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("mm.toml")));
        match cli.command {
            Commands::Index {
                csv,
                batch_size,
                retry_delay_secs,
                ..
            } => {
                assert_eq!(csv, Some(PathBuf::from("movies.csv")));
                assert_eq!(batch_size, Some(50));
                assert_eq!(retry_delay_secs, None);
            }
            _ => panic!("expected index"),
        }
    }

    #[test]
    fn test_search_without_description_is_interactive() {
        let cli = Cli::try_parse_from(["mm", "search", "--top-k", "3"]).unwrap();
        match cli.command {
            Commands::Search {
                description, top_k, ..
            } => {
                assert_eq!(description, None);
                assert_eq!(top_k, 3);
            }
            _ => panic!("expected search"),
        }
    }

    #[test]
    fn test_connect_options_from_config() {
        let config = AppConfig::default()
            .apply_env(|key| match key {
                "PINECONE_API_KEY" => Some("pk".to_string()),
                "PINECONE_REGION" => Some("us-west1-gcp".to_string()),
                "PINECONE_INDEX_HOST" => Some("https://movies-abc.svc.pinecone.io".to_string()),
                _ => None,
            })
            .unwrap();

        let options = connect_options(&config, &HashMap::<String, String>::new());
        assert_eq!(options.api_key.as_deref(), Some("pk"));
        assert_eq!(options.environment.as_deref(), Some("us-west1-gcp"));
        assert_eq!(options.index_name.as_deref(), Some(DEFAULT_INDEX_NAME));
        assert_eq!(
            options.index_host.as_deref(),
            Some("https://movies-abc.svc.pinecone.io")
        );
    }

    #[test]
    fn test_index_name_left_to_secrets() {
        let secrets = HashMap::from([("index_name".to_string(), "films".to_string())]);

        let options = connect_options(&AppConfig::default(), &secrets);
        assert_eq!(options.index_name, None);
    }

    #[test]
    fn test_configured_index_name_wins_over_secrets() {
        let config = AppConfig::default()
            .apply_env(|key| (key == "PINECONE_INDEX").then(|| "shows".to_string()))
            .unwrap();
        let secrets = HashMap::from([("index_name".to_string(), "films".to_string())]);

        let options = connect_options(&config, &secrets);
        assert_eq!(options.index_name.as_deref(), Some("shows"));
    }
}
