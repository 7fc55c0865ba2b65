//! # docqa
//!
//! Operator command line for the document question answering pipeline.
//! Every command except `drop` bootstraps the configured collection first.
//! Each prints a single JSON value on stdout. Logs go to stderr.
//!
//! ```bash
//! docqa bootstrap
//! docqa ingest-files ./data/docs
//! docqa ingest-table --table faq --fields question,answer --where "status = 'active'"
//! docqa ask "How do I reset my password?" --max-sources 3
//! docqa stats
//! docqa drop
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use docqa_rag::ollama::{OllamaEmbeddingProvider, OllamaGenerativeProvider};
use docqa_rag::qdrant::QdrantVectorStore;
use docqa_rag::{ExtractOptions, FileExtractor, QueryEngine, VectorStore};
use serde_json::json;
use tracing::info;

mod config;
mod telemetry;

use config::Settings;

#[derive(Parser)]
#[command(name = "docqa")]
#[command(about = "Index documents and answer questions about them")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the collection, creating it if it does not exist
    Bootstrap,

    /// Ingest every supported file under a directory
    IngestFiles {
        /// Directory to walk
        dir: PathBuf,

        /// Only ingest these extensions (e.g. md,pdf)
        #[arg(long, value_delimiter = ',')]
        extensions: Vec<String>,
    },

    /// Ingest rows of a database table (reads DATABASE_URL)
    #[cfg(feature = "postgres")]
    IngestTable {
        /// Table name, optionally schema-qualified
        #[arg(long)]
        table: String,

        /// Columns combined into the document text
        #[arg(
            long,
            value_delimiter = ',',
            default_values_t = ["question".to_string(), "answer".to_string()]
        )]
        fields: Vec<String>,

        /// SQL condition restricting the rows, without WHERE
        #[arg(long = "where")]
        where_clause: Option<String>,
    },

    /// Answer a question from the indexed documents
    Ask {
        /// The question
        question: String,

        /// Maximum number of sources to show
        #[arg(short, long, default_value = "3")]
        max_sources: usize,
    },

    /// Show collection statistics
    Stats,

    /// Delete the collection and everything in it
    Drop,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init();

    let cli = Cli::parse();
    let settings = Settings::from_env().context("invalid configuration")?;

    let output = match cli.command {
        Commands::Bootstrap => {
            let engine = open_engine(&settings).await?;
            json!({
                "collection": engine.collection().name(),
                "dimension": engine.collection().dimension(),
            })
        }
        Commands::IngestFiles { dir, extensions } => {
            let mut extractor = FileExtractor::new(dir);
            if !extensions.is_empty() {
                extractor = extractor.with_extensions(extensions)?;
            }
            let engine = open_engine(&settings).await?;
            let report = engine.ingest(&extractor, &ExtractOptions::default()).await?;
            serde_json::to_value(report)?
        }
        #[cfg(feature = "postgres")]
        Commands::IngestTable { table, fields, where_clause } => {
            let url = settings.database_url.as_deref().context("DATABASE_URL is not set")?;
            let mut source = docqa_rag::PostgresTableSource::connect(url, table).await?;
            if let Some(clause) = where_clause {
                source = source.with_where_clause(clause);
            }
            let extractor = docqa_rag::TableExtractor::new(source);
            let options = ExtractOptions::with_text_fields(fields);
            let engine = open_engine(&settings).await?;
            let report = engine.ingest(&extractor, &options).await?;
            serde_json::to_value(report)?
        }
        Commands::Ask { question, max_sources } => {
            let engine = open_engine(&settings).await?;
            let result = engine.answer(&question, max_sources, &[]).await?;
            serde_json::to_value(result)?
        }
        Commands::Stats => {
            let engine = open_engine(&settings).await?;
            serde_json::to_value(engine.collection_stats().await)?
        }
        // No bootstrap: it would create the collection about to be deleted.
        Commands::Drop => {
            let store = QdrantVectorStore::new(&settings.qdrant)?;
            info!(qdrant = %settings.qdrant.url, "dropping collection");
            drop_collection(&store, &settings.rag.collection_name).await?
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Delete `name` from the store. Deleting an absent collection succeeds.
async fn drop_collection(store: &dyn VectorStore, name: &str) -> Result<serde_json::Value> {
    store
        .delete_collection(name)
        .await
        .with_context(|| format!("failed to drop collection '{name}'"))?;
    Ok(json!({ "dropped": name }))
}

async fn open_engine(settings: &Settings) -> Result<QueryEngine> {
    let embedder = OllamaEmbeddingProvider::from_config(&settings.ollama)
        .await
        .context("failed to initialise the embedding provider")?;
    let generator = OllamaGenerativeProvider::new(&settings.ollama)?;
    let store = QdrantVectorStore::new(&settings.qdrant)?;

    info!(
        ollama = %settings.ollama.base_url,
        qdrant = %settings.qdrant.url,
        collection = %settings.rag.collection_name,
        "opening query engine"
    );
    let engine = QueryEngine::builder()
        .config(settings.rag.clone())
        .embedding_provider(Arc::new(embedder))
        .generative_provider(Arc::new(generator))
        .vector_store(Arc::new(store))
        .build()
        .await
        .context("failed to open the collection")?;
    Ok(engine)
}
