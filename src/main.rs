use ragdoc::cache::QueryCache;
use ragdoc::cli::{Cli, Commands, ConfigAction, KbAction};
use ragdoc::config::Config;
use ragdoc::error::{RagError, Result};
use ragdoc::ingest::Chunker;
use ragdoc::providers::ProviderFactory;
use ragdoc::search::{SearchResponse, SearchService};
use ragdoc::storage::Database;
use std::sync::Arc;
use std::time::Duration;

fn main() -> Result<()> {
    // Initialize logging
    init_logging();

    // Parse CLI arguments
    let cli = Cli::parse_args();

    match cli.command {
        Commands::Kb { action } => {
            cmd_kb(cli.config, action)?;
        }
        Commands::Add { kb_id, file, name } => {
            cmd_add(cli.config, &kb_id, &file, name)?;
        }
        Commands::Search {
            kb_id,
            query,
            top_k,
            rewrite,
            profile,
            json,
        } => {
            cmd_search(cli.config, &kb_id, &query, top_k, rewrite, profile, json)?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, action)?;
        }
    }

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ragdoc=info"));

    fmt().with_env_filter(filter).with_target(false).init();
}

fn cmd_kb(config_path: Option<std::path::PathBuf>, action: KbAction) -> Result<()> {
    let config = load_config(config_path, None)?;
    let db = open_database(&config)?;

    match action {
        KbAction::Create { name, description } => {
            let kb = db.create_knowledge_base(&name, description.as_deref())?;
            println!("✓ Created knowledge base");
            println!("  Name: {}", kb.name);
            println!("  ID:   {}", kb.id);
        }
        KbAction::List => {
            let kbs = db.list_knowledge_bases()?;
            if kbs.is_empty() {
                println!("No knowledge bases yet. Create one with 'ragdoc kb create <name>'");
                return Ok(());
            }

            println!("Knowledge bases: {} total\n", kbs.len());
            for kb in kbs {
                let created = chrono::DateTime::from_timestamp(kb.created_at, 0)
                    .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                println!("  {} - {} ({})", kb.id, kb.name, created);
                if let Some(description) = kb.description {
                    println!("      {}", description);
                }
            }
        }
        KbAction::Delete { kb_id } => {
            db.delete_knowledge_base(&kb_id)?;
            println!("✓ Deleted knowledge base {}", kb_id);
        }
    }

    Ok(())
}

fn cmd_add(
    config_path: Option<std::path::PathBuf>,
    kb_id: &str,
    file: &std::path::Path,
    name: Option<String>,
) -> Result<()> {
    let config = load_config(config_path, None)?;
    let db = open_database(&config)?;

    let text = std::fs::read_to_string(file).map_err(|e| RagError::Io {
        source: e,
        context: format!("Failed to read document: {:?}", file),
    })?;

    let doc_name = name.unwrap_or_else(|| {
        file.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string())
    });

    let chunker = Chunker::new(config.chunking.chunk_size, config.chunking.chunk_overlap);
    let chunks = chunker.chunk_text(&text)?;

    let doc = db.insert_document(kb_id, &doc_name, &chunks)?;

    println!("✓ Added document {}", doc.name);
    println!("  Document ID: {}", doc.id);
    println!("  Chunks:      {}", doc.chunk_count);

    Ok(())
}

fn cmd_search(
    config_path: Option<std::path::PathBuf>,
    kb_id: &str,
    query: &str,
    top_k: Option<usize>,
    rewrite: bool,
    profile: Option<String>,
    json: bool,
) -> Result<()> {
    let config = load_config(config_path, profile)?;
    let db = open_database(&config)?;
    let top_k = top_k.unwrap_or(config.retrieval.default_top_k);

    let embedding = ProviderFactory::embedding(&config.embedding)?;
    let reranker = ProviderFactory::reranker(&config.reranker)?;
    let llm = ProviderFactory::llm(&config.llm)?;

    let mut service = SearchService::new(Arc::new(db), embedding, reranker, llm);
    if config.cache.enabled {
        service = service.with_cache(QueryCache::new(
            config.cache.max_entries,
            Duration::from_secs(config.cache.ttl_secs),
        ));
    }

    let rt = tokio::runtime::Runtime::new().map_err(|e| RagError::Io {
        source: e,
        context: "Failed to create tokio runtime".to_string(),
    })?;

    let response = rt.block_on(async {
        if rewrite {
            service.search_with_rewrite(kb_id, query, top_k).await
        } else {
            service.search(kb_id, query, top_k).await
        }
    })?;

    if json {
        let rendered =
            serde_json::to_string_pretty(&response).map_err(|e| RagError::Json {
                source: e,
                context: "Failed to serialize search response".to_string(),
            })?;
        println!("{}", rendered);
        return Ok(());
    }

    print_response(&response);
    Ok(())
}

fn print_response(response: &SearchResponse) {
    if let Some(rewritten) = &response.rewritten_query {
        println!("Query: {} (rewritten: {})", response.query, rewritten);
    } else {
        println!("Query: {}", response.query);
    }

    if response.results.is_empty() {
        println!("\nNo results.");
        return;
    }

    println!("\nTop {} results:", response.results.len());
    for (i, result) in response.results.iter().enumerate() {
        println!(
            "\n  {}. [{}] score {:.4}",
            i + 1,
            result.doc_name,
            result.score
        );
        println!("     {}", preview(&result.content, 200));
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    let flattened = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flattened.chars().count() <= max_chars {
        flattened
    } else {
        let truncated: String = flattened.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

fn cmd_config(config_path: Option<std::path::PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path, None)?;
            let json = serde_json::to_string_pretty(&config).map_err(|e| RagError::Json {
                source: e,
                context: "Failed to serialize config".to_string(),
            })?;
            println!("{}", json);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| RagError::Io {
                    source: e,
                    context: format!("Failed to create config directory: {:?}", parent),
                })?;
            }

            let config = Config::default();
            config.save(&path)?;

            println!("✓ Configuration initialized at: {}", path.display());
            println!("  Enable providers in the embedding/reranker/llm sections to go hybrid");
        }
    }

    Ok(())
}

fn load_config(config_path: Option<std::path::PathBuf>, profile: Option<String>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::warn!(
            "Config file not found, using defaults. Run 'ragdoc config init' to create one."
        );
        let mut config = Config::default();
        if let Some(profile) = profile {
            config.apply_profile(&profile);
        }
        return Ok(config);
    }

    if let Some(profile) = profile {
        Config::load_with_profile(&path, &profile)
    } else {
        Config::load(&path)
    }
}

fn open_database(config: &Config) -> Result<Database> {
    let data_dir = expand_path(&config.storage.data_dir)?;
    let db = Database::new(&data_dir.join("ragdoc.sqlite"))?;
    Ok(db)
}

fn expand_path(path: &std::path::Path) -> Result<std::path::PathBuf> {
    let path_str = path
        .to_str()
        .ok_or_else(|| RagError::Config("Invalid path encoding".to_string()))?;

    if let Some(stripped) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| RagError::Config("Cannot determine home directory".to_string()))?;
        Ok(home.join(stripped))
    } else {
        Ok(path.to_path_buf())
    }
}
