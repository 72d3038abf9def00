//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "ragdoc",
    version,
    about = "Knowledge-base retrieval backend with hybrid search and reranking",
    long_about = "Ragdoc stores chunked documents per knowledge base and answers natural-language \
                  queries with hybrid BM25 + vector retrieval, Reciprocal Rank Fusion, optional \
                  cross-encoder reranking and optional LLM query rewriting."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/ragdoc/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage knowledge bases
    Kb {
        #[command(subcommand)]
        action: KbAction,
    },

    /// Add a plain-text document to a knowledge base
    Add {
        /// Knowledge base ID
        kb_id: String,

        /// Path to the text file to ingest
        file: PathBuf,

        /// Document display name (defaults to the file name)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Search a knowledge base
    Search {
        /// Knowledge base ID
        kb_id: String,

        /// Query text
        query: String,

        /// Number of results to return (defaults to retrieval.default_top_k)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Expand the query with LLM rewriting before retrieval
        #[arg(long)]
        rewrite: bool,

        /// Profile to apply (e.g. "offline")
        #[arg(short, long)]
        profile: Option<String>,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum KbAction {
    /// Create a new knowledge base
    Create {
        /// Knowledge base name
        name: String,

        /// Optional description
        #[arg(short, long)]
        description: Option<String>,
    },

    /// List knowledge bases
    List,

    /// Delete a knowledge base and all of its documents
    Delete {
        /// Knowledge base ID
        kb_id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
