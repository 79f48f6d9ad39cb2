use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about = "onstoredev: chunked asset uploads for word stores", long_about = None)]
pub struct Cli {
    /// More log output (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Encoding knobs shared by every command that reads assets.
#[derive(Args, Clone, Debug, Default)]
pub struct EncodeArgs {
    /// Raw-deflate each asset and record `_inflatedSize`
    #[arg(long, conflicts_with = "no_compress")]
    pub compress: bool,

    /// Store assets as-is, even if the config file enables compression
    #[arg(long)]
    pub no_compress: bool,

    /// Collapse whitespace in `.svg` inputs first
    #[arg(long, conflicts_with = "no_minify")]
    pub minify: bool,

    /// Leave `.svg` inputs untouched, even if the config file minifies
    #[arg(long)]
    pub no_minify: bool,

    /// Words per write (default 768)
    #[arg(long, conflicts_with = "batch_bytes")]
    pub batch_words: Option<usize>,

    /// Payload bytes per write; converted to whole words
    #[arg(long)]
    pub batch_bytes: Option<usize>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the words one file encodes to
    Encode {
        input: PathBuf,
        #[command(flatten)]
        enc: EncodeArgs,
    },

    /// Print the batch table for files or directories, ids counting from --first-id
    Plan {
        inputs: Vec<PathBuf>,
        #[arg(long)]
        first_id: Option<u64>,
        #[command(flatten)]
        enc: EncodeArgs,
    },

    /// Upload files or directories, resuming whatever the store already holds
    Upload {
        /// Store directory
        #[arg(long, required_unless_present = "dry_run")]
        store: Option<PathBuf>,

        inputs: Vec<PathBuf>,

        /// Upload into a throwaway in-memory store
        #[arg(long)]
        dry_run: bool,

        /// TOML file with upload settings; flags win over it
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long)]
        first_id: Option<u64>,

        #[command(flatten)]
        enc: EncodeArgs,

        /// Attempts per write, first try included
        #[arg(long)]
        max_retries: Option<usize>,

        /// Backoff after the first failure, doubled per retry
        #[arg(long)]
        backoff_ms: Option<u64>,

        /// Upload this many assets at once
        #[arg(long)]
        parallelism: Option<usize>,
    },

    /// Show cursor and declared length, for one asset or all
    Progress {
        #[arg(long)]
        store: PathBuf,
        asset_id: Option<u64>,
    },

    /// Reassemble a stored asset into a file
    Get {
        #[arg(long)]
        store: PathBuf,
        asset_id: u64,
        out: PathBuf,
    },

    /// Set a typed attribute on an asset
    Attr {
        #[arg(long)]
        store: PathBuf,
        asset_id: u64,
        key: String,
        /// STRING, BOOL, UINT, INT or TIMESTAMP (unix seconds)
        #[arg(value_name = "TYPE")]
        ty: String,
        value: String,
    },

    /// Build a merkle claim list from an address → balance JSON map
    Claims {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
}
