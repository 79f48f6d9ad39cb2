pub mod claims;
pub mod handlers;

use crate::presentation::cli::{Cli, Commands};
use clap::Parser;
use onstore_core::error::Result;
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // logs go to stderr so `encode` output stays pipeable
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Commands::Encode { input, enc } => handlers::handle_encode(input, enc),
        Commands::Plan {
            inputs,
            first_id,
            enc,
        } => handlers::handle_plan(inputs, first_id, enc),
        Commands::Upload {
            store,
            inputs,
            dry_run,
            config,
            first_id,
            enc,
            max_retries,
            backoff_ms,
            parallelism,
        } => {
            let overrides = handlers::UploadOverrides {
                first_id,
                enc,
                max_retries,
                backoff_ms,
                parallelism,
            };
            handlers::handle_upload(store, inputs, dry_run, config, overrides)
        }
        Commands::Progress { store, asset_id } => handlers::handle_progress(store, asset_id),
        Commands::Get {
            store,
            asset_id,
            out,
        } => handlers::handle_get(store, asset_id, out),
        Commands::Attr {
            store,
            asset_id,
            key,
            ty,
            value,
        } => handlers::handle_attr(store, asset_id, key, ty, value),
        Commands::Claims { input, output } => handlers::handle_claims(input, output),
    }
}
