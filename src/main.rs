use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use wordquest::server::AppState;
use wordquest::{Config, Database, server};

#[derive(Parser)]
#[command(name = "wordquest")]
#[command(about = "Vocabulary-learning backend with XP, streaks, and a virtual pet")]
#[command(version)]
struct Cli {
    /// Path to the config file (defaults to ~/.wordquest/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// Override the configured port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Write a starter config file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    match cli.command {
        Some(Commands::Init { force }) => {
            let path = cli.config.unwrap_or_else(Config::default_path);
            Config::write_starter(&path, force)?;
            info!("Wrote config to {}", path.display());
            Ok(())
        }
        Some(Commands::Serve { port }) => serve(cli.config.as_deref(), port),
        None => serve(cli.config.as_deref(), None),
    }
}

fn serve(config_path: Option<&std::path::Path>, port_override: Option<u16>) -> Result<()> {
    let config = Config::load_or_default(config_path)?;
    let port = port_override.unwrap_or(config.port);

    let db = Database::open(&config.database_path())?;
    let seeded = db.seed_sample_words()?;
    if seeded > 0 {
        info!("Seeded {seeded} sample words");
    }

    let state = AppState::new(db, &config);
    if let Some(admin) = &config.admin {
        state.auth.ensure_admin(admin)?;
    }

    server::run(state, &config.bind_addr, port)
}
