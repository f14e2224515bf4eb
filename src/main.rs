use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use secret_vault::config::{load_dotenv_files, VaultConfig};
use secret_vault::secrets::MasterKey;

#[derive(Debug, Parser)]
#[command(name = "secret-vault", version, about = "Per-user encrypted secret storage service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve {
        /// Override VAULT_BIND_ADDR
        #[arg(long)]
        bind: Option<SocketAddr>,
        /// Override VAULT_DB_PATH
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Print a fresh base64 key for SECRETS_ENCRYPTION_KEY
    GenerateKey,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve { bind: None, db: None }) {
        Command::GenerateKey => {
            println!("{}", MasterKey::generate().to_base64());
            Ok(())
        }
        Command::Serve { bind, db } => {
            secret_vault::init_tracing();
            if let Some(path) = load_dotenv_files() {
                info!(path = %path.display(), "loaded environment file");
            }

            let mut config = VaultConfig::from_env().context("invalid configuration")?;
            if let Some(bind) = bind {
                config.bind_addr = bind;
            }
            if let Some(db) = db {
                config.db_path = db;
            }

            secret_vault::serve(config).await
        }
    }
}
