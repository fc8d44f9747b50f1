mod cli;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_file = cli::load_env_file(None);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "webhook_migrator=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    if let Some(path) = &env_file {
        tracing::debug!("Loaded environment from {}", path.display());
    }

    let cli = Cli::parse();
    let settings = cli.settings.as_ref();

    match cli.command {
        Commands::Run {
            target,
            credentials,
            no_backup,
            output_dir,
        } => {
            cli::run(settings, target, credentials, no_backup, output_dir).await?;
        }
        Commands::Scan {
            target,
            format,
            show_urls,
        } => {
            cli::scan(settings, target, format, show_urls)?;
        }
        Commands::Status { credentials } => {
            cli::status(settings, credentials).await?;
        }
    }

    Ok(())
}
