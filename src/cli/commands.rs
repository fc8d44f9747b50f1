use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use webhook_migrator::error::Result;
use webhook_migrator::{
    Config, ConsoleSink, Credentials, DiscordClient, DiscordClientConfig, LogSink,
    MessagingPlatform, Pipeline, ProgressSink, RunStatistics, Settings, SilentSink, WebhookUrl,
};

#[derive(Parser)]
#[command(name = "webhook-migrator")]
#[command(about = "Move hard-coded Discord webhooks into one channel per resource")]
#[command(version)]
#[command(after_long_help = r#"
EXAMPLES:
    # Preview what would be migrated
    webhook-migrator scan --root ./resources

    # Same, as JSON with full URLs
    webhook-migrator scan --root ./resources --format json --show-urls

    # Check credentials and the target category
    webhook-migrator status

    # Migrate (credentials from DISCORD_BOT_TOKEN, DISCORD_GUILD_ID, QB_LOGS_CATEGORY_ID)
    webhook-migrator run --root ./resources
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// TOML file with tunables (extensions, delays, output locations)
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan, provision channels and webhooks, rewrite files, write the report
    Run {
        #[command(flatten)]
        target: TargetArgs,

        #[command(flatten)]
        credentials: CredentialArgs,

        /// Do not copy files before rewriting them
        #[arg(long)]
        no_backup: bool,

        /// Directory for the JSON and text reports
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// Scan only: list resources and the webhooks found in them
    Scan {
        #[command(flatten)]
        target: TargetArgs,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Print full URLs instead of masking the token
        #[arg(long)]
        show_urls: bool,
    },

    /// Validate credentials and check that the target category exists
    Status {
        #[command(flatten)]
        credentials: CredentialArgs,
    },
}

#[derive(Args)]
pub struct TargetArgs {
    /// Root of the resources tree
    #[arg(long, short, env = "FIVEM_RESOURCES_PATH")]
    pub root: Option<PathBuf>,
}

#[derive(Args)]
pub struct CredentialArgs {
    /// Discord bot token
    #[arg(long, env = "DISCORD_BOT_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Discord server (guild) id
    #[arg(long, env = "DISCORD_GUILD_ID")]
    pub guild: Option<String>,

    /// Category that receives the per-resource channels
    #[arg(long, env = "QB_LOGS_CATEGORY_ID")]
    pub category: Option<String>,
}

impl CredentialArgs {
    fn into_credentials(self) -> Credentials {
        Credentials {
            bot_token: self.token.unwrap_or_default(),
            guild_id: self.guild.unwrap_or_default(),
            category_id: self.category.unwrap_or_default(),
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Load a `.env` file into the process environment before arguments are
/// parsed. Variables already set win. Returns the file that was read.
pub fn load_env_file(path: Option<&Path>) -> Option<PathBuf> {
    match path {
        Some(path) => dotenvy::from_path(path).ok().map(|_| path.to_path_buf()),
        None => dotenvy::dotenv().ok(),
    }
}

fn load_settings(path: Option<&PathBuf>) -> Result<Settings> {
    match path {
        Some(path) => Settings::load(path),
        None => Ok(Settings::default()),
    }
}

/// Cancel the returned token on Ctrl-C.
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing current step");
            child.cancel();
        }
    });
    token
}

pub async fn run(
    settings_path: Option<&PathBuf>,
    target: TargetArgs,
    credentials: CredentialArgs,
    no_backup: bool,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let mut settings = load_settings(settings_path)?;
    if no_backup {
        settings.create_backups = false;
    }
    if let Some(dir) = output_dir {
        settings.output_dir = dir;
    }

    let config = Config::new(
        target.root.unwrap_or_default(),
        credentials.into_credentials(),
        settings,
    );
    config.validate()?;

    let client = DiscordClient::new(DiscordClientConfig::new(
        config.credentials.bot_token.clone(),
        config.credentials.guild_id.clone(),
    ))?;

    let sink = ConsoleSink::new();
    let cancel = cancel_on_ctrl_c();
    let result = Pipeline::new(&config, &sink).run(&client, &cancel).await;
    sink.finish();

    let report = result?;
    if report.cancelled {
        println!("Run cancelled; partial results were saved.");
    }
    if let Some(dir) = &report.backup_dir {
        println!("Backups: {}", dir.display());
    }
    println!("Results: {}", config.settings.output_dir.display());
    Ok(())
}

#[derive(Serialize)]
struct ScanListing {
    statistics: RunStatistics,
    resources: BTreeMap<String, Vec<String>>,
    shared: BTreeMap<String, Vec<String>>,
}

pub fn scan(
    settings_path: Option<&PathBuf>,
    target: TargetArgs,
    format: OutputFormat,
    show_urls: bool,
) -> Result<()> {
    let settings = load_settings(settings_path)?;
    let config = Config::new(target.root.unwrap_or_default(), Credentials::default(), settings);

    // JSON goes to stdout untouched; text mode logs progress alongside.
    let sink: Box<dyn ProgressSink> = match format {
        OutputFormat::Json => Box::new(SilentSink),
        OutputFormat::Text => Box::new(LogSink),
    };
    let outcome = Pipeline::new(&config, sink.as_ref()).scan_only(&CancellationToken::new())?;

    let render = |url: &WebhookUrl| {
        if show_urls {
            url.to_string()
        } else {
            url.redacted()
        }
    };

    let listing = ScanListing {
        statistics: outcome.stats.clone(),
        resources: outcome
            .by_resource
            .iter()
            .map(|(resource, urls)| (resource.clone(), urls.iter().map(render).collect()))
            .collect(),
        shared: outcome
            .shared_urls()
            .into_iter()
            .map(|(url, resources)| (render(url), resources.into_iter().map(String::from).collect()))
            .collect(),
    };

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&listing)?);
        }
        OutputFormat::Text => {
            let stats = &listing.statistics;
            println!(
                "Scanned {} files: {} webhooks in {} files across {} resources",
                stats.files_scanned,
                stats.webhooks_found,
                stats.files_with_matches,
                stats.resources_found
            );
            if stats.files_skipped > 0 {
                println!("Skipped {} unreadable files", stats.files_skipped);
            }
            for (resource, urls) in &outcome.by_resource {
                println!();
                println!("{} ({} webhooks)", resource, urls.len());
                for url in urls {
                    let files = outcome
                        .occurrences
                        .get(url)
                        .map(|occ| occ.iter().filter(|o| &o.resource == resource).count())
                        .unwrap_or(0);
                    println!("  {} [{} file(s)]", render(url), files);
                }
            }
            if !listing.shared.is_empty() {
                println!();
                println!("Shared between resources:");
                for (url, resources) in &listing.shared {
                    println!("  {} -> {}", url, resources.join(", "));
                }
            }
        }
    }

    Ok(())
}

pub async fn status(settings_path: Option<&PathBuf>, credentials: CredentialArgs) -> Result<()> {
    let settings = load_settings(settings_path)?;
    let credentials = credentials.into_credentials();

    // No tree is touched here; the working directory stands in for the root.
    let config = Config::new(".", credentials, settings);
    config.validate()?;

    let client = DiscordClient::new(DiscordClientConfig::new(
        config.credentials.bot_token.clone(),
        config.credentials.guild_id.clone(),
    ))?;

    let category = &config.credentials.category_id;
    println!("Guild:    {}", config.credentials.guild_id);
    if !client.container_exists(category).await? {
        println!("Category: {} (not found)", category);
        return Err(webhook_migrator::MigratorError::ContainerNotFound(category.clone()));
    }

    let channels = client.list_channels(category).await?;
    println!("Category: {} ({} text channels)", category, channels.len());
    for channel in channels {
        println!("  #{} ({})", channel.name, channel.id);
    }
    Ok(())
}
