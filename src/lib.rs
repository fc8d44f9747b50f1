pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod progress;
pub mod provision;
pub mod report;
pub mod rewrite;
pub mod scanner;

pub use config::{Config, Credentials, Pacing, ScanSettings, Settings};
pub use error::{MigratorError, Result};
pub use models::{
    EndpointMapping, MappingEntry, Occurrence, OccurrenceIndex, ProvisionedChannel,
    ResourceFailure, ResourceUrlIndex, RunStatistics, SkippedFile, WebhookUrl, UNKNOWN_RESOURCE,
};
pub use pipeline::{Pipeline, RunLock, LOCK_FILE};
pub use progress::{ConsoleSink, LogSink, MemorySink, ProgressSink, ScanProgress, SilentSink};
pub use provision::{
    AlreadyMigrated, DiscordClient, DiscordClientConfig, MessagingPlatform, PlatformError,
    ProvisionOutcome, Provisioner, RemoteChannel, RemoteEndpoint,
};
pub use report::{ReportWriter, RunReport};
pub use rewrite::{BackupStore, FileRewrite, RewriteOutcome, Rewriter};
pub use scanner::{FileScan, FileWalker, ScanOutcome, Scanner, WebhookExtractor};
