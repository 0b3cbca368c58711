pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::CliArgs;
pub use config::IngestConfig;

pub use adapters::database::{ConnectionSettings, PgWarehouse};
pub use adapters::notify::LogNotifier;
pub use adapters::secrets::EnvSecretProvider;
pub use adapters::sources::SourceConnector;
pub use adapters::staging::StagingArea;
pub use core::{FormatParser, IngestEngine, IngestionPipeline, LoadStrategy};
pub use utils::error::{IngestError, Result};
