pub mod etl;
pub mod loader;
pub mod normalize;
pub mod parser;
pub mod pipeline;
pub mod schema;

pub use crate::domain::model::{ColumnSet, LoadResult, RunOutcome, SchemaState};
pub use crate::domain::ports::{Notifier, SecretProvider, Warehouse};
pub use crate::utils::error::Result;
pub use etl::IngestEngine;
pub use loader::LoadStrategy;
pub use parser::FormatParser;
pub use pipeline::{BatchReport, IngestionPipeline};
pub use schema::SchemaManager;
