pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::{BigQueryClient, Credentials, GcsStorage, LocalStorage};
pub use config::IngestSettings;
pub use crate::core::flatten::SchemaPolicy;
pub use crate::core::response::ResponseEnvelope;
pub use crate::core::{etl::EtlEngine, pipeline::IngestPipeline};
pub use utils::error::{IngestError, Result};
