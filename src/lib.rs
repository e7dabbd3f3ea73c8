pub mod config;
pub mod constants;
pub mod error;
pub mod event;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod schema;

// Layered boundaries for application and infrastructure
pub mod app;
pub mod infra;

// Domain data shapes shared across layers
pub mod domain;

pub use app::ingest_use_case::{IngestSettings, IngestUseCase};
pub use domain::IngestSummary;
pub use error::{IngestError, Stage, StageError};
