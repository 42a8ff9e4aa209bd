pub mod config;
pub mod constants;
pub mod dataset;
pub mod error;
pub mod loader;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod transform;
pub mod writer;

pub use dataset::{ColumnType, Dataset, Value};
pub use error::{ErrorKind, EtlError, Result};
pub use loader::load;
pub use pipeline::{Pipeline, PipelineResult};
pub use transform::clean;
pub use writer::save;
