pub mod etl;
pub mod flatten;
pub mod loader;
pub mod pipeline;
pub mod request;
pub mod response;
pub mod transfer;

pub use crate::domain::model::{ColumnSchema, InvocationConfig, Record, TransformResult};
pub use crate::domain::ports::{ConfigProvider, ObjectStorage, Pipeline, Warehouse};
pub use crate::utils::error::Result;
