//! tablerag core: error taxonomy, configuration, cell values.

pub mod config;
pub mod error;
pub mod value;

pub use config::{DataPaths, EngineConfig, VectorBackend, DEFAULT_ENCODINGS};
pub use error::{Error, Result};
pub use value::{Attributes, CellValue};
