//! Neo Core - model acquisition and conversion orchestration for RVC voices
//!
//! Downloads voice model bundles, keeps a catalog of the models they contain
//! and drives external separation and voice-conversion engines:
//!
//! ```text
//! URL ─▶ fetch ─▶ unpack ─▶ registry ─▶ configure ─▶ separate ─▶ convert ─▶ output
//! ```

pub mod config;
pub mod configure;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod pipeline;
pub mod probe;
pub mod registry;
pub mod tag;
pub mod unpack;

pub use configure::{ConversionRequest, PitchAlgorithm, PitchParams};
pub use error::{NeoError, Result};
pub use pipeline::{DownloadOutcome, Pipeline};
pub use registry::{ModelCatalogEntry, ModelRegistry};
