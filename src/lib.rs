//! GGUF architecture metadata in Rust
//!
//! Normalizes the per-architecture hyperparameters of a GGUF metadata table
//! into one canonical record, and builds the options consumed by a
//! llama.cpp usage estimator.

pub mod architecture;
pub mod error;
pub mod estimate;
pub mod ggml;
pub mod keys;
pub mod metadata;
pub mod numeric;
pub mod read_options;
pub mod tokenizer;

pub use architecture::{ArchitectureFamily, ArchitectureMetadata, resolve_architecture};
pub use error::{GgufArchError, Result};
pub use estimate::{EstimateOptions, UsageEstimate};
pub use ggml::{CACHE_TYPE_ALLOW_LIST, GgmlType};
pub use metadata::{MetadataArray, MetadataKV, MetadataLookup, MetadataValue, MetadataValueType};
pub use read_options::{MIN_BUFFER_SIZE, ReadOptions};
pub use tokenizer::{TokenizerMetadata, resolve_tokenizer};
