//! Options for llama.cpp usage estimation.
//!
//! Every knob starts unset, leaving the estimator free to pick its own
//! default. Setters chain in call order and the last call wins. A setter
//! given a value it cannot accept (a non-positive size, a cache type outside
//! [`CACHE_TYPE_ALLOW_LIST`]) leaves the field as it was.

use crate::architecture::ArchitectureMetadata;
use crate::ggml::{CACHE_TYPE_ALLOW_LIST, GgmlType};
use crate::tokenizer::TokenizerMetadata;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Result of a usage estimation, produced by the estimator.
///
/// Options only carry these as precomputed inputs, e.g. the projector of a
/// vision model or the drafter of speculative decoding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UsageEstimate {
    pub architecture: String,
    pub context_size: u64,
    pub offload_layers: u64,
    pub full_offloaded: bool,
    /// Host memory in bytes.
    pub ram: u64,
    /// Device memory in bytes.
    pub vram: u64,
}

/// Inputs of a usage estimation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EstimateOptions {
    architecture: Option<Arc<ArchitectureMetadata>>,
    tokenizer: Option<Arc<TokenizerMetadata>>,
    context_size: Option<i32>,
    in_max_context_size: bool,
    logical_batch_size: Option<i32>,
    physical_batch_size: Option<i32>,
    parallel_size: Option<i32>,
    cache_key_type: Option<GgmlType>,
    cache_value_type: Option<GgmlType>,
    offload_kv_cache: Option<bool>,
    offload_layers: Option<u64>,
    flash_attention: bool,
    multimodal_projector: Option<Arc<UsageEstimate>>,
    drafter: Option<Arc<UsageEstimate>>,
}

fn positive(size: i32, what: &str) -> Option<i32> {
    if size > 0 {
        Some(size)
    } else {
        log::debug!("ignoring non-positive {what}: {size}");
        None
    }
}

fn cache_type(t: GgmlType, what: &str) -> Option<GgmlType> {
    if CACHE_TYPE_ALLOW_LIST.contains(&t) {
        Some(t)
    } else {
        log::debug!("ignoring {what} {t}: not a supported cache type");
        None
    }
}

impl EstimateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an already resolved architecture.
    ///
    /// Pass an `Arc` to share one record between several estimates.
    #[must_use]
    pub fn with_architecture(mut self, arch: impl Into<Arc<ArchitectureMetadata>>) -> Self {
        self.architecture = Some(arch.into());
        self
    }

    /// Use an already resolved tokenizer.
    #[must_use]
    pub fn with_tokenizer(mut self, tokenizer: impl Into<Arc<TokenizerMetadata>>) -> Self {
        self.tokenizer = Some(tokenizer.into());
        self
    }

    #[must_use]
    pub fn with_context_size(mut self, size: i32) -> Self {
        if let Some(size) = positive(size, "context size") {
            self.context_size = Some(size);
        }
        self
    }

    /// Clamp the context size to the model's training context length.
    #[must_use]
    pub fn within_max_context_size(mut self) -> Self {
        self.in_max_context_size = true;
        self
    }

    #[must_use]
    pub fn with_logical_batch_size(mut self, size: i32) -> Self {
        if let Some(size) = positive(size, "logical batch size") {
            self.logical_batch_size = Some(size);
        }
        self
    }

    #[must_use]
    pub fn with_physical_batch_size(mut self, size: i32) -> Self {
        if let Some(size) = positive(size, "physical batch size") {
            self.physical_batch_size = Some(size);
        }
        self
    }

    /// Number of sequences decoded in parallel.
    #[must_use]
    pub fn with_parallel_size(mut self, size: i32) -> Self {
        if let Some(size) = positive(size, "parallel size") {
            self.parallel_size = Some(size);
        }
        self
    }

    #[must_use]
    pub fn with_cache_key_type(mut self, t: GgmlType) -> Self {
        if let Some(t) = cache_type(t, "cache key type") {
            self.cache_key_type = Some(t);
        }
        self
    }

    #[must_use]
    pub fn with_cache_value_type(mut self, t: GgmlType) -> Self {
        if let Some(t) = cache_type(t, "cache value type") {
            self.cache_value_type = Some(t);
        }
        self
    }

    /// Keep the KV cache in host memory.
    #[must_use]
    pub fn without_offload_kv_cache(mut self) -> Self {
        self.offload_kv_cache = Some(false);
        self
    }

    /// Number of layers to offload to the device.
    #[must_use]
    pub fn with_offload_layers(mut self, layers: u64) -> Self {
        self.offload_layers = Some(layers);
        self
    }

    #[must_use]
    pub fn with_flash_attention(mut self) -> Self {
        self.flash_attention = true;
        self
    }

    /// Account for a multimodal projector estimated beforehand.
    #[must_use]
    pub fn with_multimodal_projector(mut self, mmp: impl Into<Arc<UsageEstimate>>) -> Self {
        self.multimodal_projector = Some(mmp.into());
        self
    }

    /// Account for a speculative decoding drafter estimated beforehand.
    #[must_use]
    pub fn with_drafter(mut self, dft: impl Into<Arc<UsageEstimate>>) -> Self {
        self.drafter = Some(dft.into());
        self
    }

    pub fn architecture(&self) -> Option<&ArchitectureMetadata> {
        self.architecture.as_deref()
    }

    pub fn tokenizer(&self) -> Option<&TokenizerMetadata> {
        self.tokenizer.as_deref()
    }

    pub fn context_size(&self) -> Option<i32> {
        self.context_size
    }

    pub fn in_max_context_size(&self) -> bool {
        self.in_max_context_size
    }

    pub fn logical_batch_size(&self) -> Option<i32> {
        self.logical_batch_size
    }

    pub fn physical_batch_size(&self) -> Option<i32> {
        self.physical_batch_size
    }

    pub fn parallel_size(&self) -> Option<i32> {
        self.parallel_size
    }

    pub fn cache_key_type(&self) -> Option<GgmlType> {
        self.cache_key_type
    }

    pub fn cache_value_type(&self) -> Option<GgmlType> {
        self.cache_value_type
    }

    /// `None` when unset, `Some(false)` after [`without_offload_kv_cache`].
    ///
    /// [`without_offload_kv_cache`]: Self::without_offload_kv_cache
    pub fn offload_kv_cache(&self) -> Option<bool> {
        self.offload_kv_cache
    }

    pub fn offload_layers(&self) -> Option<u64> {
        self.offload_layers
    }

    pub fn flash_attention(&self) -> bool {
        self.flash_attention
    }

    pub fn multimodal_projector(&self) -> Option<&UsageEstimate> {
        self.multimodal_projector.as_deref()
    }

    pub fn drafter(&self) -> Option<&UsageEstimate> {
        self.drafter.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_unset() {
        let o = EstimateOptions::new();
        assert!(o.architecture().is_none());
        assert!(o.tokenizer().is_none());
        assert_eq!(o.context_size(), None);
        assert!(!o.in_max_context_size());
        assert_eq!(o.logical_batch_size(), None);
        assert_eq!(o.physical_batch_size(), None);
        assert_eq!(o.parallel_size(), None);
        assert_eq!(o.cache_key_type(), None);
        assert_eq!(o.cache_value_type(), None);
        assert_eq!(o.offload_kv_cache(), None);
        assert_eq!(o.offload_layers(), None);
        assert!(!o.flash_attention());
        assert!(o.multimodal_projector().is_none());
        assert!(o.drafter().is_none());
    }

    #[test]
    fn test_sizes() {
        let o = EstimateOptions::new()
            .with_context_size(8192)
            .with_logical_batch_size(2048)
            .with_physical_batch_size(512)
            .with_parallel_size(4);
        assert_eq!(o.context_size(), Some(8192));
        assert_eq!(o.logical_batch_size(), Some(2048));
        assert_eq!(o.physical_batch_size(), Some(512));
        assert_eq!(o.parallel_size(), Some(4));
    }

    #[test]
    fn test_non_positive_sizes_are_ignored() {
        let o = EstimateOptions::new()
            .with_context_size(-5)
            .with_logical_batch_size(0)
            .with_physical_batch_size(i32::MIN)
            .with_parallel_size(-1);
        assert_eq!(o, EstimateOptions::new());
    }

    #[test]
    fn test_invalid_size_keeps_previous_value() {
        let o = EstimateOptions::new()
            .with_context_size(4096)
            .with_context_size(0);
        assert_eq!(o.context_size(), Some(4096));
    }

    #[test]
    fn test_last_write_wins() {
        let o = EstimateOptions::new()
            .with_context_size(4096)
            .with_context_size(2048)
            .with_cache_key_type(GgmlType::F16)
            .with_cache_key_type(GgmlType::Q8_0);
        assert_eq!(o.context_size(), Some(2048));
        assert_eq!(o.cache_key_type(), Some(GgmlType::Q8_0));
    }

    #[test]
    fn test_cache_types() {
        let o = EstimateOptions::new()
            .with_cache_key_type(GgmlType::Q4K)
            .with_cache_value_type(GgmlType::Iq4Nl);
        assert_eq!(o.cache_key_type(), None);
        assert_eq!(o.cache_value_type(), Some(GgmlType::Iq4Nl));
    }

    #[test]
    fn test_offload_kv_cache_tri_state() {
        assert_eq!(EstimateOptions::new().offload_kv_cache(), None);
        assert_eq!(
            EstimateOptions::new().without_offload_kv_cache().offload_kv_cache(),
            Some(false)
        );
    }

    #[test]
    fn test_offload_layers_accepts_zero() {
        let o = EstimateOptions::new().with_offload_layers(0);
        assert_eq!(o.offload_layers(), Some(0));
    }

    #[test]
    fn test_flags() {
        let o = EstimateOptions::new()
            .within_max_context_size()
            .with_flash_attention();
        assert!(o.in_max_context_size());
        assert!(o.flash_attention());
    }

    #[test]
    fn test_nested_estimates_are_shared() {
        let mmp = Arc::new(UsageEstimate {
            architecture: "clip".into(),
            vram: 600 << 20,
            ..Default::default()
        });
        let o = EstimateOptions::new()
            .with_multimodal_projector(Arc::clone(&mmp))
            .with_drafter(UsageEstimate::default());
        assert_eq!(o.multimodal_projector(), Some(&*mmp));
        assert_eq!(o.drafter(), Some(&UsageEstimate::default()));
        assert_eq!(Arc::strong_count(&mmp), 2);
    }
}
