//! Architecture metadata resolution.
//!
//! GGUF stores hyperparameters under a per-architecture namespace
//! (`llama.embedding_length`, `mamba.ssm.inner_size`, ...). Resolution reads
//! `general.architecture`, fetches the namespace in one batched lookup and
//! folds the result into a single [`ArchitectureMetadata`] record, filling
//! gaps with the same defaults llama.cpp applies.

use crate::keys::{ArchKey, ClipKey, EncoderField, EncoderGroup, ResolvedKeys};
use crate::metadata::MetadataLookup;
use serde::{Deserialize, Serialize};

/// Metadata key naming the architecture.
pub const ARCHITECTURE_KEY: &str = "general.architecture";
/// Architecture assumed when [`ARCHITECTURE_KEY`] is absent.
pub const DEFAULT_ARCHITECTURE: &str = "llama";
/// Multi-modal projector/encoder architecture.
pub const CLIP_ARCHITECTURE: &str = "clip";
/// Selective state space architecture.
pub const MAMBA_ARCHITECTURE: &str = "mamba";
/// Projector type assumed for clip files that do not declare one.
pub const DEFAULT_PROJECTOR_TYPE: &str = "mlp";
/// RoPE scaling type implied by the legacy `rope.scale_linear` key.
pub const LINEAR_ROPE_SCALING: &str = "linear";

fn is_default<T: Default + PartialEq>(v: &T) -> bool {
    *v == T::default()
}

/// Canonical architecture hyperparameters of a model file.
///
/// Field names in JSON are stable; fields at their default value are
/// omitted, except the identity and shape fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchitectureMetadata {
    /// Architecture identifier, lowercase `[a-z0-9]+`.
    #[serde(rename = "architecture")]
    pub architecture: String,
    /// Training context length (n_ctx_train).
    #[serde(rename = "maximumContextLength")]
    pub maximum_context_length: u64,
    /// Embedding width (n_embd).
    #[serde(rename = "embeddingLength")]
    pub embedding_length: u64,
    /// Number of attention + feed-forward blocks (n_layer).
    #[serde(rename = "blockCount")]
    pub block_count: u64,
    /// Feed-forward width (n_ff).
    #[serde(rename = "feedForwardLength")]
    pub feed_forward_length: u64,
    #[serde(rename = "expertFeedForwardLength", skip_serializing_if = "is_default")]
    pub expert_feed_forward_length: u64,
    #[serde(rename = "expertSharedFeedForwardLength", skip_serializing_if = "is_default")]
    pub expert_shared_feed_forward_length: u64,
    /// Experts in a MoE model (n_expert).
    #[serde(rename = "expertCount", skip_serializing_if = "is_default")]
    pub expert_count: u32,
    /// Experts evaluated per token (n_expert_used).
    #[serde(rename = "expertUsedCount", skip_serializing_if = "is_default")]
    pub expert_used_count: u32,
    /// Query heads (n_head).
    #[serde(rename = "attentionHeadCount", skip_serializing_if = "is_default")]
    pub attention_head_count: u64,
    /// Key/value heads (n_head_kv). Equal to the query heads without GQA.
    #[serde(rename = "attentionHeadCountKV", skip_serializing_if = "is_default")]
    pub attention_head_count_kv: u64,
    #[serde(rename = "attentionMaxALiBIBias", skip_serializing_if = "is_default")]
    pub attention_max_alibi_bias: f32,
    /// Q, K and V are clamped to `[-C, C]`.
    #[serde(rename = "attentionClampKQV", skip_serializing_if = "is_default")]
    pub attention_clamp_kqv: f32,
    #[serde(rename = "attentionLayerNormEpsilon", skip_serializing_if = "is_default")]
    pub attention_layer_norm_epsilon: f32,
    #[serde(rename = "attentionLayerNormRMSEpsilon", skip_serializing_if = "is_default")]
    pub attention_layer_norm_rms_epsilon: f32,
    /// Key head size (n_embd_head_k).
    #[serde(rename = "attentionKeyLength")]
    pub attention_key_length: u32,
    /// Value head size (n_embd_head_v).
    #[serde(rename = "attentionValueLength")]
    pub attention_value_length: u32,
    #[serde(rename = "ropeDimensionCount", skip_serializing_if = "is_default")]
    pub rope_dimension_count: u64,
    #[serde(rename = "ropeFrequencyBase", skip_serializing_if = "is_default")]
    pub rope_frequency_base: f32,
    #[serde(rename = "ropeScalingType", skip_serializing_if = "is_default")]
    pub rope_scaling_type: String,
    #[serde(rename = "ropeScalingFactor", skip_serializing_if = "is_default")]
    pub rope_scaling_factor: f32,
    #[serde(rename = "ropeScalingOriginalContextLength", skip_serializing_if = "is_default")]
    pub rope_scaling_original_context_length: u64,
    #[serde(rename = "ropeScalingFinetuned", skip_serializing_if = "is_default")]
    pub rope_scaling_finetuned: bool,
    #[serde(rename = "ssmConvolutionKernel", skip_serializing_if = "is_default")]
    pub ssm_convolution_kernel: u32,
    #[serde(rename = "ssmInnerSize", skip_serializing_if = "is_default")]
    pub ssm_inner_size: u32,
    #[serde(rename = "ssmStateSize", skip_serializing_if = "is_default")]
    pub ssm_state_size: u32,
    #[serde(rename = "ssmTimeStepRank", skip_serializing_if = "is_default")]
    pub ssm_time_step_rank: u32,
    /// Vocabulary size, i.e. the tokenizer's token count.
    #[serde(rename = "vocabularyLength")]
    pub vocabulary_length: u64,

    // Derived by resolution, never read from the file.
    /// Query heads per key/value head.
    #[serde(rename = "embeddingGroup", skip_serializing_if = "is_default")]
    pub embedding_group: u64,
    #[serde(rename = "embeddingKeyGQA", skip_serializing_if = "is_default")]
    pub embedding_key_gqa: u64,
    #[serde(rename = "embeddingValueGQA", skip_serializing_if = "is_default")]
    pub embedding_value_gqa: u64,
    #[serde(rename = "embeddingGQA", skip_serializing_if = "is_default")]
    pub embedding_gqa: u64,

    // Only set for clip.
    #[serde(rename = "clipHasTextEncoder", skip_serializing_if = "is_default")]
    pub clip_has_text_encoder: bool,
    #[serde(rename = "clipHasVisionEncoder", skip_serializing_if = "is_default")]
    pub clip_has_vision_encoder: bool,
    #[serde(rename = "clipHasLLaVaProjector", skip_serializing_if = "is_default")]
    pub clip_has_llava_projector: bool,
    #[serde(rename = "clipProjectorType", skip_serializing_if = "is_default")]
    pub clip_projector_type: String,
}

/// Resolution strategy selected by the architecture identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchitectureFamily {
    /// Multi-modal encoders under the fixed `clip.` namespace.
    Clip,
    /// Transformer or recurrent model under the `<id>.` namespace.
    Transformer(String),
}

impl ArchitectureFamily {
    /// Family of the model described by `lookup`.
    pub fn detect<L: MetadataLookup + ?Sized>(lookup: &L) -> Self {
        let arch = match lookup.get(ARCHITECTURE_KEY).map(|v| v.as_str()) {
            Some(arch) if !arch.is_empty() => arch.to_owned(),
            _ => {
                log::debug!("{ARCHITECTURE_KEY} unset, assuming {DEFAULT_ARCHITECTURE}");
                DEFAULT_ARCHITECTURE.to_owned()
            }
        };
        Self::from_identifier(arch)
    }

    pub fn from_identifier(arch: impl Into<String>) -> Self {
        let arch = arch.into();
        if arch == CLIP_ARCHITECTURE {
            ArchitectureFamily::Clip
        } else {
            ArchitectureFamily::Transformer(arch)
        }
    }

    /// Architecture identifier, which is also the key namespace.
    pub fn identifier(&self) -> &str {
        match self {
            ArchitectureFamily::Clip => CLIP_ARCHITECTURE,
            ArchitectureFamily::Transformer(arch) => arch,
        }
    }

    /// Resolve the canonical record for this family.
    pub fn resolve<L: MetadataLookup + ?Sized>(&self, lookup: &L) -> ArchitectureMetadata {
        let mut ga = match self {
            ArchitectureFamily::Clip => resolve_clip(lookup),
            ArchitectureFamily::Transformer(arch) => resolve_transformer(arch, lookup),
        };
        ga.compute_derived();
        ga
    }
}

/// Resolve the architecture metadata of the model described by `lookup`.
pub fn resolve_architecture<L: MetadataLookup + ?Sized>(lookup: &L) -> ArchitectureMetadata {
    ArchitectureFamily::detect(lookup).resolve(lookup)
}

fn assign<T>(dst: &mut T, v: Option<T>) {
    if let Some(v) = v {
        *dst = v;
    }
}

fn resolve_clip<L: MetadataLookup + ?Sized>(lookup: &L) -> ArchitectureMetadata {
    let r = ResolvedKeys::<ClipKey>::fetch(lookup, CLIP_ARCHITECTURE);
    let mut ga = ArchitectureMetadata {
        architecture: CLIP_ARCHITECTURE.to_owned(),
        ..Default::default()
    };

    assign(&mut ga.clip_has_text_encoder, r.bool(ClipKey::HasTextEncoder));
    assign(&mut ga.clip_has_vision_encoder, r.bool(ClipKey::HasVisionEncoder));
    assign(&mut ga.clip_has_llava_projector, r.bool(ClipKey::HasLlavaProjector));
    ga.clip_projector_type = r
        .string(ClipKey::ProjectorType)
        .unwrap_or_else(|| DEFAULT_PROJECTOR_TYPE.to_owned());

    // Both towers write the same fields; vision comes last and wins.
    for group in EncoderGroup::ORDER {
        for field in EncoderField::ALL {
            let Some(v) = r.get(ClipKey::Encoder(group, field)) else {
                continue;
            };
            match field {
                EncoderField::EmbeddingLength => ga.embedding_length = v.numeric(),
                EncoderField::BlockCount => ga.block_count = v.numeric(),
                EncoderField::FeedForwardLength => ga.feed_forward_length = v.numeric(),
                EncoderField::AttentionHeadCount => ga.attention_head_count = v.numeric(),
                EncoderField::AttentionLayerNormEpsilon => {
                    ga.attention_layer_norm_rms_epsilon = v.numeric()
                }
            }
        }
    }

    ga.attention_head_count_kv = ga.attention_head_count;
    ga
}

fn resolve_transformer<L: MetadataLookup + ?Sized>(arch: &str, lookup: &L) -> ArchitectureMetadata {
    let r = ResolvedKeys::<ArchKey>::fetch(lookup, arch);
    let mut ga = ArchitectureMetadata {
        architecture: arch.to_owned(),
        ..Default::default()
    };

    assign(&mut ga.maximum_context_length, r.numeric(ArchKey::ContextLength));
    assign(&mut ga.embedding_length, r.numeric(ArchKey::EmbeddingLength));
    assign(&mut ga.block_count, r.numeric(ArchKey::BlockCount));
    assign(&mut ga.feed_forward_length, r.numeric(ArchKey::FeedForwardLength));

    assign(&mut ga.expert_count, r.numeric(ArchKey::ExpertCount));
    assign(&mut ga.expert_used_count, r.numeric(ArchKey::ExpertUsedCount));
    assign(
        &mut ga.expert_feed_forward_length,
        r.numeric(ArchKey::ExpertFeedForwardLength),
    );
    assign(
        &mut ga.expert_shared_feed_forward_length,
        r.numeric(ArchKey::ExpertSharedFeedForwardLength),
    );

    assign(&mut ga.attention_head_count, r.numeric(ArchKey::AttentionHeadCount));
    ga.attention_head_count_kv = r
        .numeric(ArchKey::AttentionHeadCountKv)
        .unwrap_or(ga.attention_head_count);
    assign(
        &mut ga.attention_max_alibi_bias,
        r.numeric(ArchKey::AttentionMaxAlibiBias)
            .or_else(|| r.numeric(ArchKey::AttentionAlibiBiasMax)),
    );
    assign(
        &mut ga.attention_clamp_kqv,
        r.numeric(ArchKey::AttentionClampKqv)
            .or_else(|| r.numeric(ArchKey::AttentionClipKqv)),
    );
    assign(
        &mut ga.attention_layer_norm_epsilon,
        r.numeric(ArchKey::AttentionLayerNormEpsilon),
    );
    assign(
        &mut ga.attention_layer_norm_rms_epsilon,
        r.numeric(ArchKey::AttentionLayerNormRmsEpsilon),
    );
    let head_length = ga.default_head_length();
    ga.attention_key_length = r
        .numeric(ArchKey::AttentionKeyLength)
        .unwrap_or(head_length);
    ga.attention_value_length = r
        .numeric(ArchKey::AttentionValueLength)
        .unwrap_or(head_length);

    assign(&mut ga.rope_dimension_count, r.numeric(ArchKey::RopeDimensionCount));
    assign(&mut ga.rope_frequency_base, r.numeric(ArchKey::RopeFreqBase));
    if let Some(factor) = r.numeric(ArchKey::RopeScaleLinear) {
        ga.rope_scaling_type = LINEAR_ROPE_SCALING.to_owned();
        ga.rope_scaling_factor = factor;
    }
    assign(&mut ga.rope_scaling_type, r.string(ArchKey::RopeScalingType));
    assign(&mut ga.rope_scaling_factor, r.numeric(ArchKey::RopeScalingFactor));
    assign(
        &mut ga.rope_scaling_original_context_length,
        r.numeric(ArchKey::RopeScalingOriginalContextLength),
    );
    assign(&mut ga.rope_scaling_finetuned, r.bool(ArchKey::RopeScalingFinetuned));

    assign(&mut ga.ssm_convolution_kernel, r.numeric(ArchKey::SsmConvKernel));
    assign(&mut ga.ssm_inner_size, r.numeric(ArchKey::SsmInnerSize));
    assign(&mut ga.ssm_state_size, r.numeric(ArchKey::SsmStateSize));
    assign(&mut ga.ssm_time_step_rank, r.numeric(ArchKey::SsmTimeStepRank));

    assign(
        &mut ga.vocabulary_length,
        r.numeric(ArchKey::VocabSize)
            .or_else(|| r.array_len(ArchKey::TokenizerTokens)),
    );

    ga
}

impl ArchitectureMetadata {
    /// Resolve from a metadata table, see [`resolve_architecture`].
    pub fn from_metadata<L: MetadataLookup + ?Sized>(lookup: &L) -> Self {
        resolve_architecture(lookup)
    }

    /// `embedding_length / attention_head_count`, or 0 without heads.
    fn default_head_length(&self) -> u32 {
        self.embedding_length
            .checked_div(self.attention_head_count)
            .map_or(0, |len| len as u32)
    }

    /// Fill the appendix fields from the resolved attention and SSM shape.
    fn compute_derived(&mut self) {
        if let Some(group) = self
            .attention_head_count
            .checked_div(self.attention_head_count_kv)
        {
            self.embedding_group = group;
        }
        if self.attention_head_count > 0 {
            self.embedding_key_gqa =
                u64::from(self.attention_key_length).saturating_mul(self.attention_head_count_kv);
            self.embedding_value_gqa =
                u64::from(self.attention_value_length).saturating_mul(self.attention_head_count_kv);
        }
        if self.is_recurrent() {
            let inner = u64::from(self.ssm_inner_size);
            self.embedding_key_gqa = u64::from(self.ssm_convolution_kernel).saturating_sub(1) * inner;
            self.embedding_value_gqa = u64::from(self.ssm_state_size) * inner;
        }
        self.embedding_gqa = self.embedding_value_gqa;
    }

    #[inline]
    pub fn is_clip(&self) -> bool {
        self.architecture == CLIP_ARCHITECTURE
    }

    /// Whether the model is a state space model without attention KV.
    #[inline]
    pub fn is_recurrent(&self) -> bool {
        self.architecture == MAMBA_ARCHITECTURE
    }

    /// Whether fewer key/value heads than query heads are used.
    #[inline]
    pub fn uses_grouped_query_attention(&self) -> bool {
        self.attention_head_count_kv != 0
            && self.attention_head_count_kv != self.attention_head_count
    }

    /// Whether the model routes tokens through experts.
    #[inline]
    pub fn is_mixture_of_experts(&self) -> bool {
        self.expert_count > 0
    }
}
