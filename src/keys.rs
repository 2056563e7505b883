//! Metadata key tables.
//!
//! Every key a resolver reads is declared once here as a suffix under a
//! namespace prefix (`llama` + `attention.head_count`). A resolver joins its
//! prefix onto the whole table and fetches everything in one batched lookup
//! through [`ResolvedKeys::fetch`].

use crate::metadata::{MetadataLookup, MetadataValue};
use crate::numeric::Numeric;
use std::collections::HashMap;
use std::hash::Hash;

/// How a logical key maps to a metadata key string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyName {
    /// Joined onto the resolver's prefix with a `.`.
    Namespaced(&'static str),
    /// Used verbatim regardless of prefix.
    Global(&'static str),
}

/// A closed set of logical metadata keys.
pub trait KeyTable: Copy + Eq + Hash + 'static {
    /// Every key in the table, in lookup order.
    const ALL: &'static [Self];

    fn name(self) -> KeyName;

    /// Full metadata key under `prefix`.
    fn key(self, prefix: &str) -> String {
        match self.name() {
            KeyName::Namespaced(suffix) => format!("{prefix}.{suffix}"),
            KeyName::Global(key) => key.to_owned(),
        }
    }
}

/// All metadata keys of table `K` under `prefix`, in table order.
pub fn table_keys<K: KeyTable>(prefix: &str) -> Vec<String> {
    K::ALL.iter().map(|k| k.key(prefix)).collect()
}

/// Values found for a key table, indexed by logical key.
#[derive(Debug)]
pub struct ResolvedKeys<'a, K> {
    values: HashMap<K, &'a MetadataValue>,
}

impl<'a, K: KeyTable> ResolvedKeys<'a, K> {
    /// Fetch every key of `K` under `prefix` with a single `get_many` call.
    pub fn fetch<L: MetadataLookup + ?Sized>(lookup: &'a L, prefix: &str) -> Self {
        let keys: Vec<(K, String)> = K::ALL.iter().map(|&k| (k, k.key(prefix))).collect();
        let names: Vec<&str> = keys.iter().map(|(_, name)| name.as_str()).collect();
        let found = lookup.get_many(&names);
        log::trace!(
            "prefix {prefix:?}: {} of {} metadata keys present",
            found.len(),
            names.len()
        );

        let values = keys
            .iter()
            .filter_map(|(k, name)| found.get(name.as_str()).map(|&v| (*k, v)))
            .collect();
        ResolvedKeys { values }
    }

    pub fn get(&self, key: K) -> Option<&'a MetadataValue> {
        self.values.get(&key).copied()
    }

    pub fn contains(&self, key: K) -> bool {
        self.values.contains_key(&key)
    }

    pub fn numeric<T: Numeric>(&self, key: K) -> Option<T> {
        self.get(key).map(MetadataValue::numeric)
    }

    pub fn string(&self, key: K) -> Option<String> {
        self.get(key).map(|v| v.as_str().to_owned())
    }

    pub fn bool(&self, key: K) -> Option<bool> {
        self.get(key).map(MetadataValue::as_bool)
    }

    pub fn array_len(&self, key: K) -> Option<u64> {
        self.get(key).map(MetadataValue::array_len)
    }
}

/// Keys of the generic transformer/recurrent architectures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchKey {
    ContextLength,
    EmbeddingLength,
    BlockCount,
    FeedForwardLength,
    ExpertFeedForwardLength,
    ExpertSharedFeedForwardLength,
    ExpertCount,
    ExpertUsedCount,
    AttentionHeadCount,
    AttentionHeadCountKv,
    AttentionMaxAlibiBias,
    AttentionAlibiBiasMax,
    AttentionClampKqv,
    AttentionClipKqv,
    AttentionLayerNormEpsilon,
    AttentionLayerNormRmsEpsilon,
    AttentionKeyLength,
    AttentionValueLength,
    RopeDimensionCount,
    RopeFreqBase,
    RopeScaleLinear,
    RopeScalingType,
    RopeScalingFactor,
    RopeScalingOriginalContextLength,
    RopeScalingFinetuned,
    SsmConvKernel,
    SsmInnerSize,
    SsmStateSize,
    SsmTimeStepRank,
    VocabSize,
    TokenizerTokens,
}

impl KeyTable for ArchKey {
    const ALL: &'static [Self] = &[
        Self::ContextLength,
        Self::EmbeddingLength,
        Self::BlockCount,
        Self::FeedForwardLength,
        Self::ExpertFeedForwardLength,
        Self::ExpertSharedFeedForwardLength,
        Self::ExpertCount,
        Self::ExpertUsedCount,
        Self::AttentionHeadCount,
        Self::AttentionHeadCountKv,
        Self::AttentionMaxAlibiBias,
        Self::AttentionAlibiBiasMax,
        Self::AttentionClampKqv,
        Self::AttentionClipKqv,
        Self::AttentionLayerNormEpsilon,
        Self::AttentionLayerNormRmsEpsilon,
        Self::AttentionKeyLength,
        Self::AttentionValueLength,
        Self::RopeDimensionCount,
        Self::RopeFreqBase,
        Self::RopeScaleLinear,
        Self::RopeScalingType,
        Self::RopeScalingFactor,
        Self::RopeScalingOriginalContextLength,
        Self::RopeScalingFinetuned,
        Self::SsmConvKernel,
        Self::SsmInnerSize,
        Self::SsmStateSize,
        Self::SsmTimeStepRank,
        Self::VocabSize,
        Self::TokenizerTokens,
    ];

    fn name(self) -> KeyName {
        use KeyName::Namespaced as N;
        match self {
            Self::ContextLength => N("context_length"),
            Self::EmbeddingLength => N("embedding_length"),
            Self::BlockCount => N("block_count"),
            Self::FeedForwardLength => N("feed_forward_length"),
            Self::ExpertFeedForwardLength => N("expert_feed_forward_length"),
            Self::ExpertSharedFeedForwardLength => N("expert_shared_feed_forward_length"),
            Self::ExpertCount => N("expert_count"),
            Self::ExpertUsedCount => N("expert_used_count"),
            Self::AttentionHeadCount => N("attention.head_count"),
            Self::AttentionHeadCountKv => N("attention.head_count_kv"),
            Self::AttentionMaxAlibiBias => N("attention.max_alibi_bias"),
            Self::AttentionAlibiBiasMax => N("attention.alibi_bias_max"),
            Self::AttentionClampKqv => N("attention.clamp_kqv"),
            Self::AttentionClipKqv => N("attention.clip_kqv"),
            Self::AttentionLayerNormEpsilon => N("attention.layer_norm_epsilon"),
            Self::AttentionLayerNormRmsEpsilon => N("attention.layer_norm_rms_epsilon"),
            Self::AttentionKeyLength => N("attention.key_length"),
            Self::AttentionValueLength => N("attention.value_length"),
            Self::RopeDimensionCount => N("rope.dimension_count"),
            Self::RopeFreqBase => N("rope.freq_base"),
            Self::RopeScaleLinear => N("rope.scale_linear"),
            Self::RopeScalingType => N("rope.scaling.type"),
            Self::RopeScalingFactor => N("rope.scaling.factor"),
            Self::RopeScalingOriginalContextLength => N("rope.scaling.original_context_length"),
            Self::RopeScalingFinetuned => N("rope.scaling.finetuned"),
            Self::SsmConvKernel => N("ssm.conv_kernel"),
            Self::SsmInnerSize => N("ssm.inner_size"),
            Self::SsmStateSize => N("ssm.state_size"),
            Self::SsmTimeStepRank => N("ssm.time_step_rank"),
            Self::VocabSize => N("vocab_size"),
            Self::TokenizerTokens => KeyName::Global("tokenizer.ggml.tokens"),
        }
    }
}

/// Encoder tower of a clip model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncoderGroup {
    Text,
    Vision,
}

impl EncoderGroup {
    /// Resolution order; later groups overwrite earlier ones.
    pub const ORDER: [EncoderGroup; 2] = [EncoderGroup::Text, EncoderGroup::Vision];
}

/// Per-encoder hyperparameter of a clip model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncoderField {
    EmbeddingLength,
    BlockCount,
    FeedForwardLength,
    AttentionHeadCount,
    AttentionLayerNormEpsilon,
}

impl EncoderField {
    pub const ALL: [EncoderField; 5] = [
        EncoderField::EmbeddingLength,
        EncoderField::BlockCount,
        EncoderField::FeedForwardLength,
        EncoderField::AttentionHeadCount,
        EncoderField::AttentionLayerNormEpsilon,
    ];
}

/// Keys of the multi-modal `clip` architecture, read under the `clip` prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClipKey {
    HasTextEncoder,
    HasVisionEncoder,
    HasLlavaProjector,
    ProjectorType,
    Encoder(EncoderGroup, EncoderField),
}

impl KeyTable for ClipKey {
    const ALL: &'static [Self] = &[
        Self::HasTextEncoder,
        Self::HasVisionEncoder,
        Self::HasLlavaProjector,
        Self::ProjectorType,
        Self::Encoder(EncoderGroup::Text, EncoderField::EmbeddingLength),
        Self::Encoder(EncoderGroup::Text, EncoderField::BlockCount),
        Self::Encoder(EncoderGroup::Text, EncoderField::FeedForwardLength),
        Self::Encoder(EncoderGroup::Text, EncoderField::AttentionHeadCount),
        Self::Encoder(EncoderGroup::Text, EncoderField::AttentionLayerNormEpsilon),
        Self::Encoder(EncoderGroup::Vision, EncoderField::EmbeddingLength),
        Self::Encoder(EncoderGroup::Vision, EncoderField::BlockCount),
        Self::Encoder(EncoderGroup::Vision, EncoderField::FeedForwardLength),
        Self::Encoder(EncoderGroup::Vision, EncoderField::AttentionHeadCount),
        Self::Encoder(EncoderGroup::Vision, EncoderField::AttentionLayerNormEpsilon),
    ];

    fn name(self) -> KeyName {
        use EncoderField as F;
        use EncoderGroup as G;
        use KeyName::Namespaced as N;
        match self {
            Self::HasTextEncoder => N("has_text_encoder"),
            Self::HasVisionEncoder => N("has_vision_encoder"),
            Self::HasLlavaProjector => N("has_llava_projector"),
            Self::ProjectorType => N("projector_type"),
            Self::Encoder(G::Text, F::EmbeddingLength) => N("text.embedding_length"),
            Self::Encoder(G::Text, F::BlockCount) => N("text.block_count"),
            Self::Encoder(G::Text, F::FeedForwardLength) => N("text.feed_forward_length"),
            Self::Encoder(G::Text, F::AttentionHeadCount) => N("text.attention.head_count"),
            Self::Encoder(G::Text, F::AttentionLayerNormEpsilon) => {
                N("text.attention.layer_norm_epsilon")
            }
            Self::Encoder(G::Vision, F::EmbeddingLength) => N("vision.embedding_length"),
            Self::Encoder(G::Vision, F::BlockCount) => N("vision.block_count"),
            Self::Encoder(G::Vision, F::FeedForwardLength) => N("vision.feed_forward_length"),
            Self::Encoder(G::Vision, F::AttentionHeadCount) => N("vision.attention.head_count"),
            Self::Encoder(G::Vision, F::AttentionLayerNormEpsilon) => {
                N("vision.attention.layer_norm_epsilon")
            }
        }
    }
}

/// Keys of the embedded tokenizer, read under the `tokenizer.ggml` prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenizerKey {
    Model,
    Tokens,
    Merges,
    AddedTokens,
    BosTokenId,
    EosTokenId,
    EotTokenId,
    EomTokenId,
    UnknownTokenId,
    SeparatorTokenId,
    PaddingTokenId,
}

impl KeyTable for TokenizerKey {
    const ALL: &'static [Self] = &[
        Self::Model,
        Self::Tokens,
        Self::Merges,
        Self::AddedTokens,
        Self::BosTokenId,
        Self::EosTokenId,
        Self::EotTokenId,
        Self::EomTokenId,
        Self::UnknownTokenId,
        Self::SeparatorTokenId,
        Self::PaddingTokenId,
    ];

    fn name(self) -> KeyName {
        use KeyName::Namespaced as N;
        match self {
            Self::Model => N("model"),
            Self::Tokens => N("tokens"),
            Self::Merges => N("merges"),
            Self::AddedTokens => N("added_tokens"),
            Self::BosTokenId => N("bos_token_id"),
            Self::EosTokenId => N("eos_token_id"),
            Self::EotTokenId => N("eot_token_id"),
            Self::EomTokenId => N("eom_token_id"),
            Self::UnknownTokenId => N("unknown_token_id"),
            // GGUF spells it this way.
            Self::SeparatorTokenId => N("seperator_token_id"),
            Self::PaddingTokenId => N("padding_token_id"),
        }
    }
}
