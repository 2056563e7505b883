//! Tokenizer metadata resolution.

use crate::keys::{ResolvedKeys, TokenizerKey};
use crate::metadata::MetadataLookup;
use serde::{Deserialize, Serialize};

/// Namespace of the embedded tokenizer keys.
pub const TOKENIZER_PREFIX: &str = "tokenizer.ggml";

/// Token id recorded when the file does not declare one.
pub const NO_TOKEN: i64 = -1;

/// Summary of the tokenizer embedded in a model file.
///
/// Only sizes and special token ids are kept; the vocabulary itself stays
/// in the metadata table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TokenizerMetadata {
    /// Tokenizer model, e.g. `llama` (SentencePiece) or `gpt2` (BPE).
    pub model: String,
    pub tokens_length: u64,
    pub merges_length: u64,
    pub added_tokens_length: u64,
    #[serde(rename = "bosTokenID")]
    pub bos_token_id: i64,
    #[serde(rename = "eosTokenID")]
    pub eos_token_id: i64,
    #[serde(rename = "eotTokenID")]
    pub eot_token_id: i64,
    #[serde(rename = "eomTokenID")]
    pub eom_token_id: i64,
    #[serde(rename = "unknownTokenID")]
    pub unknown_token_id: i64,
    #[serde(rename = "separatorTokenID")]
    pub separator_token_id: i64,
    #[serde(rename = "paddingTokenID")]
    pub padding_token_id: i64,
}

impl Default for TokenizerMetadata {
    fn default() -> Self {
        TokenizerMetadata {
            model: String::new(),
            tokens_length: 0,
            merges_length: 0,
            added_tokens_length: 0,
            bos_token_id: NO_TOKEN,
            eos_token_id: NO_TOKEN,
            eot_token_id: NO_TOKEN,
            eom_token_id: NO_TOKEN,
            unknown_token_id: NO_TOKEN,
            separator_token_id: NO_TOKEN,
            padding_token_id: NO_TOKEN,
        }
    }
}

impl TokenizerMetadata {
    /// Resolve from a metadata table, see [`resolve_tokenizer`].
    pub fn from_metadata<L: MetadataLookup + ?Sized>(lookup: &L) -> Self {
        resolve_tokenizer(lookup)
    }

    /// Token id as a vocabulary index, `None` for [`NO_TOKEN`].
    pub fn token_id(id: i64) -> Option<u32> {
        u32::try_from(id).ok()
    }

    #[inline]
    pub fn bos(&self) -> Option<u32> {
        Self::token_id(self.bos_token_id)
    }

    #[inline]
    pub fn eos(&self) -> Option<u32> {
        Self::token_id(self.eos_token_id)
    }
}

/// Resolve the tokenizer summary with one batched lookup.
pub fn resolve_tokenizer<L: MetadataLookup + ?Sized>(lookup: &L) -> TokenizerMetadata {
    let r = ResolvedKeys::<TokenizerKey>::fetch(lookup, TOKENIZER_PREFIX);
    let mut gt = TokenizerMetadata::default();

    if let Some(model) = r.string(TokenizerKey::Model) {
        gt.model = model;
    }
    if let Some(len) = r.array_len(TokenizerKey::Tokens) {
        gt.tokens_length = len;
    }
    if let Some(len) = r.array_len(TokenizerKey::Merges) {
        gt.merges_length = len;
    }
    if let Some(len) = r.array_len(TokenizerKey::AddedTokens) {
        gt.added_tokens_length = len;
    }

    for (key, id) in [
        (TokenizerKey::BosTokenId, &mut gt.bos_token_id),
        (TokenizerKey::EosTokenId, &mut gt.eos_token_id),
        (TokenizerKey::EotTokenId, &mut gt.eot_token_id),
        (TokenizerKey::EomTokenId, &mut gt.eom_token_id),
        (TokenizerKey::UnknownTokenId, &mut gt.unknown_token_id),
        (TokenizerKey::SeparatorTokenId, &mut gt.separator_token_id),
        (TokenizerKey::PaddingTokenId, &mut gt.padding_token_id),
    ] {
        if let Some(v) = r.numeric(key) {
            *id = v;
        }
    }

    gt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{MetadataArray, MetadataKV, MetadataValue, MetadataValueType};

    fn strings(items: &[&str]) -> MetadataValue {
        MetadataValue::Array(MetadataArray::new(
            MetadataValueType::String,
            items.iter().map(|s| MetadataValue::String((*s).to_owned())).collect(),
        ))
    }

    #[test]
    fn test_empty_table() {
        let gt = resolve_tokenizer(&MetadataKV::new());
        assert_eq!(gt, TokenizerMetadata::default());
        assert_eq!(gt.bos(), None);
        assert_eq!(gt.padding_token_id, NO_TOKEN);
    }

    #[test]
    fn test_gpt2_tokenizer() {
        let kv = MetadataKV::new()
            .with("tokenizer.ggml.model", MetadataValue::String("gpt2".into()))
            .with("tokenizer.ggml.tokens", strings(&["<s>", "</s>", "a", "b"]))
            .with("tokenizer.ggml.merges", strings(&["a b"]))
            .with(
                "tokenizer.ggml.added_tokens",
                MetadataValue::Array(MetadataArray::skipped(MetadataValueType::String, 2)),
            )
            .with("tokenizer.ggml.bos_token_id", MetadataValue::Uint32(0))
            .with("tokenizer.ggml.eos_token_id", MetadataValue::Uint32(1))
            .with("tokenizer.ggml.seperator_token_id", MetadataValue::Int32(3));
        let gt = resolve_tokenizer(&kv);
        assert_eq!(gt.model, "gpt2");
        assert_eq!(gt.tokens_length, 4);
        assert_eq!(gt.merges_length, 1);
        assert_eq!(gt.added_tokens_length, 2);
        assert_eq!(gt.bos(), Some(0));
        assert_eq!(gt.eos(), Some(1));
        assert_eq!(gt.separator_token_id, 3);
        assert_eq!(gt.unknown_token_id, NO_TOKEN);
    }

    #[test]
    fn test_json_field_names() {
        let json = serde_json::to_value(TokenizerMetadata::default()).unwrap();
        assert_eq!(json["bosTokenID"], -1);
        assert_eq!(json["tokensLength"], 0);
        assert_eq!(json["addedTokensLength"], 0);
    }
}
