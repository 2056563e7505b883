//! GGML tensor data types.

use crate::error::{GgufArchError, Result};
use std::fmt;
use std::str::FromStr;

/// GGML tensor data types, with their on-disk type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum GgmlType {
    F32 = 0,
    F16 = 1,
    Q4_0 = 2,
    Q4_1 = 3,
    Q5_0 = 6,
    Q5_1 = 7,
    Q8_0 = 8,
    Q8_1 = 9,
    Q2K = 10,
    Q3K = 11,
    Q4K = 12,
    Q5K = 13,
    Q6K = 14,
    Q8K = 15,
    Iq2Xxs = 16,
    Iq2Xs = 17,
    Iq3Xxs = 18,
    Iq1S = 19,
    Iq4Nl = 20,
    Iq3S = 21,
    Iq2S = 22,
    Iq4Xs = 23,
    I8 = 24,
    I16 = 25,
    I32 = 26,
    I64 = 27,
    F64 = 28,
    Iq1M = 29,
    Bf16 = 30,
}

/// Encodings accepted for the KV cache keys and values.
pub const CACHE_TYPE_ALLOW_LIST: [GgmlType; 8] = [
    GgmlType::F32,
    GgmlType::F16,
    GgmlType::Q8_0,
    GgmlType::Q4_0,
    GgmlType::Q4_1,
    GgmlType::Iq4Nl,
    GgmlType::Q5_0,
    GgmlType::Q5_1,
];

impl GgmlType {
    pub const ALL: [GgmlType; 29] = [
        GgmlType::F32,
        GgmlType::F16,
        GgmlType::Q4_0,
        GgmlType::Q4_1,
        GgmlType::Q5_0,
        GgmlType::Q5_1,
        GgmlType::Q8_0,
        GgmlType::Q8_1,
        GgmlType::Q2K,
        GgmlType::Q3K,
        GgmlType::Q4K,
        GgmlType::Q5K,
        GgmlType::Q6K,
        GgmlType::Q8K,
        GgmlType::Iq2Xxs,
        GgmlType::Iq2Xs,
        GgmlType::Iq3Xxs,
        GgmlType::Iq1S,
        GgmlType::Iq4Nl,
        GgmlType::Iq3S,
        GgmlType::Iq2S,
        GgmlType::Iq4Xs,
        GgmlType::I8,
        GgmlType::I16,
        GgmlType::I32,
        GgmlType::I64,
        GgmlType::F64,
        GgmlType::Iq1M,
        GgmlType::Bf16,
    ];

    /// Canonical ggml name, e.g. `Q4_K` or `IQ4_NL`.
    pub const fn name(self) -> &'static str {
        match self {
            Self::F32 => "F32",
            Self::F16 => "F16",
            Self::Q4_0 => "Q4_0",
            Self::Q4_1 => "Q4_1",
            Self::Q5_0 => "Q5_0",
            Self::Q5_1 => "Q5_1",
            Self::Q8_0 => "Q8_0",
            Self::Q8_1 => "Q8_1",
            Self::Q2K => "Q2_K",
            Self::Q3K => "Q3_K",
            Self::Q4K => "Q4_K",
            Self::Q5K => "Q5_K",
            Self::Q6K => "Q6_K",
            Self::Q8K => "Q8_K",
            Self::Iq2Xxs => "IQ2_XXS",
            Self::Iq2Xs => "IQ2_XS",
            Self::Iq3Xxs => "IQ3_XXS",
            Self::Iq1S => "IQ1_S",
            Self::Iq4Nl => "IQ4_NL",
            Self::Iq3S => "IQ3_S",
            Self::Iq2S => "IQ2_S",
            Self::Iq4Xs => "IQ4_XS",
            Self::I8 => "I8",
            Self::I16 => "I16",
            Self::I32 => "I32",
            Self::I64 => "I64",
            Self::F64 => "F64",
            Self::Iq1M => "IQ1_M",
            Self::Bf16 => "BF16",
        }
    }

    /// Type for an on-disk type code.
    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|t| *t as u32 == code)
    }

    /// Whether the type may be used to store the KV cache.
    pub fn is_cache_type(self) -> bool {
        CACHE_TYPE_ALLOW_LIST.contains(&self)
    }
}

impl fmt::Display for GgmlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GgmlType {
    type Err = GgufArchError;

    /// Parse a ggml name, ignoring ASCII case (`q8_0`, `IQ4_NL`).
    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| GgufArchError::UnknownGgmlType(s.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        assert_eq!("q8_0".parse::<GgmlType>().unwrap(), GgmlType::Q8_0);
        assert_eq!("IQ4_NL".parse::<GgmlType>().unwrap(), GgmlType::Iq4Nl);
        assert_eq!("bf16".parse::<GgmlType>().unwrap(), GgmlType::Bf16);
        assert!(matches!(
            "q3".parse::<GgmlType>(),
            Err(GgufArchError::UnknownGgmlType(s)) if s == "q3"
        ));
    }

    #[test]
    fn test_names_parse_back() {
        for t in GgmlType::ALL {
            assert_eq!(t.to_string().parse::<GgmlType>().unwrap(), t);
        }
    }

    #[test]
    fn test_codes() {
        assert_eq!(GgmlType::from_code(8), Some(GgmlType::Q8_0));
        assert_eq!(GgmlType::from_code(20), Some(GgmlType::Iq4Nl));
        assert_eq!(GgmlType::from_code(4), None);
    }

    #[test]
    fn test_cache_allow_list() {
        assert!(GgmlType::F16.is_cache_type());
        assert!(GgmlType::Iq4Nl.is_cache_type());
        assert!(!GgmlType::Q4K.is_cache_type());
        assert!(!GgmlType::Bf16.is_cache_type());
        assert_eq!(
            GgmlType::ALL.iter().filter(|t| t.is_cache_type()).count(),
            CACHE_TYPE_ALLOW_LIST.len()
        );
    }
}
