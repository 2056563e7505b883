//! Width-independent numeric coercion of metadata values.
//!
//! GGUF writers disagree on the storage type of the same hyperparameter
//! (`llama.context_length` is `u32` in one file and `u64` in another), so
//! callers ask for the type they want and the stored width is irrelevant.
//!
//! Conversion follows Rust `as` semantics for the target type:
//! integer to integer wraps, float to integer truncates toward zero and
//! saturates at the bounds (NaN becomes 0), integer to float rounds to the
//! nearest representable value. Booleans count as 0 or 1. Strings and arrays
//! coerce to zero.

use crate::metadata::MetadataValue;

/// A primitive numeric type a [`MetadataValue`] can be coerced into.
pub trait Numeric: Copy + Default {
    fn from_i64(v: i64) -> Self;
    fn from_u64(v: u64) -> Self;
    fn from_f64(v: f64) -> Self;
}

macro_rules! impl_numeric {
    ($($t:ty),* $(,)?) => {
        $(
            impl Numeric for $t {
                #[inline]
                fn from_i64(v: i64) -> Self {
                    v as $t
                }

                #[inline]
                fn from_u64(v: u64) -> Self {
                    v as $t
                }

                #[inline]
                fn from_f64(v: f64) -> Self {
                    v as $t
                }
            }
        )*
    };
}

impl_numeric!(u8, i8, u16, i16, u32, i32, u64, i64, usize, isize, f32, f64);

/// Coerce `value` into `T`.
///
/// Signed sources widen through `i64`, unsigned through `u64` and floats
/// through `f64`. Each widening is lossless, so the result equals a direct
/// `as` cast from the stored type.
pub fn coerce<T: Numeric>(value: &MetadataValue) -> T {
    match value {
        MetadataValue::Uint8(v) => T::from_u64(u64::from(*v)),
        MetadataValue::Uint16(v) => T::from_u64(u64::from(*v)),
        MetadataValue::Uint32(v) => T::from_u64(u64::from(*v)),
        MetadataValue::Uint64(v) => T::from_u64(*v),
        MetadataValue::Int8(v) => T::from_i64(i64::from(*v)),
        MetadataValue::Int16(v) => T::from_i64(i64::from(*v)),
        MetadataValue::Int32(v) => T::from_i64(i64::from(*v)),
        MetadataValue::Int64(v) => T::from_i64(*v),
        MetadataValue::Float32(v) => T::from_f64(f64::from(*v)),
        MetadataValue::Float64(v) => T::from_f64(*v),
        MetadataValue::Bool(b) => T::from_u64(u64::from(*b)),
        MetadataValue::String(_) | MetadataValue::Array(_) => T::default(),
    }
}
