//! Key encoding for the table and shard hashes
//!
//! Keys feed a fixed byte representation into the hasher instead of going
//! through `std::hash::Hash`, whose integer encoding follows the platform's
//! native endianness. Equal keys must write identical bytes.

use std::fmt::{self, Display, Write as _};
use std::hash::Hasher;
use std::rc::Rc;
use std::sync::Arc;

/// A key that can be stored in a [`DashTable`](crate::table::DashTable).
///
/// Integers are written as 8 little-endian bytes (sign-extended for signed
/// types, 16 bytes for 128-bit types). Floats are written as their `f64`
/// IEEE bits after mapping `-0.0` to `0.0` and every NaN to one canonical
/// NaN. Text and byte sequences are written as raw bytes.
///
/// NaN keys hash consistently but never compare equal, so a NaN key can be
/// stored yet never found again.
pub trait DashKey: PartialEq {
    /// Feed the canonical byte form of `self` into `state`
    fn write_key<H: Hasher>(&self, state: &mut H);
}

macro_rules! impl_dash_key_unsigned {
    ($($t:ty),*) => {
        $(
            impl DashKey for $t {
                #[inline]
                fn write_key<H: Hasher>(&self, state: &mut H) {
                    state.write(&(*self as u64).to_le_bytes());
                }
            }
        )*
    };
}

macro_rules! impl_dash_key_signed {
    ($($t:ty),*) => {
        $(
            impl DashKey for $t {
                #[inline]
                fn write_key<H: Hasher>(&self, state: &mut H) {
                    state.write(&(*self as i64 as u64).to_le_bytes());
                }
            }
        )*
    };
}

impl_dash_key_unsigned!(u8, u16, u32, u64, usize);
impl_dash_key_signed!(i8, i16, i32, i64, isize);

impl DashKey for u128 {
    #[inline]
    fn write_key<H: Hasher>(&self, state: &mut H) {
        state.write(&self.to_le_bytes());
    }
}

impl DashKey for i128 {
    #[inline]
    fn write_key<H: Hasher>(&self, state: &mut H) {
        state.write(&self.to_le_bytes());
    }
}

#[inline]
fn canonical_float_bits(value: f64) -> u64 {
    if value == 0.0 {
        0
    } else if value.is_nan() {
        f64::NAN.to_bits()
    } else {
        value.to_bits()
    }
}

impl DashKey for f64 {
    #[inline]
    fn write_key<H: Hasher>(&self, state: &mut H) {
        state.write(&canonical_float_bits(*self).to_le_bytes());
    }
}

impl DashKey for f32 {
    #[inline]
    fn write_key<H: Hasher>(&self, state: &mut H) {
        state.write(&canonical_float_bits(f64::from(*self)).to_le_bytes());
    }
}

impl DashKey for bool {
    #[inline]
    fn write_key<H: Hasher>(&self, state: &mut H) {
        state.write(&[u8::from(*self)]);
    }
}

impl DashKey for char {
    #[inline]
    fn write_key<H: Hasher>(&self, state: &mut H) {
        state.write(&u64::from(*self).to_le_bytes());
    }
}

impl DashKey for str {
    #[inline]
    fn write_key<H: Hasher>(&self, state: &mut H) {
        state.write(self.as_bytes());
    }
}

impl DashKey for String {
    #[inline]
    fn write_key<H: Hasher>(&self, state: &mut H) {
        state.write(self.as_bytes());
    }
}

impl DashKey for [u8] {
    #[inline]
    fn write_key<H: Hasher>(&self, state: &mut H) {
        state.write(self);
    }
}

impl DashKey for Vec<u8> {
    #[inline]
    fn write_key<H: Hasher>(&self, state: &mut H) {
        state.write(self);
    }
}

impl<const N: usize> DashKey for [u8; N] {
    #[inline]
    fn write_key<H: Hasher>(&self, state: &mut H) {
        state.write(self);
    }
}

impl<T: DashKey + ?Sized> DashKey for &T {
    #[inline]
    fn write_key<H: Hasher>(&self, state: &mut H) {
        (**self).write_key(state);
    }
}

impl<T: DashKey + ?Sized> DashKey for Box<T> {
    #[inline]
    fn write_key<H: Hasher>(&self, state: &mut H) {
        (**self).write_key(state);
    }
}

impl<T: DashKey + ?Sized> DashKey for Arc<T> {
    #[inline]
    fn write_key<H: Hasher>(&self, state: &mut H) {
        (**self).write_key(state);
    }
}

impl<T: DashKey + ?Sized> DashKey for Rc<T> {
    #[inline]
    fn write_key<H: Hasher>(&self, state: &mut H) {
        (**self).write_key(state);
    }
}

/// Fallback key encoded through its `Display` output.
///
/// Only use this for types without a fixed-width form. `Display` must be a
/// pure function of the value: two keys that compare equal have to format
/// to the same string, with no addresses or type names mixed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TextKey<T>(pub T);

impl<T> TextKey<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T: Display + PartialEq> DashKey for TextKey<T> {
    fn write_key<H: Hasher>(&self, state: &mut H) {
        let mut writer = BlockWriter::new(state);
        // Writing into a hasher never fails; only a broken Display impl can
        let _ = write!(writer, "{}", self.0);
        writer.flush();
    }
}

const TEXT_BLOCK: usize = 64;

/// Feeds formatted text to a hasher in fixed-size blocks.
///
/// Block boundaries depend only on the byte stream, not on how the
/// `Display` impl splits its output across `write_str` calls.
struct BlockWriter<'a, H> {
    state: &'a mut H,
    block: [u8; TEXT_BLOCK],
    filled: usize,
}

impl<'a, H: Hasher> BlockWriter<'a, H> {
    fn new(state: &'a mut H) -> Self {
        Self {
            state,
            block: [0; TEXT_BLOCK],
            filled: 0,
        }
    }

    fn flush(&mut self) {
        if self.filled > 0 {
            self.state.write(&self.block[..self.filled]);
            self.filled = 0;
        }
    }
}

impl<H: Hasher> fmt::Write for BlockWriter<'_, H> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let mut bytes = s.as_bytes();
        while !bytes.is_empty() {
            let take = (TEXT_BLOCK - self.filled).min(bytes.len());
            self.block[self.filled..self.filled + take].copy_from_slice(&bytes[..take]);
            self.filled += take;
            bytes = &bytes[take..];
            if self.filled == TEXT_BLOCK {
                self.flush();
            }
        }
        Ok(())
    }
}

impl<T: Display> Display for TextKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
