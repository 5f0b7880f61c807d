//! Strongly typed, zero-cost identifier wrappers.
//!
//! Row ids are dense, non-negative `i32`s.  The most negative representable
//! value is the "absent" sentinel everywhere it can appear: column cells,
//! join pointers, and the value returned by an exhausted free ring.

use std::fmt;

/// Raw sentinel shared by every integral column and every row pointer.
pub const ABSENT: i32 = i32::MIN;

/// Generate a typed ID wrapper around a primitive integer.
macro_rules! typed_id {
    ($(#[$attr:meta])* $vis:vis struct $name:ident($inner:ty) = $sentinel:expr;) => {
        $(#[$attr])*
        #[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        $vis struct $name(pub $inner);

        impl $name {
            /// Sentinel meaning "no valid ID".
            pub const ABSENT: $name = $name($sentinel);

            /// Cast to `usize` for direct use as a `Vec` index.
            ///
            /// Must not be called on `ABSENT`.
            #[inline(always)]
            pub fn index(self) -> usize {
                debug_assert!(self != Self::ABSENT, "index() on absent {}", stringify!($name));
                self.0 as usize
            }

            #[inline(always)]
            pub fn is_absent(self) -> bool {
                self == Self::ABSENT
            }
        }

        impl Default for $name {
            /// Returns the `ABSENT` sentinel so uninitialized IDs are visibly invalid.
            #[inline(always)]
            fn default() -> Self {
                Self::ABSENT
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_absent() {
                    write!(f, "{}(-)", stringify!($name))
                } else {
                    write!(f, "{}({})", stringify!($name), self.0)
                }
            }
        }

        impl TryFrom<usize> for $name {
            type Error = std::num::TryFromIntError;
            fn try_from(n: usize) -> Result<$name, Self::Error> {
                <$inner>::try_from(n).map($name)
            }
        }
    };
}

typed_id! {
    /// Index of a row across all columns of one store.  Max ~2.1 billion rows.
    pub struct RowId(i32) = ABSENT;
}

typed_id! {
    /// Sequence number of a chunk within one iteration run.
    pub struct ChunkId(u32) = u32::MAX;
}

impl RowId {
    /// Wrap a raw cell value; negative values other than the sentinel are
    /// treated as absent as well.
    #[inline]
    pub fn from_raw(raw: i32) -> RowId {
        if raw < 0 { RowId::ABSENT } else { RowId(raw) }
    }

    /// The row `n` positions after `self`.
    #[inline]
    pub fn offset(self, n: usize) -> RowId {
        RowId(self.0 + n as i32)
    }

    /// Base-36 rendering used by the string interchange format.  Absent ids
    /// render as the empty string.
    pub fn to_base36(self) -> String {
        if self.is_absent() { String::new() } else { encode_base36(self.0) }
    }

    /// Parse a base-36 id.  The empty string parses to `ABSENT`.
    pub fn parse_base36(text: &str) -> Option<RowId> {
        let text = text.trim();
        if text.is_empty() {
            return Some(RowId::ABSENT);
        }
        i32::from_str_radix(text, 36).ok().filter(|v| *v >= 0).map(RowId)
    }
}

/// Lower-case base-36 form of any `i32`, with a leading `-` for negatives.
pub fn encode_base36(v: i32) -> String {
    // Widen so `i32::MIN` negates.
    let mut n = (v as i64).unsigned_abs();
    if n == 0 {
        return "0".to_owned();
    }
    let mut digits = Vec::with_capacity(8);
    while n > 0 {
        let d = (n % 36) as u8;
        digits.push(char::from(if d < 10 { b'0' + d } else { b'a' + d - 10 }));
        n /= 36;
    }
    if v < 0 {
        digits.push('-');
    }
    digits.iter().rev().collect()
}

impl From<RowId> for i32 {
    #[inline(always)]
    fn from(id: RowId) -> i32 {
        id.0
    }
}
