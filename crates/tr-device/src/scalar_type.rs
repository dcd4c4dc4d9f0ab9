use std::fmt;

use half::f16;

/// Element types a storage can be viewed as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i8)]
pub enum ScalarType {
    Byte = 0,
    Char = 1,
    Short = 2,
    Int = 3,
    Long = 4,
    /// 16-bit floating point (IEEE 754 half-precision, via the `half` crate).
    Half = 5,
    Float = 6,
    Double = 7,
    Bool = 8,
    UInt16 = 9,
    UInt32 = 10,
    UInt64 = 11,
}

impl ScalarType {
    pub const ALL: [ScalarType; 12] = [
        ScalarType::Byte,
        ScalarType::Char,
        ScalarType::Short,
        ScalarType::Int,
        ScalarType::Long,
        ScalarType::Half,
        ScalarType::Float,
        ScalarType::Double,
        ScalarType::Bool,
        ScalarType::UInt16,
        ScalarType::UInt32,
        ScalarType::UInt64,
    ];

    /// Size in bytes of one element.
    pub const fn element_size(self) -> usize {
        match self {
            ScalarType::Byte | ScalarType::Char | ScalarType::Bool => 1,
            ScalarType::Short | ScalarType::Half | ScalarType::UInt16 => 2,
            ScalarType::Int | ScalarType::Float | ScalarType::UInt32 => 4,
            ScalarType::Long | ScalarType::Double | ScalarType::UInt64 => 8,
        }
    }

    pub const fn is_integral(self, include_bool: bool) -> bool {
        match self {
            ScalarType::Byte
            | ScalarType::Char
            | ScalarType::Short
            | ScalarType::Int
            | ScalarType::Long
            | ScalarType::UInt16
            | ScalarType::UInt32
            | ScalarType::UInt64 => true,
            ScalarType::Bool => include_bool,
            _ => false,
        }
    }

    pub const fn is_floating(self) -> bool {
        matches!(
            self,
            ScalarType::Half | ScalarType::Float | ScalarType::Double
        )
    }

    /// Floating types narrower than 32 bits.
    pub const fn is_reduced_floating(self) -> bool {
        matches!(self, ScalarType::Half)
    }

    pub const fn name(self) -> &'static str {
        match self {
            ScalarType::Byte => "Byte",
            ScalarType::Char => "Char",
            ScalarType::Short => "Short",
            ScalarType::Int => "Int",
            ScalarType::Long => "Long",
            ScalarType::Half => "Half",
            ScalarType::Float => "Float",
            ScalarType::Double => "Double",
            ScalarType::Bool => "Bool",
            ScalarType::UInt16 => "UInt16",
            ScalarType::UInt32 => "UInt32",
            ScalarType::UInt64 => "UInt64",
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A Rust type stored as one element of a `ScalarType`.
///
/// Elements are encoded in native byte order.
pub trait Element: Copy + 'static {
    const SCALAR_TYPE: ScalarType;

    /// Write `self` into `out`, which is exactly `element_size()` bytes.
    fn write_ne(self, out: &mut [u8]);

    /// Read an element from exactly `element_size()` bytes.
    fn read_ne(bytes: &[u8]) -> Self;
}

macro_rules! impl_element {
    ($($t:ty => $st:ident),* $(,)?) => {
        $(
            impl Element for $t {
                const SCALAR_TYPE: ScalarType = ScalarType::$st;

                #[inline]
                fn write_ne(self, out: &mut [u8]) {
                    out.copy_from_slice(&self.to_ne_bytes());
                }

                #[inline]
                fn read_ne(bytes: &[u8]) -> Self {
                    let mut buf = [0u8; std::mem::size_of::<$t>()];
                    buf.copy_from_slice(bytes);
                    <$t>::from_ne_bytes(buf)
                }
            }
        )*
    };
}

impl_element!(
    u8 => Byte,
    i8 => Char,
    i16 => Short,
    i32 => Int,
    i64 => Long,
    f16 => Half,
    f32 => Float,
    f64 => Double,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
);

impl Element for bool {
    const SCALAR_TYPE: ScalarType = ScalarType::Bool;

    fn write_ne(self, out: &mut [u8]) {
        out[0] = self as u8;
    }

    fn read_ne(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }
}
