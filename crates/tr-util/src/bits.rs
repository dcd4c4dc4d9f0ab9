//! Portable bit-mask helpers used by the dispatch key-set decoder.

/// Unsigned integer words the mask helpers operate on.
pub trait UnsignedBits: Copy + Eq {
    /// Width of the word in bits.
    const BITS: u32;
    const ZERO: Self;
    const MAX: Self;

    fn shr(self, n: u32) -> Self;
    fn not(self) -> Self;
    fn trailing_zeros(self) -> u32;
    fn leading_zeros(self) -> u32;
}

macro_rules! impl_unsigned_bits {
    ($($t:ty),*) => {
        $(
            impl UnsignedBits for $t {
                const BITS: u32 = <$t>::BITS;
                const ZERO: Self = 0;
                const MAX: Self = <$t>::MAX;

                #[inline]
                fn shr(self, n: u32) -> Self {
                    self >> n
                }

                #[inline]
                fn not(self) -> Self {
                    !self
                }

                #[inline]
                fn trailing_zeros(self) -> u32 {
                    <$t>::trailing_zeros(self)
                }

                #[inline]
                fn leading_zeros(self) -> u32 {
                    <$t>::leading_zeros(self)
                }
            }
        )*
    };
}

impl_unsigned_bits!(u32, u64);

/// Word with the low `n` bits set.
///
/// # Panics
/// Panics if `n` exceeds the word width.
#[inline]
pub fn mask_trailing_ones<T: UnsignedBits>(n: u32) -> T {
    assert!(n <= T::BITS, "invalid number of bits: {n} > {}", T::BITS);
    if n == 0 {
        T::ZERO
    } else {
        T::MAX.shr(T::BITS - n)
    }
}

/// Word with the high `n` bits set.
#[inline]
pub fn mask_leading_ones<T: UnsignedBits>(n: u32) -> T {
    mask_trailing_ones::<T>(T::BITS - n).not()
}

/// Word with the low `n` bits clear and every other bit set.
#[inline]
pub fn mask_trailing_zeros<T: UnsignedBits>(n: u32) -> T {
    mask_leading_ones::<T>(T::BITS - n)
}

/// Word with the high `n` bits clear and every other bit set.
#[inline]
pub fn mask_leading_zeros<T: UnsignedBits>(n: u32) -> T {
    mask_trailing_ones::<T>(T::BITS - n)
}

/// Number of trailing zero bits; the word width for zero.
#[inline]
pub fn count_trailing_zeros<T: UnsignedBits>(val: T) -> u32 {
    val.trailing_zeros()
}

/// Number of leading zero bits; the word width for zero.
#[inline]
pub fn count_leading_zeros<T: UnsignedBits>(val: T) -> u32 {
    val.leading_zeros()
}

/// Index of the lowest set bit, or `None` when no bit is set.
#[inline]
pub fn find_first_set<T: UnsignedBits>(val: T) -> Option<u32> {
    if val == T::ZERO {
        None
    } else {
        Some(val.trailing_zeros())
    }
}
