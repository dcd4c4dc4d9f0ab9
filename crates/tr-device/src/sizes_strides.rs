use std::fmt;

use smallvec::SmallVec;
use tr_util::tr_check;

/// Dimensions stored without a heap allocation.
pub const INLINE_DIMS: usize = 5;

type DimVec = SmallVec<[i64; INLINE_DIMS]>;

/// Per-dimension sizes and strides of a tensor view.
///
/// Up to [`INLINE_DIMS`] dimensions live inline; more spill to the heap, and
/// shrinking back to `INLINE_DIMS` or fewer moves them inline again. Both
/// arrays always have the same length.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SizesAndStrides {
    sizes: DimVec,
    strides: DimVec,
}

impl SizesAndStrides {
    /// One dimension of size 0 with stride 1.
    pub fn new() -> Self {
        let mut sizes = DimVec::new();
        let mut strides = DimVec::new();
        sizes.push(0);
        strides.push(1);
        Self { sizes, strides }
    }

    /// Row-major contiguous layout for `sizes`.
    ///
    /// For sizes [d0, d1, d2] the strides are [d1*d2, d2, 1].
    pub fn contiguous(sizes: &[i64]) -> Self {
        let mut strides = DimVec::from_elem(0, sizes.len());
        let mut acc = 1i64;
        for (stride, &size) in strides.iter_mut().zip(sizes).rev() {
            *stride = acc;
            acc *= size.max(1);
        }
        Self {
            sizes: DimVec::from_slice(sizes),
            strides,
        }
    }

    /// Number of dimensions.
    pub fn ndim(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_inline(&self) -> bool {
        !self.sizes.spilled()
    }

    pub fn sizes(&self) -> &[i64] {
        &self.sizes
    }

    pub fn sizes_mut(&mut self) -> &mut [i64] {
        &mut self.sizes
    }

    pub fn strides(&self) -> &[i64] {
        &self.strides
    }

    pub fn strides_mut(&mut self) -> &mut [i64] {
        &mut self.strides
    }

    /// Replace the sizes, resizing to `new_sizes.len()` dimensions. Strides of
    /// new dimensions are zero.
    pub fn set_sizes(&mut self, new_sizes: &[i64]) {
        self.resize(new_sizes.len());
        self.sizes.copy_from_slice(new_sizes);
    }

    /// # Panics
    /// `new_strides` must have one entry per dimension.
    pub fn set_strides(&mut self, new_strides: &[i64]) {
        tr_check!(
            new_strides.len() == self.ndim(),
            "set_strides: got {} strides for {} dimensions",
            new_strides.len(),
            self.ndim()
        );
        self.strides.copy_from_slice(new_strides);
    }

    /// # Panics
    /// `idx` must be a valid dimension.
    pub fn size_at(&self, idx: usize) -> i64 {
        tr_check!(idx < self.ndim(), "dimension {} out of range for {}", idx, self);
        self.sizes[idx]
    }

    /// # Panics
    /// `idx` must be a valid dimension.
    pub fn stride_at(&self, idx: usize) -> i64 {
        tr_check!(idx < self.ndim(), "dimension {} out of range for {}", idx, self);
        self.strides[idx]
    }

    /// Change the number of dimensions. Added dimensions have size and
    /// stride 0.
    pub fn resize(&mut self, new_ndim: usize) {
        let old_ndim = self.ndim();
        if new_ndim == old_ndim {
            return;
        }
        self.sizes.resize(new_ndim, 0);
        self.strides.resize(new_ndim, 0);
        if new_ndim < old_ndim && new_ndim <= INLINE_DIMS && self.sizes.spilled() {
            self.sizes.shrink_to_fit();
            self.strides.shrink_to_fit();
            tracing::trace!(ndim = new_ndim, "sizes and strides moved inline");
        }
    }

    /// Total number of elements (product of all sizes).
    pub fn numel(&self) -> i64 {
        self.sizes.iter().product()
    }

    /// Whether the strides describe a row-major contiguous layout.
    /// Dimensions of size 1 may have any stride.
    pub fn is_contiguous(&self) -> bool {
        let mut expected = 1i64;
        for (&size, &stride) in self.sizes.iter().zip(&self.strides).rev() {
            if size == 0 {
                return true;
            }
            if size != 1 && stride != expected {
                return false;
            }
            expected *= size;
        }
        true
    }
}

impl Default for SizesAndStrides {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SizesAndStrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sizes {:?}, strides {:?}", self.sizes(), self.strides())
    }
}

impl fmt::Debug for SizesAndStrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SizesAndStrides")
            .field("sizes", &self.sizes())
            .field("strides", &self.strides())
            .field("inline", &self.is_inline())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(ss: &SizesAndStrides, sizes: &[i64], strides: &[i64]) {
        assert_eq!(ss.ndim(), sizes.len());
        assert_eq!(ss.sizes(), sizes);
        assert_eq!(ss.strides(), strides);
        for (i, (&size, &stride)) in sizes.iter().zip(strides).enumerate() {
            assert_eq!(ss.size_at(i), size);
            assert_eq!(ss.stride_at(i), stride);
        }
        assert_eq!(ss.is_inline(), sizes.len() <= INLINE_DIMS);
    }

    #[test]
    fn test_default() {
        let ss = SizesAndStrides::default();
        check(&ss, &[0], &[1]);
        assert_eq!(ss.numel(), 0);
    }

    #[test]
    fn test_set_sizes_and_strides() {
        let mut ss = SizesAndStrides::new();
        ss.set_sizes(&[5, 6, 7, 8]);
        check(&ss, &[5, 6, 7, 8], &[1, 0, 0, 0]);
        ss.set_strides(&[1, 2, 3, 4]);
        check(&ss, &[5, 6, 7, 8], &[1, 2, 3, 4]);

        ss.sizes_mut()[1] = 9;
        ss.strides_mut()[3] = 10;
        check(&ss, &[5, 9, 7, 8], &[1, 2, 3, 10]);
    }

    #[test]
    fn test_resize_within_inline() {
        let mut ss = SizesAndStrides::contiguous(&[2, 3]);
        ss.resize(4);
        check(&ss, &[2, 3, 0, 0], &[3, 1, 0, 0]);
        ss.resize(1);
        check(&ss, &[2], &[3]);
        ss.resize(0);
        check(&ss, &[], &[]);
        assert_eq!(ss.numel(), 1);
    }

    #[test]
    fn test_inline_to_heap_and_back() {
        let mut ss = SizesAndStrides::new();
        ss.set_sizes(&[1, 2, 3, 4, 5]);
        ss.set_strides(&[-1, -2, -3, -4, -5]);
        assert!(ss.is_inline());

        ss.resize(7);
        check(&ss, &[1, 2, 3, 4, 5, 0, 0], &[-1, -2, -3, -4, -5, 0, 0]);
        assert!(!ss.is_inline());

        ss.resize(9);
        check(
            &ss,
            &[1, 2, 3, 4, 5, 0, 0, 0, 0],
            &[-1, -2, -3, -4, -5, 0, 0, 0, 0],
        );

        ss.resize(INLINE_DIMS);
        check(&ss, &[1, 2, 3, 4, 5], &[-1, -2, -3, -4, -5]);
        assert!(ss.is_inline());

        ss.resize(6);
        check(&ss, &[1, 2, 3, 4, 5, 0], &[-1, -2, -3, -4, -5, 0]);
    }

    #[test]
    fn test_copy_is_independent() {
        for sizes in [&[1i64, 2, 3][..], &[1, 2, 3, 4, 5, 6, 7][..]] {
            let mut original = SizesAndStrides::contiguous(sizes);
            let copy = original.clone();
            assert_eq!(copy, original);

            original.sizes_mut()[0] = 42;
            assert_eq!(copy.size_at(0), 1);
            assert_ne!(copy, original);

            let mut target = SizesAndStrides::contiguous(&[9; 8]);
            target.clone_from(&copy);
            assert_eq!(target, copy);
            assert_eq!(target.is_inline(), copy.is_inline());
        }
    }

    #[test]
    fn test_contiguous() {
        let ss = SizesAndStrides::contiguous(&[2, 3, 4]);
        check(&ss, &[2, 3, 4], &[12, 4, 1]);
        assert_eq!(ss.numel(), 24);
        assert!(ss.is_contiguous());

        let mut transposed = ss.clone();
        transposed.set_strides(&[12, 1, 4]);
        assert!(!transposed.is_contiguous());

        let mut broadcast = SizesAndStrides::contiguous(&[2, 1, 4]);
        broadcast.set_strides(&[4, 100, 1]);
        assert!(broadcast.is_contiguous());

        let scalar = SizesAndStrides::contiguous(&[]);
        assert_eq!(scalar.ndim(), 0);
        assert_eq!(scalar.numel(), 1);
        assert!(scalar.is_contiguous());
    }

    #[test]
    #[should_panic(expected = "set_strides: got 2 strides for 3 dimensions")]
    fn test_set_strides_length_mismatch() {
        let mut ss = SizesAndStrides::contiguous(&[1, 2, 3]);
        ss.set_strides(&[1, 2]);
    }

    #[test]
    #[should_panic(expected = "dimension 3 out of range")]
    fn test_size_at_out_of_range() {
        SizesAndStrides::contiguous(&[1, 2, 3]).size_at(3);
    }

    #[test]
    fn test_display() {
        let ss = SizesAndStrides::contiguous(&[2, 3]);
        assert_eq!(ss.to_string(), "sizes [2, 3], strides [3, 1]");
        assert!(format!("{:?}", ss).contains("inline: true"));
    }
}
