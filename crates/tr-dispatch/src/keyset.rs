use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign, BitXor, Sub};
use std::sync::OnceLock;

use tr_util::bits::count_leading_zeros;
use tr_util::tr_check;

use crate::error::{DispatchKeyError, Result};
use crate::iter::Iter;
use crate::key::{
    BackendComponent, DispatchKey, FULL_BACKEND_MASK, NUM_BACKENDS, NUM_FUNCTIONALITY_KEYS,
    NUM_RUNTIME_ENTRIES,
};

/// Dispatch table placement of one functionality key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FunctionalityOffsetAndMask {
    /// First slot of this functionality in the flat dispatch table.
    pub offset: u16,
    /// `FULL_BACKEND_MASK` for per-backend functionalities, 0 otherwise.
    pub mask: u64,
}

impl FunctionalityOffsetAndMask {
    pub const fn new(offset: u16, mask: u64) -> Self {
        Self { offset, mask }
    }
}

fn initialize_functionality_offsets_and_masks(
) -> [FunctionalityOffsetAndMask; NUM_FUNCTIONALITY_KEYS as usize] {
    let mut table = [FunctionalityOffsetAndMask::default(); NUM_FUNCTIONALITY_KEYS as usize];
    for idx in 1..NUM_FUNCTIONALITY_KEYS as usize {
        let prev = table[idx - 1];
        let offset = prev.offset + if prev.mask == 0 { 1 } else { NUM_BACKENDS as u16 };
        let per_backend = DispatchKey::from_repr(idx as u16)
            .is_some_and(DispatchKey::is_per_backend_functionality);
        let mask = if per_backend { FULL_BACKEND_MASK } else { 0 };
        table[idx] = FunctionalityOffsetAndMask::new(offset, mask);
    }

    let last = table[NUM_FUNCTIONALITY_KEYS as usize - 1].offset;
    tr_check!(
        last == NUM_RUNTIME_ENTRIES - 1,
        "num_runtime_entries: {} last offset: {}",
        NUM_RUNTIME_ENTRIES,
        last
    );
    tracing::debug!(entries = NUM_RUNTIME_ENTRIES, "built functionality offset table");
    table
}

/// The memoized offset/mask table, indexed by functionality ordinal.
pub fn offsets_and_masks() -> &'static [FunctionalityOffsetAndMask; NUM_FUNCTIONALITY_KEYS as usize]
{
    static TABLE: OnceLock<[FunctionalityOffsetAndMask; NUM_FUNCTIONALITY_KEYS as usize]> =
        OnceLock::new();
    TABLE.get_or_init(initialize_functionality_offsets_and_masks)
}

/// A set of dispatch keys packed into one `u64`.
///
/// Layout, low to high:
/// - bits `0..NUM_BACKENDS`: one bit per backend component
/// - bits `NUM_BACKENDS..`: one bit per functionality key
///
/// A per-backend runtime key such as `AutogradCUDA` sets its functionality
/// bit and its backend bit. The backend region is shared by all per-backend
/// functionalities in the set, so `{CPU, AutogradCUDA}` and
/// `{CUDA, AutogradCPU}` have the same representation and both decode to all
/// four combinations.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DispatchKeySet {
    repr: u64,
}

impl DispatchKeySet {
    pub const fn empty() -> Self {
        Self { repr: 0 }
    }

    /// Every backend bit and every functionality bit.
    pub const fn full() -> Self {
        Self {
            repr: (1u64 << (NUM_BACKENDS + NUM_FUNCTIONALITY_KEYS - 1)) - 1,
        }
    }

    /// Every backend bit plus every functionality strictly below `key`'s
    /// functionality.
    pub const fn full_after(key: DispatchKey) -> Self {
        let functionality = key.to_functionality_key() as u64;
        if functionality == 0 {
            return Self::empty();
        }
        Self {
            repr: (1u64 << (NUM_BACKENDS as u64 + functionality - 1)) - 1,
        }
    }

    /// Wrap a raw representation without validation.
    pub const fn from_raw(repr: u64) -> Self {
        Self { repr }
    }

    /// Wrap a raw representation, rejecting bits no key maps to.
    pub fn from_raw_checked(repr: u64) -> Result<Self> {
        let unknown = repr & !Self::full().repr;
        if unknown != 0 {
            return Err(DispatchKeyError::UnknownBits {
                unknown_mask: unknown,
            });
        }
        Ok(Self { repr })
    }

    pub const fn from_backend(backend: BackendComponent) -> Self {
        match backend {
            BackendComponent::InvalidBit => Self::empty(),
            b => Self {
                repr: 1u64 << (b as u8 - 1),
            },
        }
    }

    /// The set holding exactly `key`.
    ///
    /// `Undefined` and alias keys produce the empty set.
    pub const fn from_key(key: DispatchKey) -> Self {
        let v = key as u16;
        if v == 0 {
            Self::empty()
        } else if v <= DispatchKey::END_OF_FUNCTIONALITY_KEYS {
            Self {
                repr: 1u64 << (NUM_BACKENDS as u16 + v - 1),
            }
        } else if v <= DispatchKey::END_OF_RUNTIME_BACKEND_KEYS {
            let functionality = key.to_functionality_key() as u16;
            let backend = Self::from_backend(key.to_backend_component()).repr;
            Self {
                repr: (1u64 << (NUM_BACKENDS as u16 + functionality - 1)) | backend,
            }
        } else {
            Self::empty()
        }
    }

    pub fn from_keys(keys: &[DispatchKey]) -> Self {
        keys.iter().copied().collect()
    }

    pub fn from_backends(backends: &[BackendComponent]) -> Self {
        backends
            .iter()
            .fold(Self::empty(), |set, &b| set | Self::from_backend(b))
    }

    /// The runtime keys an alias key stands for.
    ///
    /// Returns the empty set for non-alias keys.
    pub const fn runtime_keyset_for_alias(alias: DispatchKey) -> Self {
        let autograd = Self::from_key(DispatchKey::AutogradFunctionality).repr | FULL_BACKEND_MASK;
        let dense = Self::from_key(DispatchKey::Dense).repr | FULL_BACKEND_MASK;
        let repr = match alias {
            DispatchKey::Autograd => autograd,
            DispatchKey::CompositeExplicitAutograd => dense,
            DispatchKey::CompositeImplicitAutograd => autograd | dense,
            _ => 0,
        };
        Self { repr }
    }

    pub const fn raw_repr(self) -> u64 {
        self.repr
    }

    pub const fn is_empty(self) -> bool {
        self.repr == 0
    }

    /// Whether `key` is present as a runtime key.
    ///
    /// A bare per-backend functionality (`Dense`, `AutogradFunctionality`) is
    /// not a runtime key and always answers false; query its bit with
    /// [`has_functionality`](Self::has_functionality) instead.
    ///
    /// # Panics
    /// `Undefined` is not a valid query.
    pub fn has(self, key: DispatchKey) -> bool {
        tr_check!(key != DispatchKey::Undefined, "Undefined key is not allowed.");
        if key.is_per_backend_functionality() {
            return false;
        }
        let query = Self::from_key(key);
        !query.is_empty() && self.has_all(query)
    }

    /// Whether the functionality bit of `key` is set, ignoring backends.
    pub fn has_functionality(self, key: DispatchKey) -> bool {
        let functionality = Self::from_key(key.to_functionality_key()).repr & !FULL_BACKEND_MASK;
        functionality != 0 && self.repr & functionality == functionality
    }

    pub const fn has_backend(self, backend: BackendComponent) -> bool {
        let query = Self::from_backend(backend);
        !query.is_empty() && self.has_all(query)
    }

    pub const fn has_all(self, other: DispatchKeySet) -> bool {
        self.repr & other.repr == other.repr
    }

    /// Whether any bit of `other` is present.
    ///
    /// # Panics
    /// `other` may not mix backend bits with per-backend functionality bits:
    /// the shared backend region would make the answer ambiguous.
    pub fn has_any(self, other: DispatchKeySet) -> bool {
        let per_backend =
            Self::from_keys(&[DispatchKey::Dense, DispatchKey::AutogradFunctionality]);
        tr_check!(
            other.repr & FULL_BACKEND_MASK == 0 || (other & per_backend).is_empty(),
            "has_any() query mixes backend bits with per-backend functionality keys: {:?}",
            other
        );
        self.repr & other.repr != 0
    }

    #[must_use]
    pub const fn add(self, key: DispatchKey) -> Self {
        Self {
            repr: self.repr | Self::from_key(key).repr,
        }
    }

    #[must_use]
    pub const fn add_set(self, other: DispatchKeySet) -> Self {
        Self {
            repr: self.repr | other.repr,
        }
    }

    /// Remove the functionality bit of `key`. Backend bits are kept because
    /// other per-backend functionalities may still use them.
    #[must_use]
    pub const fn remove(self, key: DispatchKey) -> Self {
        Self {
            repr: self.repr & !(Self::from_key(key).repr & !FULL_BACKEND_MASK),
        }
    }

    #[must_use]
    pub const fn remove_backend(self, backend: BackendComponent) -> Self {
        Self {
            repr: self.repr & !Self::from_backend(backend).repr,
        }
    }

    /// One past the index of the highest set bit; 0 for the empty set.
    pub fn index_of_highest_bit(self) -> u8 {
        (u64::BITS - count_leading_zeros(self.repr)) as u8
    }

    /// Highest functionality key in the set. Bits above the functionality
    /// region are ignored.
    pub fn highest_functionality_key(self) -> DispatchKey {
        let idx = Self::from_raw(self.repr & Self::full().repr).index_of_highest_bit();
        if idx < NUM_BACKENDS {
            return DispatchKey::Undefined;
        }
        DispatchKey::from_repr((idx - NUM_BACKENDS) as u16).unwrap_or(DispatchKey::Undefined)
    }

    pub fn highest_backend_key(self) -> BackendComponent {
        let idx = Self::from_raw(self.repr & FULL_BACKEND_MASK).index_of_highest_bit();
        BackendComponent::from_repr(idx).unwrap_or(BackendComponent::InvalidBit)
    }

    /// Zero-based position of the highest backend bit (CPU = 0, CUDA = 1, ...).
    pub fn backend_index(self) -> u8 {
        Self::from_raw((self.repr & FULL_BACKEND_MASK) >> 1).index_of_highest_bit()
    }

    /// Index of this set's dominant key in a flat dispatch table of
    /// `NUM_RUNTIME_ENTRIES` slots.
    ///
    /// # Panics
    /// The set must contain a functionality key.
    pub fn dispatch_table_index(self) -> usize {
        let functionality = self.highest_functionality_key();
        let idx = functionality as usize;
        tr_check!(
            functionality != DispatchKey::Undefined && idx < NUM_FUNCTIONALITY_KEYS as usize,
            "cannot compute a dispatch table index for {:?}",
            self
        );
        let entry = offsets_and_masks()[idx];
        let backend_idx = Self::from_raw((self.repr & entry.mask) >> 1).index_of_highest_bit();
        entry.offset as usize + backend_idx as usize
    }

    /// Non-panicking form of [`dispatch_table_index`](Self::dispatch_table_index).
    ///
    /// # Errors
    /// `UnknownBits` for bits no key maps to, `NoFunctionality` for a set
    /// without a functionality key.
    pub fn try_dispatch_table_index(self) -> Result<usize> {
        Self::from_raw_checked(self.repr)?;
        if self.highest_functionality_key() == DispatchKey::Undefined {
            return Err(DispatchKeyError::NoFunctionality);
        }
        Ok(self.dispatch_table_index())
    }

    pub fn iter(&self) -> Iter {
        Iter::new(self.repr)
    }
}

impl From<DispatchKey> for DispatchKeySet {
    fn from(key: DispatchKey) -> Self {
        Self::from_key(key)
    }
}

impl From<BackendComponent> for DispatchKeySet {
    fn from(backend: BackendComponent) -> Self {
        Self::from_backend(backend)
    }
}

impl FromIterator<DispatchKey> for DispatchKeySet {
    fn from_iter<I: IntoIterator<Item = DispatchKey>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::empty(), |set, key| set | Self::from_key(key))
    }
}

impl FromIterator<BackendComponent> for DispatchKeySet {
    fn from_iter<I: IntoIterator<Item = BackendComponent>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::empty(), |set, b| set | Self::from_backend(b))
    }
}

impl BitOr for DispatchKeySet {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.add_set(rhs)
    }
}

impl BitOrAssign for DispatchKeySet {
    fn bitor_assign(&mut self, rhs: Self) {
        self.repr |= rhs.repr;
    }
}

impl BitAnd for DispatchKeySet {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self::from_raw(self.repr & rhs.repr)
    }
}

impl BitXor for DispatchKeySet {
    type Output = Self;

    fn bitxor(self, rhs: Self) -> Self {
        Self::from_raw(self.repr ^ rhs.repr)
    }
}

/// Set difference over functionality bits only; backend bits of `self`
/// always survive.
impl Sub for DispatchKeySet {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::from_raw(self.repr & (FULL_BACKEND_MASK | !rhs.repr))
    }
}

impl IntoIterator for DispatchKeySet {
    type Item = DispatchKey;
    type IntoIter = Iter;

    fn into_iter(self) -> Iter {
        Iter::new(self.repr)
    }
}

impl IntoIterator for &DispatchKeySet {
    type Item = DispatchKey;
    type IntoIter = Iter;

    fn into_iter(self) -> Iter {
        Iter::new(self.repr)
    }
}

impl fmt::Display for DispatchKeySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DispatchKeySet(")?;
        for (i, key) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", key)?;
        }
        write!(f, ")")
    }
}

impl fmt::Debug for DispatchKeySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [0x{:x}]", self, self.repr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_set(rng: &mut StdRng) -> DispatchKeySet {
        DispatchKeySet::from_raw(rng.gen::<u64>() & DispatchKeySet::full().raw_repr())
    }

    #[test]
    fn test_layout() {
        assert_eq!(DispatchKeySet::from(BackendComponent::CPUBit).raw_repr(), 0b1);
        assert_eq!(DispatchKeySet::from(BackendComponent::MetaBit).raw_repr(), 0b100);
        assert_eq!(DispatchKeySet::from(DispatchKey::Dense).raw_repr(), 1 << 3);
        assert_eq!(
            DispatchKeySet::from(DispatchKey::AutogradCUDA).raw_repr(),
            (1 << 6) | 0b10
        );
        assert_eq!(DispatchKeySet::full().raw_repr(), (1 << 9) - 1);
        assert!(DispatchKeySet::from(DispatchKey::Undefined).is_empty());
        assert!(DispatchKeySet::from(DispatchKey::Autograd).is_empty());
        assert!(DispatchKeySet::from(BackendComponent::InvalidBit).is_empty());
    }

    #[test]
    fn test_constructors_agree() {
        let from_list = DispatchKeySet::from_keys(&[DispatchKey::AutogradFunctionality]);
        let from_key = DispatchKeySet::from(DispatchKey::AutogradFunctionality);
        assert_eq!(from_list, from_key);

        let from_backends = DispatchKeySet::from_backends(&[BackendComponent::CUDABit]);
        assert_eq!(from_backends, DispatchKeySet::from(BackendComponent::CUDABit));
    }

    #[test]
    fn test_full_after() {
        let ks = DispatchKeySet::full_after(DispatchKey::AutogradFunctionality);
        assert!(ks.has_backend(BackendComponent::MetaBit));
        assert!(ks.has_functionality(DispatchKey::ADInplaceOrView));
        assert!(!ks.has_functionality(DispatchKey::AutogradFunctionality));
        assert!(DispatchKeySet::full_after(DispatchKey::Undefined).is_empty());
    }

    #[test]
    fn test_from_raw_checked() {
        assert!(DispatchKeySet::from_raw_checked(0b1_1000_0001).is_ok());
        let err = DispatchKeySet::from_raw_checked(1 << 20).unwrap_err();
        assert_eq!(
            err,
            DispatchKeyError::UnknownBits {
                unknown_mask: 1 << 20
            }
        );
    }

    #[test]
    fn test_membership() {
        let ks =
            DispatchKeySet::from_keys(&[DispatchKey::Dense, DispatchKey::AutogradFunctionality])
                | DispatchKeySet::from(BackendComponent::CUDABit);
        assert!(ks.has_functionality(DispatchKey::Dense));
        assert!(ks.has(DispatchKey::CUDA));
        assert!(ks.has(DispatchKey::AutogradCUDA));
        assert!(!ks.has(DispatchKey::CPU));
        assert!(!ks.has_backend(BackendComponent::CPUBit));
        assert!(ks.has_backend(BackendComponent::CUDABit));
        assert!(!ks.has_backend(BackendComponent::InvalidBit));
        assert!(ks.has_all(DispatchKeySet::from_keys(&[
            DispatchKey::Dense,
            DispatchKey::AutogradFunctionality
        ])));
        assert!(ks.has_any(DispatchKeySet::from_keys(&[
            DispatchKey::Dense,
            DispatchKey::BackendSelect
        ])));
        assert!(!ks.is_empty());
    }

    #[test]
    fn test_dense_cuda_scenario() {
        let ks = DispatchKeySet::from(DispatchKey::Dense)
            | DispatchKeySet::from(BackendComponent::CUDABit);
        assert!(!ks.has(DispatchKey::Dense));
        assert!(ks.has_backend(BackendComponent::CUDABit));
        let dense_offset = offsets_and_masks()[DispatchKey::Dense as usize].offset as usize;
        assert_eq!(ks.dispatch_table_index(), dense_offset + 1);
    }

    #[test]
    fn test_every_runtime_key_is_its_own_member() {
        for key in DispatchKey::RUNTIME_KEYS {
            assert!(DispatchKeySet::from(key).has(key), "{key}");
        }
    }

    #[test]
    #[should_panic(expected = "Undefined key is not allowed")]
    fn test_has_undefined_panics() {
        DispatchKeySet::full().has(DispatchKey::Undefined);
    }

    #[test]
    fn test_empty_has_any_is_false() {
        let empty = DispatchKeySet::empty();
        for key in DispatchKey::RUNTIME_KEYS {
            // per-backend keys are queried through their backend bit alone
            let query = if key.is_per_backend_runtime_key() {
                DispatchKeySet::from(key.to_backend_component())
            } else {
                DispatchKeySet::from(key)
            };
            assert!(!empty.has_any(query));
        }
        assert!(!empty.has_any(DispatchKeySet::from(DispatchKey::Dense)));
    }

    #[test]
    #[should_panic(expected = "has_any() query mixes backend bits")]
    fn test_has_any_ambiguous_query_panics() {
        let ks = DispatchKeySet::full();
        ks.has_any(DispatchKeySet::from(DispatchKey::AutogradCPU));
    }

    #[test]
    fn test_set_algebra_properties() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for _ in 0..512 {
            let a = random_set(&mut rng);
            let b = random_set(&mut rng);
            assert!((a | b).has_all(a));
            assert!((a | b).has_all(b));
            assert_eq!(a & a, a);
            assert_eq!(a | a, a);
            assert_eq!(a ^ a, DispatchKeySet::empty());

            let diff = a - b;
            assert_eq!(
                diff.raw_repr() & FULL_BACKEND_MASK,
                a.raw_repr() & FULL_BACKEND_MASK
            );
            let b_functionality = b.raw_repr() & !FULL_BACKEND_MASK;
            assert_eq!(diff.raw_repr() & b_functionality, 0);
            assert_eq!(
                diff.raw_repr() & !FULL_BACKEND_MASK,
                a.raw_repr() & !FULL_BACKEND_MASK & !b_functionality
            );
        }
    }

    #[test]
    fn test_add_remove() {
        let ks = DispatchKeySet::from_keys(&[DispatchKey::Dense, DispatchKey::AutogradCPU])
            .add(DispatchKey::BackendSelect);
        assert!(ks.has(DispatchKey::BackendSelect));

        let removed = ks.remove(DispatchKey::AutogradCPU);
        assert!(!removed.has_functionality(DispatchKey::AutogradFunctionality));
        assert!(removed.has_backend(BackendComponent::CPUBit));
        assert!(removed.has(DispatchKey::CPU));

        let no_cpu = ks.remove_backend(BackendComponent::CPUBit);
        assert!(!no_cpu.has_backend(BackendComponent::CPUBit));
        assert!(no_cpu.has_functionality(DispatchKey::Dense));
    }

    #[test]
    fn test_highest_keys() {
        let ks = DispatchKeySet::from_keys(&[DispatchKey::Dense, DispatchKey::AutogradCPU])
            .add(DispatchKey::BackendSelect)
            | DispatchKeySet::from_backends(&[BackendComponent::CUDABit, BackendComponent::CPUBit]);
        assert_eq!(
            ks.index_of_highest_bit(),
            DispatchKey::AutogradFunctionality as u8 + NUM_BACKENDS
        );
        assert_eq!(ks.highest_functionality_key(), DispatchKey::AutogradFunctionality);
        assert_eq!(ks.highest_backend_key(), BackendComponent::CUDABit);
        assert_eq!(ks.backend_index(), 1);

        let empty = DispatchKeySet::empty();
        assert_eq!(empty.index_of_highest_bit(), 0);
        assert_eq!(empty.highest_functionality_key(), DispatchKey::Undefined);
        assert_eq!(empty.highest_backend_key(), BackendComponent::InvalidBit);
    }

    #[test]
    fn test_offsets_and_masks() {
        let table = offsets_and_masks();
        let offsets: Vec<u16> = table.iter().map(|e| e.offset).collect();
        assert_eq!(offsets, vec![0, 1, 4, 5, 6, 9, 10]);
        assert_eq!(table[DispatchKey::Dense as usize].mask, FULL_BACKEND_MASK);
        assert_eq!(table[DispatchKey::BackendSelect as usize].mask, 0);
        assert_eq!(
            table[NUM_FUNCTIONALITY_KEYS as usize - 1].offset,
            NUM_RUNTIME_ENTRIES - 1
        );
    }

    #[test]
    fn test_dispatch_table_index_is_injective() {
        let mut seen = vec![None; NUM_RUNTIME_ENTRIES as usize];
        for key in DispatchKey::RUNTIME_KEYS {
            let idx = DispatchKeySet::from(key).dispatch_table_index();
            assert!(idx < NUM_RUNTIME_ENTRIES as usize);
            assert!(seen[idx].is_none(), "{key} collides with {:?}", seen[idx]);
            seen[idx] = Some(key);
        }
        // slot 0 belongs to Undefined
        assert!(seen[0].is_none());
        assert!(seen[1..].iter().all(Option::is_some));
    }

    #[test]
    fn test_dispatch_table_index_uses_highest_backend() {
        let ks = DispatchKeySet::from(DispatchKey::CPU) | DispatchKeySet::from(DispatchKey::Meta);
        assert_eq!(
            ks.dispatch_table_index(),
            DispatchKeySet::from(DispatchKey::Meta).dispatch_table_index()
        );
    }

    #[test]
    fn test_try_dispatch_table_index() {
        assert_eq!(
            DispatchKeySet::from(BackendComponent::CPUBit).try_dispatch_table_index(),
            Err(DispatchKeyError::NoFunctionality)
        );
        assert_eq!(
            DispatchKeySet::from(DispatchKey::BackendSelect).try_dispatch_table_index(),
            Ok(4)
        );
    }

    #[test]
    fn test_unknown_high_bits() {
        let unknown = DispatchKeySet::from_raw(1 << 11);
        assert_eq!(unknown.highest_functionality_key(), DispatchKey::Undefined);
        assert_eq!(
            unknown.try_dispatch_table_index(),
            Err(DispatchKeyError::UnknownBits {
                unknown_mask: 1 << 11
            })
        );

        let dense_cpu = DispatchKeySet::from(DispatchKey::CPU);
        let mixed = DispatchKeySet::from_raw(dense_cpu.raw_repr() | 1 << 40);
        assert_eq!(mixed.highest_functionality_key(), DispatchKey::Dense);
        assert_eq!(mixed.dispatch_table_index(), dense_cpu.dispatch_table_index());
        assert!(matches!(
            mixed.try_dispatch_table_index(),
            Err(DispatchKeyError::UnknownBits { .. })
        ));
    }

    #[test]
    #[should_panic(expected = "cannot compute a dispatch table index")]
    fn test_dispatch_table_index_empty_panics() {
        DispatchKeySet::empty().dispatch_table_index();
    }

    #[test]
    fn test_alias_expansion() {
        let autograd = DispatchKeySet::runtime_keyset_for_alias(DispatchKey::Autograd);
        assert!(autograd.has(DispatchKey::AutogradMeta));
        assert!(!autograd.has(DispatchKey::CPU));
        let implicit =
            DispatchKeySet::runtime_keyset_for_alias(DispatchKey::CompositeImplicitAutograd);
        assert!(implicit.has(DispatchKey::CPU));
        assert!(implicit.has(DispatchKey::AutogradCUDA));
        assert!(DispatchKeySet::runtime_keyset_for_alias(DispatchKey::CPU).is_empty());
    }

    #[test]
    fn test_display() {
        let ks = DispatchKeySet::from_keys(&[DispatchKey::BackendSelect, DispatchKey::CUDA]);
        assert_eq!(ks.to_string(), "DispatchKeySet(CUDA, BackendSelect)");
        assert_eq!(DispatchKeySet::empty().to_string(), "DispatchKeySet()");
    }
}
