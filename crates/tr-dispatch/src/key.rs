use std::fmt;

use crate::error::DispatchKeyError;

/// A device family bit in the low region of a `DispatchKeySet`.
///
/// Component `b` occupies bit `b - 1`; `InvalidBit` has no bit.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum BackendComponent {
    InvalidBit = 0,
    CPUBit = 1,
    CUDABit = 2,
    MetaBit = 3,
}

/// Number of real backend components (excludes `InvalidBit`).
pub const NUM_BACKENDS: u8 = BackendComponent::END_OF_BACKEND_KEYS as u8;

/// The low region of a key set: one bit per backend component.
pub const FULL_BACKEND_MASK: u64 = (1u64 << NUM_BACKENDS) - 1;

impl BackendComponent {
    pub const END_OF_BACKEND_KEYS: BackendComponent = BackendComponent::MetaBit;

    /// Every real backend component in ascending order.
    pub const ALL: [BackendComponent; NUM_BACKENDS as usize] = [
        BackendComponent::CPUBit,
        BackendComponent::CUDABit,
        BackendComponent::MetaBit,
    ];

    pub const fn repr(self) -> u8 {
        self as u8
    }

    pub const fn from_repr(value: u8) -> Option<BackendComponent> {
        match value {
            0 => Some(BackendComponent::InvalidBit),
            1 => Some(BackendComponent::CPUBit),
            2 => Some(BackendComponent::CUDABit),
            3 => Some(BackendComponent::MetaBit),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            BackendComponent::InvalidBit => "InvalidBit",
            BackendComponent::CPUBit => "CPUBit",
            BackendComponent::CUDABit => "CUDABit",
            BackendComponent::MetaBit => "MetaBit",
        }
    }
}

impl fmt::Display for BackendComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A dispatch key.
///
/// Ordinals `1..=6` are functionality keys. `Dense` and
/// `AutogradFunctionality` are per-backend functionalities: each has one
/// runtime key per backend component, laid out in the ranges that follow the
/// functionality keys. Alias keys come last and never appear in a key set.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
pub enum DispatchKey {
    Undefined = 0,

    Dense = 1,
    BackendSelect = 2,
    ADInplaceOrView = 3,
    AutogradFunctionality = 4,
    AutocastCPU = 5,
    AutocastCUDA = 6,

    // Dense runtime keys
    CPU = 9,
    CUDA = 10,
    Meta = 11,

    // AutogradFunctionality runtime keys
    AutogradCPU = 13,
    AutogradCUDA = 14,
    AutogradMeta = 15,

    // Alias keys
    Autograd = 16,
    CompositeImplicitAutograd = 17,
    CompositeExplicitAutograd = 18,
}

impl DispatchKey {
    pub const END_OF_FUNCTIONALITY_KEYS: u16 = 7;
    pub const START_OF_DENSE_BACKENDS: u16 = Self::END_OF_FUNCTIONALITY_KEYS + 1;
    pub const END_OF_DENSE_BACKENDS: u16 = Self::START_OF_DENSE_BACKENDS + NUM_BACKENDS as u16;
    pub const START_OF_AUTOGRAD_FUNCTIONALITY_BACKENDS: u16 = Self::END_OF_DENSE_BACKENDS + 1;
    pub const END_OF_AUTOGRAD_FUNCTIONALITY_BACKENDS: u16 =
        Self::START_OF_AUTOGRAD_FUNCTIONALITY_BACKENDS + NUM_BACKENDS as u16;
    pub const END_OF_RUNTIME_BACKEND_KEYS: u16 = Self::END_OF_AUTOGRAD_FUNCTIONALITY_BACKENDS;
    pub const START_OF_ALIAS_KEYS: u16 = DispatchKey::Autograd as u16;
    pub const END_OF_ALIAS_KEYS: u16 = DispatchKey::CompositeExplicitAutograd as u16;

    /// Functionality keys in ordinal order (excludes `Undefined`).
    pub const FUNCTIONALITY_KEYS: [DispatchKey; 6] = [
        DispatchKey::Dense,
        DispatchKey::BackendSelect,
        DispatchKey::ADInplaceOrView,
        DispatchKey::AutogradFunctionality,
        DispatchKey::AutocastCPU,
        DispatchKey::AutocastCUDA,
    ];

    /// Every key that can be the target of a dispatch table lookup.
    pub const RUNTIME_KEYS: [DispatchKey; 10] = [
        DispatchKey::BackendSelect,
        DispatchKey::ADInplaceOrView,
        DispatchKey::AutocastCPU,
        DispatchKey::AutocastCUDA,
        DispatchKey::CPU,
        DispatchKey::CUDA,
        DispatchKey::Meta,
        DispatchKey::AutogradCPU,
        DispatchKey::AutogradCUDA,
        DispatchKey::AutogradMeta,
    ];

    pub const fn repr(self) -> u16 {
        self as u16
    }

    pub const fn from_repr(value: u16) -> Option<DispatchKey> {
        let key = match value {
            0 => DispatchKey::Undefined,
            1 => DispatchKey::Dense,
            2 => DispatchKey::BackendSelect,
            3 => DispatchKey::ADInplaceOrView,
            4 => DispatchKey::AutogradFunctionality,
            5 => DispatchKey::AutocastCPU,
            6 => DispatchKey::AutocastCUDA,
            9 => DispatchKey::CPU,
            10 => DispatchKey::CUDA,
            11 => DispatchKey::Meta,
            13 => DispatchKey::AutogradCPU,
            14 => DispatchKey::AutogradCUDA,
            15 => DispatchKey::AutogradMeta,
            16 => DispatchKey::Autograd,
            17 => DispatchKey::CompositeImplicitAutograd,
            18 => DispatchKey::CompositeExplicitAutograd,
            _ => return None,
        };
        Some(key)
    }

    /// True for functionalities that carry one runtime key per backend.
    pub const fn is_per_backend_functionality(self) -> bool {
        matches!(self, DispatchKey::Dense | DispatchKey::AutogradFunctionality)
    }

    /// True for keys that occupy a bit in the functionality region.
    pub const fn is_functionality(self) -> bool {
        let v = self as u16;
        v > 0 && v < Self::END_OF_FUNCTIONALITY_KEYS
    }

    /// True for (functionality, backend) runtime keys such as `AutogradCUDA`.
    pub const fn is_per_backend_runtime_key(self) -> bool {
        let v = self as u16;
        v > Self::END_OF_FUNCTIONALITY_KEYS && v <= Self::END_OF_RUNTIME_BACKEND_KEYS
    }

    pub const fn is_alias(self) -> bool {
        let v = self as u16;
        v >= Self::START_OF_ALIAS_KEYS && v <= Self::END_OF_ALIAS_KEYS
    }

    /// The backend half of a per-backend runtime key, `InvalidBit` otherwise.
    pub const fn to_backend_component(self) -> BackendComponent {
        let v = self as u16;
        let offset = if v >= Self::START_OF_DENSE_BACKENDS && v <= Self::END_OF_DENSE_BACKENDS {
            v - Self::START_OF_DENSE_BACKENDS
        } else if v >= Self::START_OF_AUTOGRAD_FUNCTIONALITY_BACKENDS
            && v <= Self::END_OF_AUTOGRAD_FUNCTIONALITY_BACKENDS
        {
            v - Self::START_OF_AUTOGRAD_FUNCTIONALITY_BACKENDS
        } else {
            return BackendComponent::InvalidBit;
        };
        match BackendComponent::from_repr(offset as u8) {
            Some(b) => b,
            None => BackendComponent::InvalidBit,
        }
    }

    /// The functionality half of a key. Functionality keys map to themselves
    /// and alias keys map to `Undefined`.
    pub const fn to_functionality_key(self) -> DispatchKey {
        let v = self as u16;
        if v <= Self::END_OF_FUNCTIONALITY_KEYS {
            self
        } else if v <= Self::END_OF_DENSE_BACKENDS {
            DispatchKey::Dense
        } else if v <= Self::END_OF_AUTOGRAD_FUNCTIONALITY_BACKENDS {
            DispatchKey::AutogradFunctionality
        } else {
            DispatchKey::Undefined
        }
    }

    /// Combine a per-backend functionality with a backend into its runtime key.
    ///
    /// Returns `Undefined` for non-per-backend functionalities and for
    /// `InvalidBit`.
    pub const fn runtime_key(functionality: DispatchKey, backend: BackendComponent) -> DispatchKey {
        if matches!(backend, BackendComponent::InvalidBit) {
            return DispatchKey::Undefined;
        }
        let start = match functionality {
            DispatchKey::Dense => Self::START_OF_DENSE_BACKENDS,
            DispatchKey::AutogradFunctionality => Self::START_OF_AUTOGRAD_FUNCTIONALITY_BACKENDS,
            _ => return DispatchKey::Undefined,
        };
        match DispatchKey::from_repr(start + backend as u16) {
            Some(k) => k,
            None => DispatchKey::Undefined,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            DispatchKey::Undefined => "Undefined",
            DispatchKey::Dense => "Dense",
            DispatchKey::BackendSelect => "BackendSelect",
            DispatchKey::ADInplaceOrView => "ADInplaceOrView",
            DispatchKey::AutogradFunctionality => "AutogradFunctionality",
            DispatchKey::AutocastCPU => "AutocastCPU",
            DispatchKey::AutocastCUDA => "AutocastCUDA",
            DispatchKey::CPU => "CPU",
            DispatchKey::CUDA => "CUDA",
            DispatchKey::Meta => "Meta",
            DispatchKey::AutogradCPU => "AutogradCPU",
            DispatchKey::AutogradCUDA => "AutogradCUDA",
            DispatchKey::AutogradMeta => "AutogradMeta",
            DispatchKey::Autograd => "Autograd",
            DispatchKey::CompositeImplicitAutograd => "CompositeImplicitAutograd",
            DispatchKey::CompositeExplicitAutograd => "CompositeExplicitAutograd",
        }
    }
}

impl TryFrom<u16> for DispatchKey {
    type Error = DispatchKeyError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::from_repr(value).ok_or(DispatchKeyError::InvalidKey(value))
    }
}

impl TryFrom<u8> for BackendComponent {
    type Error = DispatchKeyError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_repr(value).ok_or(DispatchKeyError::InvalidBackend(value))
    }
}

impl fmt::Display for DispatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Number of functionality slots, including the `Undefined` slot 0.
pub const NUM_FUNCTIONALITY_KEYS: u8 = DispatchKey::END_OF_FUNCTIONALITY_KEYS as u8;

const fn count_per_backend_functionality_keys() -> u8 {
    let mut count = 0;
    let mut i = 0;
    while i < DispatchKey::FUNCTIONALITY_KEYS.len() {
        if DispatchKey::FUNCTIONALITY_KEYS[i].is_per_backend_functionality() {
            count += 1;
        }
        i += 1;
    }
    count
}

pub const NUM_PER_BACKEND_FUNCTIONALITY_KEYS: u8 = count_per_backend_functionality_keys();

/// Size of a flat dispatch table: one slot per functionality, widened to
/// `NUM_BACKENDS` slots for each per-backend functionality.
pub const NUM_RUNTIME_ENTRIES: u16 = NUM_FUNCTIONALITY_KEYS as u16
    + NUM_PER_BACKEND_FUNCTIONALITY_KEYS as u16 * (NUM_BACKENDS as u16 - 1);

// The enum discriminants are written out; keep them in step with the ranges.
const _: () = assert!(DispatchKey::Meta as u16 == DispatchKey::END_OF_DENSE_BACKENDS);
const _: () = assert!(
    DispatchKey::AutogradMeta as u16 == DispatchKey::END_OF_AUTOGRAD_FUNCTIONALITY_BACKENDS
);
const _: () = assert!(DispatchKey::Autograd as u16 == DispatchKey::END_OF_RUNTIME_BACKEND_KEYS + 1);
const _: () = assert!(NUM_FUNCTIONALITY_KEYS as u32 + NUM_BACKENDS as u32 <= u64::BITS);
