use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchKeyError {
    #[error("dispatch keyset has unknown bitmask 0x{unknown_mask:016x}")]
    UnknownBits { unknown_mask: u64 },
    #[error("invalid dispatch key ordinal: {0}")]
    InvalidKey(u16),
    #[error("invalid backend component ordinal: {0}")]
    InvalidBackend(u8),
    #[error("dispatch keyset has no functionality key")]
    NoFunctionality,
}

pub type Result<T> = std::result::Result<T, DispatchKeyError>;
