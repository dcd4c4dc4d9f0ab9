use std::iter::FusedIterator;

use tr_util::bits::{find_first_set, mask_trailing_zeros};

use crate::key::{
    BackendComponent, DispatchKey, FULL_BACKEND_MASK, NUM_BACKENDS, NUM_FUNCTIONALITY_KEYS,
};

const END_ITER_VAL: u8 = NUM_BACKENDS + NUM_FUNCTIONALITY_KEYS;
const END_ITER_KEY_VAL: u8 = NUM_FUNCTIONALITY_KEYS;

/// Decodes a key set into its dispatch keys.
///
/// Functionalities are visited from the lowest bit up. A per-backend
/// functionality yields one runtime key per backend bit in the set (CPU, then
/// CUDA, then Meta) and nothing at all when the set has no backend bit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Iter {
    repr: u64,
    // bit index the next functionality search starts from
    next_functionality: u8,
    // backend ordinal the next backend search starts from
    next_backend: u8,
    current_dispatchkey_idx: u8,
    current_backendcomponent_idx: u8,
}

impl Iter {
    pub(crate) fn new(repr: u64) -> Self {
        let mut iter = Self {
            repr,
            next_functionality: NUM_BACKENDS,
            next_backend: 0,
            current_dispatchkey_idx: END_ITER_KEY_VAL,
            current_backendcomponent_idx: 0,
        };
        iter.advance();
        iter
    }

    fn finish(&mut self) {
        self.next_functionality = END_ITER_VAL;
        self.current_dispatchkey_idx = END_ITER_KEY_VAL;
        self.current_backendcomponent_idx = 0;
    }

    fn advance(&mut self) {
        loop {
            if self.next_functionality == END_ITER_VAL {
                self.finish();
                return;
            }

            let masked_functionality_bits =
                mask_trailing_zeros::<u64>(self.next_functionality as u32) & self.repr;
            let masked_backend_bits = mask_trailing_zeros::<u64>(self.next_backend as u32)
                & FULL_BACKEND_MASK
                & self.repr;

            let Some(first_functionality_idx) = find_first_set(masked_functionality_bits) else {
                self.finish();
                return;
            };

            let new_next_functionality = first_functionality_idx as u8 + 1;
            let new_dispatchkey_idx = new_next_functionality - NUM_BACKENDS;
            if new_dispatchkey_idx >= NUM_FUNCTIONALITY_KEYS {
                // bits past the last functionality are not keys
                self.finish();
                return;
            }

            let per_backend = DispatchKey::from_repr(new_dispatchkey_idx as u16)
                .is_some_and(DispatchKey::is_per_backend_functionality);
            if !per_backend {
                self.current_dispatchkey_idx = new_dispatchkey_idx;
                self.current_backendcomponent_idx = 0;
                self.next_functionality = new_next_functionality;
                return;
            }

            let Some(first_backend_idx) = find_first_set(masked_backend_bits) else {
                // no backend left for this functionality
                self.next_functionality = new_next_functionality;
                self.next_backend = 0;
                continue;
            };

            let first_backend_idx = first_backend_idx as u8;
            self.current_dispatchkey_idx = new_dispatchkey_idx;
            self.current_backendcomponent_idx = first_backend_idx + 1;

            let remaining_backend_bits = mask_trailing_zeros::<u64>(first_backend_idx as u32 + 1)
                & FULL_BACKEND_MASK
                & self.repr;
            if remaining_backend_bits == 0 {
                self.next_functionality = new_next_functionality;
                self.next_backend = 0;
            } else {
                self.next_backend = first_backend_idx + 1;
            }
            return;
        }
    }

    fn current(&self) -> Option<DispatchKey> {
        if self.current_dispatchkey_idx == END_ITER_KEY_VAL {
            return None;
        }
        let functionality = DispatchKey::from_repr(self.current_dispatchkey_idx as u16)?;
        if !functionality.is_per_backend_functionality() {
            return Some(functionality);
        }
        let backend = BackendComponent::from_repr(self.current_backendcomponent_idx)?;
        Some(DispatchKey::runtime_key(functionality, backend))
    }
}

impl Iterator for Iter {
    type Item = DispatchKey;

    fn next(&mut self) -> Option<DispatchKey> {
        let key = self.current()?;
        self.advance();
        Some(key)
    }
}

impl FusedIterator for Iter {}
