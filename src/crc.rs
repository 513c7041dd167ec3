//! CRC-32 primitive shared by the container and partition checksums.

use crc32fast::Hasher;

/// Initial CRC state.
pub const CRC_SEED: u32 = 0;

/// Value reported when a checksum could not be computed (short read or
/// inconsistent sizes). Never a valid stored checksum in practice.
pub const CRC_INVALID: u32 = 0xFFFFFFFF;

/// Folds `data` into `state` and returns the new state.
///
/// Bit-reflected polynomial `0xEDB88320`, cksfv-compatible conditioning:
/// callers seed with [`CRC_SEED`] and use the returned state as is. Chained
/// calls over consecutive chunks produce the same state as a single call
/// over their concatenation.
pub fn crc32(state: u32, data: &[u8]) -> u32 {
    let mut hasher = Hasher::new_with_initial(state);
    hasher.update(data);
    hasher.finalize()
}
